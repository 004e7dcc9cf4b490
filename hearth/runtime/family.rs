use std::sync::Arc;

use hearth_access::{
    AdminSession, Member, MemberPatch, NewMember, Policy, PolicyKey, PolicyStore, RawPolicy, Role,
    SessionStore,
};
use hearth_backend::{ExecutionBackend, HearthTelemetry};
use serde_json::{json, Value};
use shared_logging::LogLevel;

use crate::error::CommandError;

/// Member registration, policy editing, admin user management and sign-in.
///
/// Policy edits are computed from the shared [`PolicyStore`] snapshot,
/// written back to the backend as a whole-policy patch, and swapped into the
/// store only once the backend accepts them.
pub struct FamilyManager {
    backend: Arc<dyn ExecutionBackend>,
    policies: Arc<PolicyStore>,
    session: Arc<SessionStore>,
    telemetry: HearthTelemetry,
}

impl std::fmt::Debug for FamilyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FamilyManager")
            .field("backend", &self.backend.name())
            .field("session", &self.session.path())
            .finish_non_exhaustive()
    }
}

impl FamilyManager {
    /// Wires the manager.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        policies: Arc<PolicyStore>,
        session: Arc<SessionStore>,
    ) -> Self {
        Self {
            backend,
            policies,
            session,
            telemetry: HearthTelemetry::disabled("family"),
        }
    }

    /// Attaches telemetry sinks.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: HearthTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Every member; their policies are loaded into the store.
    pub async fn members(&self) -> Result<Vec<Member>, CommandError> {
        let members = self.backend.list_members().await?;
        for member in &members {
            self.policies.load(member);
        }
        Ok(members)
    }

    /// Registers a member with the role default policy unless one is given.
    pub async fn register(&self, member: NewMember) -> Result<Member, CommandError> {
        member.validate()?;
        let created = self.backend.add_member(&member).await?;
        self.policies.load(&created);
        self.log(
            LogLevel::Info,
            "family.member.registered",
            json!({ "member": created.id, "role": created.role.label() }),
        );
        Ok(created)
    }

    /// Flips one gate and writes the whole policy back.
    pub async fn toggle_policy(
        &self,
        member_id: &str,
        key: PolicyKey,
    ) -> Result<Member, CommandError> {
        self.ensure_loaded(member_id).await?;
        let next = self.policies.toggled(member_id, key)?;
        let updated = self.write_back(member_id, next).await?;
        self.log(
            LogLevel::Info,
            "family.policy.toggled",
            json!({
                "member": member_id,
                "key": key.to_string(),
                "value": updated.policies.get(key),
            }),
        );
        Ok(updated)
    }

    /// Applies every key present in `patch` and writes the whole policy back.
    pub async fn merge_policy(
        &self,
        member_id: &str,
        patch: &RawPolicy,
    ) -> Result<Member, CommandError> {
        self.ensure_loaded(member_id).await?;
        let next = self.policies.merged(member_id, patch)?;
        self.write_back(member_id, next).await
    }

    /// Current policy snapshot for a member.
    pub async fn policy(&self, member_id: &str) -> Result<Arc<Policy>, CommandError> {
        self.ensure_loaded(member_id).await?;
        self.policies
            .read(member_id)
            .ok_or_else(|| CommandError::BackendRejected(format!("unknown member '{member_id}'")))
    }

    /// Changes a member's role. Needs an admin session.
    pub async fn change_role(&self, member_id: &str, role: Role) -> Result<Member, CommandError> {
        let session = self.require_session()?;
        let updated = self
            .backend
            .admin_update_user(&session.token, member_id, &MemberPatch::role(role))
            .await?;
        self.policies.load(&updated);
        self.log(
            LogLevel::Info,
            "family.role.changed",
            json!({ "member": member_id, "role": role.label(), "by": session.user.id }),
        );
        Ok(updated)
    }

    /// Signs an administrator in and persists the session.
    pub async fn admin_login(&self, email: &str, pin: &str) -> Result<AdminSession, CommandError> {
        let login = self.backend.admin_login(email, pin).await?;
        if !login.user.is_admin() {
            return Err(CommandError::BackendRejected("not an administrator".into()));
        }
        self.policies.load(&login.user);
        let session = AdminSession::new(login.user, login.token);
        self.session.begin(session.clone()).await?;
        self.log(
            LogLevel::Info,
            "family.admin.signed_in",
            json!({ "member": session.user.id }),
        );
        Ok(session)
    }

    /// Ends the admin session.
    pub async fn admin_logout(&self) -> Result<(), CommandError> {
        self.session.end().await?;
        self.log(LogLevel::Info, "family.admin.signed_out", json!({}));
        Ok(())
    }

    /// Restores a persisted admin session.
    pub async fn restore_session(&self) -> Result<Option<AdminSession>, CommandError> {
        Ok(self.session.load().await?)
    }

    /// Signed-in administrator, if any.
    #[must_use]
    pub fn current_admin(&self) -> Option<AdminSession> {
        self.session.current()
    }

    /// Every user, admin view.
    pub async fn admin_users(&self) -> Result<Vec<Member>, CommandError> {
        let session = self.require_session()?;
        let users = self.backend.admin_list_users(&session.token).await?;
        for user in &users {
            self.policies.load(user);
        }
        Ok(users)
    }

    /// Creates a user, admin view.
    pub async fn admin_create(&self, member: NewMember) -> Result<Member, CommandError> {
        let session = self.require_session()?;
        member.validate()?;
        let created = self
            .backend
            .admin_create_user(&session.token, &member)
            .await?;
        self.policies.load(&created);
        Ok(created)
    }

    /// Updates a user, admin view.
    pub async fn admin_update(
        &self,
        member_id: &str,
        patch: &MemberPatch,
    ) -> Result<Member, CommandError> {
        let session = self.require_session()?;
        patch.validate()?;
        let updated = self
            .backend
            .admin_update_user(&session.token, member_id, patch)
            .await?;
        self.policies.load(&updated);
        Ok(updated)
    }

    /// Deletes a user, admin view. The signed-in administrator cannot delete
    /// their own account; that is refused before the backend is called.
    pub async fn admin_delete(&self, member_id: &str) -> Result<(), CommandError> {
        let session = self.require_session()?;
        if session.is_self(member_id) {
            self.log(
                LogLevel::Warn,
                "family.admin.self_deletion_refused",
                json!({ "member": member_id }),
            );
            return Err(CommandError::SelfDeletion);
        }
        self.backend
            .admin_delete_user(&session.token, member_id)
            .await?;
        self.policies.forget(member_id);
        self.log(
            LogLevel::Info,
            "family.admin.user_deleted",
            json!({ "member": member_id, "by": session.user.id }),
        );
        Ok(())
    }

    /// Identifies a member by PIN.
    pub async fn sign_in_pin(&self, pin: &str) -> Result<Member, CommandError> {
        let member = self.backend.authenticate_pin(pin).await?;
        self.policies.load(&member);
        Ok(member)
    }

    /// Identifies a member by biometric template.
    pub async fn sign_in_face(&self, template: &str) -> Result<Member, CommandError> {
        let member = self.backend.authenticate_face(template).await?;
        self.policies.load(&member);
        Ok(member)
    }

    fn require_session(&self) -> Result<AdminSession, CommandError> {
        self.session.current().ok_or(CommandError::NotSignedIn)
    }

    async fn ensure_loaded(&self, member_id: &str) -> Result<(), CommandError> {
        if self.policies.read(member_id).is_some() {
            return Ok(());
        }
        let members = self.members().await?;
        if members.iter().any(|member| member.id == member_id) {
            Ok(())
        } else {
            Err(CommandError::BackendRejected(format!(
                "unknown member '{member_id}'"
            )))
        }
    }

    async fn write_back(&self, member_id: &str, policy: Policy) -> Result<Member, CommandError> {
        let updated = self
            .backend
            .update_member(member_id, &MemberPatch::policies(policy))
            .await?;
        self.policies.load(&updated);
        Ok(updated)
    }

    fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Err(err) = self.telemetry.log(level, message, metadata.clone()) {
            tracing::warn!(error = ?err, "family log write failed");
        }
        if let Err(err) = self.telemetry.event(message, metadata) {
            tracing::warn!(error = ?err, "family event publish failed");
        }
    }
}
