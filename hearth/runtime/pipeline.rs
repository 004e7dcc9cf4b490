use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use hearth_access::{authorize, Capability, Decision, DenialReason, Member, Policy, PolicyStore};
use hearth_backend::{ExecutionBackend, HearthTelemetry, LocalBackend};
use hearth_commands::{
    action::Action,
    resolver::{CommandInterpreter, KeywordInterpreter},
};
use serde_json::{json, Value};
use shared_logging::LogLevel;

use crate::{
    activity::{ActivityEvent, ActivityLog},
    error::CommandError,
    executor::{execute, Execution},
};

/// Liveness flag of the screen that issued a request.
///
/// Clones share the flag. Results arriving after [`MountGuard::release`]
/// are reported as [`Outcome::Discarded`].
#[derive(Debug, Clone)]
pub struct MountGuard {
    mounted: Arc<AtomicBool>,
}

impl Default for MountGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl MountGuard {
    /// A mounted guard.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Marks the owner as gone.
    pub fn release(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    /// Whether the owner is still present.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}

/// Result of one submission.
#[derive(Debug)]
pub enum Outcome {
    /// The action ran.
    Executed {
        /// The action.
        action: Action,
        /// Backend effect.
        execution: Execution,
    },
    /// Greeting or help; nothing was executed.
    Replied(String),
    /// The utterance did not resolve; carries the clarification text.
    Clarify(String),
    /// The policy refused the action; the backend was not called.
    Denied {
        /// The refused action.
        action: Action,
        /// Why.
        reason: DenialReason,
    },
    /// The backend failed after the local fallback.
    Failed {
        /// The action.
        action: Action,
        /// Backend failure.
        error: CommandError,
    },
    /// The owner went away before the result arrived.
    Discarded {
        /// The action.
        action: Action,
    },
}

impl Outcome {
    /// Text to show or speak back.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Executed { action, execution } if execution.already_in_state => {
                format!("{} (already done)", action.confirmation)
            }
            Self::Executed { action, .. } => action.confirmation.clone(),
            Self::Replied(text) | Self::Clarify(text) => text.clone(),
            Self::Denied { reason, .. } => format!("Sorry, you are not allowed to do that ({reason})."),
            Self::Failed { error, .. } => format!("That did not work: {error}."),
            Self::Discarded { .. } => String::new(),
        }
    }

    /// Whether the request achieved what was asked.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Executed { .. } | Self::Replied(_))
    }

    /// Converts failures into a [`CommandError`].
    pub fn into_result(self) -> Result<Self, CommandError> {
        match self {
            Self::Clarify(text) => Err(CommandError::ParseAmbiguous(text)),
            Self::Denied { reason, .. } => Err(CommandError::PolicyDenied(reason)),
            Self::Failed { error, .. } => Err(error),
            other => Ok(other),
        }
    }
}

/// Builder for [`CommandPipeline`].
pub struct CommandPipelineBuilder {
    interpreter: Arc<dyn CommandInterpreter>,
    backend: Arc<dyn ExecutionBackend>,
    policies: Arc<PolicyStore>,
    activity: ActivityLog,
    telemetry: HearthTelemetry,
}

impl Default for CommandPipelineBuilder {
    fn default() -> Self {
        Self {
            interpreter: Arc::new(KeywordInterpreter),
            backend: Arc::new(LocalBackend::new()),
            policies: Arc::new(PolicyStore::new()),
            activity: ActivityLog::new(),
            telemetry: HearthTelemetry::disabled("pipeline"),
        }
    }
}

impl CommandPipelineBuilder {
    /// Overrides the interpreter.
    #[must_use]
    pub fn interpreter(mut self, interpreter: Arc<dyn CommandInterpreter>) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Overrides the backend.
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn ExecutionBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Shares a policy store.
    #[must_use]
    pub fn policies(mut self, policies: Arc<PolicyStore>) -> Self {
        self.policies = policies;
        self
    }

    /// Shares an activity log.
    #[must_use]
    pub fn activity(mut self, activity: ActivityLog) -> Self {
        self.activity = activity;
        self
    }

    /// Attaches telemetry sinks.
    #[must_use]
    pub fn telemetry(mut self, telemetry: HearthTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Finalizes the pipeline.
    #[must_use]
    pub fn build(self) -> CommandPipeline {
        CommandPipeline {
            interpreter: self.interpreter,
            backend: self.backend,
            policies: self.policies,
            activity: self.activity,
            telemetry: self.telemetry,
        }
    }
}

/// Normalize, resolve, authorize, execute, log.
pub struct CommandPipeline {
    interpreter: Arc<dyn CommandInterpreter>,
    backend: Arc<dyn ExecutionBackend>,
    policies: Arc<PolicyStore>,
    activity: ActivityLog,
    telemetry: HearthTelemetry,
}

impl std::fmt::Debug for CommandPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPipeline")
            .field("backend", &self.backend.name())
            .field("activity", &self.activity.len())
            .finish_non_exhaustive()
    }
}

impl CommandPipeline {
    /// Builder with a keyword interpreter and a fresh local backend.
    #[must_use]
    pub fn builder() -> CommandPipelineBuilder {
        CommandPipelineBuilder::default()
    }

    /// Shared activity log.
    #[must_use]
    pub fn activity(&self) -> ActivityLog {
        self.activity.clone()
    }

    /// Shared policy store.
    #[must_use]
    pub fn policies(&self) -> Arc<PolicyStore> {
        Arc::clone(&self.policies)
    }

    /// Runs a spoken or typed command for `requester`.
    ///
    /// Greetings, help and unresolved text are answered without touching the
    /// backend or the activity log. Resolved actions additionally need the
    /// `voice` control.
    pub async fn submit_utterance(
        &self,
        requester: &Member,
        text: &str,
        guard: &MountGuard,
    ) -> Outcome {
        let action = self.interpreter.interpret(text);
        self.log(
            LogLevel::Info,
            "pipeline.command.resolved",
            json!({
                "member": requester.id,
                "kind": action.kind.label(),
                "target": action.target(),
                "success": action.success,
            }),
        );
        if action.is_noop() {
            return if action.success {
                Outcome::Replied(action.confirmation)
            } else {
                Outcome::Clarify(action.confirmation)
            };
        }
        let policy = self.policy_for(requester);
        if !policy.controls.get(Capability::Voice) {
            return self.deny(requester, action, DenialReason::CapabilityDenied);
        }
        self.run(requester, &policy, action, guard).await
    }

    /// Runs a pre-built action (a UI button) for `requester`.
    pub async fn submit_action(
        &self,
        requester: &Member,
        action: Action,
        guard: &MountGuard,
    ) -> Outcome {
        if action.is_noop() {
            return Outcome::Replied(action.confirmation);
        }
        let policy = self.policy_for(requester);
        self.run(requester, &policy, action, guard).await
    }

    async fn run(
        &self,
        requester: &Member,
        policy: &Policy,
        action: Action,
        guard: &MountGuard,
    ) -> Outcome {
        let decision: Decision = authorize(policy, &action);
        if let Some(reason) = decision.reason.filter(|_| !decision.allowed) {
            return self.deny(requester, action, reason);
        }

        let result = execute(self.backend.as_ref(), &action).await;
        let outcome = match result {
            Ok(execution) => {
                self.activity
                    .append(ActivityEvent::for_action(&action, true).member(&requester.id));
                self.record("pipeline.executed", LogLevel::Info, requester, &action, json!({
                    "writes": execution.writes,
                    "already_in_state": execution.already_in_state,
                }));
                Outcome::Executed { action, execution }
            }
            Err(err) => {
                let error = CommandError::from(err);
                self.activity.append(
                    ActivityEvent::for_action(&action, false)
                        .member(&requester.id)
                        .detail(error.label()),
                );
                self.record("pipeline.failed", LogLevel::Error, requester, &action, json!({
                    "error": error.to_string(),
                }));
                Outcome::Failed { action, error }
            }
        };
        if guard.is_mounted() {
            outcome
        } else {
            self.log(
                LogLevel::Debug,
                "pipeline.discarded",
                json!({ "member": requester.id }),
            );
            match outcome {
                Outcome::Executed { action, .. } | Outcome::Failed { action, .. } => {
                    Outcome::Discarded { action }
                }
                other => other,
            }
        }
    }

    fn deny(&self, requester: &Member, action: Action, reason: DenialReason) -> Outcome {
        self.activity.append(
            ActivityEvent::for_action(&action, false)
                .member(&requester.id)
                .detail(reason.label()),
        );
        self.record("pipeline.denied", LogLevel::Warn, requester, &action, json!({
            "reason": reason.label(),
        }));
        Outcome::Denied { action, reason }
    }

    fn policy_for(&self, requester: &Member) -> Arc<Policy> {
        self.policies
            .read(&requester.id)
            .unwrap_or_else(|| self.policies.load(requester))
    }

    fn record(&self, message: &str, level: LogLevel, requester: &Member, action: &Action, extra: Value) {
        let mut metadata = json!({
            "member": requester.id,
            "kind": action.kind.label(),
            "target": action.target(),
        });
        if let (Some(fields), Value::Object(extra)) = (metadata.as_object_mut(), extra) {
            fields.extend(extra);
        }
        self.log(level, message, metadata.clone());
        if let Err(err) = self.telemetry.event(message, metadata) {
            tracing::warn!(error = ?err, "pipeline event publish failed");
        }
    }

    fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Err(err) = self.telemetry.log(level, message, metadata) {
            tracing::warn!(error = ?err, "pipeline log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_access::{Area, NewMember, Policy, PolicyKey, Role, SubCapability};
    use hearth_backend::DualBackend;
    use hearth_commands::action::{Device, Door, Room, Switch};

    fn member(role: Role) -> Member {
        NewMember::new("Sam", role, "1234").into_member(format!("{}-1", role.label()))
    }

    /// Role default plus every area gate.
    fn trusted(role: Role) -> Member {
        NewMember::new("Sam", role, "1234")
            .policies(Policy {
                areas: Policy::unrestricted().areas,
                ..Policy::default_for_role(role)
            })
            .into_member(format!("{}-1", role.label()))
    }

    fn pipeline() -> CommandPipeline {
        CommandPipeline::builder()
            .backend(Arc::new(DualBackend::local_only(Arc::new(LocalBackend::new()))))
            .build()
    }

    #[tokio::test]
    async fn greeting_and_nonsense_are_not_logged() {
        let pipeline = pipeline();
        let guard = MountGuard::new();
        let admin = member(Role::Admin);
        assert!(matches!(
            pipeline.submit_utterance(&admin, "hello", &guard).await,
            Outcome::Replied(_)
        ));
        let outcome = pipeline.submit_utterance(&admin, "xyz nonsense", &guard).await;
        assert!(matches!(
            outcome.into_result(),
            Err(CommandError::ParseAmbiguous(_))
        ));
        assert!(pipeline.activity().is_empty());
    }

    #[tokio::test]
    async fn utterance_executes_and_logs_once() {
        let pipeline = pipeline();
        let guard = MountGuard::new();
        let parent = trusted(Role::Parent);
        let outcome = pipeline
            .submit_utterance(&parent, "unlock the kitchen door", &guard)
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.message(), "Unlocking the kitchen door.");
        let log = pipeline.activity().snapshot();
        assert_eq!(log.len(), 1);
        assert!(log[0].success);
        assert_eq!(log[0].member.as_deref(), Some("parent-1"));
    }

    #[tokio::test]
    async fn denied_actions_are_logged_and_skip_the_backend() {
        let pipeline = pipeline();
        let guard = MountGuard::new();
        let child = member(Role::Child);
        let outcome = pipeline
            .submit_action(&child, Action::door(Door::Garage, false), &guard)
            .await;
        assert!(matches!(
            outcome,
            Outcome::Denied {
                reason: DenialReason::CapabilityDenied,
                ..
            }
        ));
        let log = pipeline.activity().recent(1);
        assert!(!log[0].success);
        assert_eq!(log[0].detail.as_deref(), Some("capability-denied"));
    }

    #[tokio::test]
    async fn voice_control_gates_utterances_only() {
        let pipeline = pipeline();
        let guard = MountGuard::new();
        let mut parent = trusted(Role::Parent);
        parent.policies = parent
            .policies
            .with(PolicyKey::Control(Capability::Voice), false);
        let spoken = pipeline
            .submit_utterance(&parent, "turn on the kitchen light", &guard)
            .await;
        assert!(matches!(spoken, Outcome::Denied { .. }));
        let pressed = pipeline
            .submit_action(
                &parent,
                Action::device_set(Device::Light, Room::Kitchen, Switch::On),
                &guard,
            )
            .await;
        assert!(pressed.is_success());
        assert_eq!(pipeline.activity().len(), 2);
    }

    #[tokio::test]
    async fn closed_area_gate_denies_a_named_room() {
        let pipeline = pipeline();
        let guard = MountGuard::new();
        let parent = member(Role::Parent);
        let outcome = pipeline
            .submit_utterance(&parent, "turn on the kitchen light", &guard)
            .await;
        assert!(matches!(
            outcome,
            Outcome::Denied {
                reason: DenialReason::AreaDenied,
                ..
            }
        ));

        let mut granted = parent.clone();
        granted.policies = granted
            .policies
            .with(PolicyKey::Area(Area::Kitchen, SubCapability::Light), true);
        pipeline.policies().load(&granted);
        let outcome = pipeline
            .submit_utterance(&granted, "turn on the kitchen light", &guard)
            .await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn released_guard_discards_the_result() {
        let pipeline = pipeline();
        let guard = MountGuard::new();
        guard.release();
        let outcome = pipeline
            .submit_utterance(&member(Role::Admin), "lock all doors", &guard)
            .await;
        assert!(matches!(outcome, Outcome::Discarded { .. }));
        assert_eq!(outcome.message(), "");
        assert_eq!(pipeline.activity().len(), 1);
    }

    #[tokio::test]
    async fn store_snapshot_wins_over_member_copy() {
        let pipeline = pipeline();
        let guard = MountGuard::new();
        let admin = member(Role::Admin);
        let mut revoked = admin.clone();
        revoked.policies = revoked
            .policies
            .with(PolicyKey::Control(Capability::Devices), false);
        pipeline.policies().load(&revoked);
        let outcome = pipeline
            .submit_utterance(&admin, "turn on all lights", &guard)
            .await;
        assert!(matches!(outcome, Outcome::Denied { .. }));
    }
}
