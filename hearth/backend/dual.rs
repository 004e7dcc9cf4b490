use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use futures::future::BoxFuture;
use hearth_access::{Member, MemberPatch, NewMember};
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    contract::{AdminLogin, DeviceReading, DeviceState, DeviceValue, DoorState, ExecutionBackend},
    error::BackendResult,
    telemetry::HearthTelemetry,
};

/// Remote-first backend that falls back to the local adapter on any remote error.
///
/// The fallback is attempted once per call and the local result is returned
/// as-is. Without a remote every call goes straight to local.
pub struct DualBackend {
    remote: Option<Arc<dyn ExecutionBackend>>,
    local: Arc<dyn ExecutionBackend>,
    telemetry: HearthTelemetry,
    fallbacks: AtomicU64,
}

impl std::fmt::Debug for DualBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualBackend")
            .field("remote", &self.remote.as_ref().map(|remote| remote.name()))
            .field("local", &self.local.name())
            .field("fallbacks", &self.fallbacks())
            .finish()
    }
}

impl DualBackend {
    /// Wires the two adapters.
    #[must_use]
    pub fn new(
        remote: Option<Arc<dyn ExecutionBackend>>,
        local: Arc<dyn ExecutionBackend>,
    ) -> Self {
        Self {
            remote,
            local,
            telemetry: HearthTelemetry::disabled("backend"),
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Local adapter only.
    #[must_use]
    pub fn local_only(local: Arc<dyn ExecutionBackend>) -> Self {
        Self::new(None, local)
    }

    /// Records fallbacks through `telemetry`.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: HearthTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Whether a remote adapter is configured.
    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Number of calls served by the local adapter after a remote failure.
    #[must_use]
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    async fn prefer_remote<'a, T: Send + 'a>(
        &'a self,
        operation: &'static str,
        remote: Option<BoxFuture<'a, BackendResult<T>>>,
        local: BoxFuture<'a, BackendResult<T>>,
    ) -> BackendResult<T> {
        if let Some(remote) = remote {
            match remote.await {
                Ok(value) => return Ok(value),
                Err(err) => self.record_fallback(operation, &err.to_string()),
            }
        }
        local.await
    }

    fn record_fallback(&self, operation: &str, error: &str) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        let metadata = json!({ "operation": operation, "error": error });
        if let Err(err) = self
            .telemetry
            .log(LogLevel::Warn, "backend.fallback", metadata.clone())
        {
            tracing::warn!(error = ?err, "fallback log write failed");
        }
        if let Err(err) = self.telemetry.event("backend.fallback", metadata) {
            tracing::warn!(error = ?err, "fallback event publish failed");
        }
    }
}

#[async_trait]
impl ExecutionBackend for DualBackend {
    fn name(&self) -> &'static str {
        "dual"
    }

    async fn get_doors(&self) -> BackendResult<DoorState> {
        let remote = self.remote.as_ref().map(|r| r.get_doors());
        self.prefer_remote("get_doors", remote, self.local.get_doors())
            .await
    }

    async fn toggle_door(&self, door: &str) -> BackendResult<bool> {
        let remote = self.remote.as_ref().map(|r| r.toggle_door(door));
        self.prefer_remote("toggle_door", remote, self.local.toggle_door(door))
            .await
    }

    async fn set_door(&self, door: &str, locked: bool) -> BackendResult<bool> {
        let remote = self.remote.as_ref().map(|r| r.set_door(door, locked));
        self.prefer_remote("set_door", remote, self.local.set_door(door, locked))
            .await
    }

    async fn lock_all_doors(&self) -> BackendResult<()> {
        let remote = self.remote.as_ref().map(|r| r.lock_all_doors());
        self.prefer_remote("lock_all_doors", remote, self.local.lock_all_doors())
            .await
    }

    async fn unlock_all_doors(&self) -> BackendResult<()> {
        let remote = self.remote.as_ref().map(|r| r.unlock_all_doors());
        self.prefer_remote("unlock_all_doors", remote, self.local.unlock_all_doors())
            .await
    }

    async fn set_device_state(
        &self,
        device_id: &str,
        value: DeviceValue,
    ) -> BackendResult<DeviceReading> {
        let remote = self
            .remote
            .as_ref()
            .map(|r| r.set_device_state(device_id, value));
        self.prefer_remote(
            "set_device_state",
            remote,
            self.local.set_device_state(device_id, value),
        )
        .await
    }

    async fn get_device_state(&self, device_id: &str) -> BackendResult<DeviceReading> {
        let remote = self.remote.as_ref().map(|r| r.get_device_state(device_id));
        self.prefer_remote(
            "get_device_state",
            remote,
            self.local.get_device_state(device_id),
        )
        .await
    }

    async fn get_device_states(&self, device_ids: &[String]) -> BackendResult<DeviceState> {
        let remote = self
            .remote
            .as_ref()
            .map(|r| r.get_device_states(device_ids));
        self.prefer_remote(
            "get_device_states",
            remote,
            self.local.get_device_states(device_ids),
        )
        .await
    }

    async fn list_members(&self) -> BackendResult<Vec<Member>> {
        let remote = self.remote.as_ref().map(|r| r.list_members());
        self.prefer_remote("list_members", remote, self.local.list_members())
            .await
    }

    async fn add_member(&self, member: &NewMember) -> BackendResult<Member> {
        let remote = self.remote.as_ref().map(|r| r.add_member(member));
        self.prefer_remote("add_member", remote, self.local.add_member(member))
            .await
    }

    async fn update_member(&self, member_id: &str, patch: &MemberPatch) -> BackendResult<Member> {
        let remote = self
            .remote
            .as_ref()
            .map(|r| r.update_member(member_id, patch));
        self.prefer_remote(
            "update_member",
            remote,
            self.local.update_member(member_id, patch),
        )
        .await
    }

    async fn delete_member(&self, member_id: &str) -> BackendResult<()> {
        let remote = self.remote.as_ref().map(|r| r.delete_member(member_id));
        self.prefer_remote("delete_member", remote, self.local.delete_member(member_id))
            .await
    }

    async fn admin_login(&self, email: &str, pin: &str) -> BackendResult<AdminLogin> {
        let remote = self.remote.as_ref().map(|r| r.admin_login(email, pin));
        self.prefer_remote("admin_login", remote, self.local.admin_login(email, pin))
            .await
    }

    async fn admin_list_users(&self, token: &str) -> BackendResult<Vec<Member>> {
        let remote = self.remote.as_ref().map(|r| r.admin_list_users(token));
        self.prefer_remote(
            "admin_list_users",
            remote,
            self.local.admin_list_users(token),
        )
        .await
    }

    async fn admin_create_user(&self, token: &str, member: &NewMember) -> BackendResult<Member> {
        let remote = self
            .remote
            .as_ref()
            .map(|r| r.admin_create_user(token, member));
        self.prefer_remote(
            "admin_create_user",
            remote,
            self.local.admin_create_user(token, member),
        )
        .await
    }

    async fn admin_update_user(
        &self,
        token: &str,
        member_id: &str,
        patch: &MemberPatch,
    ) -> BackendResult<Member> {
        let remote = self
            .remote
            .as_ref()
            .map(|r| r.admin_update_user(token, member_id, patch));
        self.prefer_remote(
            "admin_update_user",
            remote,
            self.local.admin_update_user(token, member_id, patch),
        )
        .await
    }

    async fn admin_delete_user(&self, token: &str, member_id: &str) -> BackendResult<()> {
        let remote = self
            .remote
            .as_ref()
            .map(|r| r.admin_delete_user(token, member_id));
        self.prefer_remote(
            "admin_delete_user",
            remote,
            self.local.admin_delete_user(token, member_id),
        )
        .await
    }

    async fn authenticate_face(&self, template: &str) -> BackendResult<Member> {
        let remote = self.remote.as_ref().map(|r| r.authenticate_face(template));
        self.prefer_remote(
            "authenticate_face",
            remote,
            self.local.authenticate_face(template),
        )
        .await
    }

    async fn authenticate_pin(&self, pin: &str) -> BackendResult<Member> {
        let remote = self.remote.as_ref().map(|r| r.authenticate_pin(pin));
        self.prefer_remote("authenticate_pin", remote, self.local.authenticate_pin(pin))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::BackendError, local::LocalBackend};
    use hearth_access::Role;
    use shared_event_bus::MemoryEventBus;
    use std::sync::atomic::AtomicUsize;

    /// Remote whose doors always answer with a fixed map.
    struct FixedRemote {
        calls: AtomicUsize,
        fail: Option<BackendError>,
        writes_fail: bool,
    }

    impl FixedRemote {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: None,
                writes_fail: false,
            }
        }

        fn failing(err: BackendError) -> Self {
            Self {
                fail: Some(err),
                ..Self::ok()
            }
        }

        /// Answers reads, refuses door writes.
        fn read_only() -> Self {
            Self {
                writes_fail: true,
                ..Self::ok()
            }
        }

        fn answer<T>(&self, value: T) -> BackendResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail {
                Some(err) => Err(err.clone()),
                None => Ok(value),
            }
        }

        fn write<T>(&self, value: T) -> BackendResult<T> {
            if self.writes_fail {
                self.calls.fetch_add(1, Ordering::SeqCst);
                return Err(BackendError::Unavailable("write timed out".into()));
            }
            self.answer(value)
        }
    }

    fn remote_member() -> Member {
        NewMember::new("Remote", Role::Member, "1357").into_member("r-1")
    }

    #[async_trait]
    impl ExecutionBackend for FixedRemote {
        fn name(&self) -> &'static str {
            "fixed"
        }
        async fn get_doors(&self) -> BackendResult<DoorState> {
            self.answer(DoorState::from([
                ("remote-door".to_string(), false),
                ("kitchen".to_string(), false),
            ]))
        }
        async fn toggle_door(&self, _door: &str) -> BackendResult<bool> {
            self.write(false)
        }
        async fn lock_all_doors(&self) -> BackendResult<()> {
            self.answer(())
        }
        async fn unlock_all_doors(&self) -> BackendResult<()> {
            self.answer(())
        }
        async fn set_device_state(
            &self,
            device_id: &str,
            value: DeviceValue,
        ) -> BackendResult<DeviceReading> {
            self.answer(DeviceReading {
                device_id: device_id.into(),
                value,
                recorded_at: None,
            })
        }
        async fn get_device_state(&self, device_id: &str) -> BackendResult<DeviceReading> {
            self.set_device_state(device_id, DeviceValue::Switch(false))
                .await
        }
        async fn get_device_states(&self, _ids: &[String]) -> BackendResult<DeviceState> {
            self.answer(DeviceState::new())
        }
        async fn list_members(&self) -> BackendResult<Vec<Member>> {
            self.answer(vec![remote_member()])
        }
        async fn add_member(&self, _member: &NewMember) -> BackendResult<Member> {
            self.answer(remote_member())
        }
        async fn update_member(&self, _id: &str, _patch: &MemberPatch) -> BackendResult<Member> {
            self.answer(remote_member())
        }
        async fn delete_member(&self, _id: &str) -> BackendResult<()> {
            self.answer(())
        }
        async fn admin_login(&self, _email: &str, _pin: &str) -> BackendResult<AdminLogin> {
            self.answer(AdminLogin {
                user: remote_member(),
                token: "remote-token".into(),
            })
        }
        async fn admin_list_users(&self, _token: &str) -> BackendResult<Vec<Member>> {
            self.answer(vec![remote_member()])
        }
        async fn admin_create_user(&self, _t: &str, _m: &NewMember) -> BackendResult<Member> {
            self.answer(remote_member())
        }
        async fn admin_update_user(
            &self,
            _t: &str,
            _id: &str,
            _p: &MemberPatch,
        ) -> BackendResult<Member> {
            self.answer(remote_member())
        }
        async fn admin_delete_user(&self, _t: &str, _id: &str) -> BackendResult<()> {
            self.answer(())
        }
        async fn authenticate_face(&self, _template: &str) -> BackendResult<Member> {
            self.answer(remote_member())
        }
        async fn authenticate_pin(&self, _pin: &str) -> BackendResult<Member> {
            self.answer(remote_member())
        }
    }

    #[tokio::test]
    async fn remote_success_is_returned_as_is() {
        let remote = Arc::new(FixedRemote::ok());
        let dual = DualBackend::new(Some(remote.clone()), Arc::new(LocalBackend::new()));
        let doors = dual.get_doors().await.unwrap();
        assert!(doors.contains_key("remote-door"));
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        assert_eq!(dual.fallbacks(), 0);
    }

    #[tokio::test]
    async fn door_set_runs_wholly_on_one_adapter() {
        let remote = Arc::new(FixedRemote::read_only());
        let local = Arc::new(LocalBackend::new());
        let dual = DualBackend::new(Some(remote.clone()), local.clone());

        // Remote reads kitchen as unlocked but cannot toggle; the local
        // kitchen is already locked and must stay that way.
        let toggled = dual.set_door("kitchen", true).await.unwrap();
        assert!(!toggled);
        assert!(local.get_doors().await.unwrap()["kitchen"]);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
        assert_eq!(dual.fallbacks(), 1);
    }

    #[tokio::test]
    async fn any_remote_error_falls_back_once() {
        for err in [
            BackendError::Unavailable("connection refused".into()),
            BackendError::rejected("maintenance"),
        ] {
            let remote = Arc::new(FixedRemote::failing(err));
            let dual = DualBackend::new(Some(remote.clone()), Arc::new(LocalBackend::new()));
            assert!(dual.toggle_door("kitchen").await.is_ok());
            assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
            assert_eq!(dual.fallbacks(), 1);
        }
    }

    #[tokio::test]
    async fn local_errors_are_authoritative() {
        let remote = Arc::new(FixedRemote::failing(BackendError::Unavailable("down".into())));
        let dual = DualBackend::new(Some(remote), Arc::new(LocalBackend::new()));
        let err = dual.toggle_door("attic").await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[tokio::test]
    async fn without_remote_goes_straight_to_local() {
        let dual = DualBackend::local_only(Arc::new(LocalBackend::new()));
        assert!(!dual.has_remote());
        let member = dual
            .add_member(&NewMember::new("Tara", Role::Child, "4444"))
            .await
            .unwrap();
        assert!(member.id.starts_with("local-"));
        assert_eq!(dual.fallbacks(), 0);
    }

    #[tokio::test]
    async fn fallback_is_published() {
        let bus = Arc::new(MemoryEventBus::new(8));
        let telemetry = HearthTelemetry::builder("backend")
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let remote = Arc::new(FixedRemote::failing(BackendError::Unavailable("down".into())));
        let dual = DualBackend::new(Some(remote), Arc::new(LocalBackend::new()))
            .with_telemetry(telemetry);
        dual.lock_all_doors().await.unwrap();
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        let events = bus.of_type("backend.fallback");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["operation"], "lock_all_doors");
    }
}
