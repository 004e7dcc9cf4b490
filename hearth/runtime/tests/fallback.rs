use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use hearth_access::{Member, MemberPatch, NewMember, PolicyKey, Role};
use hearth_backend::{
    AdminLogin, BackendError, BackendResult, DeviceReading, DeviceState, DeviceValue, DoorState,
    ExecutionBackend, LocalBackend,
};
use hearth_commands::action::{Action, Door};
use hearth_runtime::{
    config::SeedAdmin, CommandError, Hearth, HearthConfig, MountGuard, Outcome,
};
use tempfile::{tempdir, TempDir};

/// Remote that is never reachable and counts how often it was asked.
///
/// With `doors` set it still answers door reads, so only writes fail.
#[derive(Default)]
struct DownRemote {
    calls: AtomicUsize,
    doors: Option<DoorState>,
}

impl DownRemote {
    fn reading(doors: DoorState) -> Self {
        Self {
            doors: Some(doors),
            ..Self::default()
        }
    }

    fn fail<T>(&self) -> BackendResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::Unavailable("connection refused".into()))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionBackend for DownRemote {
    fn name(&self) -> &'static str {
        "down"
    }
    async fn get_doors(&self) -> BackendResult<DoorState> {
        match &self.doors {
            Some(doors) => {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(doors.clone())
            }
            None => self.fail(),
        }
    }
    async fn toggle_door(&self, _door: &str) -> BackendResult<bool> {
        self.fail()
    }
    async fn lock_all_doors(&self) -> BackendResult<()> {
        self.fail()
    }
    async fn unlock_all_doors(&self) -> BackendResult<()> {
        self.fail()
    }
    async fn set_device_state(&self, _id: &str, _value: DeviceValue) -> BackendResult<DeviceReading> {
        self.fail()
    }
    async fn get_device_state(&self, _id: &str) -> BackendResult<DeviceReading> {
        self.fail()
    }
    async fn get_device_states(&self, _ids: &[String]) -> BackendResult<DeviceState> {
        self.fail()
    }
    async fn list_members(&self) -> BackendResult<Vec<Member>> {
        self.fail()
    }
    async fn add_member(&self, _member: &NewMember) -> BackendResult<Member> {
        self.fail()
    }
    async fn update_member(&self, _id: &str, _patch: &MemberPatch) -> BackendResult<Member> {
        self.fail()
    }
    async fn delete_member(&self, _id: &str) -> BackendResult<()> {
        self.fail()
    }
    async fn admin_login(&self, _email: &str, _pin: &str) -> BackendResult<AdminLogin> {
        self.fail()
    }
    async fn admin_list_users(&self, _token: &str) -> BackendResult<Vec<Member>> {
        self.fail()
    }
    async fn admin_create_user(&self, _token: &str, _member: &NewMember) -> BackendResult<Member> {
        self.fail()
    }
    async fn admin_update_user(
        &self,
        _token: &str,
        _id: &str,
        _patch: &MemberPatch,
    ) -> BackendResult<Member> {
        self.fail()
    }
    async fn admin_delete_user(&self, _token: &str, _id: &str) -> BackendResult<()> {
        self.fail()
    }
    async fn authenticate_face(&self, _template: &str) -> BackendResult<Member> {
        self.fail()
    }
    async fn authenticate_pin(&self, _pin: &str) -> BackendResult<Member> {
        self.fail()
    }
}

struct Harness {
    hearth: Hearth,
    remote: Arc<DownRemote>,
    _dir: TempDir,
}

async fn harness() -> Harness {
    harness_with(DownRemote::default()).await
}

async fn harness_with(remote: DownRemote) -> Harness {
    let dir = tempdir().unwrap();
    let mut config = HearthConfig::default();
    config.session.path = dir.path().join("session.json");
    config.local.seed_admin = Some(SeedAdmin {
        name: "Root".into(),
        email: "root@home.test".into(),
        pin: "0000".into(),
    });
    let remote = Arc::new(remote);
    let hearth = Hearth::with_backends(
        config,
        Some(Arc::clone(&remote) as Arc<dyn ExecutionBackend>),
        LocalBackend::new(),
    )
    .await
    .unwrap();
    Harness {
        hearth,
        remote,
        _dir: dir,
    }
}

async fn admin(hearth: &Hearth) -> Member {
    hearth.family().sign_in_pin("0000").await.unwrap()
}

#[tokio::test]
async fn every_mutating_action_succeeds_locally_with_one_log_entry() {
    let Harness { hearth, remote, _dir } = harness().await;
    let requester = admin(&hearth).await;
    let guard = MountGuard::new();
    let utterances = [
        "turn on the kitchen light",
        "turn off all fans",
        "unlock the bedroom door",
        "lock the bedroom door",
        "unlock all doors",
        "lock all doors",
        "switch on light b",
    ];
    for (index, text) in utterances.iter().enumerate() {
        let before = remote.calls();
        let outcome = hearth
            .pipeline()
            .submit_utterance(&requester, text, &guard)
            .await;
        assert!(outcome.is_success(), "{text}: {outcome:?}");
        assert!(remote.calls() > before, "{text} never tried the remote");

        let log = hearth.activity().snapshot();
        assert_eq!(log.len(), index + 1, "{text}");
        let last = log.last().unwrap();
        assert!(last.success, "{text}");
        assert_eq!(last.member.as_deref(), Some(requester.id.as_str()));
    }
    assert!(hearth.backend().fallbacks() >= utterances.len() as u64);

    let doors = hearth.backend().get_doors().await.unwrap();
    assert!(doors.values().all(|locked| *locked));
}

#[tokio::test]
async fn family_operations_fall_back_to_local() {
    let Harness { hearth, remote, _dir } = harness().await;
    let family = hearth.family();

    let kid = family
        .register(NewMember::new("Asha", Role::Child, "1111"))
        .await
        .unwrap();
    assert!(kid.id.starts_with("local-"));
    let toggled = family
        .toggle_policy(&kid.id, PolicyKey::Control(hearth_access::Capability::Doors))
        .await
        .unwrap();
    assert!(toggled.policies.controls.doors);

    family.admin_login("root@home.test", "0000").await.unwrap();
    let created = family
        .admin_create(NewMember::new("Kiran", Role::Member, "2222"))
        .await
        .unwrap();
    family.admin_delete(&created.id).await.unwrap();
    assert_eq!(family.admin_users().await.unwrap().len(), 2);
    assert!(remote.calls() >= 6);
}

#[tokio::test]
async fn self_deletion_is_refused_before_any_backend_call() {
    let Harness { hearth, remote, _dir } = harness().await;
    let family = hearth.family();
    let session = family.admin_login("root@home.test", "0000").await.unwrap();

    let before = remote.calls();
    let fallbacks = hearth.backend().fallbacks();
    let err = family.admin_delete(&session.user.id).await.unwrap_err();
    assert!(matches!(err, CommandError::SelfDeletion));
    assert_eq!(remote.calls(), before);
    assert_eq!(hearth.backend().fallbacks(), fallbacks);
    assert_eq!(family.members().await.unwrap().len(), 1);
}

#[tokio::test]
async fn door_actions_are_denied_without_the_doors_control() {
    let Harness { hearth, remote, _dir } = harness().await;
    let family = hearth.family();
    let kid = family
        .register(NewMember::new("Asha", Role::Child, "1111"))
        .await
        .unwrap();
    assert!(!kid.policies.controls.doors);

    let guard = MountGuard::new();
    let before = remote.calls();
    for action in [
        Action::door(Door::Kitchen, true),
        Action::door(Door::Garage, false),
        Action::door(Door::All, true),
    ] {
        let outcome = hearth.pipeline().submit_action(&kid, action, &guard).await;
        assert!(matches!(
            outcome.into_result(),
            Err(CommandError::PolicyDenied(_))
        ));
    }
    assert_eq!(remote.calls(), before);
    let log = hearth.activity().snapshot();
    assert_eq!(log.len(), 3);
    assert!(log.iter().all(|event| !event.success));
}

#[tokio::test]
async fn unresolved_text_asks_for_clarification() {
    let Harness { hearth, remote, _dir } = harness().await;
    let requester = admin(&hearth).await;
    let before = remote.calls();
    let outcome = hearth
        .pipeline()
        .submit_utterance(&requester, "xyz nonsense", &MountGuard::new())
        .await;
    assert!(matches!(outcome, Outcome::Clarify(_)));
    assert_eq!(remote.calls(), before);
    assert!(hearth.activity().is_empty());
}

#[tokio::test]
async fn door_command_never_mixes_remote_reads_with_local_writes() {
    let remote = DownRemote::reading(DoorState::from([
        ("kitchen".to_string(), false),
        ("garage".to_string(), true),
    ]));
    let Harness { hearth, remote, _dir } = harness_with(remote).await;
    let requester = admin(&hearth).await;
    let guard = MountGuard::new();

    // Local starts with every door locked; the remote claims the kitchen is
    // open but cannot toggle it. The whole door operation runs locally.
    let outcome = hearth
        .pipeline()
        .submit_utterance(&requester, "lock the kitchen door", &guard)
        .await;
    let Outcome::Executed { execution, .. } = &outcome else {
        panic!("lock failed: {outcome:?}");
    };
    assert!(execution.already_in_state);
    assert_eq!(execution.writes, 0);
    assert!(remote.calls() >= 2);

    let outcome = hearth
        .pipeline()
        .submit_action(&requester, Action::door(Door::Garage, false), &guard)
        .await;
    let Outcome::Executed { execution, .. } = &outcome else {
        panic!("unlock failed: {outcome:?}");
    };
    assert_eq!(execution.writes, 1);

    let log = hearth.activity().snapshot();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|event| event.success));
}

#[tokio::test]
async fn rejected_policy_write_keeps_the_old_policy_in_force() {
    let Harness { hearth, remote: _, _dir } = harness().await;
    let family = hearth.family();
    let kid = family
        .register(NewMember::new("Asha", Role::Child, "1111"))
        .await
        .unwrap();
    hearth.backend().delete_member(&kid.id).await.unwrap();

    let key = PolicyKey::Control(hearth_access::Capability::Doors);
    assert!(matches!(
        family.toggle_policy(&kid.id, key).await,
        Err(CommandError::BackendRejected(_))
    ));
    assert!(!family.policy(&kid.id).await.unwrap().controls.doors);

    let outcome = hearth
        .pipeline()
        .submit_action(&kid, Action::door(Door::Garage, false), &MountGuard::new())
        .await;
    assert!(matches!(
        outcome.into_result(),
        Err(CommandError::PolicyDenied(_))
    ));
}
