use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::Utc;
use hearth_access::{Member, MemberPatch, NewMember, Role};
use hearth_commands::action::Door;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use crate::{
    contract::{AdminLogin, DeviceReading, DeviceState, DeviceValue, DoorState, ExecutionBackend},
    error::{BackendError, BackendResult},
};

/// Largest Euclidean distance at which two numeric face templates match.
pub const FACE_MATCH_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LocalState {
    doors: DoorState,
    #[serde(default)]
    devices: BTreeMap<String, DeviceReading>,
    #[serde(default)]
    members: IndexMap<String, Member>,
}

impl LocalState {
    fn seeded() -> Self {
        Self {
            doors: Door::CONCRETE
                .iter()
                .map(|door| (door.id().to_string(), true))
                .collect(),
            ..Self::default()
        }
    }

    fn member(&self, member_id: &str) -> BackendResult<&Member> {
        self.members
            .get(member_id)
            .ok_or_else(|| BackendError::rejected(format!("unknown member '{member_id}'")))
    }

    fn pin_in_use(&self, pin: &str, except: Option<&str>) -> bool {
        self.members
            .values()
            .any(|member| member.pin == pin && Some(member.id.as_str()) != except)
    }
}

/// In-process backend holding doors, devices and members in memory.
///
/// Ids it assigns are prefixed `local-`. When a snapshot path is set, every
/// mutation is written there as JSON after the in-memory state is updated.
#[derive(Debug)]
pub struct LocalBackend {
    state: RwLock<LocalState>,
    snapshot: Option<PathBuf>,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBackend {
    /// Every door locked, no devices, no members.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LocalState::seeded()),
            snapshot: None,
        }
    }

    /// Restores from `path` when it exists and keeps writing back to it.
    pub async fn open(path: impl Into<PathBuf>) -> BackendResult<Self> {
        let path = path.into();
        let state = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<LocalState>(&bytes).map_err(|err| {
                BackendError::Config(format!("local snapshot {}: {err}", path.display()))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => LocalState::seeded(),
            Err(err) => {
                return Err(BackendError::Config(format!(
                    "local snapshot {}: {err}",
                    path.display()
                )))
            }
        };
        Ok(Self {
            state: RwLock::new(state),
            snapshot: Some(path),
        })
    }

    /// Registers `admin` unless an admin already exists.
    pub async fn ensure_admin(&self, admin: NewMember) -> BackendResult<Option<Member>> {
        let present = self
            .state
            .read()
            .members
            .values()
            .any(Member::is_admin);
        if present {
            return Ok(None);
        }
        let admin = NewMember {
            role: Role::Admin,
            ..admin
        };
        self.add_member(&admin).await.map(Some)
    }

    /// Snapshot file, if any.
    #[must_use]
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    async fn persist(&self) {
        let Some(path) = &self.snapshot else {
            return;
        };
        let encoded = {
            let state = self.state.read();
            serde_json::to_vec_pretty(&*state)
        };
        let result = match encoded {
            Ok(bytes) => write_snapshot(path, bytes)
                .await
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        if let Err(error) = result {
            tracing::warn!(path = %path.display(), %error, "local snapshot write failed");
        }
    }

    fn insert_member(&self, member: &NewMember) -> BackendResult<Member> {
        member
            .validate()
            .map_err(|err| BackendError::rejected(err.to_string()))?;
        let mut state = self.state.write();
        if state.pin_in_use(&member.pin, None) {
            return Err(BackendError::rejected("pin already in use"));
        }
        let created = member
            .clone()
            .into_member(format!("local-{}", Uuid::new_v4()));
        state.members.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    fn patch_member(&self, member_id: &str, patch: &MemberPatch) -> BackendResult<Member> {
        patch
            .validate()
            .map_err(|err| BackendError::rejected(err.to_string()))?;
        let mut state = self.state.write();
        let updated = patch.apply(state.member(member_id)?);
        if state.pin_in_use(&updated.pin, Some(member_id)) {
            return Err(BackendError::rejected("pin already in use"));
        }
        state.members.insert(member_id.to_string(), updated.clone());
        Ok(updated)
    }

    fn remove_member(&self, member_id: &str) -> BackendResult<()> {
        self.state
            .write()
            .members
            .shift_remove(member_id)
            .map(drop)
            .ok_or_else(|| BackendError::rejected(format!("unknown member '{member_id}'")))
    }

    fn set_all_doors(&self, locked: bool) {
        for value in self.state.write().doors.values_mut() {
            *value = locked;
        }
    }
}

async fn write_snapshot(path: &Path, bytes: Vec<u8>) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, bytes).await
}

fn require_token(token: &str) -> BackendResult<()> {
    if token.trim().is_empty() {
        Err(BackendError::rejected("admin token required"))
    } else {
        Ok(())
    }
}

fn parse_template(template: &str) -> Option<Vec<f64>> {
    serde_json::from_str::<Vec<f64>>(template)
        .ok()
        .filter(|values| !values.is_empty())
}

/// Distance between two face templates: zero for identical strings,
/// Euclidean for equal-length numeric vectors, `None` when incomparable.
#[must_use]
pub fn template_distance(stored: &str, candidate: &str) -> Option<f64> {
    if stored == candidate {
        return Some(0.0);
    }
    let (left, right) = (parse_template(stored)?, parse_template(candidate)?);
    if left.len() != right.len() {
        return None;
    }
    let squared: f64 = left
        .iter()
        .zip(&right)
        .map(|(a, b)| (a - b).powi(2))
        .sum();
    Some(squared.sqrt())
}

#[async_trait]
impl ExecutionBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn get_doors(&self) -> BackendResult<DoorState> {
        Ok(self.state.read().doors.clone())
    }

    async fn toggle_door(&self, door: &str) -> BackendResult<bool> {
        let locked = {
            let mut state = self.state.write();
            let locked = state
                .doors
                .get_mut(door)
                .ok_or_else(|| BackendError::rejected(format!("unknown door '{door}'")))?;
            *locked = !*locked;
            *locked
        };
        self.persist().await;
        Ok(locked)
    }

    async fn set_door(&self, door: &str, locked: bool) -> BackendResult<bool> {
        let toggled = {
            let mut state = self.state.write();
            let current = state
                .doors
                .get_mut(door)
                .ok_or_else(|| BackendError::rejected(format!("unknown door '{door}'")))?;
            let toggled = *current != locked;
            *current = locked;
            toggled
        };
        if toggled {
            self.persist().await;
        }
        Ok(toggled)
    }

    async fn lock_all_doors(&self) -> BackendResult<()> {
        self.set_all_doors(true);
        self.persist().await;
        Ok(())
    }

    async fn unlock_all_doors(&self) -> BackendResult<()> {
        self.set_all_doors(false);
        self.persist().await;
        Ok(())
    }

    async fn set_device_state(
        &self,
        device_id: &str,
        value: DeviceValue,
    ) -> BackendResult<DeviceReading> {
        if device_id.trim().is_empty() {
            return Err(BackendError::rejected("device id required"));
        }
        let reading = DeviceReading {
            device_id: device_id.to_string(),
            value,
            recorded_at: Some(Utc::now()),
        };
        self.state
            .write()
            .devices
            .insert(device_id.to_string(), reading.clone());
        self.persist().await;
        Ok(reading)
    }

    async fn get_device_state(&self, device_id: &str) -> BackendResult<DeviceReading> {
        self.state
            .read()
            .devices
            .get(device_id)
            .cloned()
            .ok_or_else(|| BackendError::rejected(format!("no state for device '{device_id}'")))
    }

    async fn get_device_states(&self, device_ids: &[String]) -> BackendResult<DeviceState> {
        let state = self.state.read();
        Ok(device_ids
            .iter()
            .filter_map(|id| state.devices.get(id).map(|reading| (id.clone(), reading.clone())))
            .collect())
    }

    async fn list_members(&self) -> BackendResult<Vec<Member>> {
        Ok(self.state.read().members.values().cloned().collect())
    }

    async fn add_member(&self, member: &NewMember) -> BackendResult<Member> {
        let created = self.insert_member(member)?;
        self.persist().await;
        Ok(created)
    }

    async fn update_member(&self, member_id: &str, patch: &MemberPatch) -> BackendResult<Member> {
        let updated = self.patch_member(member_id, patch)?;
        self.persist().await;
        Ok(updated)
    }

    async fn delete_member(&self, member_id: &str) -> BackendResult<()> {
        self.remove_member(member_id)?;
        self.persist().await;
        Ok(())
    }

    async fn admin_login(&self, email: &str, pin: &str) -> BackendResult<AdminLogin> {
        let user = self
            .state
            .read()
            .members
            .values()
            .find(|member| {
                member.pin == pin
                    && member
                        .email
                        .as_deref()
                        .is_some_and(|stored| stored.eq_ignore_ascii_case(email.trim()))
            })
            .cloned()
            .ok_or_else(|| BackendError::rejected("invalid credentials"))?;
        if !user.is_admin() {
            return Err(BackendError::rejected("not an administrator"));
        }
        Ok(AdminLogin {
            user,
            token: format!("local-{}", Uuid::new_v4()),
        })
    }

    async fn admin_list_users(&self, token: &str) -> BackendResult<Vec<Member>> {
        require_token(token)?;
        self.list_members().await
    }

    async fn admin_create_user(&self, token: &str, member: &NewMember) -> BackendResult<Member> {
        require_token(token)?;
        self.add_member(member).await
    }

    async fn admin_update_user(
        &self,
        token: &str,
        member_id: &str,
        patch: &MemberPatch,
    ) -> BackendResult<Member> {
        require_token(token)?;
        self.update_member(member_id, patch).await
    }

    async fn admin_delete_user(&self, token: &str, member_id: &str) -> BackendResult<()> {
        require_token(token)?;
        self.delete_member(member_id).await
    }

    async fn authenticate_face(&self, template: &str) -> BackendResult<Member> {
        if template.trim().is_empty() {
            return Err(BackendError::rejected("template required"));
        }
        let state = self.state.read();
        state
            .members
            .values()
            .filter_map(|member| {
                let stored = member.template.as_deref()?;
                template_distance(stored, template)
                    .filter(|distance| *distance <= FACE_MATCH_THRESHOLD)
                    .map(|distance| (distance, member))
            })
            .min_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, member)| member.clone())
            .ok_or_else(|| BackendError::rejected("face not recognized"))
    }

    async fn authenticate_pin(&self, pin: &str) -> BackendResult<Member> {
        self.state
            .read()
            .members
            .values()
            .find(|member| !member.pin.is_empty() && member.pin == pin)
            .cloned()
            .ok_or_else(|| BackendError::rejected("pin not recognized"))
    }
}
