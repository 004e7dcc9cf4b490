use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hearth_access::{Member, MemberPatch, NewMember};
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};

/// Door id to `locked`.
pub type DoorState = BTreeMap<String, bool>;

/// Device key to its last reading.
pub type DeviceState = BTreeMap<String, DeviceReading>;

/// Value reported by or written to a device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DeviceValue {
    /// On/off.
    Switch(bool),
    /// Numeric level (dimmer, fan speed, temperature).
    Level(f64),
}

impl DeviceValue {
    /// Whether the device reads as powered.
    #[must_use]
    pub fn is_on(&self) -> bool {
        match *self {
            Self::Switch(on) => on,
            Self::Level(level) => level > 0.0,
        }
    }
}

/// Last known state of one device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReading {
    /// Device key.
    pub device_id: String,
    /// Reported value.
    pub value: DeviceValue,
    /// When the value was recorded, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Successful admin sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminLogin {
    /// The administrator.
    pub user: Member,
    /// Bearer token for admin endpoints.
    pub token: String,
}

/// Operations every execution backend exposes with identical contracts.
///
/// Implementations never panic on bad input; refusals come back as
/// [`crate::BackendError::Rejected`] and transport problems as
/// [`crate::BackendError::Unavailable`].
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Short identifier used in logs (`remote`, `local`, `dual`).
    fn name(&self) -> &'static str;

    /// Lock state of every door.
    async fn get_doors(&self) -> BackendResult<DoorState>;
    /// Flips one door and returns its new `locked` value.
    async fn toggle_door(&self, door: &str) -> BackendResult<bool>;
    /// Locks every door.
    async fn lock_all_doors(&self) -> BackendResult<()>;
    /// Unlocks every door.
    async fn unlock_all_doors(&self) -> BackendResult<()>;

    /// Drives one door to `locked` on this adapter alone.
    ///
    /// Reads the door map and toggles only when the door differs. A toggle
    /// that lands away from the target is toggled again; if the door still
    /// disagrees the call is `Rejected`. Returns whether a toggle happened.
    async fn set_door(&self, door: &str, locked: bool) -> BackendResult<bool> {
        let doors = self.get_doors().await?;
        if doors.get(door) == Some(&locked) {
            return Ok(false);
        }
        if self.toggle_door(door).await? == locked || self.toggle_door(door).await? == locked {
            return Ok(true);
        }
        Err(BackendError::rejected(format!(
            "door '{door}' did not reach the requested state"
        )))
    }

    /// Writes a device value.
    async fn set_device_state(
        &self,
        device_id: &str,
        value: DeviceValue,
    ) -> BackendResult<DeviceReading>;
    /// Reads one device.
    async fn get_device_state(&self, device_id: &str) -> BackendResult<DeviceReading>;
    /// Reads several devices; unknown ids are omitted.
    async fn get_device_states(&self, device_ids: &[String]) -> BackendResult<DeviceState>;

    /// Every member.
    async fn list_members(&self) -> BackendResult<Vec<Member>>;
    /// Registers a member.
    async fn add_member(&self, member: &NewMember) -> BackendResult<Member>;
    /// Applies a partial update.
    async fn update_member(&self, member_id: &str, patch: &MemberPatch) -> BackendResult<Member>;
    /// Removes a member.
    async fn delete_member(&self, member_id: &str) -> BackendResult<()>;

    /// Admin sign-in by email and PIN.
    async fn admin_login(&self, email: &str, pin: &str) -> BackendResult<AdminLogin>;
    /// Every user, admin view.
    async fn admin_list_users(&self, token: &str) -> BackendResult<Vec<Member>>;
    /// Creates a user, admin view.
    async fn admin_create_user(&self, token: &str, member: &NewMember) -> BackendResult<Member>;
    /// Updates a user, admin view.
    async fn admin_update_user(
        &self,
        token: &str,
        member_id: &str,
        patch: &MemberPatch,
    ) -> BackendResult<Member>;
    /// Deletes a user, admin view.
    async fn admin_delete_user(&self, token: &str, member_id: &str) -> BackendResult<()>;

    /// Identifies a member by biometric template.
    async fn authenticate_face(&self, template: &str) -> BackendResult<Member>;
    /// Identifies a member by PIN.
    async fn authenticate_pin(&self, pin: &str) -> BackendResult<Member>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn device_reading_accepts_bool_or_number() {
        let on: DeviceReading = serde_json::from_value(json!({
            "deviceId": "kitchen.light",
            "value": true,
            "recordedAt": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(on.value.is_on());
        assert!(on.recorded_at.is_some());

        let dim: DeviceReading =
            serde_json::from_value(json!({ "deviceId": "bedroom.fan", "value": 0 })).unwrap();
        assert_eq!(dim.value, DeviceValue::Level(0.0));
        assert!(!dim.value.is_on());
    }
}
