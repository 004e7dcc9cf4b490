use std::fmt;

use hearth_commands::action::{Action, ActionKind, Device, Door, Room};
use serde::{Deserialize, Serialize};

use crate::policy::{Area, Capability, Policy, SubCapability};

/// Why an action was refused.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DenialReason {
    /// A coarse capability gate is off.
    CapabilityDenied,
    /// The area gate for the target is off.
    AreaDenied,
    /// The device kind has no per-area gate.
    UnsupportedDeviceArea,
}

impl DenialReason {
    /// Kebab-case label shown to the user.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CapabilityDenied => "capability-denied",
            Self::AreaDenied => "area-denied",
            Self::UnsupportedDeviceArea => "unsupported-device-area",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Decision {
    /// Whether the action may run.
    pub allowed: bool,
    /// Set when denied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

impl Decision {
    /// Allow.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// Deny with a reason.
    #[must_use]
    pub const fn deny(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Area holding the devices of a room.
#[must_use]
pub const fn area_for_room(room: Room) -> Option<Area> {
    match room {
        Room::MainHall => Some(Area::Hall),
        Room::Kitchen => Some(Area::Kitchen),
        Room::Bedroom => Some(Area::Bedroom),
        Room::Bathroom => Some(Area::Bathroom),
        Room::All => None,
    }
}

/// Area whose `door` gate covers a door.
#[must_use]
pub const fn area_for_door(door: Door) -> Option<Area> {
    match door {
        Door::MainHall => Some(Area::Main),
        Door::Kitchen => Some(Area::Kitchen),
        Door::Bedroom => Some(Area::Bedroom),
        Door::Bathroom => Some(Area::Bathroom),
        Door::Garage | Door::All => None,
    }
}

/// Per-area gate governing a device kind.
#[must_use]
pub const fn sub_capability_for(device: Device) -> Option<SubCapability> {
    match device {
        Device::Light | Device::LightA | Device::LightB => Some(SubCapability::Light),
        Device::Fan | Device::Ac => Some(SubCapability::Ac),
        Device::Tv => None,
    }
}

/// Decides whether `policy` permits `action`. Pure: same inputs, same decision.
#[must_use]
pub fn authorize(policy: &Policy, action: &Action) -> Decision {
    match action.kind {
        ActionKind::Noop => Decision::allow(),
        kind if kind.is_door() => authorize_door(policy, action),
        _ => authorize_device(policy, action),
    }
}

fn authorize_door(policy: &Policy, action: &Action) -> Decision {
    let controls = &policy.controls;
    if !controls.get(Capability::Doors)
        || (action.kind.is_unlock() && !controls.get(Capability::UnlockDoors))
    {
        return Decision::deny(DenialReason::CapabilityDenied);
    }
    // Blanket kinds carry no door and are gated by the coarse controls only.
    let area = action.door.and_then(area_for_door);
    match area {
        Some(area) if !policy.areas.get(area).get(SubCapability::Door) => {
            Decision::deny(DenialReason::AreaDenied)
        }
        _ => Decision::allow(),
    }
}

fn authorize_device(policy: &Policy, action: &Action) -> Decision {
    if !policy.controls.get(Capability::Devices) {
        return Decision::deny(DenialReason::CapabilityDenied);
    }
    let Some(area) = action.room.and_then(area_for_room) else {
        return Decision::allow();
    };
    let Some(sub) = action.device.and_then(sub_capability_for) else {
        return Decision::deny(DenialReason::UnsupportedDeviceArea);
    };
    if policy.areas.get(area).get(sub) {
        Decision::allow()
    } else {
        Decision::deny(DenialReason::AreaDenied)
    }
}
