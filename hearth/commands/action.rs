use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of a canonical action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Switch a device on or off.
    #[serde(rename = "device.set")]
    DeviceSet,
    /// Lock one door.
    #[serde(rename = "door.lock")]
    DoorLock,
    /// Unlock one door.
    #[serde(rename = "door.unlock")]
    DoorUnlock,
    /// Lock every door.
    #[serde(rename = "door.lock_all")]
    DoorLockAll,
    /// Unlock every door.
    #[serde(rename = "door.unlock_all")]
    DoorUnlockAll,
    /// Nothing to execute (greeting, help, or unresolved input).
    #[serde(rename = "none")]
    Noop,
}

impl ActionKind {
    /// Wire label, e.g. `door.lock_all`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DeviceSet => "device.set",
            Self::DoorLock => "door.lock",
            Self::DoorUnlock => "door.unlock",
            Self::DoorLockAll => "door.lock_all",
            Self::DoorUnlockAll => "door.unlock_all",
            Self::Noop => "none",
        }
    }

    /// Whether the kind targets doors.
    #[must_use]
    pub const fn is_door(self) -> bool {
        matches!(
            self,
            Self::DoorLock | Self::DoorUnlock | Self::DoorLockAll | Self::DoorUnlockAll
        )
    }

    /// Whether the kind releases a lock.
    #[must_use]
    pub const fn is_unlock(self) -> bool {
        matches!(self, Self::DoorUnlock | Self::DoorUnlockAll)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure to parse an entity id.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {entity} '{value}'")]
pub struct ParseEntityError {
    /// Entity category (`room`, `door`, `device`).
    pub entity: &'static str,
    /// Rejected input.
    pub value: String,
}

/// Room a device lives in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Room {
    /// The main hall.
    #[serde(rename = "mainhall")]
    MainHall,
    /// The kitchen.
    Kitchen,
    /// The bedroom.
    Bedroom,
    /// The bathroom.
    Bathroom,
    /// Every room.
    All,
}

impl Room {
    /// Rooms that hold devices, in display order.
    pub const CONCRETE: [Self; 4] = [Self::MainHall, Self::Kitchen, Self::Bedroom, Self::Bathroom];

    /// Stable id.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::MainHall => "mainhall",
            Self::Kitchen => "kitchen",
            Self::Bedroom => "bedroom",
            Self::Bathroom => "bathroom",
            Self::All => "all",
        }
    }

    /// Name used in confirmations.
    #[must_use]
    pub const fn spoken(self) -> &'static str {
        match self {
            Self::MainHall => "main hall",
            Self::Kitchen => "kitchen",
            Self::Bedroom => "bedroom",
            Self::Bathroom => "bathroom",
            Self::All => "whole house",
        }
    }
}

impl FromStr for Room {
    type Err = ParseEntityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [Self::MainHall, Self::Kitchen, Self::Bedroom, Self::Bathroom, Self::All]
            .into_iter()
            .find(|room| room.id() == value)
            .ok_or_else(|| ParseEntityError {
                entity: "room",
                value: value.to_string(),
            })
    }
}

/// Door id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Door {
    /// The main (front) door, opening onto the main hall.
    #[serde(rename = "mainhall")]
    MainHall,
    /// Kitchen door.
    Kitchen,
    /// Bedroom door.
    Bedroom,
    /// Bathroom door.
    Bathroom,
    /// Garage door.
    Garage,
    /// Every door.
    All,
}

impl Door {
    /// Physical doors, in display order.
    pub const CONCRETE: [Self; 5] = [
        Self::MainHall,
        Self::Kitchen,
        Self::Bedroom,
        Self::Bathroom,
        Self::Garage,
    ];

    /// Stable id.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::MainHall => "mainhall",
            Self::Kitchen => "kitchen",
            Self::Bedroom => "bedroom",
            Self::Bathroom => "bathroom",
            Self::Garage => "garage",
            Self::All => "all",
        }
    }

    /// Name used in confirmations.
    #[must_use]
    pub const fn spoken(self) -> &'static str {
        match self {
            Self::MainHall => "main",
            Self::Kitchen => "kitchen",
            Self::Bedroom => "bedroom",
            Self::Bathroom => "bathroom",
            Self::Garage => "garage",
            Self::All => "every",
        }
    }
}

impl FromStr for Door {
    type Err = ParseEntityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::CONCRETE
            .into_iter()
            .chain([Self::All])
            .find(|door| door.id() == value)
            .ok_or_else(|| ParseEntityError {
                entity: "door",
                value: value.to_string(),
            })
    }
}

/// Device kind, including the disambiguated light variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Device {
    /// Room light.
    Light,
    /// Light variant A.
    LightA,
    /// Light variant B.
    LightB,
    /// Fan.
    Fan,
    /// Air conditioner.
    Ac,
    /// Television.
    Tv,
}

impl Device {
    /// Stable id.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::LightA => "light-a",
            Self::LightB => "light-b",
            Self::Fan => "fan",
            Self::Ac => "ac",
            Self::Tv => "tv",
        }
    }

    /// Singular noun.
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::LightA => "light A",
            Self::LightB => "light B",
            Self::Fan => "fan",
            Self::Ac => "AC",
            Self::Tv => "TV",
        }
    }

    /// Plural noun, used for the `all` room.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Light => "lights",
            Self::LightA => "A lights",
            Self::LightB => "B lights",
            Self::Fan => "fans",
            Self::Ac => "ACs",
            Self::Tv => "TVs",
        }
    }

    /// Key addressing this device in one room (`kitchen.light`).
    #[must_use]
    pub fn key_in(self, room: Room) -> String {
        format!("{}.{}", room.id(), self.id())
    }
}

impl FromStr for Device {
    type Err = ParseEntityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [
            Self::Light,
            Self::LightA,
            Self::LightB,
            Self::Fan,
            Self::Ac,
            Self::Tv,
        ]
        .into_iter()
        .find(|device| device.id() == value)
        .ok_or_else(|| ParseEntityError {
            entity: "device",
            value: value.to_string(),
        })
    }
}

/// Target value of a device action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Switch {
    /// Powered on.
    On,
    /// Powered off.
    Off,
}

impl Switch {
    /// `true` for on.
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    /// Lowercase label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

/// Canonical, fully-resolved instruction.
///
/// Built only through the constructors below, which keep the field invariants:
/// `device.set` carries a device and a value, single-door kinds carry a door,
/// and `none` carries no entity at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    /// What to do.
    pub kind: ActionKind,
    /// Target room for device actions (`all` for every room).
    pub room: Option<Room>,
    /// Target device for device actions.
    pub device: Option<Device>,
    /// Target door for single-door actions.
    pub door: Option<Door>,
    /// Target value for device actions.
    pub value: Option<Switch>,
    /// Human-readable confirmation.
    pub confirmation: String,
    /// Whether a real action was derived.
    pub success: bool,
}

impl Action {
    /// A no-op carrying a message.
    #[must_use]
    pub fn none(confirmation: impl Into<String>, success: bool) -> Self {
        Self {
            kind: ActionKind::Noop,
            room: None,
            device: None,
            door: None,
            value: None,
            confirmation: confirmation.into(),
            success,
        }
    }

    /// Switches `device` in `room`.
    #[must_use]
    pub fn device_set(device: Device, room: Room, value: Switch) -> Self {
        let confirmation = if room == Room::All {
            format!("Turning {} all {}.", value.label(), device.plural())
        } else {
            format!(
                "Turning {} the {} {}.",
                value.label(),
                room.spoken(),
                device.noun()
            )
        };
        Self {
            kind: ActionKind::DeviceSet,
            room: Some(room),
            device: Some(device),
            door: None,
            value: Some(value),
            confirmation,
            success: true,
        }
    }

    /// Locks or unlocks `door`; [`Door::All`] becomes the matching blanket kind.
    #[must_use]
    pub fn door(door: Door, lock: bool) -> Self {
        let verb = if lock { "Locking" } else { "Unlocking" };
        let (kind, door, confirmation) = match (door, lock) {
            (Door::All, true) => (ActionKind::DoorLockAll, None, format!("{verb} all doors.")),
            (Door::All, false) => (ActionKind::DoorUnlockAll, None, format!("{verb} all doors.")),
            (door, true) => (
                ActionKind::DoorLock,
                Some(door),
                format!("{verb} the {} door.", door.spoken()),
            ),
            (door, false) => (
                ActionKind::DoorUnlock,
                Some(door),
                format!("{verb} the {} door.", door.spoken()),
            ),
        };
        Self {
            kind,
            room: None,
            device: None,
            door,
            value: None,
            confirmation,
            success: true,
        }
    }

    /// Whether executing the action changes anything.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self.kind, ActionKind::Noop)
    }

    /// Short description of the target, e.g. `door:kitchen` or `device:all.light`.
    #[must_use]
    pub fn target(&self) -> String {
        match (self.kind, self.door, self.device) {
            (ActionKind::DoorLockAll | ActionKind::DoorUnlockAll, _, _) => "door:all".into(),
            (_, Some(door), _) => format!("door:{}", door.id()),
            (_, _, Some(device)) => {
                format!("device:{}", device.key_in(self.room.unwrap_or(Room::MainHall)))
            }
            _ => "none".into(),
        }
    }
}
