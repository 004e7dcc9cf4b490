use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::AccessError;

/// Household role. Drives the default policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Household administrator.
    Admin,
    /// Parent or guardian.
    Parent,
    /// Adult member.
    Member,
    /// Child.
    Child,
}

impl Default for Role {
    fn default() -> Self {
        Self::Member
    }
}

impl Role {
    /// Lowercase label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Parent => "parent",
            Self::Member => "member",
            Self::Child => "child",
        }
    }
}

impl FromStr for Role {
    type Err = AccessError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "parent" => Ok(Self::Parent),
            "member" => Ok(Self::Member),
            "child" => Ok(Self::Child),
            other => Err(AccessError::InvalidMember(format!("unknown role '{other}'"))),
        }
    }
}

/// Coarse capability gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    /// Switch devices.
    Devices,
    /// Operate doors at all.
    Doors,
    /// Unlock doors.
    UnlockDoors,
    /// Issue voice/text commands.
    Voice,
    /// Power management.
    Power,
}

impl Capability {
    /// Every capability, in wire order.
    pub const ALL: [Self; 5] = [
        Self::Devices,
        Self::Doors,
        Self::UnlockDoors,
        Self::Voice,
        Self::Power,
    ];

    /// Wire key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Devices => "devices",
            Self::Doors => "doors",
            Self::UnlockDoors => "unlockDoors",
            Self::Voice => "voice",
            Self::Power => "power",
        }
    }
}

/// Physical area with its own fine-grained gates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    /// Main hall.
    Hall,
    /// Kitchen.
    Kitchen,
    /// Bedroom.
    Bedroom,
    /// Bathroom.
    Bathroom,
    /// Main entrance.
    Main,
}

impl Area {
    /// Every area, in wire order.
    pub const ALL: [Self; 5] = [
        Self::Hall,
        Self::Kitchen,
        Self::Bedroom,
        Self::Bathroom,
        Self::Main,
    ];

    /// Wire key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Hall => "hall",
            Self::Kitchen => "kitchen",
            Self::Bedroom => "bedroom",
            Self::Bathroom => "bathroom",
            Self::Main => "main",
        }
    }
}

/// Per-area sub-capability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SubCapability {
    /// Lights.
    Light,
    /// Climate (fans and AC).
    Ac,
    /// The area's door.
    Door,
}

impl SubCapability {
    /// Every sub-capability, in wire order.
    pub const ALL: [Self; 3] = [Self::Light, Self::Ac, Self::Door];

    /// Wire key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Ac => "ac",
            Self::Door => "door",
        }
    }
}

/// Coarse capability gates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    /// Switch devices.
    pub devices: bool,
    /// Operate doors.
    pub doors: bool,
    /// Unlock doors.
    pub unlock_doors: bool,
    /// Issue voice/text commands.
    pub voice: bool,
    /// Power management.
    pub power: bool,
}

impl Controls {
    /// Reads one gate.
    #[must_use]
    pub const fn get(&self, capability: Capability) -> bool {
        match capability {
            Capability::Devices => self.devices,
            Capability::Doors => self.doors,
            Capability::UnlockDoors => self.unlock_doors,
            Capability::Voice => self.voice,
            Capability::Power => self.power,
        }
    }

    fn set(&mut self, capability: Capability, value: bool) {
        match capability {
            Capability::Devices => self.devices = value,
            Capability::Doors => self.doors = value,
            Capability::UnlockDoors => self.unlock_doors = value,
            Capability::Voice => self.voice = value,
            Capability::Power => self.power = value,
        }
    }
}

/// Fine-grained gates of one area.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AreaPolicy {
    /// Lights.
    pub light: bool,
    /// Fans and AC.
    pub ac: bool,
    /// Door.
    pub door: bool,
}

impl AreaPolicy {
    const fn uniform(light: bool, ac: bool, door: bool) -> Self {
        Self { light, ac, door }
    }

    /// Reads one gate.
    #[must_use]
    pub const fn get(&self, sub: SubCapability) -> bool {
        match sub {
            SubCapability::Light => self.light,
            SubCapability::Ac => self.ac,
            SubCapability::Door => self.door,
        }
    }

    fn set(&mut self, sub: SubCapability, value: bool) {
        match sub {
            SubCapability::Light => self.light = value,
            SubCapability::Ac => self.ac = value,
            SubCapability::Door => self.door = value,
        }
    }
}

/// Fine-grained gates for every area. Every area is always present.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Areas {
    /// Main hall.
    pub hall: AreaPolicy,
    /// Kitchen.
    pub kitchen: AreaPolicy,
    /// Bedroom.
    pub bedroom: AreaPolicy,
    /// Bathroom.
    pub bathroom: AreaPolicy,
    /// Main entrance.
    pub main: AreaPolicy,
}

impl Areas {
    const fn uniform(area: AreaPolicy) -> Self {
        Self {
            hall: area,
            kitchen: area,
            bedroom: area,
            bathroom: area,
            main: area,
        }
    }

    /// Gates of one area.
    #[must_use]
    pub const fn get(&self, area: Area) -> &AreaPolicy {
        match area {
            Area::Hall => &self.hall,
            Area::Kitchen => &self.kitchen,
            Area::Bedroom => &self.bedroom,
            Area::Bathroom => &self.bathroom,
            Area::Main => &self.main,
        }
    }

    fn get_mut(&mut self, area: Area) -> &mut AreaPolicy {
        match area {
            Area::Hall => &mut self.hall,
            Area::Kitchen => &mut self.kitchen,
            Area::Bedroom => &mut self.bedroom,
            Area::Bathroom => &mut self.bathroom,
            Area::Main => &mut self.main,
        }
    }
}

/// Address of a single boolean in a [`Policy`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PolicyKey {
    /// `controls.<capability>`.
    Control(Capability),
    /// `areas.<area>.<sub>`.
    Area(Area, SubCapability),
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control(capability) => write!(f, "controls.{}", capability.key()),
            Self::Area(area, sub) => write!(f, "areas.{}.{}", area.key(), sub.key()),
        }
    }
}

impl FromStr for PolicyKey {
    type Err = AccessError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || AccessError::InvalidPolicyKey(value.to_string());
        let parts: Vec<&str> = value.split('.').collect();
        match parts.as_slice() {
            ["controls", key] => Capability::ALL
                .into_iter()
                .find(|capability| capability.key() == *key)
                .map(Self::Control)
                .ok_or_else(invalid),
            ["areas", area, sub] => {
                let area = Area::ALL.into_iter().find(|a| a.key() == *area);
                let sub = SubCapability::ALL.into_iter().find(|s| s.key() == *sub);
                area.zip(sub)
                    .map(|(area, sub)| Self::Area(area, sub))
                    .ok_or_else(invalid)
            }
            _ => Err(invalid()),
        }
    }
}

/// Fully populated authorization document of one member.
///
/// Values are immutable: every edit returns a new policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Policy {
    /// Coarse capability gates.
    pub controls: Controls,
    /// Per-area gates.
    pub areas: Areas,
}

impl Policy {
    /// Default policy for a role.
    ///
    /// Coarse controls depend on the role. Area gates start closed for every
    /// role and are granted one by one, so an unset area key always reads
    /// `false`.
    #[must_use]
    pub const fn default_for_role(role: Role) -> Self {
        let areas = Areas::uniform(AreaPolicy::uniform(false, false, false));
        match role {
            Role::Admin | Role::Parent => Self {
                controls: Controls {
                    devices: true,
                    doors: true,
                    unlock_doors: true,
                    voice: true,
                    power: true,
                },
                areas,
            },
            Role::Member => Self {
                controls: Controls {
                    devices: true,
                    doors: true,
                    unlock_doors: false,
                    voice: true,
                    power: false,
                },
                areas,
            },
            Role::Child => Self {
                controls: Controls {
                    devices: true,
                    doors: false,
                    unlock_doors: false,
                    voice: true,
                    power: false,
                },
                areas,
            },
        }
    }

    /// Every gate open. Given to the household owner seeded on first start.
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self {
            controls: Controls {
                devices: true,
                doors: true,
                unlock_doors: true,
                voice: true,
                power: true,
            },
            areas: Areas::uniform(AreaPolicy::uniform(true, true, true)),
        }
    }

    /// Fills every key absent from `raw` with the role default.
    #[must_use]
    pub fn materialize(role: Role, raw: &RawPolicy) -> Self {
        Self::default_for_role(role).merged(raw)
    }

    /// Reads one gate.
    #[must_use]
    pub const fn get(&self, key: PolicyKey) -> bool {
        match key {
            PolicyKey::Control(capability) => self.controls.get(capability),
            PolicyKey::Area(area, sub) => self.areas.get(area).get(sub),
        }
    }

    /// Returns a copy with one gate set.
    #[must_use]
    pub fn with(&self, key: PolicyKey, value: bool) -> Self {
        let mut next = *self;
        match key {
            PolicyKey::Control(capability) => next.controls.set(capability, value),
            PolicyKey::Area(area, sub) => next.areas.get_mut(area).set(sub, value),
        }
        next
    }

    /// Returns a copy with one gate flipped.
    #[must_use]
    pub fn toggled(&self, key: PolicyKey) -> Self {
        self.with(key, !self.get(key))
    }

    /// Returns a copy with every key present in `patch` applied.
    #[must_use]
    pub fn merged(&self, patch: &RawPolicy) -> Self {
        let mut next = *self;
        for capability in Capability::ALL {
            if let Some(value) = patch.controls.get(capability) {
                next.controls.set(capability, value);
            }
        }
        for area in Area::ALL {
            if let Some(raw) = patch.areas.get(area) {
                for sub in SubCapability::ALL {
                    if let Some(value) = raw.get(sub) {
                        next.areas.get_mut(area).set(sub, value);
                    }
                }
            }
        }
        next
    }
}

/// Wire form of a policy in which any key may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawPolicy {
    /// Coarse gates.
    #[serde(default)]
    pub controls: RawControls,
    /// Per-area gates.
    #[serde(default)]
    pub areas: RawAreas,
}

impl RawPolicy {
    /// A patch setting exactly one key.
    #[must_use]
    pub fn single(key: PolicyKey, value: bool) -> Self {
        let mut raw = Self::default();
        match key {
            PolicyKey::Control(capability) => raw.controls.set(capability, value),
            PolicyKey::Area(area, sub) => {
                raw.areas.get_mut(area).get_or_insert_with(RawAreaPolicy::default).set(sub, value);
            }
        }
        raw
    }
}

/// Coarse gates, each optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawControls {
    /// Switch devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<bool>,
    /// Operate doors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doors: Option<bool>,
    /// Unlock doors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock_doors: Option<bool>,
    /// Voice commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<bool>,
    /// Power management.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<bool>,
}

impl RawControls {
    const fn get(&self, capability: Capability) -> Option<bool> {
        match capability {
            Capability::Devices => self.devices,
            Capability::Doors => self.doors,
            Capability::UnlockDoors => self.unlock_doors,
            Capability::Voice => self.voice,
            Capability::Power => self.power,
        }
    }

    fn set(&mut self, capability: Capability, value: bool) {
        let slot = match capability {
            Capability::Devices => &mut self.devices,
            Capability::Doors => &mut self.doors,
            Capability::UnlockDoors => &mut self.unlock_doors,
            Capability::Voice => &mut self.voice,
            Capability::Power => &mut self.power,
        };
        *slot = Some(value);
    }
}

/// Per-area gates, each area optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawAreas {
    /// Main hall.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hall: Option<RawAreaPolicy>,
    /// Kitchen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kitchen: Option<RawAreaPolicy>,
    /// Bedroom.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedroom: Option<RawAreaPolicy>,
    /// Bathroom.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathroom: Option<RawAreaPolicy>,
    /// Main entrance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<RawAreaPolicy>,
}

impl RawAreas {
    const fn get(&self, area: Area) -> Option<&RawAreaPolicy> {
        match area {
            Area::Hall => self.hall.as_ref(),
            Area::Kitchen => self.kitchen.as_ref(),
            Area::Bedroom => self.bedroom.as_ref(),
            Area::Bathroom => self.bathroom.as_ref(),
            Area::Main => self.main.as_ref(),
        }
    }

    fn get_mut(&mut self, area: Area) -> &mut Option<RawAreaPolicy> {
        match area {
            Area::Hall => &mut self.hall,
            Area::Kitchen => &mut self.kitchen,
            Area::Bedroom => &mut self.bedroom,
            Area::Bathroom => &mut self.bathroom,
            Area::Main => &mut self.main,
        }
    }
}

/// Gates of one area, each optional.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawAreaPolicy {
    /// Lights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<bool>,
    /// Fans and AC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ac: Option<bool>,
    /// Door.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door: Option<bool>,
}

impl RawAreaPolicy {
    const fn get(&self, sub: SubCapability) -> Option<bool> {
        match sub {
            SubCapability::Light => self.light,
            SubCapability::Ac => self.ac,
            SubCapability::Door => self.door,
        }
    }

    fn set(&mut self, sub: SubCapability, value: bool) {
        match sub {
            SubCapability::Light => self.light = Some(value),
            SubCapability::Ac => self.ac = Some(value),
            SubCapability::Door => self.door = Some(value),
        }
    }
}
