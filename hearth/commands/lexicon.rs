use serde::{Deserialize, Serialize};

use crate::action::{Device, Door, Room};

/// Ordered mapping of canonical keys to matching phrases.
///
/// Order is significant: extractors return the first key whose phrase list
/// matches, so more specific keys must be declared before broader ones.
pub type PhraseTable<K> = &'static [(K, &'static [&'static str])];

/// Verb recognised in a command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActionVerb {
    /// Power a device on.
    On,
    /// Power a device off.
    Off,
    /// Release a lock.
    Unlock,
    /// Engage a lock.
    Lock,
}

/// Verbs in declaration order. `unlock` precedes `lock` because it contains it.
pub const ACTION_KEYWORDS: PhraseTable<ActionVerb> = &[
    (
        ActionVerb::On,
        &["turn on", "switch on", "power on", "start", "enable"],
    ),
    (
        ActionVerb::Off,
        &[
            "turn off",
            "switch off",
            "power off",
            "shut off",
            "shut down",
            "stop",
            "disable",
        ],
    ),
    (ActionVerb::Unlock, &["unlock", "open"]),
    (ActionVerb::Lock, &["lock", "close", "secure"]),
];

/// Device kinds. Light variants are matched by [`LIGHT_VARIANT_MARKERS`] instead.
pub const DEVICE_KEYWORDS: PhraseTable<Device> = &[
    (Device::Light, &["light", "lights", "lamp", "bulb"]),
    (Device::Fan, &["ceiling fan", "fan"]),
    (Device::Ac, &["air conditioner", "aircon", "a/c", "ac"]),
    (Device::Tv, &["television", "tv"]),
];

/// Rooms. `all` is last so that "hall" wins over the "all" it contains.
pub const ROOM_KEYWORDS: PhraseTable<Room> = &[
    (
        Room::MainHall,
        &["main hall", "mainhall", "living room", "lounge", "hall"],
    ),
    (Room::Kitchen, &["kitchen"]),
    (Room::Bedroom, &["bedroom", "bed room"]),
    (Room::Bathroom, &["bathroom", "bath room", "washroom"]),
    (Room::All, &["all", "every", "whole house", "everywhere"]),
];

/// Doors. The blanket phrases are explicit multi-word forms and come first.
pub const DOOR_KEYWORDS: PhraseTable<Door> = &[
    (
        Door::All,
        &["all doors", "all the doors", "every door", "all locks"],
    ),
    (
        Door::MainHall,
        &[
            "main door",
            "front door",
            "main hall",
            "mainhall",
            "main",
            "front",
            "entrance",
        ],
    ),
    (Door::Kitchen, &["kitchen"]),
    (Door::Bedroom, &["bedroom"]),
    (Door::Bathroom, &["bathroom"]),
    (Door::Garage, &["garage"]),
];

/// Vocabulary that routes a command to the door branch.
pub const DOOR_VOCABULARY: &[&str] = &["door", "lock", "gate"];

/// Greeting phrases matched as substrings.
pub const GREETING_PHRASES: &[&str] = &[
    "hello",
    "hi there",
    "hey there",
    "good morning",
    "good afternoon",
    "good evening",
];

/// Greetings too short to match as substrings; they must be the whole input.
pub const GREETING_WORDS: &[&str] = &["hi", "hey"];

/// Help phrases.
pub const HELP_PHRASES: &[&str] = &["help", "what can you do", "what can i say", "commands"];

/// Markers selecting a light variant.
pub const LIGHT_VARIANT_MARKERS: &[(Device, &str)] =
    &[(Device::LightA, "light a"), (Device::LightB, "light b")];

/// Room used when a device command names none.
pub const DEFAULT_ROOM: Room = Room::MainHall;

/// Door used when a door command names none.
pub const DEFAULT_DOOR: Door = Door::MainHall;

/// Reply to greetings.
pub const GREETING_REPLY: &str = "Hello! How can I help around the house?";

/// Reply to help requests.
pub const HELP_REPLY: &str = "I can switch lights, fans, the AC and the TV on or off in the main hall, kitchen, bedroom and bathroom, and lock or unlock any door or all doors at once.";

/// Reply when nothing could be resolved.
pub const CLARIFY_REPLY: &str =
    "Sorry, I didn't get that. Try \"turn on kitchen lights\" or \"lock the main door\".";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_is_non_empty() {
        assert!(ACTION_KEYWORDS.iter().all(|(_, p)| !p.is_empty()));
        assert!(DEVICE_KEYWORDS.iter().all(|(_, p)| !p.is_empty()));
        assert!(ROOM_KEYWORDS.iter().all(|(_, p)| !p.is_empty()));
        assert!(DOOR_KEYWORDS.iter().all(|(_, p)| !p.is_empty()));
    }

    #[test]
    fn phrases_are_already_normalized() {
        let all = ACTION_KEYWORDS
            .iter()
            .flat_map(|(_, p)| p.iter())
            .chain(DEVICE_KEYWORDS.iter().flat_map(|(_, p)| p.iter()))
            .chain(ROOM_KEYWORDS.iter().flat_map(|(_, p)| p.iter()))
            .chain(DOOR_KEYWORDS.iter().flat_map(|(_, p)| p.iter()));
        for phrase in all {
            assert_eq!(*phrase, phrase.trim().to_lowercase());
        }
    }
}
