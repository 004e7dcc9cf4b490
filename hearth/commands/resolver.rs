use crate::{
    action::{Action, Switch},
    extract::{extract_action_among, extract_light_variant, first_match, mentions},
    lexicon::{
        ActionVerb, CLARIFY_REPLY, DEFAULT_DOOR, DEFAULT_ROOM, DEVICE_KEYWORDS, DOOR_KEYWORDS,
        DOOR_VOCABULARY, GREETING_PHRASES, GREETING_REPLY, GREETING_WORDS, HELP_PHRASES,
        HELP_REPLY, ROOM_KEYWORDS,
    },
    normalize::normalize,
};

const DOOR_VERBS: [ActionVerb; 2] = [ActionVerb::Unlock, ActionVerb::Lock];
const DEVICE_VERBS: [ActionVerb; 2] = [ActionVerb::On, ActionVerb::Off];

/// Turns free text into a canonical [`Action`].
pub trait CommandInterpreter: Send + Sync {
    /// Interprets one utterance. Never fails; unresolvable input maps to a `none` action.
    fn interpret(&self, text: &str) -> Action;
}

/// Deterministic keyword interpreter backed by the static lexicon.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordInterpreter;

impl CommandInterpreter for KeywordInterpreter {
    fn interpret(&self, text: &str) -> Action {
        resolve(text)
    }
}

/// Resolves an utterance.
///
/// Precedence: greeting, help, door commands, device commands (with the
/// "light a"/"light b" variants overriding the plain device match), then a
/// clarification fallback.
#[must_use]
pub fn resolve(text: &str) -> Action {
    let text = normalize(text);

    if GREETING_WORDS.contains(&text.as_str()) || mentions(&text, GREETING_PHRASES) {
        return Action::none(GREETING_REPLY, true);
    }
    if mentions(&text, HELP_PHRASES) {
        return Action::none(HELP_REPLY, true);
    }

    if mentions(&text, DOOR_VOCABULARY) {
        if let Some(verb) = extract_action_among(&text, &DOOR_VERBS) {
            let door = first_match(&text, DOOR_KEYWORDS).unwrap_or(DEFAULT_DOOR);
            return Action::door(door, verb == ActionVerb::Lock);
        }
        // "door" without lock/unlock vocabulary is not a door command.
    }

    let switch = extract_action_among(&text, &DEVICE_VERBS).map(|verb| match verb {
        ActionVerb::On => Switch::On,
        _ => Switch::Off,
    });

    if let Some(value) = switch {
        if let Some(variant) = extract_light_variant(&text) {
            return Action::device_set(variant, DEFAULT_ROOM, value);
        }
        if let Some(device) = first_match(&text, DEVICE_KEYWORDS) {
            let room = first_match(&text, ROOM_KEYWORDS).unwrap_or(DEFAULT_ROOM);
            return Action::device_set(device, room, value);
        }
    }

    Action::none(CLARIFY_REPLY, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        action::{ActionKind, Device, Door, Room},
        lexicon::ACTION_KEYWORDS,
    };

    #[test]
    fn resolves_specific_door_lock() {
        let action = resolve("lock the kitchen door");
        assert_eq!(action.kind, ActionKind::DoorLock);
        assert_eq!(action.door, Some(Door::Kitchen));
        assert_eq!(action.confirmation, "Locking the kitchen door.");
    }

    #[test]
    fn resolves_blanket_unlock() {
        let action = resolve("Unlock all doors");
        assert_eq!(action.kind, ActionKind::DoorUnlockAll);
        assert_eq!(action.door, None);
        assert_eq!(action.target(), "door:all");
    }

    #[test]
    fn door_defaults_to_main_hall() {
        let action = resolve("please lock the door");
        assert_eq!(action.kind, ActionKind::DoorLock);
        assert_eq!(action.door, Some(Door::MainHall));
    }

    #[test]
    fn door_without_verb_falls_through() {
        let action = resolve("is the kitchen door okay");
        assert_eq!(action.kind, ActionKind::Noop);
        assert!(!action.success);

        // Door vocabulary with a device verb is still a device command.
        let action = resolve("turn on the light by the door");
        assert_eq!(action.kind, ActionKind::DeviceSet);
    }

    #[test]
    fn resolves_all_lights() {
        let action = resolve("turn on all lights");
        assert_eq!(action.kind, ActionKind::DeviceSet);
        assert_eq!(action.room, Some(Room::All));
        assert_eq!(action.device, Some(Device::Light));
        assert_eq!(action.value, Some(Switch::On));
        assert_eq!(action.confirmation, "Turning on all lights.");
    }

    #[test]
    fn device_room_defaults_to_main_hall() {
        let action = resolve("switch off the fan");
        assert_eq!(action.room, Some(Room::MainHall));
        assert_eq!(action.value, Some(Switch::Off));
        assert_eq!(action.confirmation, "Turning off the main hall fan.");
    }

    #[test]
    fn light_variant_overrides_plain_light() {
        let action = resolve("turn off light b in the kitchen");
        assert_eq!(action.device, Some(Device::LightB));
        assert_eq!(action.room, Some(Room::MainHall));
        assert_eq!(action.value, Some(Switch::Off));
    }

    #[test]
    fn greeting_and_help_are_noops() {
        let hello = resolve("Hello there");
        assert_eq!(hello.kind, ActionKind::Noop);
        assert!(hello.success);
        assert_eq!(resolve("hi").confirmation, GREETING_REPLY);
        assert_eq!(resolve("what can you do?").confirmation, HELP_REPLY);
    }

    #[test]
    fn nonsense_asks_for_clarification() {
        let action = resolve("xyz nonsense");
        assert_eq!(action.kind, ActionKind::Noop);
        assert!(!action.success);
        assert_eq!(action.confirmation, CLARIFY_REPLY);
    }

    #[test]
    fn any_on_phrase_with_any_device_phrase_switches_on() {
        let on_phrases = ACTION_KEYWORDS
            .iter()
            .find(|(verb, _)| *verb == ActionVerb::On)
            .map(|(_, phrases)| *phrases)
            .unwrap();
        for on in on_phrases {
            for (_, devices) in DEVICE_KEYWORDS {
                for device in *devices {
                    let text = format!("{on} the {device}");
                    let action = resolve(&text);
                    assert_eq!(action.kind, ActionKind::DeviceSet, "{text}");
                    assert_eq!(action.value, Some(Switch::On), "{text}");
                }
            }
        }
    }

    #[test]
    fn interpreter_trait_delegates() {
        let interpreter = KeywordInterpreter;
        assert_eq!(
            interpreter.interpret("lock the garage door").door,
            Some(Door::Garage)
        );
    }
}
