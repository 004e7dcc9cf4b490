use crate::{
    action::{Device, Door, Room},
    lexicon::{
        ActionVerb, PhraseTable, ACTION_KEYWORDS, DEVICE_KEYWORDS, DOOR_KEYWORDS,
        LIGHT_VARIANT_MARKERS, ROOM_KEYWORDS,
    },
    normalize::normalize,
};

/// Returns the first key, in declaration order, with a phrase contained in `text`.
///
/// `text` must already be normalized. This is a greedy substring scan: a short
/// phrase nested in a longer word still matches.
#[must_use]
pub fn first_match<K: Copy>(text: &str, table: PhraseTable<K>) -> Option<K> {
    table
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|phrase| text.contains(phrase)))
        .map(|(key, _)| *key)
}

/// Whether any phrase occurs in the already-normalized `text`.
#[must_use]
pub fn mentions(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| text.contains(phrase))
}

/// First action verb in `text`.
#[must_use]
pub fn extract_action(text: &str) -> Option<ActionVerb> {
    first_match(&normalize(text), ACTION_KEYWORDS)
}

/// First action verb in `text`, considering only `allowed` verbs.
#[must_use]
pub fn extract_action_among(text: &str, allowed: &[ActionVerb]) -> Option<ActionVerb> {
    let text = normalize(text);
    ACTION_KEYWORDS
        .iter()
        .filter(|(verb, _)| allowed.contains(verb))
        .find(|(_, phrases)| mentions(&text, phrases))
        .map(|(verb, _)| *verb)
}

/// First device kind in `text`.
#[must_use]
pub fn extract_device(text: &str) -> Option<Device> {
    first_match(&normalize(text), DEVICE_KEYWORDS)
}

/// First room in `text`.
#[must_use]
pub fn extract_room(text: &str) -> Option<Room> {
    first_match(&normalize(text), ROOM_KEYWORDS)
}

/// First door in `text`.
#[must_use]
pub fn extract_door(text: &str) -> Option<Door> {
    first_match(&normalize(text), DOOR_KEYWORDS)
}

/// Light variant named in `text` ("light a", "light b").
///
/// The marker must end at a word boundary so "light bulb" is not read as light B.
#[must_use]
pub fn extract_light_variant(text: &str) -> Option<Device> {
    let text = normalize(text);
    LIGHT_VARIANT_MARKERS
        .iter()
        .find(|(_, marker)| {
            text.match_indices(marker).any(|(at, _)| {
                text[at + marker.len()..]
                    .chars()
                    .next()
                    .map_or(true, |next| !next.is_alphanumeric())
            })
        })
        .map(|(device, _)| *device)
}
