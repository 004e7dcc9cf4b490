#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Hearth command interpretation: lexicon, normalization, entity extraction,
//! and resolution of free text into canonical household actions.

/// Canonical action model and entity ids.
#[path = "../action.rs"]
pub mod action;

/// Static phrase tables.
#[path = "../lexicon.rs"]
pub mod lexicon;

/// Text normalization shared by every extractor.
#[path = "../normalize.rs"]
pub mod normalize;

/// First-match-wins entity extraction.
#[path = "../extract.rs"]
pub mod extract;

/// Precedence-ordered resolution into an [`action::Action`].
#[path = "../resolver.rs"]
pub mod resolver;

/// Prelude exports for consumers of the interpreter.
pub mod prelude {
    pub use crate::action::{Action, ActionKind, Device, Door, Room, Switch};
    pub use crate::lexicon::ActionVerb;
    pub use crate::resolver::{resolve, CommandInterpreter, KeywordInterpreter};
}
