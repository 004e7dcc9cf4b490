#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Household access control: members, role-keyed policies, the authorizer,
//! and the admin session.

/// Error type shared by the access modules.
#[path = "../error.rs"]
pub mod error;

/// Fully-defaulted policy documents and their wire form.
#[path = "../policy.rs"]
pub mod policy;

/// Member records, registration and partial updates.
#[path = "../member.rs"]
pub mod member;

/// Allow/deny decisions for canonical actions.
#[path = "../authorizer.rs"]
pub mod authorizer;

/// Copy-on-write per-member policy snapshots.
#[path = "../store.rs"]
pub mod store;

/// Admin session with explicit load/save lifecycle.
#[path = "../session.rs"]
pub mod session;

pub use authorizer::{authorize, Decision, DenialReason};
pub use error::AccessError;
pub use member::{Member, MemberPatch, NewMember};
pub use policy::{Area, Capability, Policy, PolicyKey, RawPolicy, Role, SubCapability};
pub use session::{AdminSession, SessionStore};
pub use store::PolicyStore;
