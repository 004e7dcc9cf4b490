#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Hearth runtime: the command pipeline from utterance to logged execution,
//! family management, configuration, and the activity history.

/// Pipeline and family-management errors.
#[path = "../error.rs"]
pub mod error;

/// Append-only activity history.
#[path = "../activity.rs"]
pub mod activity;

/// Carrying authorized actions out on a backend.
#[path = "../executor.rs"]
pub mod executor;

/// Resolve, authorize, execute, log.
#[path = "../pipeline.rs"]
pub mod pipeline;

/// Members, policies, admin users and sign-in.
#[path = "../family.rs"]
pub mod family;

/// TOML configuration with environment overrides.
#[path = "../config.rs"]
pub mod config;

/// Wiring of every component from a configuration.
#[path = "../app.rs"]
pub mod app;

pub use activity::{ActivityEvent, ActivityLog};
pub use app::Hearth;
pub use config::HearthConfig;
pub use error::CommandError;
pub use executor::{execute, Execution};
pub use family::FamilyManager;
pub use pipeline::{CommandPipeline, CommandPipelineBuilder, MountGuard, Outcome};

/// Prelude exports for runtime consumers.
pub mod prelude {
    pub use crate::app::Hearth;
    pub use crate::config::HearthConfig;
    pub use crate::error::CommandError;
    pub use crate::pipeline::{CommandPipeline, MountGuard, Outcome};
    pub use hearth_access::{Member, NewMember, PolicyKey, Role};
    pub use hearth_commands::prelude::*;
}
