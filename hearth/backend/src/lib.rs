#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Execution backends for hearth: the uniform async contract, the HTTP
//! adapter, the in-process adapter, and the remote-first orchestrator.

/// Backend error taxonomy.
#[path = "../error.rs"]
pub mod error;

/// The `ExecutionBackend` trait and its data types.
#[path = "../contract.rs"]
pub mod contract;

/// HTTP/JSON adapter for the household server.
#[path = "../remote.rs"]
pub mod remote;

/// In-process adapter with an optional JSON snapshot.
#[path = "../local.rs"]
pub mod local;

/// Remote-first, local-fallback orchestration.
#[path = "../dual.rs"]
pub mod dual;

/// JSON-lines logging and event publication shared by hearth components.
#[path = "../telemetry.rs"]
pub mod telemetry;

pub use contract::{
    AdminLogin, DeviceReading, DeviceState, DeviceValue, DoorState, ExecutionBackend,
};
pub use dual::DualBackend;
pub use error::{BackendError, BackendResult};
pub use local::LocalBackend;
pub use remote::{RemoteBackend, RemoteConfig};
pub use telemetry::{HearthTelemetry, HearthTelemetryBuilder};

/// Prelude exports for backend consumers.
pub mod prelude {
    pub use crate::contract::{DeviceValue, ExecutionBackend};
    pub use crate::dual::DualBackend;
    pub use crate::error::{BackendError, BackendResult};
    pub use crate::local::LocalBackend;
    pub use crate::remote::{RemoteBackend, RemoteConfig};
}
