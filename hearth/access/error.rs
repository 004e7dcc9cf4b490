use thiserror::Error;

/// Errors raised by member, policy, and session handling.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Registration or update payload failed validation.
    #[error("invalid member: {0}")]
    InvalidMember(String),
    /// No policy or record is held for this member id.
    #[error("unknown member '{0}'")]
    UnknownMember(String),
    /// A policy key string did not name a gate.
    #[error("invalid policy key '{0}'")]
    InvalidPolicyKey(String),
    /// Session file could not be read or written.
    #[error("session storage: {0}")]
    SessionIo(#[from] std::io::Error),
    /// Session file held malformed JSON.
    #[error("session format: {0}")]
    SessionFormat(#[from] serde_json::Error),
}
