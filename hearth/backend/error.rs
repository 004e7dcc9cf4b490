use thiserror::Error;

/// Failure of a backend operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Transport or network failure; the operation may not have reached the backend.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The backend refused the operation.
    #[error("backend rejected request: {0}")]
    Rejected(String),
    /// The adapter could not be constructed.
    #[error("invalid backend configuration: {0}")]
    Config(String),
}

impl BackendError {
    /// Whether the failure was at the transport level.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Wraps an application-level refusal.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// Result alias used by every backend operation.
pub type BackendResult<T> = Result<T, BackendError>;
