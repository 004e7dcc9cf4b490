use hearth_access::{AccessError, DenialReason};
use hearth_backend::BackendError;
use thiserror::Error;

/// Failure of a pipeline or family-management operation.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The utterance did not resolve to an action; carries the clarification text.
    #[error("could not understand the command: {0}")]
    ParseAmbiguous(String),
    /// The requester's policy forbids the action.
    #[error("not allowed: {0}")]
    PolicyDenied(DenialReason),
    /// Neither backend could be reached.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    /// The backend refused the operation.
    #[error("backend rejected the request: {0}")]
    BackendRejected(String),
    /// An administrator tried to delete their own account.
    #[error("administrators cannot delete their own account")]
    SelfDeletion,
    /// The operation needs an admin session.
    #[error("an admin sign-in is required")]
    NotSignedIn,
    /// Registration or update payload failed validation.
    #[error("invalid member: {0}")]
    InvalidMember(String),
    /// Session persistence or policy bookkeeping failed.
    #[error(transparent)]
    Access(AccessError),
}

impl From<BackendError> for CommandError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(message) | BackendError::Config(message) => {
                Self::BackendUnavailable(message)
            }
            BackendError::Rejected(message) => Self::BackendRejected(message),
        }
    }
}

impl From<AccessError> for CommandError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::InvalidMember(message) => Self::InvalidMember(message),
            other => Self::Access(other),
        }
    }
}

impl CommandError {
    /// Short machine-readable label, used as the activity `detail`.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::PolicyDenied(reason) => reason.label().to_string(),
            Self::ParseAmbiguous(_) => "parse-ambiguous".into(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_map_by_kind() {
        let err: CommandError = BackendError::Unavailable("refused".into()).into();
        assert!(matches!(err, CommandError::BackendUnavailable(m) if m == "refused"));
        let err: CommandError = BackendError::rejected("pin taken").into();
        assert_eq!(err.to_string(), "backend rejected the request: pin taken");
    }

    #[test]
    fn denial_label_is_the_reason_verbatim() {
        let err = CommandError::PolicyDenied(DenialReason::AreaDenied);
        assert_eq!(err.label(), "area-denied");
        let err: CommandError = AccessError::InvalidMember("name is required".into()).into();
        assert!(matches!(err, CommandError::InvalidMember(_)));
    }
}
