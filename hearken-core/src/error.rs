//! Error types for Hearken operations

use crate::enums::{InputStatus, InquiryStatus, RevealState};
use std::collections::BTreeMap;
use thiserror::Error;

/// Per-field validation messages as returned by the server.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Reasons a workflow guard refuses an action before any network call.
///
/// The `Display` text is meant to be shown to the user as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardRejection {
    #[error("This inquiry is not open for responses yet")]
    InquiryNotActive { status: InquiryStatus },

    #[error("This inquiry is closed and no longer accepts responses")]
    InquiryClosed,

    #[error("Only draft inquiries can be sent")]
    InquiryNotDraft { status: InquiryStatus },

    #[error("Only active inquiries can be closed")]
    InquiryNotClosable { status: InquiryStatus },

    #[error("Closed inquiries can no longer be edited")]
    InquiryLocked,

    #[error("This submission is not anonymous, so there is no identity to reveal")]
    NotAnonymous,

    #[error("An identity reveal has already been requested for this submission")]
    RevealAlreadyRequested { state: RevealState },

    #[error("A reveal for this submission is already being processed")]
    RevealInFlight,

    #[error("There is no pending reveal request to respond to")]
    NoPendingReveal { state: RevealState },

    #[error("This submission is still being analysed; try again once processing finishes")]
    AnalysisNotReady { status: InputStatus },

    #[error("A summary is already being generated for this topic")]
    SummaryGenerationInFlight,

    #[error("Archived topics cannot be changed")]
    TopicArchived,

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
}

/// Classified failure of a synchronization operation.
///
/// `Clone` so a single in-flight fetch outcome can be handed to every
/// deduplicated waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Network unreachable: {reason}")]
    NetworkUnreachable { reason: String },

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Session expired or missing credentials")]
    Unauthorized,

    #[error("Server rejected the request ({status}): {message}")]
    ServerRejected { status: u16, message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed {
        message: String,
        field_errors: FieldErrors,
    },

    #[error(transparent)]
    WorkflowGuardRejected(#[from] GuardRejection),

    #[error("Unexpected payload: {reason}")]
    Decode { reason: String },

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SyncError {
    /// Whether the call site can meaningfully react to this error.
    ///
    /// `Unauthorized` is handled centrally by session teardown and
    /// `WorkflowGuardRejected` never reached the network.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SyncError::Unauthorized | SyncError::WorkflowGuardRejected(_)
        )
    }

    /// Whether prompting the user for a manual retry makes sense.
    pub fn should_retry_manually(&self) -> bool {
        matches!(
            self,
            SyncError::NetworkUnreachable { .. }
                | SyncError::Timeout { .. }
                | SyncError::ServerRejected { status: 500..=599, .. }
                | SyncError::Unknown(_)
        )
    }

    /// Whether the error originated from a local guard.
    pub fn is_guard_rejection(&self) -> bool {
        matches!(self, SyncError::WorkflowGuardRejected(_))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_rejection_is_user_actionable() {
        let err = SyncError::from(GuardRejection::InquiryClosed);
        assert_eq!(
            err.to_string(),
            "This inquiry is closed and no longer accepts responses"
        );
        assert!(err.is_guard_rejection());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_unauthorized_is_not_recoverable() {
        assert!(!SyncError::Unauthorized.is_recoverable());
        assert!(!SyncError::Unauthorized.should_retry_manually());
    }

    #[test]
    fn test_manual_retry_classification() {
        assert!(SyncError::Timeout { timeout_ms: 100 }.should_retry_manually());
        assert!(SyncError::ServerRejected {
            status: 503,
            message: "busy".to_string()
        }
        .should_retry_manually());
        assert!(!SyncError::ServerRejected {
            status: 404,
            message: "gone".to_string()
        }
        .should_retry_manually());
    }

    #[test]
    fn test_empty_field_message() {
        let err = GuardRejection::EmptyField { field: "Reply" };
        assert_eq!(err.to_string(), "Reply must not be empty");
    }
}
