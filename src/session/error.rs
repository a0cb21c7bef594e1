//! Error types for session management and the assignment boundary.
//!
//! This module defines errors that can occur during session operations,
//! including storage errors, state conflicts, reveal failures and
//! rejected assignment submissions.

use std::fmt;

use thiserror::Error;

use super::types::SessionStatus;
use crate::delivery::DeliveryError;
use crate::draw::{DrawError, ParticipantId};

/// Why a single pair of a submission could not be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Giver is not a participant of the session.
    UnknownGiver,
    /// Receiver is not a participant of the session.
    UnknownReceiver,
    /// Giver appears in more than one pair.
    DuplicateGiver,
    /// Receiver appears in more than one pair.
    DuplicateReceiver,
    /// Giver is assigned to themselves.
    SelfAssignment,
    /// Giver is assigned to their exclusion partner.
    ExcludedPartner,
    /// Participant of the session has no pair.
    MissingGiver,
    /// The row update affected nothing.
    WriteFailed,
}

impl FailureReason {
    /// Converts to a stable string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownGiver => "unknown_giver",
            Self::UnknownReceiver => "unknown_receiver",
            Self::DuplicateGiver => "duplicate_giver",
            Self::DuplicateReceiver => "duplicate_receiver",
            Self::SelfAssignment => "self_assignment",
            Self::ExcludedPartner => "excluded_partner",
            Self::MissingGiver => "missing_giver",
            Self::WriteFailed => "write_failed",
        }
    }
}

/// A pair that could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairFailure {
    /// Giver of the failed pair.
    pub giver_id: ParticipantId,
    /// Receiver of the failed pair (`None` for a missing giver).
    pub receiver_id: Option<ParticipantId>,
    /// Why it failed.
    pub reason: FailureReason,
}

/// A rejected submission, listing every failed pair.
///
/// Nothing was written: the caller can fix the input and resubmit the same
/// assignment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmissionFailure {
    /// Failed pairs, in submission order.
    pub failures: Vec<PairFailure>,
}

impl SubmissionFailure {
    /// Returns the ids of all givers whose pair failed.
    pub fn failed_givers(&self) -> impl Iterator<Item = &ParticipantId> {
        self.failures.iter().map(|f| &f.giver_id)
    }
}

impl fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pair(s) rejected", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {} ({})", failure.giver_id, failure.reason.as_str())?;
        }
        Ok(())
    }
}

/// Error type for session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database error from `SQLite`.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Session or participant not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data provided.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Session is in the wrong lifecycle state for the operation.
    #[error("Invalid session state: expected {expected}, found {actual}")]
    InvalidState {
        /// State the operation requires.
        expected: SessionStatus,
        /// State the session is in.
        actual: SessionStatus,
    },

    /// Reveal token does not match any participant.
    #[error("Invalid or expired reveal link")]
    InvalidToken,

    /// The session has not been drawn yet.
    #[error("The draw has not happened yet")]
    NotDrawn,

    /// Service credential missing or wrong.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The assignment engine failed.
    #[error("Draw failed: {0}")]
    Draw(#[from] DrawError),

    /// The assignment submission was rejected.
    #[error("Submission failed: {0}")]
    Submission(SubmissionFailure),

    /// A delivery link could not be built.
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_display() {
        let err = SessionError::Storage("lock poisoned".to_string());
        assert_eq!(err.to_string(), "Storage error: lock poisoned");
    }

    #[test]
    fn not_found_error_display() {
        let err = SessionError::NotFound("session abc".to_string());
        assert_eq!(err.to_string(), "Not found: session abc");
    }

    #[test]
    fn invalid_state_error_display() {
        let err = SessionError::InvalidState {
            expected: SessionStatus::Planning,
            actual: SessionStatus::Drawn,
        };
        assert_eq!(
            err.to_string(),
            "Invalid session state: expected planning, found drawn"
        );
    }

    #[test]
    fn invalid_token_error_display() {
        assert_eq!(
            SessionError::InvalidToken.to_string(),
            "Invalid or expired reveal link"
        );
    }

    #[test]
    fn draw_error_converts() {
        let err: SessionError = DrawError::UnsatisfiableConstraints { attempts: 5 }.into();
        assert!(matches!(err, SessionError::Draw(_)));
    }

    #[test]
    fn submission_failure_display_lists_givers() {
        let failure = SubmissionFailure {
            failures: vec![
                PairFailure {
                    giver_id: ParticipantId::new("a"),
                    receiver_id: Some(ParticipantId::new("x")),
                    reason: FailureReason::UnknownReceiver,
                },
                PairFailure {
                    giver_id: ParticipantId::new("c"),
                    receiver_id: None,
                    reason: FailureReason::MissingGiver,
                },
            ],
        };

        assert_eq!(
            failure.to_string(),
            "2 pair(s) rejected; a (unknown_receiver); c (missing_giver)"
        );
        let givers: Vec<_> = failure.failed_givers().map(ParticipantId::as_str).collect();
        assert_eq!(givers, vec!["a", "c"]);
    }

    #[test]
    fn submission_display_does_not_leak_receivers() {
        let failure = SubmissionFailure {
            failures: vec![PairFailure {
                giver_id: ParticipantId::new("a"),
                receiver_id: Some(ParticipantId::new("secret-receiver")),
                reason: FailureReason::WriteFailed,
            }],
        };
        let err = SessionError::Submission(failure);
        assert!(!err.to_string().contains("secret-receiver"));
    }
}
