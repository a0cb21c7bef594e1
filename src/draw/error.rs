//! Error types for the assignment engine.

use thiserror::Error;

use super::types::ParticipantId;

/// Error type for draw operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DrawError {
    /// Not enough participants to run a draw.
    ///
    /// Not retryable without adding participants.
    #[error("Too few participants: {count} (at least {minimum} required)")]
    TooFewParticipants {
        /// Number of participants supplied.
        count: usize,
        /// Minimum number required.
        minimum: usize,
    },

    /// No valid assignment was found within the attempt budget.
    ///
    /// The organizer should review the exclusion pairings.
    #[error("No valid assignment found after {attempts} attempts; review exclusion pairings")]
    UnsatisfiableConstraints {
        /// Number of permutations tried before giving up.
        attempts: u32,
    },

    /// The same participant id appears more than once in the input.
    #[error("Duplicate participant: {0}")]
    DuplicateParticipant(ParticipantId),
}

/// Result type alias for draw operations.
pub type Result<T> = std::result::Result<T, DrawError>;
