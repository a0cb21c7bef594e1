//! Assignment engine for Secret Santa draws.
//!
//! Produces a random derangement over a participant set: every participant
//! gives exactly once, receives exactly once, never draws themselves, and
//! (optionally) never draws their exclusion partner.
//!
//! # Anonymity
//!
//! The engine is a pure function. It performs no I/O, owns no state between
//! calls and never logs the mapping. [`Assignment`]'s `Debug` output is
//! redacted.
//!
//! # Types
//!
//! - [`Participant`]: an id plus an optional exclusion partner
//! - [`Assignment`]: the resulting giver → receiver mapping
//! - [`DrawOptions`]: exclusion flag, attempt budget, minimum size

mod engine;
mod error;
pub mod types;

pub use engine::{
    generate_assignment, generate_assignment_with_rng, DrawOptions, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MIN_PARTICIPANTS,
};
pub use error::{DrawError, Result};
pub use types::{Assignment, AssignmentPair, AssignmentViolation, Participant, ParticipantId};
