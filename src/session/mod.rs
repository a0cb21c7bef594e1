//! Session management and the assignment boundary.
//!
//! A session is one gift exchange: a named participant set that moves from
//! `planning` through a single draw to `drawn`, then `completed` and
//! `archived`.
//!
//! # Architecture
//!
//! ```text
//! SessionManager (high-level API)
//!     ├── SessionStorage   (ordinary access: sessions, participants, delivery)
//!     ├── AssignmentVault  (elevated access: submit, reset, reveal)
//!     └── draw engine      (pure; snapshot in, assignment out)
//! ```
//!
//! # Anonymity Model
//!
//! - **Two capabilities**: [`SessionStorage`] has no method that touches
//!   assignments; [`AssignmentVault`] requires the [`ServiceCredential`]
//! - **Token-scoped reveal**: a participant's receiver is only returned for
//!   their own unguessable reveal token
//! - **No listing**: there is no query that returns more than one assignment
//! - **Quiet logs**: neither mappings nor tokens are ever logged
//!
//! # Types
//!
//! - [`Session`]: one gift exchange and its lifecycle state
//! - [`ParticipantRecord`]: organizer view of a participant
//! - [`SubmissionRequest`]: the pairs handed to the vault
//! - [`RevealedAssignment`]: what a token holder sees

mod error;
mod manager;
mod storage;
mod token;
pub mod types;
mod vault;

pub use error::{FailureReason, PairFailure, Result, SessionError, SubmissionFailure};
pub use manager::SessionManager;
pub use storage::{Database, SessionStorage};
pub use token::{generate_reveal_token, ServiceCredential, MIN_SERVICE_KEY_LEN};
pub use types::{
    DeliveryLink, NewParticipant, NewSession, ParticipantRecord, RevealedAssignment, Session,
    SessionId, SessionProgress, SessionStatus, SubmissionReceipt, SubmissionRequest,
};
pub use vault::AssignmentVault;
