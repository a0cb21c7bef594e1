//! Core types for session management.
//!
//! This module defines sessions (one gift exchange), the organizer's view
//! of participants, and the shapes that cross the privileged boundary:
//! submission requests going in and single revealed assignments coming out.
//!
//! # Anonymity
//!
//! [`ParticipantRecord`] has no assignment field. The only type that ever
//! carries a receiver out of storage is [`RevealedAssignment`], and it is
//! produced only for the holder of the matching reveal token.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::draw::{Assignment, AssignmentPair, ParticipantId};

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Lifecycle state of a session.
///
/// ```text
/// planning ──draw──▶ drawn ──▶ completed ──▶ archived
///    ▲                 │
///    └─────redo────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Participants are being collected; the draw may run.
    #[default]
    Planning,
    /// Assignments are finalized.
    Drawn,
    /// Every gift has been handed over.
    Completed,
    /// Kept for reference only.
    Archived,
}

impl SessionStatus {
    /// Converts to string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Drawn => "drawn",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planning" => Some(Self::Planning),
            "drawn" => Some(Self::Drawn),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Returns whether the lifecycle allows moving to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Planning, Self::Drawn)
                | (Self::Drawn, Self::Planning | Self::Completed)
                | (Self::Planning | Self::Drawn | Self::Completed, Self::Archived)
        )
    }

    /// Returns whether participants may still be edited.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Planning)
    }

    /// Returns whether assignments exist and can be revealed.
    #[must_use]
    pub const fn is_drawn(self) -> bool {
        matches!(self, Self::Drawn | Self::Completed | Self::Archived)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gift exchange session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Opaque id of the organizer who owns the session.
    pub organizer_id: String,
    /// Display name (e.g. "Familie 2026").
    pub name: String,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Whether exclusion partners must not draw each other.
    pub exclusion_enabled: bool,
    /// When the session was created (Unix timestamp).
    pub created_at: i64,
    /// When the session was last updated (Unix timestamp).
    pub updated_at: i64,
}

/// Configuration for creating a new session.
#[derive(Debug, Clone)]
pub struct NewSession {
    /// Session name.
    pub name: String,
    /// Organizer id.
    pub organizer_id: String,
    /// Partner exclusion flag.
    pub exclusion_enabled: bool,
}

impl NewSession {
    /// Creates a new session configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, organizer_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            organizer_id: organizer_id.into(),
            exclusion_enabled: false,
        }
    }

    /// Sets the partner exclusion flag.
    #[must_use]
    pub const fn with_exclusion(mut self, enabled: bool) -> Self {
        self.exclusion_enabled = enabled;
        self
    }
}

/// Input for adding a participant.
#[derive(Debug, Clone)]
pub struct NewParticipant {
    /// Display name.
    pub name: String,
    /// Phone number used for WhatsApp delivery.
    pub phone_number: String,
    /// Whether this participant is the organizer.
    pub is_organizer: bool,
}

impl NewParticipant {
    /// Creates a new participant input.
    #[must_use]
    pub fn new(name: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone_number: phone_number.into(),
            is_organizer: false,
        }
    }

    /// Marks the participant as the organizer.
    #[must_use]
    pub const fn organizer(mut self) -> Self {
        self.is_organizer = true;
        self
    }
}

/// Organizer view of a participant.
///
/// Deliberately has no assignment field.
#[derive(Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    /// Participant identifier.
    pub id: ParticipantId,
    /// Owning session.
    pub session_id: SessionId,
    /// Display name.
    pub name: String,
    /// Phone number as entered.
    pub phone_number: String,
    /// Secret token for the personal reveal link.
    pub reveal_token: String,
    /// Exclusion partner, if any.
    pub partner_id: Option<ParticipantId>,
    /// Whether this participant is the organizer.
    pub is_organizer: bool,
    /// When the reveal link was sent (Unix timestamp).
    pub whatsapp_sent_at: Option<i64>,
    /// When the reveal link was first opened (Unix timestamp).
    pub reveal_viewed_at: Option<i64>,
    /// When the participant was added (Unix timestamp).
    pub created_at: i64,
}

impl fmt::Debug for ParticipantRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticipantRecord")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("name", &self.name)
            .field("phone_number", &self.phone_number)
            .field("reveal_token", &"<redacted>")
            .field("partner_id", &self.partner_id)
            .field("is_organizer", &self.is_organizer)
            .field("whatsapp_sent_at", &self.whatsapp_sent_at)
            .field("reveal_viewed_at", &self.reveal_viewed_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Delivery progress of a drawn session.
///
/// Derived from participant timestamps, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionProgress {
    /// Number of participants.
    pub total: usize,
    /// Participants whose link was sent.
    pub sent: usize,
    /// Participants who opened their link.
    pub viewed: usize,
}

impl SessionProgress {
    /// Returns whether every participant has received their link.
    #[must_use]
    pub const fn all_sent(&self) -> bool {
        self.total > 0 && self.sent == self.total
    }

    /// Returns whether every participant has opened their link.
    #[must_use]
    pub const fn all_viewed(&self) -> bool {
        self.total > 0 && self.viewed == self.total
    }
}

/// The single assignment disclosed to a token holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedAssignment {
    /// Name of the token holder.
    pub participant_name: String,
    /// Name of the person they give a gift to.
    pub receiver_name: String,
    /// Name of the session.
    pub session_name: String,
    /// Every participant name in the session, sorted (for the reveal
    /// animation; carries no mapping).
    pub all_names: Vec<String>,
}

/// Outbound request to the privileged boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    /// Session to finalize.
    pub session_id: SessionId,
    /// Every giver → receiver pair.
    pub assignments: Vec<AssignmentPair>,
}

impl SubmissionRequest {
    /// Builds a request from a generated assignment.
    #[must_use]
    pub fn new(session_id: SessionId, assignment: &Assignment) -> Self {
        Self {
            session_id,
            assignments: assignment.pairs().collect(),
        }
    }
}

/// Confirmation of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// Session that was finalized.
    pub session_id: SessionId,
    /// Number of pairs written.
    pub pairs_written: usize,
    /// When the session moved to `drawn` (Unix timestamp).
    pub drawn_at: i64,
}

/// Ready-to-send delivery for one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryLink {
    /// Participant identifier.
    pub participant_id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Personal reveal URL.
    pub reveal_url: String,
    /// WhatsApp deep link; `None` for the organizer, who opens their own
    /// link directly.
    pub whatsapp_url: Option<String>,
    /// Whether the link was already sent.
    pub sent: bool,
}
