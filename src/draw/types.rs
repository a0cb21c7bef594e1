//! Core types for the assignment engine.
//!
//! The engine sees participants only as opaque ids with an optional
//! exclusion partner. Names, phone numbers and tokens live in the session
//! layer and never reach the draw.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque, unique participant identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
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

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A participant as seen by the assignment engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Unique identifier.
    pub id: ParticipantId,
    /// Participant this one must not be assigned to (e.g. their partner).
    ///
    /// Expected to be symmetric, but the engine does not enforce it.
    pub exclusion_partner: Option<ParticipantId>,
}

impl Participant {
    /// Creates a participant without an exclusion partner.
    #[must_use]
    pub fn new(id: impl Into<ParticipantId>) -> Self {
        Self {
            id: id.into(),
            exclusion_partner: None,
        }
    }

    /// Sets the exclusion partner.
    #[must_use]
    pub fn with_partner(mut self, partner: impl Into<ParticipantId>) -> Self {
        self.exclusion_partner = Some(partner.into());
        self
    }

    /// Returns whether `receiver` is an admissible receiver for this giver.
    #[must_use]
    pub fn may_give_to(&self, receiver: &ParticipantId, exclusion_enabled: bool) -> bool {
        if &self.id == receiver {
            return false;
        }
        !(exclusion_enabled && self.exclusion_partner.as_ref() == Some(receiver))
    }
}

/// A single giver → receiver pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPair {
    /// Participant who gives the gift.
    pub giver_id: ParticipantId,
    /// Participant who receives the gift.
    pub receiver_id: ParticipantId,
}

/// Reason an assignment does not satisfy the draw invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssignmentViolation {
    /// Givers or receivers differ from the participant set.
    #[error("Assignment does not cover the participant set exactly")]
    NotABijection,

    /// A participant is assigned to themselves.
    #[error("Participant {0} is assigned to themselves")]
    SelfAssignment(ParticipantId),

    /// A participant is assigned to their exclusion partner.
    #[error("Participant {giver} is assigned to their exclusion partner {receiver}")]
    ExcludedPartner {
        /// The giver.
        giver: ParticipantId,
        /// The excluded receiver.
        receiver: ParticipantId,
    },
}

/// A complete giver → receiver mapping over a participant set.
///
/// Only the engine constructs assignments from scratch; callers can rebuild
/// one from stored pairs via [`Assignment::from_pairs`] and check it with
/// [`Assignment::validate`].
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Assignment {
    mapping: BTreeMap<ParticipantId, ParticipantId>,
}

impl Assignment {
    pub(crate) const fn from_map(mapping: BTreeMap<ParticipantId, ParticipantId>) -> Self {
        Self { mapping }
    }

    /// Builds an assignment from explicit pairs.
    ///
    /// A repeated giver keeps its last receiver; use [`Assignment::validate`]
    /// to check the result.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = AssignmentPair>) -> Self {
        Self {
            mapping: pairs
                .into_iter()
                .map(|p| (p.giver_id, p.receiver_id))
                .collect(),
        }
    }

    /// Returns the receiver assigned to `giver`.
    #[must_use]
    pub fn receiver_of(&self, giver: &ParticipantId) -> Option<&ParticipantId> {
        self.mapping.get(giver)
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Returns whether the assignment is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Iterates over givers in id order.
    pub fn givers(&self) -> impl Iterator<Item = &ParticipantId> {
        self.mapping.keys()
    }

    /// Iterates over receivers in giver order.
    pub fn receivers(&self) -> impl Iterator<Item = &ParticipantId> {
        self.mapping.values()
    }

    /// Returns all pairs in giver id order.
    pub fn pairs(&self) -> impl Iterator<Item = AssignmentPair> + '_ {
        self.mapping.iter().map(|(giver, receiver)| AssignmentPair {
            giver_id: giver.clone(),
            receiver_id: receiver.clone(),
        })
    }

    /// Checks the assignment against a participant set.
    ///
    /// # Errors
    ///
    /// Returns the first [`AssignmentViolation`] found.
    pub fn validate(
        &self,
        participants: &[Participant],
        exclusion_enabled: bool,
    ) -> Result<(), AssignmentViolation> {
        let ids: BTreeSet<&ParticipantId> = participants.iter().map(|p| &p.id).collect();
        let givers: BTreeSet<&ParticipantId> = self.mapping.keys().collect();
        let receivers: BTreeSet<&ParticipantId> = self.mapping.values().collect();

        if ids.len() != participants.len()
            || givers != ids
            || receivers != ids
            || receivers.len() != self.mapping.len()
        {
            return Err(AssignmentViolation::NotABijection);
        }

        for participant in participants {
            let Some(receiver) = self.mapping.get(&participant.id) else {
                return Err(AssignmentViolation::NotABijection);
            };
            if receiver == &participant.id {
                return Err(AssignmentViolation::SelfAssignment(participant.id.clone()));
            }
            if !participant.may_give_to(receiver, exclusion_enabled) {
                return Err(AssignmentViolation::ExcludedPartner {
                    giver: participant.id.clone(),
                    receiver: receiver.clone(),
                });
            }
        }

        Ok(())
    }
}

// The mapping is the secret this crate protects; keep it out of logs.
impl fmt::Debug for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assignment")
            .field("len", &self.mapping.len())
            .field("mapping", &"<redacted>")
            .finish()
    }
}
