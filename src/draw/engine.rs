//! Rejection-sampling derangement generator.
//!
//! Each attempt draws a uniformly random permutation of the participant
//! list and pairs it position-for-position with the original order. The
//! first permutation that satisfies every constraint is accepted. Because
//! rejection does not reweight the survivors, the accepted mapping is
//! uniform over all valid assignments.
//!
//! Keep this a rejection loop. Constructive derangements (Sattolo cycles)
//! are not uniform over valid assignments.

use std::collections::{BTreeMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;

use super::error::{DrawError, Result};
use super::types::{Assignment, Participant, ParticipantId};

/// Default number of permutations tried before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;

/// Default minimum number of participants.
pub const DEFAULT_MIN_PARTICIPANTS: usize = 3;

/// Smallest group for which a derangement exists.
const ABSOLUTE_MIN_PARTICIPANTS: usize = 2;

/// Options controlling a single draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawOptions {
    /// Whether exclusion partners must not be assigned to each other.
    pub exclusion_enabled: bool,
    /// Attempt budget for the rejection loop.
    pub max_attempts: u32,
    /// Minimum participant count.
    pub min_participants: usize,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            exclusion_enabled: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_participants: DEFAULT_MIN_PARTICIPANTS,
        }
    }
}

impl DrawOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables partner exclusion.
    #[must_use]
    pub const fn with_exclusion(mut self, enabled: bool) -> Self {
        self.exclusion_enabled = enabled;
        self
    }

    /// Sets the attempt budget (at least one attempt is always made).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the minimum participant count, clamped to 2.
    #[must_use]
    pub fn with_min_participants(mut self, min_participants: usize) -> Self {
        self.min_participants = min_participants.max(ABSOLUTE_MIN_PARTICIPANTS);
        self
    }
}

/// Generates an assignment using the thread-local CSPRNG.
///
/// # Errors
///
/// - [`DrawError::TooFewParticipants`] for fewer than three participants
/// - [`DrawError::DuplicateParticipant`] if an id appears twice
/// - [`DrawError::UnsatisfiableConstraints`] if the attempt budget runs out
///
/// # Examples
///
/// ```
/// use wichtel_core::draw::{generate_assignment, Participant, ParticipantId};
///
/// let participants = vec![
///     Participant::new("anna"),
///     Participant::new("ben"),
///     Participant::new("carla"),
/// ];
/// let assignment = generate_assignment(&participants, false).unwrap();
///
/// assert_eq!(assignment.len(), 3);
/// let anna = ParticipantId::new("anna");
/// assert_ne!(assignment.receiver_of(&anna), Some(&anna));
/// ```
pub fn generate_assignment(
    participants: &[Participant],
    exclusion_enabled: bool,
) -> Result<Assignment> {
    let options = DrawOptions::new().with_exclusion(exclusion_enabled);
    generate_assignment_with_rng(participants, &options, &mut rand::thread_rng())
}

/// Generates an assignment with an injected random source.
///
/// Pass a seeded RNG to make a draw reproducible.
///
/// # Errors
///
/// Same as [`generate_assignment`].
pub fn generate_assignment_with_rng<R>(
    participants: &[Participant],
    options: &DrawOptions,
    rng: &mut R,
) -> Result<Assignment>
where
    R: Rng + ?Sized,
{
    let n = participants.len();
    let minimum = options.min_participants.max(ABSOLUTE_MIN_PARTICIPANTS);
    if n < minimum {
        return Err(DrawError::TooFewParticipants { count: n, minimum });
    }

    let mut seen = HashSet::with_capacity(n);
    for participant in participants {
        if !seen.insert(&participant.id) {
            return Err(DrawError::DuplicateParticipant(participant.id.clone()));
        }
    }

    if options.exclusion_enabled && has_stranded_giver(participants, &seen) {
        tracing::warn!(participants = n, "draw rejected: a participant has no admissible receiver");
        return Err(DrawError::UnsatisfiableConstraints { attempts: 0 });
    }

    let mut shuffled: Vec<&Participant> = participants.iter().collect();
    for attempt in 1..=options.max_attempts {
        shuffled.shuffle(rng);

        let valid = participants
            .iter()
            .zip(&shuffled)
            .all(|(giver, receiver)| giver.may_give_to(&receiver.id, options.exclusion_enabled));

        if valid {
            tracing::debug!(participants = n, attempts = attempt, "draw accepted");
            let mapping: BTreeMap<_, _> = participants
                .iter()
                .zip(&shuffled)
                .map(|(giver, receiver)| (giver.id.clone(), receiver.id.clone()))
                .collect();
            return Ok(Assignment::from_map(mapping));
        }
    }

    tracing::warn!(
        participants = n,
        attempts = options.max_attempts,
        "draw attempt budget exhausted"
    );
    Err(DrawError::UnsatisfiableConstraints {
        attempts: options.max_attempts,
    })
}

/// Returns whether some giver has no admissible receiver at all.
///
/// Every giver can reach `n - 1` others, minus its partner if that partner
/// is a distinct member of the set.
fn has_stranded_giver(
    participants: &[Participant],
    ids: &HashSet<&ParticipantId>,
) -> bool {
    let others = participants.len() - 1;
    participants.iter().any(|p| {
        let excluded = p
            .exclusion_partner
            .as_ref()
            .is_some_and(|partner| partner != &p.id && ids.contains(partner));
        others - usize::from(excluded) == 0
    })
}
