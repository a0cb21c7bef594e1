//! Elevated-trust access to assignments.
//!
//! [`AssignmentVault`] is the only code path that reads or writes
//! `assigned_to_id`. Constructing one requires the registered
//! [`ServiceCredential`].
//!
//! Participants get their receiver back through [`AssignmentVault::reveal`],
//! which is keyed by a single reveal token and returns a single assignment.
//! There is no listing of assignments.

// SQLite operations need to hold the lock for the duration of the operation.
#![allow(clippy::significant_drop_tightening)]

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use super::error::{FailureReason, PairFailure, Result, SessionError, SubmissionFailure};
use super::storage::{compare_and_set_status, now, session_status, Database};
use super::token::{generate_reveal_token, secrets_match, token_digest, ServiceCredential};
use super::types::{
    RevealedAssignment, SessionId, SessionStatus, SubmissionReceipt, SubmissionRequest,
};
use crate::draw::ParticipantId;

/// A participant row matched by reveal token.
struct TokenMatch {
    participant_id: String,
    participant_name: String,
    session_id: String,
    assigned_to_id: Option<String>,
}

/// Privileged read/write access to assignments.
#[derive(Debug, Clone)]
pub struct AssignmentVault {
    db: Database,
}

impl AssignmentVault {
    /// Opens the vault over a database.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unauthorized`] if no credential is registered
    /// or `credential` does not match it.
    pub fn new(db: Database, credential: &ServiceCredential) -> Result<Self> {
        db.verify_service_credential(credential)?;
        Ok(Self { db })
    }

    // ==================== Submission ====================

    /// Persists a complete assignment and finalizes the session.
    ///
    /// Runs in one transaction: the session moves from `planning` to `drawn`
    /// only if it is still `planning`, and every pair is checked against the
    /// session's participants. If any pair fails, nothing is written and the
    /// error lists every failed pair.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidState`] if the session is not `planning`
    /// - [`SessionError::Submission`] if any pair was rejected
    /// - [`SessionError::InvalidData`] if the request has no pairs
    pub fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionReceipt> {
        require_pairs(request)?;

        let session_id = &request.session_id;
        let mut conn = self.db.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        compare_and_set_status(&tx, session_id, SessionStatus::Planning, SessionStatus::Drawn)?;
        let failures = write_assignments(&tx, request)?;
        let receipt = commit_or_reject(tx, request, failures)?;

        tracing::info!(
            session = %session_id,
            pairs = receipt.pairs_written,
            "assignments submitted"
        );
        Ok(receipt)
    }

    /// Replaces the assignment of a drawn session.
    ///
    /// Issues new reveal tokens, clears delivery timestamps and writes the
    /// new pairs in one transaction. The session stays `drawn` throughout;
    /// if any pair fails, the previous draw and its links are kept.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidState`] if the session is not `drawn`
    /// - [`SessionError::Submission`] if any pair was rejected
    /// - [`SessionError::InvalidData`] if the request has no pairs
    pub fn resubmit(&self, request: &SubmissionRequest) -> Result<SubmissionReceipt> {
        require_pairs(request)?;

        let session_id = &request.session_id;
        let mut conn = self.db.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        compare_and_set_status(&tx, session_id, SessionStatus::Drawn, SessionStatus::Drawn)?;
        rotate_tokens(&tx, session_id)?;
        let failures = write_assignments(&tx, request)?;
        let receipt = commit_or_reject(tx, request, failures)?;

        tracing::info!(
            session = %session_id,
            pairs = receipt.pairs_written,
            "assignments replaced"
        );
        Ok(receipt)
    }

    /// Undoes a draw so the session can be drawn again.
    ///
    /// Moves the session from `drawn` back to `planning`, clears every
    /// assignment and delivery timestamp, and issues new reveal tokens so
    /// links sent for the old draw stop working.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is `drawn`.
    pub fn reset_draw(&self, session_id: &SessionId) -> Result<()> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        compare_and_set_status(&tx, session_id, SessionStatus::Drawn, SessionStatus::Planning)?;
        let participants = rotate_tokens(&tx, session_id)?;

        tx.commit()?;
        tracing::info!(session = %session_id, participants, "draw reset");
        Ok(())
    }

    // ==================== Reveal ====================

    /// Returns the assignment of the participant holding `token`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidToken`] if no participant holds the token
    /// - [`SessionError::NotDrawn`] if the session has not been drawn
    pub fn reveal(&self, token: &str) -> Result<RevealedAssignment> {
        let conn = self.db.lock()?;
        let found = find_by_token(&conn, token)?;
        let session_id = SessionId::new(found.session_id);

        if !session_status(&conn, &session_id)?.is_drawn() {
            return Err(SessionError::NotDrawn);
        }
        let receiver_id = found.assigned_to_id.ok_or(SessionError::NotDrawn)?;

        let receiver_name: String = conn
            .query_row(
                "SELECT name FROM participants WHERE id = ?1 AND session_id = ?2",
                params![&receiver_id, session_id.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| SessionError::InvalidData("Assigned receiver is missing".to_string()))?;

        let session_name: String = conn.query_row(
            "SELECT name FROM sessions WHERE id = ?1",
            params![session_id.as_str()],
            |row| row.get(0),
        )?;

        let mut all_names: Vec<String> = {
            let mut stmt = conn.prepare("SELECT name FROM participants WHERE session_id = ?1")?;
            let rows = stmt
                .query_map(params![session_id.as_str()], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        all_names.sort_by_key(|name| name.to_lowercase());

        tracing::debug!(session = %session_id, "assignment revealed");
        Ok(RevealedAssignment {
            participant_name: found.participant_name,
            receiver_name,
            session_name,
            all_names,
        })
    }

    /// Records that the holder of `token` opened their reveal link.
    ///
    /// Only the first view is recorded. Returns whether this call recorded it.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidToken`] if no participant holds the token
    /// - [`SessionError::NotDrawn`] if the session has not been drawn
    pub fn track_view(&self, token: &str) -> Result<bool> {
        let conn = self.db.lock()?;
        let found = find_by_token(&conn, token)?;

        let session_id = SessionId::new(found.session_id);
        if !session_status(&conn, &session_id)?.is_drawn() {
            return Err(SessionError::NotDrawn);
        }

        let rows = conn.execute(
            "UPDATE participants SET reveal_viewed_at = ?1 WHERE id = ?2 AND reveal_viewed_at IS NULL",
            params![now(), &found.participant_id],
        )?;
        Ok(rows == 1)
    }
}

fn require_pairs(request: &SubmissionRequest) -> Result<()> {
    if request.assignments.is_empty() {
        return Err(SessionError::InvalidData(
            "Submission contains no assignments".to_string(),
        ));
    }
    Ok(())
}

/// Checks every pair against the session's participants and writes the
/// ones that pass. Returns the failed pairs; the caller decides whether to
/// commit.
fn write_assignments(conn: &Connection, request: &SubmissionRequest) -> Result<Vec<PairFailure>> {
    let session_id = &request.session_id;

    let exclusion_enabled: bool = conn.query_row(
        "SELECT exclusion_enabled FROM sessions WHERE id = ?1",
        params![session_id.as_str()],
        |row| row.get(0),
    )?;

    let partners: BTreeMap<ParticipantId, Option<ParticipantId>> = {
        let mut stmt =
            conn.prepare("SELECT id, partner_id FROM participants WHERE session_id = ?1")?;
        let rows = stmt
            .query_map(params![session_id.as_str()], |row| {
                Ok((
                    ParticipantId::new(row.get::<_, String>(0)?),
                    row.get::<_, Option<String>>(1)?.map(ParticipantId::new),
                ))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
        rows
    };

    let mut failures = Vec::new();
    let mut givers = BTreeSet::new();
    let mut receivers = BTreeSet::new();

    for pair in &request.assignments {
        let fail = |reason| PairFailure {
            giver_id: pair.giver_id.clone(),
            receiver_id: Some(pair.receiver_id.clone()),
            reason,
        };

        let Some(partner) = partners.get(&pair.giver_id) else {
            failures.push(fail(FailureReason::UnknownGiver));
            continue;
        };
        if !givers.insert(&pair.giver_id) {
            failures.push(fail(FailureReason::DuplicateGiver));
            continue;
        }
        if !partners.contains_key(&pair.receiver_id) {
            failures.push(fail(FailureReason::UnknownReceiver));
            continue;
        }
        if pair.giver_id == pair.receiver_id {
            failures.push(fail(FailureReason::SelfAssignment));
            continue;
        }
        if !receivers.insert(&pair.receiver_id) {
            failures.push(fail(FailureReason::DuplicateReceiver));
            continue;
        }
        if exclusion_enabled && partner.as_ref() == Some(&pair.receiver_id) {
            failures.push(fail(FailureReason::ExcludedPartner));
            continue;
        }

        let written = conn.execute(
            "UPDATE participants SET assigned_to_id = ?1, updated_at = ?2 WHERE id = ?3 AND session_id = ?4",
            params![
                pair.receiver_id.as_str(),
                now(),
                pair.giver_id.as_str(),
                session_id.as_str()
            ],
        );
        match written {
            Ok(1) => {}
            Ok(_) => failures.push(fail(FailureReason::WriteFailed)),
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "assignment write failed");
                failures.push(fail(FailureReason::WriteFailed));
            }
        }
    }

    failures.extend(
        partners
            .keys()
            .filter(|id| !givers.contains(id))
            .map(|id| PairFailure {
                giver_id: id.clone(),
                receiver_id: None,
                reason: FailureReason::MissingGiver,
            }),
    );

    Ok(failures)
}

/// Commits if no pair failed, rolls back otherwise.
fn commit_or_reject(
    tx: Transaction<'_>,
    request: &SubmissionRequest,
    failures: Vec<PairFailure>,
) -> Result<SubmissionReceipt> {
    if !failures.is_empty() {
        tx.rollback()?;
        tracing::warn!(
            session = %request.session_id,
            failed = failures.len(),
            "assignment submission rejected"
        );
        return Err(SessionError::Submission(SubmissionFailure { failures }));
    }

    tx.commit()?;
    Ok(SubmissionReceipt {
        session_id: request.session_id.clone(),
        pairs_written: request.assignments.len(),
        drawn_at: now(),
    })
}

/// Clears assignments and delivery timestamps and issues a fresh token to
/// every participant. Returns the number of participants touched.
fn rotate_tokens(conn: &Connection, session_id: &SessionId) -> Result<usize> {
    let ids: Vec<String> = {
        let mut stmt = conn.prepare("SELECT id FROM participants WHERE session_id = ?1")?;
        let rows = stmt
            .query_map(params![session_id.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    let now = now();
    for id in &ids {
        let token = generate_reveal_token();
        conn.execute(
            r"
            UPDATE participants
            SET assigned_to_id = NULL,
                whatsapp_sent_at = NULL,
                reveal_viewed_at = NULL,
                reveal_token = ?1,
                token_digest = ?2,
                updated_at = ?3
            WHERE id = ?4
            ",
            params![&token, &token_digest(&token)[..], now, id],
        )?;
    }

    Ok(ids.len())
}

/// Looks a participant up by token digest and confirms the token itself.
fn find_by_token(conn: &Connection, token: &str) -> Result<TokenMatch> {
    let row = conn
        .query_row(
            r"
            SELECT id, name, session_id, assigned_to_id, reveal_token
            FROM participants
            WHERE token_digest = ?1
            ",
            params![&token_digest(token)[..]],
            |row| {
                Ok((
                    TokenMatch {
                        participant_id: row.get(0)?,
                        participant_name: row.get(1)?,
                        session_id: row.get(2)?,
                        assigned_to_id: row.get(3)?,
                    },
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((found, stored)) if secrets_match(stored.as_bytes(), token.as_bytes()) => Ok(found),
        _ => Err(SessionError::InvalidToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::AssignmentPair;
    use crate::session::storage::SessionStorage;
    use crate::session::types::{NewParticipant, NewSession, ParticipantRecord};

    struct Fixture {
        storage: SessionStorage,
        vault: AssignmentVault,
        session_id: SessionId,
        people: Vec<ParticipantRecord>,
    }

    fn fixture(names: &[&str], exclusion: bool) -> Fixture {
        let db = Database::in_memory().unwrap();
        let credential = ServiceCredential::new("vault-test-service-key").unwrap();
        db.register_service_credential(&credential).unwrap();

        let storage = SessionStorage::new(db.clone());
        let vault = AssignmentVault::new(db, &credential).unwrap();
        let session = storage
            .create_session(&NewSession::new("Familie", "org-1").with_exclusion(exclusion))
            .unwrap();
        let people = names
            .iter()
            .map(|name| {
                storage
                    .add_participant(&session.id, &NewParticipant::new(*name, "0791234567"))
                    .unwrap()
            })
            .collect();

        Fixture {
            storage,
            vault,
            session_id: session.id,
            people,
        }
    }

    fn pair(giver: &ParticipantRecord, receiver: &ParticipantRecord) -> AssignmentPair {
        AssignmentPair {
            giver_id: giver.id.clone(),
            receiver_id: receiver.id.clone(),
        }
    }

    /// a → b → c → a
    fn cycle(f: &Fixture) -> SubmissionRequest {
        let p = &f.people;
        SubmissionRequest {
            session_id: f.session_id.clone(),
            assignments: vec![pair(&p[0], &p[1]), pair(&p[1], &p[2]), pair(&p[2], &p[0])],
        }
    }

    fn status(f: &Fixture) -> SessionStatus {
        f.storage
            .get_session(&f.session_id)
            .unwrap()
            .unwrap()
            .status
    }

    #[test]
    fn vault_requires_registered_credential() {
        let db = Database::in_memory().unwrap();
        let credential = ServiceCredential::new("vault-test-service-key").unwrap();
        assert!(matches!(
            AssignmentVault::new(db.clone(), &credential),
            Err(SessionError::Unauthorized(_))
        ));

        db.register_service_credential(&credential).unwrap();
        let wrong = ServiceCredential::new("not-the-registered-key").unwrap();
        assert!(matches!(
            AssignmentVault::new(db.clone(), &wrong),
            Err(SessionError::Unauthorized(_))
        ));
        assert!(AssignmentVault::new(db, &credential).is_ok());
    }

    #[test]
    fn submit_finalizes_session() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);

        let receipt = f.vault.submit(&cycle(&f)).unwrap();

        assert_eq!(receipt.pairs_written, 3);
        assert_eq!(receipt.session_id, f.session_id);
        assert_eq!(status(&f), SessionStatus::Drawn);
    }

    #[test]
    fn submit_twice_is_rejected() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);
        f.vault.submit(&cycle(&f)).unwrap();

        let err = f.vault.submit(&cycle(&f)).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState {
                expected: SessionStatus::Planning,
                actual: SessionStatus::Drawn
            }
        ));
    }

    #[test]
    fn submit_rejects_empty_request() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);
        let request = SubmissionRequest {
            session_id: f.session_id.clone(),
            assignments: vec![],
        };
        assert!(matches!(
            f.vault.submit(&request),
            Err(SessionError::InvalidData(_))
        ));
        assert_eq!(status(&f), SessionStatus::Planning);
    }

    #[test]
    fn submit_unknown_session() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);
        let mut request = cycle(&f);
        request.session_id = SessionId::new("missing");
        assert!(matches!(
            f.vault.submit(&request),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn submit_reports_every_failed_pair_and_writes_nothing() {
        let f = fixture(&["Anna", "Ben", "Carla", "Dora"], false);
        let p = &f.people;
        let request = SubmissionRequest {
            session_id: f.session_id.clone(),
            assignments: vec![
                pair(&p[0], &p[1]),
                pair(&p[1], &p[1]),
                AssignmentPair {
                    giver_id: p[2].id.clone(),
                    receiver_id: ParticipantId::new("stranger"),
                },
            ],
        };

        let err = f.vault.submit(&request).unwrap_err();
        let SessionError::Submission(failure) = err else {
            panic!("expected submission failure");
        };

        let reasons: Vec<_> = failure.failures.iter().map(|f| f.reason).collect();
        assert_eq!(
            reasons,
            vec![
                FailureReason::SelfAssignment,
                FailureReason::UnknownReceiver,
                FailureReason::MissingGiver,
            ]
        );

        assert_eq!(status(&f), SessionStatus::Planning);
        assert!(matches!(
            f.vault.reveal(&p[0].reveal_token),
            Err(SessionError::NotDrawn)
        ));
    }

    #[test]
    fn submit_detects_duplicate_receiver() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);
        let p = &f.people;
        let request = SubmissionRequest {
            session_id: f.session_id.clone(),
            assignments: vec![pair(&p[0], &p[1]), pair(&p[2], &p[1]), pair(&p[1], &p[0])],
        };

        let Err(SessionError::Submission(failure)) = f.vault.submit(&request) else {
            panic!("expected submission failure");
        };
        assert_eq!(failure.failures.len(), 1);
        assert_eq!(failure.failures[0].reason, FailureReason::DuplicateReceiver);
        assert_eq!(failure.failures[0].giver_id, p[2].id);
    }

    #[test]
    fn submit_enforces_exclusion_when_enabled() {
        let f = fixture(&["Anna", "Ben", "Carla"], true);
        f.storage
            .set_partners(&f.people[0].id, &f.people[1].id)
            .unwrap();

        let Err(SessionError::Submission(failure)) = f.vault.submit(&cycle(&f)) else {
            panic!("expected submission failure");
        };
        assert_eq!(failure.failures[0].reason, FailureReason::ExcludedPartner);
        assert_eq!(failure.failures[0].giver_id, f.people[0].id);
    }

    #[test]
    fn failed_submission_can_be_retried() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);
        let mut broken = cycle(&f);
        broken.assignments.pop();
        assert!(f.vault.submit(&broken).is_err());

        f.vault.submit(&cycle(&f)).unwrap();
        assert_eq!(status(&f), SessionStatus::Drawn);
    }

    #[test]
    fn reveal_returns_own_receiver_only() {
        let f = fixture(&["Carla", "anna", "Ben"], false);
        f.vault.submit(&cycle(&f)).unwrap();

        let revealed = f.vault.reveal(&f.people[0].reveal_token).unwrap();
        assert_eq!(revealed.participant_name, "Carla");
        assert_eq!(revealed.receiver_name, "anna");
        assert_eq!(revealed.session_name, "Familie");
        assert_eq!(revealed.all_names, vec!["anna", "Ben", "Carla"]);
    }

    #[test]
    fn reveal_rejects_unknown_token() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);
        f.vault.submit(&cycle(&f)).unwrap();

        assert!(matches!(
            f.vault.reveal("not-a-token"),
            Err(SessionError::InvalidToken)
        ));
        assert!(matches!(f.vault.reveal(""), Err(SessionError::InvalidToken)));
    }

    #[test]
    fn reveal_before_draw_fails() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);
        assert!(matches!(
            f.vault.reveal(&f.people[0].reveal_token),
            Err(SessionError::NotDrawn)
        ));
    }

    #[test]
    fn track_view_records_first_view_only() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);
        f.vault.submit(&cycle(&f)).unwrap();
        let token = &f.people[1].reveal_token;

        assert!(f.vault.track_view(token).unwrap());
        assert!(!f.vault.track_view(token).unwrap());

        let progress = f.storage.progress(&f.session_id).unwrap();
        assert_eq!(progress.viewed, 1);
        assert!(matches!(
            f.vault.track_view("bogus"),
            Err(SessionError::InvalidToken)
        ));
    }

    #[test]
    fn reset_draw_clears_state_and_rotates_tokens() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);
        f.vault.submit(&cycle(&f)).unwrap();
        f.storage.mark_whatsapp_sent(&f.people[0].id).unwrap();
        f.vault.track_view(&f.people[0].reveal_token).unwrap();

        f.vault.reset_draw(&f.session_id).unwrap();

        assert_eq!(status(&f), SessionStatus::Planning);
        let progress = f.storage.progress(&f.session_id).unwrap();
        assert_eq!(progress.sent, 0);
        assert_eq!(progress.viewed, 0);

        assert!(matches!(
            f.vault.reveal(&f.people[0].reveal_token),
            Err(SessionError::InvalidToken)
        ));
        let fresh = f.storage.get_participant(&f.people[0].id).unwrap().unwrap();
        assert_ne!(fresh.reveal_token, f.people[0].reveal_token);
        assert!(matches!(
            f.vault.reveal(&fresh.reveal_token),
            Err(SessionError::NotDrawn)
        ));
    }

    #[test]
    fn reset_draw_requires_drawn() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);
        assert!(matches!(
            f.vault.reset_draw(&f.session_id),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn track_view_before_draw_fails() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);

        assert!(matches!(
            f.vault.track_view(&f.people[0].reveal_token),
            Err(SessionError::NotDrawn)
        ));
        assert_eq!(f.storage.progress(&f.session_id).unwrap().viewed, 0);

        f.vault.submit(&cycle(&f)).unwrap();
        assert!(f.vault.track_view(&f.people[0].reveal_token).unwrap());
    }

    // ==================== Resubmit Tests ====================

    /// a → c → b → a
    fn reverse_cycle(f: &Fixture) -> SubmissionRequest {
        let p = &f.people;
        SubmissionRequest {
            session_id: f.session_id.clone(),
            assignments: vec![pair(&p[0], &p[2]), pair(&p[2], &p[1]), pair(&p[1], &p[0])],
        }
    }

    #[test]
    fn resubmit_replaces_assignment_and_tokens() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);
        f.vault.submit(&cycle(&f)).unwrap();
        f.storage.mark_whatsapp_sent(&f.people[0].id).unwrap();

        let receipt = f.vault.resubmit(&reverse_cycle(&f)).unwrap();
        assert_eq!(receipt.pairs_written, 3);
        assert_eq!(status(&f), SessionStatus::Drawn);
        assert_eq!(f.storage.progress(&f.session_id).unwrap().sent, 0);

        assert!(matches!(
            f.vault.reveal(&f.people[0].reveal_token),
            Err(SessionError::InvalidToken)
        ));
        let anna = f.storage.get_participant(&f.people[0].id).unwrap().unwrap();
        assert_eq!(f.vault.reveal(&anna.reveal_token).unwrap().receiver_name, "Carla");
    }

    #[test]
    fn rejected_resubmit_keeps_previous_draw() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);
        f.vault.submit(&cycle(&f)).unwrap();
        f.storage.mark_whatsapp_sent(&f.people[0].id).unwrap();

        let p = &f.people;
        let broken = SubmissionRequest {
            session_id: f.session_id.clone(),
            assignments: vec![pair(&p[0], &p[0]), pair(&p[1], &p[2]), pair(&p[2], &p[1])],
        };
        assert!(matches!(
            f.vault.resubmit(&broken),
            Err(SessionError::Submission(_))
        ));

        assert_eq!(status(&f), SessionStatus::Drawn);
        assert_eq!(f.storage.progress(&f.session_id).unwrap().sent, 1);
        let revealed = f.vault.reveal(&f.people[0].reveal_token).unwrap();
        assert_eq!(revealed.receiver_name, "Ben");
    }

    #[test]
    fn resubmit_requires_drawn() {
        let f = fixture(&["Anna", "Ben", "Carla"], false);
        assert!(matches!(
            f.vault.resubmit(&reverse_cycle(&f)),
            Err(SessionError::InvalidState {
                expected: SessionStatus::Drawn,
                actual: SessionStatus::Planning
            })
        ));
        assert_eq!(status(&f), SessionStatus::Planning);
    }
}
