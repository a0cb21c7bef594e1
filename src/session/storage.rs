//! `SQLite` storage for sessions and participants.
//!
//! [`Database`] owns the connection and schema. [`SessionStorage`] is the
//! ordinary, organizer-facing access path over it.
//!
//! # Anonymity
//!
//! No query in this file selects or writes `assigned_to_id`. Reading or
//! writing assignments requires an [`AssignmentVault`], which can only be
//! built with the service credential.
//!
//! [`AssignmentVault`]: super::AssignmentVault

// SQLite operations need to hold the lock for the duration of the operation.
// Dropping the guard earlier would require restructuring all methods.
#![allow(clippy::significant_drop_tightening)]

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::error::{Result, SessionError};
use super::token::{generate_reveal_token, token_digest, ServiceCredential};
use super::types::{
    NewParticipant, NewSession, ParticipantRecord, Session, SessionId, SessionProgress,
    SessionStatus,
};
use crate::delivery::is_valid_phone_number;
use crate::draw::{Participant, ParticipantId};

/// How long to wait for a locked database file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const PARTICIPANT_COLUMNS: &str = "id, session_id, name, phone_number, reveal_token, partner_id, \
     is_organizer, whatsapp_sent_at, reveal_viewed_at, created_at";

const SESSION_COLUMNS: &str =
    "id, organizer_id, name, status, exclusion_enabled, created_at, updated_at";

/// Current time as a Unix timestamp.
pub(super) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Shared handle to the `SQLite` database.
///
/// Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or initialized.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Other processes may hold the write lock during a draw.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::from_connection(conn)
    }

    /// Creates an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Acquires the connection lock.
    pub(super) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SessionError::Storage(format!("Failed to acquire database lock: {e}")))
    }

    /// Initializes the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            PRAGMA foreign_keys = ON;

            -- One gift exchange
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                organizer_id TEXT NOT NULL,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'planning',
                exclusion_enabled INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Participants; assigned_to_id is only touched by the vault
            CREATE TABLE IF NOT EXISTS participants (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                name TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                reveal_token TEXT NOT NULL UNIQUE,
                token_digest BLOB NOT NULL UNIQUE,
                partner_id TEXT,
                assigned_to_id TEXT,
                is_organizer INTEGER NOT NULL DEFAULT 0,
                whatsapp_sent_at INTEGER,
                reveal_viewed_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_participants_session
                ON participants(session_id);

            -- Digest of the service credential (single row)
            CREATE TABLE IF NOT EXISTS service_credentials (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                key_digest BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );
            ",
        )?;

        Ok(())
    }

    /// Registers the service credential, or checks it if one is registered.
    ///
    /// The first credential presented to a fresh database becomes the
    /// service credential.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unauthorized`] if a different credential is
    /// already registered.
    pub fn register_service_credential(&self, credential: &ServiceCredential) -> Result<()> {
        let conn = self.lock()?;

        let existing: Option<Vec<u8>> = conn
            .query_row(
                "SELECT key_digest FROM service_credentials WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(digest) if credential.matches_digest(&digest) => Ok(()),
            Some(_) => Err(SessionError::Unauthorized(
                "A different service credential is registered".to_string(),
            )),
            None => {
                conn.execute(
                    "INSERT INTO service_credentials (id, key_digest, created_at) VALUES (1, ?1, ?2)",
                    params![&credential.digest()[..], now()],
                )?;
                tracing::info!("service credential registered");
                Ok(())
            }
        }
    }

    /// Checks a credential against the registered digest.
    pub(super) fn verify_service_credential(&self, credential: &ServiceCredential) -> Result<()> {
        let conn = self.lock()?;

        let digest: Option<Vec<u8>> = conn
            .query_row(
                "SELECT key_digest FROM service_credentials WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match digest {
            Some(digest) if credential.matches_digest(&digest) => Ok(()),
            Some(_) => Err(SessionError::Unauthorized(
                "Service credential does not match".to_string(),
            )),
            None => Err(SessionError::Unauthorized(
                "No service credential registered".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

pub(super) fn session_from_row(row: &Row<'_>) -> rusqlite::Result<(Session, String)> {
    let status_str: String = row.get(3)?;
    let session = Session {
        id: SessionId::new(row.get::<_, String>(0)?),
        organizer_id: row.get(1)?,
        name: row.get(2)?,
        status: SessionStatus::Planning,
        exclusion_enabled: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    };
    Ok((session, status_str))
}

pub(super) fn parse_session((mut session, status_str): (Session, String)) -> Result<Session> {
    session.status = SessionStatus::parse(&status_str)
        .ok_or_else(|| SessionError::InvalidData(format!("Invalid status: {status_str}")))?;
    Ok(session)
}

fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<ParticipantRecord> {
    Ok(ParticipantRecord {
        id: ParticipantId::new(row.get::<_, String>(0)?),
        session_id: SessionId::new(row.get::<_, String>(1)?),
        name: row.get(2)?,
        phone_number: row.get(3)?,
        reveal_token: row.get(4)?,
        partner_id: row.get::<_, Option<String>>(5)?.map(ParticipantId::new),
        is_organizer: row.get(6)?,
        whatsapp_sent_at: row.get(7)?,
        reveal_viewed_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Loads a session's status, failing if it does not exist.
pub(super) fn session_status(conn: &Connection, session_id: &SessionId) -> Result<SessionStatus> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM sessions WHERE id = ?1",
            params![session_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    let status = status.ok_or_else(|| SessionError::NotFound(format!("Session {session_id}")))?;
    SessionStatus::parse(&status)
        .ok_or_else(|| SessionError::InvalidData(format!("Invalid status: {status}")))
}

/// Moves a session from `from` to `to` only if it is still in `from`.
pub(super) fn compare_and_set_status(
    conn: &Connection,
    session_id: &SessionId,
    from: SessionStatus,
    to: SessionStatus,
) -> Result<()> {
    let rows = conn.execute(
        "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), now(), session_id.as_str(), from.as_str()],
    )?;

    if rows == 0 {
        let actual = session_status(conn, session_id)?;
        return Err(SessionError::InvalidState {
            expected: from,
            actual,
        });
    }

    Ok(())
}

fn require_status(conn: &Connection, session_id: &SessionId, expected: SessionStatus) -> Result<()> {
    let actual = session_status(conn, session_id)?;
    if actual == expected {
        Ok(())
    } else {
        Err(SessionError::InvalidState { expected, actual })
    }
}

fn participant_session(conn: &Connection, participant_id: &ParticipantId) -> Result<SessionId> {
    let session_id: Option<String> = conn
        .query_row(
            "SELECT session_id FROM participants WHERE id = ?1",
            params![participant_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    session_id
        .map(SessionId::new)
        .ok_or_else(|| SessionError::NotFound(format!("Participant {participant_id}")))
}

fn validate_participant_input(name: &str, phone_number: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SessionError::InvalidData(
            "Participant name must not be empty".to_string(),
        ));
    }
    if !is_valid_phone_number(phone_number) {
        return Err(SessionError::InvalidData(format!(
            "Invalid phone number: {phone_number}"
        )));
    }
    Ok(())
}

/// Organizer-facing access to sessions and participants.
///
/// Thread-safe; clones of the underlying [`Database`] share one connection.
#[derive(Debug, Clone)]
pub struct SessionStorage {
    db: Database,
}

impl SessionStorage {
    /// Creates storage over an open database.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    // ==================== Session Operations ====================

    /// Creates a new session in the `planning` state.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or the database operation fails.
    pub fn create_session(&self, config: &NewSession) -> Result<Session> {
        if config.name.trim().is_empty() {
            return Err(SessionError::InvalidData(
                "Session name must not be empty".to_string(),
            ));
        }

        let conn = self.db.lock()?;
        let now = now();
        let session = Session {
            id: SessionId::generate(),
            organizer_id: config.organizer_id.clone(),
            name: config.name.trim().to_string(),
            status: SessionStatus::Planning,
            exclusion_enabled: config.exclusion_enabled,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            r"
            INSERT INTO sessions (id, organizer_id, name, status, exclusion_enabled, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                session.id.as_str(),
                &session.organizer_id,
                &session.name,
                session.status.as_str(),
                session.exclusion_enabled,
                session.created_at,
                session.updated_at,
            ],
        )?;

        tracing::info!(session = %session.id, "session created");
        Ok(session)
    }

    /// Retrieves a session by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>> {
        let conn = self.db.lock()?;

        let row = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![session_id.as_str()],
                session_from_row,
            )
            .optional()?;

        row.map(parse_session).transpose()
    }

    /// Lists an organizer's sessions, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_sessions(&self, organizer_id: &str) -> Result<Vec<Session>> {
        let conn = self.db.lock()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE organizer_id = ?1 ORDER BY updated_at DESC, created_at DESC"
        ))?;

        let rows = stmt
            .query_map(params![organizer_id], session_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(parse_session).collect()
    }

    /// Renames a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session doesn't exist or the name is empty.
    pub fn rename_session(&self, session_id: &SessionId, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(SessionError::InvalidData(
                "Session name must not be empty".to_string(),
            ));
        }

        let conn = self.db.lock()?;
        let rows = conn.execute(
            "UPDATE sessions SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name.trim(), now(), session_id.as_str()],
        )?;

        if rows == 0 {
            return Err(SessionError::NotFound(format!("Session {session_id}")));
        }
        Ok(())
    }

    /// Enables or disables partner exclusion. Only while planning.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not in `planning`.
    pub fn set_exclusion_enabled(&self, session_id: &SessionId, enabled: bool) -> Result<()> {
        let conn = self.db.lock()?;
        require_status(&conn, session_id, SessionStatus::Planning)?;

        conn.execute(
            "UPDATE sessions SET exclusion_enabled = ?1, updated_at = ?2 WHERE id = ?3",
            params![enabled, now(), session_id.as_str()],
        )?;
        Ok(())
    }

    /// Marks a drawn session as completed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the session is `drawn`.
    pub fn complete_session(&self, session_id: &SessionId) -> Result<()> {
        let conn = self.db.lock()?;
        compare_and_set_status(
            &conn,
            session_id,
            SessionStatus::Drawn,
            SessionStatus::Completed,
        )?;

        tracing::info!(session = %session_id, "session completed");
        Ok(())
    }

    /// Archives a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session doesn't exist or is already archived.
    pub fn archive_session(&self, session_id: &SessionId) -> Result<()> {
        let conn = self.db.lock()?;
        let current = session_status(&conn, session_id)?;
        if !current.can_transition_to(SessionStatus::Archived) {
            return Err(SessionError::InvalidState {
                expected: SessionStatus::Completed,
                actual: current,
            });
        }
        compare_and_set_status(&conn, session_id, current, SessionStatus::Archived)?;

        tracing::info!(session = %session_id, from = %current, "session archived");
        Ok(())
    }

    /// Deletes a session and all its participants.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        let conn = self.db.lock()?;

        // Delete in order respecting foreign key constraints
        conn.execute(
            "DELETE FROM participants WHERE session_id = ?1",
            params![session_id.as_str()],
        )?;
        conn.execute(
            "DELETE FROM sessions WHERE id = ?1",
            params![session_id.as_str()],
        )?;

        tracing::info!(session = %session_id, "session deleted");
        Ok(())
    }

    // ==================== Participant Operations ====================

    /// Adds a participant to a session that is still planning.
    ///
    /// A fresh reveal token is generated for the participant.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is invalid, the session is not in
    /// `planning`, or the database operation fails.
    pub fn add_participant(
        &self,
        session_id: &SessionId,
        participant: &NewParticipant,
    ) -> Result<ParticipantRecord> {
        validate_participant_input(&participant.name, &participant.phone_number)?;

        let conn = self.db.lock()?;
        require_status(&conn, session_id, SessionStatus::Planning)?;

        let now = now();
        let token = generate_reveal_token();
        let record = ParticipantRecord {
            id: ParticipantId::generate(),
            session_id: session_id.clone(),
            name: participant.name.trim().to_string(),
            phone_number: participant.phone_number.trim().to_string(),
            reveal_token: token,
            partner_id: None,
            is_organizer: participant.is_organizer,
            whatsapp_sent_at: None,
            reveal_viewed_at: None,
            created_at: now,
        };

        conn.execute(
            r"
            INSERT INTO participants
                (id, session_id, name, phone_number, reveal_token, token_digest, is_organizer, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ",
            params![
                record.id.as_str(),
                session_id.as_str(),
                &record.name,
                &record.phone_number,
                &record.reveal_token,
                &token_digest(&record.reveal_token)[..],
                record.is_organizer,
                now,
            ],
        )?;

        tracing::debug!(session = %session_id, participant = %record.id, "participant added");
        Ok(record)
    }

    /// Updates a participant's name and phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is invalid or the participant doesn't exist.
    pub fn update_participant(
        &self,
        participant_id: &ParticipantId,
        name: &str,
        phone_number: &str,
    ) -> Result<()> {
        validate_participant_input(name, phone_number)?;

        let conn = self.db.lock()?;
        let rows = conn.execute(
            "UPDATE participants SET name = ?1, phone_number = ?2, updated_at = ?3 WHERE id = ?4",
            params![name.trim(), phone_number.trim(), now(), participant_id.as_str()],
        )?;

        if rows == 0 {
            return Err(SessionError::NotFound(format!(
                "Participant {participant_id}"
            )));
        }
        Ok(())
    }

    /// Removes a participant from a session that is still planning.
    ///
    /// Anyone who had this participant as exclusion partner loses it.
    ///
    /// # Errors
    ///
    /// Returns an error if the participant doesn't exist or the session is
    /// no longer in `planning`.
    pub fn remove_participant(&self, participant_id: &ParticipantId) -> Result<()> {
        let mut conn = self.db.lock()?;
        let session_id = participant_session(&conn, participant_id)?;
        require_status(&conn, &session_id, SessionStatus::Planning)?;

        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE participants SET partner_id = NULL, updated_at = ?1 WHERE partner_id = ?2",
            params![now(), participant_id.as_str()],
        )?;
        tx.execute(
            "DELETE FROM participants WHERE id = ?1",
            params![participant_id.as_str()],
        )?;
        tx.commit()?;

        tracing::debug!(session = %session_id, participant = %participant_id, "participant removed");
        Ok(())
    }

    /// Retrieves a participant by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_participant(&self, participant_id: &ParticipantId) -> Result<Option<ParticipantRecord>> {
        let conn = self.db.lock()?;

        Ok(conn
            .query_row(
                &format!("SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = ?1"),
                params![participant_id.as_str()],
                participant_from_row,
            )
            .optional()?)
    }

    /// Lists a session's participants in the order they were added.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_participants(&self, session_id: &SessionId) -> Result<Vec<ParticipantRecord>> {
        let conn = self.db.lock()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC"
        ))?;

        let participants = stmt
            .query_map(params![session_id.as_str()], participant_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(participants)
    }

    /// Pairs two participants as mutual exclusion partners.
    ///
    /// Any previous partner of either participant is released.
    ///
    /// # Errors
    ///
    /// Returns an error if the participants are the same, belong to
    /// different sessions, or the session is no longer in `planning`.
    pub fn set_partners(&self, a: &ParticipantId, b: &ParticipantId) -> Result<()> {
        if a == b {
            return Err(SessionError::InvalidData(
                "A participant cannot be their own partner".to_string(),
            ));
        }

        let mut conn = self.db.lock()?;
        let session_a = participant_session(&conn, a)?;
        let session_b = participant_session(&conn, b)?;
        if session_a != session_b {
            return Err(SessionError::InvalidData(
                "Partners must belong to the same session".to_string(),
            ));
        }
        require_status(&conn, &session_a, SessionStatus::Planning)?;

        let now = now();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE participants SET partner_id = NULL, updated_at = ?1 WHERE partner_id IN (?2, ?3)",
            params![now, a.as_str(), b.as_str()],
        )?;
        tx.execute(
            "UPDATE participants SET partner_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![b.as_str(), now, a.as_str()],
        )?;
        tx.execute(
            "UPDATE participants SET partner_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![a.as_str(), now, b.as_str()],
        )?;
        tx.commit()?;

        Ok(())
    }

    /// Dissolves a participant's partnership on both sides.
    ///
    /// # Errors
    ///
    /// Returns an error if the participant doesn't exist or the session is
    /// no longer in `planning`.
    pub fn clear_partner(&self, participant_id: &ParticipantId) -> Result<()> {
        let conn = self.db.lock()?;
        let session_id = participant_session(&conn, participant_id)?;
        require_status(&conn, &session_id, SessionStatus::Planning)?;

        conn.execute(
            "UPDATE participants SET partner_id = NULL, updated_at = ?1 WHERE id = ?2 OR partner_id = ?2",
            params![now(), participant_id.as_str()],
        )?;
        Ok(())
    }

    /// Returns the engine's view of a session: ids and partners only.
    ///
    /// # Errors
    ///
    /// Returns an error if the session doesn't exist.
    pub fn draw_snapshot(&self, session_id: &SessionId) -> Result<Vec<Participant>> {
        let conn = self.db.lock()?;
        session_status(&conn, session_id)?;

        let mut stmt = conn.prepare(
            "SELECT id, partner_id FROM participants WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;

        let participants = stmt
            .query_map(params![session_id.as_str()], |row| {
                Ok(Participant {
                    id: ParticipantId::new(row.get::<_, String>(0)?),
                    exclusion_partner: row.get::<_, Option<String>>(1)?.map(ParticipantId::new),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(participants)
    }

    // ==================== Delivery Tracking ====================

    /// Records that a participant's reveal link was sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the participant doesn't exist or the session has
    /// not been drawn.
    pub fn mark_whatsapp_sent(&self, participant_id: &ParticipantId) -> Result<()> {
        let conn = self.db.lock()?;
        let session_id = participant_session(&conn, participant_id)?;
        let status = session_status(&conn, &session_id)?;
        if !status.is_drawn() {
            return Err(SessionError::InvalidState {
                expected: SessionStatus::Drawn,
                actual: status,
            });
        }

        conn.execute(
            "UPDATE participants SET whatsapp_sent_at = COALESCE(whatsapp_sent_at, ?1), updated_at = ?1 WHERE id = ?2",
            params![now(), participant_id.as_str()],
        )?;
        Ok(())
    }

    /// Computes delivery progress for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session doesn't exist.
    pub fn progress(&self, session_id: &SessionId) -> Result<SessionProgress> {
        let conn = self.db.lock()?;
        session_status(&conn, session_id)?;

        let (total, sent, viewed): (i64, i64, i64) = conn.query_row(
            r"
            SELECT COUNT(*),
                   COUNT(whatsapp_sent_at),
                   COUNT(reveal_viewed_at)
            FROM participants
            WHERE session_id = ?1
            ",
            params![session_id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let to_usize = |n: i64| usize::try_from(n).unwrap_or_default();
        Ok(SessionProgress {
            total: to_usize(total),
            sent: to_usize(sent),
            viewed: to_usize(viewed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SessionStorage {
        SessionStorage::new(Database::in_memory().unwrap())
    }

    fn planning_session(storage: &SessionStorage) -> Session {
        storage
            .create_session(&NewSession::new("Familie", "org-1"))
            .unwrap()
    }

    fn add(storage: &SessionStorage, session: &Session, name: &str) -> ParticipantRecord {
        storage
            .add_participant(&session.id, &NewParticipant::new(name, "079 123 45 67"))
            .unwrap()
    }

    fn force_status(storage: &SessionStorage, session_id: &SessionId, status: SessionStatus) {
        let conn = storage.db.lock().unwrap();
        conn.execute(
            "UPDATE sessions SET status = ?1 WHERE id = ?2",
            params![status.as_str(), session_id.as_str()],
        )
        .unwrap();
    }

    // ==================== Session Tests ====================

    #[test]
    fn create_and_get_session() {
        let storage = storage();
        let created = storage
            .create_session(&NewSession::new("  Büro  ", "org-1").with_exclusion(true))
            .unwrap();

        let retrieved = storage.get_session(&created.id).unwrap().unwrap();
        assert_eq!(retrieved, created);
        assert_eq!(retrieved.name, "Büro");
        assert_eq!(retrieved.status, SessionStatus::Planning);
        assert!(retrieved.exclusion_enabled);
    }

    #[test]
    fn create_session_rejects_empty_name() {
        let storage = storage();
        let result = storage.create_session(&NewSession::new("   ", "org-1"));
        assert!(matches!(result, Err(SessionError::InvalidData(_))));
    }

    #[test]
    fn get_nonexistent_session_returns_none() {
        let storage = storage();
        assert!(storage
            .get_session(&SessionId::new("missing"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn list_sessions_filters_by_organizer() {
        let storage = storage();
        storage
            .create_session(&NewSession::new("A", "org-1"))
            .unwrap();
        storage
            .create_session(&NewSession::new("B", "org-1"))
            .unwrap();
        storage
            .create_session(&NewSession::new("C", "org-2"))
            .unwrap();

        assert_eq!(storage.list_sessions("org-1").unwrap().len(), 2);
        assert_eq!(storage.list_sessions("org-2").unwrap().len(), 1);
        assert!(storage.list_sessions("nobody").unwrap().is_empty());
    }

    #[test]
    fn rename_session() {
        let storage = storage();
        let session = planning_session(&storage);

        storage.rename_session(&session.id, "Weihnachten").unwrap();
        let retrieved = storage.get_session(&session.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Weihnachten");

        assert!(matches!(
            storage.rename_session(&SessionId::new("missing"), "x"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn exclusion_flag_only_changes_while_planning() {
        let storage = storage();
        let session = planning_session(&storage);

        storage.set_exclusion_enabled(&session.id, true).unwrap();
        assert!(storage.get_session(&session.id).unwrap().unwrap().exclusion_enabled);

        force_status(&storage, &session.id, SessionStatus::Drawn);
        assert!(matches!(
            storage.set_exclusion_enabled(&session.id, false),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn complete_requires_drawn() {
        let storage = storage();
        let session = planning_session(&storage);

        let err = storage.complete_session(&session.id).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState {
                expected: SessionStatus::Drawn,
                actual: SessionStatus::Planning
            }
        ));

        force_status(&storage, &session.id, SessionStatus::Drawn);
        storage.complete_session(&session.id).unwrap();
        assert_eq!(
            storage.get_session(&session.id).unwrap().unwrap().status,
            SessionStatus::Completed
        );
    }

    #[test]
    fn archive_from_completed_and_not_twice() {
        let storage = storage();
        let session = planning_session(&storage);
        force_status(&storage, &session.id, SessionStatus::Completed);

        storage.archive_session(&session.id).unwrap();
        assert!(matches!(
            storage.archive_session(&session.id),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn delete_session_removes_participants() {
        let storage = storage();
        let session = planning_session(&storage);
        let anna = add(&storage, &session, "Anna");

        storage.delete_session(&session.id).unwrap();

        assert!(storage.get_session(&session.id).unwrap().is_none());
        assert!(storage.get_participant(&anna.id).unwrap().is_none());
    }

    // ==================== Participant Tests ====================

    #[test]
    fn add_and_list_participants_in_order() {
        let storage = storage();
        let session = planning_session(&storage);
        add(&storage, &session, "Anna");
        add(&storage, &session, "Ben");
        add(&storage, &session, "Carla");

        let names: Vec<_> = storage
            .list_participants(&session.id)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Anna", "Ben", "Carla"]);
    }

    #[test]
    fn add_participant_generates_distinct_tokens() {
        let storage = storage();
        let session = planning_session(&storage);
        let anna = add(&storage, &session, "Anna");
        let ben = add(&storage, &session, "Ben");

        assert_eq!(anna.reveal_token.len(), 64);
        assert_ne!(anna.reveal_token, ben.reveal_token);
        assert_ne!(anna.id, ben.id);
    }

    #[test]
    fn add_participant_validates_input() {
        let storage = storage();
        let session = planning_session(&storage);

        assert!(matches!(
            storage.add_participant(&session.id, &NewParticipant::new("", "0791234567")),
            Err(SessionError::InvalidData(_))
        ));
        assert!(matches!(
            storage.add_participant(&session.id, &NewParticipant::new("Anna", "12")),
            Err(SessionError::InvalidData(_))
        ));
    }

    #[test]
    fn add_participant_to_missing_session_fails() {
        let storage = storage();
        let result =
            storage.add_participant(&SessionId::new("missing"), &NewParticipant::new("A", "0791234567"));
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[test]
    fn add_participant_after_draw_fails() {
        let storage = storage();
        let session = planning_session(&storage);
        force_status(&storage, &session.id, SessionStatus::Drawn);

        let result =
            storage.add_participant(&session.id, &NewParticipant::new("Late", "0791234567"));
        assert!(matches!(result, Err(SessionError::InvalidState { .. })));
    }

    #[test]
    fn update_participant() {
        let storage = storage();
        let session = planning_session(&storage);
        let anna = add(&storage, &session, "Anna");

        storage
            .update_participant(&anna.id, "Anna B.", "+49 170 1234567")
            .unwrap();
        let retrieved = storage.get_participant(&anna.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Anna B.");
        assert_eq!(retrieved.phone_number, "+49 170 1234567");
    }

    #[test]
    fn remove_participant_releases_partner() {
        let storage = storage();
        let session = planning_session(&storage);
        let anna = add(&storage, &session, "Anna");
        let ben = add(&storage, &session, "Ben");
        storage.set_partners(&anna.id, &ben.id).unwrap();

        storage.remove_participant(&anna.id).unwrap();

        assert!(storage.get_participant(&anna.id).unwrap().is_none());
        let ben = storage.get_participant(&ben.id).unwrap().unwrap();
        assert!(ben.partner_id.is_none());
    }

    #[test]
    fn remove_participant_after_draw_fails() {
        let storage = storage();
        let session = planning_session(&storage);
        let anna = add(&storage, &session, "Anna");
        force_status(&storage, &session.id, SessionStatus::Drawn);

        assert!(matches!(
            storage.remove_participant(&anna.id),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn set_partners_is_symmetric_and_releases_old_partner() {
        let storage = storage();
        let session = planning_session(&storage);
        let anna = add(&storage, &session, "Anna");
        let ben = add(&storage, &session, "Ben");
        let carla = add(&storage, &session, "Carla");

        storage.set_partners(&anna.id, &ben.id).unwrap();
        let get = |id: &ParticipantId| storage.get_participant(id).unwrap().unwrap();
        assert_eq!(get(&anna.id).partner_id, Some(ben.id.clone()));
        assert_eq!(get(&ben.id).partner_id, Some(anna.id.clone()));

        storage.set_partners(&anna.id, &carla.id).unwrap();
        assert_eq!(get(&anna.id).partner_id, Some(carla.id.clone()));
        assert_eq!(get(&carla.id).partner_id, Some(anna.id.clone()));
        assert!(get(&ben.id).partner_id.is_none());
    }

    #[test]
    fn set_partners_rejects_self_and_cross_session() {
        let storage = storage();
        let first = planning_session(&storage);
        let second = planning_session(&storage);
        let anna = add(&storage, &first, "Anna");
        let ben = add(&storage, &second, "Ben");

        assert!(matches!(
            storage.set_partners(&anna.id, &anna.id),
            Err(SessionError::InvalidData(_))
        ));
        assert!(matches!(
            storage.set_partners(&anna.id, &ben.id),
            Err(SessionError::InvalidData(_))
        ));
    }

    #[test]
    fn clear_partner_clears_both_sides() {
        let storage = storage();
        let session = planning_session(&storage);
        let anna = add(&storage, &session, "Anna");
        let ben = add(&storage, &session, "Ben");
        storage.set_partners(&anna.id, &ben.id).unwrap();

        storage.clear_partner(&ben.id).unwrap();

        assert!(storage.get_participant(&anna.id).unwrap().unwrap().partner_id.is_none());
        assert!(storage.get_participant(&ben.id).unwrap().unwrap().partner_id.is_none());
    }

    #[test]
    fn draw_snapshot_carries_ids_and_partners() {
        let storage = storage();
        let session = planning_session(&storage);
        let anna = add(&storage, &session, "Anna");
        let ben = add(&storage, &session, "Ben");
        let carla = add(&storage, &session, "Carla");
        storage.set_partners(&anna.id, &ben.id).unwrap();

        let snapshot = storage.draw_snapshot(&session.id).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].id, anna.id);
        assert_eq!(snapshot[0].exclusion_partner, Some(ben.id.clone()));
        assert_eq!(snapshot[1].exclusion_partner, Some(anna.id.clone()));
        assert_eq!(snapshot[2].id, carla.id);
        assert!(snapshot[2].exclusion_partner.is_none());
    }

    // ==================== Delivery Tracking Tests ====================

    #[test]
    fn mark_sent_requires_draw() {
        let storage = storage();
        let session = planning_session(&storage);
        let anna = add(&storage, &session, "Anna");

        assert!(matches!(
            storage.mark_whatsapp_sent(&anna.id),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn progress_counts_sent_participants() {
        let storage = storage();
        let session = planning_session(&storage);
        let anna = add(&storage, &session, "Anna");
        let ben = add(&storage, &session, "Ben");
        force_status(&storage, &session.id, SessionStatus::Drawn);

        storage.mark_whatsapp_sent(&anna.id).unwrap();
        let progress = storage.progress(&session.id).unwrap();
        assert_eq!(progress.total, 2);
        assert_eq!(progress.sent, 1);
        assert!(!progress.all_sent());

        storage.mark_whatsapp_sent(&ben.id).unwrap();
        storage.mark_whatsapp_sent(&ben.id).unwrap();
        let progress = storage.progress(&session.id).unwrap();
        assert_eq!(progress.sent, 2);
        assert!(progress.all_sent());
        assert_eq!(progress.viewed, 0);
    }

    #[test]
    fn progress_for_missing_session_fails() {
        let storage = storage();
        assert!(matches!(
            storage.progress(&SessionId::new("missing")),
            Err(SessionError::NotFound(_))
        ));
    }

    // ==================== Credential Tests ====================

    #[test]
    fn register_credential_once() {
        let db = Database::in_memory().unwrap();
        let cred = ServiceCredential::new("first-service-credential").unwrap();
        let other = ServiceCredential::new("second-service-credential").unwrap();

        assert!(matches!(
            db.verify_service_credential(&cred),
            Err(SessionError::Unauthorized(_))
        ));

        db.register_service_credential(&cred).unwrap();
        db.register_service_credential(&cred).unwrap();
        db.verify_service_credential(&cred).unwrap();

        assert!(matches!(
            db.register_service_credential(&other),
            Err(SessionError::Unauthorized(_))
        ));
        assert!(matches!(
            db.verify_service_credential(&other),
            Err(SessionError::Unauthorized(_))
        ));
    }
}
