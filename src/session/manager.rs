//! High-level session management API.
//!
//! [`SessionManager`] ties the ordinary [`SessionStorage`], the privileged
//! [`AssignmentVault`] and the assignment engine together into the
//! organizer's workflow:
//!
//! 1. Create a session and add participants (planning)
//! 2. Draw: snapshot participants, generate, submit (drawn)
//! 3. Send each participant their personal reveal link
//! 4. Participants reveal their own receiver with their token

use std::path::Path;

use rand::Rng;

use super::error::{Result, SessionError};
use super::storage::{Database, SessionStorage};
use super::token::ServiceCredential;
use super::types::{
    DeliveryLink, NewSession, RevealedAssignment, Session, SessionId, SessionProgress,
    SessionStatus, SubmissionReceipt, SubmissionRequest,
};
use super::vault::AssignmentVault;
use crate::config::WichtelConfig;
use crate::delivery::{reveal_url, whatsapp_url};
use crate::draw::{generate_assignment_with_rng, Assignment, DrawOptions};

/// File name of the database inside the data directory.
const DATABASE_FILE: &str = "wichtel.db";

/// High-level API for running Secret Santa sessions.
///
/// # Example
///
/// ```ignore
/// use std::path::Path;
/// use wichtel_core::config::WichtelConfig;
/// use wichtel_core::session::{ServiceCredential, SessionManager};
///
/// let credential = ServiceCredential::new(std::env::var("WICHTEL_SERVICE_KEY")?)?;
/// let manager = SessionManager::open(Path::new("/data/wichtel"), &credential, WichtelConfig::default())?;
/// let receipt = manager.draw(&session_id)?;
/// ```
#[derive(Debug)]
pub struct SessionManager {
    storage: SessionStorage,
    vault: AssignmentVault,
    config: WichtelConfig,
}

impl SessionManager {
    /// Opens the manager over `data_dir`.
    ///
    /// Creates the directory and database if they don't exist. On a fresh
    /// database the credential is registered as the service credential.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails or the credential does not
    /// match the registered one.
    pub fn open(
        data_dir: &Path,
        credential: &ServiceCredential,
        config: WichtelConfig,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| SessionError::Storage(format!("Failed to create data directory: {e}")))?;

        let db = Database::open(&data_dir.join(DATABASE_FILE))?;
        Self::with_database(db, credential, config)
    }

    /// Creates a manager over an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory(credential: &ServiceCredential, config: WichtelConfig) -> Result<Self> {
        Self::with_database(Database::in_memory()?, credential, config)
    }

    fn with_database(
        db: Database,
        credential: &ServiceCredential,
        config: WichtelConfig,
    ) -> Result<Self> {
        db.register_service_credential(credential)?;
        let vault = AssignmentVault::new(db.clone(), credential)?;

        Ok(Self {
            storage: SessionStorage::new(db),
            vault,
            config,
        })
    }

    /// Ordinary session and participant access.
    #[must_use]
    pub const fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &WichtelConfig {
        &self.config
    }

    /// Creates a session using the configured exclusion default.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or storage fails.
    pub fn create_session(&self, name: &str, organizer_id: &str) -> Result<Session> {
        self.storage.create_session(
            &NewSession::new(name, organizer_id).with_exclusion(self.config.exclusion_enabled),
        )
    }

    // ==================== Draw ====================

    /// Generates an assignment for a planning session without persisting it.
    ///
    /// Keep the result to retry [`submit`](Self::submit) with the same
    /// mapping if submission fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is missing or not `planning`, or the
    /// engine fails.
    pub fn prepare_draw(&self, session_id: &SessionId) -> Result<Assignment> {
        self.prepare_draw_with_rng(session_id, &mut rand::thread_rng())
    }

    /// Same as [`prepare_draw`](Self::prepare_draw) with an injected RNG.
    ///
    /// # Errors
    ///
    /// Same as [`prepare_draw`](Self::prepare_draw).
    pub fn prepare_draw_with_rng<R>(&self, session_id: &SessionId, rng: &mut R) -> Result<Assignment>
    where
        R: Rng + ?Sized,
    {
        let session = self.require_session(session_id)?;
        if session.status != SessionStatus::Planning {
            return Err(SessionError::InvalidState {
                expected: SessionStatus::Planning,
                actual: session.status,
            });
        }

        let participants = self.storage.draw_snapshot(session_id)?;
        let options = self.draw_options(&session);
        Ok(generate_assignment_with_rng(&participants, &options, rng)?)
    }

    /// Submits a prepared assignment through the vault.
    ///
    /// # Errors
    ///
    /// See [`AssignmentVault::submit`].
    pub fn submit(&self, session_id: &SessionId, assignment: &Assignment) -> Result<SubmissionReceipt> {
        self.vault
            .submit(&SubmissionRequest::new(session_id.clone(), assignment))
    }

    /// Generates and submits an assignment.
    ///
    /// # Errors
    ///
    /// Returns an error if generation or submission fails. The session stays
    /// in `planning` on failure.
    pub fn draw(&self, session_id: &SessionId) -> Result<SubmissionReceipt> {
        let assignment = self.prepare_draw(session_id)?;
        self.submit(session_id, &assignment)
    }

    /// Replaces the current draw with a fresh one.
    ///
    /// All reveal tokens are replaced, so links from the old draw stop
    /// working. The new assignment is generated before anything is touched
    /// and written in a single transaction; if either step fails, the old
    /// draw and its links stay valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not `drawn`, or the new draw fails.
    pub fn redraw(&self, session_id: &SessionId) -> Result<SubmissionReceipt> {
        self.redraw_with_rng(session_id, &mut rand::thread_rng())
    }

    /// Same as [`redraw`](Self::redraw) with an injected RNG.
    ///
    /// # Errors
    ///
    /// Same as [`redraw`](Self::redraw).
    pub fn redraw_with_rng<R>(&self, session_id: &SessionId, rng: &mut R) -> Result<SubmissionReceipt>
    where
        R: Rng + ?Sized,
    {
        let session = self.require_session(session_id)?;
        if session.status != SessionStatus::Drawn {
            return Err(SessionError::InvalidState {
                expected: SessionStatus::Drawn,
                actual: session.status,
            });
        }

        let participants = self.storage.draw_snapshot(session_id)?;
        let options = self.draw_options(&session);
        let assignment = generate_assignment_with_rng(&participants, &options, rng)?;
        self.vault
            .resubmit(&SubmissionRequest::new(session_id.clone(), &assignment))
    }

    // ==================== Reveal ====================

    /// Reveals the assignment for a token holder.
    ///
    /// # Errors
    ///
    /// See [`AssignmentVault::reveal`].
    pub fn reveal(&self, token: &str) -> Result<RevealedAssignment> {
        self.vault.reveal(token)
    }

    /// Records the first view of a reveal link.
    ///
    /// # Errors
    ///
    /// See [`AssignmentVault::track_view`].
    pub fn track_view(&self, token: &str) -> Result<bool> {
        self.vault.track_view(token)
    }

    // ==================== Delivery ====================

    /// Builds reveal and WhatsApp links for every participant.
    ///
    /// The organizer gets no WhatsApp link; they open their own reveal link.
    ///
    /// # Errors
    ///
    /// Returns an error if the session has not been drawn, `base_url` is
    /// invalid, or a phone number cannot be used.
    pub fn delivery_links(&self, session_id: &SessionId, base_url: &str) -> Result<Vec<DeliveryLink>> {
        let session = self.require_drawn(session_id)?;

        self.storage
            .list_participants(session_id)?
            .into_iter()
            .map(|participant| -> Result<DeliveryLink> {
                let url = reveal_url(base_url, &participant.reveal_token)?;
                let whatsapp = if participant.is_organizer {
                    None
                } else {
                    Some(whatsapp_url(
                        &participant.name,
                        &participant.phone_number,
                        &url,
                        &session.name,
                        &self.config.default_country_code,
                    )?)
                };

                Ok(DeliveryLink {
                    participant_id: participant.id,
                    name: participant.name,
                    reveal_url: url,
                    whatsapp_url: whatsapp,
                    sent: participant.whatsapp_sent_at.is_some(),
                })
            })
            .collect()
    }

    /// Marks the organizer's own link as sent and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the session has not been drawn or has no
    /// organizer participant.
    pub fn open_own_link(&self, session_id: &SessionId) -> Result<String> {
        self.require_drawn(session_id)?;

        let organizer = self
            .storage
            .list_participants(session_id)?
            .into_iter()
            .find(|p| p.is_organizer)
            .ok_or_else(|| SessionError::NotFound(format!("Organizer of session {session_id}")))?;

        self.storage.mark_whatsapp_sent(&organizer.id)?;
        Ok(reveal_url(&self.config.base_url, &organizer.reveal_token)?)
    }

    /// Delivery progress of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session doesn't exist.
    pub fn progress(&self, session_id: &SessionId) -> Result<SessionProgress> {
        self.storage.progress(session_id)
    }

    // ==================== Helpers ====================

    fn draw_options(&self, session: &Session) -> DrawOptions {
        self.config.draw.to_options(session.exclusion_enabled)
    }

    fn require_session(&self, session_id: &SessionId) -> Result<Session> {
        self.storage
            .get_session(session_id)?
            .ok_or_else(|| SessionError::NotFound(format!("Session {session_id}")))
    }

    fn require_drawn(&self, session_id: &SessionId) -> Result<Session> {
        let session = self.require_session(session_id)?;
        if session.status.is_drawn() {
            Ok(session)
        } else {
            Err(SessionError::NotDrawn)
        }
    }
}
