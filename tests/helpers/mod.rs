//! Reusable test helpers for session integration tests.
//!
//! Sessions are created through the real `SessionManager`, backed either by
//! an in-memory database or a `tempfile` directory. No mocking is needed.

#![allow(dead_code)]

use wichtel_core::draw::Participant;
use wichtel_core::session::{
    NewParticipant, ParticipantRecord, ServiceCredential, Session, SessionManager,
};
use wichtel_core::WichtelConfig;

/// Service key shared by the integration tests.
pub const TEST_SERVICE_KEY: &str = "integration-test-service-key";

/// Returns the test service credential.
pub fn credential() -> ServiceCredential {
    ServiceCredential::new(TEST_SERVICE_KEY).unwrap()
}

/// Creates an in-memory manager with the given config.
pub fn memory_manager(config: WichtelConfig) -> SessionManager {
    SessionManager::in_memory(&credential(), config).unwrap()
}

/// Creates a session and adds one participant per name.
///
/// Phone numbers are distinct Swiss mobile numbers.
pub fn seeded_session(
    manager: &SessionManager,
    names: &[&str],
) -> (Session, Vec<ParticipantRecord>) {
    let session = manager.create_session("Wichteln 2026", "org-1").unwrap();
    let people = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let phone = format!("079 555 {:02} {:02}", i / 100, i % 100);
            manager
                .storage()
                .add_participant(&session.id, &NewParticipant::new(*name, phone))
                .unwrap()
        })
        .collect();
    (session, people)
}

/// Builds engine participants `p0..pN` without partners.
pub fn engine_participants(n: usize) -> Vec<Participant> {
    (0..n).map(|i| Participant::new(format!("p{i}"))).collect()
}
