//! Reveal tokens and the service credential.
//!
//! # Security
//!
//! - Reveal tokens are 32 random bytes, hex-encoded, and looked up by their
//!   SHA-256 digest
//! - The service credential is never stored; only its digest is registered
//! - Digest comparisons are constant-time
//! - Credential bytes are zeroized on drop

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{Result, SessionError};

/// Length of a reveal token in bytes (before hex encoding).
pub const REVEAL_TOKEN_BYTES: usize = 32;

/// Minimum length of a service credential secret.
pub const MIN_SERVICE_KEY_LEN: usize = 16;

/// Generates a fresh, unguessable reveal token.
#[must_use]
pub fn generate_reveal_token() -> String {
    let mut bytes = [0u8; REVEAL_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    bytes.zeroize();
    token
}

/// SHA-256 digest of a token, used as the lookup key.
#[must_use]
pub fn token_digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

/// Compares two secrets in constant time.
#[must_use]
pub fn secrets_match(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Elevated-trust credential for the assignment boundary.
///
/// Holding one is the only way to obtain an
/// [`AssignmentVault`](super::AssignmentVault). The secret is zeroized when
/// the credential is dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct ServiceCredential {
    secret: Vec<u8>,
}

impl ServiceCredential {
    /// Creates a credential from a secret string.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidData`] if the secret is shorter than
    /// [`MIN_SERVICE_KEY_LEN`] bytes.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into().into_bytes();
        if secret.len() < MIN_SERVICE_KEY_LEN {
            return Err(SessionError::InvalidData(format!(
                "Service key must be at least {MIN_SERVICE_KEY_LEN} bytes"
            )));
        }
        Ok(Self { secret })
    }

    /// Generates a random credential (hex-encoded 32 bytes).
    #[must_use]
    pub fn generate() -> Self {
        Self {
            secret: generate_reveal_token().into_bytes(),
        }
    }

    /// SHA-256 digest of the secret.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(&self.secret).into()
    }

    /// Checks the credential against a registered digest.
    #[must_use]
    pub fn matches_digest(&self, digest: &[u8]) -> bool {
        secrets_match(&self.digest(), digest)
    }

    /// Returns the secret as a string, for handing to an operator once.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        // Constructed only from `String`s, so always valid UTF-8.
        std::str::from_utf8(&self.secret).unwrap_or_default()
    }
}

impl std::fmt::Debug for ServiceCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredential")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveal_tokens_are_hex_and_unique() {
        let a = generate_reveal_token();
        let b = generate_reveal_token();

        assert_eq!(a.len(), REVEAL_TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn token_digest_is_stable() {
        assert_eq!(token_digest("abc"), token_digest("abc"));
        assert_ne!(token_digest("abc"), token_digest("abd"));
        assert_eq!(
            hex::encode(token_digest("abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn secrets_match_compares_contents() {
        assert!(secrets_match(b"same", b"same"));
        assert!(!secrets_match(b"same", b"diff"));
        assert!(!secrets_match(b"short", b"longer"));
    }

    #[test]
    fn credential_rejects_short_secret() {
        assert!(matches!(
            ServiceCredential::new("short"),
            Err(SessionError::InvalidData(_))
        ));
    }

    #[test]
    fn credential_matches_own_digest_only() {
        let cred = ServiceCredential::new("a-long-enough-service-key").unwrap();
        let other = ServiceCredential::new("another-long-service-key").unwrap();

        assert!(cred.matches_digest(&cred.digest()));
        assert!(!cred.matches_digest(&other.digest()));
    }

    #[test]
    fn generated_credential_roundtrips_through_secret() {
        let cred = ServiceCredential::generate();
        let again = ServiceCredential::new(cred.expose_secret()).unwrap();
        assert_eq!(cred.digest(), again.digest());
    }

    #[test]
    fn credential_debug_is_redacted() {
        let cred = ServiceCredential::new("super-secret-service-key").unwrap();
        let debug_str = format!("{cred:?}");
        assert!(debug_str.contains("<redacted>"));
        assert!(!debug_str.contains("super-secret"));
    }

    #[test]
    fn implements_zeroize_on_drop() {
        fn assert_zeroize_on_drop<T: ZeroizeOnDrop>() {}
        assert_zeroize_on_drop::<ServiceCredential>();
    }
}
