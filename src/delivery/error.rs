//! Error types for delivery link construction.

use thiserror::Error;

/// Error type for delivery operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Phone number failed validation.
    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    /// Base URL for reveal links is unusable.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_phone_number_display() {
        let err = DeliveryError::InvalidPhoneNumber("abc".to_string());
        assert_eq!(err.to_string(), "Invalid phone number: abc");
    }

    #[test]
    fn invalid_base_url_display() {
        let err = DeliveryError::InvalidBaseUrl("ftp://x".to_string());
        assert_eq!(err.to_string(), "Invalid base URL: ftp://x");
    }
}
