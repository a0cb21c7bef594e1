//! WhatsApp deep links for reveal delivery.
//!
//! Links use `https://api.whatsapp.com/send`, which opens the app on mobile
//! and WhatsApp Web on desktop.

use super::error::{DeliveryError, Result};
use super::phone::{is_valid_phone_number, normalize_phone_number};

const WHATSAPP_SEND_URL: &str = "https://api.whatsapp.com/send";

/// Fallback event name when the session has none.
const DEFAULT_EVENT_NAME: &str = "unser Wichteln";

/// Builds the personal reveal URL for a token.
///
/// # Errors
///
/// Returns [`DeliveryError::InvalidBaseUrl`] unless `base_url` is an
/// `http(s)` URL.
///
/// # Examples
///
/// ```
/// use wichtel_core::delivery::reveal_url;
///
/// let url = reveal_url("https://wichtel.example/", "abc123").unwrap();
/// assert_eq!(url, "https://wichtel.example/reveal/abc123");
/// ```
pub fn reveal_url(base_url: &str, token: &str) -> Result<String> {
    let base = base_url.trim().trim_end_matches('/');
    let has_host = base
        .strip_prefix("https://")
        .or_else(|| base.strip_prefix("http://"))
        .is_some_and(|host| !host.is_empty());

    if !has_host {
        return Err(DeliveryError::InvalidBaseUrl(base_url.to_string()));
    }

    Ok(format!("{base}/reveal/{token}"))
}

/// Composes the message sent alongside the reveal link.
#[must_use]
pub fn whatsapp_message(participant_name: &str, reveal_url: &str, session_name: &str) -> String {
    let event = if session_name.trim().is_empty() {
        DEFAULT_EVENT_NAME
    } else {
        session_name
    };

    format!(
        "Hallo {participant_name}! 🎄\n\nHier ist dein Link für {event}:\n{reveal_url}\n\nÖffne den Link, um zu sehen, wen du beschenkst! 🎁"
    )
}

/// Builds a WhatsApp deep link with a pre-filled message.
///
/// # Errors
///
/// Returns [`DeliveryError::InvalidPhoneNumber`] if the number fails
/// validation.
pub fn whatsapp_url(
    participant_name: &str,
    phone_number: &str,
    reveal_url: &str,
    session_name: &str,
    default_country_code: &str,
) -> Result<String> {
    if !is_valid_phone_number(phone_number) {
        return Err(DeliveryError::InvalidPhoneNumber(phone_number.to_string()));
    }

    let phone = normalize_phone_number(phone_number, default_country_code);
    let message = whatsapp_message(participant_name, reveal_url, session_name);

    Ok(format!(
        "{WHATSAPP_SEND_URL}?phone={phone}&text={}",
        urlencoding::encode(&message)
    ))
}
