//! Delivery of reveal links to participants.
//!
//! Each participant receives a personal reveal link over WhatsApp. This
//! module only builds strings: it validates and normalizes phone numbers
//! and assembles `api.whatsapp.com` deep links. Nothing here touches the
//! assignment itself.

mod error;
pub mod phone;
pub mod whatsapp;

pub use error::{DeliveryError, Result};
pub use phone::{
    detect_country_code, format_phone_number, is_valid_phone_number, normalize_phone_number,
    DEFAULT_COUNTRY_CODE,
};
pub use whatsapp::{reveal_url, whatsapp_message, whatsapp_url};
