//! Wichtel Core Library
//!
//! Core functionality for Wichtel - anonymous Secret Santa draws.
//!
//! - [`draw`]: the assignment engine (random derangement with optional
//!   partner exclusion)
//! - [`session`]: sessions, participants and the privileged assignment vault
//! - [`delivery`]: phone number handling and WhatsApp reveal links
//! - [`config`]: runtime configuration

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod config;
pub mod delivery;
pub mod draw;
pub mod session;

pub use config::WichtelConfig;
pub use session::SessionManager;
