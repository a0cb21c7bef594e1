//! Configuration for Wichtel.
//!
//! Settings are plain serde structs with defaults for every field, so a
//! config file only needs to list what it changes:
//!
//! ```json
//! { "base_url": "https://wichtel.example", "draw": { "max_attempts": 5000 } }
//! ```
//!
//! The service credential is deliberately absent; it is supplied separately
//! (the CLI reads `WICHTEL_SERVICE_KEY`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::delivery::DEFAULT_COUNTRY_CODE;
use crate::draw::{DrawOptions, DEFAULT_MAX_ATTEMPTS, DEFAULT_MIN_PARTICIPANTS};

/// Error loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for [`WichtelConfig`].
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for the assignment engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawSettings {
    /// Attempt budget for the rejection loop.
    pub max_attempts: u32,
    /// Minimum participant count for a draw. May raise the engine's floor
    /// of three, never lower it.
    pub min_participants: usize,
}

impl Default for DrawSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_participants: DEFAULT_MIN_PARTICIPANTS,
        }
    }
}

impl DrawSettings {
    /// Converts to engine options for a session.
    ///
    /// A configured minimum below [`DEFAULT_MIN_PARTICIPANTS`] is ignored.
    #[must_use]
    pub fn to_options(self, exclusion_enabled: bool) -> DrawOptions {
        DrawOptions::new()
            .with_exclusion(exclusion_enabled)
            .with_max_attempts(self.max_attempts)
            .with_min_participants(self.min_participants.max(DEFAULT_MIN_PARTICIPANTS))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WichtelConfig {
    /// Directory holding the database.
    pub data_dir: PathBuf,
    /// Public base URL; reveal links are `{base_url}/reveal/{token}`.
    pub base_url: String,
    /// Country code for national-format phone numbers.
    pub default_country_code: String,
    /// Whether new sessions exclude partners by default.
    pub exclusion_enabled: bool,
    /// Engine settings.
    pub draw: DrawSettings,
}

impl Default for WichtelConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("wichtel-data"),
            base_url: "http://localhost:3000".to_string(),
            default_country_code: DEFAULT_COUNTRY_CODE.to_string(),
            exclusion_enabled: false,
            draw: DrawSettings::default(),
        }
    }
}

impl WichtelConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Sets the public base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the default country code.
    #[must_use]
    pub fn with_default_country_code(mut self, code: impl Into<String>) -> Self {
        self.default_country_code = code.into();
        self
    }

    /// Sets the default exclusion flag for new sessions.
    #[must_use]
    pub const fn with_exclusion(mut self, enabled: bool) -> Self {
        self.exclusion_enabled = enabled;
        self
    }

    /// Sets the engine settings.
    #[must_use]
    pub const fn with_draw_settings(mut self, draw: DrawSettings) -> Self {
        self.draw = draw;
        self
    }
}
