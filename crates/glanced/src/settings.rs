//! User-facing settings file.
//!
//! A small TOML key-value file the UI writes; consulted when the
//! notification throttle is built.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch for recognition notifications.
    pub notifications_enabled: bool,
    /// Override for the notification cooldown window, in seconds.
    pub cooldown_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            cooldown_secs: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// Reads the file fresh on every call, so callers can re-load at any
    /// time. The daemon applies settings when the engine is spawned; a
    /// changed file takes effect on the next restart.
    ///
    /// A missing or malformed file falls back to defaults; a broken settings
    /// file must not keep the daemon down.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match toml::from_str(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "bad settings file, using defaults");
                Self::default()
            }
        }
    }

    pub fn effective_cooldown_secs(&self, default_secs: u64) -> u64 {
        self.cooldown_secs.unwrap_or(default_secs)
    }
}
