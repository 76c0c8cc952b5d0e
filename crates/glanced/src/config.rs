use glance_core::cluster::{
    CandidateScope, ClusterConfig, DEFAULT_LIVE_THRESHOLD, DEFAULT_STORAGE_THRESHOLD,
};
use glance_core::throttle::{DEFAULT_BURST_SECS, DEFAULT_COOLDOWN_SECS};
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Maximum L2 distance for a live recognition hit.
    pub live_threshold: f32,
    /// Maximum L2 distance for merging a capture into an existing identity.
    pub storage_threshold: f32,
    /// Seconds between two notifications for the same identity.
    pub cooldown_secs: u64,
    /// Short-memory window suppressing re-triggers within one detection burst.
    pub burst_secs: u64,
    /// Compare captures against every stored face, or one per identity.
    pub scope: CandidateScope,
    /// Save unrecognized live detections into the gallery automatically.
    pub auto_save_unrecognized: bool,
    /// Path to the TOML settings file.
    pub settings_path: PathBuf,
}

impl Config {
    /// Load configuration from `GLANCE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let settings_path = std::env::var("GLANCE_SETTINGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let config_dir = std::env::var("XDG_CONFIG_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| {
                        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                        PathBuf::from(home).join(".config")
                    });
                config_dir.join("glance/settings.toml")
            });

        Self {
            live_threshold: env_f32("GLANCE_LIVE_THRESHOLD", DEFAULT_LIVE_THRESHOLD),
            storage_threshold: env_f32("GLANCE_STORAGE_THRESHOLD", DEFAULT_STORAGE_THRESHOLD),
            cooldown_secs: env_u64("GLANCE_COOLDOWN_SECS", DEFAULT_COOLDOWN_SECS),
            burst_secs: env_u64("GLANCE_BURST_SECS", DEFAULT_BURST_SECS),
            scope: match std::env::var("GLANCE_MATCH_SCOPE").as_deref() {
                Ok("per-identity") => CandidateScope::PerIdentity,
                _ => CandidateScope::AllFaces,
            },
            auto_save_unrecognized: std::env::var("GLANCE_AUTO_SAVE")
                .map(|v| v == "1")
                .unwrap_or(false),
            settings_path,
        }
    }

    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            live_threshold: self.live_threshold,
            storage_threshold: self.storage_threshold,
            scope: self.scope,
            auto_save_unrecognized: self.auto_save_unrecognized,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
