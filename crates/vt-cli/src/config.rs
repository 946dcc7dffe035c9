//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use vt_core::host::DEFAULT_SUPPRESS_MARKER;
use vt_core::{DEFAULT_MAX_CONFIG_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS, WatchdogOptions};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Milliseconds between watchdog ticks.
    pub poll_interval_ms: u64,

    /// Ticks to wait for a dashboard's configuration before using defaults.
    pub max_config_attempts: u32,

    /// Query-string markers that suppress the watchdog.
    pub suppress_markers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_config_attempts: DEFAULT_MAX_CONFIG_ATTEMPTS,
            suppress_markers: vec![DEFAULT_SUPPRESS_MARKER.to_string()],
        }
    }
}

impl Config {
    /// Loads configuration from default locations, optionally layering a
    /// specific file on top.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (VT_*)
        figment = figment.merge(Env::prefixed("VT_"));

        figment.extract()
    }

    /// Watchdog tuning derived from this configuration.
    ///
    /// The poll interval is at least one millisecond.
    pub fn watchdog_options(&self) -> WatchdogOptions {
        WatchdogOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            max_config_attempts: self.max_config_attempts,
        }
    }
}

/// Returns the platform-specific config directory for vt.
///
/// On Linux: `~/.config/view-timeout`
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("view-timeout"))
}
