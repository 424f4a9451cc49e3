//! Engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

const APP_DIR: &str = "mailsync";

/// Top-level engine configuration, stored as JSON.
///
/// Every field has a default, so a partial file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Protocol stage timeouts for both clients.
    pub timeouts: Timeouts,
    /// Upper bound on simultaneous protocol connections per account.
    pub max_connections_per_account: usize,
    /// Well-known folder names.
    pub folders: WellKnownFolders,
    /// Fetch limit used by the background daemon.
    pub default_fetch_limit: Option<usize>,
    /// Default page size for cache listings.
    pub cached_page_size: u32,
    /// Database location; defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
    /// Daemon tick interval in seconds.
    pub poll_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            max_connections_per_account: 2,
            folders: WellKnownFolders::default(),
            default_fetch_limit: Some(200),
            cached_page_size: 50,
            database_path: None,
            poll_interval_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a JSON file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded engine config");
        Ok(config)
    }

    /// Rejects durations that would stall or disable the engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first zero duration.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("poll_interval_secs", self.poll_interval_secs),
            ("timeouts.connect_secs", self.timeouts.connect_secs),
            ("timeouts.auth_secs", self.timeouts.auth_secs),
            ("timeouts.command_secs", self.timeouts.command_secs),
        ];
        match durations.iter().find(|(_, secs)| *secs == 0) {
            Some((name, _)) => Err(Error::Configuration(format!("{name} must be at least 1"))),
            None => Ok(()),
        }
    }

    /// Loads from `<config_dir>/mailsync/config.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no config directory or the file
    /// is malformed.
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_path()?)
    }

    /// Default location of the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no config directory.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join("config.json"))
            .ok_or_else(|| Error::Configuration("no platform config directory".into()))
    }

    /// Resolves the database path, falling back to `<data_dir>/mailsync/mailsync.db`.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is set and the platform has no data
    /// directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join("mailsync.db"))
            .ok_or_else(|| Error::Configuration("no platform data directory".into()))
    }

    /// Daemon tick interval, never shorter than one second.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Timeouts applied to every protocol stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// TCP connect plus TLS handshake and greeting.
    pub connect_secs: u64,
    /// Login / AUTH exchange.
    pub auth_secs: u64,
    /// Any single command round-trip after authentication.
    pub command_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_secs: 30,
            auth_secs: 30,
            command_secs: 120,
        }
    }
}

impl Timeouts {
    // Zero is raised to one second so no stage expires before it starts.

    /// Connect stage timeout.
    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs.max(1))
    }

    /// Authentication stage timeout.
    #[must_use]
    pub fn auth(&self) -> Duration {
        Duration::from_secs(self.auth_secs.max(1))
    }

    /// Command stage timeout.
    #[must_use]
    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs.max(1))
    }
}

/// Conventional folder names shared by every account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WellKnownFolders {
    /// Incoming mail.
    pub inbox: String,
    /// Archived copies of sent mail.
    pub sent: String,
    /// Target of move-to-trash.
    pub trash: String,
    /// Draft storage.
    pub drafts: String,
}

impl Default for WellKnownFolders {
    fn default() -> Self {
        Self {
            inbox: "INBOX".into(),
            sent: "Sent".into(),
            trash: "Trash".into(),
            drafts: "Drafts".into(),
        }
    }
}
