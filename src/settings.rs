use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::handle::Credentials;

/// Environment variable consulted for the secret token when the config
/// file leaves `token` unset. Read once, at load time.
pub const TOKEN_ENV: &str = "SNAPVAULT_TOKEN";

/// Process configuration, loaded from a TOML file exactly once at startup
/// and passed by reference from there on. Lifecycle operations never read
/// the environment themselves.
///
/// Example TOML:
/// ```toml
/// name            = "nfldb-backup"
/// local_path      = "/var/backups/nfldb"
/// remote_url      = "https://github.com/example/nfldb-backup.git"
/// username        = "backup-bot"
/// committer_email = "backup-bot@example.com"
/// # token is usually supplied via SNAPVAULT_TOKEN instead
/// network_timeout_secs = 300
/// ```
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub name: String,
    pub local_path: PathBuf,
    pub remote_url: String,
    pub username: String,
    #[serde(default)]
    pub token: Option<String>,
    pub committer_email: String,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub network_timeout_secs: Option<u64>,
}

impl Settings {
    /// Load and parse the config file, filling `token` from
    /// [`TOKEN_ENV`] if the file leaves it unset.
    ///
    /// # Errors
    /// - the file cannot be read (the message includes the resolved path)
    /// - the TOML fails to parse
    pub fn load(path: &Path) -> Result<Settings> {
        let txt = fs::read_to_string(path)
            .with_context(|| format!("config not found: {}", path.display()))?;
        let mut settings: Settings =
            toml::from_str(&txt).context("failed to parse config")?;
        if settings.token.is_none()
            && let Ok(token) = env::var(TOKEN_ENV)
        {
            settings.token = Some(token);
        }
        Ok(settings)
    }

    /// Credentials for the handle.
    ///
    /// # Errors
    /// Returns an error if no token was configured in the file or the
    /// environment.
    pub fn credentials(&self) -> Result<Credentials> {
        let token = self
            .token
            .clone()
            .with_context(|| format!("no token configured (set `token` or {})", TOKEN_ENV))?;
        Ok(Credentials {
            username: self.username.clone(),
            token,
            email: self.committer_email.clone(),
        })
    }

    /// Wall-clock limit for the network-bound steps, if configured.
    pub fn network_timeout(&self) -> Option<Duration> {
        self.network_timeout_secs.map(Duration::from_secs)
    }
}
