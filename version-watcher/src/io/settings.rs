//! Version watcher settings (TOML).

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::types::BotIdentity;
use crate::io::executor::DEFAULT_OUTPUT_LIMIT_BYTES;

/// Settings file contents.
///
/// Every field is optional in the file; missing fields fall back to the
/// defaults used by the CI action.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Identity for generated merge commits.
    pub identity: BotIdentity,

    /// Largest diff (in changed paths) that is merged forward automatically.
    pub max_changed_files: usize,

    /// Kill any single git command after this many seconds. Unset: wait forever.
    pub command_timeout_secs: Option<u64>,

    /// Bytes of stdout/stderr kept per git command.
    pub output_limit_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            identity: BotIdentity::default(),
            max_changed_files: 1,
            command_timeout_secs: None,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.identity.name.trim().is_empty() {
            return Err(anyhow!("identity.name must not be empty"));
        }
        if self.identity.email.trim().is_empty() {
            return Err(anyhow!("identity.email must not be empty"));
        }
        if self.max_changed_files == 0 {
            return Err(anyhow!("max_changed_files must be > 0"));
        }
        if self.command_timeout_secs == Some(0) {
            return Err(anyhow!("command_timeout_secs must be > 0 when set"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `Settings::default()`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        let settings = Settings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: Settings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}
