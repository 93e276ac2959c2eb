//! Configuration management
//!
//! Handles loading and saving the bsync configuration file.
//! The file lives at `$BSYNC_CONFIG_DIR/config.toml`, falling back to
//! `<platform config dir>/bsync/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::alias::Alias;
use crate::error::{Error, Result};

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "BSYNC_CONFIG_DIR";

/// Default number of upload workers in concurrent mode
pub const DEFAULT_WORKERS: usize = 10;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Top-level configuration file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub aliases: Vec<Alias>,
}

/// Defaults applied to every command unless overridden on the command line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Output format: "human" or "json"
    #[serde(default = "default_output")]
    pub output: String,

    /// Color mode: "auto", "always" or "never"
    #[serde(default = "default_color")]
    pub color: String,

    /// Worker count for concurrent uploads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Exclusion rules prepended to the ones given on the command line
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_output() -> String {
    "human".to_string()
}

fn default_color() -> String {
    "auto".to_string()
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            workers: default_workers(),
            exclude: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            aliases: Vec::new(),
        }
    }
}

/// Loads and persists [`Config`]
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a manager for the default configuration location
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::config_dir()
                .ok_or_else(|| Error::Config("Cannot determine config directory".to_string()))?
                .join("bsync"),
        };

        Ok(Self::with_path(dir.join(CONFIG_FILE_NAME)))
    }

    /// Create a manager for an explicit configuration file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the configuration, returning defaults when the file does not exist
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "Config file missing, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&content)?;

        if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Unsupported config schema version {} (max {SCHEMA_VERSION})",
                config.schema_version
            )));
        }

        Ok(config)
    }

    /// Write the configuration, creating parent directories as needed
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            // The file holds credentials
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, perms)?;
        }

        Ok(())
    }
}
