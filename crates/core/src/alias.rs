//! Alias management
//!
//! An alias is a named connection to an S3-compatible endpoint. Aliases are
//! stored in the configuration file and referenced by remote paths of the
//! form `alias/bucket/prefix`.

use serde::{Deserialize, Serialize};

use crate::config::ConfigManager;
use crate::error::{Error, Result};

/// Default connect timeout for store connections, in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// A named storage endpoint with credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket addressing: "auto", "path" or "dns"
    #[serde(default = "default_bucket_lookup")]
    pub bucket_lookup: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket_lookup() -> String {
    "auto".to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Alias {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: default_region(),
            bucket_lookup: default_bucket_lookup(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }

    /// Check the alias for obviously broken values before it is stored
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("Alias name cannot be empty".to_string()));
        }
        if self.name.contains('/') {
            return Err(Error::Config(format!(
                "Alias name '{}' must not contain '/'",
                self.name
            )));
        }

        let url = url::Url::parse(&self.endpoint)
            .map_err(|e| Error::Config(format!("Invalid endpoint '{}': {e}", self.endpoint)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::Config(format!(
                "Endpoint must use http or https: {}",
                self.endpoint
            )));
        }

        if !matches!(self.bucket_lookup.as_str(), "auto" | "path" | "dns") {
            return Err(Error::Config(
                "Bucket lookup must be 'auto', 'path', or 'dns'".to_string(),
            ));
        }

        Ok(())
    }
}

/// Reads and writes aliases in the configuration file
#[derive(Debug, Clone)]
pub struct AliasManager {
    config_manager: ConfigManager,
}

impl AliasManager {
    /// Create a manager backed by the default configuration file
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_manager: ConfigManager::new()?,
        })
    }

    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Look up an alias by name
    pub fn get(&self, name: &str) -> Result<Alias> {
        let config = self.config_manager.load()?;
        config
            .aliases
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::AliasNotFound(name.to_string()))
    }

    /// Add an alias, replacing any existing one with the same name
    pub fn set(&self, alias: Alias) -> Result<()> {
        alias.validate()?;

        let mut config = self.config_manager.load()?;
        config.aliases.retain(|a| a.name != alias.name);
        config.aliases.push(alias);
        config.aliases.sort_by(|a, b| a.name.cmp(&b.name));
        self.config_manager.save(&config)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let before = config.aliases.len();
        config.aliases.retain(|a| a.name != name);

        if config.aliases.len() == before {
            return Err(Error::AliasNotFound(name.to_string()));
        }

        self.config_manager.save(&config)
    }

    /// All aliases, sorted by name
    pub fn list(&self) -> Result<Vec<Alias>> {
        let mut aliases = self.config_manager.load()?.aliases;
        aliases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(aliases)
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.list()?.iter().any(|a| a.name == name))
    }
}
