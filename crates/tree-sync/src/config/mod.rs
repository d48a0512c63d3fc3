//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{Result, SyncError};
use std::path::Path;

/// Environment variables that override connection settings.
pub const ENV_HOST: &str = "TREE_SYNC_PG_HOST";
pub const ENV_PORT: &str = "TREE_SYNC_PG_PORT";
pub const ENV_USER: &str = "TREE_SYNC_PG_USER";
pub const ENV_PASSWORD: &str = "TREE_SYNC_PG_PASSWORD";
pub const ENV_DATABASE: &str = "TREE_SYNC_PG_DATABASE";

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Override connection settings from `TREE_SYNC_PG_*` environment variables.
    ///
    /// Keeps the password out of the config file.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.target.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.target.port = port
                .parse()
                .map_err(|_| SyncError::Config(format!("{} must be a port number", ENV_PORT)))?;
        }
        if let Some(user) = lookup(ENV_USER) {
            self.target.user = user;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.target.password = password;
        }
        if let Some(database) = lookup(ENV_DATABASE) {
            self.target.database = database;
        }
        self.validate()?;
        Ok(self)
    }
}
