//! Runtime settings for `parcelkit`.
//!
//! Sources, lowest to highest priority: built-in defaults, an optional TOML
//! file passed with `--config`, then the process environment.
//!
//! # Example
//!
//! ```toml
//! [credentials]
//! client_id = "..."
//! client_secret = "..."
//!
//! [provider]
//! environment = "production"
//! specs_dir = "/opt/ups/specs"
//! transaction_source = "warehouse-bot"
//!
//! [defaults]
//! account_number = "A1B2C3"
//! ```

use std::path::{Path, PathBuf};

use parcelkit_client::Environment;
use parcelkit_core::{ConfigSource, ACCOUNT_NUMBER_KEY};
use serde::Deserialize;
use thiserror::Error;

pub const CLIENT_ID_KEY: &str = "CLIENT_ID";
pub const CLIENT_SECRET_KEY: &str = "CLIENT_SECRET";
pub const ENVIRONMENT_KEY: &str = "ENVIRONMENT";
pub const SPECS_DIR_KEY: &str = "UPS_MCP_SPECS_DIR";

const DEFAULT_TRANSACTION_SOURCE: &str = "ups-mcp";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse '{}': {detail}", path.display())]
    Parse { path: PathBuf, detail: String },
    #[error("{0}")]
    InvalidEnvironment(String),
    #[error("Missing required configuration: {0} must be set before starting the server.")]
    MissingKey(&'static str),
}

// ── File format ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub credentials: CredentialsSection,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub defaults: DefaultsSection,
}

/// `[credentials]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsSection {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// `[provider]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSection {
    pub environment: Option<String>,
    pub specs_dir: Option<PathBuf>,
    pub transaction_source: Option<String>,
}

/// `[defaults]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsSection {
    pub account_number: Option<String>,
}

pub fn read_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

// ── Resolved settings ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct Settings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub environment: Environment,
    pub account_number: Option<String>,
    pub specs_dir: Option<PathBuf>,
    pub transaction_source: String,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("client_id", &self.client_id.as_ref().map(|_| "<set>"))
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<set>"))
            .field("environment", &self.environment)
            .field("account_number", &self.account_number.as_ref().map(|_| "<set>"))
            .field("specs_dir", &self.specs_dir)
            .field("transaction_source", &self.transaction_source)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Settings {
    /// Settings from `--config` (if any) overlaid with the process environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => read_config_file(path)?,
            None => FileConfig::default(),
        };
        Settings::resolve(file, &|key| std::env::var(key).ok())
    }

    /// Merges a parsed file with an environment lookup. Blank values in
    /// either source count as unset.
    pub fn resolve(
        file: FileConfig,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let pick = |key: &str, from_file: Option<String>| non_empty(env(key)).or(non_empty(from_file));

        let environment = match pick(ENVIRONMENT_KEY, file.provider.environment) {
            Some(name) => name.parse().map_err(ConfigError::InvalidEnvironment)?,
            None => Environment::default(),
        };

        Ok(Settings {
            client_id: pick(CLIENT_ID_KEY, file.credentials.client_id),
            client_secret: pick(CLIENT_SECRET_KEY, file.credentials.client_secret),
            environment,
            account_number: pick(ACCOUNT_NUMBER_KEY, file.defaults.account_number),
            specs_dir: non_empty(env(SPECS_DIR_KEY))
                .map(PathBuf::from)
                .or(file.provider.specs_dir),
            transaction_source: non_empty(file.provider.transaction_source)
                .unwrap_or_else(|| DEFAULT_TRANSACTION_SOURCE.to_string()),
        })
    }

    /// Fails naming the first missing credential.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        if self.client_id.is_none() {
            return Err(ConfigError::MissingKey(CLIENT_ID_KEY));
        }
        if self.client_secret.is_none() {
            return Err(ConfigError::MissingKey(CLIENT_SECRET_KEY));
        }
        Ok(())
    }
}

impl ConfigSource for Settings {
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            ACCOUNT_NUMBER_KEY => self.account_number.clone(),
            _ => None,
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
