//! TOML configuration with defaults for every field.
//!
//! # Invariants
//! - A missing file yields `QuotebookConfig::default()`.
//! - `validate()` runs on every load; invalid values never reach the driver.

use crate::logging::default_log_level;
use crate::sync::driver::SyncSettings;
use crate::sync::reconcile::{ConflictPolicy, IdentityMode, ReconcileOptions};
use crate::sync::remote::HttpSourceSettings;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR_NAME: &str = "quotebook";
const DB_FILE_NAME: &str = "quotebook.sqlite3";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_REMOTE_URL: &str = "https://jsonplaceholder.typicode.com/posts";

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuotebookConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Must be absolute; rolling log files are written here.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub fetch_url: String,
    pub push_url: String,
    pub interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Remote posts beyond this prefix are ignored.
    pub fetch_limit: usize,
    pub identity: IdentityMode,
    pub conflict_policy: ConflictPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: app_data_dir().join(DB_FILE_NAME),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: app_data_dir().join("logs"),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_url: DEFAULT_REMOTE_URL.to_string(),
            push_url: DEFAULT_REMOTE_URL.to_string(),
            interval_secs: 30,
            request_timeout_secs: 10,
            fetch_limit: 5,
            identity: IdentityMode::default(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl QuotebookConfig {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and URL syntax.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("sync.fetch_url", &self.sync.fetch_url),
            ("sync.push_url", &self.sync.push_url),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} cannot be empty")));
            }
            url::Url::parse(value)
                .map_err(|err| ConfigError::Invalid(format!("{name} `{value}`: {err}")))?;
        }
        if self.sync.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync.interval_secs must be greater than 0".into(),
            ));
        }
        if self.sync.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync.request_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.sync.fetch_limit == 0 {
            return Err(ConfigError::Invalid(
                "sync.fetch_limit must be greater than 0".into(),
            ));
        }
        if !self.logging.dir.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "logging.dir must be absolute, got `{}`",
                self.logging.dir.display()
            )));
        }
        Ok(())
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            interval: Duration::from_secs(self.sync.interval_secs),
            request_timeout: Duration::from_secs(self.sync.request_timeout_secs),
        }
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            identity: self.sync.identity,
            policy: self.sync.conflict_policy,
        }
    }

    pub fn http_source_settings(&self) -> HttpSourceSettings {
        HttpSourceSettings {
            fetch_url: self.sync.fetch_url.clone(),
            push_url: self.sync.push_url.clone(),
            fetch_limit: self.sync.fetch_limit,
        }
    }
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}
