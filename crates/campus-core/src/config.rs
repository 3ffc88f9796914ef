//! Runtime configuration: an optional TOML file, then environment overrides.
//!
//! ```toml
//! database_url = "postgres://localhost/campus"
//! bind = "0.0.0.0:3000"
//!
//! [batch]
//! batch_size = 10
//! pause_ms = 100
//! max_retries = 0
//! retry_backoff_ms = 200
//!
//! [narrative]
//! base_url = "https://openrouter.ai/api/v1"
//! model = "openai/gpt-4o-mini"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "campus.toml";

pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CampusConfig {
    pub database_url: Option<String>,
    pub bind: String,
    pub batch: BatchSettings,
    pub narrative: NarrativeConfig,
}

impl Default for CampusConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            bind: "0.0.0.0:3000".to_string(),
            batch: BatchSettings::default(),
            narrative: NarrativeConfig::default(),
        }
    }
}

/// Wave sizing and throttling for the batch writer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub pause_ms: u64,
    /// Extra attempts per failed create; 0 records the failure and moves on.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            pause_ms: 100,
            max_retries: 0,
            retry_backoff_ms: 200,
        }
    }
}

impl BatchSettings {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Delay before retry `attempt` (0-based): `retry_backoff * 2^attempt`,
    /// capped at [`MAX_RETRY_BACKOFF`].
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.retry_backoff().checked_mul(factor))
            .map_or(MAX_RETRY_BACKOFF, |delay| delay.min(MAX_RETRY_BACKOFF))
    }

    /// Pool size that lets every create in a wave hold a connection, with a
    /// floor for the report queries.
    pub fn pool_connections(&self) -> u32 {
        u32::try_from(self.batch_size.max(5)).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "openai/gpt-4o-mini".to_string(),
            temperature: 0.4,
            timeout_secs: 60,
        }
    }
}

impl NarrativeConfig {
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }
}

impl CampusConfig {
    /// Loads `path`, else `$CAMPUS_CONFIG`, else `./campus.toml` when present,
    /// then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("CAMPUS_CONFIG").ok().map(PathBuf::from))
            .or_else(|| {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            });

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CAMPUS_DATABASE_URL").or_else(|| lookup("DATABASE_URL")) {
            self.database_url = Some(url);
        }
        if let Some(bind) = lookup("CAMPUS_BIND") {
            self.bind = bind;
        }
        if let Some(value) = parse_var(&lookup, "CAMPUS_BATCH_SIZE")? {
            self.batch.batch_size = value;
        }
        if let Some(value) = parse_var(&lookup, "CAMPUS_BATCH_PAUSE_MS")? {
            self.batch.pause_ms = value;
        }
        if let Some(value) = parse_var(&lookup, "CAMPUS_MAX_RETRIES")? {
            self.batch.max_retries = value;
        }
        if let Some(value) = parse_var(&lookup, "CAMPUS_RETRY_BACKOFF_MS")? {
            self.batch.retry_backoff_ms = value;
        }
        if let Some(url) = lookup("CAMPUS_NARRATIVE_BASE_URL") {
            self.narrative.base_url = Some(url);
        }
        if let Some(key) = lookup("CAMPUS_NARRATIVE_API_KEY") {
            self.narrative.api_key = Some(key);
        }
        if let Some(model) = lookup("CAMPUS_NARRATIVE_MODEL") {
            self.narrative.model = model;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.batch_size == 0 {
            return Err(ConfigError::Invalid("batch.batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidEnv { key, value })
        })
        .transpose()
}
