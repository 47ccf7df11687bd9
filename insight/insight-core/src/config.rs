//! Configuration for the index insight engine.
//!
//! Configuration is a TOML document with one table per concern. Every key has
//! a default, so an empty file is a valid configuration. Selected keys can be
//! overridden through `INSIGHT_*` environment variables.
//!
//! ```toml
//! [generation]
//! update_interval_secs = 86400
//! generating_timeout_secs = 180
//!
//! [field_description]
//! batch_size = 50
//! ```

use crate::error::{InsightError, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

// Environment variable names
pub const ENV_UPDATE_INTERVAL_SECS: &str = "INSIGHT_UPDATE_INTERVAL_SECS";
pub const ENV_GENERATING_TIMEOUT_SECS: &str = "INSIGHT_GENERATING_TIMEOUT_SECS";
pub const ENV_PATTERN_CACHE_TTL_SECS: &str = "INSIGHT_PATTERN_CACHE_TTL_SECS";
pub const ENV_FIELD_BATCH_SIZE: &str = "INSIGHT_FIELD_BATCH_SIZE";
pub const ENV_AGENT_ID: &str = "INSIGHT_AGENT_ID";
pub const ENV_STORAGE_INDEX: &str = "INSIGHT_STORAGE_INDEX";
pub const ENV_LOG_LEVEL: &str = "INSIGHT_LOG_LEVEL";

/// Default name of the index holding insight records.
pub const DEFAULT_STORAGE_INDEX: &str = ".plugins-ml-index-insight-storage";

/// Default agent that answers insight prompts.
pub const DEFAULT_AGENT_ID: &str = "index-insight-agent";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub general: GeneralConfig,
    pub generation: GenerationConfig,
    pub correlation: CorrelationConfig,
    pub field_description: FieldDescriptionConfig,
    pub statistics: StatisticsConfig,
    pub model: ModelConfig,
    pub storage: StorageConfig,
}

/// General configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

/// Freshness and stuck-generation windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// How long a COMPLETED record is served before recomputation
    pub update_interval_secs: u64,
    /// How long a GENERATING record blocks other requesters
    pub generating_timeout_secs: u64,
}

/// Cross-index correlation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub pattern_cache_ttl_secs: u64,
    pub max_concurrent_classifications: usize,
    pub sample_documents: usize,
    pub max_prompt_fields: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDescriptionConfig {
    /// Fields per model prompt
    pub batch_size: usize,
}

/// Sampling used for statistical profiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    pub sample_size: usize,
    pub term_size: usize,
    pub example_docs: usize,
    /// Minimum share of sampled documents a field must appear in
    pub not_null_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub agent_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Index that holds insight records and pattern cache entries
    pub index_name: String,
}

// ============================================================================
// Defaults
// ============================================================================

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 24 * 60 * 60,
            generating_timeout_secs: 3 * 60,
        }
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            pattern_cache_ttl_secs: 7 * 24 * 60 * 60,
            max_concurrent_classifications: 8,
            sample_documents: 5,
            max_prompt_fields: 20,
        }
    }
}

impl Default for FieldDescriptionConfig {
    fn default() -> Self {
        Self { batch_size: 50 }
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            sample_size: 1000,
            term_size: 5,
            example_docs: 5,
            not_null_threshold: 0.01,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            agent_id: DEFAULT_AGENT_ID.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_name: DEFAULT_STORAGE_INDEX.to_string(),
        }
    }
}

// ============================================================================
// Runner settings
// ============================================================================

/// The two knobs of the generation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerSettings {
    pub update_interval: Duration,
    pub generating_timeout: Duration,
}

impl RunnerSettings {
    pub fn new(update_interval: Duration, generating_timeout: Duration) -> Self {
        Self {
            update_interval,
            generating_timeout,
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        InsightConfig::default().runner_settings()
    }
}

/// Saturates at `Duration::MAX` for values chrono cannot represent
fn secs(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

// ============================================================================
// Loading, env overrides, validation
// ============================================================================

impl InsightConfig {
    /// Load configuration from a TOML file, then apply env overrides and validate
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails validation
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| InsightError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| InsightError::config(format!("Failed to parse config file: {}", e)))?;

        config.merge_env_vars()?;
        config.validate()?;

        info!("Configuration loaded successfully from {}", path.display());
        Ok(config)
    }

    /// Save configuration as TOML, writing to a temp file and renaming
    pub async fn save_to_path(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());
        self.validate()?;

        let content = self.to_toml()?;
        let temp_path = path.with_extension("toml.tmp");

        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|e| InsightError::config(format!("Failed to write config file: {}", e)))?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| InsightError::config(format!("Failed to rename config file: {}", e)))?;

        info!("Configuration saved successfully to {}", path.display());
        Ok(())
    }

    /// Render as pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| InsightError::config(format!("Failed to serialize config: {}", e)))
    }

    /// Merge `INSIGHT_*` environment variable overrides
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse
    pub fn merge_env_vars(&mut self) -> Result<()> {
        self.merge_env_from(|key| std::env::var(key).ok())
    }

    /// Merge overrides from an arbitrary key lookup
    pub fn merge_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        debug!("Merging environment variable overrides");

        if let Some(value) = lookup(ENV_UPDATE_INTERVAL_SECS) {
            debug!("Overriding update_interval_secs from environment: {}", value);
            self.generation.update_interval_secs = parse_env(ENV_UPDATE_INTERVAL_SECS, &value)?;
        }

        if let Some(value) = lookup(ENV_GENERATING_TIMEOUT_SECS) {
            debug!("Overriding generating_timeout_secs from environment: {}", value);
            self.generation.generating_timeout_secs = parse_env(ENV_GENERATING_TIMEOUT_SECS, &value)?;
        }

        if let Some(value) = lookup(ENV_PATTERN_CACHE_TTL_SECS) {
            debug!("Overriding pattern_cache_ttl_secs from environment: {}", value);
            self.correlation.pattern_cache_ttl_secs = parse_env(ENV_PATTERN_CACHE_TTL_SECS, &value)?;
        }

        if let Some(value) = lookup(ENV_FIELD_BATCH_SIZE) {
            debug!("Overriding field description batch_size from environment: {}", value);
            self.field_description.batch_size = parse_env(ENV_FIELD_BATCH_SIZE, &value)?;
        }

        if let Some(value) = lookup(ENV_AGENT_ID) {
            debug!("Overriding agent_id from environment: {}", value);
            self.model.agent_id = value;
        }

        if let Some(value) = lookup(ENV_STORAGE_INDEX) {
            debug!("Overriding storage index from environment: {}", value);
            self.storage.index_name = value;
        }

        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            debug!("Overriding log_level from environment: {}", value);
            self.general.log_level = value;
        }

        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(InsightError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.general.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.generation.update_interval_secs == 0 {
            return Err(InsightError::config("update_interval_secs must be greater than 0"));
        }

        if self.generation.generating_timeout_secs == 0 {
            return Err(InsightError::config("generating_timeout_secs must be greater than 0"));
        }

        if self.correlation.pattern_cache_ttl_secs == 0 {
            return Err(InsightError::config("pattern_cache_ttl_secs must be greater than 0"));
        }

        if self.correlation.max_concurrent_classifications == 0 {
            return Err(InsightError::config(
                "max_concurrent_classifications must be greater than 0",
            ));
        }

        if self.field_description.batch_size == 0 {
            return Err(InsightError::config("batch_size must be greater than 0"));
        }

        if self.statistics.sample_size == 0 {
            return Err(InsightError::config("sample_size must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.statistics.not_null_threshold) {
            return Err(InsightError::config(format!(
                "not_null_threshold must be within [0, 1], got {}",
                self.statistics.not_null_threshold
            )));
        }

        if self.model.agent_id.trim().is_empty() {
            return Err(InsightError::config("agent_id must not be empty"));
        }

        if self.storage.index_name.trim().is_empty() {
            return Err(InsightError::config("storage index_name must not be empty"));
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    /// State machine windows derived from the generation section
    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings::new(
            secs(self.generation.update_interval_secs),
            secs(self.generation.generating_timeout_secs),
        )
    }

    /// Pattern cache TTL
    pub fn pattern_cache_ttl(&self) -> Duration {
        secs(self.correlation.pattern_cache_ttl_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| InsightError::config(format!("Invalid value '{}' for {}", value, key)))
}
