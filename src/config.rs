//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Barrier service URL used when none is configured.
pub const DEFAULT_BARRIER_URL: &str = "http://127.0.0.1:8734";

/// Roster file name used when none is configured.
pub const DEFAULT_ROSTER_FILE: &str = "syncdet-actors.yaml";

/// Per-actor run settings derived from environment variables, configuration
/// files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SYNCDET",
    discovery(
        app_name = "syncdet",
        env_var = "SYNCDET_CONFIG_PATH",
        config_file_name = "syncdet.toml",
        dotfile_name = ".syncdet.toml",
        project_file_name = "syncdet.toml"
    )
)]
pub struct SyncdetConfig {
    /// Identifier shared by every actor of the run. Scopes all sync points.
    pub run_id: String,
    /// Zero-based index of this actor in the roster.
    #[ortho_config(default = 0)]
    pub actor_index: usize,
    /// Base URL of the barrier service.
    #[ortho_config(default = DEFAULT_BARRIER_URL.to_owned())]
    pub barrier_url: String,
    /// YAML file enumerating the actors of the run.
    #[ortho_config(default = DEFAULT_ROSTER_FILE.to_owned())]
    pub roster_file: String,
    /// Milliseconds between two polls of a sync point.
    #[ortho_config(default = 500)]
    pub poll_interval_ms: u64,
    /// Default sync deadline in seconds. Waits are unbounded when unset.
    pub sync_timeout_secs: Option<u64>,
    /// Seconds to wait for the barrier service to come up.
    #[ortho_config(default = 30)]
    pub connect_timeout_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to syncdet.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

impl SyncdetConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(metadata.missing());
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must be greater than zero: check {} or {} in syncdet.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("syncdet")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Interval between two polls of a sync point.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Deadline applied to syncs that do not pass their own.
    #[must_use]
    pub fn sync_timeout(&self) -> Option<Duration> {
        self.sync_timeout_secs.map(Duration::from_secs)
    }

    /// Time allowed for the barrier service to become reachable.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Performs semantic validation. Error messages include guidance on how
    /// to provide the value via environment variables or configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when a duration is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.run_id,
            &FieldMetadata::new("run identifier", "SYNCDET_RUN_ID", "run_id"),
        )?;
        Self::require_field(
            &self.barrier_url,
            &FieldMetadata::new(
                "barrier service URL",
                "SYNCDET_BARRIER_URL",
                "barrier_url",
            ),
        )?;
        Self::require_field(
            &self.roster_file,
            &FieldMetadata::new("actor roster file", "SYNCDET_ROSTER_FILE", "roster_file"),
        )?;
        Self::require_positive(
            self.poll_interval_ms,
            &FieldMetadata::new(
                "poll interval",
                "SYNCDET_POLL_INTERVAL_MS",
                "poll_interval_ms",
            ),
        )?;
        if let Some(secs) = self.sync_timeout_secs {
            Self::require_positive(
                secs,
                &FieldMetadata::new(
                    "sync timeout",
                    "SYNCDET_SYNC_TIMEOUT_SECS",
                    "sync_timeout_secs",
                ),
            )?;
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
