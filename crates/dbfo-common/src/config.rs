//! ---
//! dbfo_section: "01-core-functionality"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Shared primitives and utilities for the failover runtime."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

/// Error codes the control planes use for throttling and temporary unavailability.
pub const DEFAULT_RETRYABLE_ERROR_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "ServiceUnavailable",
    "PriorRequestNotComplete",
    "InternalFailure",
];

/// Subset of [`DEFAULT_RETRYABLE_ERROR_CODES`] that is safe to retry for promotion.
pub const DEFAULT_PROMOTION_RETRYABLE_ERROR_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "ServiceUnavailable",
];

fn default_primary_set_identifier() -> String {
    "primary".to_owned()
}

fn default_replica_set_identifier() -> String {
    "replica".to_owned()
}

fn default_ttl_seconds() -> u32 {
    60
}

fn default_record_type() -> String {
    "CNAME".to_owned()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_seconds() -> f64 {
    2.0
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_retryable_error_codes() -> Vec<String> {
    DEFAULT_RETRYABLE_ERROR_CODES
        .iter()
        .map(|code| (*code).to_owned())
        .collect()
}

fn default_promotion_retryable_error_codes() -> Vec<String> {
    DEFAULT_PROMOTION_RETRYABLE_ERROR_CODES
        .iter()
        .map(|code| (*code).to_owned())
        .collect()
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

/// Process-wide configuration for the failover controller. Loaded once at startup
/// and treated as read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub topology: TopologyConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub promotion: PromotionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "DBFO_CONFIG";

    /// Load configuration from disk, respecting the `DBFO_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Read, parse and validate a single configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.topology.validate()?;
        self.retry.validate()?;
        self.promotion.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Identifiers of the external resources the controller operates on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologyConfig {
    pub primary_instance_id: String,
    pub replica_instance_id: String,
    pub zone_id: String,
    pub record_name: String,
    pub primary_endpoint: String,
    pub replica_endpoint: String,
    pub topic_id: String,
    #[serde(default = "default_primary_set_identifier")]
    pub primary_set_identifier: String,
    #[serde(default = "default_replica_set_identifier")]
    pub replica_set_identifier: String,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u32,
    #[serde(default = "default_record_type")]
    pub record_type: String,
}

impl TopologyConfig {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("primary_instance_id", &self.primary_instance_id),
            ("replica_instance_id", &self.replica_instance_id),
            ("zone_id", &self.zone_id),
            ("record_name", &self.record_name),
            ("primary_endpoint", &self.primary_endpoint),
            ("replica_endpoint", &self.replica_endpoint),
            ("topic_id", &self.topic_id),
            ("primary_set_identifier", &self.primary_set_identifier),
            ("replica_set_identifier", &self.replica_set_identifier),
            ("record_type", &self.record_type),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(anyhow!("topology.{} must not be empty", field));
            }
        }
        if self.primary_instance_id == self.replica_instance_id {
            return Err(anyhow!(
                "primary and replica must be distinct instances (both are '{}')",
                self.primary_instance_id
            ));
        }
        if self.primary_set_identifier == self.replica_set_identifier {
            return Err(anyhow!(
                "weighted record set identifiers must differ (both are '{}')",
                self.primary_set_identifier
            ));
        }
        Ok(())
    }
}

/// Backoff parameters shared by every control-plane call.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before retry `n` is `base_delay_seconds ^ n`.
    #[serde(default = "default_base_delay_seconds")]
    pub base_delay_seconds: f64,
    #[serde(default = "default_max_delay")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub max_delay: Duration,
    #[serde(default = "default_retryable_error_codes")]
    pub retryable_error_codes: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_seconds: default_base_delay_seconds(),
            max_delay: default_max_delay(),
            retryable_error_codes: default_retryable_error_codes(),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be at least 1"));
        }
        if !self.base_delay_seconds.is_finite() || self.base_delay_seconds < 0.0 {
            return Err(anyhow!(
                "retry.base_delay_seconds must be a non-negative number, got {}",
                self.base_delay_seconds
            ));
        }
        Ok(())
    }
}

/// Promotion is not safely repeatable, so it only retries the codes listed here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromotionConfig {
    #[serde(default = "default_promotion_retryable_error_codes")]
    pub retryable_error_codes: Vec<String>,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            retryable_error_codes: default_promotion_retryable_error_codes(),
        }
    }
}

impl PromotionConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(code) = self
            .retryable_error_codes
            .iter()
            .find(|code| code.trim().is_empty())
        {
            return Err(anyhow!(
                "promotion.retryable_error_codes contains an empty code ({:?})",
                code
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// When set, a daily rolling JSON log file is written to this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [topology]
        primary_instance_id = "orders-primary"
        replica_instance_id = "orders-replica"
        zone_id = "Z123"
        record_name = "db.orders.internal"
        primary_endpoint = "orders-primary.cluster.local"
        replica_endpoint = "orders-replica.cluster.local"
        topic_id = "ops-alerts"
    "#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: AppConfig = MINIMAL.parse().unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_seconds, 2.0);
        assert_eq!(config.retry.max_delay, Duration::from_secs(30));
        assert!(config
            .retry
            .retryable_error_codes
            .iter()
            .any(|code| code == "Throttling"));
        assert!(!config
            .promotion
            .retryable_error_codes
            .iter()
            .any(|code| code == "InternalFailure"));
        assert_eq!(config.topology.primary_set_identifier, "primary");
        assert_eq!(config.topology.ttl_seconds, 60);
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
    }

    #[test]
    fn rejects_identical_instances() {
        let content = MINIMAL.replace("orders-replica\"", "orders-primary\"");
        let err = content.parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("distinct"));
    }

    #[test]
    fn rejects_zero_attempts() {
        let content = format!("{MINIMAL}\n[retry]\nmax_attempts = 0\n");
        assert!(content.parse::<AppConfig>().is_err());
    }

    #[test]
    fn rejects_missing_topology_field() {
        let content = MINIMAL.replace("topic_id = \"ops-alerts\"", "");
        assert!(content.parse::<AppConfig>().is_err());
    }
}
