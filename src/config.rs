use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::error::ConfigError;

/// Env var consulted when no `--config` flag is given.
pub const CONFIG_ENV: &str = "NETPULSE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Upper bound for `BudgetSecsPerSample` (one hour per sample).
pub const MAX_BUDGET_SECS_PER_SAMPLE: u64 = 3600;

/// Where a loaded [`RunConfig`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// The file did not exist; every option has its default.
    Defaults,
}

/// Settings for one probe run. Loaded once, then passed by value/reference
/// into the engine; never mutated while a cycle is in flight.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RunConfig {
    #[serde(rename = "PingCount", default = "default_sample_count")]
    pub icmp_sample_count: u32,
    #[serde(rename = "TcpingCount", default = "default_sample_count")]
    pub tcp_sample_count: u32,
    #[serde(rename = "DefaultTCPPort", default = "default_tcp_port")]
    pub default_tcp_port: u16,
    #[serde(rename = "Threads", default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(rename = "InputFile", default = "default_input_path")]
    pub input_path: PathBuf,
    /// Per-attempt timeout for a single echo or connect.
    #[serde(rename = "ProbeTimeoutMs", default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Pause between consecutive samples against the same target.
    #[serde(rename = "SampleIntervalMs", default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// A strategy gets `sample_count * budget_secs_per_sample` seconds in total.
    #[serde(rename = "BudgetSecsPerSample", default = "default_budget_secs")]
    pub budget_secs_per_sample: u64,
    #[serde(rename = "LogLevel", default = "default_log_level")]
    pub log_level: String,
    #[serde(rename = "Schedule", default)]
    pub schedule: Option<String>,
}

fn default_sample_count() -> u32 {
    4
}

fn default_tcp_port() -> u16 {
    443
}

fn default_max_concurrency() -> usize {
    5
}

fn default_input_path() -> PathBuf {
    PathBuf::from("iplist.txt")
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_sample_interval_ms() -> u64 {
    500
}

fn default_budget_secs() -> u64 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            icmp_sample_count: default_sample_count(),
            tcp_sample_count: default_sample_count(),
            default_tcp_port: default_tcp_port(),
            max_concurrency: default_max_concurrency(),
            input_path: default_input_path(),
            probe_timeout_ms: default_probe_timeout_ms(),
            sample_interval_ms: default_sample_interval_ms(),
            budget_secs_per_sample: default_budget_secs(),
            log_level: default_log_level(),
            schedule: None,
        }
    }
}

impl RunConfig {
    /// Load from a JSON file. A missing file means "all defaults".
    pub async fn load(path: &Path) -> Result<(Self, ConfigSource), ConfigError> {
        if !path.exists() {
            return Ok((Self::default(), ConfigSource::Defaults));
        }

        let content = fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok((config, ConfigSource::File))
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.icmp_sample_count == 0 {
            return Err(invalid("PingCount", "must be greater than 0"));
        }
        if self.tcp_sample_count == 0 {
            return Err(invalid("TcpingCount", "must be greater than 0"));
        }
        if self.default_tcp_port == 0 {
            return Err(invalid("DefaultTCPPort", "must be in 1-65535"));
        }
        if self.max_concurrency < 1 {
            return Err(invalid("Threads", "must be at least 1"));
        }
        if self.probe_timeout_ms == 0 {
            return Err(invalid("ProbeTimeoutMs", "must be greater than 0"));
        }
        if self.budget_secs_per_sample == 0 {
            return Err(invalid("BudgetSecsPerSample", "must be greater than 0"));
        }
        if self.budget_secs_per_sample > MAX_BUDGET_SECS_PER_SAMPLE {
            return Err(invalid("BudgetSecsPerSample", "must be at most 3600"));
        }
        self.validate_log_level()
    }

    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level, ConfigError> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(ConfigError::InvalidLogLevel(self.log_level.clone())),
        }
    }

    pub fn validate_log_level(&self) -> Result<(), ConfigError> {
        self.get_tracing_level().map(|_| ())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Hard wall-clock budget for one ICMP strategy call.
    pub fn icmp_budget(&self) -> Duration {
        Duration::from_secs(u64::from(self.icmp_sample_count).saturating_mul(self.budget_secs_per_sample))
    }

    /// Hard wall-clock budget for one TCP strategy call.
    pub fn tcp_budget(&self) -> Duration {
        Duration::from_secs(u64::from(self.tcp_sample_count).saturating_mul(self.budget_secs_per_sample))
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        reason: reason.to_string(),
    }
}

/// `--config` wins, then `NETPULSE_CONFIG`, then `config.json`.
pub fn resolve_config_path(cli: Option<PathBuf>) -> PathBuf {
    cli.or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = RunConfig::default();
        assert_eq!(config.icmp_sample_count, 4);
        assert_eq!(config.tcp_sample_count, 4);
        assert_eq!(config.default_tcp_port, 443);
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.input_path, PathBuf::from("iplist.txt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config = RunConfig::from_json(r#"{"PingCount": 10, "Threads": 2}"#).unwrap();
        assert_eq!(config.icmp_sample_count, 10);
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.tcp_sample_count, 4);
        assert_eq!(config.default_tcp_port, 443);
        assert_eq!(config.schedule, None);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let config = RunConfig {
            max_concurrency: 0,
            ..RunConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Threads"));
    }

    #[test]
    fn test_zero_port_rejected() {
        let config = RunConfig::from_json(r#"{"DefaultTCPPort": 0}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_port_is_parse_error() {
        assert!(RunConfig::from_json(r#"{"DefaultTCPPort": 70000}"#).is_err());
    }

    #[test]
    fn test_log_level() {
        let mut config = RunConfig::default();
        config.log_level = "WARNING".to_string();
        assert_eq!(config.get_tracing_level().unwrap(), tracing::Level::WARN);
        config.log_level = "loud".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_huge_budget_rejected_and_saturates() {
        let config = RunConfig::from_json(r#"{"BudgetSecsPerSample": 9223372036854775807}"#).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("BudgetSecsPerSample"));
        assert_eq!(config.tcp_budget(), Duration::from_secs(u64::MAX));
        assert_eq!(config.icmp_budget(), Duration::from_secs(u64::MAX));

        let config = RunConfig {
            icmp_sample_count: u32::MAX,
            budget_secs_per_sample: MAX_BUDGET_SECS_PER_SAMPLE,
            ..RunConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(
            config.icmp_budget(),
            Duration::from_secs(u64::from(u32::MAX) * MAX_BUDGET_SECS_PER_SAMPLE)
        );
    }

    #[test]
    fn test_budgets_scale_with_sample_count() {
        let config = RunConfig {
            icmp_sample_count: 5,
            tcp_sample_count: 2,
            ..RunConfig::default()
        };
        assert_eq!(config.icmp_budget(), Duration::from_secs(15));
        assert_eq!(config.tcp_budget(), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = RunConfig::load(&dir.path().join("nope.json")).await.unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(source, ConfigSource::Defaults);
    }

    #[tokio::test]
    async fn test_load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"TcpingCount": 7}"#).unwrap();
        let (config, source) = RunConfig::load(&path).await.unwrap();
        assert_eq!(config.tcp_sample_count, 7);
        assert_eq!(source, ConfigSource::File);
    }

    #[tokio::test]
    async fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = RunConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_cli_path_wins() {
        let path = resolve_config_path(Some(PathBuf::from("custom.json")));
        assert_eq!(path, PathBuf::from("custom.json"));
    }
}
