use anyhow::Result;
use config as config_loader;
use dotenvy::dotenv;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::utils::retry::RetryPolicy;

/// Global config structure
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// JSON-RPC node config
#[derive(Debug, Deserialize, Clone)]
pub struct RpcConfig {
    pub url: String,
    #[serde(default = "RpcConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RpcConfig {
    fn default_timeout_secs() -> u64 {
        10
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Block metadata service config
#[derive(Debug, Deserialize, Clone)]
pub struct MetadataConfig {
    /// URL template; `{block}` is replaced by the decimal block number.
    pub url: String,
    #[serde(default = "MetadataConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl MetadataConfig {
    fn default_timeout_secs() -> u64 {
        10
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Discovery and enrichment config
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "PipelineConfig::default_chain_name")]
    pub chain_name: String,
    /// Last height considered already handled; unset means "start at the current head".
    #[serde(default)]
    pub start_height: Option<u64>,
    #[serde(default = "PipelineConfig::default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "PipelineConfig::default_poll_error_delay_secs")]
    pub poll_error_delay_secs: u64,
    #[serde(default = "PipelineConfig::default_not_ready_retry_secs")]
    pub not_ready_retry_secs: u64,
    /// None retries a not-yet-indexed block forever.
    #[serde(default)]
    pub max_not_ready_retries: Option<u32>,
    #[serde(default = "PipelineConfig::default_queue_capacity")]
    pub queue_capacity: usize,
}

impl PipelineConfig {
    fn default_chain_name() -> String {
        "ethereum".to_string()
    }
    fn default_poll_interval_secs() -> u64 {
        1
    }
    fn default_poll_error_delay_secs() -> u64 {
        1
    }
    fn default_not_ready_retry_secs() -> u64 {
        12
    }
    fn default_queue_capacity() -> usize {
        20
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_error_delay(&self) -> Duration {
        Duration::from_secs(self.poll_error_delay_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.not_ready_retry_secs),
            self.max_not_ready_retries,
        )
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chain_name: Self::default_chain_name(),
            start_height: None,
            poll_interval_secs: Self::default_poll_interval_secs(),
            poll_error_delay_secs: Self::default_poll_error_delay_secs(),
            not_ready_retry_secs: Self::default_not_ready_retry_secs(),
            max_not_ready_retries: None,
            queue_capacity: Self::default_queue_capacity(),
        }
    }
}

/// Logging config
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    #[serde(default = "LoggingConfig::default_to_file")]
    pub to_file: bool,
    #[serde(default = "LoggingConfig::default_file_path")]
    pub file_path: String,
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
    fn default_to_file() -> bool {
        false
    }
    fn default_file_path() -> String {
        "./logs/enricher.log".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            to_file: Self::default_to_file(),
            file_path: Self::default_file_path(),
            json: false,
        }
    }
}

/// Metrics config
#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "MetricsConfig::default_prometheus_exporter_port")]
    pub prometheus_exporter_port: u16,
}

impl MetricsConfig {
    fn default_prometheus_exporter_port() -> u16 {
        9100
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable: false,
            prometheus_exporter_port: Self::default_prometheus_exporter_port(),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenv().ok(); // Load the .env file

        if !path.as_ref().exists() {
            anyhow::bail!("Config file not found: {:?}", path.as_ref());
        }

        // Use config crate to parse the config file
        let builder = config_loader::Config::builder()
            .add_source(config_loader::File::from(path.as_ref().to_path_buf()))
            .add_source(config_loader::Environment::with_prefix("ENRICHER").separator("__"))
            .build()?;

        let cfg = builder.try_deserialize::<AppConfig>()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc.url.trim().is_empty() {
            anyhow::bail!("rpc.url must not be empty");
        }
        if self.metadata.url.trim().is_empty() {
            anyhow::bail!("metadata.url must not be empty");
        }
        if self.pipeline.queue_capacity == 0 {
            anyhow::bail!("pipeline.queue_capacity must be at least 1");
        }
        if self.pipeline.poll_interval_secs == 0 {
            anyhow::bail!("pipeline.poll_interval_secs must be at least 1");
        }
        Ok(())
    }
}
