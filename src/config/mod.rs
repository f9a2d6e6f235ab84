//! Configuration management for the pool server
//!
//! Settings come from an optional TOML file and are then overridden by
//! command-line flags (which themselves fall back to environment variables).

use crate::core::network::{
    ANNAPURNA_ACTIVATION_HEIGHT, NetworkProfile, NetworkSelector, SEOUL_ACTIVATION_HEIGHT,
};
use crate::error::{Error, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command-line arguments
#[derive(Parser, Debug, Default)]
#[clap(
    name = "worldland-pool",
    about = "ECCPoW mining pool server for the WorldLand network",
    version,
    author
)]
pub struct Args {
    /// Configuration file path
    #[clap(short, long, value_name = "FILE", env = "WORLDLAND_POOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Node JSON-RPC URL
    #[clap(short, long, env = "WORLDLAND_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Stratum listen address
    #[clap(long, env = "WORLDLAND_POOL_HOST")]
    pub host: Option<String>,

    /// Stratum listen port
    #[clap(short, long, env = "WORLDLAND_POOL_PORT")]
    pub port: Option<u16>,

    /// Base pool difficulty handed to new connections
    #[clap(short, long, env = "WORLDLAND_POOL_DIFFICULTY")]
    pub difficulty: Option<f64>,

    /// Pin the network profile (default, seoul, annapurna)
    #[clap(short, long, env = "WORLDLAND_NETWORK")]
    pub network: Option<String>,

    /// Log level
    #[clap(short, long, env = "RUST_LOG")]
    pub log_level: Option<String>,

    /// Log format (plain, json)
    #[clap(long)]
    pub log_format: Option<String>,

    /// Print the effective configuration as TOML and exit
    #[clap(long)]
    pub print_config: bool,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Stratum listener and share handling
    #[serde(default)]
    pub pool: PoolConfig,

    /// Node connection
    #[serde(default)]
    pub node: NodeConfig,

    /// Network profile selection
    #[serde(default)]
    pub network: NetworkConfig,

    /// Per-worker difficulty adjustment
    #[serde(default)]
    pub vardiff: VardiffConfig,

    /// Block candidate promotion
    #[serde(default)]
    pub promotion: PromotionConfig,

    /// Share and block recording
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Stratum listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Listen address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent miner connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Difficulty assigned to new connections and the vardiff anchor
    #[serde(default = "default_base_difficulty")]
    pub base_difficulty: f64,

    /// Size of the miner-chosen extranonce in bytes
    #[serde(default = "default_extranonce2_size")]
    pub extranonce2_size: usize,

    /// Jobs kept before the oldest is evicted
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,

    /// Decodes allowed to run at the same time
    #[serde(default = "default_validation_concurrency")]
    pub validation_concurrency: usize,

    /// Idle seconds before a connection is dropped
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Seconds between pool statistics log lines
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

/// Node connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Primary JSON-RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Endpoints tried after the primary one fails
    #[serde(default)]
    pub fallback_urls: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Seconds between block template refreshes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Attempts per RPC call, across all endpoints
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// First backoff delay in milliseconds
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
}

/// Network profile selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Heights above this use the seoul rules
    #[serde(default = "default_seoul_height")]
    pub seoul_activation_height: u64,

    /// Heights above this use the annapurna rules
    #[serde(default = "default_annapurna_height")]
    pub annapurna_activation_height: u64,

    /// Fixed profile, ignoring heights
    #[serde(default)]
    pub profile: Option<NetworkProfile>,
}

/// Vardiff configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VardiffConfig {
    /// Adjust difficulty per worker
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Shares closer than this many seconds raise the difficulty
    #[serde(default = "default_fast_share")]
    pub fast_share_secs: u64,

    /// Shares further apart than this many seconds lower the difficulty
    #[serde(default = "default_slow_share")]
    pub slow_share_secs: u64,

    /// Multiplier applied on fast shares
    #[serde(default = "default_increase_factor")]
    pub increase_factor: f64,

    /// Multiplier applied on slow shares
    #[serde(default = "default_decrease_factor")]
    pub decrease_factor: f64,

    /// Lowest difficulty as a fraction of the base
    #[serde(default = "default_min_multiplier")]
    pub min_multiplier: f64,

    /// Highest difficulty as a multiple of the base
    #[serde(default = "default_max_multiplier")]
    pub max_multiplier: f64,
}

/// How pool-valid shares become block candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionPolicy {
    /// Re-validate every pool-valid share at network difficulty
    #[default]
    Revalidate,
    /// Re-validate only shares decoded at or above the network code level
    TargetPrefilter,
}

/// Promotion configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromotionConfig {
    /// Selected policy
    #[serde(default)]
    pub policy: PromotionPolicy,
}

/// Persistence service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Records written per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum milliseconds a record waits before a flush
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,

    /// Bounded queue length between the pool and the writer
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (plain, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3333
}

fn default_max_connections() -> usize {
    1024
}

fn default_base_difficulty() -> f64 {
    1000.0
}

fn default_extranonce2_size() -> usize {
    4
}

fn default_max_jobs() -> usize {
    10
}

fn default_validation_concurrency() -> usize {
    num_cpus::get()
}

fn default_connection_timeout() -> u64 {
    600
}

fn default_stats_interval() -> u64 {
    60
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_refresh_interval() -> u64 {
    5
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    200
}

fn default_retry_max_delay() -> u64 {
    5_000
}

fn default_seoul_height() -> u64 {
    SEOUL_ACTIVATION_HEIGHT
}

fn default_annapurna_height() -> u64 {
    ANNAPURNA_ACTIVATION_HEIGHT
}

fn default_fast_share() -> u64 {
    15
}

fn default_slow_share() -> u64 {
    60
}

fn default_increase_factor() -> f64 {
    1.1
}

fn default_decrease_factor() -> f64 {
    0.9
}

fn default_min_multiplier() -> f64 {
    0.1
}

fn default_max_multiplier() -> f64 {
    10.0
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_interval() -> u64 {
    1_000
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "plain".to_string()
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            base_difficulty: default_base_difficulty(),
            extranonce2_size: default_extranonce2_size(),
            max_jobs: default_max_jobs(),
            validation_concurrency: default_validation_concurrency(),
            connection_timeout_secs: default_connection_timeout(),
            stats_interval_secs: default_stats_interval(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            fallback_urls: Vec::new(),
            timeout_secs: default_timeout(),
            refresh_interval_secs: default_refresh_interval(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            seoul_activation_height: default_seoul_height(),
            annapurna_activation_height: default_annapurna_height(),
            profile: None,
        }
    }
}

impl Default for VardiffConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fast_share_secs: default_fast_share(),
            slow_share_secs: default_slow_share(),
            increase_factor: default_increase_factor(),
            decrease_factor: default_decrease_factor(),
            min_multiplier: default_min_multiplier(),
            max_multiplier: default_max_multiplier(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl NodeConfig {
    /// All endpoints in failover order, primary first
    pub fn endpoints(&self) -> Vec<String> {
        std::iter::once(self.rpc_url.clone())
            .chain(self.fallback_urls.iter().cloned())
            .collect()
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Template refresh interval
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl NetworkConfig {
    /// Profile selector described by this section
    pub fn selector(&self) -> NetworkSelector {
        NetworkSelector::new(self.seoul_activation_height, self.annapurna_activation_height)
            .with_override(self.profile)
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from command-line arguments
    ///
    /// The file named by `--config` is loaded first, then every flag that
    /// was given replaces the matching file value.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(url) = &args.rpc_url {
            config.node.rpc_url = url.clone();
        }
        if let Some(host) = &args.host {
            config.pool.host = host.clone();
        }
        if let Some(port) = args.port {
            config.pool.port = port;
        }
        if let Some(difficulty) = args.difficulty {
            config.pool.base_difficulty = difficulty;
        }
        if let Some(network) = &args.network {
            config.network.profile = Some(network.parse()?);
        }
        if let Some(level) = &args.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &args.log_format {
            config.logging.format = format.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pool.port == 0 {
            return Err(Error::config("Pool port must be greater than 0"));
        }
        if self.pool.max_connections == 0 {
            return Err(Error::config("max_connections must be greater than 0"));
        }
        if !self.pool.base_difficulty.is_finite() || self.pool.base_difficulty < 1.0 {
            return Err(Error::config("base_difficulty must be at least 1"));
        }
        if !(1..=16).contains(&self.pool.extranonce2_size) {
            return Err(Error::config("extranonce2_size must be between 1 and 16"));
        }
        if self.pool.max_jobs == 0 {
            return Err(Error::config("max_jobs must be greater than 0"));
        }
        if self.pool.validation_concurrency == 0 {
            return Err(Error::config("validation_concurrency must be greater than 0"));
        }

        for url in self.node.endpoints() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::config(format!("RPC URL must be http(s): {}", url)));
            }
        }
        if self.node.timeout_secs == 0 || self.node.refresh_interval_secs == 0 {
            return Err(Error::config("Node timeout and refresh interval must be positive"));
        }
        if self.node.retry_attempts == 0 {
            return Err(Error::config("retry_attempts must be greater than 0"));
        }
        if self.node.retry_base_delay_ms > self.node.retry_max_delay_ms {
            return Err(Error::config("retry_base_delay_ms exceeds retry_max_delay_ms"));
        }

        if self.network.seoul_activation_height > self.network.annapurna_activation_height {
            return Err(Error::config(
                "seoul_activation_height must not exceed annapurna_activation_height",
            ));
        }

        let v = &self.vardiff;
        if v.fast_share_secs >= v.slow_share_secs {
            return Err(Error::config("fast_share_secs must be below slow_share_secs"));
        }
        if v.increase_factor < 1.0 || v.decrease_factor <= 0.0 || v.decrease_factor > 1.0 {
            return Err(Error::config("vardiff factors must satisfy increase >= 1 >= decrease > 0"));
        }
        if v.min_multiplier <= 0.0 || v.min_multiplier > 1.0 || v.max_multiplier < 1.0 {
            return Err(Error::config("vardiff multipliers must bracket 1"));
        }

        if self.persistence.batch_size == 0 || self.persistence.queue_capacity == 0 {
            return Err(Error::config("Persistence batch and queue sizes must be positive"));
        }

        match self.logging.format.as_str() {
            "plain" | "json" => {}
            other => return Err(Error::config(format!("Unknown log format: {}", other))),
        }

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to render config: {}", e)))
    }
}
