use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::KestrelError;

/// Top-level configuration loaded from `.kestrel.toml`.
///
/// Every section has sensible defaults, so an empty file (or no file at all)
/// yields a working configuration.
///
/// # Examples
///
/// ```
/// use kestrel_core::KestrelConfig;
///
/// let config = KestrelConfig::default();
/// assert_eq!(config.pool.workers, 4);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KestrelConfig {
    /// Worker pool settings.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Rate limiter and blocklist settings.
    #[serde(default)]
    pub limiter: LimiterConfig,
    /// Metrics collector settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Webhook server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl KestrelConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::Io`] if the file cannot be read, or
    /// [`KestrelError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kestrel_core::KestrelConfig;
    /// use std::path::Path;
    ///
    /// let config = KestrelConfig::from_file(Path::new(".kestrel.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, KestrelError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use kestrel_core::KestrelConfig;
    ///
    /// let toml = r#"
    /// [pool]
    /// workers = 8
    /// "#;
    /// let config = KestrelConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.pool.workers, 8);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, KestrelError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Worker pool configuration.
///
/// # Examples
///
/// ```
/// use kestrel_core::PoolConfig;
///
/// let config = PoolConfig::default();
/// assert_eq!(config.queue_size, 64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bounded task queue capacity — submissions block when full.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_size: default_queue_size(),
        }
    }
}

/// Rate limiter configuration.
///
/// Token-bucket parameters shape ordinary traffic; the block settings govern
/// the separate failed-attempt escalation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Bucket capacity per key.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: f64,
    /// Continuous refill rate in tokens per second.
    #[serde(default = "default_refill_rate")]
    pub refill_rate: f64,
    /// Cost subtracted per admitted request.
    #[serde(default = "default_tokens_per_request")]
    pub tokens_per_request: f64,
    /// Failed attempts within the window before an IP is auto-blocked.
    #[serde(default = "default_block_threshold")]
    pub block_threshold: u32,
    /// Sliding window for counting failed attempts, in milliseconds.
    #[serde(default = "default_block_window_ms")]
    pub block_window_ms: u64,
    /// How long an auto-blocked IP stays blocked, in milliseconds.
    #[serde(default = "default_block_duration_ms")]
    pub block_duration_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            refill_rate: default_refill_rate(),
            tokens_per_request: default_tokens_per_request(),
            block_threshold: default_block_threshold(),
            block_window_ms: default_block_window_ms(),
            block_duration_ms: default_block_duration_ms(),
        }
    }
}

/// Metrics collector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Sliding window capacity for histograms and timers.
    #[serde(default = "default_histogram_capacity")]
    pub histogram_capacity: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            histogram_capacity: default_histogram_capacity(),
        }
    }
}

/// Webhook server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_size() -> usize {
    64
}

fn default_max_tokens() -> f64 {
    60.0
}

fn default_refill_rate() -> f64 {
    1.0
}

fn default_tokens_per_request() -> f64 {
    1.0
}

fn default_block_threshold() -> u32 {
    5
}

fn default_block_window_ms() -> u64 {
    60_000
}

fn default_block_duration_ms() -> u64 {
    300_000
}

fn default_histogram_capacity() -> usize {
    1000
}

fn default_bind() -> String {
    "127.0.0.1:8791".into()
}
