//! Configuration types for blogspot-archive-worker
//!
//! Grouped sub-configs with `#[serde(default = "...")]` per field, plus a
//! `duration_serde` helper module for human-readable durations on the
//! wire.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Coordinator and upload endpoint URLs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL of the coordinator (e.g. `https://blogspot-comments-master.example.com`)
    #[serde(default = "default_coordinator_base")]
    pub coordinator_base: String,

    /// Base URL of the batch upload storage server
    #[serde(default = "default_upload_base")]
    pub upload_base: String,

    /// Override for the blog feed host, in place of `https://{blog}.blogspot.com`.
    /// Unset in production; exists so tests can point feed fetches at a
    /// mock server instead of the real Blogger platform.
    #[serde(default)]
    pub blog_feed_base_override: Option<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            coordinator_base: default_coordinator_base(),
            upload_base: default_upload_base(),
            blog_feed_base_override: None,
        }
    }
}

/// Bounded exponential-backoff schedule for `RetryClient`.
///
/// This schedule is a fixed additive ramp (not multiplicative) and has no
/// jitter: the platform this worker talks to has no documented
/// thundering-herd sensitivity, so a plain linear increment is enough.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry (default: 30 seconds)
    #[serde(default = "default_retry_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Amount added to the delay after each retry (default: 30 seconds)
    #[serde(default = "default_retry_increment", with = "duration_serde")]
    pub increment: Duration,

    /// Cap on the per-retry delay (default: 180 seconds)
    #[serde(default = "default_retry_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Cumulative sleep budget before giving up and exiting the process
    /// (default: 18 hours)
    #[serde(default = "default_retry_total_budget", with = "duration_serde")]
    pub total_budget: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_retry_initial_delay(),
            increment: default_retry_increment(),
            max_delay: default_retry_max_delay(),
            total_budget: default_retry_total_budget(),
        }
    }
}

/// `PostPool` sizing and HTTP session parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of concurrent post-download workers per accessible blog
    /// (default: 10)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Total per-request HTTP timeout (default: 20 seconds)
    #[serde(default = "default_http_timeout", with = "duration_serde")]
    pub http_timeout: Duration,

    /// Max idle connections kept per host in the pool's HTTP client
    /// (default: 30, mirroring the Python `TCPConnector(limit=30)`)
    #[serde(default = "default_pool_connection_limit")]
    pub connection_limit: usize,

    /// Delay a worker sleeps after a transport error before requeuing its
    /// post (default: 5 seconds)
    #[serde(default = "default_transport_error_delay", with = "duration_serde")]
    pub transport_error_delay: Duration,

    /// Delay a paused worker sleeps between pause-loop ticks (default: 5
    /// seconds)
    #[serde(default = "default_pause_tick_delay", with = "duration_serde")]
    pub pause_tick_delay: Duration,

    /// Delay the barrier winner sleeps before rebuilding the session
    /// (default: 1 second)
    #[serde(default = "default_session_rebuild_delay", with = "duration_serde")]
    pub session_rebuild_delay: Duration,

    /// Number of successful posts between progress log lines (default: 20)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            http_timeout: default_http_timeout(),
            connection_limit: default_pool_connection_limit(),
            transport_error_delay: default_transport_error_delay(),
            pause_tick_delay: default_pause_tick_delay(),
            session_rebuild_delay: default_session_rebuild_delay(),
            progress_interval: default_progress_interval(),
        }
    }
}

/// Feed pagination retry parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Attempts per feed page before giving up on that page (default: 3)
    #[serde(default = "default_feed_attempts")]
    pub attempts_per_page: u32,

    /// Gap between failed feed-page attempts (default: 2 seconds)
    #[serde(default = "default_feed_retry_gap", with = "duration_serde")]
    pub retry_gap: Duration,

    /// Number of entries requested per feed page (default: 150, the
    /// platform's maximum)
    #[serde(default = "default_feed_page_size")]
    pub page_size: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            attempts_per_page: default_feed_attempts(),
            retry_gap: default_feed_retry_gap(),
            page_size: default_feed_page_size(),
        }
    }
}

/// Batch runner loop timing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchRunnerConfig {
    /// Delay after a null batch, after a failed `download_and_upload`
    /// attempt, and at the end of every loop iteration (default: 10
    /// seconds)
    #[serde(default = "default_batch_loop_delay", with = "duration_serde")]
    pub loop_delay: Duration,

    /// Number of attempts at `download_and_upload` per batch before moving
    /// on (default: 3)
    #[serde(default = "default_batch_attempts")]
    pub attempts: u32,

    /// Directory batch artifacts are written to before upload
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Path to the master domains file (list-mode batches only)
    #[serde(default = "default_domains_path")]
    pub domains_path: PathBuf,
}

impl Default for BatchRunnerConfig {
    fn default() -> Self {
        Self {
            loop_delay: default_batch_loop_delay(),
            attempts: default_batch_attempts(),
            output_dir: default_output_dir(),
            domains_path: default_domains_path(),
        }
    }
}

/// Top-level worker configuration.
///
/// Fields are organized into logical sub-configs, each serialized flat
/// (`#[serde(flatten)]`) so the JSON/TOML shape stays a single object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Coordinator / upload endpoint URLs
    #[serde(flatten)]
    pub endpoints: EndpointConfig,

    /// RetryClient backoff schedule
    #[serde(flatten)]
    pub retry: RetryConfig,

    /// PostPool sizing and HTTP session parameters
    #[serde(flatten)]
    pub pool: PoolConfig,

    /// Feed pagination retry parameters
    #[serde(flatten)]
    pub feed: FeedConfig,

    /// BatchRunner outer-loop timing and paths
    #[serde(flatten)]
    pub batch_runner: BatchRunnerConfig,
}

fn default_coordinator_base() -> String {
    "https://blogspot-comments-master.example.com".to_string()
}

fn default_upload_base() -> String {
    "https://blogstore.example.com".to_string()
}

fn default_retry_initial_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_increment() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_max_delay() -> Duration {
    Duration::from_secs(180)
}

fn default_retry_total_budget() -> Duration {
    Duration::from_secs(60 * 60 * 18)
}

fn default_worker_count() -> usize {
    10
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_pool_connection_limit() -> usize {
    30
}

fn default_transport_error_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_pause_tick_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_session_rebuild_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_progress_interval() -> u32 {
    20
}

fn default_feed_attempts() -> u32 {
    3
}

fn default_feed_retry_gap() -> Duration {
    Duration::from_secs(2)
}

fn default_feed_page_size() -> u32 {
    150
}

fn default_batch_loop_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_batch_attempts() -> u32 {
    3
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_domains_path() -> PathBuf {
    PathBuf::from("domains.txt")
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_survives_json_round_trip() {
        let original = WorkerConfig::default();
        let json = serde_json::to_string(&original).expect("serialize failed");
        let restored: WorkerConfig = serde_json::from_str(&json).expect("deserialize failed");

        assert_eq!(restored.endpoints.coordinator_base, original.endpoints.coordinator_base);
        assert_eq!(restored.pool.worker_count, original.pool.worker_count);
        assert_eq!(restored.retry.max_delay, original.retry.max_delay);
        assert_eq!(restored.batch_runner.output_dir, original.batch_runner.output_dir);
    }

    #[test]
    fn duration_serde_serializes_as_seconds() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(5),
            ..RetryConfig::default()
        };
        let json = serde_json::to_value(&config).expect("serialize failed");
        assert_eq!(json["initial_delay"], 5);
    }

    #[test]
    fn retry_config_defaults_match_the_documented_schedule() {
        let config = RetryConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(30));
        assert_eq!(config.increment, Duration::from_secs(30));
        assert_eq!(config.max_delay, Duration::from_secs(180));
        assert_eq!(config.total_budget, Duration::from_secs(64_800));
    }

    #[test]
    fn worker_config_deserializes_from_partial_json() {
        let json = r#"{"worker_count": 4}"#;
        let config: WorkerConfig = serde_json::from_str(json).expect("deserialize failed");
        assert_eq!(config.pool.worker_count, 4);
        assert_eq!(config.pool.progress_interval, 20);
    }
}
