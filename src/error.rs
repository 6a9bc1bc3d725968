//! Error types for blogspot-archive-worker
//!
//! One variant per failure domain, following the retry policy described in
//! the module docs: most of these are surfaced to the caller as ordinary
//! `Result`s, but `RetryClient` and `PostPool` intentionally escalate a
//! subset of failures to a process exit rather than returning them (see
//! `retry.rs` and `pool.rs`).

use thiserror::Error;

/// Result type alias for blogspot-archive-worker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for this crate
#[derive(Debug, Error)]
pub enum Error {
    /// Network/transport error from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error (batch file, master domains file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The coordinator returned a batch descriptor this worker could not
    /// interpret (missing field, unexpected `batch_type`, etc.)
    #[error("invalid batch descriptor: {0}")]
    InvalidBatch(String),

    /// `BatchWriter` invariant violated by a caller (double `start_blog`,
    /// `add_blog_post` outside a blog, etc.)
    #[error("batch writer misuse: {0}")]
    BatchWriter(String),

    /// Graceful shutdown was requested via the cancellation token while a
    /// batch was in flight; the batch is reported failed and control
    /// returns to `BatchRunner::run`'s top-level loop, which observes the
    /// same cancellation and exits cleanly.
    #[error("shutdown requested")]
    ShuttingDown,

    /// Catch-all for conditions that don't fit another variant
    #[error("{0}")]
    Other(String),
}
