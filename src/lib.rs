//! # blogspot-archive-worker
//!
//! Distributed crawler-worker core for a Blogger-style comment archival
//! project: a concurrent post-download pool, a per-blog classifier, and a
//! batch lifecycle runner that together poll a coordinator for work,
//! enumerate and download blog posts and their comment trees, and upload
//! the result as a compressed batch artifact.
//!
//! ## Design Philosophy
//!
//! - **Crash-only on exhausted retries** — a `RetryClient` call that
//!   exhausts its cumulative retry budget exits the process rather than
//!   propagating an error indefinitely; there is no persistent work queue
//!   to resume from, so a clean restart is the only meaningful recovery.
//! - **External collaborators behind traits** — comment fetching and batch
//!   artifact writing are both trait objects (`CommentFetcher`,
//!   `BatchWriter`) with a concrete default implementation; embedders may
//!   swap either one out.
//! - **Cooperative, not preemptive, pausing** — `PostPool` workers pause
//!   and resume themselves by observing shared flags, never by being
//!   cancelled mid-request.
//!
//! ## Quick Start
//!
//! ```no_run
//! use blogspot_archive_worker::config::WorkerConfig;
//! use blogspot_archive_worker::{build_runner, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorkerConfig::default();
//!     let (runner, worker_id, cancellation) = build_runner(config).await?;
//!     run_with_shutdown(runner, worker_id, cancellation).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Outer batch-acquisition loop.
pub mod batch_runner;
/// `BatchWriter` trait and default gzip/JSON-lines implementation.
pub mod batch_writer;
/// Per-blog classification and download dispatch.
pub mod classifier;
/// `CommentFetcher` trait and default HTTP-backed implementation.
pub mod comment_fetcher;
/// Configuration types.
pub mod config;
/// Bindings over the coordinator's HTTP API.
pub mod coordinator;
/// Master domains file reader.
pub mod domains;
/// Error types.
pub mod error;
/// Blog feed pagination and classification.
pub mod feed;
/// Rebuildable HTTP session wrapper.
pub mod http_session;
/// Download worker pool.
pub mod pool;
/// Bounded retry/backoff request wrapper.
pub mod retry;
/// Core shared data types.
pub mod types;
/// Small shared free functions.
pub mod util;

pub use batch_runner::BatchRunner;
pub use classifier::BlogClassifier;
pub use config::WorkerConfig;
pub use coordinator::CoordinatorClient;
pub use error::{Error, Result};
pub use types::WorkerId;

use comment_fetcher::HttpCommentFetcher;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Build a fully-wired [`BatchRunner`] from a [`WorkerConfig`]: constructs
/// the HTTP session, the coordinator client, and the blog classifier, and
/// fetches this process's worker ID. The returned `CancellationToken`
/// controls the runner's shutdown; cancel it directly, or use
/// [`run_with_shutdown`] to wire it to OS signals.
pub async fn build_runner(
    config: WorkerConfig,
) -> Result<(BatchRunner, WorkerId, CancellationToken)> {
    let session = http_session::build_session(&config.pool)?;
    let coordinator = Arc::new(CoordinatorClient::new(
        session.clone(),
        config.endpoints.clone(),
        config.retry.clone(),
    ));

    let worker_id = coordinator.get_worker_id().await;
    tracing::info!(worker_id = %worker_id, "bootstrapped worker identity");

    let classifier = BlogClassifier::new(
        coordinator.clone(),
        config.feed.clone(),
        config.pool.clone(),
        Arc::new(HttpCommentFetcher),
        session,
        config.endpoints.blog_feed_base_override.clone(),
    );

    let cancellation = CancellationToken::new();
    let runner = BatchRunner::new(coordinator, classifier, config.batch_runner.clone(), cancellation.clone());

    Ok((runner, worker_id, cancellation))
}

/// Run `runner` until a termination signal arrives, then let it observe
/// `cancellation` (the token returned alongside it from [`build_runner`])
/// and shut down gracefully.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(runner: BatchRunner, worker_id: WorkerId, cancellation: CancellationToken) {
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        cancellation.cancel();
    });

    runner.run(&worker_id).await;
    signal_task.abort();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("received SIGTERM signal");
            } else {
                tracing::error!("could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C signal"),
    }
}
