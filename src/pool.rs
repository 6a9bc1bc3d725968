//! `PostPool` — N-worker download pool with a cooperative pause-and-reset
//! barrier.
//!
//! Concurrency model: real OS-thread-parallel scheduling via
//! `tokio::task::spawn`, with shared state behind a single
//! `tokio::sync::Mutex<PoolState>` plus `Arc<AtomicU32>` counters.

use crate::batch_writer::BatchWriter;
use crate::comment_fetcher::{CommentFetchError, CommentFetcher};
use crate::config::PoolConfig;
use crate::http_session;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Mutex-guarded fields of the pool: the work queue and the two
/// single-writer-latch flags. Grouped together so the barrier's
/// check-and-set is atomic with respect to the queue.
struct PoolState {
    queue: VecDeque<String>,
    should_pause: bool,
    restarting_session: bool,
}

/// A transient set of N cooperating download tasks bound to one
/// accessible blog.
pub struct PostPool {
    config: PoolConfig,
    state: Mutex<PoolState>,
    posts_finished: AtomicU64,
    workers_finished: AtomicU32,
    workers_paused: AtomicU32,
    log_cooldown: AtomicU64,
    session: Mutex<reqwest::Client>,
    batch_writer: Arc<Mutex<Box<dyn BatchWriter>>>,
    comment_fetcher: Arc<dyn CommentFetcher>,
    total_posts: usize,
    starting_post: usize,
    batch_file_name: String,
    started_at: Instant,
}

impl PostPool {
    /// Construct a pool over `posts[starting_post:]`. `posts` is the full
    /// post list (used for progress denominators); `starting_post` is
    /// normally 0 — the resumable-offset parameter is preserved for API
    /// parity, but this core has no resumable queue to resume into.
    ///
    /// `batch_writer` is a shared handle: the caller has already opened the
    /// blog record with `start_blog` and keeps the same handle to call
    /// `end_blog` once the pool finishes.
    pub fn new(
        posts: Vec<String>,
        batch_writer: Arc<Mutex<Box<dyn BatchWriter>>>,
        comment_fetcher: Arc<dyn CommentFetcher>,
        session: reqwest::Client,
        config: PoolConfig,
        starting_post: usize,
        batch_file_name: String,
    ) -> Self {
        let total_posts = posts.len();
        let queue: VecDeque<String> = posts.into_iter().skip(starting_post).collect();

        Self {
            config,
            state: Mutex::new(PoolState { queue, should_pause: false, restarting_session: false }),
            posts_finished: AtomicU64::new(0),
            workers_finished: AtomicU32::new(0),
            workers_paused: AtomicU32::new(0),
            log_cooldown: AtomicU64::new(0),
            session: Mutex::new(session),
            batch_writer,
            comment_fetcher,
            total_posts,
            starting_post,
            batch_file_name,
            started_at: Instant::now(),
        }
    }

    /// Number of posts successfully stored so far.
    pub fn posts_finished(&self) -> u64 {
        self.posts_finished.load(Ordering::SeqCst)
    }

    /// Spawn `config.worker_count` workers and block until every one
    /// transitions to Finished.
    pub async fn run(self: Arc<Self>) {
        let worker_count = self.config.worker_count;
        let mut handles = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let pool = self.clone();
            let name = format!("downloader-{i:02}", i = i);
            handles.push(tokio::spawn(async move { pool.worker_loop(name).await }));
        }
        for result in futures::future::join_all(handles).await {
            if let Err(err) = result {
                tracing::error!(error = %err, "pool worker task panicked");
            }
        }
    }

    async fn worker_loop(self: Arc<Self>, name: String) {
        let mut paused = false;

        loop {
            let queue_is_empty = {
                let state = self.state.lock().await;
                state.queue.is_empty()
            };
            if queue_is_empty {
                break;
            }

            let should_pause = {
                let state = self.state.lock().await;
                state.should_pause
            };
            let progress_exhausted = self.starting_post as u64 + self.posts_finished() >= self.total_posts as u64;

            if should_pause || progress_exhausted {
                self.pause_tick(&name, &mut paused).await;
                continue;
            }

            let url = {
                let mut state = self.state.lock().await;
                state.queue.pop_back()
            };
            let Some(url) = url else { continue };

            if paused {
                paused = false;
                self.workers_paused.fetch_sub(1, Ordering::SeqCst);
                tracing::info!(worker = %name, "resuming from rate limit pause");
            }

            self.download_post(&name, &url).await;
        }

        self.workers_finished.fetch_add(1, Ordering::SeqCst);
        tracing::info!(worker = %name, "worker finished");
    }

    /// One tick of the pause loop: sleep, mark this worker paused if it
    /// wasn't already, then — if this tick makes this worker the last one
    /// to pause — win the barrier and rebuild the session.
    async fn pause_tick(&self, name: &str, paused: &mut bool) {
        tokio::time::sleep(self.config.pause_tick_delay).await;

        if !*paused {
            *paused = true;
            self.workers_paused.fetch_add(1, Ordering::SeqCst);
        } else {
            tracing::info!(worker = %name, "waiting for all workers to pause");
        }

        let should_rebuild = {
            let mut state = self.state.lock().await;
            let paused_count = self.workers_paused.load(Ordering::SeqCst);
            let finished_count = self.workers_finished.load(Ordering::SeqCst);
            let worker_count = self.config.worker_count as u32;
            if !state.restarting_session
                && state.should_pause
                && paused_count >= worker_count.saturating_sub(finished_count)
            {
                state.restarting_session = true;
                true
            } else {
                false
            }
        };

        if should_rebuild {
            tracing::info!(worker = %name, "all workers paused, restarting session");
            tokio::time::sleep(self.config.session_rebuild_delay).await;

            match http_session::build_session(&self.config) {
                Ok(new_client) => {
                    *self.session.lock().await = new_client;
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to rebuild HTTP session");
                }
            }

            let mut state = self.state.lock().await;
            state.should_pause = false;
            state.restarting_session = false;
        }
    }

    /// Fetch comments for `url` and either store it, requeue it after a
    /// soft-block pause signal, or requeue it after a transport-error
    /// delay. Any other failure (a `BatchWriter` invariant violation) is
    /// fatal.
    async fn download_post(&self, name: &str, url: &str) {
        let session = self.session.lock().await.clone();

        match self.comment_fetcher.fetch(url, &session).await {
            Ok(comments) => {
                let is_first_post = self.posts_finished() == 0;
                {
                    let mut writer = self.batch_writer.lock().await;
                    if let Err(err) = writer.add_blog_post(url, &comments, is_first_post) {
                        tracing::error!(worker = %name, error = %err, "fatal: batch writer rejected post");
                        std::process::exit(1);
                    }
                }
                let finished_count = self.posts_finished.fetch_add(1, Ordering::SeqCst) + 1;
                self.log_progress(name, finished_count).await;
            }
            Err(CommentFetchError::SoftBlock(reason)) => {
                tracing::warn!(worker = %name, reason, "soft block detected, pausing and requeuing");
                let mut state = self.state.lock().await;
                state.queue.push_back(url.to_string());
                state.should_pause = true;
            }
            Err(CommentFetchError::Transport(err)) => {
                tracing::warn!(worker = %name, error = %err, "transport error, requeuing");
                tokio::time::sleep(self.config.transport_error_delay).await;
                let mut state = self.state.lock().await;
                state.queue.push_back(url.to_string());
            }
        }
    }

    async fn log_progress(&self, name: &str, finished_count: u64) {
        let (should_pause, restarting) = {
            let state = self.state.lock().await;
            (state.should_pause, state.restarting_session)
        };

        let cooldown = self.log_cooldown.fetch_add(1, Ordering::SeqCst) + 1;
        if cooldown >= self.config.progress_interval as u64 || should_pause || restarting {
            self.log_cooldown.store(0, Ordering::SeqCst);
            tracing::info!(
                worker = %name,
                batch_file = %self.batch_file_name,
                post_index = self.starting_post as u64 + finished_count,
                total = self.total_posts,
                elapsed_secs = self.started_at.elapsed().as_secs_f64(),
                "download progress"
            );
        }
    }
}
