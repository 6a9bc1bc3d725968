//! `BlogClassifier` — fetches one blog's feed, classifies the result, and
//! drives the appropriate coordinator/`BatchWriter`/`PostPool` reaction.

use crate::batch_writer::BatchWriter;
use crate::comment_fetcher::CommentFetcher;
use crate::config::{FeedConfig, PoolConfig};
use crate::coordinator::CoordinatorClient;
use crate::error::Result;
use crate::feed::fetch_blog;
use crate::pool::PostPool;
use crate::types::{BatchDescriptor, BatchType, BlogResult, BlogStatusTag, WorkerId};
use crate::util::fix_empty_host_url;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The worker protocol version this crate reports on every `start_blog`
/// call.
pub const WORKER_VERSION: u32 = 3;

/// Classifies and downloads one blog at a time against a shared batch
/// artifact.
pub struct BlogClassifier {
    coordinator: Arc<CoordinatorClient>,
    feed_config: FeedConfig,
    pool_config: PoolConfig,
    comment_fetcher: Arc<dyn CommentFetcher>,
    client: reqwest::Client,
    blog_feed_base_override: Option<String>,
}

impl BlogClassifier {
    pub fn new(
        coordinator: Arc<CoordinatorClient>,
        feed_config: FeedConfig,
        pool_config: PoolConfig,
        comment_fetcher: Arc<dyn CommentFetcher>,
        client: reqwest::Client,
        blog_feed_base_override: Option<String>,
    ) -> Self {
        Self { coordinator, feed_config, pool_config, comment_fetcher, client, blog_feed_base_override }
    }

    /// Fetch, classify, and (for accessible blogs) fully download
    /// `blog_name`'s posts into `writer`. `writer` must not have a blog
    /// record open on entry, and will not have one open on return.
    pub async fn process_blog(
        &self,
        worker_id: &WorkerId,
        batch: &BatchDescriptor,
        writer: &Arc<Mutex<Box<dyn BatchWriter>>>,
        blog_name: &str,
        is_first_blog: bool,
    ) -> Result<()> {
        let blog_base_url = match &self.blog_feed_base_override {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{blog_name}.blogspot.com"),
        };
        let blog_domain = format!("{blog_name}.blogspot.com");

        tracing::info!(blog_name, "downloading blog");
        let result = fetch_blog(&self.client, &self.feed_config, &blog_base_url, batch.exclusion_limit).await;

        match result {
            BlogResult::NotFound => {
                tracing::info!(blog_name, batch_id = batch.batch_id, "marking as deleted");
                self.coordinator.submit_deleted(worker_id, batch, blog_name).await;
                self.record_simple(writer, blog_name, &blog_domain, BlogStatusTag::Deleted, is_first_blog).await
            }
            BlogResult::Private => {
                tracing::info!(blog_name, batch_id = batch.batch_id, "marking as private");
                self.coordinator.submit_private(worker_id, batch, blog_name).await;
                self.record_simple(writer, blog_name, &blog_domain, BlogStatusTag::Private, is_first_blog).await
            }
            BlogResult::OtherError | BlogResult::TooManyPosts => {
                self.record_exclusion_or_investigate(worker_id, batch, writer, blog_name, &blog_domain, is_first_blog)
                    .await
            }
            BlogResult::NoEntries => {
                tracing::info!(blog_name, batch_id = batch.batch_id, "blog has no posts");
                self.record_simple(writer, blog_name, &blog_domain, BlogStatusTag::Accessible, is_first_blog).await
            }
            BlogResult::Accessible(post_urls) => {
                self.download_accessible_blog(worker_id, batch, writer, blog_name, &blog_domain, post_urls, is_first_blog)
                    .await
            }
        }
    }

    /// `TooManyPosts`/`OtherError` both map to the same list/domain-mode
    /// branch: exclude-and-report in list mode, flag for manual review in
    /// domain mode.
    async fn record_exclusion_or_investigate(
        &self,
        worker_id: &WorkerId,
        batch: &BatchDescriptor,
        writer: &Arc<Mutex<Box<dyn BatchWriter>>>,
        blog_name: &str,
        blog_domain: &str,
        is_first_blog: bool,
    ) -> Result<()> {
        match batch.batch_type {
            BatchType::List => {
                tracing::info!(blog_name, batch_id = batch.batch_id, "marking as exclusion");
                self.coordinator.submit_exclusion(worker_id, batch, blog_name).await;
                self.record_simple(writer, blog_name, blog_domain, BlogStatusTag::Exclusion, is_first_blog).await
            }
            BatchType::Domain => {
                tracing::info!(blog_name, batch_id = batch.batch_id, "marking as investigate");
                self.record_simple(writer, blog_name, blog_domain, BlogStatusTag::Investigate, is_first_blog).await
            }
        }
    }

    async fn download_accessible_blog(
        &self,
        worker_id: &WorkerId,
        batch: &BatchDescriptor,
        writer: &Arc<Mutex<Box<dyn BatchWriter>>>,
        blog_name: &str,
        blog_domain: &str,
        post_urls: Vec<String>,
        is_first_blog: bool,
    ) -> Result<()> {
        let post_urls: Vec<String> =
            post_urls.into_iter().map(|url| fix_empty_host_url(&url, blog_name)).collect();

        let canonical_domain = post_urls
            .first()
            .and_then(|url| url::Url::parse(url).ok())
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| blog_domain.to_string());

        if canonical_domain != blog_domain {
            tracing::info!(blog_name, canonical_domain, "marking as custom domain");
            self.coordinator.submit_domain(worker_id, batch, blog_name, &canonical_domain).await;
        }

        let file_name = {
            let mut w = writer.lock().await;
            w.start_blog(WORKER_VERSION, blog_name, &canonical_domain, BlogStatusTag::Accessible, is_first_blog)?;
            w.file_name().to_string()
        };

        let pool = Arc::new(PostPool::new(
            post_urls,
            writer.clone(),
            self.comment_fetcher.clone(),
            self.client.clone(),
            self.pool_config.clone(),
            0,
            file_name,
        ));
        pool.run().await;

        writer.lock().await.end_blog()
    }

    async fn record_simple(
        &self,
        writer: &Arc<Mutex<Box<dyn BatchWriter>>>,
        blog_name: &str,
        blog_domain: &str,
        status_tag: BlogStatusTag,
        is_first_blog: bool,
    ) -> Result<()> {
        let mut w = writer.lock().await;
        w.start_blog(WORKER_VERSION, blog_name, blog_domain, status_tag, is_first_blog)?;
        w.end_blog()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch_writer::GzipJsonLinesWriter;
    use crate::comment_fetcher::CommentFetchError;
    use crate::config::{EndpointConfig, RetryConfig};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::time::Duration;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NoComments;

    #[async_trait]
    impl CommentFetcher for NoComments {
        async fn fetch(&self, _url: &str, _session: &reqwest::Client) -> std::result::Result<Value, CommentFetchError> {
            Ok(serde_json::json!([]))
        }
    }

    fn batch(batch_type: BatchType) -> BatchDescriptor {
        BatchDescriptor {
            batch_id: 1,
            random_key: 2,
            batch_type,
            content: String::new(),
            batch_size: 1,
            file_offset: 0,
            exclusion_limit: 0,
            worker_version: WORKER_VERSION,
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(1),
            increment: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            total_budget: Duration::from_secs(5),
        }
    }

    fn fast_feed() -> FeedConfig {
        FeedConfig { attempts_per_page: 1, retry_gap: Duration::from_millis(1), page_size: 150 }
    }

    fn fast_pool() -> PoolConfig {
        PoolConfig {
            worker_count: 2,
            http_timeout: Duration::from_secs(20),
            connection_limit: 30,
            transport_error_delay: Duration::from_millis(1),
            pause_tick_delay: Duration::from_millis(1),
            session_rebuild_delay: Duration::from_millis(1),
            progress_interval: 20,
        }
    }

    async fn classifier_for(server: &MockServer) -> BlogClassifier {
        let coordinator = CoordinatorClient::new(
            reqwest::Client::new(),
            EndpointConfig { coordinator_base: server.uri(), upload_base: server.uri(), blog_feed_base_override: None },
            fast_retry(),
        );
        BlogClassifier::new(
            Arc::new(coordinator),
            fast_feed(),
            fast_pool(),
            Arc::new(NoComments),
            reqwest::Client::new(),
            Some(server.uri()),
        )
    }

    #[tokio::test]
    async fn deleted_blog_is_recorded_and_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/feeds/posts/default$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/worker/submitDeleted$"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Success"))
            .mount(&server)
            .await;

        let classifier = classifier_for(&server).await;
        let dir = tempfile::tempdir().unwrap();
        let writer: Arc<Mutex<Box<dyn BatchWriter>>> =
            Arc::new(Mutex::new(Box::new(GzipJsonLinesWriter::new(dir.path(), 1))));
        let batch = batch(BatchType::List);

        classifier
            .process_blog(&WorkerId("w".to_string()), &batch, &writer, "deadblog", true)
            .await
            .unwrap();

        writer.lock().await.end_batch().unwrap();
    }

    #[tokio::test]
    async fn private_blog_is_recorded_and_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/feeds/posts/default$"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/worker/submitPrivate$"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Success"))
            .mount(&server)
            .await;

        let classifier = classifier_for(&server).await;
        let dir = tempfile::tempdir().unwrap();
        let writer: Arc<Mutex<Box<dyn BatchWriter>>> =
            Arc::new(Mutex::new(Box::new(GzipJsonLinesWriter::new(dir.path(), 1))));
        let batch = batch(BatchType::List);

        classifier
            .process_blog(&WorkerId("w".to_string()), &batch, &writer, "privateblog", true)
            .await
            .unwrap();

        writer.lock().await.end_batch().unwrap();
    }

    #[tokio::test]
    async fn exclusion_over_limit_is_reported_in_list_mode_without_further_submission() {
        let server = MockServer::start().await;
        let entries: Vec<_> = (0..150)
            .map(|i| serde_json::json!({ "link": [ { "href": format!("https://excl.blogspot.com/p{i}") } ] }))
            .collect();
        Mock::given(method("GET"))
            .and(path_regex(r"^/feeds/posts/default$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "feed": { "entry": entries }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/worker/submitExclusion$"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Success"))
            .mount(&server)
            .await;

        let classifier = classifier_for(&server).await;
        let dir = tempfile::tempdir().unwrap();
        let writer: Arc<Mutex<Box<dyn BatchWriter>>> =
            Arc::new(Mutex::new(Box::new(GzipJsonLinesWriter::new(dir.path(), 1))));
        let mut batch = batch(BatchType::List);
        batch.exclusion_limit = 1;

        classifier
            .process_blog(&WorkerId("w".to_string()), &batch, &writer, "excl", true)
            .await
            .unwrap();

        writer.lock().await.end_batch().unwrap();
    }

    #[tokio::test]
    async fn accessible_blog_with_custom_domain_is_detected_and_downloaded() {
        let server = MockServer::start().await;
        let entries = vec![serde_json::json!({ "link": [ { "href": "https://www.example-custom.com/p1" } ] })];
        Mock::given(method("GET"))
            .and(path_regex(r"^/feeds/posts/default$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "feed": { "entry": entries }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/worker/submitDomain$"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Success"))
            .mount(&server)
            .await;

        let classifier = classifier_for(&server).await;
        let dir = tempfile::tempdir().unwrap();
        let writer: Arc<Mutex<Box<dyn BatchWriter>>> =
            Arc::new(Mutex::new(Box::new(GzipJsonLinesWriter::new(dir.path(), 1))));
        let batch = batch(BatchType::Domain);

        classifier
            .process_blog(&WorkerId("w".to_string()), &batch, &writer, "customblog", true)
            .await
            .unwrap();

        writer.lock().await.end_batch().unwrap();
    }
}
