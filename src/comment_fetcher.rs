//! `CommentFetcher` — fetches the comment/reply tree for a single post.
//!
//! Treated as an external collaborator, consumed as an opaque fetch
//! primitive; the core only depends on the trait below. A concrete
//! HTTP-backed implementation is provided so the crate is usable
//! standalone, but embedders are free to supply their own.

use async_trait::async_trait;
use serde_json::Value;

/// Fetch the comment tree for a single post URL.
///
/// Implementations decide their own pagination/depth strategy; the core
/// only requires that a JSON-decode or value error on the returned future
/// be distinguishable from a transport error, since `PostPool` classifies
/// those two failure shapes differently (see `pool::download_post`).
#[async_trait]
pub trait CommentFetcher: Send + Sync {
    /// Fetch the raw comment feed for `post_url` using `session`.
    async fn fetch(
        &self,
        post_url: &str,
        session: &reqwest::Client,
    ) -> Result<Value, CommentFetchError>;
}

/// Failure shape returned by a `CommentFetcher`, distinguishing the two
/// taxonomies `PostPool::download_post` must tell apart: a soft-block
/// signal (non-JSON body where JSON was expected) versus an ordinary
/// transport failure.
#[derive(Debug)]
pub enum CommentFetchError {
    /// The response body did not parse as JSON, or had an unexpected
    /// shape — the platform's soft-block signature.
    SoftBlock(String),
    /// Connection reset, timeout, disconnect, or other transport failure.
    Transport(reqwest::Error),
}

impl std::fmt::Display for CommentFetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommentFetchError::SoftBlock(msg) => write!(f, "soft block: {msg}"),
            CommentFetchError::Transport(err) => write!(f, "transport error: {err}"),
        }
    }
}

/// Default HTTP-backed `CommentFetcher`. Issues a single GET to
/// `{post_url}/comments/default?alt=json&max-results=1000` and returns the
/// parsed JSON body as-is; comments beyond the first 1000 on a post, and
/// any reply/+1 expansion, are left in the raw feed payload for the
/// caller to interpret rather than fetched or flattened here.
pub struct HttpCommentFetcher;

#[async_trait]
impl CommentFetcher for HttpCommentFetcher {
    async fn fetch(
        &self,
        post_url: &str,
        session: &reqwest::Client,
    ) -> Result<Value, CommentFetchError> {
        let comments_url = format!("{post_url}/comments/default?alt=json&max-results=1000");

        let response = session
            .get(&comments_url)
            .send()
            .await
            .map_err(CommentFetchError::Transport)?;

        let text = response.text().await.map_err(CommentFetchError::Transport)?;

        serde_json::from_str::<Value>(&text)
            .map_err(|e| CommentFetchError::SoftBlock(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_returns_parsed_json_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"feed": {}})))
            .mount(&server)
            .await;

        let fetcher = HttpCommentFetcher;
        let client = reqwest::Client::new();
        let result = fetcher.fetch(&server.uri(), &client).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn fetch_reports_soft_block_on_non_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
            .mount(&server)
            .await;

        let fetcher = HttpCommentFetcher;
        let client = reqwest::Client::new();
        let result = fetcher.fetch(&server.uri(), &client).await;
        assert!(matches!(result, Err(CommentFetchError::SoftBlock(_))));
    }
}
