//! `FeedFetcher` — paginates a blog's post feed and classifies blog
//! status.

use crate::config::FeedConfig;
use crate::types::BlogResult;

/// Paginate `blog_base_url`'s post feed and classify the result.
///
/// `blog_base_url` must not include the `/feeds/...` suffix; it is
/// appended per page. URL rewriting of empty-host links (the
/// `https:///` quirk) is the caller's responsibility — see
/// `util::fix_empty_host_url` — `FeedFetcher` never rewrites URLs itself.
pub async fn fetch_blog(
    client: &reqwest::Client,
    config: &FeedConfig,
    blog_base_url: &str,
    exclusion_limit: u64,
) -> BlogResult {
    let mut post_urls = Vec::new();
    let mut page_index: u64 = 0;

    loop {
        let start_index = page_index * u64::from(config.page_size) + 1;

        if exclusion_limit > 0 && start_index > exclusion_limit {
            return BlogResult::TooManyPosts;
        }

        let url = format!(
            "{blog_base_url}/feeds/posts/default?max-results={}&alt=json&start-index={start_index}",
            config.page_size
        );

        let response = fetch_page_with_retries(client, config, &url).await;

        let response = match response {
            Some(r) => r,
            None => return BlogResult::NotFound,
        };

        match response.status().as_u16() {
            404 => return BlogResult::NotFound,
            401 => return BlogResult::Private,
            200 => {}
            _ => return BlogResult::OtherError,
        }

        let text = match response.text().await {
            Ok(t) => t,
            Err(_) => return BlogResult::TooManyPosts,
        };

        let feed_json: serde_json::Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(blog_base_url, "feed page did not parse as JSON, marking exclusion");
                return BlogResult::TooManyPosts;
            }
        };

        let entries = feed_json
            .get("feed")
            .and_then(|feed| feed.get("entry"))
            .and_then(|entry| entry.as_array());

        let entries = match entries {
            Some(entries) => entries,
            None if page_index == 0 => return BlogResult::NoEntries,
            None => return BlogResult::Accessible(post_urls),
        };

        for entry in entries {
            let href = entry
                .get("link")
                .and_then(|links| links.as_array())
                .and_then(|links| links.last())
                .and_then(|link| link.get("href"))
                .and_then(|href| href.as_str());
            if let Some(href) = href {
                post_urls.push(href.to_string());
            }
        }

        if entries.len() < config.page_size as usize {
            return BlogResult::Accessible(post_urls);
        }
        page_index += 1;
    }
}

/// Up to `config.attempts_per_page` attempts at `url`, with
/// `config.retry_gap` between failures. Returns `None` if every attempt
/// failed to produce a response at all.
async fn fetch_page_with_retries(
    client: &reqwest::Client,
    config: &FeedConfig,
    url: &str,
) -> Option<reqwest::Response> {
    for attempt in 1..=config.attempts_per_page {
        match client.get(url).send().await {
            Ok(response) if response.status() == 200 => return Some(response),
            Ok(response) => {
                if attempt == config.attempts_per_page {
                    return Some(response);
                }
                tokio::time::sleep(config.retry_gap).await;
            }
            Err(err) => {
                tracing::warn!(url, attempt, error = %err, "feed page fetch failed");
                if attempt == config.attempts_per_page {
                    return None;
                }
                tokio::time::sleep(config.retry_gap).await;
            }
        }
    }
    None
}
