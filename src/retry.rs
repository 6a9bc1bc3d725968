//! `RetryClient` — bounded exponential-backoff wrapper over the coordinator
//! HTTP calls, with three response-shape classification modes.
//!
//! This module classifies a raw `reqwest::Response`: coordinator calls
//! never produce a typed error on the wire, only a status code and a body
//! the caller must inspect. On terminal exhaustion it does not return an
//! error at all — it terminates the process, trusting the coordinator to
//! re-hand the batch to another worker.

use crate::config::RetryConfig;
use reqwest::Response;
use std::future::Future;
use std::time::Duration;

/// How to decide whether a response counts as success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classify {
    /// Success iff `status == 200`.
    StatusOnly,
    /// Success iff `status == 200` AND body text is not the literal
    /// `"Fail"` (`"Dupe"` counts as success too).
    TextGuard,
    /// Success iff `status == 200` AND body parses as a JSON object whose
    /// `batchID` field exists and is not the literal `"Fail"`.
    BatchGuard,
}

/// Outcome of a successful classified request: the status and whatever
/// body text was already consumed to classify it, so callers don't need
/// to re-read the body.
pub struct Classified {
    /// HTTP status of the successful response.
    pub status: u16,
    /// Body text of the successful response.
    pub body: String,
}

/// Issue `request` repeatedly, classifying each response per `mode`, until
/// a classified-success response is obtained. On transport failure or
/// classification failure, sleeps on the fixed additive backoff schedule
/// and retries. If cumulative sleep would exceed `config.total_budget`,
/// logs and exits the process with code 1.
pub async fn request_with_retry<F, Fut>(
    config: &RetryConfig,
    mode: Classify,
    label: &str,
    mut request: F,
) -> Classified
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<Response>>,
{
    let mut total_slept = Duration::ZERO;
    let mut delay = config.initial_delay;

    loop {
        if total_slept >= config.total_budget {
            tracing::error!(
                label,
                total_slept_secs = total_slept.as_secs(),
                "retry budget exhausted, exiting process"
            );
            std::process::exit(1);
        }

        match request().await {
            Ok(response) => match classify(response, mode).await {
                Ok(classified) => return classified,
                Err(status) => {
                    tracing::warn!(label, status, "coordinator response failed classification, retrying");
                }
            },
            Err(err) => {
                tracing::warn!(label, error = %err, "coordinator request transport error, retrying");
            }
        }

        tokio::time::sleep(delay).await;
        total_slept += delay;
        delay = (delay + config.increment).min(config.max_delay);
    }
}

/// Classify a single response. `Err(status)` carries the HTTP status for
/// logging (0 if the body could not even be read).
async fn classify(response: Response, mode: Classify) -> Result<Classified, u16> {
    let status = response.status().as_u16();

    match mode {
        Classify::StatusOnly => {
            if status == 200 {
                let body = response.text().await.unwrap_or_default();
                Ok(Classified { status, body })
            } else {
                Err(status)
            }
        }
        Classify::TextGuard => {
            let body = match response.text().await {
                Ok(b) => b,
                Err(_) => return Err(status),
            };
            if status == 200 && body != "Fail" {
                Ok(Classified { status, body })
            } else {
                Err(status)
            }
        }
        Classify::BatchGuard => {
            let body = match response.text().await {
                Ok(b) => b,
                Err(_) => return Err(status),
            };
            if status != 200 || body.is_empty() || body == "Fail" {
                return Err(status);
            }
            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(value) => {
                    let batch_id_ok = value
                        .get("batchID")
                        .map(|v| v.as_str() != Some("Fail"))
                        .unwrap_or(false);
                    if batch_id_ok {
                        Ok(Classified { status, body })
                    } else {
                        Err(status)
                    }
                }
                Err(_) => Err(status),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn status_only_succeeds_immediately_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("worker-id-123"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let config = RetryConfig {
            initial_delay: Duration::from_millis(1),
            increment: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            total_budget: Duration::from_secs(5),
        };

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let url = server.uri();
        let client_clone = client.clone();

        let result = request_with_retry(&config, Classify::StatusOnly, "test", move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let client = client_clone.clone();
            let url = url.clone();
            async move { client.get(&url).send().await }
        })
        .await;

        assert_eq!(result.body, "worker-id-123");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn text_guard_retries_on_fail_body_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Fail"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Success"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let config = RetryConfig {
            initial_delay: Duration::from_millis(1),
            increment: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            total_budget: Duration::from_secs(5),
        };

        let url = server.uri();
        let result = request_with_retry(&config, Classify::TextGuard, "test", move || {
            let client = client.clone();
            let url = url.clone();
            async move { client.get(&url).send().await }
        })
        .await;

        assert_eq!(result.body, "Success");
    }

    #[tokio::test]
    async fn text_guard_treats_dupe_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Dupe"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let config = RetryConfig {
            initial_delay: Duration::from_millis(1),
            increment: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            total_budget: Duration::from_secs(5),
        };

        let url = server.uri();
        let result = request_with_retry(&config, Classify::TextGuard, "test", move || {
            let client = client.clone();
            let url = url.clone();
            async move { client.get(&url).send().await }
        })
        .await;

        assert_eq!(result.body, "Dupe");
    }

    #[tokio::test]
    async fn batch_guard_rejects_missing_batch_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"other":1}"#))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"batchID":42}"#))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let config = RetryConfig {
            initial_delay: Duration::from_millis(1),
            increment: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            total_budget: Duration::from_secs(5),
        };

        let url = server.uri();
        let result = request_with_retry(&config, Classify::BatchGuard, "test", move || {
            let client = client.clone();
            let url = url.clone();
            async move { client.get(&url).send().await }
        })
        .await;

        let parsed: serde_json::Value = serde_json::from_str(&result.body).unwrap();
        assert_eq!(parsed["batchID"], 42);
    }

    #[tokio::test]
    async fn batch_guard_rejects_batch_id_fail_literal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"batchID":"Fail"}"#))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"batchID":7}"#))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let config = RetryConfig {
            initial_delay: Duration::from_millis(1),
            increment: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            total_budget: Duration::from_secs(5),
        };

        let url = server.uri();
        let result = request_with_retry(&config, Classify::BatchGuard, "test", move || {
            let client = client.clone();
            let url = url.clone();
            async move { client.get(&url).send().await }
        })
        .await;

        let parsed: serde_json::Value = serde_json::from_str(&result.body).unwrap();
        assert_eq!(parsed["batchID"], 7);
    }

    #[tokio::test]
    async fn backoff_delay_grows_by_the_fixed_increment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let config = RetryConfig {
            initial_delay: Duration::from_millis(20),
            increment: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
            total_budget: Duration::from_secs(5),
        };

        let start = std::time::Instant::now();
        let url = server.uri();
        let _result = request_with_retry(&config, Classify::StatusOnly, "test", move || {
            let client = client.clone();
            let url = url.clone();
            async move { client.get(&url).send().await }
        })
        .await;
        let elapsed = start.elapsed();

        // Two failed attempts: sleep 20ms, then 40ms => at least 60ms total
        assert!(elapsed >= Duration::from_millis(60), "elapsed was {elapsed:?}");
    }
}
