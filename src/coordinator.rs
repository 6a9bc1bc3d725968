//! `CoordinatorClient` — typed bindings over the coordinator HTTP API,
//! each call routed through [`crate::retry::request_with_retry`]
//! with the classification mode the original per-endpoint behavior calls
//! for.

use crate::config::{EndpointConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::{request_with_retry, Classify};
use crate::types::{BatchDescriptor, BatchStatus, BatchType, WorkerId};

/// Bindings over the coordinator's `/worker/*` endpoints and the separate
/// upload storage endpoint.
pub struct CoordinatorClient {
    client: reqwest::Client,
    endpoints: EndpointConfig,
    retry: RetryConfig,
}

impl CoordinatorClient {
    /// Build a client over the given endpoint and retry configuration.
    pub fn new(client: reqwest::Client, endpoints: EndpointConfig, retry: RetryConfig) -> Self {
        Self { client, endpoints, retry }
    }

    /// `GET /worker/getID` — bootstrap this process's worker identifier.
    pub async fn get_worker_id(&self) -> WorkerId {
        let url = format!("{}/worker/getID", self.endpoints.coordinator_base);
        let client = self.client.clone();
        let classified =
            request_with_retry(&self.retry, Classify::TextGuard, "get_worker_id", move || {
                let client = client.clone();
                let url = url.clone();
                async move { client.get(&url).send().await }
            })
            .await;
        WorkerId(classified.body)
    }

    /// `GET /worker/getBatch` — request the next batch assignment.
    pub async fn get_batch(&self, worker_id: &WorkerId) -> Result<BatchDescriptor> {
        let url = format!("{}/worker/getBatch", self.endpoints.coordinator_base);
        let client = self.client.clone();
        let worker_id = worker_id.0.clone();
        let classified =
            request_with_retry(&self.retry, Classify::BatchGuard, "get_batch", move || {
                let client = client.clone();
                let url = url.clone();
                let worker_id = worker_id.clone();
                async move { client.get(&url).query(&[("id", worker_id)]).send().await }
            })
            .await;

        parse_batch_descriptor(&classified.body)
    }

    /// `GET /worker/updateStatus` — report terminal batch status.
    pub async fn update_status(
        &self,
        worker_id: &WorkerId,
        batch: &BatchDescriptor,
        status: BatchStatus,
    ) {
        let url = format!("{}/worker/updateStatus", self.endpoints.coordinator_base);
        let client = self.client.clone();
        let params = [
            ("id", worker_id.0.clone()),
            ("batchID", batch.batch_id.to_string()),
            ("randomKey", batch.random_key.to_string()),
            ("status", status.as_wire_str().to_string()),
        ];
        request_with_retry(&self.retry, Classify::TextGuard, "update_status", move || {
            let client = client.clone();
            let url = url.clone();
            let params = params.clone();
            async move { client.get(&url).query(&params).send().await }
        })
        .await;
    }

    /// `GET /worker/submitExclusion`
    pub async fn submit_exclusion(&self, worker_id: &WorkerId, batch: &BatchDescriptor, blog_name: &str) {
        self.submit_batch_exception("exclusion", worker_id, batch, blog_name, None).await
    }

    /// `GET /worker/submitPrivate`
    pub async fn submit_private(&self, worker_id: &WorkerId, batch: &BatchDescriptor, blog_name: &str) {
        self.submit_batch_exception("private", worker_id, batch, blog_name, None).await
    }

    /// `GET /worker/submitDeleted`
    pub async fn submit_deleted(&self, worker_id: &WorkerId, batch: &BatchDescriptor, blog_name: &str) {
        self.submit_batch_exception("deleted", worker_id, batch, blog_name, None).await
    }

    /// `GET /worker/submitDomain`
    pub async fn submit_domain(
        &self,
        worker_id: &WorkerId,
        batch: &BatchDescriptor,
        blog_name: &str,
        canonical_domain: &str,
    ) {
        self.submit_batch_exception("domain", worker_id, batch, blog_name, Some(canonical_domain))
            .await
    }

    /// Shared implementation for the four `submit*` endpoints.
    ///
    /// A `"Dupe"` response is treated identically to `"Success"` — a batch
    /// exception submission is idempotent, since another worker may have
    /// already reported the same blog; `TextGuard` already folds `"Dupe"`
    /// into its success path.
    async fn submit_batch_exception(
        &self,
        kind: &'static str,
        worker_id: &WorkerId,
        batch: &BatchDescriptor,
        blog_name: &str,
        domain: Option<&str>,
    ) {
        let path = match kind {
            "exclusion" => "submitExclusion",
            "private" => "submitPrivate",
            "deleted" => "submitDeleted",
            "domain" => "submitDomain",
            _ => unreachable!("submit_batch_exception called with unknown kind {kind}"),
        };
        let url = format!("{}/worker/{path}", self.endpoints.coordinator_base);

        let mut params = vec![
            ("id".to_string(), worker_id.0.clone()),
            ("batchID".to_string(), batch.batch_id.to_string()),
            ("randomKey".to_string(), batch.random_key.to_string()),
        ];
        if kind == "domain" {
            params.push(("blog".to_string(), blog_name.to_string()));
            params.push((
                "domain".to_string(),
                domain.unwrap_or_default().to_string(),
            ));
        } else {
            params.push((kind.to_string(), blog_name.to_string()));
        }

        let client = self.client.clone();
        let label: &'static str = kind;
        request_with_retry(&self.retry, Classify::TextGuard, label, move || {
            let client = client.clone();
            let url = url.clone();
            let params = params.clone();
            async move { client.get(&url).query(&params).send().await }
        })
        .await;
    }

    /// `POST /submitBatchUnit` — multipart upload of the finalized batch
    /// artifact. Returns whether the upload succeeded (HTTP 200);
    /// non-success is not retried here — the caller (`BatchRunner`)
    /// decides batch status from the result directly.
    pub async fn upload_batch(
        &self,
        worker_id: &WorkerId,
        batch: &BatchDescriptor,
        file_bytes: Vec<u8>,
        file_name: &str,
    ) -> bool {
        let url = format!("{}/submitBatchUnit", self.endpoints.upload_base);

        let part = match reqwest::multipart::Part::bytes(file_bytes)
            .file_name(file_name.to_string())
            .mime_str("application/x-gzip")
        {
            Ok(part) => part,
            Err(_) => return false,
        };

        let form = reqwest::multipart::Form::new()
            .text("workerID", worker_id.0.clone())
            .text("batchID", batch.batch_id.to_string())
            .text("batchKey", batch.random_key.to_string())
            .text("version", batch.worker_version.to_string())
            .part("data", part);

        match self.client.post(&url).multipart(form).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::warn!(error = %err, "batch upload transport error");
                false
            }
        }
    }
}

fn parse_batch_descriptor(body: &str) -> Result<BatchDescriptor> {
    let value: serde_json::Value = serde_json::from_str(body)?;

    let batch_type = match value.get("assignmentType").and_then(|v| v.as_str()) {
        Some("list") => BatchType::List,
        Some("domain") => BatchType::Domain,
        other => {
            return Err(Error::InvalidBatch(format!(
                "unrecognized assignmentType: {other:?}"
            )))
        }
    };

    let field_i64 = |key: &str| -> Result<i64> {
        value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| Error::InvalidBatch(format!("missing or non-integer field: {key}")))
    };
    let field_u64 = |key: &str| -> Result<u64> {
        value
            .get(key)
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::InvalidBatch(format!("missing or non-integer field: {key}")))
    };

    Ok(BatchDescriptor {
        batch_id: field_i64("batchID")?,
        random_key: field_i64("randomKey")?,
        batch_type,
        content: value
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        batch_size: field_u64("batchSize").unwrap_or(0),
        file_offset: field_u64("offset").unwrap_or(0),
        exclusion_limit: field_u64("limit").unwrap_or(0),
        worker_version: field_u64("worker_version").unwrap_or(3) as u32,
    })
}
