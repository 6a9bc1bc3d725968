//! `BatchRunner` — the outer batch-acquisition loop: request a batch,
//! download every blog it names, upload the result, and report status.

use crate::batch_writer::{BatchWriter, GzipJsonLinesWriter};
use crate::classifier::BlogClassifier;
use crate::config::BatchRunnerConfig;
use crate::coordinator::CoordinatorClient;
use crate::domains::MasterDomainsFile;
use crate::error::{Error, Result};
use crate::types::{BatchDescriptor, BatchStatus, BatchType, WorkerId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Outer batch loop: acquire a batch, attempt it up to `config.attempts`
/// times, report status, repeat until cancelled.
pub struct BatchRunner {
    coordinator: Arc<CoordinatorClient>,
    classifier: BlogClassifier,
    config: BatchRunnerConfig,
    cancellation: CancellationToken,
}

impl BatchRunner {
    pub fn new(
        coordinator: Arc<CoordinatorClient>,
        classifier: BlogClassifier,
        config: BatchRunnerConfig,
        cancellation: CancellationToken,
    ) -> Self {
        Self { coordinator, classifier, config, cancellation }
    }

    /// Run batches until the cancellation token fires. Returns only on
    /// graceful shutdown; a batch-writer invariant violation inside a
    /// worker is still fatal and exits the process directly.
    pub async fn run(&self, worker_id: &WorkerId) {
        loop {
            if self.cancellation.is_cancelled() {
                tracing::info!("shutdown requested, exiting batch loop");
                return;
            }

            tracing::info!("requesting new batch");
            let batch = match self.coordinator.get_batch(worker_id).await {
                Ok(batch) => batch,
                Err(err) => {
                    tracing::warn!(error = %err, "unable to get batch, requesting new batch shortly");
                    tokio::time::sleep(self.config.loop_delay).await;
                    continue;
                }
            };
            tracing::info!(batch_id = batch.batch_id, batch_type = ?batch.batch_type, "received batch");

            let mut succeeded = false;
            for attempt in 1..=self.config.attempts {
                match self.download_and_upload(worker_id, &batch).await {
                    Ok(()) => {
                        succeeded = true;
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(
                            batch_id = batch.batch_id,
                            attempt,
                            error = %err,
                            "error downloading batch, retrying shortly"
                        );
                        tokio::time::sleep(self.config.loop_delay).await;
                    }
                }
            }
            if !succeeded {
                tracing::warn!(batch_id = batch.batch_id, "unable to download batch, requesting new batch");
            }

            tokio::time::sleep(self.config.loop_delay).await;
        }
    }

    /// One attempt at a batch: write every blog, finalize and upload the
    /// artifact, then report terminal status regardless of outcome.
    async fn download_and_upload(&self, worker_id: &WorkerId, batch: &BatchDescriptor) -> Result<()> {
        let writer: Arc<Mutex<Box<dyn BatchWriter>>> = Arc::new(Mutex::new(Box::new(GzipJsonLinesWriter::new(
            self.config.output_dir.as_path(),
            batch.batch_id,
        ))));

        let write_result = self.write_batch(worker_id, batch, &writer).await;

        if let Err(err) = write_result {
            self.coordinator.update_status(worker_id, batch, BatchStatus::Failed).await;
            return Err(err);
        }

        writer.lock().await.end_batch()?;

        let (directory, file_name) = {
            let w = writer.lock().await;
            (w.directory().to_path_buf(), w.file_name().to_string())
        };
        let file_bytes = std::fs::read(directory.join(&file_name))?;

        let uploaded = self.coordinator.upload_batch(worker_id, batch, file_bytes, &file_name).await;
        let status = if uploaded { BatchStatus::Complete } else { BatchStatus::Failed };
        self.coordinator.update_status(worker_id, batch, status).await;

        let _ = std::fs::remove_file(directory.join(&file_name));

        if uploaded {
            Ok(())
        } else {
            Err(Error::Other(format!("upload failed for batch {}", batch.batch_id)))
        }
    }

    async fn write_batch(
        &self,
        worker_id: &WorkerId,
        batch: &BatchDescriptor,
        writer: &Arc<Mutex<Box<dyn BatchWriter>>>,
    ) -> Result<()> {
        match batch.batch_type {
            BatchType::List => {
                let mut domains = MasterDomainsFile::open(&self.config.domains_path)?;
                let names = domains.read_names(batch.file_offset, batch.batch_size)?;
                for (i, blog_name) in names.iter().enumerate() {
                    self.check_cancellation(batch)?;
                    self.classifier.process_blog(worker_id, batch, writer, blog_name, i == 0).await?;
                }
            }
            BatchType::Domain => {
                if batch.content.is_empty() {
                    return Err(Error::InvalidBatch("domain batch has empty content".to_string()));
                }
                self.check_cancellation(batch)?;
                self.classifier.process_blog(worker_id, batch, writer, &batch.content, true).await?;
            }
        }
        Ok(())
    }

    /// Checked before each blog, not mid-blog: on shutdown, bail out with
    /// `Error::ShuttingDown` so the caller's existing failure path reports
    /// the batch and returns, rather than reaching into the process
    /// directly. `BatchRunner::run`'s own top-of-loop cancellation check
    /// then stops the worker from requesting another batch.
    fn check_cancellation(&self, batch: &BatchDescriptor) -> Result<()> {
        if self.cancellation.is_cancelled() {
            tracing::warn!(batch_id = batch.batch_id, "graceful shutdown requested mid-batch");
            return Err(Error::ShuttingDown);
        }
        Ok(())
    }
}
