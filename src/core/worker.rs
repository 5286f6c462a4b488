use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use super::errors::{Result, TransferError};
use super::store::UploadJob;
use super::traits::{Compressor, UploadApi, UploadRecord};
use super::types::{QueueConfig, UploadStatus};

/// Runs one claimed task through compress → write location → transfer →
/// record → read location.
pub(crate) struct UploadWorker {
    pub(crate) api: Arc<dyn UploadApi>,
    pub(crate) compressor: Arc<dyn Compressor>,
    pub(crate) config: Arc<QueueConfig>,
    pub(crate) cancellation_token: CancellationToken,
}

impl UploadWorker {
    /// Returns the url to attach to the completed task.
    ///
    /// `report` is called on every stage change, before the stage's
    /// suspension point.
    pub async fn run<F>(&self, job: &UploadJob, report: F) -> Result<String>
    where
        F: Fn(UploadStatus, u8),
    {
        let marks = &self.config.progress;

        report(UploadStatus::Compressing, marks.compressing);
        let file = if job.file.is_image() {
            self.guard("compress", self.compressor.compress(&job.file, &self.config.compression))
                .await?
        } else {
            job.file.clone()
        };
        debug!(upload_id = %job.id, original = job.file.size, compressed = file.size, "compressed");

        report(UploadStatus::Uploading, marks.uploading);
        let target = self
            .guard(
                "get upload url",
                self.api.get_upload_url(&job.order_id, &job.area, &file.name, &file.content_type),
            )
            .await?;

        report(UploadStatus::Uploading, marks.transferring);
        self.guard("transfer", self.api.transfer(&target.upload_url, &file)).await?;
        report(UploadStatus::Uploading, marks.transferred);

        report(UploadStatus::Recording, marks.recording);
        let record = UploadRecord {
            order_id: job.order_id.clone(),
            area: job.area.clone(),
            path: target.path.clone(),
            content_type: file.content_type.clone(),
            size: file.size,
        };
        let recorded = self.guard("record upload", self.api.record_upload(&record)).await?;

        report(UploadStatus::Recording, marks.resolving);
        let read = self
            .guard("get read url", self.api.get_read_url(&job.order_id, &recorded.id))
            .await;

        match read {
            Ok(location) => Ok(location.url),
            Err(TransferError::Cancelled) => Err(TransferError::Cancelled),
            Err(err) => {
                warn!(upload_id = %job.id, "read url unavailable, using public url: {err}");
                Ok(recorded.public_url)
            }
        }
    }

    /// Race a suspension point against the timeout and the cancellation token.
    async fn guard<T, Fut>(&self, operation: &'static str, future: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.config.operation_timeout;

        tokio::select! {
            _ = self.cancellation_token.cancelled() => Err(TransferError::Cancelled),
            result = tokio::time::timeout(timeout, future) => {
                result.map_err(|_| TransferError::Timeout { operation, timeout })?
            }
        }
    }
}
