use std::sync::Arc;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use crate::compress::PassthroughCompressor;
use super::errors::{Result, TransferError};
use super::observer::{ObserverRegistry, Subscription};
use super::store::{Settlement, TaskStore, UploadJob};
use super::traits::{Compressor, TaskObserver, UploadApi};
use super::types::{FilePayload, QueueConfig, QueueStats, UploadId, UploadStatus, UploadTask};
use super::worker::UploadWorker;

// Snapshots buffered per event-stream receiver
const EVENT_CAPACITY: usize = 256;

struct QueueInner {
    config: Arc<QueueConfig>,
    store: Mutex<TaskStore>,
    observers: Arc<ObserverRegistry>,
    event_tx: broadcast::Sender<UploadTask>,
    idle: Notify,
    api: Arc<dyn UploadApi>,
    compressor: Arc<dyn Compressor>,
    runtime: Handle,
    shutdown: CancellationToken,
}

/// Client-side background upload queue.
///
/// Bounds how many files are in flight, drives each task through its
/// pipeline, retries transient failures and publishes every task change.
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct UploadQueue {
    inner: Arc<QueueInner>,
}

impl UploadQueue {
    pub fn builder() -> UploadQueueBuilder {
        UploadQueueBuilder::new()
    }

    /// Add one file; returns the new task id.
    pub fn enqueue(&self, order_id: &str, area: &str, file: FilePayload) -> UploadId {
        let task = UploadTask::new(order_id, area, file);
        info!(
            upload_id = %task.id,
            order_id,
            area,
            file = %task.file.name,
            size = task.file.size,
            "upload enqueued"
        );

        let id = self.inner.store.lock().add_task(task);
        self.inner.schedule();
        id
    }

    /// Add several files for the same order and area, keeping input order.
    pub fn enqueue_many<I>(&self, order_id: &str, area: &str, files: I) -> Vec<UploadId>
    where
        I: IntoIterator<Item = FilePayload>,
    {
        files
            .into_iter()
            .map(|file| self.enqueue(order_id, area, file))
            .collect()
    }

    /// Register an observer for every task change.
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: TaskObserver + 'static,
    {
        self.inner.observers.register(Arc::new(observer))
    }

    /// Same snapshots as observers receive, as a broadcast stream.
    ///
    /// A receiver that falls behind by more than the channel capacity loses
    /// the oldest snapshots (`RecvError::Lagged`).
    pub fn subscribe_events(&self) -> broadcast::Receiver<UploadTask> {
        self.inner.event_tx.subscribe()
    }

    pub fn tasks(&self) -> Vec<UploadTask> {
        self.inner.store.lock().tasks().cloned().collect()
    }

    pub fn task(&self, id: &UploadId) -> Option<UploadTask> {
        self.inner.store.lock().get_task(id).cloned()
    }

    pub fn tasks_by_area(&self, area: &str) -> Vec<UploadTask> {
        self.inner
            .store
            .lock()
            .tasks()
            .filter(|task| task.area == area)
            .cloned()
            .collect()
    }

    /// Tasks that are neither completed nor failed.
    pub fn active_count(&self) -> usize {
        self.inner.store.lock().active_count()
    }

    pub fn has_active_uploads(&self) -> bool {
        self.active_count() > 0
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.store.lock().stats()
    }

    /// Drop completed tasks from the list. Observers are not notified.
    pub fn clear_completed(&self) -> usize {
        let removed = self.inner.store.lock().clear_completed();
        if removed > 0 {
            debug!(removed, "cleared completed uploads");
        }
        removed
    }

    /// Reset a failed task and schedule it again.
    ///
    /// Unknown ids and tasks that are not failed are ignored.
    pub fn retry(&self, id: &UploadId) {
        let snapshot = self.inner.store.lock().retry(id);
        if let Some(snapshot) = snapshot {
            info!(upload_id = %id, "manual retry");
            self.inner.publish(snapshot);
            self.inner.schedule();
        }
    }

    /// Resolves once no task is pending or in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.has_active_uploads() {
                return;
            }
            notified.await;
        }
    }

    /// Cancel in-flight uploads and fail everything still pending.
    pub fn shutdown(&self) {
        info!("upload queue shutting down");
        self.inner.shutdown.cancel();
        self.inner.schedule();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }
}

impl QueueInner {
    /// One scheduling pass: claim ready pending tasks in list order until
    /// the concurrency limit is reached.
    ///
    /// Claiming happens under the store lock, so concurrent passes never
    /// double-claim or overshoot the limit.
    fn schedule(self: &Arc<Self>) {
        if self.shutdown.is_cancelled() {
            let failed = self.store.lock().fail_unclaimed(&TransferError::Cancelled.to_string());
            for snapshot in failed {
                self.publish(snapshot);
            }
            self.idle.notify_waiters();
            return;
        }

        let jobs: Vec<UploadJob> = {
            let mut store = self.store.lock();
            std::iter::from_fn(|| store.claim_next(self.config.concurrency)).collect()
        };

        for job in jobs {
            debug!(upload_id = %job.id, attempt = job.retries + 1, "upload claimed");
            self.runtime.spawn(run_task(self.clone(), job));
        }
    }

    fn publish(&self, snapshot: UploadTask) {
        // Stream first: an observer may publish again from its callback
        let _ = self.event_tx.send(snapshot.clone());
        self.observers.notify(&snapshot);
    }

    fn advance(&self, id: &UploadId, status: UploadStatus, progress: u8) {
        let snapshot = self.store.lock().advance(id, status, progress);
        if let Some(snapshot) = snapshot {
            debug!(upload_id = %id, %status, progress, "upload stage");
            self.publish(snapshot);
        }
    }

    /// Hold a requeued task for its backoff, then make it claimable again.
    fn readmit_after(self: &Arc<Self>, id: UploadId, retries: u32) {
        let delay = self.config.retry.get_delay(retries);
        let inner = self.clone();

        self.runtime.spawn(async move {
            tokio::select! {
                _ = inner.shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    inner.store.lock().mark_ready(&id);
                }
            }
            inner.schedule();
        });
    }
}

/// Frees the slot and starts the next pass when a pipeline ends, also when
/// it unwinds out of a panicking observer.
struct SlotGuard {
    inner: Arc<QueueInner>,
    id: UploadId,
    claim: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.inner.store.lock().release(&self.id, self.claim);
        self.inner.schedule();
        self.inner.idle.notify_waiters();
    }
}

async fn run_task(inner: Arc<QueueInner>, job: UploadJob) {
    let _slot = SlotGuard {
        inner: inner.clone(),
        id: job.id,
        claim: job.claim,
    };

    let worker = UploadWorker {
        api: inner.api.clone(),
        compressor: inner.compressor.clone(),
        config: inner.config.clone(),
        cancellation_token: inner.shutdown.child_token(),
    };

    let result = worker
        .run(&job, |status, progress| inner.advance(&job.id, status, progress))
        .await;

    match result {
        Ok(result_url) => {
            let snapshot = inner.store.lock().complete(&job.id, result_url);
            if let Some(snapshot) = snapshot {
                info!(upload_id = %job.id, url = ?snapshot.result_url, "upload completed");
                inner.publish(snapshot);
            }
        }
        Err(err) => {
            let settled = inner.store.lock().settle_failure(
                &job.id,
                err.to_string(),
                inner.config.max_retries,
                err.is_retryable(),
            );

            if let Some((snapshot, settlement)) = settled {
                match settlement {
                    Settlement::Requeued { retries } => {
                        warn!(
                            upload_id = %job.id,
                            retries,
                            max_retries = inner.config.max_retries,
                            "upload failed, requeued: {err}"
                        );
                        inner.publish(snapshot);
                        inner.readmit_after(job.id, retries);
                    }
                    Settlement::Failed => {
                        error!(upload_id = %job.id, retries = snapshot.retries, "upload failed: {err}");
                        inner.publish(snapshot);
                    }
                }
            }
        }
    }
}

/// Builds an `UploadQueue` bound to the current tokio runtime.
pub struct UploadQueueBuilder {
    config: QueueConfig,
    api: Option<Arc<dyn UploadApi>>,
    compressor: Arc<dyn Compressor>,
    runtime: Option<Handle>,
}

impl UploadQueueBuilder {
    pub fn new() -> Self {
        Self {
            config: QueueConfig::default(),
            api: None,
            compressor: Arc::new(PassthroughCompressor),
            runtime: None,
        }
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn api(mut self, api: Arc<dyn UploadApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    /// Defaults to the runtime `build` is called from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<UploadQueue> {
        self.config.validate()?;

        let api = self
            .api
            .ok_or_else(|| TransferError::Config("an upload api is required".to_string()))?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()
                .map_err(|err| TransferError::internal(format!("no tokio runtime: {err}")))?,
        };
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(UploadQueue {
            inner: Arc::new(QueueInner {
                config: Arc::new(self.config),
                store: Mutex::new(TaskStore::new()),
                observers: Arc::new(ObserverRegistry::default()),
                event_tx,
                idle: Notify::new(),
                api,
                compressor: self.compressor,
                runtime,
                shutdown: CancellationToken::new(),
            }),
        })
    }
}

impl Default for UploadQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}
