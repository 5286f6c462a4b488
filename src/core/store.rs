use std::collections::HashMap;
use chrono::Utc;
use indexmap::IndexMap;
use super::types::{FilePayload, QueueStats, UploadId, UploadStatus, UploadTask};

/// Work handed to the pipeline when a task is claimed.
#[derive(Debug, Clone)]
pub(crate) struct UploadJob {
    pub id: UploadId,
    pub order_id: String,
    pub area: String,
    pub file: FilePayload,
    pub retries: u32,
    /// Serial of this claim; a later claim of the same task gets a new one
    pub claim: u64,
}

/// How a failed attempt was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settlement {
    /// Back to pending, held until the backoff elapses
    Requeued { retries: u32 },
    Failed,
}

struct TaskEntry {
    task: UploadTask,
    /// False while a requeued task waits out its backoff
    ready: bool,
}

/// Authoritative task list plus the claimed ids.
///
/// Insertion order is display order and admission order.
#[derive(Default)]
pub(crate) struct TaskStore {
    tasks: IndexMap<UploadId, TaskEntry>,
    claimed: HashMap<UploadId, u64>,
    next_claim: u64,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, task: UploadTask) -> UploadId {
        let id = task.id;
        self.tasks.insert(id, TaskEntry { task, ready: true });
        id
    }

    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }

    /// Claim the first ready pending task, if a slot is free.
    pub fn claim_next(&mut self, limit: usize) -> Option<UploadJob> {
        if self.claimed.len() >= limit {
            return None;
        }

        let claimed = &self.claimed;
        let entry = self.tasks.values_mut().find(|entry| {
            entry.ready
                && entry.task.status == UploadStatus::Pending
                && !claimed.contains_key(&entry.task.id)
        })?;

        entry.task.started_at = Some(Utc::now());
        self.next_claim += 1;
        let task = &entry.task;
        let job = UploadJob {
            id: task.id,
            order_id: task.order_id.clone(),
            area: task.area.clone(),
            file: task.file.clone(),
            retries: task.retries,
            claim: self.next_claim,
        };

        self.claimed.insert(job.id, job.claim);
        Some(job)
    }

    /// Drop a claim unless the task was claimed again since.
    pub fn release(&mut self, id: &UploadId, claim: u64) {
        if self.claimed.get(id) == Some(&claim) {
            self.claimed.remove(id);
        }
    }

    /// Move a claimed task to `status` and raise its progress.
    ///
    /// Returns a snapshot only if something changed.
    pub fn advance(&mut self, id: &UploadId, status: UploadStatus, progress: u8) -> Option<UploadTask> {
        let entry = self.tasks.get_mut(id)?;
        let task = &mut entry.task;

        if task.status != status {
            if !UploadStatus::is_valid_transition(task.status, status) {
                return None;
            }
            task.status = status;
        } else if progress <= task.progress {
            return None;
        }

        task.progress = task.progress.max(progress.min(100));
        Some(task.clone())
    }

    /// Settles the attempt and frees its slot.
    pub fn complete(&mut self, id: &UploadId, result_url: String) -> Option<UploadTask> {
        self.claimed.remove(id);
        let entry = self.tasks.get_mut(id)?;
        let task = &mut entry.task;

        if !UploadStatus::is_valid_transition(task.status, UploadStatus::Completed) {
            return None;
        }

        task.status = UploadStatus::Completed;
        task.progress = 100;
        task.error = None;
        task.result_url = Some(result_url);
        task.completed_at = Some(Utc::now());
        Some(task.clone())
    }

    /// Requeue under the retry budget, otherwise fail terminally.
    ///
    /// The slot is freed in the same step, so a task reported as failed can
    /// be retried right away.
    pub fn settle_failure(
        &mut self,
        id: &UploadId,
        error: String,
        max_retries: u32,
        retryable: bool,
    ) -> Option<(UploadTask, Settlement)> {
        self.claimed.remove(id);
        let entry = self.tasks.get_mut(id)?;
        let task = &mut entry.task;

        if task.status.is_terminal() {
            return None;
        }

        let settlement = if retryable && task.retries < max_retries {
            task.retries += 1;
            task.status = UploadStatus::Pending;
            task.progress = 0;
            task.error = Some(error);
            entry.ready = false;
            Settlement::Requeued { retries: task.retries }
        } else {
            task.status = UploadStatus::Failed;
            task.error = Some(error);
            task.completed_at = Some(Utc::now());
            Settlement::Failed
        };

        Some((task.clone(), settlement))
    }

    /// End the backoff hold of a requeued task.
    pub fn mark_ready(&mut self, id: &UploadId) -> bool {
        match self.tasks.get_mut(id) {
            Some(entry) if entry.task.status == UploadStatus::Pending => {
                entry.ready = true;
                true
            }
            _ => false,
        }
    }

    /// Manual retry; only failed tasks are reset.
    pub fn retry(&mut self, id: &UploadId) -> Option<UploadTask> {
        let entry = self.tasks.get_mut(id)?;
        let task = &mut entry.task;

        if task.status != UploadStatus::Failed {
            return None;
        }

        task.status = UploadStatus::Pending;
        task.retries = 0;
        task.progress = 0;
        task.error = None;
        task.completed_at = None;
        entry.ready = true;
        Some(task.clone())
    }

    /// Fail every pending task that does not hold a slot.
    pub fn fail_unclaimed(&mut self, error: &str) -> Vec<UploadTask> {
        let claimed = &self.claimed;
        self.tasks
            .values_mut()
            .filter(|entry| entry.task.status == UploadStatus::Pending && !claimed.contains_key(&entry.task.id))
            .map(|entry| {
                entry.task.status = UploadStatus::Failed;
                entry.task.error = Some(error.to_string());
                entry.task.completed_at = Some(Utc::now());
                entry.ready = true;
                entry.task.clone()
            })
            .collect()
    }

    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, entry| entry.task.status != UploadStatus::Completed);
        before - self.tasks.len()
    }

    pub fn get_task(&self, id: &UploadId) -> Option<&UploadTask> {
        self.tasks.get(id).map(|entry| &entry.task)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &UploadTask> {
        self.tasks.values().map(|entry| &entry.task)
    }

    pub fn active_count(&self) -> usize {
        self.tasks().filter(|task| task.status.is_active()).count()
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        let mut progress_sum = 0u64;
        let mut progress_count = 0u64;

        for task in self.tasks() {
            stats.total += 1;
            match task.status {
                UploadStatus::Pending => stats.pending += 1,
                UploadStatus::Completed => stats.completed += 1,
                UploadStatus::Failed => stats.failed += 1,
                _ => stats.in_flight += 1,
            }

            if task.status != UploadStatus::Failed {
                progress_sum += task.progress as u64;
                progress_count += 1;
            }
        }

        if progress_count > 0 {
            stats.overall_progress = progress_sum as f64 / progress_count as f64;
        }

        stats
    }
}
