//! Job queue seam: where pending notification jobs live.
//!
//! The scheduler never assumes a particular storage: it talks to this trait
//! and the deployment picks an implementation (`MemoryJobStore` here,
//! `PgJobStore` for durable backing).
//!
//! Status transitions are enforced at the store level: a job that already
//! reached `Delivered` or `Failed` is never touched again, so a racing or
//! repeated `mark_*` call cannot rewrite history.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use matchday_common::error::AppError;
use matchday_common::types::{JobStatus, NotificationJob, NotificationType};

/// Errors surfaced by a job store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

/// Persistence port for the notification job queue.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job. No deduplication: callers own that concern.
    async fn insert(&self, job: NotificationJob) -> Result<(), StoreError>;

    /// Look up a job by ID.
    async fn get(&self, id: Uuid) -> Result<Option<NotificationJob>, StoreError>;

    /// All pending jobs with `scheduled_for <= now`, in enqueue order.
    async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<NotificationJob>, StoreError>;

    /// Transition a pending job to `Delivered`, recording `sent_at`.
    ///
    /// Returns `false` (and changes nothing) when the job is missing or
    /// already terminal.
    async fn mark_delivered(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Transition a pending job to `Failed`, recording the cause.
    ///
    /// Returns `false` (and changes nothing) when the job is missing or
    /// already terminal.
    async fn mark_failed(&self, id: Uuid, error_detail: &str) -> Result<bool, StoreError>;

    /// Snapshot of all pending jobs.
    async fn pending(&self) -> Result<Vec<NotificationJob>, StoreError>;

    /// Number of pending jobs.
    async fn pending_count(&self) -> Result<usize, StoreError>;

    /// Whether a pending job with the same user, type and instant exists.
    /// Generators use this to stay idempotent across repeated runs.
    async fn has_pending_duplicate(
        &self,
        user_id: &str,
        notification_type: NotificationType,
        scheduled_for: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Remove terminal jobs whose completion timestamp (`sent_at`, falling
    /// back to `scheduled_for`: no failure timestamp is tracked) is older
    /// than the cutoff. Pending jobs are never removed, regardless of age.
    /// Returns the removed count.
    async fn prune_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// In-memory job store.
///
/// Backs tests and storage-free deployments; jobs vanish with the process.
/// Insertion order is preserved so dispatch enumerates in enqueue order.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<NotificationJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: NotificationJob) -> Result<(), StoreError> {
        self.jobs.lock().expect("job store mutex poisoned").push(job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<NotificationJob>, StoreError> {
        let jobs = self.jobs.lock().expect("job store mutex poisoned");
        Ok(jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<NotificationJob>, StoreError> {
        let jobs = self.jobs.lock().expect("job store mutex poisoned");
        Ok(jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending && j.scheduled_for <= now)
            .cloned()
            .collect())
    }

    async fn mark_delivered(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().expect("job store mutex poisoned");
        match jobs
            .iter_mut()
            .find(|j| j.id == id && j.status == JobStatus::Pending)
        {
            Some(job) => {
                job.status = JobStatus::Delivered;
                job.sent_at = Some(sent_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_failed(&self, id: Uuid, error_detail: &str) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().expect("job store mutex poisoned");
        match jobs
            .iter_mut()
            .find(|j| j.id == id && j.status == JobStatus::Pending)
        {
            Some(job) => {
                job.status = JobStatus::Failed;
                job.error_detail = Some(error_detail.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pending(&self) -> Result<Vec<NotificationJob>, StoreError> {
        let jobs = self.jobs.lock().expect("job store mutex poisoned");
        Ok(jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .cloned()
            .collect())
    }

    async fn pending_count(&self) -> Result<usize, StoreError> {
        let jobs = self.jobs.lock().expect("job store mutex poisoned");
        Ok(jobs.iter().filter(|j| j.status == JobStatus::Pending).count())
    }

    async fn has_pending_duplicate(
        &self,
        user_id: &str,
        notification_type: NotificationType,
        scheduled_for: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let jobs = self.jobs.lock().expect("job store mutex poisoned");
        Ok(jobs.iter().any(|j| {
            j.status == JobStatus::Pending
                && j.user_id == user_id
                && j.notification_type == notification_type
                && j.scheduled_for == scheduled_for
        }))
    }

    async fn prune_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut jobs = self.jobs.lock().expect("job store mutex poisoned");
        let before = jobs.len();
        jobs.retain(|j| {
            if j.status == JobStatus::Pending {
                return true;
            }
            let completed_at = j.sent_at.unwrap_or(j.scheduled_for);
            completed_at >= cutoff
        });
        Ok((before - jobs.len()) as u64)
    }
}
