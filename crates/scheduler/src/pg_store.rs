//! Postgres-backed job store.
//!
//! Same contract as `MemoryJobStore`; the status guard in each `UPDATE`'s
//! `WHERE` clause keeps terminal transitions one-way even across processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use matchday_common::types::{NotificationJob, NotificationType};

use crate::store::{JobStore, StoreError};

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: NotificationJob) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notification_jobs
                (id, user_id, notification_type, scheduled_for, timezone, status,
                 payload, sent_at, error_detail, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id)
        .bind(&job.user_id)
        .bind(job.notification_type)
        .bind(job.scheduled_for)
        .bind(&job.timezone)
        .bind(job.status)
        .bind(&job.payload)
        .bind(job.sent_at)
        .bind(&job.error_detail)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<NotificationJob>, StoreError> {
        let job: Option<NotificationJob> =
            sqlx::query_as("SELECT * FROM notification_jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(job)
    }

    async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<NotificationJob>, StoreError> {
        let jobs: Vec<NotificationJob> = sqlx::query_as(
            r#"
            SELECT * FROM notification_jobs
            WHERE status = 'pending' AND scheduled_for <= $1
            ORDER BY created_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn mark_delivered(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notification_jobs
            SET status = 'delivered', sent_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, id: Uuid, error_detail: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notification_jobs
            SET status = 'failed', error_detail = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(error_detail)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn pending(&self) -> Result<Vec<NotificationJob>, StoreError> {
        let jobs: Vec<NotificationJob> = sqlx::query_as(
            "SELECT * FROM notification_jobs WHERE status = 'pending' ORDER BY scheduled_for",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn pending_count(&self) -> Result<usize, StoreError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notification_jobs WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;

        Ok(row.0 as usize)
    }

    async fn has_pending_duplicate(
        &self,
        user_id: &str,
        notification_type: NotificationType,
        scheduled_for: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM notification_jobs
                WHERE status = 'pending'
                  AND user_id = $1
                  AND notification_type = $2
                  AND scheduled_for = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(notification_type)
        .bind(scheduled_for)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn prune_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM notification_jobs
            WHERE status != 'pending'
              AND COALESCE(sent_at, scheduled_for) < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
