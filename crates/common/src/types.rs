use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of notifications the scheduler knows how to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    DailyDigest,
    MatchAlert,
    PredictionResult,
    ValueAlert,
    Generic,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::DailyDigest => write!(f, "daily_digest"),
            NotificationType::MatchAlert => write!(f, "match_alert"),
            NotificationType::PredictionResult => write!(f, "prediction_result"),
            NotificationType::ValueAlert => write!(f, "value_alert"),
            NotificationType::Generic => write!(f, "generic"),
        }
    }
}

/// Delivery state of a notification job.
///
/// Transitions are one-way: `Pending` → `Delivered` or `Pending` → `Failed`.
/// A failed job is never retried; a generator or operator enqueues a fresh
/// job instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Delivered,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Delivered => write!(f, "delivered"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A scheduled notification awaiting (or having completed) delivery.
///
/// `scheduled_for` is an absolute UTC instant computed once at creation from
/// the user's local wall-clock target and timezone; it is never recomputed.
/// `timezone` is retained for audit/display only: due-ness is decided purely
/// by instant comparison.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationJob {
    pub id: Uuid,
    pub user_id: String,
    pub notification_type: NotificationType,
    pub scheduled_for: DateTime<Utc>,
    pub timezone: String,
    pub status: JobStatus,
    pub payload: serde_json::Value,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NotificationJob {
    /// Create a new pending job with a fresh ID.
    pub fn new(
        user_id: impl Into<String>,
        notification_type: NotificationType,
        scheduled_for: DateTime<Utc>,
        timezone: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            notification_type,
            scheduled_for,
            timezone: timezone.into(),
            status: JobStatus::Pending,
            payload,
            sent_at: None,
            error_detail: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status != JobStatus::Pending
    }
}

/// Human-readable notification content built by the generators.
///
/// Serialized into the job's opaque `payload` at enqueue time; the delivery
/// adapter passes it through without interpreting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Short title (e.g., "Your daily predictions are ready")
    pub title: String,
    /// Detailed body message
    pub body: String,
    /// Additional type-specific fields for client-side rendering
    pub data: serde_json::Value,
}

impl NotificationPayload {
    /// Convert into the opaque JSON stored on the job.
    pub fn into_value(self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// A user opted into the daily digest, with the zone their 07:00 resolves in.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DigestSubscriber {
    pub user_id: String,
    pub timezone: String,
}

/// A user opted into pre-kickoff match alerts.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AlertSubscriber {
    pub user_id: String,
    pub timezone: String,
}

/// An upcoming fixture the match-alert generator scans.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UpcomingMatch {
    pub id: Uuid,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub starts_at: DateTime<Utc>,
}

/// Snapshot returned by the scheduler's status surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub pending_count: usize,
}

/// Snapshot returned by the watchdog's health surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorHealth {
    /// True when the most recent probe succeeded.
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub restart_attempts: u32,
    /// True once the lifetime restart budget is spent; only external
    /// intervention can recover the supervised service after this.
    pub restarts_exhausted: bool,
    pub last_restart_at: Option<DateTime<Utc>>,
}
