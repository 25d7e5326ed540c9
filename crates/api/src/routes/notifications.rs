//! Notification queue routes: enqueue, inspect, prune.

use axum::extract::{Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use matchday_common::error::AppError;
use matchday_common::types::{NotificationJob, NotificationType};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", post(schedule_notification))
        .route("/api/notifications/pending", get(pending_notifications))
        .route("/api/notifications/old", delete(clear_old_notifications))
}

/// Body for enqueueing a notification from outside the generators.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleNotificationRequest {
    pub user_id: String,
    pub notification_type: NotificationType,
    /// Absolute UTC instant the job becomes eligible for delivery.
    pub scheduled_for: DateTime<Utc>,
    /// IANA zone identifier, retained for audit/display only.
    pub timezone: String,
    pub payload: serde_json::Value,
}

/// POST /api/notifications: Enqueue a new notification job.
async fn schedule_notification(
    State(state): State<AppState>,
    Json(request): Json<ScheduleNotificationRequest>,
) -> Result<Json<NotificationJob>, AppError> {
    let job = NotificationJob::new(
        request.user_id,
        request.notification_type,
        request.scheduled_for,
        request.timezone,
        request.payload,
    );
    state.scheduler.schedule_notification(job.clone()).await?;
    Ok(Json(job))
}

/// GET /api/notifications/pending: Snapshot of all pending jobs.
async fn pending_notifications(
    State(state): State<AppState>,
) -> Result<Json<Vec<NotificationJob>>, AppError> {
    let pending = state.scheduler.pending_notifications().await?;
    Ok(Json(pending))
}

#[derive(Debug, Deserialize)]
struct PruneParams {
    days: Option<i64>,
}

/// DELETE /api/notifications/old?days=N: Prune old terminal jobs.
async fn clear_old_notifications(
    State(state): State<AppState>,
    Query(params): Query<PruneParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let days = params.days.unwrap_or(7);
    if days < 0 {
        return Err(AppError::Validation(
            "days must be non-negative".to_string(),
        ));
    }
    let removed = state.scheduler.clear_old_notifications(days).await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}
