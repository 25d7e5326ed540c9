//! Operational status routes for the scheduler and the watchdog.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use matchday_common::error::AppError;
use matchday_common::types::{SchedulerStatus, SupervisorHealth};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/scheduler/status", get(scheduler_status))
        .route("/api/watchdog/health", get(watchdog_health))
}

/// GET /api/scheduler/status: Run state and pending queue depth.
async fn scheduler_status(
    State(state): State<AppState>,
) -> Result<Json<SchedulerStatus>, AppError> {
    let status = state.scheduler.status().await?;
    Ok(Json(status))
}

/// GET /api/watchdog/health: Probe/restart bookkeeping for the prediction service.
async fn watchdog_health(State(state): State<AppState>) -> Json<SupervisorHealth> {
    Json(state.supervisor.health())
}
