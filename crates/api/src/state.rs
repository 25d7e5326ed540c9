//! Shared application state for the Axum status surface.

use std::sync::Arc;

use matchday_scheduler::scheduler::NotificationScheduler;
use matchday_watchdog::supervisor::ServiceSupervisor;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<NotificationScheduler>,
    pub supervisor: Arc<ServiceSupervisor>,
}

impl AppState {
    pub fn new(scheduler: Arc<NotificationScheduler>, supervisor: Arc<ServiceSupervisor>) -> Self {
        Self {
            scheduler,
            supervisor,
        }
    }
}
