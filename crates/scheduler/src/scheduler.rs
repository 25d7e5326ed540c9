//! Notification scheduler.
//!
//! Owns the job queue and three recurring loops:
//! 1. Dispatch tick: delivers every pending job whose instant has arrived
//! 2. Daily digest generation: anchored to a fixed UTC wall-clock time,
//!    also runs retention pruning
//! 3. Match-alert generation: scans upcoming fixtures on a short cadence
//!
//! All loops stop on a shared watch signal; an in-flight tick body is never
//! interrupted, it just isn't followed by another one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use matchday_common::types::{
    NotificationJob, NotificationPayload, NotificationType, SchedulerStatus,
};

use crate::delivery::DeliveryAdapter;
use crate::directory::UserDirectory;
use crate::store::{JobStore, StoreError};
use crate::timing;

/// Local wall-clock time at which a user's daily digest lands.
const DIGEST_LOCAL_HOUR: u32 = 7;
const DIGEST_LOCAL_MINUTE: u32 = 0;

/// Tunable knobs for the scheduler's loops.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the dispatch tick runs.
    pub dispatch_interval: Duration,
    /// Per-delivery timeout; a timeout counts as a delivery failure.
    pub delivery_timeout: Duration,
    /// UTC hour the daily digest generation (and retention pruning) runs at.
    pub digest_generation_hour_utc: u32,
    /// How often the match-alert generator scans upcoming fixtures.
    pub match_alert_interval: Duration,
    /// How long before kickoff a match alert fires.
    pub match_alert_offset: chrono::Duration,
    /// How far ahead the match-alert generator looks.
    pub match_lookahead: chrono::Duration,
    /// Days a terminal job is retained before pruning.
    pub retention_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dispatch_interval: Duration::from_secs(60),
            delivery_timeout: Duration::from_secs(30),
            digest_generation_hour_utc: 6,
            match_alert_interval: Duration::from_secs(600),
            match_alert_offset: chrono::Duration::minutes(30),
            match_lookahead: chrono::Duration::hours(24),
            retention_days: 7,
        }
    }
}

/// The notification scheduler component.
///
/// Collaborators are injected so deployments and tests can swap storage,
/// transport and the preference source independently.
pub struct NotificationScheduler {
    store: Arc<dyn JobStore>,
    delivery: Arc<dyn DeliveryAdapter>,
    directory: Arc<dyn UserDirectory>,
    config: SchedulerConfig,
    running: AtomicBool,
    dispatch_in_flight: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl NotificationScheduler {
    pub fn new(
        store: Arc<dyn JobStore>,
        delivery: Arc<dyn DeliveryAdapter>,
        directory: Arc<dyn UserDirectory>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            delivery,
            directory,
            config,
            running: AtomicBool::new(false),
            dispatch_in_flight: AtomicBool::new(false),
            shutdown,
        }
    }

    /// Start the dispatch and generation loops. Idempotent: a second call
    /// while running is a logged no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Notification scheduler already running; start ignored");
            return;
        }
        self.shutdown.send_replace(false);

        tokio::spawn(Self::dispatch_loop(self.clone()));
        tokio::spawn(Self::digest_loop(self.clone()));
        tokio::spawn(Self::match_alert_loop(self.clone()));

        tracing::info!(
            dispatch_interval_secs = self.config.dispatch_interval.as_secs(),
            digest_hour_utc = self.config.digest_generation_hour_utc,
            match_alert_interval_secs = self.config.match_alert_interval.as_secs(),
            "Notification scheduler started"
        );
    }

    /// Stop all loops. Idempotent. The queue is left untouched and an
    /// in-flight tick runs to completion.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            tracing::debug!("Notification scheduler not running; stop ignored");
            return;
        }
        self.shutdown.send_replace(true);
        tracing::info!("Notification scheduler stopped");
    }

    /// Insert a new pending job into the queue.
    ///
    /// No deduplication is performed here; callers (and the generators) own
    /// that concern.
    pub async fn schedule_notification(&self, job: NotificationJob) -> Result<(), StoreError> {
        tracing::info!(
            job_id = %job.id,
            user_id = %job.user_id,
            notification_type = %job.notification_type,
            scheduled_for = %job.scheduled_for,
            "Notification scheduled"
        );
        self.store.insert(job).await
    }

    /// Read-only snapshot of all pending jobs.
    pub async fn pending_notifications(&self) -> Result<Vec<NotificationJob>, StoreError> {
        self.store.pending().await
    }

    /// Remove terminal jobs older than the retention horizon; returns the
    /// removed count. Pending jobs survive regardless of age.
    pub async fn clear_old_notifications(&self, retention_days: i64) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::days(retention_days);
        let removed = self.store.prune_terminal_before(cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, retention_days, "Pruned old notifications");
        }
        Ok(removed)
    }

    /// Current status for the operational surface.
    pub async fn status(&self) -> Result<SchedulerStatus, StoreError> {
        Ok(SchedulerStatus {
            is_running: self.running.load(Ordering::SeqCst),
            pending_count: self.store.pending_count().await?,
        })
    }

    // ------------------------------------------------------------------
    // Tick bodies
    // ------------------------------------------------------------------

    /// One dispatch tick: deliver every due job, recording the outcome per
    /// job. One job's failure never aborts the batch.
    pub async fn dispatch_due(&self) {
        if self.dispatch_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("Previous dispatch tick still in flight; skipping");
            return;
        }
        self.run_dispatch().await;
        self.dispatch_in_flight.store(false, Ordering::SeqCst);
    }

    async fn run_dispatch(&self) {
        let now = Utc::now();
        let due = match self.store.due_jobs(now).await {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load due jobs");
                return;
            }
        };

        if due.is_empty() {
            tracing::debug!("No due notifications this tick");
            return;
        }

        let attempted = due.len();
        let mut delivered = 0usize;

        for job in &due {
            match self.deliver_one(job).await {
                Ok(()) => {
                    if let Err(e) = self.store.mark_delivered(job.id, Utc::now()).await {
                        tracing::error!(job_id = %job.id, error = %e, "Failed to record delivery");
                    }
                    delivered += 1;
                }
                Err(reason) => {
                    tracing::warn!(
                        job_id = %job.id,
                        user_id = %job.user_id,
                        error = %reason,
                        "Notification delivery failed"
                    );
                    if let Err(e) = self.store.mark_failed(job.id, &reason).await {
                        tracing::error!(job_id = %job.id, error = %e, "Failed to record failure");
                    }
                }
            }
        }

        tracing::info!(attempted, delivered, "Dispatch tick complete");
    }

    /// Deliver a single job through the adapter, bounded by the configured
    /// timeout. A timeout is indistinguishable from a failed delivery.
    async fn deliver_one(&self, job: &NotificationJob) -> Result<(), String> {
        match tokio::time::timeout(
            self.config.delivery_timeout,
            self.delivery.deliver(&job.user_id, &job.payload),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "delivery timed out after {}s",
                self.config.delivery_timeout.as_secs()
            )),
        }
    }

    /// Enqueue tomorrow-or-today's 07:00-local digest for every opted-in
    /// user. Re-running in the same day is a no-op per user: the target
    /// instant is identical, so the pending-duplicate check absorbs it.
    pub async fn generate_daily_digests(&self) {
        let subscribers = match self.directory.digest_subscribers().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                tracing::error!(error = %e, "Failed to enumerate digest subscribers");
                return;
            }
        };

        let now = Utc::now();
        let mut created = 0usize;

        for subscriber in &subscribers {
            let tz: Tz = match subscriber.timezone.parse() {
                Ok(tz) => tz,
                Err(_) => {
                    tracing::warn!(
                        user_id = %subscriber.user_id,
                        timezone = %subscriber.timezone,
                        "Unknown timezone; skipping digest"
                    );
                    continue;
                }
            };

            let Some(scheduled_for) =
                timing::next_local_occurrence(now, tz, DIGEST_LOCAL_HOUR, DIGEST_LOCAL_MINUTE)
            else {
                tracing::warn!(
                    user_id = %subscriber.user_id,
                    timezone = %subscriber.timezone,
                    "Could not resolve digest time; skipping"
                );
                continue;
            };

            match self
                .store
                .has_pending_duplicate(
                    &subscriber.user_id,
                    NotificationType::DailyDigest,
                    scheduled_for,
                )
                .await
            {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(user_id = %subscriber.user_id, error = %e, "Duplicate check failed");
                    continue;
                }
            }

            let payload = NotificationPayload {
                title: "Your daily predictions are ready".to_string(),
                body: "Today's match predictions and value picks are in. Open the app for the full digest.".to_string(),
                data: serde_json::json!({ "kind": "daily_digest" }),
            };
            let job = NotificationJob::new(
                &subscriber.user_id,
                NotificationType::DailyDigest,
                scheduled_for,
                &subscriber.timezone,
                payload.into_value(),
            );

            if let Err(e) = self.store.insert(job).await {
                tracing::error!(user_id = %subscriber.user_id, error = %e, "Failed to enqueue digest");
                continue;
            }
            created += 1;
        }

        tracing::info!(
            subscribers = subscribers.len(),
            created,
            "Daily digest generation complete"
        );
    }

    /// Enqueue pre-kickoff alerts for fixtures inside the lookahead window.
    /// An alert whose fire time is already in the past is skipped: there is
    /// no backfill for imminent kickoffs.
    pub async fn generate_match_alerts(&self) {
        let matches = match self.directory.upcoming_matches(self.config.match_lookahead).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!(error = %e, "Failed to enumerate upcoming fixtures");
                return;
            }
        };
        if matches.is_empty() {
            tracing::debug!("No upcoming fixtures in lookahead window");
            return;
        }

        let subscribers = match self.directory.alert_subscribers().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                tracing::error!(error = %e, "Failed to enumerate alert subscribers");
                return;
            }
        };

        let now = Utc::now();
        let mut created = 0usize;

        for m in &matches {
            let alert_time = m.starts_at - self.config.match_alert_offset;
            if alert_time <= now {
                continue;
            }

            for subscriber in &subscribers {
                match self
                    .store
                    .has_pending_duplicate(
                        &subscriber.user_id,
                        NotificationType::MatchAlert,
                        alert_time,
                    )
                    .await
                {
                    Ok(true) => continue,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(user_id = %subscriber.user_id, error = %e, "Duplicate check failed");
                        continue;
                    }
                }

                let payload = NotificationPayload {
                    title: format!("{} vs {} kicks off soon", m.home_team, m.away_team),
                    body: format!(
                        "{} vs {} starts in {} minutes. Check the predictions before kickoff.",
                        m.home_team,
                        m.away_team,
                        self.config.match_alert_offset.num_minutes()
                    ),
                    data: serde_json::json!({
                        "kind": "match_alert",
                        "match_id": m.id,
                        "league": m.league,
                        "starts_at": m.starts_at,
                    }),
                };
                let job = NotificationJob::new(
                    &subscriber.user_id,
                    NotificationType::MatchAlert,
                    alert_time,
                    &subscriber.timezone,
                    payload.into_value(),
                );

                if let Err(e) = self.store.insert(job).await {
                    tracing::error!(user_id = %subscriber.user_id, error = %e, "Failed to enqueue match alert");
                    continue;
                }
                created += 1;
            }
        }

        tracing::info!(
            matches = matches.len(),
            subscribers = subscribers.len(),
            created,
            "Match alert generation complete"
        );
    }

    // ------------------------------------------------------------------
    // Loops
    // ------------------------------------------------------------------

    async fn dispatch_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();
        let start = tokio::time::Instant::now() + self.config.dispatch_interval;
        let mut interval = tokio::time::interval_at(start, self.config.dispatch_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    self.dispatch_due().await;
                }
                _ = shutdown.changed() => break,
            }
        }
    }

    async fn digest_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            let wait = timing::until_next_utc_hour(Utc::now(), self.config.digest_generation_hour_utc);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if *shutdown.borrow() {
                        break;
                    }
                    self.generate_daily_digests().await;
                    if let Err(e) = self.clear_old_notifications(self.config.retention_days).await {
                        tracing::error!(error = %e, "Retention pruning failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }

    async fn match_alert_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();
        let start = tokio::time::Instant::now() + self.config.match_alert_interval;
        let mut interval = tokio::time::interval_at(start, self.config.match_alert_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    self.generate_match_alerts().await;
                }
                _ = shutdown.changed() => break,
            }
        }
    }
}
