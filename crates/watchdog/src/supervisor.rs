//! Process watchdog: probes the prediction service and restarts it under a
//! bounded-attempt, cooldown-gated policy.
//!
//! Failure counting is consecutive: any successful probe resets the streak.
//! Restart attempts are bounded for the whole process lifetime, not per
//! incident: once the budget is spent, only external intervention brings
//! the service back, and the watchdog just keeps logging.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use matchday_common::types::SupervisorHealth;

use crate::launcher::ProcessLauncher;
use crate::probe::LivenessProbe;

/// Tunable knobs for the watchdog.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// How often the liveness probe runs.
    pub probe_interval: Duration,
    /// Per-probe timeout; a timeout counts as a failed probe.
    pub probe_timeout: Duration,
    /// Consecutive failures required before a restart is attempted.
    pub failure_threshold: u32,
    /// Restart attempts allowed per process lifetime.
    pub max_restart_attempts: u32,
    /// Minimum spacing between restart attempts.
    pub restart_cooldown: Duration,
    /// Wait after a launch before re-probing; extended once if the first
    /// grace window does not confirm recovery.
    pub restart_grace: Duration,
    /// Timeout on the launch call itself.
    pub launch_timeout: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
            failure_threshold: 3,
            max_restart_attempts: 2,
            restart_cooldown: Duration::from_secs(60),
            restart_grace: Duration::from_secs(10),
            launch_timeout: Duration::from_secs(60),
        }
    }
}

/// Supervises the prediction service process.
pub struct ServiceSupervisor {
    probe: Arc<dyn LivenessProbe>,
    launcher: Arc<dyn ProcessLauncher>,
    config: WatchdogConfig,
    running: AtomicBool,
    probe_in_flight: AtomicBool,
    consecutive_failures: AtomicU32,
    restart_attempts: AtomicU32,
    /// Monotonic instant for cooldown math, wall clock for the health surface.
    last_restart_at: Mutex<Option<(Instant, DateTime<Utc>)>>,
    shutdown: watch::Sender<bool>,
}

impl ServiceSupervisor {
    pub fn new(
        probe: Arc<dyn LivenessProbe>,
        launcher: Arc<dyn ProcessLauncher>,
        config: WatchdogConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            probe,
            launcher,
            config,
            running: AtomicBool::new(false),
            probe_in_flight: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
            restart_attempts: AtomicU32::new(0),
            last_restart_at: Mutex::new(None),
            shutdown,
        }
    }

    /// Start the probe loop. The first probe runs immediately rather than
    /// waiting out the first interval. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Watchdog already running; start ignored");
            return;
        }
        self.shutdown.send_replace(false);

        let supervisor = self.clone();
        tokio::spawn(async move { supervisor.probe_loop().await });

        tracing::info!(
            probe_interval_secs = self.config.probe_interval.as_secs(),
            failure_threshold = self.config.failure_threshold,
            max_restart_attempts = self.config.max_restart_attempts,
            "Watchdog started"
        );
    }

    /// Stop the probe loop. Idempotent; an in-flight probe cycle completes.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            tracing::debug!("Watchdog not running; stop ignored");
            return;
        }
        self.shutdown.send_replace(true);
        tracing::info!("Watchdog stopped");
    }

    /// Health snapshot for the operational surface.
    pub fn health(&self) -> SupervisorHealth {
        let failures = self.consecutive_failures.load(Ordering::SeqCst);
        let attempts = self.restart_attempts.load(Ordering::SeqCst);
        let last_restart_at = self
            .last_restart_at
            .lock()
            .expect("watchdog mutex poisoned")
            .map(|(_, at)| at);

        SupervisorHealth {
            healthy: failures == 0,
            consecutive_failures: failures,
            restart_attempts: attempts,
            restarts_exhausted: attempts >= self.config.max_restart_attempts,
            last_restart_at,
        }
    }

    /// One probe cycle. Guarded so overlapping probes are impossible.
    pub async fn probe_once(&self) {
        if self.probe_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("Previous probe still in flight; skipping");
            return;
        }
        self.run_probe().await;
        self.probe_in_flight.store(false, Ordering::SeqCst);
    }

    async fn run_probe(&self) {
        if self.check_alive().await {
            let prior = self.consecutive_failures.swap(0, Ordering::SeqCst);
            if prior > 0 {
                tracing::info!(prior_failures = prior, "Prediction service recovered");
            }
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::warn!(
            consecutive_failures = failures,
            threshold = self.config.failure_threshold,
            "Prediction service probe failed"
        );

        if failures >= self.config.failure_threshold {
            self.attempt_restart().await;
        }
    }

    /// Attempt a supervised restart, subject to the attempt cap and the
    /// cooldown window.
    pub async fn attempt_restart(&self) {
        let attempts = self.restart_attempts.load(Ordering::SeqCst);
        if attempts >= self.config.max_restart_attempts {
            tracing::error!(
                attempts,
                max_attempts = self.config.max_restart_attempts,
                "Restart attempts exhausted; manual intervention required"
            );
            return;
        }

        if let Some((instant, _)) = *self
            .last_restart_at
            .lock()
            .expect("watchdog mutex poisoned")
        {
            let since_last = instant.elapsed();
            if since_last < self.config.restart_cooldown {
                tracing::debug!(
                    since_last_secs = since_last.as_secs(),
                    cooldown_secs = self.config.restart_cooldown.as_secs(),
                    "Within restart cooldown; skipping this cycle"
                );
                return;
            }
        }

        let attempt = self.restart_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        *self
            .last_restart_at
            .lock()
            .expect("watchdog mutex poisoned") = Some((Instant::now(), Utc::now()));

        tracing::warn!(
            attempt,
            max_attempts = self.config.max_restart_attempts,
            "Restarting prediction service"
        );

        match tokio::time::timeout(self.config.launch_timeout, self.launcher.launch()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to launch prediction service");
                return;
            }
            Err(_) => {
                tracing::error!(
                    timeout_secs = self.config.launch_timeout.as_secs(),
                    "Prediction service launch timed out"
                );
                return;
            }
        }

        // Grace wait and confirmation probe, with a single extension.
        for extension in 0..2u8 {
            tokio::time::sleep(self.config.restart_grace).await;
            if self.check_alive().await {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                tracing::info!(attempt, "Prediction service restarted and responding");
                return;
            }
            if extension == 0 {
                tracing::debug!("Grace probe failed; extending grace period once");
            }
        }

        // Failure count is not reset: the next probe cycles keep accumulating
        // toward another attempt, if any remain.
        tracing::error!(attempt, "Prediction service still unresponsive after restart");
    }

    /// Probe with timeout; an error or timeout is a dead answer.
    async fn check_alive(&self) -> bool {
        match tokio::time::timeout(self.config.probe_timeout, self.probe.is_alive()).await {
            Ok(Ok(alive)) => alive,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Liveness probe errored");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.probe_timeout.as_secs(),
                    "Liveness probe timed out"
                );
                false
            }
        }
    }

    async fn probe_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();
        // The first tick completes immediately: that is the startup probe.
        let mut interval = tokio::time::interval(self.config.probe_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    self.probe_once().await;
                }
                _ = shutdown.changed() => break,
            }
        }
    }
}
