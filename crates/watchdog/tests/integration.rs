//! Scenario tests for the process watchdog.
//!
//! The probe and launcher are test doubles; grace and cooldown windows are
//! shrunk to zero where a scenario needs repeated attempts in one test run.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use matchday_watchdog::launcher::ProcessLauncher;
use matchday_watchdog::probe::LivenessProbe;
use matchday_watchdog::supervisor::{ServiceSupervisor, WatchdogConfig};

// ============================================================
// Test doubles
// ============================================================

#[derive(Clone, Copy)]
enum ProbeStep {
    Alive,
    Dead,
    Error,
}

/// Replays a scripted sequence of probe outcomes, then a default.
struct ScriptedProbe {
    script: Mutex<VecDeque<ProbeStep>>,
    default: ProbeStep,
    calls: AtomicU32,
    delay: Option<Duration>,
}

impl ScriptedProbe {
    fn new(steps: &[ProbeStep], default: ProbeStep) -> Self {
        Self {
            script: Mutex::new(steps.iter().copied().collect()),
            default,
            calls: AtomicU32::new(0),
            delay: None,
        }
    }

    fn always_dead() -> Self {
        Self::new(&[], ProbeStep::Dead)
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LivenessProbe for ScriptedProbe {
    async fn is_alive(&self) -> anyhow::Result<bool> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default);
        match step {
            ProbeStep::Alive => Ok(true),
            ProbeStep::Dead => Ok(false),
            ProbeStep::Error => anyhow::bail!("connection refused"),
        }
    }
}

/// Counts launches; optionally fails them.
#[derive(Default)]
struct CountingLauncher {
    launches: AtomicU32,
    fail: bool,
}

impl CountingLauncher {
    fn failing() -> Self {
        Self {
            launches: AtomicU32::new(0),
            fail: true,
        }
    }

    fn count(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessLauncher for CountingLauncher {
    async fn launch(&self) -> anyhow::Result<()> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("executable not found");
        }
        Ok(())
    }
}

// ============================================================
// Helpers
// ============================================================

/// Config with instant grace so restart confirmation does not slow tests.
fn fast_config() -> WatchdogConfig {
    WatchdogConfig {
        restart_grace: Duration::ZERO,
        ..WatchdogConfig::default()
    }
}

fn build(
    probe: Arc<ScriptedProbe>,
    launcher: Arc<CountingLauncher>,
    config: WatchdogConfig,
) -> Arc<ServiceSupervisor> {
    Arc::new(ServiceSupervisor::new(probe, launcher, config))
}

// ============================================================
// Restart policy
// ============================================================

#[tokio::test]
async fn test_threshold_crossing_triggers_exactly_one_restart() {
    let probe = Arc::new(ScriptedProbe::always_dead());
    let launcher = Arc::new(CountingLauncher::default());
    let supervisor = build(probe.clone(), launcher.clone(), fast_config());

    supervisor.probe_once().await; // 1 failure
    supervisor.probe_once().await; // 2 failures
    assert_eq!(launcher.count(), 0);

    supervisor.probe_once().await; // 3 failures → restart
    assert_eq!(launcher.count(), 1);

    // 4th failure lands inside the 60s cooldown → no additional launch
    supervisor.probe_once().await;
    assert_eq!(launcher.count(), 1);
}

#[tokio::test]
async fn test_restart_budget_is_exhausted_after_max_attempts() {
    let probe = Arc::new(ScriptedProbe::always_dead());
    let launcher = Arc::new(CountingLauncher::default());
    let config = WatchdogConfig {
        restart_cooldown: Duration::ZERO,
        restart_grace: Duration::ZERO,
        ..WatchdogConfig::default()
    };
    let supervisor = build(probe.clone(), launcher.clone(), config);

    // Keep failing; with a zero cooldown every threshold crossing may retry
    for _ in 0..6 {
        supervisor.probe_once().await;
    }

    // Capped at the lifetime budget of 2
    assert_eq!(launcher.count(), 2);

    let health = supervisor.health();
    assert!(health.restarts_exhausted);
    assert_eq!(health.restart_attempts, 2);
    assert!(!health.healthy);

    // Further threshold crossings launch nothing
    supervisor.probe_once().await;
    assert_eq!(launcher.count(), 2);
}

#[tokio::test]
async fn test_successful_probe_resets_failures_but_not_attempts() {
    let probe = Arc::new(ScriptedProbe::new(
        &[
            ProbeStep::Dead,
            ProbeStep::Dead,
            ProbeStep::Dead, // threshold → restart
            ProbeStep::Dead, // first grace confirmation
            ProbeStep::Dead, // extended grace confirmation
            ProbeStep::Alive, // next scheduled probe succeeds
        ],
        ProbeStep::Dead,
    ));
    let launcher = Arc::new(CountingLauncher::default());
    let supervisor = build(probe.clone(), launcher.clone(), fast_config());

    for _ in 0..3 {
        supervisor.probe_once().await;
    }
    assert_eq!(launcher.count(), 1);
    assert_eq!(supervisor.health().restart_attempts, 1);

    supervisor.probe_once().await; // the Alive step

    let health = supervisor.health();
    assert!(health.healthy);
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(health.restart_attempts, 1, "attempts are never reset");
}

#[tokio::test]
async fn test_grace_probe_confirms_recovery() {
    // Service comes back inside the first grace window after relaunch
    let probe = Arc::new(ScriptedProbe::new(
        &[
            ProbeStep::Dead,
            ProbeStep::Dead,
            ProbeStep::Dead, // threshold → restart
            ProbeStep::Alive, // grace confirmation
        ],
        ProbeStep::Alive,
    ));
    let launcher = Arc::new(CountingLauncher::default());
    let supervisor = build(probe.clone(), launcher.clone(), fast_config());

    for _ in 0..3 {
        supervisor.probe_once().await;
    }

    assert_eq!(launcher.count(), 1);
    let health = supervisor.health();
    assert!(health.healthy, "recovery confirmed in grace window");
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(health.restart_attempts, 1);
}

#[tokio::test]
async fn test_failed_grace_probes_extend_once_then_give_up() {
    let probe = Arc::new(ScriptedProbe::always_dead());
    let launcher = Arc::new(CountingLauncher::default());
    let supervisor = build(probe.clone(), launcher.clone(), fast_config());

    for _ in 0..3 {
        supervisor.probe_once().await;
    }

    // 3 scheduled probes + 2 grace confirmations (one extension)
    assert_eq!(probe.call_count(), 5);
    assert_eq!(launcher.count(), 1);
    // Failure count survives the failed restart and keeps accumulating
    assert!(supervisor.health().consecutive_failures >= 3);
}

#[tokio::test]
async fn test_probe_error_counts_as_failure() {
    let probe = Arc::new(ScriptedProbe::new(&[], ProbeStep::Error));
    let launcher = Arc::new(CountingLauncher::default());
    let config = WatchdogConfig {
        failure_threshold: 1,
        restart_grace: Duration::ZERO,
        ..WatchdogConfig::default()
    };
    let supervisor = build(probe.clone(), launcher.clone(), config);

    supervisor.probe_once().await;

    // One errored probe crossed the threshold of 1 → restart attempted
    assert_eq!(launcher.count(), 1);
    assert!(!supervisor.health().healthy);
}

#[tokio::test]
async fn test_launcher_failure_still_consumes_an_attempt() {
    let probe = Arc::new(ScriptedProbe::always_dead());
    let launcher = Arc::new(CountingLauncher::failing());
    let supervisor = build(probe.clone(), launcher.clone(), fast_config());

    for _ in 0..3 {
        supervisor.probe_once().await;
    }

    assert_eq!(launcher.count(), 1);
    let health = supervisor.health();
    assert_eq!(health.restart_attempts, 1);
    assert!(!health.healthy);
}

// ============================================================
// Probe guard + lifecycle
// ============================================================

#[tokio::test]
async fn test_overlapping_probes_are_impossible() {
    let probe = Arc::new(ScriptedProbe {
        delay: Some(Duration::from_millis(100)),
        ..ScriptedProbe::new(&[], ProbeStep::Alive)
    });
    let launcher = Arc::new(CountingLauncher::default());
    let supervisor = build(probe.clone(), launcher, fast_config());

    // Second call hits the in-flight guard and returns without probing
    tokio::join!(supervisor.probe_once(), supervisor.probe_once());

    assert_eq!(probe.call_count(), 1);
}

#[tokio::test]
async fn test_start_probes_immediately_and_stop_halts() {
    let probe = Arc::new(ScriptedProbe::new(&[], ProbeStep::Alive));
    let launcher = Arc::new(CountingLauncher::default());
    let config = WatchdogConfig {
        probe_interval: Duration::from_secs(3600),
        ..fast_config()
    };
    let supervisor = build(probe.clone(), launcher, config);

    supervisor.start();
    supervisor.start(); // logged warning, no second loop

    // The startup probe fires without waiting out the interval
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(probe.call_count(), 1);
    assert!(supervisor.health().healthy);

    supervisor.stop();
    supervisor.stop(); // no-op

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(probe.call_count(), 1, "no probes after stop");
}
