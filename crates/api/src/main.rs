//! Matchday background core binary: boots the notification scheduler, the
//! prediction-service watchdog and the operational status API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use matchday_common::config::AppConfig;
use matchday_common::db::create_pool;

use matchday_scheduler::delivery::WebhookDelivery;
use matchday_scheduler::directory::PgDirectory;
use matchday_scheduler::pg_store::PgJobStore;
use matchday_scheduler::scheduler::{NotificationScheduler, SchedulerConfig};

use matchday_watchdog::launcher::CommandLauncher;
use matchday_watchdog::probe::HttpProbe;
use matchday_watchdog::supervisor::{ServiceSupervisor, WatchdogConfig};

use matchday_api::routes::create_router;
use matchday_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "matchday_api=debug,matchday_scheduler=debug,matchday_watchdog=debug,tower_http=debug",
            )
        }))
        .init();

    tracing::info!("Starting Matchday background core...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool and apply migrations
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    // Notification scheduler
    let scheduler_config = SchedulerConfig {
        dispatch_interval: Duration::from_secs(config.dispatch_interval_secs),
        delivery_timeout: Duration::from_secs(config.delivery_timeout_secs),
        digest_generation_hour_utc: config.digest_generation_hour_utc,
        match_alert_interval: Duration::from_secs(config.match_alert_interval_secs),
        match_alert_offset: chrono::Duration::minutes(config.match_alert_offset_minutes),
        match_lookahead: chrono::Duration::hours(config.match_lookahead_hours),
        retention_days: config.retention_days,
    };
    let scheduler = Arc::new(NotificationScheduler::new(
        Arc::new(PgJobStore::new(pool.clone())),
        Arc::new(WebhookDelivery::new(config.push_gateway_url.clone())),
        Arc::new(PgDirectory::new(pool.clone())),
        scheduler_config,
    ));
    scheduler.start();

    // Prediction service watchdog
    let watchdog_config = WatchdogConfig {
        probe_interval: Duration::from_secs(config.probe_interval_secs),
        probe_timeout: Duration::from_secs(config.probe_timeout_secs),
        failure_threshold: config.failure_threshold,
        max_restart_attempts: config.max_restart_attempts,
        restart_cooldown: Duration::from_secs(config.restart_cooldown_secs),
        restart_grace: Duration::from_secs(config.restart_grace_secs),
        ..WatchdogConfig::default()
    };
    let supervisor = Arc::new(ServiceSupervisor::new(
        Arc::new(HttpProbe::new(config.prediction_service_health_url.clone())),
        Arc::new(CommandLauncher::from_command_line(
            &config.prediction_service_command,
        )?),
        watchdog_config,
    ));
    supervisor.start();

    // Build router
    let state = AppState::new(scheduler.clone(), supervisor.clone());
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("Status API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop();
    supervisor.stop();
    tracing::info!("Matchday background core stopped.");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Received shutdown signal, stopping gracefully...");
}
