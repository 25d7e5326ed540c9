use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// URL the delivery adapter hands finished notifications to
    pub push_gateway_url: String,

    /// Dispatch tick interval in seconds (default: 60)
    pub dispatch_interval_secs: u64,

    /// Per-delivery timeout in seconds (default: 30)
    pub delivery_timeout_secs: u64,

    /// UTC hour at which daily digest generation runs (default: 6)
    pub digest_generation_hour_utc: u32,

    /// Match-alert generation tick interval in seconds (default: 600)
    pub match_alert_interval_secs: u64,

    /// Minutes before kickoff that a match alert fires (default: 30)
    pub match_alert_offset_minutes: i64,

    /// How far ahead the match-alert generator scans, in hours (default: 24)
    pub match_lookahead_hours: i64,

    /// Days a delivered/failed job is retained before pruning (default: 7)
    pub retention_days: i64,

    /// Health-check URL of the prediction service
    pub prediction_service_health_url: String,

    /// Command used to relaunch the prediction service
    pub prediction_service_command: String,

    /// Liveness probe interval in seconds (default: 30)
    pub probe_interval_secs: u64,

    /// Per-probe timeout in seconds (default: 10)
    pub probe_timeout_secs: u64,

    /// Consecutive probe failures before a restart is attempted (default: 3)
    pub failure_threshold: u32,

    /// Maximum restart attempts per process lifetime (default: 2)
    pub max_restart_attempts: u32,

    /// Minimum seconds between restart attempts (default: 60)
    pub restart_cooldown_secs: u64,

    /// Seconds to wait after a relaunch before re-probing (default: 10)
    pub restart_grace_secs: u64,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            push_gateway_url: std::env::var("PUSH_GATEWAY_URL")
                .map_err(|_| anyhow::anyhow!("PUSH_GATEWAY_URL environment variable is required"))?,
            dispatch_interval_secs: parse_var("DISPATCH_INTERVAL_SECS", "60")?,
            delivery_timeout_secs: parse_var("DELIVERY_TIMEOUT_SECS", "30")?,
            digest_generation_hour_utc: parse_var("DIGEST_GENERATION_HOUR_UTC", "6")?,
            match_alert_interval_secs: parse_var("MATCH_ALERT_INTERVAL_SECS", "600")?,
            match_alert_offset_minutes: parse_var("MATCH_ALERT_OFFSET_MINUTES", "30")?,
            match_lookahead_hours: parse_var("MATCH_LOOKAHEAD_HOURS", "24")?,
            retention_days: parse_var("RETENTION_DAYS", "7")?,
            prediction_service_health_url: std::env::var("PREDICTION_SERVICE_HEALTH_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5001/health".to_string()),
            prediction_service_command: std::env::var("PREDICTION_SERVICE_COMMAND")
                .unwrap_or_else(|_| "python3 prediction_service/start_api_service.py".to_string()),
            probe_interval_secs: parse_var("PROBE_INTERVAL_SECS", "30")?,
            probe_timeout_secs: parse_var("PROBE_TIMEOUT_SECS", "10")?,
            failure_threshold: parse_var("FAILURE_THRESHOLD", "3")?,
            max_restart_attempts: parse_var("MAX_RESTART_ATTEMPTS", "2")?,
            restart_cooldown_secs: parse_var("RESTART_COOLDOWN_SECS", "60")?,
            restart_grace_secs: parse_var("RESTART_GRACE_SECS", "10")?,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "20")?,
        })
    }
}

/// Read an env var with a default, parsed into the target type.
fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> anyhow::Result<T> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a valid {}", name, std::any::type_name::<T>()))
}
