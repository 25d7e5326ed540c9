//! User/preference source: enumerates who gets which notifications.
//!
//! The generators only need opted-in users (with their timezone) and the
//! upcoming fixtures inside a lookahead window; account management and
//! fixture ingestion belong to other parts of the platform.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;

use matchday_common::types::{AlertSubscriber, DigestSubscriber, UpcomingMatch};

/// Read-only view of notification preferences and upcoming fixtures.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Users opted into the daily digest.
    async fn digest_subscribers(&self) -> anyhow::Result<Vec<DigestSubscriber>>;

    /// Users opted into pre-kickoff match alerts.
    async fn alert_subscribers(&self) -> anyhow::Result<Vec<AlertSubscriber>>;

    /// Fixtures starting after now and within the given window.
    async fn upcoming_matches(&self, within: Duration) -> anyhow::Result<Vec<UpcomingMatch>>;
}

/// Postgres-backed directory over the preference and fixture tables.
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn digest_subscribers(&self) -> anyhow::Result<Vec<DigestSubscriber>> {
        let subscribers: Vec<DigestSubscriber> = sqlx::query_as(
            "SELECT user_id, timezone FROM notification_preferences WHERE daily_digest = true",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(subscribers)
    }

    async fn alert_subscribers(&self) -> anyhow::Result<Vec<AlertSubscriber>> {
        let subscribers: Vec<AlertSubscriber> = sqlx::query_as(
            "SELECT user_id, timezone FROM notification_preferences WHERE match_alerts = true",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(subscribers)
    }

    async fn upcoming_matches(&self, within: Duration) -> anyhow::Result<Vec<UpcomingMatch>> {
        let now = Utc::now();
        let horizon = now + within;

        let matches: Vec<UpcomingMatch> = sqlx::query_as(
            r#"
            SELECT id, home_team, away_team, league, starts_at
            FROM fixtures
            WHERE starts_at > $1 AND starts_at <= $2
            ORDER BY starts_at
            "#,
        )
        .bind(now)
        .bind(horizon)
        .fetch_all(&self.pool)
        .await?;

        Ok(matches)
    }
}
