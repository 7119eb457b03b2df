//! SQLite persistence layer
//!
//! Three relations: `rounds` (observed draws, first write wins),
//! `forecasts` (one per predicted issue, result settled at most once) and
//! `chats` (broadcast destinations). Both bounded stores are pruned inside
//! the same transaction as the write that grew them, so a crash between
//! steps never leaves an oversized or half-committed store.

use crate::error::{BotError, Result};
use crate::types::{Forecast, ForecastResult, ForecastStats, Label, Round};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `path` and initialize the
    /// schema.
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory database for tests. A single connection keeps every
    /// statement on the same database instance.
    #[cfg(test)]
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS rounds (
                issue TEXT PRIMARY KEY,
                number INTEGER NOT NULL,
                color TEXT NOT NULL,
                observed_at TEXT NOT NULL
            )
            ",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS forecasts (
                issue TEXT PRIMARY KEY,
                predicted TEXT NOT NULL,
                confidence REAL NOT NULL,
                multiplier INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                result TEXT
            )
            ",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS chats (
                chat_id TEXT PRIMARY KEY
            )
            ",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // ----- rounds -----

    /// Insert a batch of rounds, ignoring issues already present (first
    /// write wins), then prune to the `keep` most recent by issue. One
    /// transaction.
    pub async fn insert_rounds(&self, rounds: &[Round], keep: i64) -> Result<u64> {
        if rounds.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for round in rounds {
            let done = sqlx::query(
                "INSERT OR IGNORE INTO rounds (issue, number, color, observed_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&round.issue)
            .bind(round.number)
            .bind(&round.color)
            .bind(round.observed_at)
            .execute(&mut *tx)
            .await?;
            inserted += done.rows_affected();
        }

        sqlx::query(
            "DELETE FROM rounds WHERE issue NOT IN (SELECT issue FROM rounds ORDER BY issue DESC LIMIT ?1)",
        )
        .bind(keep)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(batch = rounds.len(), inserted, "rounds stored");
        Ok(inserted)
    }

    /// The `limit` most recent rounds, ordered oldest first.
    pub async fn list_recent_rounds(&self, limit: i64) -> Result<Vec<Round>> {
        let rows = sqlx::query_as::<_, (String, i64, String, DateTime<Utc>)>(
            r"
            SELECT issue, number, color, observed_at FROM
                (SELECT issue, number, color, observed_at FROM rounds ORDER BY issue DESC LIMIT ?1)
            ORDER BY issue ASC
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(issue, number, color, observed_at)| Round {
                issue,
                number,
                color,
                observed_at,
            })
            .collect())
    }

    // ----- forecasts -----

    /// Store a forecast keyed by the issue it predicts, then prune to the
    /// `keep` most recent by creation time. The caller guards idempotency
    /// by checking `get_forecast` first; a replace here only happens if the
    /// same issue is forecast twice before resolution.
    pub async fn issue_forecast(&self, forecast: &Forecast, keep: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT OR REPLACE INTO forecasts (issue, predicted, confidence, multiplier, created_at, result)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(&forecast.issue)
        .bind(forecast.predicted.as_str())
        .bind(forecast.confidence)
        .bind(forecast.multiplier)
        .bind(forecast.created_at)
        .bind(forecast.result.map(|r| r.as_str()))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            DELETE FROM forecasts WHERE issue NOT IN
                (SELECT issue FROM forecasts ORDER BY created_at DESC, rowid DESC LIMIT ?1)
            ",
        )
        .bind(keep)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_forecast(&self, issue: &str) -> Result<Option<Forecast>> {
        let row = sqlx::query_as::<_, ForecastRow>(
            "SELECT issue, predicted, confidence, multiplier, created_at, result FROM forecasts WHERE issue = ?1",
        )
        .bind(issue)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Forecast::try_from).transpose()
    }

    /// Most recently created forecast, pending or settled.
    pub async fn latest_forecast(&self) -> Result<Option<Forecast>> {
        let row = sqlx::query_as::<_, ForecastRow>(
            r"
            SELECT issue, predicted, confidence, multiplier, created_at, result
            FROM forecasts ORDER BY created_at DESC, rowid DESC LIMIT 1
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(Forecast::try_from).transpose()
    }

    /// Settle a pending forecast. No-op when the forecast is absent or
    /// already settled; returns whether a row changed.
    pub async fn resolve_forecast(&self, issue: &str, result: ForecastResult) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE forecasts SET result = ?1 WHERE issue = ?2 AND result IS NULL",
        )
        .bind(result.as_str())
        .bind(issue)
        .execute(&self.pool)
        .await?;

        Ok(done.rows_affected() > 0)
    }

    pub async fn forecast_stats(&self) -> Result<ForecastStats> {
        let (total, wins, losses, pending) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN result = 'WIN' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN result = 'LOSS' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN result IS NULL THEN 1 ELSE 0 END), 0)
            FROM forecasts
            ",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ForecastStats::new(total, wins, losses, pending))
    }

    // ----- destinations -----

    /// Register a broadcast chat. Returns false when it was already
    /// registered.
    pub async fn add_destination(&self, chat_id: &str) -> Result<bool> {
        let done = sqlx::query("INSERT OR IGNORE INTO chats (chat_id) VALUES (?1)")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn remove_destination(&self, chat_id: &str) -> Result<bool> {
        let done = sqlx::query("DELETE FROM chats WHERE chat_id = ?1")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn clear_destinations(&self) -> Result<u64> {
        let done = sqlx::query("DELETE FROM chats").execute(&self.pool).await?;
        Ok(done.rows_affected())
    }

    pub async fn list_destinations(&self) -> Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>("SELECT chat_id FROM chats ORDER BY chat_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(chat_id,)| chat_id).collect())
    }
}

type ForecastRow = (String, String, f64, i64, DateTime<Utc>, Option<String>);

impl TryFrom<ForecastRow> for Forecast {
    type Error = BotError;

    fn try_from(row: ForecastRow) -> Result<Self> {
        let (issue, predicted, confidence, multiplier, created_at, result) = row;
        let predicted = Label::parse(&predicted)
            .ok_or_else(|| BotError::Malformed(format!("label {predicted:?}")))?;
        let result = match result {
            Some(text) => Some(
                ForecastResult::parse(&text)
                    .ok_or_else(|| BotError::Malformed(format!("result {text:?}")))?,
            ),
            None => None,
        };
        Ok(Forecast {
            issue,
            predicted,
            confidence,
            multiplier,
            created_at,
            result,
        })
    }
}
