//! SQLite persistence for the last snapshot and alert history.

use crate::formatter::describe_alert;
use rate_monitor_core::{AlertSet, Snapshot};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Filesystem path of a `sqlite:` URL, if it points at a file.
fn file_path(database_url: &str) -> Option<&Path> {
    if is_memory_url(database_url) {
        return None;
    }
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        None
    } else {
        Some(Path::new(path))
    }
}

/// Database connection for snapshot state and alert history.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to SQLite database at the given URL, creating it if needed.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        if let Some(parent) = file_path(database_url).and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        // Every in-memory connection is its own database
        let max_connections = if is_memory_url(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshot_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                payload TEXT NOT NULL,
                saved_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alert_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                chain TEXT NOT NULL,
                symbol TEXT NOT NULL,
                detail TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_alert_history_created
            ON alert_history(created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load the last saved snapshot.
    ///
    /// Returns an empty snapshot when nothing was saved yet or the stored
    /// payload cannot be decoded; both read as a first run.
    pub async fn load_snapshot(&self) -> Result<Snapshot, DbError> {
        let payload = sqlx::query_scalar::<_, String>("SELECT payload FROM snapshot_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        let Some(payload) = payload else {
            debug!("No saved snapshot");
            return Ok(Snapshot::default());
        };

        match serde_json::from_str::<Snapshot>(&payload) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!("Saved snapshot is unreadable, starting fresh: {}", e);
                Ok(Snapshot::default())
            }
        }
    }

    /// Replace the saved snapshot.
    pub async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), DbError> {
        let payload = serde_json::to_string(snapshot)?;
        sqlx::query(
            r#"
            INSERT INTO snapshot_state (id, payload) VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET payload = excluded.payload, saved_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record every alert of a comparison in history. Returns rows written.
    pub async fn record_alerts(&self, alerts: &AlertSet) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for alert in alerts.iter() {
            let result = sqlx::query(
                "INSERT INTO alert_history (kind, chain, symbol, detail) VALUES (?, ?, ?, ?)",
            )
            .bind(alert.kind().as_str())
            .bind(alert.chain())
            .bind(alert.symbol())
            .bind(describe_alert(alert))
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }
        tx.commit().await?;
        Ok(written)
    }

    /// Alerts recorded in the last `hours` hours.
    pub async fn recent_alert_count(&self, hours: i64) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM alert_history WHERE created_at >= datetime('now', ? || ' hours')",
        )
        .bind(-hours)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Clean up old history entries (older than days).
    pub async fn cleanup_old_history(&self, days: i64) -> Result<u64, DbError> {
        let result = sqlx::query(
            "DELETE FROM alert_history WHERE created_at < datetime('now', ? || ' days')",
        )
        .bind(-days)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
