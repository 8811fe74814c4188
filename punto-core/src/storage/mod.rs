pub mod ledger_store;
pub mod lease_store;
pub mod round_store;

pub use ledger_store::LedgerStore;
pub use lease_store::LeaseStore;
pub use round_store::RoundStore;

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

/// Current on-disk schema revision, tracked through `PRAGMA user_version`
/// so setup runs once instead of patching columns on every boot.
const SCHEMA_VERSION: i32 = 1;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version >= SCHEMA_VERSION {
            return Ok(());
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS rounds (
                room TEXT NOT NULL,
                day_key TEXT NOT NULL,
                round_no INTEGER NOT NULL,
                phase TEXT NOT NULL,
                opened_at INTEGER NOT NULL,
                close_at INTEGER NOT NULL,
                locked_at INTEGER,
                settled_at INTEGER,
                player_cards TEXT NOT NULL DEFAULT '',
                banker_cards TEXT NOT NULL DEFAULT '',
                player_total INTEGER,
                banker_total INTEGER,
                outcome TEXT,
                PRIMARY KEY (room, day_key, round_no)
            );

            CREATE TABLE IF NOT EXISTS bets (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                room TEXT NOT NULL,
                day_key TEXT NOT NULL,
                round_no INTEGER NOT NULL,
                side TEXT NOT NULL,
                amount INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_bets_round ON bets (room, day_key, round_no);
            CREATE INDEX IF NOT EXISTS idx_bets_user ON bets (user_id, created_at);

            CREATE TABLE IF NOT EXISTS balances (
                user_id TEXT PRIMARY KEY,
                balance INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS room_leases (
                room TEXT PRIMARY KEY,
                holder TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );",
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        tracing::debug!(version = SCHEMA_VERSION, "initialized storage schema");
        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

/// Timestamps are persisted as unix milliseconds.
pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}

pub(crate) fn from_millis_opt(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.map(from_millis)
}
