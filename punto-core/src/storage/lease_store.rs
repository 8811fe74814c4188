use crate::error::Result;
use crate::storage::{to_millis, Storage};
use chrono::{DateTime, Utc};
use rusqlite::params;
use std::time::Duration;

/// Advisory room-scoped mutual exclusion. At most one holder may drive a
/// given room's scheduler loop at a time; would-be schedulers that fail to
/// acquire stand by and re-check.
pub struct LeaseStore<'a> {
    storage: &'a Storage,
}

impl<'a> LeaseStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Acquire or renew the lease on a room. Succeeds when the lease is
    /// free, expired, or already held by `holder`; a single conditional
    /// upsert so two processes can never both win.
    pub async fn try_acquire(
        &self,
        room: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.storage.get_connection().await;
        let expires_at = to_millis(now) + ttl.as_millis() as i64;

        let acquired = conn.execute(
            "INSERT INTO room_leases (room, holder, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(room) DO UPDATE SET holder = ?2, expires_at = ?3
             WHERE room_leases.holder = ?2 OR room_leases.expires_at < ?4",
            params![room, holder, expires_at, to_millis(now)],
        )?;

        Ok(acquired > 0)
    }

    pub async fn release(&self, room: &str, holder: &str) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "DELETE FROM room_leases WHERE room = ?1 AND holder = ?2",
            params![room, holder],
        )?;

        Ok(())
    }
}
