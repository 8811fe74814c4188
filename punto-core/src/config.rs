use crate::error::{CoreError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Static configuration for one betting table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub id: String,
    /// Length of the betting window, in milliseconds.
    pub betting_ms: u64,
    /// Reveal pause after dealing, in milliseconds. Pure client pacing.
    pub reveal_ms: u64,
}

impl RoomConfig {
    pub fn new(id: &str, betting_ms: u64, reveal_ms: u64) -> Self {
        Self {
            id: id.to_string(),
            betting_ms,
            reveal_ms,
        }
    }

    pub fn betting_window(&self) -> Duration {
        Duration::from_millis(self.betting_ms)
    }

    pub fn reveal_window(&self) -> Duration {
        Duration::from_millis(self.reveal_ms)
    }
}

/// Rounding applied to the banker-win commission. Floor matches the usual
/// casino convention; exact mode is a policy, not a rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BankerRounding {
    #[default]
    Floor,
    Nearest,
}

/// Deployment-wide configuration: the room set, the reference timezone and
/// the scheduler pacing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub rooms: Vec<RoomConfig>,
    /// Fixed reference timezone as whole hours east of UTC. Day keys,
    /// deadlines and leaderboard windows all use this one offset.
    pub utc_offset_hours: i32,
    pub banker_rounding: BankerRounding,
    /// Pause between settling one round and opening the next, ms.
    pub inter_round_ms: u64,
    /// Back-off after a failed cycle or a lease held elsewhere, ms.
    pub retry_ms: u64,
    /// Room lease lifetime, ms. Must exceed one full round cycle so a live
    /// scheduler is never evicted mid-round.
    pub lease_ttl_ms: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            rooms: vec![
                RoomConfig::new("room1", 30_000, 5_000),
                RoomConfig::new("room2", 60_000, 5_000),
                RoomConfig::new("room3", 90_000, 5_000),
            ],
            utc_offset_hours: 8,
            banker_rounding: BankerRounding::Floor,
            inter_round_ms: 2_000,
            retry_ms: 2_000,
            lease_ttl_ms: 180_000,
        }
    }
}

impl TableConfig {
    pub fn room(&self, id: &str) -> Option<&RoomConfig> {
        self.rooms.iter().find(|r| r.id == id)
    }

    /// Reject configurations the scheduler cannot run safely. The lease
    /// must outlive the longest possible cycle, otherwise another process
    /// could seize a room while its round is still in flight.
    pub fn validate(&self) -> Result<()> {
        for room in &self.rooms {
            if room.betting_ms == 0 {
                return Err(CoreError::config(format!(
                    "room '{}' has a zero-length betting window",
                    room.id
                )));
            }
            let cycle_ms = room
                .betting_ms
                .saturating_add(room.reveal_ms)
                .saturating_add(self.inter_round_ms);
            if self.lease_ttl_ms <= cycle_ms {
                return Err(CoreError::config(format!(
                    "lease_ttl_ms {} must exceed room '{}' cycle of {}ms",
                    self.lease_ttl_ms, room.id, cycle_ms
                )));
            }
        }
        Ok(())
    }

    pub fn offset(&self) -> FixedOffset {
        let secs = self.utc_offset_hours.clamp(-23, 23) * 3600;
        FixedOffset::east_opt(secs).expect("clamped to a valid offset")
    }

    /// Calendar date of `now` in the reference timezone.
    pub fn day_key(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset()).date_naive()
    }

    pub fn inter_round_delay(&self) -> Duration {
        Duration::from_millis(self.inter_round_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_millis(self.lease_ttl_ms)
    }
}
