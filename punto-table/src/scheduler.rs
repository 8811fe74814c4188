//! Per-room round lifecycle loop: open a round, hold the betting window,
//! lock and deal, pause for the reveal, settle, repeat forever. Every
//! transition is persisted before the loop moves on, so a restart recovers
//! by re-reading the store rather than trusting anything in memory.

use crate::dealer;
use crate::error::{Result, TableError};
use crate::payout;
use chrono::{DateTime, Utc};
use punto_core::config::{RoomConfig, TableConfig};
use punto_core::storage::{LeaseStore, RoundStore, Storage};
use punto_core::types::{Phase, RoundKey, RoundRow};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// What one pass of the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A round was driven to settlement.
    Completed,
    /// Another process holds this room's lease; we only watched.
    StandBy,
}

pub struct RoomScheduler {
    storage: Arc<Storage>,
    config: Arc<TableConfig>,
    room: RoomConfig,
    /// Lease-holder identity for this scheduler instance.
    holder: String,
}

impl RoomScheduler {
    pub fn new(storage: Arc<Storage>, config: Arc<TableConfig>, room: RoomConfig) -> Self {
        Self {
            storage,
            config,
            room,
            holder: Uuid::new_v4().to_string(),
        }
    }

    /// Drive the room forever. Errors are logged and answered with a short
    /// back-off; the loop itself never exits.
    pub async fn run(self) {
        tracing::info!(room = %self.room.id, holder = %self.holder, "room scheduler started");
        loop {
            match self.run_cycle().await {
                Ok(CycleOutcome::Completed) => {
                    tokio::time::sleep(self.config.inter_round_delay()).await;
                }
                Ok(CycleOutcome::StandBy) => {
                    tokio::time::sleep(self.config.retry_delay()).await;
                }
                Err(e) => {
                    tracing::error!(room = %self.room.id, error = %e, "scheduler cycle failed");
                    tokio::time::sleep(self.config.retry_delay()).await;
                }
            }
        }
    }

    /// One full pass: lease, open or resume, betting wait, lock+deal,
    /// reveal pause, settle. Public so tests can step the machine.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let now = Utc::now();
        let leases = LeaseStore::new(&self.storage);
        if !leases
            .try_acquire(&self.room.id, &self.holder, self.config.lease_ttl(), now)
            .await?
        {
            tracing::debug!(room = %self.room.id, "room lease held elsewhere, standing by");
            return Ok(CycleOutcome::StandBy);
        }

        let round = self.open_or_resume(now).await?;
        let key = round.key();

        match round.phase {
            Phase::Betting => {
                sleep_until(round.close_at).await;
                self.lock_and_deal(&key).await?;
                tokio::time::sleep(self.room.reveal_window()).await;
            }
            Phase::Locked => {
                // Restart recovery: the hand is already dealt; give clients
                // the reveal pause again and fall through to settlement.
                tokio::time::sleep(self.room.reveal_window()).await;
            }
            Phase::Settled => {}
        }

        self.settle(&key).await?;
        Ok(CycleOutcome::Completed)
    }

    /// Adopt today's unsettled round when one exists, otherwise open the
    /// next round number in betting phase. Losing the insert race to
    /// another scheduler also ends in adoption.
    async fn open_or_resume(&self, now: DateTime<Utc>) -> Result<RoundRow> {
        let rounds = RoundStore::new(&self.storage);
        let day_key = self.config.day_key(now);

        if let Some(existing) = rounds.latest_round(&self.room.id, day_key).await? {
            if existing.phase != Phase::Settled {
                tracing::info!(
                    room = %self.room.id,
                    round_no = existing.round_no,
                    phase = %existing.phase,
                    "resuming unsettled round"
                );
                return Ok(existing);
            }
        }

        let round_no = rounds.next_round_no(&self.room.id, day_key).await?;
        let close_at = now + chrono::Duration::milliseconds(self.room.betting_ms as i64);
        let fresh = RoundRow::open(&self.room.id, day_key, round_no, now, close_at);
        rounds.insert_if_absent(&fresh).await?;

        let adopted = rounds
            .get(&fresh.key())
            .await?
            .ok_or_else(|| TableError::internal("opened round vanished"))?;
        tracing::info!(
            room = %self.room.id,
            round_no = adopted.round_no,
            close_at = %adopted.close_at,
            "betting open"
        );
        Ok(adopted)
    }

    async fn lock_and_deal(&self, key: &RoundKey) -> Result<()> {
        let rounds = RoundStore::new(&self.storage);
        let hand = dealer::deal();

        if rounds.mark_locked(key, &hand, Utc::now()).await? {
            tracing::info!(
                room = %key.room,
                round_no = key.round_no,
                outcome = %hand.outcome,
                player_total = hand.player_total,
                banker_total = hand.banker_total,
                "betting locked, hand dealt"
            );
        } else {
            // Another scheduler won the lock; its dealt hand stands.
            tracing::debug!(room = %key.room, round_no = key.round_no, "round already locked");
        }
        Ok(())
    }

    /// Pay out and close the round. Safe to re-run: the store refuses to
    /// settle twice, so a crash between payout and retry cannot double-pay.
    async fn settle(&self, key: &RoundKey) -> Result<()> {
        let rounds = RoundStore::new(&self.storage);
        let round = rounds
            .get(key)
            .await?
            .ok_or_else(|| TableError::internal("round to settle vanished"))?;
        if round.phase == Phase::Settled {
            tracing::debug!(room = %key.room, round_no = key.round_no, "round already settled");
            return Ok(());
        }
        let hand = round
            .hand_result()
            .ok_or_else(|| TableError::internal("cannot settle an undealt round"))?;

        let bets = rounds.bets_for(key).await?;
        let credits = payout::credits_for_round(&hand, &bets, self.config.banker_rounding);

        if rounds.settle(key, &credits, Utc::now()).await? {
            tracing::info!(
                room = %key.room,
                round_no = key.round_no,
                bets = bets.len(),
                paid_users = credits.len(),
                "round settled"
            );
        }
        Ok(())
    }
}

/// Suspend until a wall-clock instant; past deadlines return immediately.
async fn sleep_until(deadline: DateTime<Utc>) {
    let remaining = (deadline - Utc::now())
        .to_std()
        .unwrap_or(Duration::ZERO);
    if !remaining.is_zero() {
        tokio::time::sleep(remaining).await;
    }
}
