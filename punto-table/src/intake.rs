//! Bet intake: synchronous validation and atomic acceptance of a wager
//! against the current round. The stored deadline, not the phase flag, is
//! the authoritative gate; the deadline instant itself counts as closed.

use crate::error::{Result, TableError};
use chrono::Utc;
use punto_core::config::TableConfig;
use punto_core::storage::{LedgerStore, RoundStore, Storage};
use punto_core::types::{BetRow, Phase, Side};

/// Validate and accept a wager. On success the stake is debited and the
/// bet is bound to the round identity captured here, never recomputed.
/// Returns the round number the bet was attached to.
pub async fn place_bet(
    storage: &Storage,
    config: &TableConfig,
    user_id: &str,
    room: &str,
    side: Side,
    amount: u64,
) -> Result<u32> {
    let room = config
        .room(room)
        .ok_or_else(|| TableError::UnknownRoom(room.to_string()))?;
    if amount == 0 {
        return Err(TableError::InvalidAmount);
    }

    let now = Utc::now();
    let rounds = RoundStore::new(storage);
    let round = rounds
        .latest_round(&room.id, config.day_key(now))
        .await?
        .filter(|r| r.phase == Phase::Betting)
        .ok_or_else(|| TableError::RoundNotOpen(room.id.clone()))?;
    if now >= round.close_at {
        return Err(TableError::BettingClosed {
            room: round.room.clone(),
            round_no: round.round_no,
        });
    }

    let bet = BetRow::new(user_id, &round.key(), side, amount, now);
    if !rounds.append_bet_debiting(&bet).await? {
        let available = LedgerStore::new(storage).balance(user_id).await?;
        return Err(TableError::InsufficientBalance {
            need: amount,
            available,
        });
    }

    tracing::info!(
        user_id,
        room = %bet.room,
        round_no = bet.round_no,
        side = %bet.side,
        amount,
        "bet accepted"
    );
    Ok(round.round_no)
}
