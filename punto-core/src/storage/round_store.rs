use crate::error::{CoreError, Result};
use crate::storage::{from_millis, from_millis_opt, to_millis, Storage};
use crate::types::{decode_hand, encode_hand, BetRow, HandResult, RoundKey, RoundRow, Side};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Row};
use std::collections::HashMap;
use std::str::FromStr;

const ROUND_COLUMNS: &str = "room, day_key, round_no, phase, opened_at, close_at, locked_at, \
     settled_at, player_cards, banker_cards, player_total, banker_total, outcome";

/// Per-side wagered totals for one round.
#[derive(Debug, Clone, Default)]
pub struct PoolTotals {
    pub by_side: HashMap<Side, u64>,
    pub bettors: u64,
}

/// Durable record of rounds and their bets, keyed by (room, day, number).
pub struct RoundStore<'a> {
    storage: &'a Storage,
}

impl<'a> RoundStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Insert a round unless its slot is already taken. Losing the insert
    /// race is not an error; the caller re-reads and adopts the winner.
    pub async fn insert_if_absent(&self, round: &RoundRow) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO rounds (room, day_key, round_no, phase, opened_at, close_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                round.room,
                round.day_key.to_string(),
                round.round_no,
                round.phase.as_str(),
                to_millis(round.opened_at),
                to_millis(round.close_at),
            ],
        )?;

        Ok(inserted > 0)
    }

    /// Next free round number for the day: max used + 1, starting at 1.
    /// Day rollover needs no special case since a fresh day key has no rows.
    pub async fn next_round_no(&self, room: &str, day_key: NaiveDate) -> Result<u32> {
        let conn = self.storage.get_connection().await;

        let max: u32 = conn.query_row(
            "SELECT COALESCE(MAX(round_no), 0) FROM rounds WHERE room = ?1 AND day_key = ?2",
            params![room, day_key.to_string()],
            |row| row.get(0),
        )?;

        Ok(max + 1)
    }

    pub async fn get(&self, key: &RoundKey) -> Result<Option<RoundRow>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {ROUND_COLUMNS} FROM rounds WHERE room = ?1 AND day_key = ?2 AND round_no = ?3"
        ))?;
        let mut rows = stmt.query_map(
            params![key.room, key.day_key.to_string(), key.round_no],
            round_from_row,
        )?;

        rows.next().transpose().map_err(CoreError::from)
    }

    /// Highest-numbered round for (room, day), whatever its phase.
    pub async fn latest_round(&self, room: &str, day_key: NaiveDate) -> Result<Option<RoundRow>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {ROUND_COLUMNS} FROM rounds WHERE room = ?1 AND day_key = ?2
             ORDER BY round_no DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![room, day_key.to_string()], round_from_row)?;

        rows.next().transpose().map_err(CoreError::from)
    }

    /// Close betting and persist the dealt result in one write. Guarded on
    /// the betting phase so two racing schedulers cannot deal the same
    /// round twice; returns whether this call performed the flip.
    pub async fn mark_locked(
        &self,
        key: &RoundKey,
        hand: &HandResult,
        locked_at: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let updated = conn.execute(
            "UPDATE rounds
             SET phase = 'locked', locked_at = ?1, player_cards = ?2, banker_cards = ?3,
                 player_total = ?4, banker_total = ?5, outcome = ?6
             WHERE room = ?7 AND day_key = ?8 AND round_no = ?9 AND phase = 'betting'",
            params![
                to_millis(locked_at),
                encode_hand(&hand.player_cards),
                encode_hand(&hand.banker_cards),
                hand.player_total,
                hand.banker_total,
                hand.outcome.as_str(),
                key.room,
                key.day_key.to_string(),
                key.round_no,
            ],
        )?;

        Ok(updated > 0)
    }

    /// Apply payouts and mark the round settled in a single transaction.
    /// The phase guard makes settlement at-most-once: when the round is
    /// already settled nothing is credited and `false` is returned.
    pub async fn settle(
        &self,
        key: &RoundKey,
        credits: &HashMap<String, u64>,
        settled_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE rounds SET phase = 'settled', settled_at = ?1
             WHERE room = ?2 AND day_key = ?3 AND round_no = ?4 AND phase != 'settled'",
            params![to_millis(settled_at), key.room, key.day_key.to_string(), key.round_no],
        )?;
        if updated == 0 {
            return Ok(false);
        }

        for (user_id, amount) in credits {
            if *amount == 0 {
                continue;
            }
            tx.execute(
                "INSERT INTO balances (user_id, balance) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET balance = balance + ?2",
                params![user_id, amount],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    /// Atomically debit the bettor and append the bet. Returns `false`
    /// with nothing written when the balance does not cover the stake, so
    /// concurrent bets can never spend the same funds twice.
    pub async fn append_bet_debiting(&self, bet: &BetRow) -> Result<bool> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let debited = tx.execute(
            "UPDATE balances SET balance = balance - ?1 WHERE user_id = ?2 AND balance >= ?1",
            params![bet.amount, bet.user_id],
        )?;
        if debited == 0 {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO bets (id, user_id, room, day_key, round_no, side, amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                bet.id,
                bet.user_id,
                bet.room,
                bet.day_key.to_string(),
                bet.round_no,
                bet.side.as_str(),
                bet.amount,
                to_millis(bet.created_at),
            ],
        )?;

        tx.commit()?;
        Ok(true)
    }

    pub async fn bets_for(&self, key: &RoundKey) -> Result<Vec<BetRow>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, room, day_key, round_no, side, amount, created_at
             FROM bets WHERE room = ?1 AND day_key = ?2 AND round_no = ?3
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map(
            params![key.room, key.day_key.to_string(), key.round_no],
            bet_from_row,
        )?;

        let mut bets = Vec::new();
        for bet in rows {
            bets.push(bet?);
        }
        Ok(bets)
    }

    /// Most recent `limit` settled rounds for a room across all days,
    /// newest first. Day keys are ISO dates, so text order is date order.
    pub async fn settled_rounds(&self, room: &str, limit: u32) -> Result<Vec<RoundRow>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {ROUND_COLUMNS} FROM rounds
             WHERE room = ?1 AND phase = 'settled'
             ORDER BY day_key DESC, round_no DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![room, limit], round_from_row)?;

        let mut rounds = Vec::new();
        for round in rows {
            rounds.push(round?);
        }
        Ok(rounds)
    }

    /// Every settled round for a day, optionally restricted to one room.
    pub async fn settled_rounds_on(
        &self,
        day_key: NaiveDate,
        room: Option<&str>,
    ) -> Result<Vec<RoundRow>> {
        let conn = self.storage.get_connection().await;

        let mut rounds = Vec::new();
        match room {
            Some(room) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ROUND_COLUMNS} FROM rounds
                     WHERE day_key = ?1 AND room = ?2 AND phase = 'settled'
                     ORDER BY room, round_no"
                ))?;
                let rows = stmt.query_map(params![day_key.to_string(), room], round_from_row)?;
                for round in rows {
                    rounds.push(round?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ROUND_COLUMNS} FROM rounds
                     WHERE day_key = ?1 AND phase = 'settled'
                     ORDER BY room, round_no"
                ))?;
                let rows = stmt.query_map(params![day_key.to_string()], round_from_row)?;
                for round in rows {
                    rounds.push(round?);
                }
            }
        }
        Ok(rounds)
    }

    /// Wagered sums per side and the number of bets for one round.
    pub async fn pool_totals(&self, key: &RoundKey) -> Result<PoolTotals> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT side, SUM(amount), COUNT(*) FROM bets
             WHERE room = ?1 AND day_key = ?2 AND round_no = ?3
             GROUP BY side",
        )?;
        let rows = stmt.query_map(
            params![key.room, key.day_key.to_string(), key.round_no],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u64>(1)?,
                    row.get::<_, u64>(2)?,
                ))
            },
        )?;

        let mut totals = PoolTotals::default();
        for row in rows {
            let (side, amount, count) = row?;
            let side = Side::from_str(&side)?;
            totals.by_side.insert(side, amount);
            totals.bettors += count;
        }
        Ok(totals)
    }
}

fn round_from_row(row: &Row<'_>) -> rusqlite::Result<RoundRow> {
    Ok(RoundRow {
        room: row.get(0)?,
        day_key: parse_text(row, 1)?,
        round_no: row.get(2)?,
        phase: parse_text(row, 3)?,
        opened_at: from_millis(row.get(4)?),
        close_at: from_millis(row.get(5)?),
        locked_at: from_millis_opt(row.get(6)?),
        settled_at: from_millis_opt(row.get(7)?),
        player_cards: parse_hand(row, 8)?,
        banker_cards: parse_hand(row, 9)?,
        player_total: row.get(10)?,
        banker_total: row.get(11)?,
        outcome: row
            .get::<_, Option<String>>(12)?
            .map(|s| s.parse().map_err(|e| conversion_error(12, e)))
            .transpose()?,
    })
}

fn bet_from_row(row: &Row<'_>) -> rusqlite::Result<BetRow> {
    Ok(BetRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        room: row.get(2)?,
        day_key: parse_text(row, 3)?,
        round_no: row.get(4)?,
        side: parse_text(row, 5)?,
        amount: row.get(6)?,
        created_at: from_millis(row.get(7)?),
    })
}

fn parse_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_error(idx, e))
}

fn parse_hand(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<crate::types::Card>> {
    let text: String = row.get(idx)?;
    decode_hand(&text).map_err(|e| conversion_error(idx, e))
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}
