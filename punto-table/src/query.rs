//! Read-only surface consumed by the external API layer. Everything is
//! computed from stored rows, never from scheduler memory, so queries stay
//! correct when they run in a different process than the room loops.

use crate::error::{Result, TableError};
use crate::payout;
use chrono::{DateTime, Utc};
use punto_core::config::TableConfig;
use punto_core::storage::{RoundStore, Storage};
use punto_core::types::{Outcome, Phase, Side};
use serde::Serialize;
use std::collections::HashMap;

/// Snapshot of one room's latest round.
#[derive(Debug, Clone, Serialize)]
pub struct RoomState {
    pub room: String,
    /// 0 when the room has not opened a round today.
    pub round_no: u32,
    /// Absent until the first round of the day opens.
    pub phase: Option<Phase>,
    /// Seconds until the betting deadline; 0 past the deadline or outside
    /// the betting phase.
    pub seconds_left: u64,
    pub totals: HashMap<Side, u64>,
    pub bettors: u64,
    pub result: Option<HandSummary>,
}

/// Dealt-hand summary shown once a round is locked.
#[derive(Debug, Clone, Serialize)]
pub struct HandSummary {
    pub player_cards: Vec<String>,
    pub banker_cards: Vec<String>,
    pub player_total: u8,
    pub banker_total: u8,
    pub winner: Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryItem {
    pub round_no: u32,
    pub outcome: Option<Outcome>,
    pub player_total: u8,
    pub banker_total: u8,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub wagered: u64,
    pub net_profit: i64,
}

/// Latest-round snapshot for a single room.
pub async fn room_state(storage: &Storage, config: &TableConfig, room: &str) -> Result<RoomState> {
    let room = config
        .room(room)
        .ok_or_else(|| TableError::UnknownRoom(room.to_string()))?;

    let now = Utc::now();
    let rounds = RoundStore::new(storage);
    let round = match rounds.latest_round(&room.id, config.day_key(now)).await? {
        Some(round) => round,
        None => {
            return Ok(RoomState {
                room: room.id.clone(),
                round_no: 0,
                phase: None,
                seconds_left: 0,
                totals: HashMap::new(),
                bettors: 0,
                result: None,
            })
        }
    };

    let seconds_left = if round.phase == Phase::Betting && now < round.close_at {
        (round.close_at - now).num_seconds().max(0) as u64
    } else {
        0
    };
    let pools = rounds.pool_totals(&round.key()).await?;
    let result = round.hand_result().map(|hand| HandSummary {
        player_cards: hand.player_cards.iter().map(|c| c.to_string()).collect(),
        banker_cards: hand.banker_cards.iter().map(|c| c.to_string()).collect(),
        player_total: hand.player_total,
        banker_total: hand.banker_total,
        winner: hand.outcome,
    });

    Ok(RoomState {
        room: round.room.clone(),
        round_no: round.round_no,
        phase: Some(round.phase),
        seconds_left,
        totals: pools.by_side,
        bettors: pools.bettors,
        result,
    })
}

/// Snapshot of every configured room, for the lobby listing.
pub async fn lobby(storage: &Storage, config: &TableConfig) -> Result<Vec<RoomState>> {
    let mut states = Vec::with_capacity(config.rooms.len());
    for room in &config.rooms {
        states.push(room_state(storage, config, &room.id).await?);
    }
    Ok(states)
}

/// The most recent `limit` settled rounds of a room, oldest first.
/// Rounds are kept forever, so this reaches across day boundaries.
pub async fn history(
    storage: &Storage,
    config: &TableConfig,
    room: &str,
    limit: u32,
) -> Result<Vec<HistoryItem>> {
    let room = config
        .room(room)
        .ok_or_else(|| TableError::UnknownRoom(room.to_string()))?;

    let rounds = RoundStore::new(storage);
    let mut recent = rounds.settled_rounds(&room.id, limit).await?;
    recent.reverse();

    Ok(recent
        .into_iter()
        .map(|r| HistoryItem {
            round_no: r.round_no,
            outcome: r.outcome,
            player_total: r.player_total.unwrap_or(0),
            banker_total: r.banker_total.unwrap_or(0),
            opened_at: r.opened_at,
        })
        .collect())
}

/// Today's net profit per user over settled rounds, descending. Credits
/// are recomputed through the payout calculator; bet rows stay immutable.
pub async fn leaderboard(
    storage: &Storage,
    config: &TableConfig,
    room: Option<&str>,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>> {
    if let Some(room) = room {
        if config.room(room).is_none() {
            return Err(TableError::UnknownRoom(room.to_string()));
        }
    }

    let rounds = RoundStore::new(storage);
    let day_key = config.day_key(Utc::now());
    let settled = rounds.settled_rounds_on(day_key, room).await?;

    let mut wagered: HashMap<String, u64> = HashMap::new();
    let mut net: HashMap<String, i64> = HashMap::new();
    for round in settled {
        let Some(hand) = round.hand_result() else {
            continue;
        };
        let bets = rounds.bets_for(&round.key()).await?;
        for bet in &bets {
            *wagered.entry(bet.user_id.clone()).or_default() += bet.amount;
            *net.entry(bet.user_id.clone()).or_default() -= bet.amount as i64;
        }
        for (user, credit) in payout::credits_for_round(&hand, &bets, config.banker_rounding) {
            *net.entry(user).or_default() += credit as i64;
        }
    }

    let mut entries: Vec<LeaderboardEntry> = net
        .into_iter()
        .map(|(user_id, net_profit)| LeaderboardEntry {
            wagered: wagered.get(&user_id).copied().unwrap_or(0),
            user_id,
            net_profit,
        })
        .collect();
    entries.sort_by(|a, b| b.net_profit.cmp(&a.net_profit).then(a.user_id.cmp(&b.user_id)));
    entries.truncate(limit);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dealer;
    use chrono::Duration as ChronoDuration;
    use punto_core::config::RoomConfig;
    use punto_core::storage::LedgerStore;
    use punto_core::types::{decode_hand, BetRow, HandResult, RoundRow};
    use tempfile::tempdir;

    fn test_config() -> TableConfig {
        TableConfig {
            rooms: vec![
                RoomConfig::new("room1", 30_000, 5_000),
                RoomConfig::new("room2", 30_000, 5_000),
            ],
            ..TableConfig::default()
        }
    }

    fn banker_hand() -> HandResult {
        let player_cards = decode_hand("AS 10H").unwrap();
        let banker_cards = decode_hand("4D 5C").unwrap();
        HandResult {
            player_total: dealer::hand_total(&player_cards),
            banker_total: dealer::hand_total(&banker_cards),
            player_cards,
            banker_cards,
            outcome: Outcome::Banker,
        }
    }

    async fn settled_banker_round(
        storage: &Storage,
        config: &TableConfig,
        room: &str,
        bets: &[(&str, Side, u64)],
    ) {
        let rounds = RoundStore::new(storage);
        let ledger = LedgerStore::new(storage);
        let now = Utc::now();
        let day_key = config.day_key(now);
        let round_no = rounds.next_round_no(room, day_key).await.unwrap();
        let round = RoundRow::open(room, day_key, round_no, now, now + ChronoDuration::seconds(30));
        rounds.insert_if_absent(&round).await.unwrap();

        for (user, side, amount) in bets {
            ledger.credit(user, *amount).await.unwrap();
            let bet = BetRow::new(user, &round.key(), *side, *amount, now);
            assert!(rounds.append_bet_debiting(&bet).await.unwrap());
        }

        let hand = banker_hand();
        rounds.mark_locked(&round.key(), &hand, now).await.unwrap();
        let collected = rounds.bets_for(&round.key()).await.unwrap();
        let credits = payout::credits_for_round(&hand, &collected, config.banker_rounding);
        rounds.settle(&round.key(), &credits, now).await.unwrap();
    }

    #[tokio::test]
    async fn test_room_state_before_any_round() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(&dir.path().join("punto.db")).await.unwrap();
        let config = test_config();

        let state = room_state(&storage, &config, "room1").await.unwrap();
        assert_eq!(state.round_no, 0);
        assert!(state.phase.is_none());
        assert_eq!(state.seconds_left, 0);

        assert!(matches!(
            room_state(&storage, &config, "room9").await,
            Err(TableError::UnknownRoom(_))
        ));
    }

    #[tokio::test]
    async fn test_room_state_counts_down_from_stored_deadline() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(&dir.path().join("punto.db")).await.unwrap();
        let config = test_config();
        let rounds = RoundStore::new(&storage);

        let now = Utc::now();
        let day_key = config.day_key(now);
        let round = RoundRow::open("room1", day_key, 1, now, now + ChronoDuration::seconds(25));
        rounds.insert_if_absent(&round).await.unwrap();

        let state = room_state(&storage, &config, "room1").await.unwrap();
        assert_eq!(state.round_no, 1);
        assert_eq!(state.phase, Some(Phase::Betting));
        assert!(state.seconds_left > 0 && state.seconds_left <= 25);

        // Past deadline: still betting phase, but the countdown reads 0.
        let stale = RoundRow::open("room2", day_key, 1, now, now - ChronoDuration::seconds(1));
        rounds.insert_if_absent(&stale).await.unwrap();
        let state = room_state(&storage, &config, "room2").await.unwrap();
        assert_eq!(state.seconds_left, 0);
    }

    #[tokio::test]
    async fn test_history_is_oldest_first_and_limited() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(&dir.path().join("punto.db")).await.unwrap();
        let config = test_config();

        for _ in 0..3 {
            settled_banker_round(&storage, &config, "room1", &[]).await;
        }

        let items = history(&storage, &config, "room1", 2).await.unwrap();
        assert_eq!(items.iter().map(|i| i.round_no).collect::<Vec<_>>(), vec![2, 3]);
        assert!(items.iter().all(|i| i.outcome == Some(Outcome::Banker)));
    }

    #[tokio::test]
    async fn test_history_survives_day_rollover() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(&dir.path().join("punto.db")).await.unwrap();
        let config = test_config();
        let rounds = RoundStore::new(&storage);

        // A round settled yesterday, before any round opens today.
        let now = Utc::now();
        let yesterday = config.day_key(now).pred_opt().unwrap();
        let round = RoundRow::open("room1", yesterday, 12, now, now + ChronoDuration::seconds(30));
        rounds.insert_if_absent(&round).await.unwrap();
        rounds.mark_locked(&round.key(), &banker_hand(), now).await.unwrap();
        rounds
            .settle(&round.key(), &HashMap::new(), now)
            .await
            .unwrap();

        let items = history(&storage, &config, "room1", 10).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].round_no, 12);

        // Today's rounds come after yesterday's.
        settled_banker_round(&storage, &config, "room1", &[]).await;
        let items = history(&storage, &config, "room1", 10).await.unwrap();
        assert_eq!(items.iter().map(|i| i.round_no).collect::<Vec<_>>(), vec![12, 1]);
    }

    #[tokio::test]
    async fn test_leaderboard_nets_credits_against_stakes() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(&dir.path().join("punto.db")).await.unwrap();
        let config = test_config();

        // Outcome is banker in every settled round here: alice profits
        // +95, bob loses his player stake, carol pushes nothing today.
        settled_banker_round(
            &storage,
            &config,
            "room1",
            &[("alice", Side::Banker, 100), ("bob", Side::Player, 80)],
        )
        .await;
        settled_banker_round(&storage, &config, "room2", &[("bob", Side::Player, 20)]).await;

        let entries = leaderboard(&storage, &config, None, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_id, "alice");
        assert_eq!(entries[0].net_profit, 95);
        assert_eq!(entries[0].wagered, 100);
        assert_eq!(entries[1].user_id, "bob");
        assert_eq!(entries[1].net_profit, -100);

        // Room filter narrows the window.
        let room2_only = leaderboard(&storage, &config, Some("room2"), 10).await.unwrap();
        assert_eq!(room2_only.len(), 1);
        assert_eq!(room2_only[0].user_id, "bob");
        assert_eq!(room2_only[0].net_profit, -20);
    }
}
