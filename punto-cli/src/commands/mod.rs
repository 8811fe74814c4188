use comfy_table::{presets::UTF8_FULL, Table};
use punto_core::{LedgerStore, Side, Storage, TableConfig};
use punto_table::{query, RoomScheduler, Result, TableError};
use std::path::Path;
use std::sync::Arc;

/// Load `config.json` from the data directory, falling back to the
/// built-in three-room default when the file does not exist.
pub async fn load_config(data_dir: &Path) -> Result<TableConfig> {
    let path = data_dir.join("config.json");
    let config = match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let config: TableConfig = serde_json::from_slice(&bytes)
                .map_err(|e| TableError::Internal(format!("invalid config.json: {}", e)))?;
            tracing::info!(path = %path.display(), "loaded table config");
            config
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => TableConfig::default(),
        Err(e) => {
            return Err(TableError::Internal(format!(
                "failed to read config.json: {}",
                e
            )))
        }
    };
    config.validate()?;
    Ok(config)
}

/// Launch one scheduler task per configured room and run until killed.
pub async fn serve(storage: Arc<Storage>, config: Arc<TableConfig>) -> Result<()> {
    if config.rooms.is_empty() {
        return Err(TableError::Internal("no rooms configured".to_string()));
    }

    let mut handles = Vec::with_capacity(config.rooms.len());
    for room in config.rooms.clone() {
        tracing::info!(room = %room.id, betting_ms = room.betting_ms, "launching room");
        let scheduler = RoomScheduler::new(storage.clone(), config.clone(), room);
        handles.push(tokio::spawn(scheduler.run()));
    }

    // Scheduler loops never return; joining keeps the process alive.
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "room task aborted");
        }
    }
    Ok(())
}

pub async fn state(storage: &Storage, config: &TableConfig, room: &str) -> Result<()> {
    let state = query::room_state(storage, config, room).await?;
    print_states(&[state]);
    Ok(())
}

pub async fn lobby(storage: &Storage, config: &TableConfig) -> Result<()> {
    let states = query::lobby(storage, config).await?;
    print_states(&states);
    Ok(())
}

pub async fn history(storage: &Storage, config: &TableConfig, room: &str, limit: u32) -> Result<()> {
    let items = query::history(storage, config, room, limit).await?;
    if items.is_empty() {
        println!("No settled rounds for '{}' today", room);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Round", "Winner", "Player", "Banker", "Opened"]);
    for item in items {
        table.add_row(vec![
            item.round_no.to_string(),
            item.outcome.map(|o| o.to_string()).unwrap_or_default(),
            item.player_total.to_string(),
            item.banker_total.to_string(),
            item.opened_at.to_rfc3339(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn leaderboard(
    storage: &Storage,
    config: &TableConfig,
    room: Option<&str>,
    limit: usize,
) -> Result<()> {
    let entries = query::leaderboard(storage, config, room, limit).await?;
    if entries.is_empty() {
        println!("No settled bets today");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "User", "Wagered", "Net profit"]);
    for (rank, entry) in entries.iter().enumerate() {
        table.add_row(vec![
            (rank + 1).to_string(),
            entry.user_id.clone(),
            entry.wagered.to_string(),
            entry.net_profit.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn bet(
    storage: &Storage,
    config: &TableConfig,
    user: &str,
    room: &str,
    side: &str,
    amount: u64,
) -> Result<()> {
    let side: Side = side.parse()?;
    let round_no = punto_table::place_bet(storage, config, user, room, side, amount).await?;
    println!("Bet accepted on round {} of '{}'", round_no, room);
    Ok(())
}

pub async fn grant(storage: &Storage, user: &str, amount: u64) -> Result<()> {
    let balance = LedgerStore::new(storage).grant(user, amount).await?;
    println!("Credited {} units to '{}'; balance is now {}", amount, user, balance);
    Ok(())
}

fn print_states(states: &[query::RoomState]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Room", "Round", "Phase", "Left (s)", "Bettors", "Winner",
    ]);
    for state in states {
        table.add_row(vec![
            state.room.clone(),
            state.round_no.to_string(),
            state
                .phase
                .map(|p| p.to_string())
                .unwrap_or_else(|| "waiting".to_string()),
            state.seconds_left.to_string(),
            state.bettors.to_string(),
            state
                .result
                .as_ref()
                .map(|r| format!("{} ({}-{})", r.winner, r.player_total, r.banker_total))
                .unwrap_or_default(),
        ]);
    }
    println!("{table}");
}
