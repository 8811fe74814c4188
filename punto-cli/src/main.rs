mod commands;

use clap::{Parser, Subcommand};
use punto_core::Storage;
use punto_table::TableError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "punto")]
#[command(about = "punto - multi-room baccarat table server")]
#[command(version)]
struct Cli {
    /// Data directory for the table database and config
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the schedulers for every configured room, forever
    Serve,
    /// Show the latest round state of one room
    State {
        /// Room identifier
        room: String,
    },
    /// Show the latest round state of every room
    Lobby,
    /// Show the most recent settled rounds for a room
    History {
        /// Room identifier
        room: String,
        /// Number of rounds to show
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Show today's net-profit ranking
    Leaderboard {
        /// Restrict to one room
        #[arg(short, long)]
        room: Option<String>,
        /// Number of entries to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Place a bet on the current round of a room
    Bet {
        /// User identifier
        user: String,
        /// Room identifier
        room: String,
        /// Side to back: player, banker, tie or a pair side
        side: String,
        /// Stake in currency units
        amount: u64,
    },
    /// Credit a user's balance
    Grant {
        /// User identifier
        user: String,
        /// Amount to credit
        amount: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "punto={}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get data directory
    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("punto")
    });
    tokio::fs::create_dir_all(&data_dir).await?;

    let config = Arc::new(commands::load_config(&data_dir).await?);
    let storage = Arc::new(Storage::new(&data_dir.join("punto.db")).await?);

    let result = match cli.command {
        Commands::Serve => commands::serve(storage, config).await,
        Commands::State { room } => commands::state(&storage, &config, &room).await,
        Commands::Lobby => commands::lobby(&storage, &config).await,
        Commands::History { room, limit } => {
            commands::history(&storage, &config, &room, limit).await
        }
        Commands::Leaderboard { room, limit } => {
            commands::leaderboard(&storage, &config, room.as_deref(), limit).await
        }
        Commands::Bet {
            user,
            room,
            side,
            amount,
        } => commands::bet(&storage, &config, &user, &room, &side, amount).await,
        Commands::Grant { user, amount } => commands::grant(&storage, &user, amount).await,
    };

    if let Err(e) = result {
        match e {
            TableError::UnknownRoom(room) => {
                eprintln!("Error: Room '{}' is not configured", room);
                eprintln!("Use 'punto lobby' to see the configured rooms");
            }
            TableError::InsufficientBalance { need, available } => {
                eprintln!("Error: Insufficient balance");
                eprintln!("Need: {} units, Available: {} units", need, available);
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
