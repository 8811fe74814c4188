//! punto-core - Storage and domain types for the punto table server
//!
//! This crate owns the durable state every other component coordinates
//! through: rounds, bets, player balances and advisory room leases, all in
//! one SQLite file. It deliberately knows nothing about scheduling or game
//! rules.

pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use config::{BankerRounding, RoomConfig, TableConfig};
pub use error::{CoreError, Result};
pub use storage::{LeaseStore, LedgerStore, RoundStore, Storage};
pub use types::{BetRow, Card, HandResult, Outcome, Phase, RoundKey, RoundRow, Side, Suit};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_storage_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("punto.db");

        {
            let storage = Storage::new(&path).await.unwrap();
            LedgerStore::new(&storage).credit("carol", 250).await.unwrap();
        }

        let storage = Storage::new(&path).await.unwrap();
        assert_eq!(LedgerStore::new(&storage).balance("carol").await.unwrap(), 250);
    }
}
