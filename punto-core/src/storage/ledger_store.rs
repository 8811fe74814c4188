use crate::error::Result;
use crate::storage::Storage;
use rusqlite::{params, OptionalExtension};

/// Durable per-user balance with atomic debit-if-sufficient semantics.
pub struct LedgerStore<'a> {
    storage: &'a Storage,
}

impl<'a> LedgerStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Current balance; an unknown user holds zero.
    pub async fn balance(&self, user_id: &str) -> Result<u64> {
        let conn = self.storage.get_connection().await;

        let balance: Option<u64> = conn
            .query_row(
                "SELECT balance FROM balances WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(balance.unwrap_or(0))
    }

    pub async fn credit(&self, user_id: &str, amount: u64) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT INTO balances (user_id, balance) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET balance = balance + ?2",
            params![user_id, amount],
        )?;

        Ok(())
    }

    /// Debit only when the balance covers `amount`; a conditional update so
    /// a losing race simply reports `false`.
    pub async fn debit_if_sufficient(&self, user_id: &str, amount: u64) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let debited = conn.execute(
            "UPDATE balances SET balance = balance - ?1 WHERE user_id = ?2 AND balance >= ?1",
            params![amount, user_id],
        )?;

        Ok(debited > 0)
    }

    /// Administrative top-up.
    pub async fn grant(&self, user_id: &str, amount: u64) -> Result<u64> {
        self.credit(user_id, amount).await?;
        let balance = self.balance(user_id).await?;
        tracing::info!(user_id, amount, balance, "granted balance");
        Ok(balance)
    }
}
