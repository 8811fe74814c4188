use thiserror::Error;

pub type Result<T> = std::result::Result<T, TableError>;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Core error: {0}")]
    Core(#[from] punto_core::CoreError),

    #[error("Unknown room: {0}")]
    UnknownRoom(String),

    #[error("Bet amount must be a positive integer")]
    InvalidAmount,

    #[error("No betting round open in room {0}")]
    RoundNotOpen(String),

    #[error("Betting closed for round {round_no} in room {room}")]
    BettingClosed { room: String, round_no: u32 },

    #[error("Insufficient balance: need {need}, have {available}")]
    InsufficientBalance { need: u64, available: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TableError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
