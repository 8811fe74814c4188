//! punto-table - The round lifecycle engine
//!
//! One independent scheduler loop per room drives open -> betting ->
//! locked -> settled forever, persisting every transition through
//! punto-core. Bet intake and the query surface are stateless request
//! paths over the same store, so every component shares one view of
//! round phase without in-process coupling.

pub mod dealer;
pub mod error;
pub mod intake;
pub mod payout;
pub mod query;
pub mod scheduler;

pub use error::{Result, TableError};
pub use intake::place_bet;
pub use query::{history, leaderboard, lobby, room_state};
pub use scheduler::{CycleOutcome, RoomScheduler};
