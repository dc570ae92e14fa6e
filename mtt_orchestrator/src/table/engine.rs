//! Command surface of the external table engine.

use super::models::{JoinPlayer, Table, TableId, TableSetting};
use crate::blind::BlindLevel;
use crate::competition::models::PlayerId;
use async_trait::async_trait;
use thiserror::Error;

/// What went wrong inside the table engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEngineErrorKind {
    /// The engine does not know the table
    TableNotFound,
    /// The engine refused the command in the table's current state
    Rejected,
    /// The engine could not be reached or timed out
    Unavailable,
}

/// Table engine error
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct TableEngineError {
    pub kind: TableEngineErrorKind,
    pub message: String,
}

impl TableEngineError {
    pub fn new(kind: TableEngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn table_not_found(table_id: TableId) -> Self {
        Self::new(
            TableEngineErrorKind::TableNotFound,
            format!("table {table_id} not found"),
        )
    }
}

/// Result type for table engine commands
pub type TableEngineResult<T> = Result<T, TableEngineError>;

/// Commands the orchestrator issues to the table/hand engine.
///
/// Every call is potentially slow I/O. Implementations report table changes
/// back through [`crate::dispatcher::TableEventDispatcher`]; commands that
/// seat players also return the fresh snapshot.
#[async_trait]
pub trait TableEngine: Send + Sync {
    /// Create a table, seating the setting's players
    async fn create_table(&self, setting: TableSetting) -> TableEngineResult<Table>;

    /// Deal hands on a table
    async fn start_table_game(&self, table_id: TableId) -> TableEngineResult<()>;

    /// Close a table
    async fn close_table(&self, table_id: TableId) -> TableEngineResult<()>;

    /// Pause a table so its players can be redistributed
    async fn balance_table(&self, table_id: TableId) -> TableEngineResult<()>;

    /// Remove players from a table
    async fn players_leave(&self, table_id: TableId, player_ids: &[PlayerId])
    -> TableEngineResult<()>;

    /// Seat a player, returning the updated table
    async fn player_join(&self, table_id: TableId, player: JoinPlayer) -> TableEngineResult<Table>;

    /// Add chips to a seated player's stack
    async fn player_redeem_chips(
        &self,
        table_id: TableId,
        player_id: &str,
        chips: i64,
    ) -> TableEngineResult<()>;

    /// Allow the table to deal its next hand
    async fn table_game_open(&self, table_id: TableId) -> TableEngineResult<()>;

    /// Apply a new blind level to a table
    async fn update_blind(&self, table_id: TableId, level: &BlindLevel) -> TableEngineResult<()>;
}
