//! Interface to the external table/hand engine.
//!
//! The orchestrator never deals cards or runs betting rounds. It consumes
//! table snapshots pushed by the engine and drives tables through the
//! [`TableEngine`] command trait.
//!
//! ## Example
//!
//! ```ignore
//! use mtt_orchestrator::table::{JoinPlayer, TableEngine};
//!
//! async fn seat(engine: &dyn TableEngine, table_id: mtt_orchestrator::table::TableId) {
//!     let table = engine
//!         .player_join(table_id, JoinPlayer::new("alice", 1000))
//!         .await
//!         .unwrap();
//!     assert!(table.find_player("alice").is_some());
//! }
//! ```

pub mod engine;
pub mod models;

pub use engine::{TableEngine, TableEngineError, TableEngineErrorKind, TableEngineResult};
pub use models::{
    JoinPlayer, Table, TableGameState, TableId, TablePlayer, TableSetting, TableStatus,
};
