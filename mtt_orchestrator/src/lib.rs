//! # MTT Orchestrator
//!
//! Tournament orchestration for poker competitions running on an external
//! table engine.
//!
//! The orchestrator tracks a competition from registration to final
//! rankings: it routes buy-ins, re-buys, addons and refunds, advances blind
//! levels on a timer, settles every finished hand (rankings, re-buy windows,
//! knockouts) and coordinates table creation, closing and seat balancing.
//! Dealing and betting belong to the table engine, reached through the
//! [`table::TableEngine`] trait.
//!
//! ## Architecture
//!
//! Every mutation goes through one queue drained by a single worker:
//!
//! - **Requests**: player actions and lifecycle commands from
//!   [`CompetitionManager`]
//! - **Table events**: snapshots pushed through [`TableEventDispatcher`]
//! - **Timers**: blind level ends and re-buy deadlines enqueue requests
//!   instead of touching state
//!
//! ## Core Modules
//!
//! - [`competition`]: Competition aggregate and lifecycle
//! - [`processor`]: Request queue, worker and settlement pipeline
//! - [`ranking`]: Live, knockout and final rankings
//! - [`blind`]: Blind level timeline
//! - [`regulator`]: Seat balancing for multi-table competitions
//!
//! ## Example
//!
//! ```no_run
//! use mtt_orchestrator::{CompetitionManager, CompetitionSetting, OrchestratorConfig};
//! use mtt_orchestrator::table::{JoinPlayer, TableEngine};
//! use std::sync::Arc;
//!
//! async fn run(engine: Arc<dyn TableEngine>) -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = CompetitionManager::new(OrchestratorConfig::from_env()?, engine);
//!
//!     let setting = CompetitionSetting::countdown("Turbo".to_string(), 3, 1800);
//!     let competition = manager.create_competition(setting).await?;
//!
//!     let ticket = manager
//!         .player_join(competition.id, None, JoinPlayer::new("alice", 1000))
//!         .await?;
//!     let competition = ticket.wait().await?;
//!     println!("{} players registered", competition.state.players.len());
//!
//!     Ok(())
//! }
//! ```

/// Blind level timeline.
pub mod blind;
pub use blind::{BlindLevel, BlindOptions, BlindState};

/// Player cache keyed by competition and player.
pub mod cache;

/// Competition aggregate, settings and lifecycle.
pub mod competition;
pub use competition::{
    Competition, CompetitionId, CompetitionMode, CompetitionSetting, CompetitionStatus, PlayerId,
};

pub mod config;
pub use config::{ConfigError, OrchestratorConfig};

/// Table event intake.
pub mod dispatcher;
pub use dispatcher::TableEventDispatcher;

pub mod errors;
pub use errors::{CompetitionError, CompetitionResult, ErrorKind};

pub mod events;
pub use events::{CompetitionEvent, EventTopic};

pub mod manager;
pub use manager::CompetitionManager;

/// Serialized request processing and settlement.
pub mod processor;
pub use processor::RequestTicket;

pub mod ranking;

/// Seat balancing.
pub mod regulator;

pub mod repository;

/// External table engine surface.
pub mod table;
