//! Competition aggregate and its lifecycle.
//!
//! A competition moves `Registering → DelayedBuyIn | StoppedBuyIn → End`.
//! It is mutated by a single writer (the request processor) and handed to
//! subscribers as immutable snapshots.
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use mtt_orchestrator::competition::{Competition, CompetitionSetting, CompetitionStatus};
//! use uuid::Uuid;
//!
//! let setting = CompetitionSetting::countdown("Turbo".to_string(), 3, 1800);
//! let mut competition = Competition::new(Uuid::new_v4(), &setting, Utc::now());
//! assert_eq!(competition.state.status, CompetitionStatus::Registering);
//!
//! competition.start(Utc::now()).unwrap();
//! assert_eq!(competition.state.status, CompetitionStatus::DelayedBuyIn);
//! ```

pub mod models;
pub mod state_machine;

pub use models::{
    AddonSetting, Competition, CompetitionId, CompetitionMeta, CompetitionMode, CompetitionPlayer,
    CompetitionRank, CompetitionSetting, CompetitionState, CompetitionStatus, GameRule, PlayerId,
    PlayerStatistics, PlayerStatus, ReBuySetting, TableSeatSetting,
};
