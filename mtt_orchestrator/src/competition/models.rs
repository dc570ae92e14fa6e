//! Competition data models.

use crate::blind::{BlindLevel, BlindOptions, BlindState};
use crate::errors::{CompetitionError, CompetitionResult};
use crate::table::{Table, TableId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Competition ID type
pub type CompetitionId = Uuid;

/// Player ID type (assigned by the caller)
pub type PlayerId = String;

/// Competition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionMode {
    /// Countdown tournament: single table, fixed end time
    Ct,
    /// Multi-table tournament
    Mtt,
    /// Cash game
    Cash,
}

/// Game rule handed to the table engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameRule {
    #[default]
    Default,
    ShortDeck,
}

/// Competition status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompetitionStatus {
    /// Accepting registrations, not started
    Registering,
    /// Started, late buy-ins still accepted
    DelayedBuyIn,
    /// Started, buy-in window closed
    StoppedBuyIn,
    /// Finished
    End,
    /// Reserved for handoff between processes, no transitions defined
    Restoring,
}

impl CompetitionStatus {
    /// Whether buy-ins and re-buys are accepted
    pub fn is_buy_in_open(&self) -> bool {
        matches!(
            self,
            CompetitionStatus::Registering | CompetitionStatus::DelayedBuyIn
        )
    }

    pub fn is_started(&self) -> bool {
        matches!(
            self,
            CompetitionStatus::DelayedBuyIn | CompetitionStatus::StoppedBuyIn
        )
    }
}

/// Player status within a competition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    Playing,
    /// Table is being broken up, player awaits a new seat
    WaitingTableBalancing,
    /// Eliminated (terminal)
    Knockout,
}

/// Re-buy limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReBuySetting {
    /// Maximum re-buys per player
    pub max_times: u32,
    /// Seconds a busted player has to re-buy
    pub waiting_time_secs: u32,
}

/// Addon limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonSetting {
    /// Maximum addons per player
    pub max_times: u32,
}

/// Table sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSeatSetting {
    /// Seats per table
    pub max_seat_count: usize,
    /// Players needed to open a table
    pub min_player_count: usize,
}

impl Default for TableSeatSetting {
    fn default() -> Self {
        Self {
            max_seat_count: 9,
            min_player_count: 2,
        }
    }
}

/// Competition configuration supplied on creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionSetting {
    /// Competition name
    pub name: String,
    pub mode: CompetitionMode,
    #[serde(default)]
    pub rule: GameRule,
    pub blind: BlindOptions,
    /// Minimum players required to start
    pub min_player_count: usize,
    /// Maximum players allowed
    pub max_player_count: usize,
    #[serde(default)]
    pub table: TableSeatSetting,
    #[serde(default)]
    pub rebuy: ReBuySetting,
    #[serde(default)]
    pub addon: AddonSetting,
    /// Per-action time budget in seconds, 0 for the orchestrator default
    #[serde(default)]
    pub action_time_secs: u32,
    /// CT only: competition length in seconds
    #[serde(default)]
    pub max_duration_secs: u32,
    /// Scheduled start (not before)
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    /// New buy-ins are rejected from this time on. Re-buys are unaffected.
    #[serde(default)]
    pub disable_at: Option<DateTime<Utc>>,
}

impl CompetitionSetting {
    /// Create a standard countdown tournament configuration
    pub fn countdown(name: String, min_player_count: usize, max_duration_secs: u32) -> Self {
        Self {
            name,
            mode: CompetitionMode::Ct,
            rule: GameRule::Default,
            blind: standard_blind_options(),
            min_player_count,
            max_player_count: 9,
            table: TableSeatSetting::default(),
            rebuy: ReBuySetting {
                max_times: 2,
                waiting_time_secs: 30,
            },
            addon: AddonSetting { max_times: 1 },
            action_time_secs: 0,
            max_duration_secs,
            start_at: None,
            disable_at: None,
        }
    }

    /// Create a standard multi-table tournament configuration
    pub fn multi_table(name: String, min_player_count: usize, max_player_count: usize) -> Self {
        Self {
            name,
            mode: CompetitionMode::Mtt,
            rule: GameRule::Default,
            blind: standard_blind_options(),
            min_player_count,
            max_player_count,
            table: TableSeatSetting::default(),
            rebuy: ReBuySetting {
                max_times: 1,
                waiting_time_secs: 30,
            },
            addon: AddonSetting { max_times: 1 },
            action_time_secs: 0,
            max_duration_secs: 0,
            start_at: None,
            disable_at: None,
        }
    }

    /// Parse a setting from JSON
    pub fn from_json(json: &str) -> CompetitionResult<Self> {
        serde_json::from_str(json).map_err(|e| CompetitionError::InvalidSetting(e.to_string()))
    }

    /// Validate the setting
    pub fn validate(&self) -> CompetitionResult<()> {
        self.blind.validate()?;

        if self.min_player_count == 0 {
            return Err(CompetitionError::InvalidSetting(
                "Minimum player count must be at least 1".to_string(),
            ));
        }

        if self.max_player_count < self.min_player_count {
            return Err(CompetitionError::InvalidSetting(format!(
                "Maximum player count {} is below minimum {}",
                self.max_player_count, self.min_player_count
            )));
        }

        if self.table.max_seat_count < 2 || self.table.max_seat_count > 23 {
            return Err(CompetitionError::InvalidSetting(
                "Seats per table must be between 2 and 23".to_string(),
            ));
        }

        if self.table.min_player_count == 0
            || self.table.min_player_count > self.table.max_seat_count
        {
            return Err(CompetitionError::InvalidSetting(format!(
                "Players to open a table must be between 1 and {}",
                self.table.max_seat_count
            )));
        }

        if self.mode == CompetitionMode::Ct {
            if self.max_duration_secs == 0 {
                return Err(CompetitionError::InvalidSetting(
                    "Countdown tournaments need a max duration".to_string(),
                ));
            }
            if self.max_player_count > self.table.max_seat_count {
                return Err(CompetitionError::InvalidSetting(
                    "Countdown tournaments are limited to a single table".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn standard_blind_options() -> BlindOptions {
    BlindOptions {
        levels: vec![
            BlindLevel::new(1, 10, 20, 300),
            BlindLevel::new(2, 15, 30, 300),
            BlindLevel::new(3, 20, 40, 300),
            BlindLevel::new(4, 30, 60, 300),
            BlindLevel::break_level(120),
            BlindLevel::new(5, 40, 80, 300).with_ante(10),
            BlindLevel::new(6, 60, 120, 300).with_ante(15),
            BlindLevel::new(7, 80, 160, 300).with_ante(20),
            BlindLevel::new(8, 120, 240, 300).with_ante(30),
        ],
        initial_level: 1,
        final_buy_in_level: Some(4),
    }
}

/// Immutable competition configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionMeta {
    pub name: String,
    pub mode: CompetitionMode,
    pub rule: GameRule,
    pub blind: BlindOptions,
    pub min_player_count: usize,
    pub max_player_count: usize,
    pub table: TableSeatSetting,
    pub rebuy: ReBuySetting,
    pub addon: AddonSetting,
    pub action_time_secs: u32,
    pub max_duration_secs: u32,
}

impl From<&CompetitionSetting> for CompetitionMeta {
    fn from(setting: &CompetitionSetting) -> Self {
        Self {
            name: setting.name.clone(),
            mode: setting.mode,
            rule: setting.rule,
            blind: setting.blind.clone(),
            min_player_count: setting.min_player_count,
            max_player_count: setting.max_player_count,
            table: setting.table,
            rebuy: setting.rebuy,
            addon: setting.addon,
            action_time_secs: setting.action_time_secs,
            max_duration_secs: setting.max_duration_secs,
        }
    }
}

/// Cumulative per-player statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatistics {
    /// Hands the player was dealt into
    pub hands_played: u32,
    /// Largest stack held
    pub best_chips: i64,
    /// Best live table rank (0 if never ranked)
    pub best_rank: u32,
}

/// A player registered in a competition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionPlayer {
    pub player_id: PlayerId,
    /// Table the player currently sits at
    pub current_table_id: Option<TableId>,
    /// Buy-in timestamp, used to break ranking ties
    pub joined_at: DateTime<Utc>,
    pub status: PlayerStatus,
    /// Live rank (0 when not applicable), or final rank once knocked out
    pub rank: u32,
    pub chips: i64,
    pub rebuy_times: u32,
    pub addon_times: u32,
    /// Player busted and may still re-buy
    pub is_rebuying: bool,
    pub rebuy_deadline: Option<DateTime<Utc>>,
    /// Sum of all buy-in, re-buy and addon chips
    pub total_redeem_chips: i64,
    pub statistics: PlayerStatistics,
}

impl CompetitionPlayer {
    pub fn new(
        player_id: impl Into<PlayerId>,
        table_id: Option<TableId>,
        chips: i64,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            current_table_id: table_id,
            joined_at,
            status: PlayerStatus::Playing,
            rank: 0,
            chips,
            rebuy_times: 0,
            addon_times: 0,
            is_rebuying: false,
            rebuy_deadline: None,
            total_redeem_chips: chips,
            statistics: PlayerStatistics {
                best_chips: chips,
                ..Default::default()
            },
        }
    }

    pub fn is_knockout(&self) -> bool {
        self.status == PlayerStatus::Knockout
    }
}

/// A filled ranking slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionRank {
    pub player_id: PlayerId,
    pub final_chips: i64,
}

/// Mutable competition state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionState {
    pub open_at: DateTime<Utc>,
    /// Registration closes at
    pub disable_at: Option<DateTime<Utc>>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    /// Index-addressed player list, only shrinks on refund or leave
    pub players: Vec<CompetitionPlayer>,
    pub status: CompetitionStatus,
    /// Open table snapshots
    pub tables: Vec<Table>,
    /// Slot `i` holds the player finishing in place `i + 1`
    pub rankings: Vec<Option<CompetitionRank>>,
    pub blind: BlindState,
}

/// Competition aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competition {
    pub id: CompetitionId,
    pub meta: CompetitionMeta,
    pub state: CompetitionState,
    pub updated_at: DateTime<Utc>,
    /// Increases by one on every published change
    pub update_serial: u64,
}
