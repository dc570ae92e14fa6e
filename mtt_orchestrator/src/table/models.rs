//! Table snapshot models exchanged with the external table engine.

use crate::blind::BlindLevel;
use crate::competition::models::{CompetitionId, GameRule, PlayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Table ID type
pub type TableId = Uuid;

/// Table status reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    /// Table exists, no hand dealt yet
    Created,
    /// A hand is in progress
    GameOpened,
    /// A hand just finished and chips were settled
    GameSettled,
    /// Table is paused (e.g. while being broken up)
    Pausing,
    /// Table is closed
    Closed,
}

/// A player seated at a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePlayer {
    pub player_id: PlayerId,
    /// Seat number (0-indexed)
    pub seat: usize,
    /// Current table stack
    pub chips: i64,
    /// Whether the player was dealt into the last hand
    pub is_participated: bool,
}

/// Hand progress on a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGameState {
    /// Hands completed on this table
    pub hand_count: u32,
    /// Dealer button seat
    pub dealer_seat: Option<usize>,
    /// Under-the-gun seat
    pub ug_seat: Option<usize>,
}

/// Full table snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    /// Owning competition
    pub competition_id: CompetitionId,
    pub status: TableStatus,
    /// Number of seats at the table
    pub max_seat_count: usize,
    pub players: Vec<TablePlayer>,
    pub game: TableGameState,
    /// Blind level in play on this table
    pub blind: BlindLevel,
    /// Set by the engine when the table cannot continue (e.g. one player left)
    pub should_close: bool,
    pub updated_at: DateTime<Utc>,
}

impl Table {
    /// Find a seated player
    pub fn find_player(&self, player_id: &str) -> Option<&TablePlayer> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    pub fn seated_count(&self) -> usize {
        self.players.len()
    }

    /// Seat occupancy bitmap, one entry per seat
    pub fn occupancy(&self) -> Vec<bool> {
        let mut seats = vec![false; self.max_seat_count];
        for player in &self.players {
            if let Some(seat) = seats.get_mut(player.seat) {
                *seat = true;
            }
        }
        seats
    }

    /// Empty seats a newcomer can take without disturbing the blinds.
    ///
    /// Counts empty seats walking clockwise from the seat after under-the-gun
    /// up to and including the dealer seat. Before the first hand every
    /// empty seat is available.
    pub fn available_seats(&self) -> usize {
        let occupancy = self.occupancy();
        let size = occupancy.len();
        if size == 0 {
            return 0;
        }

        let (Some(ug), Some(dealer)) = (self.game.ug_seat, self.game.dealer_seat) else {
            return occupancy.iter().filter(|taken| !**taken).count();
        };

        let dealer = dealer % size;
        let mut seat = (ug + 1) % size;
        let mut count = 0;
        loop {
            if !occupancy[seat] {
                count += 1;
            }
            if seat == dealer {
                break;
            }
            seat = (seat + 1) % size;
        }
        count
    }
}

/// A player entering a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPlayer {
    pub player_id: PlayerId,
    /// Chips brought to the table
    pub redeem_chips: i64,
    /// Preferred seat, engine picks when `None`
    pub seat: Option<usize>,
}

impl JoinPlayer {
    pub fn new(player_id: impl Into<PlayerId>, redeem_chips: i64) -> Self {
        Self {
            player_id: player_id.into(),
            redeem_chips,
            seat: None,
        }
    }
}

/// Settings for a table created on behalf of a competition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSetting {
    pub competition_id: CompetitionId,
    pub rule: GameRule,
    pub max_seat_count: usize,
    /// Players needed before the engine deals a hand
    pub min_player_count: usize,
    /// Per-action time budget in seconds
    pub action_time_secs: u32,
    pub blind: BlindLevel,
    /// Players seated on creation
    pub players: Vec<JoinPlayer>,
}
