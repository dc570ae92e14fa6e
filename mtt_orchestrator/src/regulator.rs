//! Seat balancing for multi-table competitions.
//!
//! The balancer keeps, per competition, the live occupancy of every table
//! and a pool of players waiting for a seat. It decides when a table should
//! be broken up and where waiting players go; it never talks to the table
//! engine itself.

use crate::competition::{CompetitionId, PlayerId};
use crate::table::{Table, TableId};
use std::collections::HashMap;

/// Live occupancy of one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOccupancy {
    pub seated: usize,
    /// Seats a newcomer can take without disturbing the blinds
    pub available: usize,
    /// Table is being broken up and takes no new players
    pub suspended: bool,
}

/// Outcome of a table update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDecision {
    /// The table should be broken up and its players redistributed
    pub suspend: bool,
}

/// Where to put waiting players
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Seat players at an existing table
    Seat {
        table_id: TableId,
        player_ids: Vec<PlayerId>,
    },
    /// Open a new table for these players
    NewTable { player_ids: Vec<PlayerId> },
}

#[derive(Debug)]
struct BalancerState {
    max_seat_count: usize,
    min_player_count: usize,
    waiting: Vec<PlayerId>,
    tables: HashMap<TableId, TableOccupancy>,
}

impl BalancerState {
    fn active_tables(&self) -> impl Iterator<Item = (&TableId, &TableOccupancy)> {
        self.tables.iter().filter(|(_, t)| !t.suspended)
    }
}

/// Seat balancer for all multi-table competitions
#[derive(Debug, Default)]
pub struct SeatBalancer {
    competitions: HashMap<CompetitionId, BalancerState>,
}

impl SeatBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start balancing a competition
    pub fn register(
        &mut self,
        competition_id: CompetitionId,
        max_seat_count: usize,
        min_player_count: usize,
    ) {
        self.competitions.insert(
            competition_id,
            BalancerState {
                max_seat_count: max_seat_count.max(2),
                min_player_count: min_player_count.clamp(1, max_seat_count.max(2)),
                waiting: Vec::new(),
                tables: HashMap::new(),
            },
        );
        log::debug!("Seat balancer registered competition {}", competition_id);
    }

    /// Stop balancing a competition
    pub fn unregister(&mut self, competition_id: CompetitionId) -> bool {
        self.competitions.remove(&competition_id).is_some()
    }

    pub fn is_registered(&self, competition_id: CompetitionId) -> bool {
        self.competitions.contains_key(&competition_id)
    }

    /// Add a player to the waiting pool. Returns false if the competition is
    /// not registered.
    pub fn join_waiting(&mut self, competition_id: CompetitionId, player_id: &str) -> bool {
        let Some(state) = self.competitions.get_mut(&competition_id) else {
            return false;
        };
        if !state.waiting.iter().any(|id| id == player_id) {
            state.waiting.push(player_id.to_string());
        }
        true
    }

    pub fn remove_waiting(&mut self, competition_id: CompetitionId, player_id: &str) -> bool {
        let Some(state) = self.competitions.get_mut(&competition_id) else {
            return false;
        };
        let before = state.waiting.len();
        state.waiting.retain(|id| id != player_id);
        state.waiting.len() != before
    }

    pub fn waiting_players(&self, competition_id: CompetitionId) -> Vec<PlayerId> {
        self.competitions
            .get(&competition_id)
            .map(|state| state.waiting.clone())
            .unwrap_or_default()
    }

    pub fn occupancy(&self, competition_id: CompetitionId, table_id: TableId) -> Option<TableOccupancy> {
        self.competitions
            .get(&competition_id)?
            .tables
            .get(&table_id)
            .copied()
    }

    /// Forget a table
    pub fn remove_table(&mut self, competition_id: CompetitionId, table_id: TableId) {
        if let Some(state) = self.competitions.get_mut(&competition_id) {
            state.tables.remove(&table_id);
        }
    }

    /// Record a table's occupancy without a balancing decision
    pub fn track_table(&mut self, competition_id: CompetitionId, table: &Table) {
        if let Some(state) = self.competitions.get_mut(&competition_id) {
            let suspended = state
                .tables
                .get(&table.id)
                .is_some_and(|occupancy| occupancy.suspended);
            state.tables.insert(
                table.id,
                TableOccupancy {
                    seated: table.seated_count(),
                    available: table.available_seats(),
                    suspended,
                },
            );
        }
    }

    /// Record a table's occupancy and decide whether it must break up.
    ///
    /// A table is broken up when another table is still running, it is the
    /// emptiest running table (lowest id on ties) and its players fit into
    /// the empty seats of the other running tables.
    pub fn update_table(&mut self, competition_id: CompetitionId, table: &Table) -> BalanceDecision {
        self.track_table(competition_id, table);
        let Some(state) = self.competitions.get_mut(&competition_id) else {
            return BalanceDecision { suspend: false };
        };

        let seated = table.seated_count();
        if state
            .tables
            .get(&table.id)
            .is_some_and(|occupancy| occupancy.suspended)
        {
            return BalanceDecision { suspend: false };
        }

        let others: Vec<_> = state
            .active_tables()
            .filter(|(id, _)| **id != table.id)
            .map(|(id, occupancy)| (*id, *occupancy))
            .collect();
        if others.is_empty() {
            return BalanceDecision { suspend: false };
        }

        let is_smallest = others
            .iter()
            .all(|(id, other)| seated < other.seated || (seated == other.seated && table.id < *id));
        let free_seats: usize = others
            .iter()
            .map(|(_, other)| state.max_seat_count.saturating_sub(other.seated))
            .sum();

        let suspend = is_smallest && seated <= free_seats;
        if suspend && let Some(occupancy) = state.tables.get_mut(&table.id) {
            occupancy.suspended = true;
            log::info!(
                "Competition {}: table {} ({} players) will be broken up",
                competition_id,
                table.id,
                seated
            );
        }

        BalanceDecision { suspend }
    }

    /// Take players out of the waiting pool and decide where they sit.
    ///
    /// Running tables are filled first, emptiest first, up to their available
    /// seats. Remaining players open new tables as long as enough of them are
    /// waiting to open one, and never fewer than two.
    pub fn plan_placements(&mut self, competition_id: CompetitionId) -> Vec<Placement> {
        let Some(state) = self.competitions.get_mut(&competition_id) else {
            return Vec::new();
        };

        let mut placements = Vec::new();
        if state.waiting.is_empty() {
            return placements;
        }

        let mut targets: Vec<(TableId, TableOccupancy)> = state
            .active_tables()
            .filter(|(_, occupancy)| occupancy.available > 0)
            .map(|(id, occupancy)| (*id, *occupancy))
            .collect();
        targets.sort_by(|a, b| a.1.seated.cmp(&b.1.seated).then_with(|| a.0.cmp(&b.0)));

        for (table_id, occupancy) in targets {
            if state.waiting.is_empty() {
                break;
            }
            let count = occupancy.available.min(state.waiting.len());
            let player_ids: Vec<PlayerId> = state.waiting.drain(..count).collect();
            if let Some(record) = state.tables.get_mut(&table_id) {
                record.seated += count;
                record.available -= count;
            }
            placements.push(Placement::Seat {
                table_id,
                player_ids,
            });
        }

        let min_to_open = state.min_player_count.max(2);
        while state.waiting.len() >= min_to_open {
            let count = state.max_seat_count.min(state.waiting.len());
            let player_ids: Vec<PlayerId> = state.waiting.drain(..count).collect();
            placements.push(Placement::NewTable { player_ids });
        }

        placements
    }
}
