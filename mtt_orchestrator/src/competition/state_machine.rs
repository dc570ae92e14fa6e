//! Competition lifecycle transitions and bookkeeping.
//!
//! All methods are synchronous and assume a single writer: the request
//! processor owns the aggregate while it applies a request.

use super::models::{
    Competition, CompetitionId, CompetitionMeta, CompetitionMode, CompetitionPlayer,
    CompetitionRank, CompetitionSetting, CompetitionState, CompetitionStatus, PlayerStatus,
};
use crate::blind::{BlindLevel, BlindState};
use crate::errors::{CompetitionError, CompetitionResult};
use crate::ranking::RankData;
use crate::table::{JoinPlayer, Table, TableId, TableSetting};
use chrono::{DateTime, Duration, Utc};

impl Competition {
    /// Create a competition in the registering state
    pub fn new(id: CompetitionId, setting: &CompetitionSetting, now: DateTime<Utc>) -> Self {
        let meta = CompetitionMeta::from(setting);
        let blind = BlindState::from_options(&meta.blind);

        Self {
            id,
            meta,
            state: CompetitionState {
                open_at: now,
                disable_at: setting.disable_at,
                start_at: setting.start_at,
                end_at: None,
                players: Vec::new(),
                status: CompetitionStatus::Registering,
                tables: Vec::new(),
                rankings: Vec::new(),
                blind,
            },
            updated_at: now,
            update_serial: 0,
        }
    }

    /// Whether the competition may start now.
    ///
    /// Pure guard: registering, enough seated players across all tables,
    /// and any scheduled start time has passed.
    pub fn can_start(&self, now: DateTime<Utc>) -> bool {
        if self.state.status != CompetitionStatus::Registering {
            return false;
        }

        if self.seated_player_count() < self.meta.min_player_count {
            return false;
        }

        match self.state.start_at {
            Some(start_at) => now >= start_at,
            None => true,
        }
    }

    /// Start the competition and its blind clock
    pub fn start(&mut self, now: DateTime<Utc>) -> CompetitionResult<()> {
        if self.state.status != CompetitionStatus::Registering {
            return Err(CompetitionError::InvalidStatus {
                action: "start",
                status: self.state.status,
            });
        }

        self.state.blind.start(now)?;

        self.state.status = if self.meta.blind.final_buy_in_level.is_some() {
            CompetitionStatus::DelayedBuyIn
        } else {
            self.grow_rankings();
            CompetitionStatus::StoppedBuyIn
        };

        if self.meta.mode == CompetitionMode::Ct {
            self.state.start_at = Some(now);
            self.state.end_at =
                Some(now + Duration::seconds(i64::from(self.meta.max_duration_secs)));
        }

        log::info!(
            "Competition {} '{}' started with {} players ({:?})",
            self.id,
            self.meta.name,
            self.state.players.len(),
            self.state.status
        );

        Ok(())
    }

    /// Force the competition into its final state
    pub fn close(&mut self, now: DateTime<Utc>) {
        if self.meta.mode == CompetitionMode::Mtt {
            self.state.end_at = Some(now);
        }
        self.state.status = CompetitionStatus::End;
        log::info!("Competition {} '{}' closed", self.id, self.meta.name);
    }

    /// Refresh the update timestamp and bump the serial
    pub fn mark_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.update_serial += 1;
    }

    /// Settings for a new table of this competition
    pub fn table_setting(&self, players: Vec<JoinPlayer>) -> TableSetting {
        let blind = self
            .state
            .blind
            .current_level()
            .or_else(|| self.meta.blind.levels.first())
            .cloned()
            .unwrap_or_else(|| BlindLevel::new(1, 0, 0, 0));

        TableSetting {
            competition_id: self.id,
            rule: self.meta.rule,
            max_seat_count: self.meta.table.max_seat_count,
            min_player_count: self.meta.table.min_player_count,
            action_time_secs: self.meta.action_time_secs,
            blind,
            players,
        }
    }

    // === Tables ===

    pub fn has_table(&self, table_id: TableId) -> bool {
        self.state.tables.iter().any(|t| t.id == table_id)
    }

    pub fn table(&self, table_id: TableId) -> Option<&Table> {
        self.state.tables.iter().find(|t| t.id == table_id)
    }

    /// Players seated across all open tables
    pub fn seated_player_count(&self) -> usize {
        self.state.tables.iter().map(Table::seated_count).sum()
    }

    /// Track a table snapshot and reconcile players against its seats.
    ///
    /// Known players get their stack refreshed and return to `Playing`
    /// (knocked out players keep their terminal status). Unknown seated
    /// players are registered. Returns the indices of new players.
    pub fn add_table(&mut self, table: Table, now: DateTime<Utc>) -> Vec<usize> {
        let mut new_indices = Vec::new();

        for seat in &table.players {
            match self.find_player_index(&seat.player_id) {
                Some(index) => {
                    let player = &mut self.state.players[index];
                    if player.is_knockout() {
                        continue;
                    }
                    player.chips = seat.chips;
                    player.status = PlayerStatus::Playing;
                    player.current_table_id = Some(table.id);
                    player.statistics.best_chips = player.statistics.best_chips.max(seat.chips);
                }
                None => {
                    let index = self.add_player(CompetitionPlayer::new(
                        seat.player_id.clone(),
                        Some(table.id),
                        seat.chips,
                        now,
                    ));
                    new_indices.push(index);
                }
            }
        }

        if !self.replace_table(table.clone()) {
            log::info!("Competition {}: table {} added", self.id, table.id);
            self.state.tables.push(table);
        }

        new_indices
    }

    /// Replace a tracked table snapshot wholesale. Returns false if untracked.
    pub fn replace_table(&mut self, table: Table) -> bool {
        match self.state.tables.iter_mut().find(|t| t.id == table.id) {
            Some(slot) => {
                *slot = table;
                true
            }
            None => false,
        }
    }

    /// Stop tracking a table
    pub fn remove_table(&mut self, table_id: TableId) -> Option<Table> {
        let index = self.state.tables.iter().position(|t| t.id == table_id)?;
        log::info!("Competition {}: table {} removed", self.id, table_id);
        Some(self.state.tables.remove(index))
    }

    /// Write a live table ranking back onto the participating players.
    ///
    /// Every seated player gets the table stack; ranks of 0 mean the player
    /// sat out the hand. Returns indices of the players touched.
    pub fn apply_table_ranking(&mut self, table: &Table, ranks: &[RankData]) -> Vec<usize> {
        let mut touched = Vec::new();

        for rank in ranks {
            let Some(index) = self.find_player_index(&rank.player_id) else {
                continue;
            };
            let player = &mut self.state.players[index];
            if player.is_knockout() {
                continue;
            }

            player.chips = rank.chips;
            player.rank = rank.rank;
            player.current_table_id = Some(table.id);
            player.statistics.best_chips = player.statistics.best_chips.max(rank.chips);
            if rank.rank > 0 {
                player.statistics.hands_played += 1;
                if player.statistics.best_rank == 0 || rank.rank < player.statistics.best_rank {
                    player.statistics.best_rank = rank.rank;
                }
            }
            touched.push(index);
        }

        touched
    }

    // === Players ===

    pub fn find_player_index(&self, player_id: &str) -> Option<usize> {
        self.state
            .players
            .iter()
            .position(|p| p.player_id == player_id)
    }

    pub fn player(&self, player_id: &str) -> Option<&CompetitionPlayer> {
        self.state.players.iter().find(|p| p.player_id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut CompetitionPlayer> {
        self.state
            .players
            .iter_mut()
            .find(|p| p.player_id == player_id)
    }

    /// Append a player, returning its index
    pub fn add_player(&mut self, player: CompetitionPlayer) -> usize {
        self.state.players.push(player);
        self.grow_rankings_if_sized();
        self.state.players.len() - 1
    }

    /// Remove a player (refund or cash leave), giving back its ranking slot
    pub fn remove_player(&mut self, index: usize) -> CompetitionPlayer {
        let player = self.state.players.remove(index);

        let rankings = &mut self.state.rankings;
        if rankings.len() > self.state.players.len() {
            let slot = rankings
                .iter()
                .position(|r| r.as_ref().is_some_and(|r| r.player_id == player.player_id))
                .or_else(|| rankings.iter().position(Option::is_none));
            if let Some(slot) = slot {
                rankings.remove(slot);
                let removed_rank = (slot + 1) as u32;
                for other in self.state.players.iter_mut().filter(|p| p.is_knockout()) {
                    if other.rank > removed_rank {
                        other.rank -= 1;
                    }
                }
            }
        }

        player
    }

    /// Players not knocked out that still hold chips
    pub fn survivor_count(&self) -> usize {
        self.state
            .players
            .iter()
            .filter(|p| !p.is_knockout() && p.chips > 0)
            .count()
    }

    // === Rankings ===

    /// Size the rankings to cover every known player.
    ///
    /// New slots are added at the front: players joining after knockouts
    /// began finish ahead of everyone already eliminated.
    pub fn grow_rankings(&mut self) {
        let added = self
            .state
            .players
            .len()
            .saturating_sub(self.state.rankings.len());
        if added == 0 {
            return;
        }

        for _ in 0..added {
            self.state.rankings.insert(0, None);
        }
        // Knocked out players slide back with their slots
        for player in self.state.players.iter_mut().filter(|p| p.is_knockout()) {
            player.rank += added as u32;
        }
    }

    fn grow_rankings_if_sized(&mut self) {
        if !self.state.rankings.is_empty() {
            self.grow_rankings();
        }
    }

    /// Eliminate a player into the last empty ranking slot.
    ///
    /// Returns the finishing rank, or `None` if the player is unknown or
    /// already knocked out.
    pub fn knockout_player(&mut self, player_id: &str) -> Option<u32> {
        let index = self.find_player_index(player_id)?;
        if self.state.players[index].is_knockout() {
            return None;
        }

        self.grow_rankings();
        let slot = self.state.rankings.iter().rposition(Option::is_none)?;
        self.state.rankings[slot] = Some(CompetitionRank {
            player_id: player_id.to_string(),
            final_chips: 0,
        });

        let rank = (slot + 1) as u32;
        let player = &mut self.state.players[index];
        player.status = PlayerStatus::Knockout;
        player.rank = rank;
        player.chips = 0;
        player.is_rebuying = false;
        player.rebuy_deadline = None;

        log::info!(
            "Competition {}: player {} knocked out in place {}",
            self.id,
            player_id,
            rank
        );

        Some(rank)
    }

    /// Place a surviving player into the first empty ranking slot
    pub fn rank_survivor(&mut self, player_id: &str, final_chips: i64) -> Option<u32> {
        let index = self.find_player_index(player_id)?;
        self.grow_rankings();
        let slot = self.state.rankings.iter().position(Option::is_none)?;
        self.state.rankings[slot] = Some(CompetitionRank {
            player_id: player_id.to_string(),
            final_chips,
        });

        let rank = (slot + 1) as u32;
        self.state.players[index].rank = rank;
        Some(rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blind::BlindOptions;
    use crate::table::{TableGameState, TablePlayer, TableStatus};
    use uuid::Uuid;

    fn setting(final_buy_in_level: Option<i32>) -> CompetitionSetting {
        let mut setting = CompetitionSetting::countdown("CT".to_string(), 3, 600);
        setting.blind = BlindOptions {
            levels: vec![
                BlindLevel::new(1, 10, 20, 60),
                BlindLevel::new(2, 20, 40, 60),
                BlindLevel::new(3, 30, 60, 60),
            ],
            initial_level: 1,
            final_buy_in_level,
        };
        setting
    }

    fn table(competition_id: CompetitionId, players: &[(&str, i64)]) -> Table {
        Table {
            id: Uuid::new_v4(),
            competition_id,
            status: TableStatus::Created,
            max_seat_count: 9,
            players: players
                .iter()
                .enumerate()
                .map(|(seat, (id, chips))| TablePlayer {
                    player_id: id.to_string(),
                    seat,
                    chips: *chips,
                    is_participated: false,
                })
                .collect(),
            game: TableGameState::default(),
            blind: BlindLevel::new(1, 10, 20, 60),
            should_close: false,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_can_start_requires_seated_players() {
        let now = Utc::now();
        let mut competition = Competition::new(Uuid::new_v4(), &setting(Some(2)), now);
        assert!(!competition.can_start(now));

        let mut t = table(competition.id, &[("a", 1000), ("b", 1000)]);
        competition.add_table(t.clone(), now);
        assert!(!competition.can_start(now));

        t.players.push(TablePlayer {
            player_id: "c".to_string(),
            seat: 2,
            chips: 1000,
            is_participated: false,
        });
        competition.add_table(t, now);
        assert_eq!(competition.state.tables.len(), 1);
        assert!(competition.can_start(now));
        assert!(competition.can_start(now), "guard is idempotent");
    }

    #[test]
    fn test_can_start_respects_scheduled_start() {
        let now = Utc::now();
        let mut s = setting(Some(2));
        s.start_at = Some(now + Duration::minutes(5));
        let mut competition = Competition::new(Uuid::new_v4(), &s, now);
        competition.add_table(table(competition.id, &[("a", 1), ("b", 1), ("c", 1)]), now);

        assert!(!competition.can_start(now));
        assert!(competition.can_start(now + Duration::minutes(6)));
    }

    #[test]
    fn test_start_with_final_buy_in_level() {
        let now = Utc::now();
        let mut competition = Competition::new(Uuid::new_v4(), &setting(Some(2)), now);
        competition.start(now).unwrap();

        assert_eq!(competition.state.status, CompetitionStatus::DelayedBuyIn);
        assert_eq!(competition.state.start_at, Some(now));
        assert_eq!(competition.state.end_at, Some(now + Duration::seconds(600)));
        assert!(competition.state.rankings.is_empty());
        assert!(!competition.can_start(now));
    }

    #[test]
    fn test_start_without_final_buy_in_level() {
        let now = Utc::now();
        let mut competition = Competition::new(Uuid::new_v4(), &setting(None), now);
        competition.add_table(table(competition.id, &[("a", 1), ("b", 1)]), now);
        competition.start(now).unwrap();

        assert_eq!(competition.state.status, CompetitionStatus::StoppedBuyIn);
        assert_eq!(competition.state.rankings, vec![None, None]);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let now = Utc::now();
        let mut competition = Competition::new(Uuid::new_v4(), &setting(Some(2)), now);
        competition.start(now).unwrap();
        let err = competition.start(now).unwrap_err();
        assert!(matches!(err, CompetitionError::InvalidStatus { .. }));
    }

    #[test]
    fn test_add_table_reconciles_players() {
        let now = Utc::now();
        let mut competition = Competition::new(Uuid::new_v4(), &setting(Some(2)), now);
        competition.add_player(CompetitionPlayer::new("a", None, 500, now));
        competition.state.players[0].status = PlayerStatus::WaitingTableBalancing;

        let t = table(competition.id, &[("a", 800), ("b", 1000)]);
        let table_id = t.id;
        let new_indices = competition.add_table(t, now);

        assert_eq!(new_indices, vec![1]);
        let a = competition.player("a").unwrap();
        assert_eq!(a.chips, 800);
        assert_eq!(a.status, PlayerStatus::Playing);
        assert_eq!(a.current_table_id, Some(table_id));
        assert_eq!(competition.player("b").unwrap().chips, 1000);
        assert_eq!(competition.state.tables.len(), 1);

        assert!(competition.remove_table(table_id).is_some());
        assert!(competition.state.tables.is_empty());
    }

    #[test]
    fn test_knockout_fills_rankings_from_the_tail() {
        let now = Utc::now();
        let mut competition = Competition::new(Uuid::new_v4(), &setting(Some(2)), now);
        for id in ["a", "b", "c"] {
            competition.add_player(CompetitionPlayer::new(id, None, 100, now));
        }

        assert_eq!(competition.knockout_player("c"), Some(3));
        assert_eq!(competition.knockout_player("c"), None);
        assert_eq!(competition.knockout_player("b"), Some(2));
        assert_eq!(competition.rank_survivor("a", 300), Some(1));

        let ranked: Vec<_> = competition
            .state
            .rankings
            .iter()
            .map(|r| r.as_ref().unwrap().player_id.as_str())
            .collect();
        assert_eq!(ranked, vec!["a", "b", "c"]);
        assert_eq!(competition.player("c").unwrap().status, PlayerStatus::Knockout);
    }

    #[test]
    fn test_late_joiner_gets_front_slot() {
        let now = Utc::now();
        let mut competition = Competition::new(Uuid::new_v4(), &setting(Some(2)), now);
        competition.add_player(CompetitionPlayer::new("a", None, 100, now));
        competition.add_player(CompetitionPlayer::new("b", None, 100, now));
        assert_eq!(competition.knockout_player("b"), Some(2));

        competition.add_player(CompetitionPlayer::new("c", None, 100, now));
        assert_eq!(competition.state.rankings.len(), 3);
        assert_eq!(
            competition.state.rankings[2].as_ref().unwrap().player_id,
            "b"
        );
        assert_eq!(competition.player("b").unwrap().rank, 3);

        // A refund gives the newest slot back
        let index = competition.find_player_index("c").unwrap();
        competition.remove_player(index);
        assert_eq!(competition.state.rankings.len(), 2);
        assert_eq!(competition.player("b").unwrap().rank, 2);
    }

    #[test]
    fn test_close_marks_end() {
        let now = Utc::now();
        let mut competition = Competition::new(Uuid::new_v4(), &setting(Some(2)), now);
        competition.close(now);
        assert_eq!(competition.state.status, CompetitionStatus::End);
        // end time only stamped for MTT
        assert_eq!(competition.state.end_at, None);
    }

    #[test]
    fn test_mark_updated_bumps_serial() {
        let now = Utc::now();
        let mut competition = Competition::new(Uuid::new_v4(), &setting(Some(2)), now);
        competition.mark_updated(now);
        competition.mark_updated(now);
        assert_eq!(competition.update_serial, 2);
    }
}
