//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use mtt_orchestrator::cache::InMemoryPlayerCache;
use mtt_orchestrator::repository::InMemoryCompetitionRepository;
use mtt_orchestrator::table::{
    JoinPlayer, Table, TableEngine, TableEngineError, TableEngineErrorKind, TableEngineResult,
    TableGameState, TableId, TablePlayer, TableSetting, TableStatus,
};
use mtt_orchestrator::{
    BlindLevel, Competition, CompetitionEvent, CompetitionManager, OrchestratorConfig, PlayerId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Commands received by the fake engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    CreateTable(TableId),
    StartTableGame(TableId),
    CloseTable(TableId),
    BalanceTable(TableId),
    PlayersLeave(TableId, Vec<PlayerId>),
    PlayerJoin(TableId, PlayerId, i64),
    RedeemChips(TableId, PlayerId, i64),
    TableGameOpen(TableId),
    UpdateBlind(TableId, i32),
}

/// In-memory table engine recording every command
#[derive(Default)]
pub struct FakeTableEngine {
    tables: Mutex<HashMap<TableId, Table>>,
    commands: Mutex<Vec<EngineCommand>>,
    reject_joins: AtomicBool,
}

impl FakeTableEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn commands(&self) -> Vec<EngineCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&EngineCommand) -> bool) -> usize {
        self.commands().iter().filter(|c| predicate(c)).count()
    }

    pub fn reject_joins(&self, reject: bool) {
        self.reject_joins.store(reject, Ordering::SeqCst);
    }

    pub fn table(&self, table_id: TableId) -> Option<Table> {
        self.tables.lock().unwrap().get(&table_id).cloned()
    }

    /// Finish a hand: set stacks and return the settled snapshot
    pub fn settle(&self, table_id: TableId, stacks: &[(&str, i64)]) -> Table {
        let mut tables = self.tables.lock().unwrap();
        let table = tables.get_mut(&table_id).unwrap();
        for (player_id, chips) in stacks {
            if let Some(p) = table.players.iter_mut().find(|p| p.player_id == *player_id) {
                p.chips = *chips;
            }
        }
        for p in table.players.iter_mut() {
            p.is_participated = true;
        }
        table.status = TableStatus::GameSettled;
        table.game.hand_count += 1;
        table.updated_at = Utc::now();
        table.clone()
    }

    /// Seat a player the orchestrator has never seen
    pub fn seat_guest(&self, table_id: TableId, player_id: &str, chips: i64) {
        let mut tables = self.tables.lock().unwrap();
        let table = tables.get_mut(&table_id).unwrap();
        let seat = free_seat(table).unwrap();
        table.players.push(TablePlayer {
            player_id: player_id.to_string(),
            seat,
            chips,
            is_participated: false,
        });
    }

    /// Close a table and return the closed snapshot
    pub fn close(&self, table_id: TableId) -> Table {
        let mut tables = self.tables.lock().unwrap();
        let table = tables.get_mut(&table_id).unwrap();
        table.status = TableStatus::Closed;
        table.updated_at = Utc::now();
        table.clone()
    }

    fn record(&self, command: EngineCommand) {
        self.commands.lock().unwrap().push(command);
    }

    fn with_table<T>(
        &self,
        table_id: TableId,
        f: impl FnOnce(&mut Table) -> T,
    ) -> TableEngineResult<T> {
        let mut tables = self.tables.lock().unwrap();
        let table = tables
            .get_mut(&table_id)
            .ok_or_else(|| TableEngineError::table_not_found(table_id))?;
        Ok(f(table))
    }
}

fn free_seat(table: &Table) -> Option<usize> {
    table.occupancy().iter().position(|taken| !*taken)
}

#[async_trait]
impl TableEngine for FakeTableEngine {
    async fn create_table(&self, setting: TableSetting) -> TableEngineResult<Table> {
        let mut table = Table {
            id: Uuid::new_v4(),
            competition_id: setting.competition_id,
            status: TableStatus::Created,
            max_seat_count: setting.max_seat_count,
            players: Vec::new(),
            game: TableGameState::default(),
            blind: setting.blind.clone(),
            should_close: false,
            updated_at: Utc::now(),
        };
        for player in setting.players {
            let seat = free_seat(&table).unwrap();
            table.players.push(TablePlayer {
                player_id: player.player_id,
                seat,
                chips: player.redeem_chips,
                is_participated: false,
            });
        }

        self.record(EngineCommand::CreateTable(table.id));
        self.tables.lock().unwrap().insert(table.id, table.clone());
        Ok(table)
    }

    async fn start_table_game(&self, table_id: TableId) -> TableEngineResult<()> {
        self.record(EngineCommand::StartTableGame(table_id));
        self.with_table(table_id, |t| t.status = TableStatus::GameOpened)
    }

    async fn close_table(&self, table_id: TableId) -> TableEngineResult<()> {
        self.record(EngineCommand::CloseTable(table_id));
        self.with_table(table_id, |t| t.status = TableStatus::Closed)
    }

    async fn balance_table(&self, table_id: TableId) -> TableEngineResult<()> {
        self.record(EngineCommand::BalanceTable(table_id));
        self.with_table(table_id, |t| t.status = TableStatus::Pausing)
    }

    async fn players_leave(
        &self,
        table_id: TableId,
        player_ids: &[PlayerId],
    ) -> TableEngineResult<()> {
        self.record(EngineCommand::PlayersLeave(table_id, player_ids.to_vec()));
        self.with_table(table_id, |t| {
            t.players.retain(|p| !player_ids.contains(&p.player_id))
        })
    }

    async fn player_join(&self, table_id: TableId, player: JoinPlayer) -> TableEngineResult<Table> {
        if self.reject_joins.load(Ordering::SeqCst) {
            return Err(TableEngineError::new(
                TableEngineErrorKind::Rejected,
                "joins disabled",
            ));
        }
        self.record(EngineCommand::PlayerJoin(
            table_id,
            player.player_id.clone(),
            player.redeem_chips,
        ));
        self.with_table(table_id, |t| {
            let seat = player.seat.or_else(|| free_seat(t)).unwrap_or(0);
            t.players.push(TablePlayer {
                player_id: player.player_id,
                seat,
                chips: player.redeem_chips,
                is_participated: false,
            });
            t.clone()
        })
    }

    async fn player_redeem_chips(
        &self,
        table_id: TableId,
        player_id: &str,
        chips: i64,
    ) -> TableEngineResult<()> {
        self.record(EngineCommand::RedeemChips(
            table_id,
            player_id.to_string(),
            chips,
        ));
        self.with_table(table_id, |t| {
            if let Some(p) = t.players.iter_mut().find(|p| p.player_id == player_id) {
                p.chips += chips;
            }
        })
    }

    async fn table_game_open(&self, table_id: TableId) -> TableEngineResult<()> {
        self.record(EngineCommand::TableGameOpen(table_id));
        self.with_table(table_id, |t| t.status = TableStatus::GameOpened)
    }

    async fn update_blind(&self, table_id: TableId, level: &BlindLevel) -> TableEngineResult<()> {
        self.record(EngineCommand::UpdateBlind(table_id, level.level));
        self.with_table(table_id, |t| t.blind = level.clone())
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn manager(engine: &Arc<FakeTableEngine>) -> CompetitionManager {
    init_logger();
    CompetitionManager::new(OrchestratorConfig::default(), engine.clone())
}

/// Manager whose player cache stays observable from the test
pub fn manager_with_cache(
    engine: &Arc<FakeTableEngine>,
) -> (CompetitionManager, Arc<InMemoryPlayerCache>) {
    init_logger();
    let cache = Arc::new(InMemoryPlayerCache::new());
    let manager = CompetitionManager::with_repositories(
        OrchestratorConfig::default(),
        engine.clone(),
        Arc::new(InMemoryCompetitionRepository::new()),
        cache.clone(),
    );
    (manager, cache)
}

/// Wait for the next competition snapshot on an `Updated` subscription
pub async fn next_update(events: &mut mpsc::Receiver<CompetitionEvent>) -> Competition {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for an update")
            .expect("event bus closed");
        if let CompetitionEvent::Updated { competition } = event {
            return *competition;
        }
    }
}
