//! The single writer of every competition.
//!
//! One worker drains the request queue. Each request loads a competition,
//! applies one action to a copy and commits it, so requests are applied in
//! submission order and a rejected request leaves the stored competition
//! untouched.

use super::messages::{Request, RequestAction};
use super::timers::{DeferredTask, TimerRegistry};
use crate::cache::{PlayerCache, PlayerCacheRepository};
use crate::competition::{
    Competition, CompetitionId, CompetitionMode, CompetitionPlayer, CompetitionSetting,
    CompetitionStatus, PlayerId,
};
use crate::config::OrchestratorConfig;
use crate::errors::{CompetitionError, CompetitionResult};
use crate::events::{CompetitionEvent, EventBus};
use crate::regulator::SeatBalancer;
use crate::repository::CompetitionRepository;
use crate::table::{JoinPlayer, TableEngine, TableId};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Request processor draining the request queue
pub struct ProcessorWorker {
    /// Request inbox
    inbox: mpsc::Receiver<Request>,

    /// Used by timers to feed requests back into the inbox
    pub(crate) sender: mpsc::WeakSender<Request>,

    pub(crate) repository: Arc<dyn CompetitionRepository>,

    pub(crate) cache: Arc<dyn PlayerCacheRepository>,

    /// External table engine
    pub(crate) engine: Arc<dyn TableEngine>,

    pub(crate) events: Arc<EventBus>,

    /// Seat balancer for multi-table competitions
    pub(crate) balancer: SeatBalancer,

    /// Blind and re-buy timers
    pub(crate) timers: TimerRegistry,

    pub(crate) config: OrchestratorConfig,
}

impl ProcessorWorker {
    pub fn new(
        inbox: mpsc::Receiver<Request>,
        sender: mpsc::WeakSender<Request>,
        repository: Arc<dyn CompetitionRepository>,
        cache: Arc<dyn PlayerCacheRepository>,
        engine: Arc<dyn TableEngine>,
        events: Arc<EventBus>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            inbox,
            sender,
            repository,
            cache,
            engine,
            events,
            balancer: SeatBalancer::new(),
            timers: TimerRegistry::new(),
            config,
        }
    }

    /// Run the worker until every sender is dropped
    pub async fn run(mut self) {
        log::info!("Request processor starting");

        while let Some(request) = self.inbox.recv().await {
            self.process(request).await;
        }

        log::info!("Request processor stopped");
    }

    /// Apply one request and answer its responder
    pub(crate) async fn process(&mut self, request: Request) {
        let Request {
            competition_id,
            action,
            responder,
        } = request;
        let name = action.name();

        let result = self.handle(competition_id, action).await;

        if let Err(e) = &result {
            log::warn!("Competition {}: {} rejected: {}", competition_id, name, e);
            self.events.error(Some(competition_id), e.clone()).await;
        }

        if let Some(responder) = responder {
            let _ = responder.send(result);
        }
    }

    async fn handle(
        &mut self,
        competition_id: CompetitionId,
        action: RequestAction,
    ) -> CompetitionResult<Competition> {
        match action {
            RequestAction::CreateCompetition { setting } => {
                self.handle_create(competition_id, *setting).await
            }
            RequestAction::StartCompetition => self.handle_start(competition_id).await,
            RequestAction::CloseCompetition => self.handle_close(competition_id).await,
            RequestAction::RemoveCompetition => self.handle_remove(competition_id).await,
            RequestAction::PlayerJoin { table_id, player } => {
                self.handle_join(competition_id, table_id, player).await
            }
            RequestAction::PlayerAddon { table_id, player } => {
                self.handle_addon(competition_id, table_id, player).await
            }
            RequestAction::PlayerRefund { player_id } => {
                self.handle_refund(competition_id, player_id).await
            }
            RequestAction::PlayerLeave {
                table_id,
                player_id,
            } => self.handle_leave(competition_id, table_id, player_id).await,
            RequestAction::TableUpdated { table } => {
                self.handle_table_updated(competition_id, *table).await
            }
            RequestAction::BlindLevelElapsed {
                level_index,
                end_at,
            } => {
                self.handle_blind_elapsed(competition_id, level_index, end_at)
                    .await
            }
            RequestAction::ReBuyDeadline {
                player_id,
                deadline,
            } => {
                self.handle_rebuy_deadline(competition_id, player_id, deadline)
                    .await
            }
        }
    }

    // === Shared helpers ===

    pub(crate) async fn load(&self, competition_id: CompetitionId) -> CompetitionResult<Competition> {
        self.repository
            .get(competition_id)
            .await
            .ok_or(CompetitionError::CompetitionNotFound(competition_id))
    }

    /// Store a mutated competition and publish it
    pub(crate) async fn commit(&self, mut competition: Competition) -> Competition {
        competition.mark_updated(Utc::now());
        self.repository.save(competition.clone()).await;
        self.events.updated(&competition).await;
        competition
    }

    /// Report a failure that does not reject the current request
    pub(crate) async fn report(
        &self,
        competition_id: CompetitionId,
        error: impl Into<CompetitionError>,
    ) {
        let error = error.into();
        log::error!("Competition {}: {}", competition_id, error);
        self.events.error(Some(competition_id), error).await;
    }

    pub(crate) async fn publish_player(&self, competition: &Competition, index: usize) {
        if let Some(player) = competition.state.players.get(index) {
            self.events
                .publish(CompetitionEvent::PlayerUpdated {
                    competition_id: competition.id,
                    player: player.clone(),
                })
                .await;
        }
    }

    /// Enqueue `action` for this competition once `deadline` passes
    pub(crate) fn defer(
        &self,
        competition_id: CompetitionId,
        deadline: DateTime<Utc>,
        action: RequestAction,
    ) -> DeferredTask {
        DeferredTask::schedule(
            self.sender.clone(),
            deadline,
            Request::internal(competition_id, action),
        )
    }

    /// Start a competition: blind clock, level timers and table games
    pub(crate) async fn begin(&mut self, competition: &mut Competition) -> CompetitionResult<()> {
        competition.start(Utc::now())?;

        for (level_index, end_at) in competition.state.blind.pending_deadlines() {
            let task = self.defer(
                competition.id,
                end_at,
                RequestAction::BlindLevelElapsed {
                    level_index,
                    end_at,
                },
            );
            self.timers.schedule_blind(competition.id, task);
        }

        let table_ids: Vec<TableId> = competition.state.tables.iter().map(|t| t.id).collect();
        for table_id in table_ids {
            if let Err(e) = self.engine.start_table_game(table_id).await {
                self.report(competition.id, e).await;
            }
        }

        Ok(())
    }

    pub(crate) async fn insert_cache(&self, competition: &Competition, index: usize) {
        if let Some(player) = competition.state.players.get(index) {
            self.cache
                .insert(PlayerCache {
                    competition_id: competition.id,
                    player_id: player.player_id.clone(),
                    joined_at: player.joined_at,
                    rebuy_times: player.rebuy_times,
                    player_index: index,
                    table_id: player.current_table_id,
                })
                .await;
        }
    }

    /// Drop a player and its cache entry, keeping cached indexes in line
    async fn forget_player(&mut self, competition: &mut Competition, index: usize) {
        let player = competition.remove_player(index);
        self.cache.remove(competition.id, &player.player_id).await;
        let remaining: Vec<PlayerId> = competition
            .state
            .players
            .iter()
            .map(|p| p.player_id.clone())
            .collect();
        self.cache.reindex(competition.id, &remaining).await;
        self.balancer.remove_waiting(competition.id, &player.player_id);
    }

    // === Lifecycle ===

    async fn handle_create(
        &mut self,
        competition_id: CompetitionId,
        mut setting: CompetitionSetting,
    ) -> CompetitionResult<Competition> {
        if self.repository.contains(competition_id).await {
            return Err(CompetitionError::InvalidSetting(format!(
                "Competition {competition_id} already exists"
            )));
        }

        setting.validate()?;
        if setting.action_time_secs == 0 {
            setting.action_time_secs = self.config.default_action_time_secs;
        }
        if setting.rebuy.waiting_time_secs == 0 {
            setting.rebuy.waiting_time_secs = self.config.default_rebuy_waiting_secs;
        }

        let now = Utc::now();
        let mut competition = Competition::new(competition_id, &setting, now);

        match setting.mode {
            CompetitionMode::Ct | CompetitionMode::Cash => {
                let table = self
                    .engine
                    .create_table(competition.table_setting(Vec::new()))
                    .await?;
                for index in competition.add_table(table, now) {
                    self.insert_cache(&competition, index).await;
                }
            }
            CompetitionMode::Mtt => {
                self.balancer.register(
                    competition_id,
                    setting.table.max_seat_count,
                    setting.table.min_player_count,
                );
            }
        }

        log::info!(
            "Competition {} '{}' created ({:?})",
            competition_id,
            setting.name,
            setting.mode
        );

        Ok(self.commit(competition).await)
    }

    async fn handle_start(&mut self, competition_id: CompetitionId) -> CompetitionResult<Competition> {
        let mut competition = self.load(competition_id).await?;

        if competition.state.status != CompetitionStatus::Registering {
            return Err(CompetitionError::InvalidStatus {
                action: "start",
                status: competition.state.status,
            });
        }

        let current = competition.state.players.len();
        if current < competition.meta.min_player_count {
            return Err(CompetitionError::InsufficientPlayers {
                needed: competition.meta.min_player_count,
                current,
            });
        }

        self.begin(&mut competition).await?;
        Ok(self.commit(competition).await)
    }

    async fn handle_close(&mut self, competition_id: CompetitionId) -> CompetitionResult<Competition> {
        let mut competition = self.load(competition_id).await?;

        if competition.state.status == CompetitionStatus::End {
            return Err(CompetitionError::InvalidStatus {
                action: "close",
                status: competition.state.status,
            });
        }

        let table_ids: Vec<TableId> = competition.state.tables.iter().map(|t| t.id).collect();
        for table_id in table_ids {
            if let Err(e) = self.engine.close_table(table_id).await {
                self.report(competition_id, e).await;
            }
        }

        self.settle_competition(&mut competition).await;
        Ok(self.commit(competition).await)
    }

    async fn handle_remove(&mut self, competition_id: CompetitionId) -> CompetitionResult<Competition> {
        let competition = self.load(competition_id).await?;

        if competition.state.status != CompetitionStatus::End {
            return Err(CompetitionError::InvalidStatus {
                action: "remove",
                status: competition.state.status,
            });
        }

        self.repository
            .delete(competition_id)
            .await
            .ok_or(CompetitionError::CompetitionNotFound(competition_id))?;
        log::info!("Competition {} removed", competition_id);
        Ok(competition)
    }

    // === Player requests ===

    async fn handle_join(
        &mut self,
        competition_id: CompetitionId,
        table_id: Option<TableId>,
        player: JoinPlayer,
    ) -> CompetitionResult<Competition> {
        if player.redeem_chips <= 0 {
            return Err(CompetitionError::NoRedeemChips);
        }

        let mut competition = self.load(competition_id).await?;
        let status = competition.state.status;
        if !status.is_buy_in_open() {
            return Err(CompetitionError::InvalidStatus {
                action: "join",
                status,
            });
        }
        if status.is_started() && competition.state.blind.is_stopped_buy_in() {
            return Err(CompetitionError::BuyInClosed);
        }

        match competition.find_player_index(&player.player_id) {
            Some(index) => self.rebuy(&mut competition, index, player).await?,
            None => self.buy_in(&mut competition, table_id, player).await?,
        }

        Ok(self.commit(competition).await)
    }

    async fn rebuy(
        &mut self,
        competition: &mut Competition,
        index: usize,
        join: JoinPlayer,
    ) -> CompetitionResult<()> {
        let player = &competition.state.players[index];
        if player.is_knockout() {
            return Err(CompetitionError::PlayerKnockedOut(join.player_id));
        }

        let rebuy_times = self
            .cache
            .get(competition.id, &join.player_id)
            .await
            .map_or(player.rebuy_times, |entry| entry.rebuy_times);
        let max = competition.meta.rebuy.max_times;
        if rebuy_times >= max {
            return Err(CompetitionError::ReBuyLimitExceeded { max });
        }

        if let Some(table_id) = player.current_table_id {
            self.engine
                .player_redeem_chips(table_id, &join.player_id, join.redeem_chips)
                .await?;
        }

        let player = &mut competition.state.players[index];
        player.chips += join.redeem_chips;
        player.rebuy_times = rebuy_times + 1;
        player.total_redeem_chips += join.redeem_chips;
        player.is_rebuying = false;
        player.rebuy_deadline = None;
        player.statistics.best_chips = player.statistics.best_chips.max(player.chips);
        let waiting_for_seat = player.current_table_id.is_none();

        self.cache.record_rebuy(competition.id, &join.player_id).await;
        self.timers.cancel_rebuy(competition.id, &join.player_id);

        log::info!(
            "Competition {}: player {} re-bought {} chips ({}/{})",
            competition.id,
            join.player_id,
            join.redeem_chips,
            rebuy_times + 1,
            max
        );

        if competition.meta.mode == CompetitionMode::Mtt && waiting_for_seat {
            self.balancer.join_waiting(competition.id, &join.player_id);
            self.place_waiting_players(competition).await;
        }

        Ok(())
    }

    async fn buy_in(
        &mut self,
        competition: &mut Competition,
        table_id: Option<TableId>,
        join: JoinPlayer,
    ) -> CompetitionResult<()> {
        let max = competition.meta.max_player_count;
        if competition.state.players.len() >= max {
            return Err(CompetitionError::CompetitionFull { max });
        }

        let now = Utc::now();
        if competition
            .state
            .disable_at
            .is_some_and(|disable_at| now >= disable_at)
        {
            return Err(CompetitionError::BuyInClosed);
        }
        let player_id = join.player_id.clone();

        match competition.meta.mode {
            CompetitionMode::Ct | CompetitionMode::Cash => {
                let table_id = match table_id {
                    Some(id) if competition.has_table(id) => id,
                    Some(id) => return Err(CompetitionError::TableNotFound(id)),
                    None => competition
                        .state
                        .tables
                        .first()
                        .map(|t| t.id)
                        .ok_or(CompetitionError::TableNotFound(Uuid::nil()))?,
                };

                let index = competition.add_player(CompetitionPlayer::new(
                    player_id.clone(),
                    Some(table_id),
                    join.redeem_chips,
                    now,
                ));
                let table = self.engine.player_join(table_id, join).await?;
                self.insert_cache(competition, index).await;
                for index in competition.add_table(table, now) {
                    self.insert_cache(competition, index).await;
                }

                log::info!(
                    "Competition {}: player {} bought in at table {}",
                    competition.id,
                    player_id,
                    table_id
                );

                if competition.meta.mode == CompetitionMode::Ct && competition.can_start(now) {
                    self.begin(competition).await?;
                }
            }
            CompetitionMode::Mtt => {
                let index = competition.add_player(CompetitionPlayer::new(
                    player_id.clone(),
                    None,
                    join.redeem_chips,
                    now,
                ));
                self.insert_cache(competition, index).await;
                self.balancer.join_waiting(competition.id, &player_id);

                log::info!(
                    "Competition {}: player {} bought in, awaiting a seat",
                    competition.id,
                    player_id
                );

                self.place_waiting_players(competition).await;
            }
        }

        Ok(())
    }

    async fn handle_addon(
        &mut self,
        competition_id: CompetitionId,
        table_id: Option<TableId>,
        join: JoinPlayer,
    ) -> CompetitionResult<Competition> {
        let mut competition = self.load(competition_id).await?;

        let index = competition
            .find_player_index(&join.player_id)
            .ok_or_else(|| CompetitionError::PlayerNotFound(join.player_id.clone()))?;
        if join.redeem_chips <= 0 {
            return Err(CompetitionError::NoRedeemChips);
        }
        if competition.state.status == CompetitionStatus::End {
            return Err(CompetitionError::InvalidStatus {
                action: "addon",
                status: competition.state.status,
            });
        }

        let player = &competition.state.players[index];
        if player.is_knockout() {
            return Err(CompetitionError::PlayerKnockedOut(join.player_id));
        }
        let max = competition.meta.addon.max_times;
        if player.addon_times >= max {
            return Err(CompetitionError::AddonLimitExceeded { max });
        }

        if let Some(table_id) = table_id.or(player.current_table_id) {
            self.engine
                .player_redeem_chips(table_id, &join.player_id, join.redeem_chips)
                .await?;
        }

        let player = &mut competition.state.players[index];
        player.chips += join.redeem_chips;
        player.addon_times += 1;
        player.total_redeem_chips += join.redeem_chips;
        player.statistics.best_chips = player.statistics.best_chips.max(player.chips);

        log::info!(
            "Competition {}: player {} added {} chips",
            competition_id,
            join.player_id,
            join.redeem_chips
        );

        Ok(self.commit(competition).await)
    }

    async fn handle_refund(
        &mut self,
        competition_id: CompetitionId,
        player_id: PlayerId,
    ) -> CompetitionResult<Competition> {
        let mut competition = self.load(competition_id).await?;

        if competition.state.status != CompetitionStatus::Registering {
            return Err(CompetitionError::InvalidStatus {
                action: "refund",
                status: competition.state.status,
            });
        }

        let index = competition
            .find_player_index(&player_id)
            .ok_or_else(|| CompetitionError::PlayerNotFound(player_id.clone()))?;

        if let Some(table_id) = competition.state.players[index].current_table_id {
            self.unseat(&mut competition, table_id, &player_id).await?;
        }

        self.forget_player(&mut competition, index).await;
        log::info!("Competition {}: player {} refunded", competition_id, player_id);

        Ok(self.commit(competition).await)
    }

    async fn handle_leave(
        &mut self,
        competition_id: CompetitionId,
        table_id: Option<TableId>,
        player_id: PlayerId,
    ) -> CompetitionResult<Competition> {
        let mut competition = self.load(competition_id).await?;

        if competition.meta.mode != CompetitionMode::Cash {
            return Err(CompetitionError::ModeNotSupported {
                action: "leave",
                mode: competition.meta.mode,
            });
        }

        let index = competition
            .find_player_index(&player_id)
            .ok_or_else(|| CompetitionError::PlayerNotFound(player_id.clone()))?;

        if let Some(table_id) = table_id.or(competition.state.players[index].current_table_id) {
            self.unseat(&mut competition, table_id, &player_id).await?;
        }

        self.forget_player(&mut competition, index).await;
        log::info!("Competition {}: player {} left", competition_id, player_id);

        Ok(self.commit(competition).await)
    }

    /// Remove a player from a table through the engine and from our snapshot
    async fn unseat(
        &mut self,
        competition: &mut Competition,
        table_id: TableId,
        player_id: &str,
    ) -> CompetitionResult<()> {
        self.engine
            .players_leave(table_id, &[player_id.to_string()])
            .await?;

        if let Some(mut table) = competition.table(table_id).cloned() {
            table.players.retain(|p| p.player_id != player_id);
            if competition.meta.mode == CompetitionMode::Mtt {
                self.balancer.track_table(competition.id, &table);
            }
            competition.replace_table(table);
        }

        Ok(())
    }

    // === Timers ===

    async fn handle_blind_elapsed(
        &mut self,
        competition_id: CompetitionId,
        level_index: usize,
        end_at: DateTime<Utc>,
    ) -> CompetitionResult<Competition> {
        let mut competition = self.load(competition_id).await?;
        if !competition.state.status.is_started() {
            return Ok(competition);
        }

        let Some(current) = competition.state.blind.advance(end_at) else {
            log::debug!(
                "Competition {}: blind level {} already passed",
                competition_id,
                level_index
            );
            return Ok(competition);
        };

        let Some(level) = competition.state.blind.levels.get(current).cloned() else {
            return Ok(competition);
        };
        log::info!(
            "Competition {}: blind level advanced to {} ({}/{})",
            competition_id,
            level.level,
            level.small_blind,
            level.big_blind
        );

        let table_ids: Vec<TableId> = competition.state.tables.iter().map(|t| t.id).collect();
        for table_id in table_ids {
            if let Err(e) = self.engine.update_blind(table_id, &level).await {
                self.report(competition_id, e).await;
            }
        }

        if competition.state.status == CompetitionStatus::DelayedBuyIn
            && competition.state.blind.is_stopped_buy_in()
        {
            competition.state.status = CompetitionStatus::StoppedBuyIn;
            competition.grow_rankings();
            log::info!("Competition {}: buy-in window closed", competition_id);
        }

        Ok(self.commit(competition).await)
    }

    async fn handle_rebuy_deadline(
        &mut self,
        competition_id: CompetitionId,
        player_id: PlayerId,
        deadline: DateTime<Utc>,
    ) -> CompetitionResult<Competition> {
        let mut competition = self.load(competition_id).await?;
        if competition.state.status == CompetitionStatus::End {
            return Ok(competition);
        }

        let Some(index) = competition.find_player_index(&player_id) else {
            return Ok(competition);
        };
        let player = &competition.state.players[index];
        if !player.is_rebuying || player.rebuy_deadline != Some(deadline) || player.chips > 0 {
            return Ok(competition);
        }
        let table_id = player.current_table_id;

        self.timers.cancel_rebuy(competition_id, &player_id);
        if competition.knockout_player(&player_id).is_none() {
            return Ok(competition);
        }
        self.cache.set_table(competition_id, &player_id, None).await;

        if let Some(table_id) = table_id {
            if let Err(e) = self
                .engine
                .players_leave(table_id, std::slice::from_ref(&player_id))
                .await
            {
                self.report(competition_id, e).await;
            }
            if let Some(mut table) = competition.table(table_id).cloned() {
                table.players.retain(|p| p.player_id != player_id);
                competition.replace_table(table);
            }
        }
        self.balancer.remove_waiting(competition_id, &player_id);

        log::info!(
            "Competition {}: player {} missed the re-buy deadline",
            competition_id,
            player_id
        );
        self.publish_player(&competition, index).await;

        Ok(self.commit(competition).await)
    }
}
