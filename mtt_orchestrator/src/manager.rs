//! Public entry point of the orchestrator.

use crate::cache::{InMemoryPlayerCache, PlayerCacheRepository};
use crate::competition::{Competition, CompetitionId, CompetitionSetting, PlayerId};
use crate::config::OrchestratorConfig;
use crate::dispatcher::TableEventDispatcher;
use crate::errors::{CompetitionError, CompetitionResult};
use crate::events::{CompetitionEvent, EventBus, EventTopic};
use crate::processor::{ProcessorWorker, Request, RequestAction, RequestTicket};
use crate::repository::{CompetitionRepository, InMemoryCompetitionRepository};
use crate::table::{JoinPlayer, TableEngine, TableId};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Competition manager.
///
/// Owns the request queue and spawns the worker that drains it. Player
/// requests fail fast for unknown competitions and are rejected with
/// [`CompetitionError::QueueFull`] when the queue is at capacity.
pub struct CompetitionManager {
    /// Request queue
    sender: mpsc::Sender<Request>,

    /// Competition storage, read directly for queries
    repository: Arc<dyn CompetitionRepository>,

    events: Arc<EventBus>,
}

impl CompetitionManager {
    /// Create a manager with in-memory storage.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: OrchestratorConfig, engine: Arc<dyn TableEngine>) -> Self {
        Self::with_repositories(
            config,
            engine,
            Arc::new(InMemoryCompetitionRepository::new()),
            Arc::new(InMemoryPlayerCache::new()),
        )
    }

    /// Create a manager over the given storage
    pub fn with_repositories(
        config: OrchestratorConfig,
        engine: Arc<dyn TableEngine>,
        repository: Arc<dyn CompetitionRepository>,
        cache: Arc<dyn PlayerCacheRepository>,
    ) -> Self {
        let (sender, inbox) = mpsc::channel(config.request_queue_capacity.max(1));
        let events = Arc::new(EventBus::new(config.event_buffer));

        let worker = ProcessorWorker::new(
            inbox,
            sender.downgrade(),
            Arc::clone(&repository),
            cache,
            engine,
            Arc::clone(&events),
            config,
        );
        tokio::spawn(worker.run());

        Self {
            sender,
            repository,
            events,
        }
    }

    /// Create a competition and wait until it is stored
    pub async fn create_competition(
        &self,
        setting: CompetitionSetting,
    ) -> CompetitionResult<Competition> {
        let (request, ticket) = Request::new(
            Uuid::new_v4(),
            RequestAction::CreateCompetition {
                setting: Box::new(setting),
            },
        );
        self.submit(request).await?;
        ticket.wait().await
    }

    /// Start a registering competition
    pub async fn start_competition(&self, competition_id: CompetitionId) -> CompetitionResult<RequestTicket> {
        self.enqueue(competition_id, RequestAction::StartCompetition)
            .await
    }

    /// Close a competition and settle its final rankings
    pub async fn close_competition(&self, competition_id: CompetitionId) -> CompetitionResult<RequestTicket> {
        self.enqueue(competition_id, RequestAction::CloseCompetition)
            .await
    }

    /// Drop an ended competition, returning its final snapshot
    pub async fn remove_competition(&self, competition_id: CompetitionId) -> CompetitionResult<RequestTicket> {
        self.enqueue(competition_id, RequestAction::RemoveCompetition)
            .await
    }

    /// Buy in, or re-buy when the player is already registered
    pub async fn player_join(
        &self,
        competition_id: CompetitionId,
        table_id: Option<TableId>,
        player: JoinPlayer,
    ) -> CompetitionResult<RequestTicket> {
        self.enqueue(competition_id, RequestAction::PlayerJoin { table_id, player })
            .await
    }

    /// Add chips to a registered player
    pub async fn player_addon(
        &self,
        competition_id: CompetitionId,
        table_id: Option<TableId>,
        player: JoinPlayer,
    ) -> CompetitionResult<RequestTicket> {
        self.enqueue(competition_id, RequestAction::PlayerAddon { table_id, player })
            .await
    }

    /// Withdraw a player before the competition starts
    pub async fn player_refund(
        &self,
        competition_id: CompetitionId,
        player_id: impl Into<PlayerId>,
    ) -> CompetitionResult<RequestTicket> {
        self.enqueue(
            competition_id,
            RequestAction::PlayerRefund {
                player_id: player_id.into(),
            },
        )
        .await
    }

    /// Remove a player from a cash game
    pub async fn player_leave(
        &self,
        competition_id: CompetitionId,
        table_id: Option<TableId>,
        player_id: impl Into<PlayerId>,
    ) -> CompetitionResult<RequestTicket> {
        self.enqueue(
            competition_id,
            RequestAction::PlayerLeave {
                table_id,
                player_id: player_id.into(),
            },
        )
        .await
    }

    /// Latest stored snapshot of a competition
    pub async fn get_competition(&self, competition_id: CompetitionId) -> CompetitionResult<Competition> {
        self.repository
            .get(competition_id)
            .await
            .ok_or(CompetitionError::CompetitionNotFound(competition_id))
    }

    /// IDs of every known competition
    pub async fn competition_ids(&self) -> Vec<CompetitionId> {
        self.repository.ids().await
    }

    /// Subscribe to competition events of one topic
    pub async fn subscribe(&self, topic: EventTopic) -> mpsc::Receiver<CompetitionEvent> {
        self.events.subscribe(topic).await
    }

    /// Handle for the table engine to push table snapshots
    pub fn table_event_dispatcher(&self) -> TableEventDispatcher {
        TableEventDispatcher::new(self.sender.clone())
    }

    async fn enqueue(
        &self,
        competition_id: CompetitionId,
        action: RequestAction,
    ) -> CompetitionResult<RequestTicket> {
        if !self.repository.contains(competition_id).await {
            let error = CompetitionError::CompetitionNotFound(competition_id);
            log::warn!("{} rejected: {}", action.name(), error);
            self.events.error(Some(competition_id), error.clone()).await;
            return Err(error);
        }

        let (request, ticket) = Request::new(competition_id, action);
        self.submit(request).await?;
        Ok(ticket)
    }

    async fn submit(&self, request: Request) -> CompetitionResult<()> {
        let competition_id = request.competition_id;
        let error = match self.sender.try_send(request) {
            Ok(()) => return Ok(()),
            Err(mpsc::error::TrySendError::Full(request)) => {
                log::warn!(
                    "Request queue full, rejecting {} for competition {}",
                    request.action.name(),
                    competition_id
                );
                CompetitionError::QueueFull
            }
            Err(mpsc::error::TrySendError::Closed(_)) => CompetitionError::ProcessorClosed,
        };

        self.events.error(Some(competition_id), error.clone()).await;
        Err(error)
    }
}
