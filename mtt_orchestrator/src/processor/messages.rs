//! Request processor message types.

use crate::competition::{Competition, CompetitionId, CompetitionSetting, PlayerId};
use crate::errors::{CompetitionError, CompetitionResult};
use crate::table::{JoinPlayer, Table, TableId};
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

/// Actions applied by the request processor
#[derive(Debug)]
pub enum RequestAction {
    /// Create a competition from a setting
    CreateCompetition { setting: Box<CompetitionSetting> },

    /// Start a registering competition
    StartCompetition,

    /// Close a competition and settle its rankings
    CloseCompetition,

    /// Drop an ended competition from storage
    RemoveCompetition,

    /// Buy in, or re-buy if the player is already registered
    PlayerJoin {
        table_id: Option<TableId>,
        player: JoinPlayer,
    },

    /// Add chips to a registered player
    PlayerAddon {
        table_id: Option<TableId>,
        player: JoinPlayer,
    },

    /// Withdraw before the competition starts
    PlayerRefund { player_id: PlayerId },

    /// Leave a cash game
    PlayerLeave {
        table_id: Option<TableId>,
        player_id: PlayerId,
    },

    /// Table snapshot pushed by the table engine
    TableUpdated { table: Box<Table> },

    /// Blind level `level_index` ended at `end_at`
    BlindLevelElapsed {
        level_index: usize,
        end_at: DateTime<Utc>,
    },

    /// A player's re-buy window closed at `deadline`
    ReBuyDeadline {
        player_id: PlayerId,
        deadline: DateTime<Utc>,
    },
}

impl RequestAction {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            RequestAction::CreateCompetition { .. } => "create competition",
            RequestAction::StartCompetition => "start competition",
            RequestAction::CloseCompetition => "close competition",
            RequestAction::RemoveCompetition => "remove competition",
            RequestAction::PlayerJoin { .. } => "player join",
            RequestAction::PlayerAddon { .. } => "player addon",
            RequestAction::PlayerRefund { .. } => "player refund",
            RequestAction::PlayerLeave { .. } => "player leave",
            RequestAction::TableUpdated { .. } => "table updated",
            RequestAction::BlindLevelElapsed { .. } => "blind level elapsed",
            RequestAction::ReBuyDeadline { .. } => "re-buy deadline",
        }
    }
}

/// A queued request
#[derive(Debug)]
pub struct Request {
    pub competition_id: CompetitionId,
    pub action: RequestAction,
    /// Outcome channel, `None` for internal requests
    pub responder: Option<oneshot::Sender<CompetitionResult<Competition>>>,
}

impl Request {
    /// Create a request whose outcome can be awaited
    pub fn new(competition_id: CompetitionId, action: RequestAction) -> (Self, RequestTicket) {
        let (sender, receiver) = oneshot::channel();
        let request = Self {
            competition_id,
            action,
            responder: Some(sender),
        };
        (request, RequestTicket { receiver })
    }

    /// Create a request nobody waits on (table events, timers)
    pub fn internal(competition_id: CompetitionId, action: RequestAction) -> Self {
        Self {
            competition_id,
            action,
            responder: None,
        }
    }
}

/// Handle to the outcome of an accepted request.
///
/// Dropping the ticket does not cancel the request.
#[derive(Debug)]
pub struct RequestTicket {
    receiver: oneshot::Receiver<CompetitionResult<Competition>>,
}

impl RequestTicket {
    /// Wait for the request to be applied.
    ///
    /// Returns the competition snapshot after the request, or the rejection.
    pub async fn wait(self) -> CompetitionResult<Competition> {
        self.receiver
            .await
            .unwrap_or(Err(CompetitionError::ProcessorClosed))
    }
}
