//! Competition error types.

use crate::competition::models::{CompetitionId, CompetitionMode, CompetitionStatus, PlayerId};
use crate::table::{TableEngineError, TableId};
use thiserror::Error;

/// Broad classification of a [`CompetitionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown competition, table or player
    NotFound,
    /// Action is not valid for the competition's current status or mode
    RejectedByState,
    /// Re-buy, addon or seat count over its cap
    LimitExceeded,
    /// Malformed request or setting
    InvalidInput,
    /// The external table engine refused or failed a command
    Engine,
    /// The request processor cannot take the request
    Unavailable,
}

/// Competition errors
#[derive(Debug, Clone, Error)]
pub enum CompetitionError {
    #[error("Competition not found: {0}")]
    CompetitionNotFound(CompetitionId),

    #[error("Table not found: {0}")]
    TableNotFound(TableId),

    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    #[error("No chips to redeem")]
    NoRedeemChips,

    #[error("Cannot {action} while competition is {status:?}")]
    InvalidStatus {
        action: &'static str,
        status: CompetitionStatus,
    },

    #[error("Cannot {action} in {mode:?} mode")]
    ModeNotSupported {
        action: &'static str,
        mode: CompetitionMode,
    },

    #[error("Player already knocked out: {0}")]
    PlayerKnockedOut(PlayerId),

    #[error("Re-buy limit reached: max {max}")]
    ReBuyLimitExceeded { max: u32 },

    #[error("Addon limit reached: max {max}")]
    AddonLimitExceeded { max: u32 },

    #[error("Buy-in window is closed")]
    BuyInClosed,

    #[error("Competition is full: max {max} players")]
    CompetitionFull { max: usize },

    #[error("Insufficient players: need {needed}, have {current}")]
    InsufficientPlayers { needed: usize, current: usize },

    #[error("Invalid competition setting: {0}")]
    InvalidSetting(String),

    #[error("Table engine error: {0}")]
    TableEngine(#[from] TableEngineError),

    #[error("Request queue is full")]
    QueueFull,

    #[error("Request processor is closed")]
    ProcessorClosed,
}

impl CompetitionError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompetitionError::CompetitionNotFound(_)
            | CompetitionError::TableNotFound(_)
            | CompetitionError::PlayerNotFound(_) => ErrorKind::NotFound,
            CompetitionError::InvalidStatus { .. }
            | CompetitionError::ModeNotSupported { .. }
            | CompetitionError::PlayerKnockedOut(_)
            | CompetitionError::BuyInClosed
            | CompetitionError::InsufficientPlayers { .. } => ErrorKind::RejectedByState,
            CompetitionError::ReBuyLimitExceeded { .. }
            | CompetitionError::AddonLimitExceeded { .. }
            | CompetitionError::CompetitionFull { .. } => ErrorKind::LimitExceeded,
            CompetitionError::NoRedeemChips | CompetitionError::InvalidSetting(_) => {
                ErrorKind::InvalidInput
            }
            CompetitionError::TableEngine(_) => ErrorKind::Engine,
            CompetitionError::QueueFull | CompetitionError::ProcessorClosed => {
                ErrorKind::Unavailable
            }
        }
    }

    /// Get a client-safe error message that doesn't leak internal identifiers
    pub fn client_message(&self) -> String {
        match self {
            CompetitionError::CompetitionNotFound(_) => "Competition not found".to_string(),
            CompetitionError::TableNotFound(_) => "Table not found".to_string(),
            CompetitionError::PlayerNotFound(_) => "Player not found".to_string(),
            CompetitionError::PlayerKnockedOut(_) => "Player already knocked out".to_string(),
            CompetitionError::TableEngine(_) => "Table unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for competition operations
pub type CompetitionResult<T> = Result<T, CompetitionError>;
