//! Outbound competition events.
//!
//! Subscribers register per topic and receive events on a bounded channel.
//! A subscriber whose channel is full misses the event; a subscriber whose
//! receiver was dropped is removed on the next publish.

use crate::competition::{Competition, CompetitionId, CompetitionPlayer, PlayerId};
use crate::errors::CompetitionError;
use std::collections::HashMap;
use tokio::sync::{Mutex, mpsc};

/// Event categories a subscriber can listen to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    /// Every successful mutation
    Updated,
    /// Every rejected request or failed engine command
    Error,
    /// A player's stack or status changed during settlement
    PlayerUpdated,
    /// A player received a final rank
    FinalPlayerRankUpdated,
}

/// Competition events
#[derive(Debug, Clone)]
pub enum CompetitionEvent {
    /// Snapshot after a successful mutation
    Updated { competition: Box<Competition> },
    Error {
        /// `None` when the failure could not be tied to a competition
        competition_id: Option<CompetitionId>,
        error: CompetitionError,
    },
    PlayerUpdated {
        competition_id: CompetitionId,
        player: CompetitionPlayer,
    },
    FinalPlayerRankUpdated {
        competition_id: CompetitionId,
        player_id: PlayerId,
        rank: u32,
        final_chips: i64,
    },
}

impl CompetitionEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            CompetitionEvent::Updated { .. } => EventTopic::Updated,
            CompetitionEvent::Error { .. } => EventTopic::Error,
            CompetitionEvent::PlayerUpdated { .. } => EventTopic::PlayerUpdated,
            CompetitionEvent::FinalPlayerRankUpdated { .. } => EventTopic::FinalPlayerRankUpdated,
        }
    }
}

/// Subscriber lists per topic
pub struct EventBus {
    buffer: usize,
    subscribers: Mutex<HashMap<EventTopic, Vec<mpsc::Sender<CompetitionEvent>>>>,
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a topic
    pub async fn subscribe(&self, topic: EventTopic) -> mpsc::Receiver<CompetitionEvent> {
        let (sender, receiver) = mpsc::channel(self.buffer);
        self.subscribers
            .lock()
            .await
            .entry(topic)
            .or_default()
            .push(sender);
        receiver
    }

    /// Deliver an event to every subscriber of its topic
    pub async fn publish(&self, event: CompetitionEvent) {
        let topic = event.topic();
        let mut subscribers = self.subscribers.lock().await;
        let Some(senders) = subscribers.get_mut(&topic) else {
            return;
        };

        senders.retain(|sender| match sender.try_send(event.clone()) {
            Ok(_) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("{:?} subscriber channel full, dropping event", topic);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("{:?} subscriber disconnected, removing", topic);
                false
            }
        });
    }

    /// Publish a competition snapshot
    pub async fn updated(&self, competition: &Competition) {
        self.publish(CompetitionEvent::Updated {
            competition: Box::new(competition.clone()),
        })
        .await;
    }

    /// Publish an error
    pub async fn error(&self, competition_id: Option<CompetitionId>, error: CompetitionError) {
        self.publish(CompetitionEvent::Error {
            competition_id,
            error,
        })
        .await;
    }

    /// Number of live subscribers on a topic
    pub async fn subscriber_count(&self, topic: EventTopic) -> usize {
        self.subscribers
            .lock()
            .await
            .get(&topic)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_routes_by_topic() {
        let bus = EventBus::new(8);
        let mut errors = bus.subscribe(EventTopic::Error).await;
        let mut updates = bus.subscribe(EventTopic::Updated).await;

        bus.error(Some(Uuid::new_v4()), CompetitionError::NoRedeemChips)
            .await;

        assert!(matches!(
            errors.recv().await,
            Some(CompetitionEvent::Error {
                error: CompetitionError::NoRedeemChips,
                ..
            })
        ));
        assert!(updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_subscribers_are_pruned() {
        let bus = EventBus::new(8);
        let receiver = bus.subscribe(EventTopic::Error).await;
        let _kept = bus.subscribe(EventTopic::Error).await;
        drop(receiver);

        bus.error(None, CompetitionError::QueueFull).await;
        assert_eq!(bus.subscriber_count(EventTopic::Error).await, 1);
    }

    #[tokio::test]
    async fn test_full_subscriber_drops_event() {
        let bus = EventBus::new(1);
        let mut receiver = bus.subscribe(EventTopic::Error).await;

        bus.error(None, CompetitionError::QueueFull).await;
        bus.error(None, CompetitionError::ProcessorClosed).await;

        assert!(matches!(
            receiver.recv().await,
            Some(CompetitionEvent::Error {
                error: CompetitionError::QueueFull,
                ..
            })
        ));
        assert!(receiver.try_recv().is_err());
        assert_eq!(bus.subscriber_count(EventTopic::Error).await, 1);
    }
}
