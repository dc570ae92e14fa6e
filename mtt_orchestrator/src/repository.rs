//! Competition storage.
//!
//! The request processor is the only writer; readers get cloned snapshots.

use crate::competition::{Competition, CompetitionId};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Trait for competition repository operations
#[async_trait]
pub trait CompetitionRepository: Send + Sync {
    /// Get a competition snapshot
    async fn get(&self, id: CompetitionId) -> Option<Competition>;

    /// Insert or replace a competition
    async fn save(&self, competition: Competition);

    async fn contains(&self, id: CompetitionId) -> bool;

    /// IDs of all stored competitions
    async fn ids(&self) -> Vec<CompetitionId>;

    /// Delete a competition, returning the last snapshot
    async fn delete(&self, id: CompetitionId) -> Option<Competition>;
}

/// In-memory competition repository
#[derive(Default)]
pub struct InMemoryCompetitionRepository {
    competitions: RwLock<HashMap<CompetitionId, Competition>>,
}

impl InMemoryCompetitionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CompetitionRepository for InMemoryCompetitionRepository {
    async fn get(&self, id: CompetitionId) -> Option<Competition> {
        self.competitions.read().await.get(&id).cloned()
    }

    async fn save(&self, competition: Competition) {
        self.competitions
            .write()
            .await
            .insert(competition.id, competition);
    }

    async fn contains(&self, id: CompetitionId) -> bool {
        self.competitions.read().await.contains_key(&id)
    }

    async fn ids(&self) -> Vec<CompetitionId> {
        self.competitions.read().await.keys().copied().collect()
    }

    async fn delete(&self, id: CompetitionId) -> Option<Competition> {
        self.competitions.write().await.remove(&id)
    }
}
