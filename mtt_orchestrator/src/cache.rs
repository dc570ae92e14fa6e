//! Per-player shadow records keyed by (competition, player).
//!
//! A cache entry exists exactly while its `CompetitionPlayer` exists: it is
//! inserted on buy-in, removed on refund or leave, and dropped wholesale
//! when the competition settles.

use crate::competition::{CompetitionId, PlayerId};
use crate::table::TableId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Shadow record of a competition player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCache {
    pub competition_id: CompetitionId,
    pub player_id: PlayerId,
    /// Buy-in time, ranking tie-break key
    pub joined_at: DateTime<Utc>,
    pub rebuy_times: u32,
    /// Index into the competition's player list
    pub player_index: usize,
    pub table_id: Option<TableId>,
}

/// Storage for player cache entries.
///
/// Shared between request handling and table event handling, so
/// implementations guard themselves.
#[async_trait]
pub trait PlayerCacheRepository: Send + Sync {
    /// Insert or replace an entry
    async fn insert(&self, entry: PlayerCache);

    async fn get(&self, competition_id: CompetitionId, player_id: &str) -> Option<PlayerCache>;

    /// Record a re-buy. Returns the new count, or `None` if no entry exists.
    async fn record_rebuy(&self, competition_id: CompetitionId, player_id: &str) -> Option<u32>;

    /// Record the table a player sits at
    async fn set_table(
        &self,
        competition_id: CompetitionId,
        player_id: &str,
        table_id: Option<TableId>,
    );

    async fn remove(&self, competition_id: CompetitionId, player_id: &str) -> Option<PlayerCache>;

    /// Re-point player indexes after the player list shrank
    async fn reindex(&self, competition_id: CompetitionId, players: &[PlayerId]);

    /// All entries of a competition keyed by player
    async fn snapshot(&self, competition_id: CompetitionId) -> HashMap<PlayerId, PlayerCache>;

    /// Drop every entry of a competition
    async fn remove_all(&self, competition_id: CompetitionId) -> usize;
}

/// In-memory player cache
#[derive(Default)]
pub struct InMemoryPlayerCache {
    entries: RwLock<HashMap<(CompetitionId, PlayerId), PlayerCache>>,
}

impl InMemoryPlayerCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlayerCacheRepository for InMemoryPlayerCache {
    async fn insert(&self, entry: PlayerCache) {
        let key = (entry.competition_id, entry.player_id.clone());
        self.entries.write().await.insert(key, entry);
    }

    async fn get(&self, competition_id: CompetitionId, player_id: &str) -> Option<PlayerCache> {
        self.entries
            .read()
            .await
            .get(&(competition_id, player_id.to_string()))
            .cloned()
    }

    async fn record_rebuy(&self, competition_id: CompetitionId, player_id: &str) -> Option<u32> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&(competition_id, player_id.to_string()))?;
        entry.rebuy_times += 1;
        Some(entry.rebuy_times)
    }

    async fn set_table(
        &self,
        competition_id: CompetitionId,
        player_id: &str,
        table_id: Option<TableId>,
    ) {
        if let Some(entry) = self
            .entries
            .write()
            .await
            .get_mut(&(competition_id, player_id.to_string()))
        {
            entry.table_id = table_id;
        }
    }

    async fn remove(&self, competition_id: CompetitionId, player_id: &str) -> Option<PlayerCache> {
        self.entries
            .write()
            .await
            .remove(&(competition_id, player_id.to_string()))
    }

    async fn reindex(&self, competition_id: CompetitionId, players: &[PlayerId]) {
        let mut entries = self.entries.write().await;
        for (index, player_id) in players.iter().enumerate() {
            if let Some(entry) = entries.get_mut(&(competition_id, player_id.clone())) {
                entry.player_index = index;
            }
        }
    }

    async fn snapshot(&self, competition_id: CompetitionId) -> HashMap<PlayerId, PlayerCache> {
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.competition_id == competition_id)
            .map(|entry| (entry.player_id.clone(), entry.clone()))
            .collect()
    }

    async fn remove_all(&self, competition_id: CompetitionId) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(id, _), _| *id != competition_id);
        before - entries.len()
    }
}
