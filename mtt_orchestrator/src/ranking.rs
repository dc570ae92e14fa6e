//! Player ranking.
//!
//! Pure functions over a competition or table snapshot plus the player
//! cache. Every ordering is by chips descending with earlier joiners ahead
//! on ties, except the knockout order which puts later joiners first.

use crate::cache::PlayerCache;
use crate::competition::{CompetitionPlayer, PlayerId};
use crate::table::Table;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Ranking result for one player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankData {
    pub player_id: PlayerId,
    /// 1-based rank, 0 when the player was not ranked
    pub rank: u32,
    pub chips: i64,
}

fn joined_at(
    cache: &HashMap<PlayerId, PlayerCache>,
    player_id: &str,
    fallback: DateTime<Utc>,
) -> DateTime<Utc> {
    cache
        .get(player_id)
        .map_or(fallback, |entry| entry.joined_at)
}

fn by_chips_then_join(
    a: (i64, DateTime<Utc>, &str),
    b: (i64, DateTime<Utc>, &str),
) -> Ordering {
    b.0.cmp(&a.0)
        .then_with(|| a.1.cmp(&b.1))
        .then_with(|| a.2.cmp(b.2))
}

/// Rank the players dealt into a table's last hand.
///
/// Participants are ranked `1..=k` by table stack; everyone else seated at
/// the table comes back with rank 0. A seat without a cache entry ties as
/// the latest joiner.
pub fn live_table_ranking(table: &Table, cache: &HashMap<PlayerId, PlayerCache>) -> Vec<RankData> {
    let latest = DateTime::<Utc>::MAX_UTC;
    let mut participants: Vec<_> = table.players.iter().filter(|p| p.is_participated).collect();
    participants.sort_by(|a, b| {
        by_chips_then_join(
            (a.chips, joined_at(cache, &a.player_id, latest), a.player_id.as_str()),
            (b.chips, joined_at(cache, &b.player_id, latest), b.player_id.as_str()),
        )
    });

    let mut ranks: Vec<RankData> = participants
        .into_iter()
        .enumerate()
        .map(|(index, p)| RankData {
            player_id: p.player_id.clone(),
            rank: (index + 1) as u32,
            chips: p.chips,
        })
        .collect();

    ranks.extend(
        table
            .players
            .iter()
            .filter(|p| !p.is_participated)
            .map(|p| RankData {
                player_id: p.player_id.clone(),
                rank: 0,
                chips: p.chips,
            }),
    );

    ranks
}

/// Players eliminated by the current state, in the order their ranking
/// slots are filled from the tail.
///
/// A player is eliminated with zero chips, when not already knocked out and
/// no longer able to re-buy (limit reached or buy-in window closed). Later
/// joiners come first, so they finish behind earlier joiners who busted in
/// the same hand.
pub fn knockout_order<'a>(
    players: impl IntoIterator<Item = &'a CompetitionPlayer>,
    cache: &HashMap<PlayerId, PlayerCache>,
    max_rebuy_times: u32,
    buy_in_closed: bool,
) -> Vec<PlayerId> {
    let mut busted: Vec<(DateTime<Utc>, &PlayerId)> = players
        .into_iter()
        .filter(|p| p.chips <= 0 && !p.is_knockout())
        .filter(|p| {
            let rebuy_times = cache
                .get(&p.player_id)
                .map_or(p.rebuy_times, |entry| entry.rebuy_times);
            buy_in_closed || rebuy_times >= max_rebuy_times
        })
        .map(|p| (joined_at(cache, &p.player_id, p.joined_at), &p.player_id))
        .collect();

    busted.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(a.1)));
    busted.into_iter().map(|(_, id)| id.clone()).collect()
}

/// Final ranking of every player still holding chips
pub fn final_ranking<'a>(
    players: impl IntoIterator<Item = &'a CompetitionPlayer>,
    cache: &HashMap<PlayerId, PlayerCache>,
) -> Vec<RankData> {
    let mut survivors: Vec<_> = players
        .into_iter()
        .filter(|p| p.chips > 0 && !p.is_knockout())
        .map(|p| (p.chips, joined_at(cache, &p.player_id, p.joined_at), p.player_id.as_str()))
        .collect();

    survivors.sort_by(|a, b| by_chips_then_join(*a, *b));
    survivors
        .into_iter()
        .enumerate()
        .map(|(index, (chips, _, id))| RankData {
            player_id: id.to_string(),
            rank: (index + 1) as u32,
            chips,
        })
        .collect()
}
