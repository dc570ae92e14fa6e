//! Per-hand and end-of-competition settlement.
//!
//! Engine commands issued here are best effort: a failing command is
//! reported on the error topic and the in-memory changes already applied
//! are kept.

use super::messages::RequestAction;
use super::worker::ProcessorWorker;
use crate::competition::{
    Competition, CompetitionMode, CompetitionStatus, PlayerId, PlayerStatus,
};
use crate::events::CompetitionEvent;
use crate::ranking;
use crate::regulator::Placement;
use crate::table::{JoinPlayer, Table};
use chrono::{Duration, Utc};

impl ProcessorWorker {
    /// Settle one finished hand on a tracked table
    pub(crate) async fn settle_hand(&mut self, competition: &mut Competition, table: Table) {
        let now = Utc::now();
        let competition_id = competition.id;
        let cache = self.cache.snapshot(competition_id).await;

        // Re-rank the table and write stacks back onto the players
        let ranks = ranking::live_table_ranking(&table, &cache);
        let mut touched = competition.apply_table_ranking(&table, &ranks);
        log::debug!(
            "Competition {}: table {} settled hand {} ({} players ranked)",
            competition_id,
            table.id,
            table.game.hand_count,
            ranks.iter().filter(|r| r.rank > 0).count()
        );

        // Re-buy window, or close buy-ins once the final level is reached
        let buy_in_closed = competition.state.blind.is_stopped_buy_in();
        if !buy_in_closed {
            let waiting = Duration::seconds(i64::from(competition.meta.rebuy.waiting_time_secs));
            let max_rebuy = competition.meta.rebuy.max_times;

            for seat in table.players.iter().filter(|p| p.chips <= 0) {
                let Some(index) = competition.find_player_index(&seat.player_id) else {
                    continue;
                };
                let rebuy_times = cache
                    .get(&seat.player_id)
                    .map_or(competition.state.players[index].rebuy_times, |e| e.rebuy_times);

                let player = &mut competition.state.players[index];
                if player.is_knockout() || player.is_rebuying || rebuy_times >= max_rebuy {
                    continue;
                }

                let deadline = now + waiting;
                player.is_rebuying = true;
                player.rebuy_deadline = Some(deadline);
                touched.push(index);

                let task = self.defer(
                    competition_id,
                    deadline,
                    RequestAction::ReBuyDeadline {
                        player_id: seat.player_id.clone(),
                        deadline,
                    },
                );
                self.timers
                    .schedule_rebuy(competition_id, &seat.player_id, task);
                log::debug!(
                    "Competition {}: player {} may re-buy until {}",
                    competition_id,
                    seat.player_id,
                    deadline
                );
            }
        } else if competition.state.status == CompetitionStatus::DelayedBuyIn {
            competition.state.status = CompetitionStatus::StoppedBuyIn;
            competition.grow_rankings();
            log::info!("Competition {}: buy-in window closed", competition_id);
        }

        // Knock out busted players, later joiners into the worse slots
        let seated: Vec<&_> = competition
            .state
            .players
            .iter()
            .filter(|p| table.find_player(&p.player_id).is_some())
            .collect();
        let eliminated = ranking::knockout_order(
            seated,
            &cache,
            competition.meta.rebuy.max_times,
            buy_in_closed,
        );

        let mut knocked_out: Vec<PlayerId> = Vec::new();
        for player_id in eliminated {
            if competition.knockout_player(&player_id).is_some() {
                self.timers.cancel_rebuy(competition_id, &player_id);
                self.cache.set_table(competition_id, &player_id, None).await;
                if let Some(index) = competition.find_player_index(&player_id) {
                    touched.push(index);
                }
                knocked_out.push(player_id);
            }
        }

        let mut remaining = table.clone();
        if !knocked_out.is_empty() {
            if let Err(e) = self.engine.players_leave(table.id, &knocked_out).await {
                self.report(competition_id, e).await;
            }
            remaining
                .players
                .retain(|p| !knocked_out.contains(&p.player_id));
            for player_id in &knocked_out {
                if let Some(player) = competition.player_mut(player_id) {
                    player.current_table_id = None;
                }
            }
        }
        competition.replace_table(remaining.clone());

        // Mode specific follow-up
        match competition.meta.mode {
            CompetitionMode::Ct | CompetitionMode::Cash => {
                let expired = competition.meta.mode == CompetitionMode::Ct
                    && competition.state.end_at.is_some_and(|end_at| now >= end_at);
                if table.should_close || expired {
                    log::info!(
                        "Competition {}: closing table {}{}",
                        competition_id,
                        table.id,
                        if expired { " (time is up)" } else { "" }
                    );
                    if let Err(e) = self.engine.close_table(table.id).await {
                        self.report(competition_id, e).await;
                    }
                } else if let Err(e) = self.engine.table_game_open(table.id).await {
                    self.report(competition_id, e).await;
                }
            }
            CompetitionMode::Mtt => {
                let decision = self.balancer.update_table(competition_id, &remaining);
                if decision.suspend {
                    if let Err(e) = self.engine.balance_table(table.id).await {
                        self.report(competition_id, e).await;
                    }
                    for (index, player) in competition.state.players.iter_mut().enumerate() {
                        if player.current_table_id == Some(table.id) && !player.is_knockout() {
                            player.status = PlayerStatus::WaitingTableBalancing;
                            touched.push(index);
                        }
                    }
                } else if table.should_close {
                    if let Err(e) = self.engine.close_table(table.id).await {
                        self.report(competition_id, e).await;
                    }
                } else {
                    self.place_waiting_players(competition).await;
                    if let Err(e) = self.engine.table_game_open(table.id).await {
                        self.report(competition_id, e).await;
                    }
                }
            }
        }

        touched.sort_unstable();
        touched.dedup();
        for index in touched {
            self.publish_player(competition, index).await;
        }
    }

    /// Settle the final rankings and close the competition.
    ///
    /// Busted players still waiting on a re-buy are knocked out first, then
    /// survivors fill the remaining slots from the top.
    pub(crate) async fn settle_competition(&mut self, competition: &mut Competition) {
        let now = Utc::now();
        let competition_id = competition.id;
        let cache = self.cache.snapshot(competition_id).await;

        for player_id in ranking::knockout_order(&competition.state.players, &cache, 0, true) {
            competition.knockout_player(&player_id);
        }

        let survivors = ranking::final_ranking(&competition.state.players, &cache);
        for rank in &survivors {
            competition.rank_survivor(&rank.player_id, rank.chips);
        }

        for player in competition.state.players.iter_mut() {
            player.current_table_id = None;
            player.is_rebuying = false;
            player.rebuy_deadline = None;
        }
        competition.state.tables.clear();
        competition.close(now);

        let cancelled = self.timers.cancel_all(competition_id);
        self.balancer.unregister(competition_id);
        let dropped = self.cache.remove_all(competition_id).await;
        log::debug!(
            "Competition {}: cancelled {} timers, dropped {} cache entries",
            competition_id,
            cancelled,
            dropped
        );

        for (slot, entry) in competition.state.rankings.iter().enumerate() {
            if let Some(entry) = entry {
                self.events
                    .publish(CompetitionEvent::FinalPlayerRankUpdated {
                        competition_id,
                        player_id: entry.player_id.clone(),
                        rank: (slot + 1) as u32,
                        final_chips: entry.final_chips,
                    })
                    .await;
            }
        }

        log::info!(
            "Competition {} '{}' settled: {} players ranked",
            competition_id,
            competition.meta.name,
            competition.state.rankings.iter().flatten().count()
        );
    }

    /// Seat waiting players of a multi-table competition.
    ///
    /// Players keep their current stack: a player moving tables or opening a
    /// new one brings exactly the chips they hold. Players that cannot be
    /// seated go back to the waiting pool.
    pub(crate) async fn place_waiting_players(&mut self, competition: &mut Competition) {
        let competition_id = competition.id;
        if competition.meta.mode != CompetitionMode::Mtt
            || competition.state.status == CompetitionStatus::End
        {
            return;
        }

        let now = Utc::now();
        for placement in self.balancer.plan_placements(competition_id) {
            match placement {
                Placement::Seat {
                    table_id,
                    player_ids,
                } => {
                    for player_id in player_ids {
                        let Some(join) = seat_request(competition, &player_id) else {
                            continue;
                        };
                        match self.engine.player_join(table_id, join).await {
                            Ok(table) => {
                                self.balancer.track_table(competition_id, &table);
                                for index in competition.add_table(table, now) {
                                    self.insert_cache(competition, index).await;
                                }
                                self.cache
                                    .set_table(competition_id, &player_id, Some(table_id))
                                    .await;
                                log::debug!(
                                    "Competition {}: player {} seated at table {}",
                                    competition_id,
                                    player_id,
                                    table_id
                                );
                            }
                            Err(e) => {
                                self.report(competition_id, e).await;
                                self.balancer.join_waiting(competition_id, &player_id);
                                // Undo the planned seat
                                if let Some(table) = competition.table(table_id) {
                                    self.balancer.track_table(competition_id, table);
                                }
                            }
                        }
                    }
                }
                Placement::NewTable { player_ids } => {
                    let joins: Vec<JoinPlayer> = player_ids
                        .iter()
                        .filter_map(|id| seat_request(competition, id))
                        .collect();
                    if joins.is_empty() {
                        continue;
                    }

                    let setting = competition.table_setting(joins);
                    match self.engine.create_table(setting).await {
                        Ok(table) => {
                            let table_id = table.id;
                            self.balancer.track_table(competition_id, &table);
                            for index in competition.add_table(table, now) {
                                self.insert_cache(competition, index).await;
                            }
                            for player_id in &player_ids {
                                self.cache
                                    .set_table(competition_id, player_id, Some(table_id))
                                    .await;
                            }
                            log::info!(
                                "Competition {}: opened table {} for {} players",
                                competition_id,
                                table_id,
                                player_ids.len()
                            );

                            if competition.state.status.is_started()
                                && let Err(e) = self.engine.start_table_game(table_id).await
                            {
                                self.report(competition_id, e).await;
                            }
                        }
                        Err(e) => {
                            self.report(competition_id, e).await;
                            for player_id in &player_ids {
                                self.balancer.join_waiting(competition_id, player_id);
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Seat request for a waiting player, redeeming the chips they hold
fn seat_request(competition: &Competition, player_id: &str) -> Option<JoinPlayer> {
    let player = competition.player(player_id)?;
    if player.is_knockout() || player.chips <= 0 {
        return None;
    }
    Some(JoinPlayer::new(player_id, player.chips))
}
