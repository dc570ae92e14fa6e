//! Table event intake.
//!
//! The table engine pushes full table snapshots. Each snapshot is turned into
//! a request on the processor queue, so table events and player requests are
//! applied by the same single writer.

use crate::competition::{Competition, CompetitionId, CompetitionMode, CompetitionStatus, PlayerStatus};
use crate::errors::{CompetitionError, CompetitionResult};
use crate::processor::ProcessorWorker;
use crate::processor::messages::{Request, RequestAction};
use crate::table::{Table, TableStatus};
use chrono::Utc;
use tokio::sync::mpsc;

/// Entry point for table engine callbacks
#[derive(Debug, Clone)]
pub struct TableEventDispatcher {
    sender: mpsc::Sender<Request>,
}

impl TableEventDispatcher {
    pub(crate) fn new(sender: mpsc::Sender<Request>) -> Self {
        Self { sender }
    }

    /// Queue a table snapshot.
    ///
    /// Waits for queue capacity instead of dropping the event.
    pub async fn on_table_updated(&self, table: Table) -> CompetitionResult<()> {
        let request = Request::internal(
            table.competition_id,
            RequestAction::TableUpdated {
                table: Box::new(table),
            },
        );
        self.sender
            .send(request)
            .await
            .map_err(|_| CompetitionError::ProcessorClosed)
    }
}

impl ProcessorWorker {
    /// Apply a table snapshot to its competition.
    ///
    /// | Table status            | Action                                        |
    /// |-------------------------|-----------------------------------------------|
    /// | `Created`               | track the table, start a ready CT competition |
    /// | `GameOpened`, `Pausing` | replace the snapshot                          |
    /// | `GameSettled`           | settle the hand                               |
    /// | `Closed`                | drop the table, settle once none are left     |
    ///
    /// Snapshots of ended competitions and of untracked tables (other than
    /// new ones) are ignored.
    pub(crate) async fn handle_table_updated(
        &mut self,
        competition_id: CompetitionId,
        table: Table,
    ) -> CompetitionResult<Competition> {
        let mut competition = self.load(competition_id).await?;

        let tracked = competition.has_table(table.id);
        if competition.state.status == CompetitionStatus::End
            || (!tracked && table.status != TableStatus::Created)
        {
            log::debug!(
                "Competition {}: ignoring {:?} snapshot of table {}",
                competition_id,
                table.status,
                table.id
            );
            return Ok(competition);
        }

        match table.status {
            TableStatus::Created => self.table_created(&mut competition, table, tracked).await?,
            TableStatus::GameOpened | TableStatus::Pausing => {
                if competition.meta.mode == CompetitionMode::Mtt {
                    self.balancer.track_table(competition_id, &table);
                }
                competition.replace_table(table);
            }
            TableStatus::GameSettled => self.settle_hand(&mut competition, table).await,
            TableStatus::Closed => self.table_closed(&mut competition, table).await,
        }

        Ok(self.commit(competition).await)
    }

    async fn table_created(
        &mut self,
        competition: &mut Competition,
        table: Table,
        tracked: bool,
    ) -> CompetitionResult<()> {
        let now = Utc::now();
        let table_id = table.id;

        if competition.meta.mode == CompetitionMode::Mtt {
            self.balancer.track_table(competition.id, &table);
        }

        for index in competition.add_table(table, now) {
            self.insert_cache(competition, index).await;
        }

        if !tracked
            && competition.state.status.is_started()
            && let Err(e) = self.engine.start_table_game(table_id).await
        {
            self.report(competition.id, e).await;
        }

        if competition.meta.mode == CompetitionMode::Ct && competition.can_start(now) {
            self.begin(competition).await?;
        }

        Ok(())
    }

    async fn table_closed(&mut self, competition: &mut Competition, table: Table) {
        let competition_id = competition.id;
        if competition.remove_table(table.id).is_none() {
            return;
        }
        self.balancer.remove_table(competition_id, table.id);

        let is_mtt = competition.meta.mode == CompetitionMode::Mtt;
        let mut unseated = Vec::new();
        for player in competition.state.players.iter_mut() {
            if player.current_table_id != Some(table.id) {
                continue;
            }
            player.current_table_id = None;
            if is_mtt && !player.is_knockout() {
                player.status = PlayerStatus::WaitingTableBalancing;
                if player.chips > 0 {
                    self.balancer.join_waiting(competition_id, &player.player_id);
                }
            }
            unseated.push(player.player_id.clone());
        }
        for player_id in &unseated {
            self.cache.set_table(competition_id, player_id, None).await;
        }

        // A lone survivor has won, there is nobody left to seat with
        if is_mtt && competition.survivor_count() > 1 {
            self.place_waiting_players(competition).await;
        }

        if competition.state.tables.is_empty() {
            self.settle_competition(competition).await;
        }
    }
}
