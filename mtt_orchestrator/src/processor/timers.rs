//! Deferred tasks feeding the request queue.
//!
//! A timer never touches a competition. When it fires it enqueues a request
//! and the worker applies it like any other. Cancellation is advisory: a
//! cancelled task does nothing when it fires, but a request already queued
//! stays queued.

use super::messages::Request;
use crate::competition::{CompetitionId, PlayerId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A request to enqueue at a deadline
#[derive(Debug)]
pub struct DeferredTask {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl DeferredTask {
    /// Spawn a task that enqueues `request` once `deadline` passes.
    ///
    /// The task holds a weak sender so pending timers do not keep the
    /// processor alive.
    pub fn schedule(
        sender: mpsc::WeakSender<Request>,
        deadline: DateTime<Utc>,
        request: Request,
    ) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let delay = (deadline - Utc::now()).to_std().unwrap_or_default();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            if flag.load(Ordering::Acquire) {
                log::debug!(
                    "Competition {}: cancelled {} timer skipped",
                    request.competition_id,
                    request.action.name()
                );
                return;
            }

            let Some(sender) = sender.upgrade() else {
                return;
            };
            let name = request.action.name();
            if sender.send(request).await.is_err() {
                log::debug!("Request processor closed, dropping {} timer", name);
            }
        });

        Self { cancelled, handle }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Pending timers per competition
#[derive(Debug, Default)]
pub struct TimerRegistry {
    blinds: HashMap<CompetitionId, Vec<DeferredTask>>,
    rebuys: HashMap<(CompetitionId, PlayerId), DeferredTask>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_blind(&mut self, competition_id: CompetitionId, task: DeferredTask) {
        let tasks = self.blinds.entry(competition_id).or_default();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Track a player's re-buy deadline, cancelling any previous one
    pub fn schedule_rebuy(
        &mut self,
        competition_id: CompetitionId,
        player_id: &str,
        task: DeferredTask,
    ) {
        if let Some(previous) = self
            .rebuys
            .insert((competition_id, player_id.to_string()), task)
        {
            previous.cancel();
        }
    }

    pub fn cancel_rebuy(&mut self, competition_id: CompetitionId, player_id: &str) -> bool {
        match self.rebuys.remove(&(competition_id, player_id.to_string())) {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every timer of a competition
    pub fn cancel_all(&mut self, competition_id: CompetitionId) -> usize {
        let mut cancelled = 0;

        if let Some(tasks) = self.blinds.remove(&competition_id) {
            for task in tasks {
                task.cancel();
                cancelled += 1;
            }
        }

        self.rebuys.retain(|(id, _), task| {
            if *id == competition_id {
                task.cancel();
                cancelled += 1;
                false
            } else {
                true
            }
        });

        cancelled
    }

    /// Timers still tracked for a competition
    pub fn pending(&self, competition_id: CompetitionId) -> usize {
        let blinds = self
            .blinds
            .get(&competition_id)
            .map_or(0, |tasks| tasks.iter().filter(|t| !t.is_finished()).count());
        let rebuys = self
            .rebuys
            .keys()
            .filter(|(id, _)| *id == competition_id)
            .count();
        blinds + rebuys
    }
}
