//! Blind level timeline for a competition.
//!
//! The state here is pure: it computes level deadlines and moves the current
//! level forward when asked with a timestamp. Timer tasks that trigger the
//! advance live in the request processor so every advance is applied by the
//! single competition writer.

use crate::errors::{CompetitionError, CompetitionResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Level number reserved for breaks (no blinds)
pub const BREAK_LEVEL: i32 = -1;

/// A single blind level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindLevel {
    /// Level number, or [`BREAK_LEVEL`] for a break
    pub level: i32,
    /// Small blind amount
    pub small_blind: i64,
    /// Big blind amount
    pub big_blind: i64,
    /// Ante amount
    pub ante: i64,
    /// Duration of this level in seconds
    pub duration_secs: u32,
}

impl BlindLevel {
    /// Create a new blind level
    pub fn new(level: i32, small_blind: i64, big_blind: i64, duration_secs: u32) -> Self {
        Self {
            level,
            small_blind,
            big_blind,
            ante: 0,
            duration_secs,
        }
    }

    /// Create a break level, which carries no blinds
    pub fn break_level(duration_secs: u32) -> Self {
        Self::new(BREAK_LEVEL, 0, 0, duration_secs)
    }

    /// Create a blind level with ante
    pub fn with_ante(mut self, ante: i64) -> Self {
        self.ante = ante;
        self
    }

    pub fn is_break(&self) -> bool {
        self.level == BREAK_LEVEL
    }
}

/// Blind options taken from a competition setting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindOptions {
    /// Ordered level list
    pub levels: Vec<BlindLevel>,
    /// Level number the competition starts at
    pub initial_level: i32,
    /// Level number at which buy-ins stop, `None` for no late registration
    pub final_buy_in_level: Option<i32>,
}

impl BlindOptions {
    pub fn validate(&self) -> CompetitionResult<()> {
        if self.levels.is_empty() {
            return Err(CompetitionError::InvalidSetting(
                "Blind level list is empty".to_string(),
            ));
        }

        if self.initial_level == BREAK_LEVEL || self.find_level(self.initial_level).is_none() {
            return Err(CompetitionError::InvalidSetting(format!(
                "Initial blind level {} is not in the level list",
                self.initial_level
            )));
        }

        if let Some(final_level) = self.final_buy_in_level
            && (final_level == BREAK_LEVEL || self.find_level(final_level).is_none())
        {
            return Err(CompetitionError::InvalidSetting(format!(
                "Final buy-in level {} is not in the level list",
                final_level
            )));
        }

        for level in &self.levels {
            if level.is_break() {
                if level.small_blind != 0 || level.big_blind != 0 || level.ante != 0 {
                    return Err(CompetitionError::InvalidSetting(
                        "Break levels cannot carry blinds".to_string(),
                    ));
                }
            } else if level.big_blind < level.small_blind || level.small_blind <= 0 {
                return Err(CompetitionError::InvalidSetting(format!(
                    "Level {} has invalid blinds {}/{}",
                    level.level, level.small_blind, level.big_blind
                )));
            }
        }

        Ok(())
    }

    fn find_level(&self, level: i32) -> Option<usize> {
        self.levels.iter().position(|bl| bl.level == level)
    }
}

/// Runtime blind state of a competition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindState {
    /// Ordered level list
    pub levels: Vec<BlindLevel>,
    /// Level number the competition starts at
    pub initial_level: i32,
    /// Level number at which buy-ins stop
    pub final_buy_in_level: Option<i32>,
    /// Index of the level currently in play
    pub current_level_index: usize,
    /// Index of the final buy-in level, resolved on start
    pub final_buy_in_index: Option<usize>,
    /// End timestamp per level, `None` until started
    pub level_end_ats: Vec<Option<DateTime<Utc>>>,
    /// When the blind clock started
    pub started_at: Option<DateTime<Utc>>,
}

impl BlindState {
    /// Build a blind state from options
    pub fn from_options(options: &BlindOptions) -> Self {
        let mut state = Self::default();
        state.apply_options(options);
        state
    }

    /// Fix the level list and reset every level end to unset
    pub fn apply_options(&mut self, options: &BlindOptions) {
        self.levels = options.levels.clone();
        self.initial_level = options.initial_level;
        self.final_buy_in_level = options.final_buy_in_level;
        self.current_level_index = 0;
        self.final_buy_in_index = None;
        self.level_end_ats = vec![None; self.levels.len()];
        self.started_at = None;
    }

    /// Start the blind clock at `now`.
    ///
    /// Resolves the initial and final buy-in levels by level number and
    /// computes each level's absolute end as a running sum of durations.
    /// Levels before the initial one are considered already elapsed.
    pub fn start(&mut self, now: DateTime<Utc>) -> CompetitionResult<()> {
        let initial_index = self
            .levels
            .iter()
            .position(|bl| bl.level == self.initial_level && !bl.is_break())
            .ok_or_else(|| {
                CompetitionError::InvalidSetting(format!(
                    "Initial blind level {} is not in the level list",
                    self.initial_level
                ))
            })?;

        self.final_buy_in_index = match self.final_buy_in_level {
            Some(final_level) => Some(
                self.levels
                    .iter()
                    .position(|bl| bl.level == final_level && !bl.is_break())
                    .ok_or_else(|| {
                        CompetitionError::InvalidSetting(format!(
                            "Final buy-in level {} is not in the level list",
                            final_level
                        ))
                    })?,
            ),
            None => None,
        };

        let mut end_at = now;
        for (index, level) in self.levels.iter().enumerate() {
            if index < initial_index {
                self.level_end_ats[index] = Some(now);
                continue;
            }
            end_at += Duration::seconds(i64::from(level.duration_secs));
            self.level_end_ats[index] = Some(end_at);
        }

        self.current_level_index = initial_index;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Level currently in play
    pub fn current_level(&self) -> Option<&BlindLevel> {
        self.levels.get(self.current_level_index)
    }

    /// Deadlines still ahead of the current level.
    ///
    /// Each entry is `(index, end_at)`: when `end_at` passes, the level at
    /// `index + 1` becomes current. The last level never advances.
    pub fn pending_deadlines(&self) -> Vec<(usize, DateTime<Utc>)> {
        if self.levels.is_empty() {
            return Vec::new();
        }

        (self.current_level_index..self.levels.len() - 1)
            .filter_map(|index| self.level_end_ats[index].map(|end_at| (index, end_at)))
            .collect()
    }

    /// Move the current level forward to the one in play at `now`.
    ///
    /// Returns the new index if the level changed. Never moves backward.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Option<usize> {
        if !self.is_started() {
            return None;
        }

        let previous = self.current_level_index;
        while self.current_level_index + 1 < self.levels.len() {
            match self.level_end_ats[self.current_level_index] {
                Some(end_at) if end_at <= now => self.current_level_index += 1,
                _ => break,
            }
        }

        (self.current_level_index != previous).then_some(self.current_level_index)
    }

    /// Whether the buy-in window has closed
    pub fn is_stopped_buy_in(&self) -> bool {
        match self.final_buy_in_index {
            Some(final_index) => self.current_level_index >= final_index,
            None => self.final_buy_in_level.is_none(),
        }
    }

    /// Seconds until the current level ends, if the clock is running
    pub fn time_to_next_level(&self, now: DateTime<Utc>) -> Option<i64> {
        let end_at = self.level_end_ats.get(self.current_level_index).copied()??;
        Some((end_at - now).num_seconds().max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(final_buy_in_level: Option<i32>) -> BlindOptions {
        BlindOptions {
            levels: vec![
                BlindLevel::new(1, 10, 20, 10),
                BlindLevel::new(2, 20, 40, 10),
                BlindLevel::break_level(5),
                BlindLevel::new(3, 30, 60, 10),
                BlindLevel::new(4, 50, 100, 10),
            ],
            initial_level: 1,
            final_buy_in_level,
        }
    }

    #[test]
    fn test_apply_options_resets_end_timestamps() {
        let mut state = BlindState::from_options(&options(Some(3)));
        assert_eq!(state.level_end_ats, vec![None; 5]);
        assert!(!state.is_started());
        assert_eq!(state.advance(Utc::now()), None);
    }

    #[test]
    fn test_level_end_timestamps_are_monotonic() {
        let now = Utc::now();
        let mut state = BlindState::from_options(&options(Some(3)));
        state.start(now).unwrap();

        let ends: Vec<_> = state.level_end_ats.iter().map(|e| e.unwrap()).collect();
        assert!(ends.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(ends[0], now + Duration::seconds(10));
        assert_eq!(ends[2], now + Duration::seconds(25));
    }

    #[test]
    fn test_current_level_after_fifteen_seconds() {
        let t0 = Utc::now();
        let mut state = BlindState::from_options(&BlindOptions {
            levels: vec![
                BlindLevel::new(1, 10, 20, 10),
                BlindLevel::new(2, 20, 40, 10),
            ],
            initial_level: 1,
            final_buy_in_level: None,
        });
        state.start(t0).unwrap();

        assert_eq!(state.advance(t0 + Duration::seconds(15)), Some(1));
        assert_eq!(state.current_level().unwrap().level, 2);
    }

    #[test]
    fn test_advance_never_moves_past_last_level() {
        let t0 = Utc::now();
        let mut state = BlindState::from_options(&options(None));
        state.start(t0).unwrap();

        assert_eq!(state.advance(t0 + Duration::hours(5)), Some(4));
        assert_eq!(state.advance(t0 + Duration::hours(10)), None);
        assert_eq!(state.current_level().unwrap().level, 4);
    }

    #[test]
    fn test_advance_never_moves_backward() {
        let t0 = Utc::now();
        let mut state = BlindState::from_options(&options(Some(3)));
        state.start(t0).unwrap();

        state.advance(t0 + Duration::seconds(21));
        assert_eq!(state.current_level_index, 2);
        assert_eq!(state.advance(t0), None);
        assert_eq!(state.current_level_index, 2);
        assert!(state.current_level().unwrap().is_break());
    }

    #[test]
    fn test_stopped_buy_in_at_final_level() {
        let t0 = Utc::now();
        let mut state = BlindState::from_options(&options(Some(3)));
        state.start(t0).unwrap();

        assert!(!state.is_stopped_buy_in());
        state.advance(t0 + Duration::seconds(24));
        assert!(!state.is_stopped_buy_in(), "break level is not a buy-in boundary");
        state.advance(t0 + Duration::seconds(25));
        assert_eq!(state.current_level().unwrap().level, 3);
        assert!(state.is_stopped_buy_in());
    }

    #[test]
    fn test_stopped_buy_in_without_final_level() {
        let state = BlindState::from_options(&options(None));
        assert!(state.is_stopped_buy_in());
    }

    #[test]
    fn test_start_from_later_initial_level() {
        let t0 = Utc::now();
        let mut opts = options(Some(4));
        opts.initial_level = 2;
        let mut state = BlindState::from_options(&opts);
        state.start(t0).unwrap();

        assert_eq!(state.current_level_index, 1);
        assert_eq!(state.level_end_ats[0], Some(t0));
        assert_eq!(state.level_end_ats[1], Some(t0 + Duration::seconds(10)));
        assert_eq!(state.pending_deadlines().len(), 3);
    }

    #[test]
    fn test_start_rejects_unknown_initial_level() {
        let mut opts = options(Some(3));
        opts.initial_level = 9;
        let mut state = BlindState::from_options(&opts);
        assert!(state.start(Utc::now()).is_err());
    }

    #[test]
    fn test_pending_deadlines_skip_last_level() {
        let t0 = Utc::now();
        let mut state = BlindState::from_options(&options(Some(3)));
        state.start(t0).unwrap();

        let deadlines = state.pending_deadlines();
        assert_eq!(deadlines.len(), 4);
        assert_eq!(deadlines[0], (0, t0 + Duration::seconds(10)));
        assert_eq!(deadlines[3].0, 3);
    }

    #[test]
    fn test_time_to_next_level() {
        let t0 = Utc::now();
        let mut state = BlindState::from_options(&options(Some(3)));
        assert_eq!(state.time_to_next_level(t0), None);
        state.start(t0).unwrap();
        assert_eq!(state.time_to_next_level(t0 + Duration::seconds(4)), Some(6));
    }

    #[test]
    fn test_validate_options() {
        assert!(options(Some(3)).validate().is_ok());

        let mut bad_final = options(Some(-1));
        assert!(bad_final.validate().is_err());
        bad_final.final_buy_in_level = Some(7);
        assert!(bad_final.validate().is_err());

        let mut bad_break = options(None);
        bad_break.levels[2].small_blind = 5;
        assert!(bad_break.validate().is_err());

        let empty = BlindOptions::default();
        assert!(empty.validate().is_err());
    }
}
