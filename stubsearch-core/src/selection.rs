//! Selection policy: trial ordering, best-so-far accumulator and the
//! early-stop state machine.

use std::cmp::Ordering;

use tracing::debug;

use crate::config::SelectionSection;
use crate::types::{SelectionOutcome, StopReason, Trial};

/// Total order over trials; `Less` means preferred. Invalid trials sort
/// after every valid one.
pub fn compare_trials(a: &Trial, b: &Trial) -> Ordering {
    b.valid_injection
        .cmp(&a.valid_injection)
        .then(a.core_diagnostic_count.cmp(&b.core_diagnostic_count))
        .then(a.total_diagnostic_count.cmp(&b.total_diagnostic_count))
        .then_with(|| a.candidate_id.cmp(&b.candidate_id))
}

/// Best valid trial of `trials`, if any.
pub fn choose(trials: &[Trial]) -> Option<&Trial> {
    trials
        .iter()
        .filter(|t| t.valid_injection)
        .min_by(|a, b| compare_trials(a, b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Pending,
    Running,
    Scored,
    Stopped(StopReason),
}

/// Drives one project's search. The first scored trial is always the
/// baseline candidate.
#[derive(Debug, Clone)]
pub struct SearchMachine {
    stop_on_improve: bool,
    tie_streak: Option<usize>,
    uninjected_core: usize,
    state: SearchState,
    reference_core: Option<usize>,
    best: Option<Trial>,
    streak: usize,
    trials_run: usize,
}

impl SearchMachine {
    /// `uninjected_core` is the core count of the project before any
    /// injection.
    pub fn new(policy: &SelectionSection, uninjected_core: usize) -> Self {
        Self {
            stop_on_improve: policy.stop_on_improve,
            tie_streak: policy.tie_streak,
            uninjected_core,
            state: SearchState::Pending,
            reference_core: None,
            best: None,
            streak: 0,
            trials_run: 0,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.state, SearchState::Stopped(_))
    }

    pub fn best(&self) -> Option<&Trial> {
        self.best.as_ref()
    }

    /// Core count improvements and ties are measured against.
    pub fn reference_core(&self) -> usize {
        self.reference_core.unwrap_or(self.uninjected_core)
    }

    /// Enter `Running`. Returns false once stopped.
    pub fn begin(&mut self) -> bool {
        match self.state {
            SearchState::Pending | SearchState::Scored => {
                self.state = SearchState::Running;
                true
            }
            SearchState::Running => true,
            SearchState::Stopped(_) => false,
        }
    }

    /// Record a trial's result and decide whether to continue.
    pub fn score(&mut self, trial: Trial) -> SearchState {
        if self.is_stopped() {
            return self.state;
        }
        self.trials_run += 1;
        let first = self.trials_run == 1;
        let is_better = self
            .best
            .as_ref()
            .is_none_or(|best| compare_trials(&trial, best) == Ordering::Less);

        let next = if first {
            self.score_top1(&trial)
        } else {
            self.score_candidate(&trial)
        };
        if trial.valid_injection && is_better {
            self.best = Some(trial);
        }
        self.state = next;
        debug!(state = ?self.state, streak = self.streak, "Trial scored");
        self.state
    }

    fn score_top1(&mut self, trial: &Trial) -> SearchState {
        if !trial.valid_injection {
            return SearchState::Scored;
        }
        self.reference_core = Some(trial.core_diagnostic_count);
        if trial.core_diagnostic_count == 0 {
            SearchState::Stopped(StopReason::BaselineClean)
        } else {
            SearchState::Scored
        }
    }

    fn score_candidate(&mut self, trial: &Trial) -> SearchState {
        if !trial.valid_injection {
            self.streak = 0;
            return SearchState::Scored;
        }
        let reference = self.reference_core();
        match trial.core_diagnostic_count.cmp(&reference) {
            Ordering::Less => {
                self.streak = 0;
                if self.stop_on_improve {
                    return SearchState::Stopped(StopReason::Improved);
                }
            }
            Ordering::Equal => {
                self.streak += 1;
                if self.tie_streak.is_some_and(|n| self.streak >= n) {
                    return SearchState::Stopped(StopReason::TieStreak);
                }
            }
            Ordering::Greater => self.streak = 0,
        }
        SearchState::Scored
    }

    /// Force a stop (budget exhausted, project deadline). No-op when already
    /// stopped.
    pub fn stop(&mut self, reason: StopReason) {
        if !self.is_stopped() {
            self.state = SearchState::Stopped(reason);
        }
    }

    pub fn outcome(&self) -> SelectionOutcome {
        let stop_reason = match self.state {
            SearchState::Stopped(reason) => reason,
            _ => StopReason::Exhausted,
        };
        SelectionOutcome {
            chosen_candidate_id: self.best.as_ref().map(|t| t.candidate_id.clone()),
            trials_run: self.trials_run,
            stop_reason,
        }
    }
}
