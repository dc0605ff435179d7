//! Watch session bookkeeping
//!
//! The finalize latch guarantees a watch resolves exactly once no matter how
//! many terminal signals the two channels deliver; the step progress set
//! keeps suite progress lines from repeating across polls.

use std::collections::{BTreeSet, HashMap};

use crate::api::types::ExecutionStatus;

/// Per-watch state: one session per execution id, never reused
#[derive(Debug)]
pub struct WatchSession {
    execution_id: String,
    finalized: bool,
}

impl WatchSession {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            finalized: false,
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Latch the session; only the first call wins
    pub fn finalize(&mut self) -> bool {
        if self.finalized {
            return false;
        }
        self.finalized = true;
        true
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

/// Tracks which step indices were already reported in which status
#[derive(Debug, Default)]
pub struct StepProgress {
    reported: HashMap<ExecutionStatus, BTreeSet<usize>>,
}

impl StepProgress {
    /// Record a step observation; true when it hasn't been reported yet
    pub fn mark(&mut self, index: usize, status: ExecutionStatus) -> bool {
        self.reported.entry(status).or_default().insert(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_latches_on_first_call() {
        let mut session = WatchSession::new("e1");
        assert!(!session.is_finalized());
        assert!(session.finalize());
        assert!(session.is_finalized());
        assert!(!session.finalize());
        assert!(!session.finalize());
    }

    #[test]
    fn step_progress_reports_each_transition_once() {
        let mut progress = StepProgress::default();
        assert!(progress.mark(0, ExecutionStatus::Running));
        assert!(!progress.mark(0, ExecutionStatus::Running));
        // The same step moving to a new status is a fresh transition
        assert!(progress.mark(0, ExecutionStatus::Passed));
        assert!(progress.mark(1, ExecutionStatus::Running));
        assert!(!progress.mark(1, ExecutionStatus::Running));
    }
}
