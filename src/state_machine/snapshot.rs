//! Read-only snapshot of run state for progress display.
//!
//! Observers NEVER mutate this; they receive new snapshots via watch channel.

use crate::domain::{FailureKind, Phase, TimestampUtc};
use crate::state::WorkflowState;

/// Read-only snapshot of state for progress display.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub run_id: String,
    pub topic: String,
    pub phase: Phase,
    pub iteration_count: u32,
    pub max_iterations: u32,
    /// Verdict label (PENDING, ACCEPTED, REJECTED)
    pub verdict: &'static str,
    pub critique: Option<String>,
    pub history_len: usize,
    pub approval_overridden: bool,
    pub failure: Option<FailureKind>,
    pub updated_at: TimestampUtc,
}

impl From<&WorkflowState> for StateSnapshot {
    fn from(state: &WorkflowState) -> Self {
        Self {
            run_id: state.run_id().to_string(),
            topic: state.topic().to_string(),
            phase: state.phase(),
            iteration_count: state.iteration_count(),
            max_iterations: state.params().max_iterations,
            verdict: state.review_verdict().label(),
            critique: state.review_verdict().critique().map(str::to_string),
            history_len: state.history().len(),
            approval_overridden: state.approval_overridden(),
            failure: state.last_failure().map(|f| f.kind),
            updated_at: *state.updated_at(),
        }
    }
}
