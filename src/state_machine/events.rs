//! Events emitted by the state machine after processing commands.
//!
//! These are for logging and notification purposes only.
//! Observers get state updates via the watch channel's StateSnapshot.

use crate::domain::{AuthorTag, FailureKind, Phase};
use serde::Serialize;

/// Events emitted by the state machine after processing commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum StateEvent {
    /// Phase changed from one phase to another
    PhaseChanged { from: Phase, to: Phase },
    /// Research material stored
    ResearchRecorded { excerpts: usize, sources: usize },
    /// A draft snapshot was appended to history
    DraftRecorded {
        author: AuthorTag,
        iteration: u32,
        sections: usize,
    },
    /// Automated verdict stored
    VerdictRecorded { verdict: String, checkpoint: bool },
    /// Revision counter was incremented
    IterationIncremented { new_value: u32 },
    /// Human approved at the checkpoint
    HumanApproved { override_used: bool },
    /// Human feedback accepted for the next revision
    HumanFeedbackReceived { feedback_preview: String },
    /// Loop guard stopped the run
    BudgetExhausted {
        iteration_count: u32,
        max_iterations: u32,
    },
    /// Final document stored
    DocumentExported { sha256: String, page_count: u32 },
    /// Run reached FAILED
    RunFailed { kind: FailureKind, message: String },
    /// Run reached DONE
    RunCompleted,
}
