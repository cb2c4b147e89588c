//! Commands that can mutate a run's state.
//!
//! All state changes MUST go through the state machine's `apply()` method.
//! This is the only way to mutate state, ensuring a single source of truth.

use crate::domain::{Draft, Excerpt, FailureKind, FinalDocument, ReviewVerdict, RevisionInput};

/// Commands that can mutate a run's state.
/// Steps never touch state directly; the orchestrator turns their outputs into commands.
#[derive(Debug, Clone)]
pub enum StateCommand {
    // Phase transitions
    /// Leave Init and begin research
    StartRun,
    /// Research produced source material, transitions to Drafting
    CompleteResearch { material: Vec<Excerpt> },
    /// Initial draft produced, transitions to Reviewing
    CompleteDraft { draft: Draft },
    /// Automated review finished; the transition policy picks the next phase
    RecordVerdict { verdict: ReviewVerdict },
    /// Revision produced a new draft from the given input, transitions to Reviewing
    CompleteRevision { draft: Draft, input: RevisionInput },
    /// Export rendered the final document, transitions to Done
    CompleteExport { document: FinalDocument },

    // Human checkpoint
    /// Human approved the current draft (supersedes a REJECTED verdict)
    HumanApprove,
    /// Human supplied revision feedback
    HumanRevise { feedback: String },

    // Failure handling
    /// A step failed fatally
    StepFailed { kind: FailureKind, message: String },
    /// Caller aborted the run
    Cancel { reason: String },
    /// Re-enter Exporting after a render failure
    RetryExport,
}

impl StateCommand {
    /// Short name used in the structured log.
    pub fn name(&self) -> &'static str {
        match self {
            StateCommand::StartRun => "StartRun",
            StateCommand::CompleteResearch { .. } => "CompleteResearch",
            StateCommand::CompleteDraft { .. } => "CompleteDraft",
            StateCommand::RecordVerdict { .. } => "RecordVerdict",
            StateCommand::CompleteRevision { .. } => "CompleteRevision",
            StateCommand::CompleteExport { .. } => "CompleteExport",
            StateCommand::HumanApprove => "HumanApprove",
            StateCommand::HumanRevise { .. } => "HumanRevise",
            StateCommand::StepFailed { .. } => "StepFailed",
            StateCommand::Cancel { .. } => "Cancel",
            StateCommand::RetryExport => "RetryExport",
        }
    }
}
