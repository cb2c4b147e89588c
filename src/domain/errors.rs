//! Error types for the content workflow.
//!
//! Collaborator-sourced errors are step-local; `WorkflowError` covers
//! policy and state-machine failures raised by the orchestrator itself.

use crate::domain::types::Phase;
use thiserror::Error;

/// The retrieval collaborator failed or returned nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("retrieval failed: {message}")]
pub struct RetrievalError {
    pub message: String,
}

impl RetrievalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The generation collaborator failed or returned empty/malformed output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("generation failed: {message}")]
pub struct GenerationError {
    pub message: String,
}

impl GenerationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The rendering collaborator failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("render failed: {message}")]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Any error surfaced by a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Errors raised by the state machine and orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// Loop guard: another revision would exceed the budget.
    #[error("iteration budget exceeded: {iteration_count} of {max_iterations} revisions used")]
    IterationBudgetExceeded {
        iteration_count: u32,
        max_iterations: u32,
    },
    /// Human input at the checkpoint was empty or unparsable. Recoverable.
    #[error("invalid feedback: {reason}")]
    InvalidFeedback { reason: String },
    /// Command not valid in the current phase.
    #[error("invalid transition: {message}")]
    InvalidTransition { message: String },
    /// Command sent to a run that already finished.
    #[error("run already finished in phase {phase}")]
    Terminal { phase: Phase },
    /// Persistence boundary failure.
    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl WorkflowError {
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::InvalidTransition {
            message: message.into(),
        }
    }

    pub fn invalid_feedback(reason: impl Into<String>) -> Self {
        Self::InvalidFeedback {
            reason: reason.into(),
        }
    }

    /// True for errors after which the run can continue from the same phase.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WorkflowError::InvalidFeedback { .. } | WorkflowError::Storage { .. }
        )
    }
}
