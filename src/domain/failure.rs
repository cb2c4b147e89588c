//! Structured failure handling types for content runs.
//!
//! This module provides the failure taxonomy persisted with a failed run and
//! the bounded retry policy applied around generation steps.

use crate::domain::errors::StepError;
use crate::domain::types::{Phase, TimestampUtc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Canonical failure types for a run that reached FAILED.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retrieval collaborator errored or returned no usable sources.
    Retrieval,
    /// Generation collaborator errored or produced empty/malformed output.
    Generation,
    /// Rendering collaborator errored.
    Render,
    /// Loop guard stopped the run.
    IterationBudgetExceeded,
    /// Caller aborted the run.
    Cancelled,
}

impl FailureKind {
    /// Returns true if this failure type is potentially recoverable via retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Generation)
    }

    /// Returns a human-readable name for this failure type.
    pub fn display_name(&self) -> &'static str {
        match self {
            FailureKind::Retrieval => "RetrievalError",
            FailureKind::Generation => "GenerationError",
            FailureKind::Render => "RenderError",
            FailureKind::IterationBudgetExceeded => "IterationBudgetExceeded",
            FailureKind::Cancelled => "Cancelled",
        }
    }
}

impl From<&StepError> for FailureKind {
    fn from(err: &StepError) -> Self {
        match err {
            StepError::Retrieval(_) => FailureKind::Retrieval,
            StepError::Generation(_) => FailureKind::Generation,
            StepError::Render(_) => FailureKind::Render,
        }
    }
}

/// Context for a failed run, persisted in state and surfaced in the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureContext {
    /// Classified failure type.
    pub kind: FailureKind,
    /// Phase the run was in when it failed.
    pub phase: Phase,
    /// Revision count at the time of failure.
    pub iteration: u32,
    /// Human-readable cause.
    pub message: String,
    /// Timestamp when failure occurred.
    pub failed_at: TimestampUtc,
}

impl FailureContext {
    pub fn new(kind: FailureKind, phase: Phase, iteration: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            phase,
            iteration,
            message: message.into(),
            failed_at: TimestampUtc::now(),
        }
    }
}

/// Bounded retry around one collaborator-backed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Linear backoff unit between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Policy for steps that must not be retried.
    pub const NONE: RetryPolicy = RetryPolicy {
        max_retries: 0,
        backoff: Duration::ZERO,
    };

    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. `op` receives the zero-based attempt number.
    pub async fn run<T, F, Fut>(&self, step: &str, mut op: F) -> Result<T, StepError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err)
                    if attempt < self.max_retries && FailureKind::from(&err).is_retryable() =>
                {
                    attempt += 1;
                    tracing::warn!(
                        step,
                        attempt,
                        max_retries = self.max_retries,
                        "retrying after error: {}",
                        err
                    );
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::NONE
    }
}

/// Retry policy configuration for generation steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePolicy {
    /// Retries for the drafting step. Default: 1
    #[serde(default = "default_step_retries")]
    pub draft_retries: u32,
    /// Retries for each revision. Default: 1
    #[serde(default = "default_step_retries")]
    pub revision_retries: u32,
    /// Backoff unit in milliseconds between retries. Default: 0
    #[serde(default)]
    pub backoff_ms: u64,
}

fn default_step_retries() -> u32 {
    1
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            draft_retries: default_step_retries(),
            revision_retries: default_step_retries(),
            backoff_ms: 0,
        }
    }
}

impl FailurePolicy {
    pub fn draft(&self) -> RetryPolicy {
        RetryPolicy::new(self.draft_retries, Duration::from_millis(self.backoff_ms))
    }

    pub fn revision(&self) -> RetryPolicy {
        RetryPolicy::new(self.revision_retries, Duration::from_millis(self.backoff_ms))
    }
}
