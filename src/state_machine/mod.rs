//! Centralized state machine for run state management.
//!
//! This module provides the ONLY place where state transitions happen.
//! The state machine owns the state, validates commands, applies the
//! transition policy (checkpoints, loop guard), emits events, and broadcasts
//! snapshots to subscribers via a watch channel.

mod commands;
mod events;
mod snapshot;

pub use commands::StateCommand;
pub use events::StateEvent;
pub use snapshot::StateSnapshot;

use crate::domain::{
    AuthorTag, Draft, FailureContext, FailureKind, HistoryEntry, Phase, ReviewVerdict,
    TimestampUtc, WorkflowError,
};
use crate::state::WorkflowState;
use crate::structured_logger::StructuredLogger;
use std::sync::Arc;
use tokio::sync::watch;

const FEEDBACK_PREVIEW_CHARS: usize = 50;

/// The ONLY place state transitions happen.
/// Owns the state, validates commands, emits events, broadcasts snapshots.
pub struct WorkflowStateMachine {
    state: WorkflowState,
    snapshot_tx: watch::Sender<StateSnapshot>,
    logger: Arc<StructuredLogger>,
    seq: u64,
}

impl WorkflowStateMachine {
    /// Creates a state machine around an initial (or resumed) state.
    ///
    /// Returns the state machine and a watch receiver for state snapshots.
    pub fn new(
        initial_state: WorkflowState,
        logger: Arc<StructuredLogger>,
    ) -> (Self, watch::Receiver<StateSnapshot>) {
        let snapshot = StateSnapshot::from(&initial_state);
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot);

        let machine = Self {
            state: initial_state,
            snapshot_tx,
            logger,
            seq: 0,
        };

        (machine, snapshot_rx)
    }

    /// All mutations go through this single method.
    /// Returns events for logging; broadcasts snapshot automatically.
    ///
    /// A rejected command leaves the state untouched.
    pub fn apply(&mut self, command: StateCommand) -> Result<Vec<StateEvent>, WorkflowError> {
        self.seq += 1;
        self.logger.log_command(self.seq, &command);

        let mut next = self.state.clone();
        let events = match apply_to(&mut next, &command) {
            Ok(events) => events,
            Err(err) => {
                self.logger
                    .log_rejected(self.seq, &command, &err.to_string());
                return Err(err);
            }
        };

        for event in &events {
            self.logger.log_event(self.seq, event);
        }

        next.set_updated_at();
        self.state = next;
        self.snapshot_tx.send_replace(StateSnapshot::from(&self.state));

        Ok(events)
    }

    /// Returns immutable reference to current state (for persisting).
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// New receiver for snapshots of this run.
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn logger(&self) -> &Arc<StructuredLogger> {
        &self.logger
    }
}

fn apply_to(
    state: &mut WorkflowState,
    command: &StateCommand,
) -> Result<Vec<StateEvent>, WorkflowError> {
    use StateCommand::*;
    use StateEvent::*;

    if state.phase.is_terminal() && !matches!(command, Cancel { .. } | RetryExport) {
        return Err(WorkflowError::Terminal { phase: state.phase });
    }

    match command {
        StartRun => {
            require_phase(state, Phase::Init, command)?;
            Ok(vec![change_phase(state, Phase::Researching)?])
        }

        CompleteResearch { material } => {
            require_phase(state, Phase::Researching, command)?;
            if material.is_empty() {
                return Err(WorkflowError::invalid_transition(
                    "research material must not be empty",
                ));
            }
            state.research_material = material.clone();
            let recorded = ResearchRecorded {
                excerpts: state.research_material.len(),
                sources: state.sources().len(),
            };
            Ok(vec![recorded, change_phase(state, Phase::Drafting)?])
        }

        CompleteDraft { draft } => {
            require_phase(state, Phase::Drafting, command)?;
            let recorded = record_draft(state, draft, AuthorTag::Draft)?;
            state.review_verdict = ReviewVerdict::Pending;
            Ok(vec![recorded, change_phase(state, Phase::Reviewing)?])
        }

        RecordVerdict { verdict } => {
            require_phase(state, Phase::Reviewing, command)?;
            if *verdict == ReviewVerdict::Pending {
                return Err(WorkflowError::invalid_transition(
                    "review must produce ACCEPTED or REJECTED",
                ));
            }
            state.review_verdict = verdict.clone();
            let checkpoint = state.params.human_review_mode.checkpoint_for(verdict);
            let mut events = vec![VerdictRecorded {
                verdict: verdict.label().to_string(),
                checkpoint,
            }];

            if checkpoint {
                events.push(change_phase(state, Phase::AwaitingHuman)?);
            } else if verdict.is_accepted() {
                events.push(change_phase(state, Phase::Exporting)?);
            } else {
                events.extend(enter_revising(state)?);
            }
            Ok(events)
        }

        HumanApprove => {
            require_phase(state, Phase::AwaitingHuman, command)?;
            let override_used = !state.review_verdict.is_accepted();
            if override_used {
                state.review_verdict = ReviewVerdict::Accepted;
                state.approval_overridden = true;
            }
            state.human_feedback = None;
            Ok(vec![
                HumanApproved { override_used },
                change_phase(state, Phase::Exporting)?,
            ])
        }

        HumanRevise { feedback } => {
            require_phase(state, Phase::AwaitingHuman, command)?;
            let feedback = feedback.trim();
            if feedback.is_empty() {
                return Err(WorkflowError::invalid_feedback(
                    "feedback text must not be empty",
                ));
            }
            state.human_feedback = Some(feedback.to_string());
            let mut events = vec![HumanFeedbackReceived {
                feedback_preview: preview(feedback),
            }];
            events.extend(enter_revising(state)?);
            Ok(events)
        }

        CompleteRevision { draft, input } => {
            require_phase(state, Phase::Revising, command)?;
            let expected = state.revision_input()?;
            if expected != *input {
                return Err(WorkflowError::invalid_transition(
                    "revision input does not match the pending feedback source",
                ));
            }
            let new_value = state.iteration_count + 1;
            if new_value > state.params.max_iterations {
                return Err(WorkflowError::IterationBudgetExceeded {
                    iteration_count: state.iteration_count,
                    max_iterations: state.params.max_iterations,
                });
            }
            state.iteration_count = new_value;
            let recorded = record_draft(state, draft, input.author())?;
            state.human_feedback = None;
            state.review_verdict = ReviewVerdict::Pending;
            Ok(vec![
                IterationIncremented { new_value },
                recorded,
                change_phase(state, Phase::Reviewing)?,
            ])
        }

        CompleteExport { document } => {
            require_phase(state, Phase::Exporting, command)?;
            state.final_document = Some(document.clone());
            Ok(vec![
                DocumentExported {
                    sha256: document.sha256.clone(),
                    page_count: document.page_count,
                },
                change_phase(state, Phase::Done)?,
                RunCompleted,
            ])
        }

        StepFailed { kind, message } => fail(state, *kind, message.clone()),

        Cancel { reason } => {
            if state.phase.is_terminal() {
                return Ok(vec![]);
            }
            fail(state, FailureKind::Cancelled, reason.clone())
        }

        RetryExport => {
            let render_failed = state.phase == Phase::Failed
                && state
                    .last_failure
                    .as_ref()
                    .is_some_and(|f| f.kind == FailureKind::Render);
            if !render_failed || !state.review_verdict.is_accepted() {
                return Err(WorkflowError::invalid_transition(
                    "export can only be retried after a render failure of an accepted draft",
                ));
            }
            // Failed -> Exporting is not a normal transition; retrying export
            // re-enters the last phase the run reached.
            let from = state.phase;
            state.phase = Phase::Exporting;
            state.last_failure = None;
            Ok(vec![PhaseChanged {
                from,
                to: Phase::Exporting,
            }])
        }
    }
}

fn require_phase(
    state: &WorkflowState,
    expected: Phase,
    command: &StateCommand,
) -> Result<(), WorkflowError> {
    if state.phase != expected {
        return Err(WorkflowError::invalid_transition(format!(
            "{} is only valid in {:?}, run is in {:?}",
            command.name(),
            expected,
            state.phase
        )));
    }
    Ok(())
}

fn change_phase(state: &mut WorkflowState, to: Phase) -> Result<StateEvent, WorkflowError> {
    let from = state.phase;
    state.transition(to)?;
    Ok(StateEvent::PhaseChanged { from, to })
}

/// Moves into Revising unless the loop guard forbids another revision,
/// in which case the run fails instead.
fn enter_revising(state: &mut WorkflowState) -> Result<Vec<StateEvent>, WorkflowError> {
    if let Err(err) = state.check_revision_budget() {
        let mut events = vec![StateEvent::BudgetExhausted {
            iteration_count: state.iteration_count,
            max_iterations: state.params.max_iterations,
        }];
        events.extend(fail(
            state,
            FailureKind::IterationBudgetExceeded,
            err.to_string(),
        )?);
        return Ok(events);
    }
    // Validate the exclusive feedback source before dispatch.
    state.revision_input()?;
    Ok(vec![change_phase(state, Phase::Revising)?])
}

fn record_draft(
    state: &mut WorkflowState,
    draft: &Draft,
    author: AuthorTag,
) -> Result<StateEvent, WorkflowError> {
    if draft.is_empty() {
        return Err(WorkflowError::invalid_transition("draft must not be empty"));
    }
    state.draft = Some(draft.clone());
    state.history.push(HistoryEntry {
        draft: draft.clone(),
        author,
        iteration: state.iteration_count,
        recorded_at: TimestampUtc::now(),
    });
    Ok(StateEvent::DraftRecorded {
        author,
        iteration: state.iteration_count,
        sections: draft.sections.len(),
    })
}

fn fail(
    state: &mut WorkflowState,
    kind: FailureKind,
    message: String,
) -> Result<Vec<StateEvent>, WorkflowError> {
    let failed_in = state.phase;
    let change = change_phase(state, Phase::Failed)?;
    state.last_failure = Some(FailureContext::new(
        kind,
        failed_in,
        state.iteration_count,
        message.clone(),
    ));
    Ok(vec![change, StateEvent::RunFailed { kind, message }])
}

fn preview(feedback: &str) -> String {
    if feedback.chars().count() > FEEDBACK_PREVIEW_CHARS {
        format!(
            "{}...",
            feedback
                .chars()
                .take(FEEDBACK_PREVIEW_CHARS)
                .collect::<String>()
        )
    } else {
        feedback.to_string()
    }
}
