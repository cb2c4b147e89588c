//! Drives one run through the pipeline.
//!
//! The orchestrator dispatches each phase to its step, turns the step output
//! into a `StateCommand`, and persists the state after every command. It
//! stops at the human checkpoint and at terminal phases; callers answer the
//! checkpoint with `submit_human_action` and call `run_until_checkpoint`
//! again.

use crate::collaborators::{Generator, Renderer, Retriever};
use crate::domain::{
    Draft, FailureContext, FailureKind, FailurePolicy, FinalDocument, HistoryEntry, Phase,
    ReviewVerdict, RunId, StepError, WorkflowError,
};
use crate::phases::{run_drafting, run_export, run_research, run_review, run_revision};
use crate::session_store::SessionStore;
use crate::state::WorkflowState;
use crate::state_machine::{StateCommand, StateSnapshot, WorkflowStateMachine};
use crate::structured_logger::StructuredLogger;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// The external systems a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub retriever: Arc<dyn Retriever>,
    pub generator: Arc<dyn Generator>,
    pub renderer: Arc<dyn Renderer>,
}

/// Shared dependencies for starting or resuming runs.
#[derive(Clone)]
pub struct RunContext {
    pub collaborators: Collaborators,
    pub store: Arc<dyn SessionStore>,
    pub failure_policy: FailurePolicy,
}

/// Aborts a run from another task.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        wait_cancelled(&mut rx).await;
    }
}

/// A human decision at the checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HumanAction {
    Approve,
    Revise { feedback: String },
}

/// What the human sees at the checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub run_id: RunId,
    pub draft: Draft,
    pub verdict: ReviewVerdict,
    pub iteration_count: u32,
    pub revisions_remaining: u32,
}

/// Where `run_until_checkpoint` stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum RunProgress {
    AwaitingHuman(Checkpoint),
    Finished(Phase),
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Done { document: FinalDocument },
    Failed { failure: FailureContext },
}

/// What the caller gets back once a run is over: the outcome plus the full
/// audit trail, whatever the outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub topic: String,
    pub outcome: RunOutcome,
    pub last_draft: Option<Draft>,
    pub history: Vec<HistoryEntry>,
    pub iteration_count: u32,
    pub approval_overridden: bool,
}

impl RunReport {
    pub fn from_state(state: &WorkflowState) -> Result<Self, WorkflowError> {
        let outcome = match (state.phase(), state.final_document(), state.last_failure()) {
            (Phase::Done, Some(document), _) => RunOutcome::Done {
                document: document.clone(),
            },
            (Phase::Failed, _, Some(failure)) => RunOutcome::Failed {
                failure: failure.clone(),
            },
            (phase, _, _) => {
                return Err(WorkflowError::invalid_transition(format!(
                    "run has not finished (phase {:?})",
                    phase
                )))
            }
        };

        Ok(Self {
            run_id: state.run_id().to_string(),
            topic: state.topic().to_string(),
            outcome,
            last_draft: state.draft().cloned(),
            history: state.history().to_vec(),
            iteration_count: state.iteration_count(),
            approval_overridden: state.approval_overridden(),
        })
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, RunOutcome::Done { .. })
    }
}

pub struct Orchestrator {
    machine: WorkflowStateMachine,
    ctx: RunContext,
    cancel: CancelHandle,
    cancel_rx: watch::Receiver<bool>,
}

impl Orchestrator {
    /// Wraps a fresh state. Nothing runs until `run_until_checkpoint`.
    pub fn new(
        state: WorkflowState,
        ctx: RunContext,
        logger: Arc<StructuredLogger>,
    ) -> (Self, watch::Receiver<StateSnapshot>) {
        let (machine, snapshot_rx) = WorkflowStateMachine::new(state, logger);
        let (cancel, cancel_rx) = CancelHandle::new();
        (
            Self {
                machine,
                ctx,
                cancel,
                cancel_rx,
            },
            snapshot_rx,
        )
    }

    /// Loads a persisted run and continues from its recorded phase.
    pub fn resume(
        run_id: &RunId,
        ctx: RunContext,
        logger: Arc<StructuredLogger>,
    ) -> Result<(Self, watch::Receiver<StateSnapshot>), WorkflowError> {
        let state = ctx
            .store
            .load(run_id)
            .map_err(storage_error)?
            .ok_or_else(|| WorkflowError::Storage {
                message: format!("no persisted run with id {}", run_id),
            })?;
        logger.increment_run_id();
        tracing::info!(%run_id, phase = %state.phase(), "resuming run");
        Ok(Self::new(state, ctx, logger))
    }

    pub fn state(&self) -> &WorkflowState {
        self.machine.state()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.machine.subscribe()
    }

    /// Advances the run until it needs a human or reaches a terminal phase.
    ///
    /// Each step's output becomes one command; the state is persisted after
    /// every command. Step errors end the run in `Failed`; only state-machine
    /// and storage errors are returned as `Err`.
    pub async fn run_until_checkpoint(&mut self) -> Result<RunProgress, WorkflowError> {
        self.persist()?;
        loop {
            if self.cancel.is_cancelled() && !self.state().phase().is_terminal() {
                self.apply(StateCommand::Cancel {
                    reason: "cancelled by caller".to_string(),
                })?;
                continue;
            }

            let command = match self.state().phase() {
                Phase::Init => Some(StateCommand::StartRun),
                Phase::Researching => self.research().await,
                Phase::Drafting => self.draft().await,
                Phase::Reviewing => self.review().await,
                Phase::Revising => self.revise().await?,
                Phase::Exporting => self.export().await,
                Phase::AwaitingHuman => return Ok(RunProgress::AwaitingHuman(self.checkpoint()?)),
                phase @ (Phase::Done | Phase::Failed) => return Ok(RunProgress::Finished(phase)),
            };

            // `None` means the step was interrupted by cancellation.
            if let Some(command) = command {
                self.apply(command)?;
            }
        }
    }

    /// Applies the human decision at the checkpoint.
    ///
    /// Empty feedback returns `InvalidFeedback` and leaves the run waiting,
    /// so the caller can ask again.
    pub fn submit_human_action(&mut self, action: HumanAction) -> Result<(), WorkflowError> {
        let command = match action {
            HumanAction::Approve => StateCommand::HumanApprove,
            HumanAction::Revise { feedback } => StateCommand::HumanRevise { feedback },
        };
        self.apply(command)?;
        Ok(())
    }

    /// Cancels a run that is not currently executing a step, e.g. one
    /// suspended at the checkpoint. No-op for finished runs.
    pub fn abort(&mut self, reason: &str) -> Result<(), WorkflowError> {
        self.apply(StateCommand::Cancel {
            reason: reason.to_string(),
        })
    }

    /// Re-enters export for a run that failed while rendering.
    pub async fn retry_export(&mut self) -> Result<RunProgress, WorkflowError> {
        self.apply(StateCommand::RetryExport)?;
        self.run_until_checkpoint().await
    }

    pub fn can_retry_export(&self) -> bool {
        let state = self.state();
        state.phase() == Phase::Failed
            && state.review_verdict().is_accepted()
            && state
                .last_failure()
                .is_some_and(|f| f.kind == FailureKind::Render)
    }

    /// Report for a finished run. Leaves the persisted snapshot in place.
    pub fn report(&self) -> Result<RunReport, WorkflowError> {
        RunReport::from_state(self.state())
    }

    /// Consumes a finished run and returns its report.
    ///
    /// The persisted snapshot is removed unless export can still be retried.
    /// Call this only once the report has been delivered.
    pub fn finish(self) -> Result<RunReport, WorkflowError> {
        let report = self.report()?;
        if !self.can_retry_export() {
            self.ctx
                .store
                .remove(self.state().run_id())
                .map_err(storage_error)?;
        }
        Ok(report)
    }

    fn apply(&mut self, command: StateCommand) -> Result<(), WorkflowError> {
        let events = self.machine.apply(command)?;
        tracing::debug!(events = events.len(), phase = %self.state().phase(), "command applied");
        self.persist()
    }

    fn persist(&self) -> Result<(), WorkflowError> {
        self.ctx.store.save(self.state()).map_err(storage_error)
    }

    fn checkpoint(&self) -> Result<Checkpoint, WorkflowError> {
        let state = self.state();
        let draft = state
            .draft()
            .cloned()
            .ok_or_else(|| WorkflowError::invalid_transition("checkpoint without a draft"))?;
        Ok(Checkpoint {
            run_id: state.run_id().clone(),
            draft,
            verdict: state.review_verdict().clone(),
            iteration_count: state.iteration_count(),
            revisions_remaining: state.revisions_remaining(),
        })
    }

    async fn research(&self) -> Option<StateCommand> {
        let logger = self.machine.logger();
        let result = self
            .cancellable(run_research(
                self.ctx.collaborators.retriever.as_ref(),
                self.state(),
                logger,
            ))
            .await?;
        Some(match result {
            Ok(material) => StateCommand::CompleteResearch { material },
            Err(err) => step_failed(err),
        })
    }

    async fn draft(&self) -> Option<StateCommand> {
        let policy = self.ctx.failure_policy.draft();
        let result = self
            .cancellable(run_drafting(
                self.ctx.collaborators.generator.as_ref(),
                self.state(),
                &policy,
                self.machine.logger(),
            ))
            .await?;
        Some(match result {
            Ok(draft) => StateCommand::CompleteDraft { draft },
            Err(err) => step_failed(err),
        })
    }

    async fn review(&self) -> Option<StateCommand> {
        let verdict = self
            .cancellable(run_review(
                self.ctx.collaborators.generator.as_ref(),
                self.state(),
                self.machine.logger(),
            ))
            .await?;
        Some(StateCommand::RecordVerdict { verdict })
    }

    async fn revise(&self) -> Result<Option<StateCommand>, WorkflowError> {
        // Loop guard, checked again before dispatch for runs resumed in Revising.
        if let Err(err) = self.state().check_revision_budget() {
            return Ok(Some(StateCommand::StepFailed {
                kind: FailureKind::IterationBudgetExceeded,
                message: err.to_string(),
            }));
        }
        let input = self.state().revision_input()?;
        let policy = self.ctx.failure_policy.revision();
        let result = self
            .cancellable(run_revision(
                self.ctx.collaborators.generator.as_ref(),
                self.state(),
                &input,
                &policy,
                self.machine.logger(),
            ))
            .await;
        Ok(result.map(|result| match result {
            Ok(draft) => StateCommand::CompleteRevision { draft, input },
            Err(err) => step_failed(err),
        }))
    }

    async fn export(&self) -> Option<StateCommand> {
        let result = self
            .cancellable(run_export(
                self.ctx.collaborators.renderer.as_ref(),
                self.state(),
                self.machine.logger(),
            ))
            .await?;
        Some(match result {
            Ok(document) => StateCommand::CompleteExport { document },
            Err(err) => step_failed(err),
        })
    }

    /// Runs `fut` unless the run is cancelled first. Dropping the step future
    /// drops any in-flight collaborator call with it.
    async fn cancellable<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        let mut cancel_rx = self.cancel_rx.clone();
        tokio::select! {
            biased;
            _ = wait_cancelled(&mut cancel_rx) => None,
            out = fut => Some(out),
        }
    }
}

async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn step_failed(err: StepError) -> StateCommand {
    tracing::warn!(error = %err, "step failed");
    StateCommand::StepFailed {
        kind: FailureKind::from(&err),
        message: err.to_string(),
    }
}

fn storage_error(err: anyhow::Error) -> WorkflowError {
    WorkflowError::Storage {
        message: format!("{:#}", err),
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
