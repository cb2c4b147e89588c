use crate::domain::{
    ContentFormat, Draft, Excerpt, FailureContext, FinalDocument, HistoryEntry, HumanReviewMode,
    Phase, ReviewVerdict, RevisionInput, RunId, TimestampUtc, Tone, Topic, WorkflowError,
};
use serde::{Deserialize, Serialize};

/// Default revision budget for a run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Run parameters fixed when the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParameters {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default)]
    pub human_review_mode: HumanReviewMode,
    #[serde(default)]
    pub content_format: ContentFormat,
    #[serde(default)]
    pub tone: Tone,
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            human_review_mode: HumanReviewMode::default(),
            content_format: ContentFormat::default(),
            tone: Tone::default(),
        }
    }
}

/// The single record threaded through every step of a run.
///
/// Fields are crate-private: only `WorkflowStateMachine::apply` mutates a
/// state, callers read it through the accessors below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub(crate) run_id: RunId,
    pub(crate) topic: Topic,
    pub(crate) params: RunParameters,
    pub(crate) phase: Phase,
    #[serde(default)]
    pub(crate) research_material: Vec<Excerpt>,
    #[serde(default)]
    pub(crate) draft: Option<Draft>,
    #[serde(default)]
    pub(crate) history: Vec<HistoryEntry>,
    #[serde(default)]
    pub(crate) review_verdict: ReviewVerdict,
    #[serde(default)]
    pub(crate) human_feedback: Option<String>,
    #[serde(default)]
    pub(crate) iteration_count: u32,
    /// Set when a human approval superseded a REJECTED verdict.
    #[serde(default)]
    pub(crate) approval_overridden: bool,
    #[serde(default)]
    pub(crate) final_document: Option<FinalDocument>,
    #[serde(default)]
    pub(crate) last_failure: Option<FailureContext>,
    pub(crate) created_at: TimestampUtc,
    pub(crate) updated_at: TimestampUtc,
}

impl WorkflowState {
    /// Creates a fresh state in `Init` for the given topic.
    pub fn new(topic: Topic, params: RunParameters) -> Self {
        let now = TimestampUtc::now();
        Self {
            run_id: RunId::new(),
            topic,
            params,
            phase: Phase::Init,
            research_material: Vec::new(),
            draft: None,
            history: Vec::new(),
            review_verdict: ReviewVerdict::Pending,
            human_feedback: None,
            iteration_count: 0,
            approval_overridden: false,
            final_document: None,
            last_failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn params(&self) -> &RunParameters {
        &self.params
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn research_material(&self) -> &[Excerpt] {
        &self.research_material
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn review_verdict(&self) -> &ReviewVerdict {
        &self.review_verdict
    }

    pub fn human_feedback(&self) -> Option<&str> {
        self.human_feedback.as_deref()
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn approval_overridden(&self) -> bool {
        self.approval_overridden
    }

    pub fn final_document(&self) -> Option<&FinalDocument> {
        self.final_document.as_ref()
    }

    pub fn last_failure(&self) -> Option<&FailureContext> {
        self.last_failure.as_ref()
    }

    pub fn created_at(&self) -> &TimestampUtc {
        &self.created_at
    }

    pub fn updated_at(&self) -> &TimestampUtc {
        &self.updated_at
    }

    /// Distinct source references in first-seen order.
    pub fn sources(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for excerpt in &self.research_material {
            let source = excerpt.source.as_str();
            if !source.is_empty() && !seen.contains(&source) {
                seen.push(source);
            }
        }
        seen
    }

    /// Revisions still allowed by the loop guard.
    pub fn revisions_remaining(&self) -> u32 {
        self.params
            .max_iterations
            .saturating_sub(self.iteration_count)
    }

    /// Loop guard: fails when dispatching one more revision would exceed the budget.
    pub fn check_revision_budget(&self) -> Result<(), WorkflowError> {
        if self.iteration_count >= self.params.max_iterations {
            return Err(WorkflowError::IterationBudgetExceeded {
                iteration_count: self.iteration_count,
                max_iterations: self.params.max_iterations,
            });
        }
        Ok(())
    }

    /// The single feedback source for the next revision.
    ///
    /// Pending human feedback takes precedence; otherwise the automated
    /// critique of a REJECTED verdict is used. Having neither is an error.
    pub fn revision_input(&self) -> Result<RevisionInput, WorkflowError> {
        if let Some(feedback) = self.human_feedback.as_deref() {
            if feedback.trim().is_empty() {
                return Err(WorkflowError::invalid_feedback("feedback is empty"));
            }
            return Ok(RevisionInput::HumanFeedback(feedback.to_string()));
        }
        match &self.review_verdict {
            ReviewVerdict::Rejected { critique } => Ok(RevisionInput::Critique(critique.clone())),
            other => Err(WorkflowError::invalid_transition(format!(
                "no revision input: verdict is {} and no human feedback is pending",
                other.label()
            ))),
        }
    }

    pub fn set_updated_at(&mut self) {
        self.updated_at = TimestampUtc::now();
    }

    /// Validated phase change. `Failed` is reachable from every non-terminal
    /// phase; entering `Exporting` requires an ACCEPTED verdict.
    pub fn transition(&mut self, to: Phase) -> Result<(), WorkflowError> {
        let valid = match (self.phase, to) {
            (from, Phase::Failed) => !from.is_terminal(),
            (Phase::Init, Phase::Researching)
            | (Phase::Researching, Phase::Drafting)
            | (Phase::Drafting, Phase::Reviewing)
            | (Phase::Reviewing, Phase::AwaitingHuman)
            | (Phase::Reviewing, Phase::Revising)
            | (Phase::AwaitingHuman, Phase::Revising)
            | (Phase::Revising, Phase::Reviewing)
            | (Phase::Exporting, Phase::Done) => true,
            (Phase::Reviewing, Phase::Exporting) | (Phase::AwaitingHuman, Phase::Exporting) => {
                if !self.review_verdict.is_accepted() {
                    return Err(WorkflowError::invalid_transition(format!(
                        "cannot export with verdict {}",
                        self.review_verdict.label()
                    )));
                }
                true
            }
            _ => false,
        };

        if valid {
            self.phase = to;
            Ok(())
        } else {
            Err(WorkflowError::invalid_transition(format!(
                "from {:?} to {:?}",
                self.phase, to
            )))
        }
    }
}
