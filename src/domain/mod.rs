//! Domain model for content runs.
//!
//! - **Types** (`types.rs`): artifacts, verdicts, run parameters, phases
//! - **Errors** (`errors.rs`): collaborator and workflow error taxonomy
//! - **Document** (`document.rs`): the rendered export artifact
//! - **Failure** (`failure.rs`): persisted failure context and retry policy

pub mod document;
pub mod errors;
pub mod failure;
pub mod types;

pub use document::FinalDocument;
pub use errors::{GenerationError, RenderError, RetrievalError, StepError, WorkflowError};
pub use failure::{FailureContext, FailureKind, FailurePolicy, RetryPolicy};
pub use types::{
    AuthorTag, ContentFormat, Draft, Excerpt, HistoryEntry, HumanReviewMode, Phase,
    ReviewVerdict, RevisionInput, RunId, Section, TimestampUtc, Tone, Topic,
};
