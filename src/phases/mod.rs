//! The five pipeline steps and their text helpers.
//!
//! Steps read a `&WorkflowState` and return typed outputs; the orchestrator
//! turns those outputs into state-machine commands.

pub mod cleaner;
pub mod draft_parser;
pub mod drafting;
pub mod export;
pub mod prompts;
pub mod research;
pub mod reviewing;
pub mod revising;
pub mod verdict;

pub use drafting::run_drafting;
pub use export::run_export;
pub use research::run_research;
pub use reviewing::run_review;
pub use revising::run_revision;
