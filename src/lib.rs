//! Content workflow orchestration: research a topic, draft, review, revise
//! under a loop guard with an optional human checkpoint, and export.

pub mod app;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod orchestrator;
pub mod paths;
pub mod phases;
pub mod session_store;
pub mod state;
pub mod state_machine;
pub mod structured_logger;
