pub mod cli;
pub mod runner;
pub mod terminal;

pub use cli::Cli;
pub use runner::run_cli;
