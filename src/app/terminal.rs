//! Terminal surface for the human checkpoint and run progress.

use crate::domain::{Phase, ReviewVerdict};
use crate::orchestrator::{Checkpoint, HumanAction, RunOutcome, RunReport};
use crate::state_machine::StateSnapshot;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const HELP: &str = "Commands: approve | revise <feedback> | suspend | abort";

/// What the human answered at the checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointReply {
    Action(HumanAction),
    /// Leave the run persisted and exit; `alchemist resume` continues it.
    Suspend,
    Abort,
}

/// Parses one line of checkpoint input. `None` means unrecognized.
///
/// A bare `revise` yields empty feedback, which the run rejects as invalid.
pub fn parse_reply(line: &str) -> Option<CheckpointReply> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    match word.to_lowercase().as_str() {
        "approve" | "a" if rest.is_empty() => Some(CheckpointReply::Action(HumanAction::Approve)),
        "revise" | "r" => Some(CheckpointReply::Action(HumanAction::Revise {
            feedback: rest.to_string(),
        })),
        "suspend" | "s" => Some(CheckpointReply::Suspend),
        "abort" | "quit" | "q" => Some(CheckpointReply::Abort),
        _ => None,
    }
}

pub fn format_checkpoint(checkpoint: &Checkpoint) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n=== REVIEW CHECKPOINT (run {}) ===\n\n",
        checkpoint.run_id
    ));
    out.push_str(&checkpoint.draft.to_markdown());
    out.push_str(&format!("\nVerdict: {}\n", checkpoint.verdict.label()));
    if let ReviewVerdict::Rejected { critique } = &checkpoint.verdict {
        out.push_str(&format!("Critique: {}\n", critique));
    }
    out.push_str(&format!(
        "Revisions used: {}, remaining: {}\n",
        checkpoint.iteration_count, checkpoint.revisions_remaining
    ));
    out
}

/// Reads checkpoint replies line by line from any async reader.
pub struct CheckpointPrompt<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> CheckpointPrompt<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Asks until a recognized reply arrives. End of input suspends the run.
    pub async fn ask(&mut self) -> Result<CheckpointReply> {
        loop {
            eprintln!("{}", HELP);
            eprint!("> ");
            let Some(line) = self
                .lines
                .next_line()
                .await
                .context("Failed to read checkpoint input")?
            else {
                return Ok(CheckpointReply::Suspend);
            };
            if let Some(reply) = parse_reply(&line) {
                return Ok(reply);
            }
            eprintln!("[checkpoint] Unrecognized input: {}", line.trim());
        }
    }
}

/// Prints a line whenever the run changes phase.
pub fn spawn_progress_printer(mut rx: watch::Receiver<StateSnapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_phase: Option<Phase> = None;
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if last_phase == Some(snapshot.phase) {
                continue;
            }
            last_phase = Some(snapshot.phase);
            eprintln!("{}", progress_line(&snapshot));
        }
    })
}

pub fn progress_line(snapshot: &StateSnapshot) -> String {
    let mut line = format!(
        "[{}] {} ({}/{} revisions)",
        snapshot.phase.with_iteration(snapshot.iteration_count),
        snapshot.topic,
        snapshot.iteration_count,
        snapshot.max_iterations
    );
    if let Some(kind) = snapshot.failure {
        line.push_str(&format!(" - {}", kind.display_name()));
    }
    line
}

/// Files written for a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutputs {
    pub document: Option<PathBuf>,
    pub report: PathBuf,
}

/// Writes the exported document (if any) and `<name>.report.json` into `dir`.
pub fn write_outputs(report: &RunReport, dir: &Path) -> Result<WrittenOutputs> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let (document, report_name) = match &report.outcome {
        RunOutcome::Done { document } => {
            let path = dir.join(&document.file_name);
            std::fs::write(&path, &document.bytes)
                .with_context(|| format!("Failed to write document: {}", path.display()))?;
            (Some(path), format!("{}.report.json", document.file_name))
        }
        RunOutcome::Failed { .. } => (None, format!("{}.report.json", report.run_id)),
    };

    let report_path = dir.join(report_name);
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    std::fs::write(&report_path, json)
        .with_context(|| format!("Failed to write report: {}", report_path.display()))?;

    Ok(WrittenOutputs {
        document,
        report: report_path,
    })
}

pub fn format_summary(report: &RunReport) -> String {
    match &report.outcome {
        RunOutcome::Done { document } => format!(
            "Done: \"{}\" exported as {} ({} page(s), {} revision(s){})",
            report.topic,
            document.file_name,
            document.page_count,
            report.iteration_count,
            if report.approval_overridden {
                ", approved over a rejection"
            } else {
                ""
            }
        ),
        RunOutcome::Failed { failure } => format!(
            "Failed: {} during {} after {} revision(s): {}",
            failure.kind.display_name(),
            failure.phase,
            failure.iteration,
            failure.message
        ),
    }
}
