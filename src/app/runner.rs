//! Command dispatch for the `alchemist` binary.

use crate::app::cli::{Cli, Command, RunArgs};
use crate::app::terminal::{
    format_checkpoint, format_summary, spawn_progress_printer, write_outputs, CheckpointPrompt,
    CheckpointReply, WrittenOutputs,
};
use crate::collaborators::{CommandGenerator, CommandRetriever, PagedTextRenderer};
use crate::config::AlchemistConfig;
use crate::domain::{RunId, Topic};
use crate::orchestrator::{
    CancelHandle, Collaborators, Orchestrator, RunContext, RunProgress, RunReport,
};
use crate::paths;
use crate::session_store::{FileSessionStore, SessionStore};
use crate::state::WorkflowState;
use crate::state_machine::StateSnapshot;
use crate::structured_logger::StructuredLogger;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;

pub async fn run_cli(cli: Cli) -> Result<ExitCode> {
    let config = AlchemistConfig::resolve(cli.config.as_deref(), &paths::config_path()?)?;
    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(paths::sessions_dir()?)?);

    match cli.command {
        Command::Run(args) => start_run(args, &config, store).await,
        Command::Resume { run_id, output } => {
            let (orchestrator, rx) = resume(&run_id, &config, store)?;
            drive(orchestrator, rx, output).await
        }
        Command::RetryExport { run_id, output } => {
            let (mut orchestrator, rx) = resume(&run_id, &config, store)?;
            if !orchestrator.can_retry_export() {
                anyhow::bail!("Run {} did not fail while rendering; nothing to retry", run_id);
            }
            orchestrator.retry_export().await?;
            drive(orchestrator, rx, output).await
        }
        Command::List => {
            list_runs(store.as_ref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_context(config: &AlchemistConfig, store: Arc<dyn SessionStore>) -> RunContext {
    RunContext {
        collaborators: Collaborators {
            retriever: Arc::new(CommandRetriever::new(config.collaborators.retrieval.clone())),
            generator: Arc::new(CommandGenerator::new(config.collaborators.generation.clone())),
            renderer: Arc::new(PagedTextRenderer::new(
                config.render.lines_per_page,
                config.render.line_width,
            )),
        },
        store,
        failure_policy: config.failure_policy.clone(),
    }
}

fn run_logger(run_id: &RunId) -> Result<Arc<StructuredLogger>> {
    let id = run_id.to_string();
    let logger = StructuredLogger::new(&id, &paths::run_logs_dir(&id)?)
        .context("Failed to open run event log")?;
    Ok(Arc::new(logger))
}

async fn start_run(
    args: RunArgs,
    config: &AlchemistConfig,
    store: Arc<dyn SessionStore>,
) -> Result<ExitCode> {
    let topic = Topic::new(&args.topic_text()).context("Topic must not be empty")?;
    let mut params = config.workflow.clone();
    args.apply_to(&mut params);

    let state = WorkflowState::new(topic, params);
    let logger = run_logger(state.run_id())?;
    eprintln!("[alchemist] Run {}", state.run_id());
    eprintln!("[alchemist] Event log: {}", logger.path().display());

    let (orchestrator, rx) = Orchestrator::new(state, run_context(config, store), logger);
    drive(orchestrator, rx, args.output).await
}

fn resume(
    run_id: &str,
    config: &AlchemistConfig,
    store: Arc<dyn SessionStore>,
) -> Result<(Orchestrator, watch::Receiver<StateSnapshot>)> {
    let run_id =
        RunId::from_string(run_id).with_context(|| format!("Invalid run id: {}", run_id))?;
    let logger = run_logger(&run_id)?;
    Ok(Orchestrator::resume(&run_id, run_context(config, store), logger)?)
}

/// Runs to completion, asking the terminal at each checkpoint.
async fn drive(
    mut orchestrator: Orchestrator,
    rx: watch::Receiver<StateSnapshot>,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let printer = spawn_progress_printer(rx);
    let cancel = orchestrator.cancel_handle();
    let interrupt = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!("\n[alchemist] Cancelling... press Ctrl-C again to exit immediately");
        interrupt.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let mut prompt = CheckpointPrompt::new(tokio::io::BufReader::new(tokio::io::stdin()));
    let result = loop {
        let checkpoint = match orchestrator.run_until_checkpoint().await? {
            RunProgress::AwaitingHuman(checkpoint) => checkpoint,
            RunProgress::Finished(_) => break None,
        };
        println!("{}", format_checkpoint(&checkpoint));

        match answer_checkpoint(&mut orchestrator, &mut prompt, &cancel).await? {
            CheckpointOutcome::Continue => {}
            CheckpointOutcome::Suspended => break Some(checkpoint.run_id),
        }
    };
    ctrl_c.abort();
    printer.abort();

    if let Some(run_id) = result {
        eprintln!(
            "[alchemist] Run suspended. Continue with: alchemist resume {}",
            run_id
        );
        return Ok(ExitCode::SUCCESS);
    }

    if orchestrator.can_retry_export() {
        eprintln!(
            "[alchemist] Rendering failed. Retry with: alchemist retry-export {}",
            orchestrator.state().run_id()
        );
    }
    let dir = output_dir(output)?;
    let (report, written) = deliver(orchestrator, &dir)?;
    println!("{}", format_summary(&report));
    if let Some(document) = &written.document {
        println!("Document: {}", document.display());
    }
    println!("Report: {}", written.report.display());

    Ok(if report.is_done() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

enum CheckpointOutcome {
    Continue,
    Suspended,
}

/// Waits for a usable answer. Cancellation while waiting aborts the run.
async fn answer_checkpoint<R>(
    orchestrator: &mut Orchestrator,
    prompt: &mut CheckpointPrompt<R>,
    cancel: &CancelHandle,
) -> Result<CheckpointOutcome>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    loop {
        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                orchestrator.abort("cancelled at review checkpoint")?;
                return Ok(CheckpointOutcome::Continue);
            }
            reply = prompt.ask() => reply?,
        };
        match reply {
            CheckpointReply::Suspend => return Ok(CheckpointOutcome::Suspended),
            CheckpointReply::Abort => {
                orchestrator.abort("aborted at review checkpoint")?;
                return Ok(CheckpointOutcome::Continue);
            }
            CheckpointReply::Action(action) => match orchestrator.submit_human_action(action) {
                Ok(()) => return Ok(CheckpointOutcome::Continue),
                Err(e) if e.is_recoverable() => eprintln!("[checkpoint] {}", e),
                Err(e) => return Err(e.into()),
            },
        }
    }
}

/// Writes the run's outputs, then discards its persisted snapshot. A failed
/// write keeps the snapshot so the outputs can be produced again.
fn deliver(orchestrator: Orchestrator, dir: &Path) -> Result<(RunReport, WrittenOutputs)> {
    let report = orchestrator.report()?;
    let written = write_outputs(&report, dir).with_context(|| {
        format!(
            "Run {} was kept; write its outputs with: alchemist resume {} --output <dir>",
            report.run_id, report.run_id
        )
    })?;
    orchestrator.finish()?;
    Ok((report, written))
}

fn output_dir(output: Option<PathBuf>) -> Result<PathBuf> {
    match output {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("Failed to determine current directory"),
    }
}

fn list_runs(store: &dyn SessionStore) -> Result<()> {
    let runs = store.list()?;
    if runs.is_empty() {
        println!("No persisted runs.");
        return Ok(());
    }
    println!(
        "{:<36}  {:<16}  {:>9}  {:<25}  TOPIC",
        "RUN ID", "PHASE", "REVISIONS", "SAVED"
    );
    for run in runs {
        println!(
            "{:<36}  {:<16}  {:>9}  {:<25}  {}",
            run.run_id,
            run.phase.label(),
            format!("{}/{}", run.iteration_count, run.max_iterations),
            run.saved_at,
            run.topic
        );
    }
    Ok(())
}
