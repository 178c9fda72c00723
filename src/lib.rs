// src/lib.rs

pub mod cli;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod export;
pub mod logging;
pub mod plan;
pub mod state;
pub mod types;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::cli::{CliArgs, Command, ExecArgs, GraphFormat};
use crate::dag::classify;
use crate::engine::{
    RunOutcome, Scheduler, SchedulerOptions, StaticSource, VariableSource,
};
use crate::errors::{PlanrunError, Result};
use crate::exec::{ActionExecutor, ConsoleSource, PlanExecutor, StdConsole};
use crate::export::{GraphView, render_dot};
use crate::plan::{Plan, load_and_validate};
use crate::state::{ExecutionState, FileSink, Snapshot, StateStore, check_snapshot};
use crate::types::{DispatchMode, DispatchOrder};

/// Directory for snapshots when `--state` is not given.
pub const DEFAULT_STATE_DIR: &str = ".planrun";

/// How a command ended, for the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Every action succeeded.
    Completed,
    /// The run cannot go further without an operator.
    Stalled,
    /// Stopped by Ctrl-C.
    Interrupted,
    /// A command that does not run the plan finished.
    Done,
}

impl CommandOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            CommandOutcome::Completed | CommandOutcome::Done => 0,
            CommandOutcome::Stalled => 2,
            CommandOutcome::Interrupted => 130,
        }
    }
}

/// Exit code for a command that failed with `err`.
pub fn error_exit_code(err: &PlanrunError) -> i32 {
    if err.is_validation() { 3 } else { 1 }
}

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<CommandOutcome> {
    match args.command {
        Command::Run { plan, state, exec } => run_fresh(&plan, state, &exec).await,
        Command::Resume {
            snapshot,
            plan,
            retry_failed,
            exec,
        } => resume(&snapshot, plan.as_deref(), retry_failed, &exec).await,
        Command::Graph {
            file,
            state,
            format,
        } => graph(&file, state.as_deref(), format),
        Command::Status { snapshot, plan } => status(&snapshot, plan.as_deref()),
        Command::Reset {
            snapshot,
            action,
            cascade,
            note,
            plan,
        } => reset(&snapshot, &action, cascade, note.as_deref(), plan.as_deref()),
        Command::MarkDone {
            snapshot,
            action,
            note,
            plan,
        } => mark_done(&snapshot, &action, note.as_deref(), plan.as_deref()),
    }
}

/// `.planrun/<plan stem>.state.json`
pub fn default_state_path(plan_path: &Path) -> PathBuf {
    let stem = plan_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plan".to_string());
    Path::new(DEFAULT_STATE_DIR).join(format!("{stem}.state.json"))
}

async fn run_fresh(plan_path: &Path, state: Option<PathBuf>, exec: &ExecArgs) -> Result<CommandOutcome> {
    let plan = load_and_validate(plan_path)?;
    let state_path = state.unwrap_or_else(|| default_state_path(plan_path));

    if state_path.exists() {
        warn!(path = %state_path.display(), "overwriting existing snapshot; use `resume` to continue it");
    }

    let store = StateStore::fresh(&plan, Box::new(FileSink::new(&state_path)));
    execute(&plan, store, exec, false).await
}

async fn resume(
    snapshot_path: &Path,
    plan_override: Option<&Path>,
    retry_failed: bool,
    exec: &ExecArgs,
) -> Result<CommandOutcome> {
    let snapshot = Snapshot::read_from(snapshot_path)?;
    let plan = plan_for_snapshot(&snapshot, plan_override)?;
    let store = StateStore::load(&plan, snapshot, Box::new(FileSink::new(snapshot_path)))?;
    execute(&plan, store, exec, retry_failed).await
}

/// Load the plan a snapshot belongs to, preferring an explicit path.
fn plan_for_snapshot(snapshot: &Snapshot, plan_override: Option<&Path>) -> Result<Plan> {
    let path = match (plan_override, snapshot.plan.as_deref()) {
        (Some(path), _) => path,
        (None, Some(path)) => path,
        (None, None) => {
            return Err(PlanrunError::StateCorruption(
                "snapshot does not name its plan; pass --plan".to_string(),
            ));
        }
    };
    load_and_validate(path)
}

fn scheduler_options(plan: &Plan, exec: &ExecArgs, retry_failed: bool) -> SchedulerOptions {
    let mut options = SchedulerOptions::from_settings(plan.settings());
    if exec.concurrent {
        options.mode = DispatchMode::Concurrent;
    }
    if exec.shuffle {
        options.order = DispatchOrder::Shuffled;
    }
    if exec.seed.is_some() {
        options.seed = exec.seed;
    }
    if exec.timeout.is_some() {
        options.default_timeout = exec.timeout;
    }
    options.retry_failed = retry_failed;
    options
}

async fn execute(
    plan: &Plan,
    mut store: StateStore,
    exec: &ExecArgs,
    retry_failed: bool,
) -> Result<CommandOutcome> {
    let options = scheduler_options(plan, exec, retry_failed);
    store.set_persist_variables(plan.settings().persist_variables || exec.persist_variables);

    for (name, _) in &exec.vars {
        if plan.variable(name).is_none() {
            warn!(variable = %name, "--var names a variable the plan does not declare");
        }
    }

    let console = Arc::new(StdConsole::new());
    let executor = Arc::new(
        PlanExecutor::new(Arc::clone(&console))
            .dry_run(exec.dry_run)
            .interactive(!exec.no_input),
    );

    if exec.no_input {
        drive(plan, store, executor, StaticSource::new(), options, &exec.vars).await
    } else {
        drive(plan, store, executor, ConsoleSource::new(console), options, &exec.vars).await
    }
}

async fn drive<E, S>(
    plan: &Plan,
    store: StateStore,
    executor: Arc<E>,
    source: S,
    options: SchedulerOptions,
    presets: &[(String, String)],
) -> Result<CommandOutcome>
where
    E: ActionExecutor,
    S: VariableSource,
{
    let location = store.sink().location().map(Path::to_path_buf);
    let mut scheduler = Scheduler::new(plan, store, executor, source, options);
    for (name, value) in presets {
        scheduler.preset_variable(name, value);
    }

    if let Some(title) = plan.title() {
        info!(title = %title, "starting plan");
    }

    tokio::select! {
        result = scheduler.run() => {
            let report = result?;
            println!();
            println!("{report}");
            match report.outcome {
                RunOutcome::Completed => Ok(CommandOutcome::Completed),
                RunOutcome::Stalled => {
                    print_resume_hint(location.as_deref());
                    Ok(CommandOutcome::Stalled)
                }
            }
        }
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("interrupted; the last snapshot is kept");
            print_resume_hint(location.as_deref());
            Ok(CommandOutcome::Interrupted)
        }
    }
}

fn print_resume_hint(location: Option<&Path>) {
    if let Some(path) = location {
        println!();
        println!(
            "Execution stopped, you can resume by running\n\tplanrun resume {}",
            path.display()
        );
    }
}

/// Load a snapshot for inspection, without the resume-time reset of
/// running actions.
fn inspect(snapshot_path: &Path, plan_override: Option<&Path>) -> Result<(Plan, Snapshot)> {
    let snapshot = Snapshot::read_from(snapshot_path)?;
    let plan = plan_for_snapshot(&snapshot, plan_override)?;
    if !snapshot.actions.is_empty() {
        check_snapshot(&plan, &snapshot)?;
    }
    Ok((plan, snapshot))
}

fn state_of(plan: &Plan, snapshot: &Snapshot) -> ExecutionState {
    if snapshot.actions.is_empty() {
        ExecutionState::pending_for(plan)
    } else {
        ExecutionState::from_records(snapshot.actions.clone())
    }
}

fn looks_like_snapshot(path: &Path) -> Result<bool> {
    let text = fs::read_to_string(path)?;
    Ok(text.trim_start().starts_with('{'))
}

fn graph(file: &Path, state: Option<&Path>, format: GraphFormat) -> Result<CommandOutcome> {
    let (plan, snapshot) = if looks_like_snapshot(file)? {
        let (plan, snapshot) = inspect(file, None)?;
        (plan, Some(snapshot))
    } else {
        let plan = load_and_validate(file)?;
        let snapshot = match state {
            Some(path) => {
                let snapshot = Snapshot::read_from(path)?;
                if !snapshot.actions.is_empty() {
                    check_snapshot(&plan, &snapshot)?;
                }
                Some(snapshot)
            }
            None => None,
        };
        (plan, snapshot)
    };

    let exec_state = snapshot.as_ref().map(|s| state_of(&plan, s));
    let view = GraphView::build(&plan, exec_state.as_ref());

    match format {
        GraphFormat::Dot => print!("{}", render_dot(&view)),
        GraphFormat::Json => print!("{}", view.to_json()?),
    }
    Ok(CommandOutcome::Done)
}

fn status(snapshot_path: &Path, plan_override: Option<&Path>) -> Result<CommandOutcome> {
    let (plan, snapshot) = inspect(snapshot_path, plan_override)?;
    let state = state_of(&plan, &snapshot);
    let classes = classify(&plan, &state);

    if let Some(title) = plan.title() {
        println!("{title}");
    }
    let width = plan.action_ids().map(str::len).max().unwrap_or(0);
    for id in plan.graph().topological_order() {
        let status = classes.status_of(id).unwrap_or_default();
        let record = state.record(id);
        let detail = match classes.blocked_entry(id) {
            Some(blocked) => blocked.reason(),
            None => record.and_then(|r| r.summary.clone()).unwrap_or_default(),
        };
        let attempts = record.map(|r| r.attempts).unwrap_or(0);
        println!("  {id:<width$}  {:<9}  {attempts:>2}  {detail}", status.as_str());
    }
    if !snapshot.audit.is_empty() {
        println!("\n{} audited edit(s)", snapshot.audit.len());
    }

    Ok(CommandOutcome::Done)
}

fn reset(
    snapshot_path: &Path,
    action: &str,
    cascade: bool,
    note: Option<&str>,
    plan_override: Option<&Path>,
) -> Result<CommandOutcome> {
    let snapshot = Snapshot::read_from(snapshot_path)?;
    let plan = plan_for_snapshot(&snapshot, plan_override)?;
    let mut store = StateStore::load(&plan, snapshot, Box::new(FileSink::new(snapshot_path)))?;

    let changed = store.reset(&plan, action, cascade, note)?;
    println!("reset to pending: {}", changed.join(", "));
    Ok(CommandOutcome::Done)
}

fn mark_done(
    snapshot_path: &Path,
    action: &str,
    note: Option<&str>,
    plan_override: Option<&Path>,
) -> Result<CommandOutcome> {
    let snapshot = Snapshot::read_from(snapshot_path)?;
    let plan = plan_for_snapshot(&snapshot, plan_override)?;
    let mut store = StateStore::load(&plan, snapshot, Box::new(FileSink::new(snapshot_path)))?;

    store.mark_succeeded(action, note)?;
    println!("marked succeeded: {action}");
    Ok(CommandOutcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_separate_stalled_from_invalid() {
        assert_eq!(CommandOutcome::Completed.exit_code(), 0);
        assert_eq!(CommandOutcome::Stalled.exit_code(), 2);
        assert_eq!(
            error_exit_code(&PlanrunError::CyclicDependency("a".to_string())),
            3
        );
        assert_eq!(
            error_exit_code(&PlanrunError::StateCorruption("x".to_string())),
            3
        );
        assert_eq!(
            error_exit_code(&PlanrunError::Io(std::io::Error::other("disk"))),
            1
        );
    }

    #[test]
    fn default_state_path_uses_plan_stem() {
        assert_eq!(
            default_state_path(Path::new("plans/rotate-certs.toml")),
            PathBuf::from(".planrun/rotate-certs.state.json")
        );
    }
}
