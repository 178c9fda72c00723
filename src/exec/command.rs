// src/exec/command.rs

//! Shell-backed command actions.

use std::collections::VecDeque;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::exec::backend::ExecutionOutcome;

/// Stderr lines kept for the failure summary.
const STDERR_TAIL: usize = 5;

/// Run `cmd` through the platform shell and report success on exit status 0.
///
/// Stdout goes straight to the operator's terminal. Stderr is logged and its
/// last lines become the summary of a failed run.
pub async fn run_command(action_id: &str, cmd: &str) -> ExecutionOutcome {
    match run_command_inner(action_id, cmd).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(action = %action_id, error = %err, "command execution error");
            ExecutionOutcome::failure(format!("{err:#}"))
        }
    }
}

async fn run_command_inner(action_id: &str, cmd: &str) -> Result<ExecutionOutcome> {
    info!(action = %action_id, cmd = %cmd, "starting command");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for action '{action_id}'"))?;

    // Always consume stderr so buffers don't fill.
    let stderr_task = child.stderr.take().map(|stderr| {
        let action = action_id.to_string();
        tokio::spawn(async move {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(action = %action, "stderr: {}", line);
                if tail.len() == STDERR_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail
        })
    });

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of action '{action_id}'"))?;

    let tail = match stderr_task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => VecDeque::new(),
    };

    let code = status.code().unwrap_or(-1);
    info!(
        action = %action_id,
        exit_code = code,
        success = status.success(),
        "command exited"
    );

    if status.success() {
        return Ok(ExecutionOutcome::success());
    }

    let mut summary = format!("exit code {code}");
    if !tail.is_empty() {
        summary.push_str(": ");
        summary.push_str(&Vec::from(tail).join(" | "));
    }
    Ok(ExecutionOutcome::failure(summary))
}
