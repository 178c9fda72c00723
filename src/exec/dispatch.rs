// src/exec/dispatch.rs

//! Production executor: routes each action to its kind-specific runner.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::engine::ResolvedVariables;
use crate::exec::backend::{ActionExecutor, ExecutionOutcome};
use crate::exec::command::run_command;
use crate::exec::console::{Console, header};
use crate::exec::manual;
use crate::plan::template::expand;
use crate::plan::{Action, ActionKind};

#[derive(Debug)]
pub struct PlanExecutor<C> {
    console: Arc<C>,
    dry_run: bool,
    interactive: bool,
}

impl<C: Console> PlanExecutor<C> {
    pub fn new(console: Arc<C>) -> Self {
        Self {
            console,
            dry_run: false,
            interactive: true,
        }
    }

    /// Print commands instead of running them.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Without input, manual steps fail and set-variable steps take their
    /// default.
    pub fn interactive(mut self, enabled: bool) -> Self {
        self.interactive = enabled;
        self
    }
}

impl<C: Console> ActionExecutor for PlanExecutor<C> {
    fn execute(
        &self,
        action: Action,
        variables: ResolvedVariables,
    ) -> Pin<Box<dyn Future<Output = ExecutionOutcome> + Send + 'static>> {
        let console = Arc::clone(&self.console);
        let dry_run = self.dry_run;
        let interactive = self.interactive;

        Box::pin(async move {
            let description = expand(&action.description, &variables);
            debug!(action = %action.id, kind = action.kind.label(), "executing");

            match action.kind {
                ActionKind::Command { command } => {
                    let cmd = expand(&command, &variables);
                    console.show(&header(&action.id));
                    console.show(&format!("\tRunning the following command:\n\t\t{cmd}"));
                    if dry_run {
                        console.show("\t\tAction not done, because this is a dry-run");
                        return ExecutionOutcome::success().with_summary("dry run");
                    }
                    run_command(&action.id, &cmd).await
                }
                ActionKind::Manual { prompt } => {
                    if !interactive {
                        return ExecutionOutcome::failure(
                            "manual step needs an operator, but input is disabled",
                        );
                    }
                    let prompt = expand(&prompt, &variables);
                    manual::confirm(console, action.id, description, prompt).await
                }
                ActionKind::SetVariable { variable, default } => {
                    let default = expand(&default, &variables);
                    if !interactive {
                        return ExecutionOutcome::success()
                            .with_summary(format!("{variable} = {default}"))
                            .with_assignment(variable, default);
                    }
                    manual::set_variable(console, action.id, description, variable, default)
                        .await
                }
            }
        })
    }
}
