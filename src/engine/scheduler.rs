// src/engine/scheduler.rs

//! The run loop.
//!
//! Each iteration asks the dependency engine for the ready set, dispatches it
//! as one batch, joins every result and records it, then recomputes. Failures
//! are recorded on the action and pushed down to its dependents as `Blocked`
//! before the next ready set is computed. The loop ends when nothing is ready:
//! `Completed` if everything succeeded, `Stalled` otherwise.
//!
//! The scheduler is the only writer of the [`StateStore`], and every
//! transition is persisted before the next one is attempted.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dag::{blocked_set, classify, ready_set};
use crate::engine::report::{RunOutcome, RunReport};
use crate::engine::variables::{ResolvedVariables, VariableResolver, VariableSource};
use crate::errors::{PlanrunError, Result};
use crate::exec::{ActionExecutor, ExecutionOutcome};
use crate::plan::{Action, Plan, PlanSettings};
use crate::state::{StateStore, TransitionMeta};
use crate::types::{ActionId, DispatchMode, DispatchOrder, Status};

/// Summary recorded for an action whose executor task panicked.
const PANICKED: &str = "executor task panicked";

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Initializing,
    Running,
    Completed,
    Stalled,
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerOptions {
    pub order: DispatchOrder,
    pub mode: DispatchMode,
    /// Seed for `DispatchOrder::Shuffled`; random when absent.
    pub seed: Option<u64>,
    /// Applies to actions without their own `timeout`.
    pub default_timeout: Option<Duration>,
    /// Reset failed and blocked actions to pending before the loop.
    pub retry_failed: bool,
}

impl SchedulerOptions {
    pub fn from_settings(settings: &PlanSettings) -> Self {
        Self {
            order: settings.dispatch_order,
            mode: settings.dispatch_mode,
            seed: settings.seed,
            default_timeout: settings.action_timeout,
            retry_failed: false,
        }
    }
}

pub struct Scheduler<'p, E: ?Sized, S> {
    plan: &'p Plan,
    store: StateStore,
    executor: Arc<E>,
    variables: VariableResolver<S>,
    options: SchedulerOptions,
    phase: RunPhase,
    rng: StdRng,
    executed: Vec<ActionId>,
    iterations: usize,
}

impl<E: ?Sized, S> std::fmt::Debug for Scheduler<'_, E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("phase", &self.phase)
            .field("options", &self.options)
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

impl<'p, E, S> Scheduler<'p, E, S>
where
    E: ActionExecutor + ?Sized,
    S: VariableSource,
{
    pub fn new(
        plan: &'p Plan,
        store: StateStore,
        executor: Arc<E>,
        source: S,
        options: SchedulerOptions,
    ) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            plan,
            store,
            executor,
            variables: VariableResolver::new(source),
            options,
            phase: RunPhase::Initializing,
            rng,
            executed: Vec::new(),
            iterations: 0,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn into_store(self) -> StateStore {
        self.store
    }

    pub fn variables(&self) -> &VariableResolver<S> {
        &self.variables
    }

    /// Fix a variable's value before the run starts.
    pub fn preset_variable(&mut self, name: &str, value: &str) {
        self.variables.preset(name, value);
    }

    /// Drive the plan until it completes or stalls.
    ///
    /// Only fatal errors are returned (a failing snapshot write, or a broken
    /// store invariant). A failing action is recorded and the loop goes on.
    pub async fn run(&mut self) -> Result<RunReport> {
        self.phase = RunPhase::Initializing;
        self.initialize()?;

        self.phase = RunPhase::Running;
        info!(actions = self.plan.len(), mode = ?self.options.mode, order = ?self.options.order, "run started");

        loop {
            let ready = ready_set(self.plan, self.store.state());
            if ready.is_empty() {
                break;
            }

            self.iterations += 1;
            let batch = self.order_batch(ready);
            debug!(iteration = self.iterations, ?batch, "dispatching ready set");

            match self.options.mode {
                DispatchMode::Sequential => {
                    for id in &batch {
                        self.run_one(id).await?;
                    }
                }
                DispatchMode::Concurrent => self.run_concurrent(batch).await?,
            }
        }

        let outcome = if self.store.state().all_succeeded() {
            self.phase = RunPhase::Completed;
            RunOutcome::Completed
        } else {
            self.phase = RunPhase::Stalled;
            RunOutcome::Stalled
        };

        let report = RunReport::build(
            self.plan,
            self.store.state(),
            outcome,
            self.executed.clone(),
            self.store.interrupted().to_vec(),
            self.iterations,
        );
        info!(
            outcome = ?outcome,
            succeeded = report.succeeded,
            total = report.total,
            executed = report.executed.len(),
            "run finished"
        );
        Ok(report)
    }

    fn initialize(&mut self) -> Result<()> {
        for id in self.store.interrupted() {
            info!(action = %id, "re-dispatching action interrupted by the previous run");
        }

        if self.options.retry_failed {
            let reset = self.store.reset_all_failed("retry requested on resume")?;
            if !reset.is_empty() {
                info!(count = reset.len(), ?reset, "failed and blocked actions reset for retry");
            }
        }

        let persisted = self.store.persisted_variables();
        self.variables.restore(&persisted);

        self.propagate_blocked()?;

        for blocked in classify(self.plan, self.store.state()).blocked {
            if blocked.root == blocked.id {
                warn!(action = %blocked.id, "{}", blocked.reason());
            }
        }

        self.store.persist()
    }

    fn order_batch(&mut self, mut batch: Vec<ActionId>) -> Vec<ActionId> {
        if self.options.order == DispatchOrder::Shuffled {
            batch.shuffle(&mut self.rng);
        }
        batch
    }

    async fn run_one(&mut self, id: &str) -> Result<()> {
        let action = self.action(id)?;
        let Some(vars) = self.prepare(&action).await? else {
            return Ok(());
        };

        self.start(id)?;
        let timeout = self.timeout_for(&action);
        let fut = self.executor.execute(action, vars);
        // A panic in the executor becomes a failed action, as in concurrent mode.
        let outcome = match tokio::spawn(with_action_timeout(fut, timeout)).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(action = %id, error = %err, "action task did not complete");
                ExecutionOutcome::failure(PANICKED)
            }
        };
        self.finish(id, outcome)
    }

    async fn run_concurrent(&mut self, batch: Vec<ActionId>) -> Result<()> {
        // Variables are resolved up front, one at a time, so prompts never
        // overlap.
        let mut prepared: Vec<(Action, ResolvedVariables)> = Vec::new();
        for id in &batch {
            let action = self.action(id)?;
            if let Some(vars) = self.prepare(&action).await? {
                prepared.push((action, vars));
            }
        }

        let mut started: Vec<ActionId> = Vec::new();
        let mut set = JoinSet::new();
        for (action, vars) in prepared {
            let id = action.id.clone();
            self.start(&id)?;
            let timeout = self.timeout_for(&action);
            let fut = self.executor.execute(action, vars);
            started.push(id.clone());
            set.spawn(async move { (id, with_action_timeout(fut, timeout).await) });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, outcome)) => self.finish(&id, outcome)?,
                Err(err) => error!(error = %err, "action task did not complete"),
            }
        }

        for id in started {
            if self.store.status_of(&id) == Some(Status::Running) {
                self.finish(&id, ExecutionOutcome::failure(PANICKED))?;
            }
        }
        Ok(())
    }

    fn action(&self, id: &str) -> Result<Action> {
        self.plan
            .action(id)
            .cloned()
            .ok_or_else(|| PlanrunError::UnknownAction(id.to_string()))
    }

    fn timeout_for(&self, action: &Action) -> Option<Duration> {
        action.timeout.or(self.options.default_timeout)
    }

    /// Resolve the action's variables. A resolution failure fails the action
    /// and returns `None`.
    async fn prepare(&mut self, action: &Action) -> Result<Option<ResolvedVariables>> {
        match self.variables.resolve_for(self.plan, action).await {
            Ok(vars) => {
                self.record_new_variables();
                Ok(Some(vars))
            }
            Err(err) => {
                warn!(action = %action.id, error = %err, "variable resolution failed");
                self.store.transition(
                    &action.id,
                    Status::Pending,
                    Status::Failed,
                    TransitionMeta::now().with_summary(err.to_string()),
                )?;
                self.propagate_blocked()?;
                Ok(None)
            }
        }
    }

    fn start(&mut self, id: &str) -> Result<()> {
        info!(action = %id, "action started");
        self.store
            .transition(id, Status::Pending, Status::Running, TransitionMeta::now())
    }

    fn finish(&mut self, id: &str, outcome: ExecutionOutcome) -> Result<()> {
        for (name, value) in outcome.assignments {
            self.variables.assign(&name, value, id);
        }
        self.record_new_variables();

        let to = if outcome.succeeded {
            Status::Succeeded
        } else {
            Status::Failed
        };
        let meta = TransitionMeta::now().with_optional_summary(outcome.summary.clone());
        self.store.transition(id, Status::Running, to, meta)?;
        self.executed.push(id.to_string());

        if outcome.succeeded {
            info!(action = %id, "action succeeded");
        } else {
            let err = PlanrunError::ActionExecution {
                action: id.to_string(),
                reason: outcome.summary.unwrap_or_else(|| "no details".to_string()),
            };
            warn!("{err}");
            self.propagate_blocked()?;
        }
        Ok(())
    }

    fn record_new_variables(&mut self) {
        for var in self.variables.take_new() {
            self.store
                .record_variable(&var.name, &var.value, &var.provenance.to_string());
        }
    }

    /// Mark every pending action with a failed or blocked ancestor.
    fn propagate_blocked(&mut self) -> Result<()> {
        for blocked in blocked_set(self.plan, self.store.state()) {
            let reason = blocked.reason();
            info!(action = %blocked.id, root = %blocked.root, "action blocked");
            self.store.transition(
                &blocked.id,
                Status::Pending,
                Status::Blocked,
                TransitionMeta::now().with_summary(reason),
            )?;
        }
        Ok(())
    }
}

async fn with_action_timeout(
    fut: Pin<Box<dyn Future<Output = ExecutionOutcome> + Send + 'static>>,
    timeout: Option<Duration>,
) -> ExecutionOutcome {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(outcome) => outcome,
            Err(_) => ExecutionOutcome::failure(format!("timed out after {limit:?}")),
        },
        None => fut.await,
    }
}
