use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use planrun::engine::ResolvedVariables;
use planrun::exec::{ActionExecutor, ExecutionOutcome};
use planrun::plan::Action;

#[derive(Default)]
struct Script {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delays: HashMap<String, Duration>,
    assignments: HashMap<String, Vec<(String, String)>>,
    executed: Vec<String>,
    seen: HashMap<String, ResolvedVariables>,
    in_flight: usize,
    max_in_flight: usize,
}

/// A fake executor that:
/// - records which actions were "run" and with which variables
/// - succeeds unless told to fail (or panic) for a given action
/// - can hold an action for a while to exercise timeouts and concurrency.
///
/// Clones share the same script and records.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    script: Arc<Mutex<Script>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self, id: &str) -> Self {
        self.script.lock().unwrap().failing.insert(id.to_string());
        self
    }

    pub fn panicking(self, id: &str) -> Self {
        self.script.lock().unwrap().panicking.insert(id.to_string());
        self
    }

    pub fn delayed(self, id: &str, delay: Duration) -> Self {
        self.script
            .lock()
            .unwrap()
            .delays
            .insert(id.to_string(), delay);
        self
    }

    /// Make `id` report a variable assignment when it succeeds.
    pub fn assigning(self, id: &str, variable: &str, value: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .assignments
            .entry(id.to_string())
            .or_default()
            .push((variable.to_string(), value.to_string()));
        self
    }

    /// Actions in the order `execute` was called.
    pub fn executed(&self) -> Vec<String> {
        self.script.lock().unwrap().executed.clone()
    }

    pub fn calls(&self) -> usize {
        self.script.lock().unwrap().executed.len()
    }

    pub fn count(&self, id: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .executed
            .iter()
            .filter(|e| *e == id)
            .count()
    }

    /// Variables passed on the most recent execution of `id`.
    pub fn variables_for(&self, id: &str) -> Option<ResolvedVariables> {
        self.script.lock().unwrap().seen.get(id).cloned()
    }

    /// Most actions observed executing at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.script.lock().unwrap().max_in_flight
    }
}

impl ActionExecutor for FakeExecutor {
    fn execute(
        &self,
        action: Action,
        variables: ResolvedVariables,
    ) -> Pin<Box<dyn Future<Output = ExecutionOutcome> + Send + 'static>> {
        let script = Arc::clone(&self.script);

        let (fail, panic, delay, assignments) = {
            let mut guard = script.lock().unwrap();
            guard.executed.push(action.id.clone());
            guard.seen.insert(action.id.clone(), variables);
            guard.in_flight += 1;
            guard.max_in_flight = guard.max_in_flight.max(guard.in_flight);
            (
                guard.failing.contains(&action.id),
                guard.panicking.contains(&action.id),
                guard.delays.get(&action.id).copied(),
                guard.assignments.get(&action.id).cloned().unwrap_or_default(),
            )
        };

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            script.lock().unwrap().in_flight -= 1;

            if panic {
                panic!("scripted panic in action '{}'", action.id);
            }
            if fail {
                return ExecutionOutcome::failure(format!("scripted failure of '{}'", action.id));
            }

            let mut outcome = ExecutionOutcome::success();
            for (name, value) in assignments {
                outcome = outcome.with_assignment(name, value);
            }
            outcome
        })
    }
}
