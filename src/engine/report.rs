// src/engine/report.rs

use std::fmt;

use crate::dag::classify;
use crate::plan::Plan;
use crate::state::ExecutionState;
use crate::types::{ActionId, Status};

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every action succeeded.
    Completed,
    /// Nothing else can run, but not every action succeeded.
    Stalled,
}

/// An action left behind by a stalled run, with the reason it did not finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnfinishedAction {
    pub id: ActionId,
    pub status: Status,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub total: usize,
    pub succeeded: usize,
    /// Actions dispatched during this invocation, in completion order.
    pub executed: Vec<ActionId>,
    /// Actions reset from `Running` when the snapshot was loaded.
    pub interrupted: Vec<ActionId>,
    /// Every action not `Succeeded`, in topological order.
    pub unfinished: Vec<UnfinishedAction>,
    /// Ready batches dispatched.
    pub iterations: usize,
}

impl RunReport {
    pub fn build(
        plan: &Plan,
        state: &ExecutionState,
        outcome: RunOutcome,
        executed: Vec<ActionId>,
        interrupted: Vec<ActionId>,
        iterations: usize,
    ) -> Self {
        Self {
            outcome,
            total: plan.len(),
            succeeded: state.count(Status::Succeeded),
            executed,
            interrupted,
            unfinished: unfinished_actions(plan, state),
            iterations,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

/// Every action that has not succeeded, each with a human-readable reason.
pub fn unfinished_actions(plan: &Plan, state: &ExecutionState) -> Vec<UnfinishedAction> {
    let classes = classify(plan, state);
    let mut out = Vec::new();

    for id in plan.graph().topological_order() {
        let Some(status) = classes.status_of(id) else {
            continue;
        };
        let reason = match status {
            Status::Succeeded => continue,
            Status::Failed => state
                .record(id)
                .and_then(|r| r.summary.clone())
                .unwrap_or_else(|| "failed".to_string()),
            Status::Blocked => classes
                .blocked_entry(id)
                .map(|b| b.reason())
                .unwrap_or_else(|| "blocked".to_string()),
            Status::Ready => "ready to run".to_string(),
            Status::Running => "still running".to_string(),
            Status::Pending => {
                let waiting: Vec<&str> = plan
                    .graph()
                    .dependencies_of(id)
                    .iter()
                    .filter(|d| state.status_of(d) != Some(Status::Succeeded))
                    .map(|d| d.as_str())
                    .collect();
                format!("waiting on: {}", waiting.join(", "))
            }
        };
        out.push(UnfinishedAction {
            id: id.clone(),
            status,
            reason,
        });
    }

    out
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            RunOutcome::Completed => write!(
                f,
                "plan completed: {}/{} actions succeeded",
                self.succeeded, self.total
            )?,
            RunOutcome::Stalled => write!(
                f,
                "plan stalled: {}/{} actions succeeded, {} need attention",
                self.succeeded,
                self.total,
                self.unfinished.len()
            )?,
        }

        let width = self.unfinished.iter().map(|u| u.id.len()).max().unwrap_or(0);
        for u in &self.unfinished {
            write!(f, "\n  {:<width$}  {:<9}  {}", u.id, u.status.as_str(), u.reason)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Action, ActionKind, PlanSettings};

    fn plan() -> Plan {
        let mk = |id: &str, deps: &[&str]| {
            let mut a = Action::new(
                id,
                ActionKind::Command {
                    command: "true".to_string(),
                },
            );
            a.dependencies = deps.iter().map(|d| d.to_string()).collect();
            a
        };
        Plan::new(
            vec![mk("A", &[]), mk("B", &["A"]), mk("C", &[])],
            Vec::new(),
            PlanSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn stalled_report_explains_each_unfinished_action() {
        let plan = plan();
        let mut state = ExecutionState::pending_for(&plan);
        state.set_status("A", Status::Failed);
        state.set_status("B", Status::Blocked);
        state.set_status("C", Status::Succeeded);

        let report = RunReport::build(&plan, &state, RunOutcome::Stalled, vec![], vec![], 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.unfinished.len(), 2);
        assert_eq!(report.unfinished[0].reason, "failed");
        assert_eq!(report.unfinished[1].reason, "dependency 'A' failed");

        let text = report.to_string();
        assert!(text.starts_with("plan stalled: 1/3 actions succeeded"));
        assert!(text.contains("dependency 'A' failed"));
    }

    #[test]
    fn completed_report_is_a_single_line() {
        let plan = plan();
        let mut state = ExecutionState::pending_for(&plan);
        for id in ["A", "B", "C"] {
            state.set_status(id, Status::Succeeded);
        }
        let report = RunReport::build(&plan, &state, RunOutcome::Completed, vec![], vec![], 0);
        assert_eq!(report.to_string(), "plan completed: 3/3 actions succeeded");
    }
}
