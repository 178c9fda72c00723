// src/dag/classify.rs

//! Classification of every action against an execution state.
//!
//! This is a pure function of (plan, state). It decides which actions may run
//! now, which can never run because something upstream failed, and which are
//! still waiting. It imposes no order beyond the plan's topological order.

use std::collections::HashMap;

use crate::plan::Plan;
use crate::state::ExecutionState;
use crate::types::{ActionId, Status};

/// An action that cannot run because an ancestor failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedAction {
    pub id: ActionId,
    /// The direct dependency that is failed or blocked.
    pub via: ActionId,
    /// The failed action at the origin of the blockage.
    ///
    /// Equal to `id` when the action is stored as blocked but nothing
    /// upstream is failed any more (someone reset the failure by hand).
    pub root: ActionId,
}

impl BlockedAction {
    /// Human-readable reason, used in reports and stored summaries.
    pub fn reason(&self) -> String {
        if self.root == self.id {
            "blocked, but no failed ancestor remains; reset it to retry".to_string()
        } else if self.via == self.root {
            format!("dependency '{}' failed", self.via)
        } else {
            format!(
                "dependency '{}' is blocked by failed action '{}'",
                self.via, self.root
            )
        }
    }
}

/// Every action of the plan in exactly one bucket, each in topological order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub ready: Vec<ActionId>,
    pub blocked: Vec<BlockedAction>,
    /// Pending, but some dependency has not succeeded yet.
    pub waiting: Vec<ActionId>,
    pub running: Vec<ActionId>,
    pub succeeded: Vec<ActionId>,
    pub failed: Vec<ActionId>,
}

impl Classification {
    /// Derived status of an action (`Ready` for runnable pending actions).
    pub fn status_of(&self, id: &str) -> Option<Status> {
        let has = |list: &[ActionId]| list.iter().any(|a| a == id);
        if has(&self.ready) {
            Some(Status::Ready)
        } else if self.blocked.iter().any(|b| b.id == id) {
            Some(Status::Blocked)
        } else if has(&self.waiting) {
            Some(Status::Pending)
        } else if has(&self.running) {
            Some(Status::Running)
        } else if has(&self.succeeded) {
            Some(Status::Succeeded)
        } else if has(&self.failed) {
            Some(Status::Failed)
        } else {
            None
        }
    }

    pub fn blocked_entry(&self, id: &str) -> Option<&BlockedAction> {
        self.blocked.iter().find(|b| b.id == id)
    }

    /// True when every action has succeeded.
    pub fn is_complete(&self) -> bool {
        self.ready.is_empty()
            && self.blocked.is_empty()
            && self.waiting.is_empty()
            && self.running.is_empty()
            && self.failed.is_empty()
    }
}

/// Classify every action in one pass over the topological order.
///
/// An action is blocked when any dependency is failed or blocked, so the
/// obstruction reaches every descendant regardless of distance.
pub fn classify(plan: &Plan, state: &ExecutionState) -> Classification {
    let mut out = Classification::default();
    // action -> failed action at the origin of its obstruction
    let mut obstructed: HashMap<&str, &str> = HashMap::new();

    for id in plan.graph().topological_order() {
        let deps = plan.graph().dependencies_of(id);
        let status = state.status_of(id).unwrap_or(Status::Pending);

        let upstream = deps
            .iter()
            .find_map(|dep| obstructed.get(dep.as_str()).map(|root| (dep, *root)));

        match status {
            Status::Succeeded => out.succeeded.push(id.clone()),
            Status::Running => out.running.push(id.clone()),
            Status::Failed => {
                obstructed.insert(id.as_str(), id.as_str());
                out.failed.push(id.clone());
            }
            Status::Blocked => {
                let (via, root) = upstream.unwrap_or((id, id.as_str()));
                obstructed.insert(id.as_str(), root);
                out.blocked.push(BlockedAction {
                    id: id.clone(),
                    via: via.clone(),
                    root: root.to_string(),
                });
            }
            Status::Pending | Status::Ready => {
                if let Some((via, root)) = upstream {
                    obstructed.insert(id.as_str(), root);
                    out.blocked.push(BlockedAction {
                        id: id.clone(),
                        via: via.clone(),
                        root: root.to_string(),
                    });
                } else if deps
                    .iter()
                    .all(|dep| state.status_of(dep) == Some(Status::Succeeded))
                {
                    out.ready.push(id.clone());
                } else {
                    out.waiting.push(id.clone());
                }
            }
        }
    }

    out
}

/// Pending actions whose every dependency has succeeded.
pub fn ready_set(plan: &Plan, state: &ExecutionState) -> Vec<ActionId> {
    classify(plan, state).ready
}

/// Pending actions with a failed or blocked ancestor, i.e. the actions that
/// must now be marked `Blocked`. Already-blocked actions are not repeated.
pub fn blocked_set(plan: &Plan, state: &ExecutionState) -> Vec<BlockedAction> {
    classify(plan, state)
        .blocked
        .into_iter()
        .filter(|b| state.status_of(&b.id) == Some(Status::Pending))
        .collect()
}
