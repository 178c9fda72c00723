// src/export/view.rs

//! Read-only node/edge/status view of a plan, for external renderers.

use serde::Serialize;

use crate::dag::classify;
use crate::errors::Result;
use crate::plan::Plan;
use crate::state::ExecutionState;
use crate::types::{ActionId, Status};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: ActionId,
    pub status: Status,
    /// Action kind label, used for node shapes.
    #[serde(skip)]
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: ActionId,
    pub to: ActionId,
}

/// `{nodes: [{id, status}], edges: [{from, to}]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphView {
    /// Build the view for `plan`. Without a state every action is shown as a
    /// fresh run would see it (roots ready, everything else pending).
    ///
    /// Statuses are the derived ones, so runnable actions show as `ready`.
    pub fn build(plan: &Plan, state: Option<&ExecutionState>) -> Self {
        let fresh;
        let state = match state {
            Some(state) => state,
            None => {
                fresh = ExecutionState::pending_for(plan);
                &fresh
            }
        };
        let classes = classify(plan, state);

        let mut nodes = Vec::with_capacity(plan.len());
        let mut edges = Vec::new();

        for id in plan.graph().topological_order() {
            let Some(action) = plan.action(id) else {
                continue;
            };
            nodes.push(GraphNode {
                id: id.clone(),
                status: classes.status_of(id).unwrap_or(Status::Pending),
                kind: action.kind.label(),
            });
            for dep in plan.graph().dependencies_of(id) {
                edges.push(GraphEdge {
                    from: dep.clone(),
                    to: id.clone(),
                });
            }
        }

        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Action, ActionKind, PlanSettings};

    fn plan() -> Plan {
        let mut b = Action::new(
            "B",
            ActionKind::Manual {
                prompt: "Done?".to_string(),
            },
        );
        b.dependencies = vec!["A".to_string()];
        Plan::new(
            vec![
                Action::new(
                    "A",
                    ActionKind::Command {
                        command: "true".to_string(),
                    },
                ),
                b,
            ],
            Vec::new(),
            PlanSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn view_without_state_shows_a_fresh_run() {
        let view = GraphView::build(&plan(), None);
        assert_eq!(view.node("A").unwrap().status, Status::Ready);
        assert_eq!(view.node("B").unwrap().status, Status::Pending);
        assert_eq!(
            view.edges,
            vec![GraphEdge {
                from: "A".to_string(),
                to: "B".to_string()
            }]
        );
    }

    #[test]
    fn json_has_only_id_and_status_per_node() {
        let plan = plan();
        let mut state = ExecutionState::pending_for(&plan);
        state.set_status("A", Status::Failed);

        let json = GraphView::build(&plan, Some(&state)).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["nodes"][0], serde_json::json!({"id": "A", "status": "failed"}));
        assert_eq!(value["nodes"][1]["status"], "blocked");
        assert_eq!(value["edges"][0], serde_json::json!({"from": "A", "to": "B"}));
    }
}
