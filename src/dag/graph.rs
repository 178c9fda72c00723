// src/dag/graph.rs

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{PlanrunError, Result};
use crate::plan::Action;
use crate::types::ActionId;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct dependencies: actions that must succeed before this one runs.
    deps: Vec<ActionId>,
    /// Direct dependents: actions that list this one in their `after`.
    dependents: Vec<ActionId>,
    /// Position in the topological order.
    position: usize,
}

/// Adjacency view of a validated plan, plus one fixed topological order.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: HashMap<ActionId, DagNode>,
    order: Vec<ActionId>,
}

impl DependencyGraph {
    /// Validate the dependency relation and build the adjacency lists.
    pub fn build(actions: &BTreeMap<ActionId, Action>) -> Result<Self> {
        let order = validate(actions)?;

        let mut nodes: HashMap<ActionId, DagNode> = order
            .iter()
            .enumerate()
            .map(|(position, id)| {
                let deps = actions
                    .get(id)
                    .map(|a| a.dependencies.clone())
                    .unwrap_or_default();
                (
                    id.clone(),
                    DagNode {
                        deps,
                        dependents: Vec::new(),
                        position,
                    },
                )
            })
            .collect();

        // Walk in topological order so every dependents list is ordered too.
        for id in &order {
            let deps = nodes.get(id).map(|n| n.deps.clone()).unwrap_or_default();
            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    if !dep_node.dependents.contains(id) {
                        dep_node.dependents.push(id.clone());
                    }
                }
            }
        }

        Ok(Self { nodes, order })
    }

    /// All action ids in topological order (dependencies first).
    pub fn topological_order(&self) -> &[ActionId] {
        &self.order
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Position of `id` in the topological order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.nodes.get(id).map(|n| n.position)
    }

    /// Immediate dependencies of an action (the actions listed in its `after`).
    pub fn dependencies_of(&self, id: &str) -> &[ActionId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of an action.
    pub fn dependents_of(&self, id: &str) -> &[ActionId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Every action that transitively depends on `id`, in topological order.
    pub fn descendants_of(&self, id: &str) -> Vec<ActionId> {
        let mut stack: Vec<&ActionId> = self.dependents_of(id).iter().collect();
        let mut seen: HashSet<&ActionId> = HashSet::new();

        while let Some(name) = stack.pop() {
            if seen.insert(name) {
                stack.extend(self.dependents_of(name));
            }
        }

        let mut out: Vec<ActionId> = seen.into_iter().cloned().collect();
        out.sort_by_key(|a| self.position(a).unwrap_or(usize::MAX));
        out
    }

    /// Actions with no dependencies.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter(|id| self.dependencies_of(id).is_empty())
            .map(|s| s.as_str())
    }

    /// Actions nothing depends on.
    pub fn leaves(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter(|id| self.dependents_of(id).is_empty())
            .map(|s| s.as_str())
    }
}

/// Check that every dependency exists and that the relation is acyclic.
///
/// Returns the topological order on success. Runs once, before any action
/// is executed.
pub fn validate(actions: &BTreeMap<ActionId, Action>) -> Result<Vec<ActionId>> {
    // Edge direction: dep -> action. For `[action.B] after = ["A"]` we add A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for id in actions.keys() {
        graph.add_node(id.as_str());
    }

    for (id, action) in actions.iter() {
        for dep in action.dependencies.iter() {
            if !actions.contains_key(dep) {
                return Err(PlanrunError::UnknownDependency {
                    action: id.clone(),
                    dependency: dep.clone(),
                });
            }
            graph.add_edge(dep.as_str(), id.as_str(), ());
        }
    }

    // Self-dependencies are loops, so toposort reports them as cycles too.
    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(PlanrunError::CyclicDependency(format!(
            "cycle detected in plan involving action '{}'",
            cycle.node_id()
        ))),
    }
}
