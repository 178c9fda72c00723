// src/exec/backend.rs

//! Pluggable action executor abstraction.
//!
//! The scheduler talks to an `ActionExecutor` and never runs anything itself.
//! Production code uses [`crate::exec::PlanExecutor`], which routes each
//! action to the shell or to the operator depending on its kind; tests can
//! provide their own implementation that records calls and scripts results.

use std::future::Future;
use std::pin::Pin;

use crate::engine::ResolvedVariables;
use crate::plan::Action;

/// Result of executing one action.
///
/// A failure here is not an error: the scheduler records it as the action's
/// `Failed` status and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionOutcome {
    pub succeeded: bool,
    /// Captured output or error summary, stored in the snapshot.
    pub summary: Option<String>,
    /// Variable values produced by the action.
    pub assignments: Vec<(String, String)>,
}

impl ExecutionOutcome {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            ..Self::default()
        }
    }

    pub fn failure(summary: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            summary: Some(summary.into()),
            assignments: Vec::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_assignment(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.assignments.push((name.into(), value.into()));
        self
    }
}

/// Trait abstracting how a single action is performed.
///
/// The returned future owns its inputs so that the scheduler can spawn it on
/// a `JoinSet` in concurrent mode.
pub trait ActionExecutor: Send + Sync + 'static {
    fn execute(
        &self,
        action: Action,
        variables: ResolvedVariables,
    ) -> Pin<Box<dyn Future<Output = ExecutionOutcome> + Send + 'static>>;
}
