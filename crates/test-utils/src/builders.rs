#![allow(dead_code)]

use std::time::Duration;

use planrun::errors::Result;
use planrun::plan::validate::collect_variable_refs;
use planrun::plan::{Action, ActionKind, Plan, PlanSettings, VariableDecl};
use planrun::types::{DispatchMode, DispatchOrder};

/// Builder for `Plan` to simplify test setup.
pub struct PlanBuilder {
    actions: Vec<Action>,
    variables: Vec<VariableDecl>,
    settings: PlanSettings,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
            variables: Vec::new(),
            settings: PlanSettings::default(),
        }
    }

    /// The four-action diamond: `B` and `C` after `A`, `D` after both.
    pub fn diamond() -> Self {
        Self::new()
            .command("A", &[])
            .command("B", &["A"])
            .command("C", &["A"])
            .command("D", &["B", "C"])
    }

    pub fn with_action(mut self, action: ActionBuilder) -> Self {
        self.actions.push(action.build());
        self
    }

    /// Shorthand for a command action running `true` after `deps`.
    pub fn command(self, id: &str, deps: &[&str]) -> Self {
        let mut action = ActionBuilder::command(id, "true");
        for dep in deps {
            action = action.after(dep);
        }
        self.with_action(action)
    }

    pub fn variable(mut self, name: &str) -> Self {
        self.variables.push(VariableDecl::new(name));
        self
    }

    pub fn variable_with_value(mut self, name: &str, value: &str) -> Self {
        let mut decl = VariableDecl::new(name);
        decl.initial = Some(value.to_string());
        self.variables.push(decl);
        self
    }

    pub fn concurrent(mut self) -> Self {
        self.settings.dispatch_mode = DispatchMode::Concurrent;
        self
    }

    pub fn shuffled(mut self, seed: u64) -> Self {
        self.settings.dispatch_order = DispatchOrder::Shuffled;
        self.settings.seed = Some(seed);
        self
    }

    pub fn persist_variables(mut self) -> Self {
        self.settings.persist_variables = true;
        self
    }

    pub fn action_timeout(mut self, timeout: Duration) -> Self {
        self.settings.action_timeout = Some(timeout);
        self
    }

    pub fn try_build(self) -> Result<Plan> {
        Plan::new(self.actions, self.variables, self.settings)
    }

    pub fn build(self) -> Plan {
        self.try_build().expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `Action`.
///
/// Variable references are collected from `${name}` in the text plus any
/// added with [`ActionBuilder::var`], as the plan loader does.
pub struct ActionBuilder {
    action: Action,
    explicit_vars: Vec<String>,
}

impl ActionBuilder {
    fn with_kind(id: &str, kind: ActionKind) -> Self {
        Self {
            action: Action::new(id, kind),
            explicit_vars: Vec::new(),
        }
    }

    pub fn command(id: &str, cmd: &str) -> Self {
        Self::with_kind(
            id,
            ActionKind::Command {
                command: cmd.to_string(),
            },
        )
    }

    pub fn manual(id: &str) -> Self {
        Self::with_kind(
            id,
            ActionKind::Manual {
                prompt: "Done?".to_string(),
            },
        )
    }

    pub fn set(id: &str, variable: &str, default: &str) -> Self {
        Self::with_kind(
            id,
            ActionKind::SetVariable {
                variable: variable.to_string(),
                default: default.to_string(),
            },
        )
    }

    pub fn description(mut self, text: &str) -> Self {
        self.action.description = text.to_string();
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.action.dependencies.push(dep.to_string());
        self
    }

    pub fn var(mut self, name: &str) -> Self {
        self.explicit_vars.push(name.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.action.timeout = Some(timeout);
        self
    }

    pub fn build(mut self) -> Action {
        self.action.variable_refs = collect_variable_refs(&self.action, &self.explicit_vars);
        self.action
    }
}
