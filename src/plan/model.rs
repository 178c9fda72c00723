// src/plan/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use blake3::Hasher;
use serde::Deserialize;

use crate::dag::DependencyGraph;
use crate::errors::{PlanrunError, Result};
use crate::types::{ActionId, DispatchMode, DispatchOrder};

/// Top-level plan file as read from TOML.
///
/// ```toml
/// [settings]
/// title = "Rotate certificates"
/// dispatch_order = "shuffled"
///
/// [variable.host]
/// prompt = "Which host?"
///
/// [action.stop]
/// description = "Stop the service on ${host}"
/// command = "systemctl stop app"
///
/// [action.check]
/// description = "Check the dashboard"
/// prompt = "Is it green?"
/// after = ["stop"]
/// ```
///
/// This is the unvalidated form; convert it with `Plan::try_from`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPlanFile {
    #[serde(default)]
    pub settings: SettingsSection,

    /// Declared variables from `[variable.<name>]`.
    #[serde(default)]
    pub variable: BTreeMap<String, VariableConfig>,

    /// All actions from `[action.<id>]`.
    #[serde(default)]
    pub action: BTreeMap<String, ActionConfig>,
}

/// `[settings]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SettingsSection {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub dispatch_order: DispatchOrder,

    #[serde(default)]
    pub dispatch_mode: DispatchMode,

    /// Store resolved variable values in the snapshot so that a resumed run
    /// reuses them instead of asking again.
    #[serde(default)]
    pub persist_variables: bool,

    /// Default per-action timeout, e.g. `"10m"`. No timeout when absent.
    #[serde(default)]
    pub action_timeout: Option<String>,

    /// Seed for `dispatch_order = "shuffled"`.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// `[variable.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct VariableConfig {
    /// Initial value; when present the variable is never prompted for.
    #[serde(default)]
    pub value: Option<String>,

    /// Text shown when asking for the value.
    #[serde(default)]
    pub prompt: Option<String>,

    /// Environment variable consulted before asking.
    #[serde(default)]
    pub env: Option<String>,
}

/// `[action.<id>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ActionConfig {
    #[serde(default, alias = "text")]
    pub description: String,

    /// Dependency list: this action waits for all actions listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Variables needed beyond the ones referenced as `${name}`.
    #[serde(default)]
    pub vars: Vec<String>,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub prompt: Option<String>,

    #[serde(default)]
    pub variable: Option<String>,

    #[serde(default)]
    pub default: Option<String>,

    #[serde(default)]
    pub timeout: Option<String>,
}

/// Run-wide settings after parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSettings {
    pub title: Option<String>,
    pub dispatch_order: DispatchOrder,
    pub dispatch_mode: DispatchMode,
    pub persist_variables: bool,
    pub action_timeout: Option<Duration>,
    pub seed: Option<u64>,
}

/// What an action does when dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Run a shell command; success is exit status 0.
    Command { command: String },
    /// Show the description and ask the operator whether it was done.
    Manual { prompt: String },
    /// Ask the operator for a value and assign it to a variable.
    SetVariable { variable: String, default: String },
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Command { .. } => "command",
            ActionKind::Manual { .. } => "manual",
            ActionKind::SetVariable { .. } => "set",
        }
    }
}

/// A declared unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub id: ActionId,
    pub description: String,
    pub dependencies: Vec<ActionId>,
    pub variable_refs: Vec<String>,
    pub kind: ActionKind,
    pub timeout: Option<Duration>,
}

impl Action {
    pub fn new(id: impl Into<ActionId>, kind: ActionKind) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            dependencies: Vec::new(),
            variable_refs: Vec::new(),
            kind,
            timeout: None,
        }
    }

    /// Every piece of text that may contain `${name}` references.
    pub fn templated_text(&self) -> Vec<&str> {
        let mut text = vec![self.description.as_str()];
        match &self.kind {
            ActionKind::Command { command } => text.push(command),
            ActionKind::Manual { prompt } => text.push(prompt),
            ActionKind::SetVariable { default, .. } => text.push(default),
        }
        text
    }
}

/// A declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDecl {
    pub name: String,
    pub initial: Option<String>,
    pub prompt: Option<String>,
    pub env: Option<String>,
}

impl VariableDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial: None,
            prompt: None,
            env: None,
        }
    }
}

/// A validated plan: acyclic, every dependency and variable reference
/// resolvable. Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct Plan {
    source: Option<PathBuf>,
    settings: PlanSettings,
    actions: BTreeMap<ActionId, Action>,
    variables: BTreeMap<String, VariableDecl>,
    graph: DependencyGraph,
    digest: String,
}

impl Plan {
    /// Build and validate a plan.
    ///
    /// Fails with `InvalidPlan` on duplicate ids or undeclared variables, and
    /// with `UnknownDependency` / `CyclicDependency` from the graph check.
    pub fn new(
        actions: Vec<Action>,
        variables: Vec<VariableDecl>,
        settings: PlanSettings,
    ) -> Result<Self> {
        let mut variable_map = BTreeMap::new();
        for decl in variables {
            if variable_map.contains_key(&decl.name) {
                return Err(PlanrunError::InvalidPlan(format!(
                    "variable '{}' is declared twice",
                    decl.name
                )));
            }
            variable_map.insert(decl.name.clone(), decl);
        }

        let mut action_map = BTreeMap::new();
        for action in actions {
            if action.id.trim().is_empty() {
                return Err(PlanrunError::InvalidPlan(
                    "action ids must not be empty".to_string(),
                ));
            }
            if action_map.contains_key(&action.id) {
                return Err(PlanrunError::InvalidPlan(format!(
                    "action '{}' is declared twice",
                    action.id
                )));
            }
            check_variables(&action, &variable_map)?;
            action_map.insert(action.id.clone(), action);
        }

        if action_map.is_empty() {
            return Err(PlanrunError::InvalidPlan(
                "plan must contain at least one [action.<id>] section".to_string(),
            ));
        }

        let graph = DependencyGraph::build(&action_map)?;
        let digest = compute_digest(&action_map, &variable_map);

        Ok(Self {
            source: None,
            settings,
            actions: action_map,
            variables: variable_map,
            graph,
            digest,
        })
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// File the plan was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn settings(&self) -> &PlanSettings {
        &self.settings
    }

    pub fn title(&self) -> Option<&str> {
        self.settings.title.as_deref()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Stable fingerprint of the plan's actions and variables.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn action(&self, id: &str) -> Option<&Action> {
        self.actions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.actions.contains_key(id)
    }

    /// Actions sorted by id.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    pub fn action_ids(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDecl> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &VariableDecl> {
        self.variables.values()
    }
}

fn check_variables(action: &Action, variables: &BTreeMap<String, VariableDecl>) -> Result<()> {
    for name in &action.variable_refs {
        if !variables.contains_key(name) {
            return Err(PlanrunError::InvalidPlan(format!(
                "action '{}' references undeclared variable '{}'",
                action.id, name
            )));
        }
    }
    if let ActionKind::SetVariable { variable, .. } = &action.kind {
        if !variables.contains_key(variable) {
            return Err(PlanrunError::InvalidPlan(format!(
                "action '{}' sets undeclared variable '{}'",
                action.id, variable
            )));
        }
    }
    Ok(())
}

fn compute_digest(
    actions: &BTreeMap<ActionId, Action>,
    variables: &BTreeMap<String, VariableDecl>,
) -> String {
    let mut hasher = Hasher::new();
    for (id, action) in actions {
        hasher.update(b"action\0");
        hasher.update(id.as_bytes());
        hasher.update(b"\0");
        hasher.update(action.kind.label().as_bytes());
        for text in action.templated_text() {
            hasher.update(b"\0");
            hasher.update(text.as_bytes());
        }
        for dep in &action.dependencies {
            hasher.update(b"\0after\0");
            hasher.update(dep.as_bytes());
        }
        hasher.update(b"\n");
    }
    for name in variables.keys() {
        hasher.update(b"variable\0");
        hasher.update(name.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}
