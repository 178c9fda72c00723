// src/engine/variables.rs

//! Lazy, cached resolution of plan variables.
//!
//! A variable is resolved the first time an action that references it is
//! dispatched and then reused for the rest of the run. Lookup order:
//! cached value, declared initial value, environment variable, then the
//! [`VariableSource`] (usually the operator at the console).

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use tracing::{debug, info};

use crate::errors::{PlanrunError, Result};
use crate::plan::{Action, Plan};
use crate::state::PersistedVariable;
use crate::types::ActionId;

/// Variable values handed to an executor, keyed by name.
pub type ResolvedVariables = BTreeMap<String, String>;

/// Where a variable's value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// `value = ...` in the plan.
    Declared,
    /// `--var name=value` on the command line.
    Cli,
    /// The named environment variable.
    Environment(String),
    /// A [`VariableSource`], by name.
    Source(String),
    /// Assigned by a set-variable action.
    Action(ActionId),
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Declared => f.write_str("declared"),
            Provenance::Cli => f.write_str("cli"),
            Provenance::Environment(name) => write!(f, "env:{name}"),
            Provenance::Source(name) => write!(f, "source:{name}"),
            Provenance::Action(id) => write!(f, "action:{id}"),
        }
    }
}

impl FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "declared" => return Ok(Provenance::Declared),
            "cli" => return Ok(Provenance::Cli),
            _ => {}
        }
        match s.split_once(':') {
            Some(("env", name)) => Ok(Provenance::Environment(name.to_string())),
            Some(("source", name)) => Ok(Provenance::Source(name.to_string())),
            Some(("action", id)) => Ok(Provenance::Action(id.to_string())),
            _ => Err(format!("unknown variable provenance: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub value: String,
    pub provenance: Provenance,
}

/// Supplies values for variables nobody else could resolve.
pub trait VariableSource: Send {
    /// Short name recorded in the variable's provenance.
    fn name(&self) -> &str;

    fn resolve<'a>(
        &'a mut self,
        variable: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// A source with a fixed set of answers; anything else is an error.
///
/// Used for non-interactive runs (`--no-input`) and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    values: BTreeMap<String, String>,
    asked: Vec<String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    /// Every variable this source was asked for, in order.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl VariableSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn resolve<'a>(
        &'a mut self,
        variable: &'a str,
        _prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        self.asked.push(variable.to_string());
        let value = self.values.get(variable).cloned();
        Box::pin(async move {
            value.ok_or_else(|| PlanrunError::VariableResolution {
                variable: variable.to_string(),
                reason: "no value available and input is disabled".to_string(),
            })
        })
    }
}

/// Per-run variable cache in front of a [`VariableSource`].
#[derive(Debug)]
pub struct VariableResolver<S> {
    source: S,
    cache: BTreeMap<String, Variable>,
    /// Variables the source could not provide, with the reason. Not asked again.
    failed: BTreeMap<String, String>,
    /// Names resolved or assigned since the last `take_new`.
    dirty: Vec<String>,
}

impl<S: VariableSource> VariableResolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: BTreeMap::new(),
            failed: BTreeMap::new(),
            dirty: Vec::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fix a value before the run starts (`--var name=value`).
    pub fn preset(&mut self, name: &str, value: &str) {
        self.store(name, value.to_string(), Provenance::Cli);
    }

    /// Seed the cache with values persisted by a previous run.
    pub fn restore(&mut self, persisted: &BTreeMap<String, PersistedVariable>) {
        for (name, var) in persisted {
            if self.cache.contains_key(name) {
                continue;
            }
            let provenance = var.provenance.parse().unwrap_or(Provenance::Declared);
            debug!(variable = %name, %provenance, "restored persisted variable");
            self.cache.insert(
                name.clone(),
                Variable {
                    name: name.clone(),
                    value: var.value.clone(),
                    provenance,
                },
            );
        }
    }

    /// Resolve every variable `action` references.
    pub async fn resolve_for(&mut self, plan: &Plan, action: &Action) -> Result<ResolvedVariables> {
        let mut out = ResolvedVariables::new();
        for name in &action.variable_refs {
            let value = self.resolve(plan, name).await?;
            out.insert(name.clone(), value);
        }
        Ok(out)
    }

    async fn resolve(&mut self, plan: &Plan, name: &str) -> Result<String> {
        if let Some(var) = self.cache.get(name) {
            return Ok(var.value.clone());
        }
        if let Some(reason) = self.failed.get(name) {
            return Err(PlanrunError::VariableResolution {
                variable: name.to_string(),
                reason: reason.clone(),
            });
        }

        let decl = plan
            .variable(name)
            .ok_or_else(|| PlanrunError::VariableResolution {
                variable: name.to_string(),
                reason: "variable is not declared".to_string(),
            })?;

        if let Some(initial) = &decl.initial {
            self.store(name, initial.clone(), Provenance::Declared);
            return Ok(initial.clone());
        }

        if let Some(env) = &decl.env {
            if let Ok(value) = std::env::var(env) {
                debug!(variable = %name, env = %env, "resolved from environment");
                self.store(name, value.clone(), Provenance::Environment(env.clone()));
                return Ok(value);
            }
        }

        let prompt = decl
            .prompt
            .clone()
            .unwrap_or_else(|| format!("Provide a value for {name}"));
        let value = match self.source.resolve(name, &prompt).await {
            Ok(value) => value,
            Err(err) => {
                let reason = match &err {
                    PlanrunError::VariableResolution { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                self.failed.insert(name.to_string(), reason);
                return Err(err);
            }
        };
        let provenance = Provenance::Source(self.source.name().to_string());
        info!(variable = %name, %provenance, "variable resolved");
        self.store(name, value.clone(), provenance);
        Ok(value)
    }

    /// Record a value produced by a set-variable action. Replaces any
    /// cached value.
    pub fn assign(&mut self, name: &str, value: String, action: &str) {
        info!(variable = %name, action = %action, "variable assigned");
        self.store(name, value, Provenance::Action(action.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.cache.get(name)
    }

    /// All cached values.
    pub fn values(&self) -> ResolvedVariables {
        self.cache
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }

    /// Variables resolved or assigned since the previous call.
    pub fn take_new(&mut self) -> Vec<Variable> {
        let names = std::mem::take(&mut self.dirty);
        names
            .into_iter()
            .filter_map(|n| self.cache.get(&n).cloned())
            .collect()
    }

    fn store(&mut self, name: &str, value: String, provenance: Provenance) {
        self.cache.insert(
            name.to_string(),
            Variable {
                name: name.to_string(),
                value,
                provenance,
            },
        );
        if !self.dirty.iter().any(|n| n == name) {
            self.dirty.push(name.to_string());
        }
    }
}
