// src/plan/validate.rs

use crate::errors::{PlanrunError, Result};
use crate::plan::model::{
    Action, ActionConfig, ActionKind, Plan, PlanSettings, RawPlanFile, SettingsSection,
    VariableConfig, VariableDecl,
};
use crate::plan::template;
use crate::types::parse_duration;

const DEFAULT_PROMPT: &str = "Done?";

impl TryFrom<RawPlanFile> for Plan {
    type Error = PlanrunError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        let settings = convert_settings(&raw.settings)?;

        let variables = raw
            .variable
            .iter()
            .map(|(name, cfg)| convert_variable(name, cfg))
            .collect::<Vec<_>>();

        let actions = raw
            .action
            .iter()
            .map(|(id, cfg)| convert_action(id, cfg))
            .collect::<Result<Vec<_>>>()?;

        Plan::new(actions, variables, settings)
    }
}

fn convert_settings(section: &SettingsSection) -> Result<PlanSettings> {
    let action_timeout = section
        .action_timeout
        .as_deref()
        .map(|s| {
            parse_duration(s).map_err(|e| {
                PlanrunError::InvalidPlan(format!("[settings].action_timeout: {e}"))
            })
        })
        .transpose()?;

    Ok(PlanSettings {
        title: section.title.clone(),
        dispatch_order: section.dispatch_order,
        dispatch_mode: section.dispatch_mode,
        persist_variables: section.persist_variables,
        action_timeout,
        seed: section.seed,
    })
}

fn convert_variable(name: &str, cfg: &VariableConfig) -> VariableDecl {
    VariableDecl {
        name: name.to_string(),
        initial: cfg.value.clone(),
        prompt: cfg.prompt.clone(),
        env: cfg.env.clone(),
    }
}

/// Decide the action kind from which keys are present.
///
/// `command` makes a command action, `variable`/`default` a set-variable
/// action, anything else a manual confirmation. Mixing the keys of two kinds
/// is an error.
fn action_kind(id: &str, cfg: &ActionConfig) -> Result<ActionKind> {
    let is_command = cfg.command.is_some();
    let is_set = cfg.variable.is_some() || cfg.default.is_some();
    let has_prompt = cfg.prompt.is_some();

    match (is_command, is_set, has_prompt) {
        (true, false, false) => Ok(ActionKind::Command {
            command: cfg.command.clone().unwrap_or_default(),
        }),
        (false, true, false) => {
            let variable = cfg.variable.clone().ok_or_else(|| {
                PlanrunError::InvalidPlan(format!(
                    "action '{id}' has a `default` but no `variable` to set"
                ))
            })?;
            Ok(ActionKind::SetVariable {
                variable,
                default: cfg.default.clone().unwrap_or_default(),
            })
        }
        (false, false, _) => Ok(ActionKind::Manual {
            prompt: cfg
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
        }),
        _ => Err(PlanrunError::InvalidPlan(format!(
            "action '{id}' mixes keys of different action kinds (command / variable / prompt)"
        ))),
    }
}

fn convert_action(id: &str, cfg: &ActionConfig) -> Result<Action> {
    let kind = action_kind(id, cfg)?;

    let timeout = cfg
        .timeout
        .as_deref()
        .map(|s| {
            parse_duration(s)
                .map_err(|e| PlanrunError::InvalidPlan(format!("action '{id}' timeout: {e}")))
        })
        .transpose()?;

    let mut action = Action::new(id, kind);
    action.description = cfg.description.clone();
    action.dependencies = cfg.after.clone();
    action.timeout = timeout;
    action.variable_refs = collect_variable_refs(&action, &cfg.vars);

    Ok(action)
}

/// Explicit `vars` first, then `${name}` references in declaration order.
pub fn collect_variable_refs(action: &Action, explicit: &[String]) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    let referenced = action
        .templated_text()
        .into_iter()
        .flat_map(template::references);

    for name in explicit.iter().cloned().chain(referenced) {
        if !refs.contains(&name) {
            refs.push(name);
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Plan> {
        let raw: RawPlanFile = toml::from_str(toml_src)?;
        Plan::try_from(raw)
    }

    #[test]
    fn action_kinds_follow_present_keys() {
        let plan = parse(
            r#"
[variable.host]

[action.stop]
command = "echo stop ${host}"

[action.check]
text = "Look at the dashboard"

[action.pick]
variable = "host"
default = "db2"
"#,
        )
        .unwrap();

        assert_eq!(plan.action("stop").unwrap().kind.label(), "command");
        assert_eq!(plan.action("stop").unwrap().variable_refs, vec!["host"]);
        assert_eq!(
            plan.action("check").unwrap().kind,
            ActionKind::Manual {
                prompt: "Done?".to_string()
            }
        );
        assert_eq!(plan.action("check").unwrap().description, "Look at the dashboard");
        assert_eq!(plan.action("pick").unwrap().kind.label(), "set");
    }

    #[test]
    fn mixed_action_kinds_are_rejected() {
        let err = parse(
            r#"
[action.odd]
command = "true"
prompt = "Did it work?"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PlanrunError::InvalidPlan(msg) if msg.contains("mixes")));
    }

    #[test]
    fn undeclared_variable_is_rejected() {
        let err = parse(
            r#"
[action.a]
command = "echo ${nope}"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PlanrunError::InvalidPlan(msg) if msg.contains("nope")));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = parse(
            r#"
[action.a]
command = "true"
timeout = "soon"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PlanrunError::InvalidPlan(msg) if msg.contains("timeout")));
    }

    #[test]
    fn explicit_vars_come_before_inline_references() {
        let plan = parse(
            r#"
[variable.a]
[variable.b]

[action.x]
description = "uses ${a}"
vars = ["b"]
prompt = "ok ${a}?"
"#,
        )
        .unwrap();
        assert_eq!(plan.action("x").unwrap().variable_refs, vec!["b", "a"]);
    }
}
