// src/exec/manual.rs

//! Actions performed by the operator.

use std::sync::Arc;

use tracing::{info, warn};

use crate::exec::backend::ExecutionOutcome;
use crate::exec::console::{Console, header, parse_response, wrap_text};

/// Show the action text and ask whether it was done.
pub async fn confirm<C: Console>(
    console: Arc<C>,
    action_id: String,
    text: String,
    prompt: String,
) -> ExecutionOutcome {
    console.show(&header(&action_id));
    console.show(&wrap_text(&text));

    match console.ask(format!("{prompt} ")).await {
        Ok(Some(answer)) if parse_response(&answer) => {
            info!(action = %action_id, "operator confirmed");
            ExecutionOutcome::success()
        }
        Ok(Some(answer)) => {
            info!(action = %action_id, answer = %answer, "operator did not confirm");
            ExecutionOutcome::failure(format!("operator answered {answer:?}"))
        }
        Ok(None) => ExecutionOutcome::failure("input closed before the step was confirmed"),
        Err(err) => {
            warn!(action = %action_id, error = %err, "reading confirmation failed");
            ExecutionOutcome::failure(err.to_string())
        }
    }
}

/// Ask for a new value of `variable`; an empty answer keeps `default`.
pub async fn set_variable<C: Console>(
    console: Arc<C>,
    action_id: String,
    description: String,
    variable: String,
    default: String,
) -> ExecutionOutcome {
    console.show(&header(&action_id));
    if !description.is_empty() {
        console.show(&wrap_text(&description));
    }
    console.show(&format!("\tSetting the value of variable {variable}"));

    let question = format!(
        "Provide a value for {variable}\n (just pressing enter defaults it to {default}) "
    );
    let value = match console.ask(question).await {
        Ok(Some(answer)) if !answer.trim().is_empty() => answer.trim().to_string(),
        Ok(Some(_)) => default,
        Ok(None) => {
            return ExecutionOutcome::failure(format!(
                "input closed before a value for '{variable}' was given"
            ));
        }
        Err(err) => return ExecutionOutcome::failure(err.to_string()),
    };

    ExecutionOutcome::success()
        .with_summary(format!("{variable} = {value}"))
        .with_assignment(variable, value)
}
