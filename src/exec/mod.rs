// src/exec/mod.rs

//! Action execution layer.
//!
//! - [`backend`] defines the `ActionExecutor` capability the scheduler calls.
//! - [`dispatch`] is the production executor, routing on the action kind.
//! - [`command`] runs command actions through the shell.
//! - [`manual`] handles confirmation and set-variable steps.
//! - [`console`] is the operator-facing terminal.

pub mod backend;
pub mod command;
pub mod console;
pub mod dispatch;
pub mod manual;

pub use backend::{ActionExecutor, ExecutionOutcome};
pub use console::{Console, ConsoleSource, StdConsole};
pub use dispatch::PlanExecutor;
