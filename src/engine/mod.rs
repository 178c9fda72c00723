// src/engine/mod.rs

//! Orchestration engine.
//!
//! - [`scheduler`] owns the run loop and is the only writer of the state
//!   store.
//! - [`variables`] resolves and caches variable values for the run.
//! - [`report`] summarises a finished run for the operator.

pub mod report;
pub mod scheduler;
pub mod variables;

pub use report::{RunOutcome, RunReport, UnfinishedAction, unfinished_actions};
pub use scheduler::{RunPhase, Scheduler, SchedulerOptions};
pub use variables::{
    Provenance, ResolvedVariables, StaticSource, Variable, VariableResolver, VariableSource,
};
