// src/dag/mod.rs

//! Dependency graph engine.
//!
//! - [`graph`] validates the dependency relation (unknown ids, cycles) and
//!   keeps adjacency lists plus a topological order.
//! - [`classify`] computes, from a plan and an execution state, which actions
//!   are ready, blocked, waiting, running, succeeded or failed.

pub mod classify;
pub mod graph;

pub use classify::{blocked_set, classify, ready_set, BlockedAction, Classification};
pub use graph::{validate, DependencyGraph};
