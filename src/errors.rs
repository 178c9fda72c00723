// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::types::{ActionId, Status};

#[derive(Error, Debug)]
pub enum PlanrunError {
    #[error("Cyclic dependency: {0}")]
    CyclicDependency(String),

    #[error("Unknown dependency: action '{action}' depends on '{dependency}', which is not in the plan")]
    UnknownDependency { action: ActionId, dependency: ActionId },

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("State corruption: {0}")]
    StateCorruption(String),

    /// The store was asked to move an action out of a status it is not in.
    ///
    /// Only the scheduler mutates the store, so this is an internal invariant
    /// violation rather than a user error.
    #[error("Invalid transition for action '{action}': expected {expected}, found {actual}")]
    InvalidTransition {
        action: ActionId,
        expected: Status,
        actual: Status,
    },

    #[error("Cannot reset action '{action}' while it is {status}")]
    InvalidReset { action: ActionId, status: Status },

    #[error("Cannot mark action '{action}' done while it is {status}")]
    InvalidMarkDone { action: ActionId, status: Status },

    #[error("Action not found: {0}")]
    UnknownAction(ActionId),

    #[error("Could not resolve variable '{variable}': {reason}")]
    VariableResolution { variable: String, reason: String },

    #[error("Action '{action}' failed: {reason}")]
    ActionExecution { action: ActionId, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlanrunError {
    /// Fatal errors detected before any action runs: the plan or the snapshot
    /// is malformed and needs fixing by hand.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PlanrunError::CyclicDependency(_)
                | PlanrunError::UnknownDependency { .. }
                | PlanrunError::InvalidPlan(_)
                | PlanrunError::StateCorruption(_)
                | PlanrunError::Toml(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PlanrunError>;
