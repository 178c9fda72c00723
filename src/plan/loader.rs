// src/plan/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::errors::Result;
use crate::plan::model::{Plan, RawPlanFile};

/// Read a plan file and return the raw, unvalidated `RawPlanFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for the
/// dependency and variable checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPlanFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawPlanFile = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load a plan file and validate it.
///
/// - Reads TOML.
/// - Determines each action's kind and variable references.
/// - Checks for unknown dependencies, cycles and undeclared variables.
///
/// The returned plan remembers where it came from so that snapshots can
/// point back to it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Plan> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;
    let plan = Plan::try_from(raw)?;

    let source = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    debug!(plan = %source.display(), actions = plan.len(), "plan loaded");

    Ok(plan.with_source(source))
}
