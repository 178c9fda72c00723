// src/plan/mod.rs

//! Plan model, loading and validation.
//!
//! - [`model`] holds the TOML-backed raw data and the validated [`Plan`].
//! - [`loader`] reads plan files from disk.
//! - [`validate`] turns a raw file into a plan.
//! - [`template`] finds and expands `${name}` references.

pub mod loader;
pub mod model;
pub mod template;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    Action, ActionConfig, ActionKind, Plan, PlanSettings, RawPlanFile, SettingsSection,
    VariableConfig, VariableDecl,
};
