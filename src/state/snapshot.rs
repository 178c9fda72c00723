// src/state/snapshot.rs

//! Persisted, resumable record of a run.
//!
//! Snapshots are JSON documents:
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "plan": "/srv/plans/rotate.toml",
//!   "plan_digest": "5f0c…",
//!   "actions": {
//!     "A": { "status": "succeeded", "started_at": "…", "ended_at": "…", "attempts": 1 },
//!     "B": { "status": "failed", "summary": "exit code 1", "attempts": 1 }
//!   }
//! }
//! ```
//!
//! Keys are written in a fixed order so that a snapshot that did not change
//! serializes to the same bytes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{PlanrunError, Result};
use crate::state::model::ActionRecord;
use crate::types::{ActionId, Status};

/// Current snapshot format version.
pub const SCHEMA_VERSION: u32 = 1;

/// A variable value kept across resumptions (only with `persist_variables`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedVariable {
    pub value: String,
    pub provenance: String,
}

/// One manual or recovery edit of the state, kept for later inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub action: ActionId,
    pub from: Status,
    pub to: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_digest: Option<String>,

    #[serde(default)]
    pub actions: BTreeMap<ActionId, ActionRecord>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, PersistedVariable>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audit: Vec<AuditEntry>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            plan: None,
            plan_digest: None,
            actions: BTreeMap::new(),
            variables: BTreeMap::new(),
            audit: Vec::new(),
        }
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    /// Parse a snapshot; any malformed input is a `StateCorruption` error.
    pub fn from_json(text: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(text)
            .map_err(|e| PlanrunError::StateCorruption(format!("unreadable snapshot: {e}")))?;

        if snapshot.schema_version == 0 || snapshot.schema_version > SCHEMA_VERSION {
            return Err(PlanrunError::StateCorruption(format!(
                "unsupported snapshot schema version {} (this build understands 1..={})",
                snapshot.schema_version, SCHEMA_VERSION
            )));
        }

        Ok(snapshot)
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|e| match e {
            PlanrunError::StateCorruption(msg) => {
                PlanrunError::StateCorruption(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }
}
