// src/state/model.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::Plan;
use crate::types::{ActionId, Status};

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Status plus execution metadata for one action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionRecord {
    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// Captured output or error summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// How many times the action has been dispatched.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub attempts: u32,
}

impl ActionRecord {
    pub fn pending() -> Self {
        Self::default()
    }
}

/// Metadata attached to a single status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionMeta {
    pub at: DateTime<Utc>,
    pub summary: Option<String>,
}

impl TransitionMeta {
    pub fn now() -> Self {
        Self {
            at: Utc::now(),
            summary: None,
        }
    }

    pub fn at(at: DateTime<Utc>) -> Self {
        Self { at, summary: None }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_optional_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary;
        self
    }
}

/// Total mapping from every action of a plan to its record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionState {
    records: BTreeMap<ActionId, ActionRecord>,
}

impl ExecutionState {
    /// Every action of `plan` in `Pending`.
    pub fn pending_for(plan: &Plan) -> Self {
        let records = plan
            .action_ids()
            .map(|id| (id.to_string(), ActionRecord::pending()))
            .collect();
        Self { records }
    }

    pub(crate) fn from_records(records: BTreeMap<ActionId, ActionRecord>) -> Self {
        Self { records }
    }

    pub fn status_of(&self, id: &str) -> Option<Status> {
        self.records.get(id).map(|r| r.status)
    }

    pub fn record(&self, id: &str) -> Option<&ActionRecord> {
        self.records.get(id)
    }

    pub(crate) fn record_mut(&mut self, id: &str) -> Option<&mut ActionRecord> {
        self.records.get_mut(id)
    }

    pub(crate) fn set_status(&mut self, id: &str, status: Status) {
        if let Some(record) = self.records.get_mut(id) {
            record.status = status;
        }
    }

    /// Records sorted by action id.
    pub fn records(&self) -> impl Iterator<Item = (&str, &ActionRecord)> {
        self.records.iter().map(|(id, r)| (id.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, status: Status) -> usize {
        self.records.values().filter(|r| r.status == status).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.records.values().all(|r| r.status == Status::Succeeded)
    }

    pub(crate) fn to_records(&self) -> BTreeMap<ActionId, ActionRecord> {
        self.records.clone()
    }
}
