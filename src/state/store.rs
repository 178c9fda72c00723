// src/state/store.rs

//! Durable owner of the execution state.
//!
//! Every successful mutation is written to the sink before the call returns,
//! so the snapshot on disk never lags behind what the scheduler believes.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::errors::{PlanrunError, Result};
use crate::plan::Plan;
use crate::state::model::{ExecutionState, TransitionMeta};
use crate::state::sink::SnapshotSink;
use crate::state::snapshot::{AuditEntry, PersistedVariable, SCHEMA_VERSION, Snapshot};
use crate::types::{ActionId, Status};

const RESUME_NOTE: &str = "interrupted while running; reset on resume";

#[derive(Debug)]
pub struct StateStore {
    state: ExecutionState,
    variables: BTreeMap<String, PersistedVariable>,
    audit: Vec<AuditEntry>,
    plan_path: Option<PathBuf>,
    plan_digest: String,
    persist_variables: bool,
    interrupted: Vec<ActionId>,
    sink: Box<dyn SnapshotSink>,
}

impl StateStore {
    /// A store with every action of `plan` pending. Nothing is written yet.
    pub fn fresh(plan: &Plan, sink: Box<dyn SnapshotSink>) -> Self {
        Self {
            state: ExecutionState::pending_for(plan),
            variables: BTreeMap::new(),
            audit: Vec::new(),
            plan_path: plan.source().map(|p| p.to_path_buf()),
            plan_digest: plan.digest().to_string(),
            persist_variables: plan.settings().persist_variables,
            interrupted: Vec::new(),
            sink,
        }
    }

    /// Rebuild the store from a snapshot of a previous run of `plan`.
    ///
    /// An empty action map starts fresh. Actions found `Running` were cut
    /// off mid-flight and go back to `Pending`; each reset is audited.
    pub fn load(plan: &Plan, snapshot: Snapshot, sink: Box<dyn SnapshotSink>) -> Result<Self> {
        let mut store = Self::fresh(plan, sink);

        if snapshot.actions.is_empty() {
            info!("snapshot holds no actions; starting fresh");
            return Ok(store);
        }

        check_snapshot(plan, &snapshot)?;

        if let Some(digest) = &snapshot.plan_digest {
            if digest != plan.digest() {
                warn!(
                    stored = %digest,
                    current = %plan.digest(),
                    "plan changed since the snapshot was written"
                );
            }
        }

        store.state = ExecutionState::from_records(snapshot.actions);
        store.variables = snapshot.variables;
        store.audit = snapshot.audit;

        let running: Vec<ActionId> = store
            .state
            .records()
            .filter(|(_, r)| r.status == Status::Running)
            .map(|(id, _)| id.to_string())
            .collect();

        for id in running {
            let meta = TransitionMeta::now().with_summary(RESUME_NOTE);
            store.audit.push(AuditEntry {
                at: meta.at,
                action: id.clone(),
                from: Status::Running,
                to: Status::Pending,
                note: Some(RESUME_NOTE.to_string()),
            });
            apply(&mut store.state, &id, Status::Pending, &meta);
            warn!(action = %id, "action was running when the previous run stopped; reset to pending");
            store.interrupted.push(id);
        }

        Ok(store)
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn status_of(&self, id: &str) -> Option<Status> {
        self.state.status_of(id)
    }

    /// Actions that were reset from `Running` when the store was loaded.
    pub fn interrupted(&self) -> &[ActionId] {
        &self.interrupted
    }

    pub fn audit(&self) -> &[AuditEntry] {
        &self.audit
    }

    pub fn sink(&self) -> &dyn SnapshotSink {
        self.sink.as_ref()
    }

    /// Move `id` from `from` to `to` and persist.
    ///
    /// `Ready` is derived and never stored.
    pub fn transition(
        &mut self,
        id: &str,
        from: Status,
        to: Status,
        meta: TransitionMeta,
    ) -> Result<()> {
        let actual = self
            .state
            .status_of(id)
            .ok_or_else(|| PlanrunError::UnknownAction(id.to_string()))?;

        if actual != from {
            return Err(PlanrunError::InvalidTransition {
                action: id.to_string(),
                expected: from,
                actual,
            });
        }
        if !to.is_persistable() {
            return Err(PlanrunError::InvalidTransition {
                action: id.to_string(),
                expected: from,
                actual: to,
            });
        }

        apply(&mut self.state, id, to, &meta);
        debug!(action = %id, from = %from, to = %to, "transition");
        self.persist()
    }

    /// Write the current snapshot to the sink.
    pub fn persist(&mut self) -> Result<()> {
        let snapshot = self.snapshot();
        self.sink.write(&snapshot)
    }

    /// Serializable copy of the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            schema_version: SCHEMA_VERSION,
            plan: self.plan_path.clone(),
            plan_digest: Some(self.plan_digest.clone()),
            actions: self.state.to_records(),
            variables: if self.persist_variables {
                self.variables.clone()
            } else {
                BTreeMap::new()
            },
            audit: self.audit.clone(),
        }
    }

    pub fn set_persist_variables(&mut self, enabled: bool) {
        self.persist_variables = enabled;
    }

    /// Remember a resolved variable. Only written out with `persist_variables`.
    pub fn record_variable(&mut self, name: &str, value: &str, provenance: &str) {
        self.variables.insert(
            name.to_string(),
            PersistedVariable {
                value: value.to_string(),
                provenance: provenance.to_string(),
            },
        );
    }

    /// Variables carried by the loaded snapshot, if persistence is on.
    pub fn persisted_variables(&self) -> BTreeMap<String, PersistedVariable> {
        if self.persist_variables {
            self.variables.clone()
        } else {
            BTreeMap::new()
        }
    }

    /// Put a failed or blocked action back to `Pending`.
    ///
    /// With `cascade`, every blocked descendant is reset too. Returns the ids
    /// that changed, in topological order.
    pub fn reset(
        &mut self,
        plan: &Plan,
        id: &str,
        cascade: bool,
        note: Option<&str>,
    ) -> Result<Vec<ActionId>> {
        let status = self
            .state
            .status_of(id)
            .ok_or_else(|| PlanrunError::UnknownAction(id.to_string()))?;

        if !status.is_obstruction() {
            return Err(PlanrunError::InvalidReset {
                action: id.to_string(),
                status,
            });
        }

        let mut targets = vec![id.to_string()];
        if cascade {
            targets.extend(
                plan.graph()
                    .descendants_of(id)
                    .into_iter()
                    .filter(|d| self.state.status_of(d) == Some(Status::Blocked)),
            );
        }

        for target in &targets {
            self.audited(target, Status::Pending, note.unwrap_or("reset"));
        }
        info!(action = %id, count = targets.len(), "reset to pending");
        self.persist()?;
        Ok(targets)
    }

    /// Reset every failed action and every blocked action. Used by
    /// `resume --retry-failed`.
    pub fn reset_all_failed(&mut self, note: &str) -> Result<Vec<ActionId>> {
        let targets: Vec<ActionId> = self
            .state
            .records()
            .filter(|(_, r)| r.status.is_obstruction())
            .map(|(id, _)| id.to_string())
            .collect();

        if targets.is_empty() {
            return Ok(targets);
        }
        for target in &targets {
            self.audited(target, Status::Pending, note);
        }
        self.persist()?;
        Ok(targets)
    }

    /// Record that the operator completed `id` by hand.
    pub fn mark_succeeded(&mut self, id: &str, note: Option<&str>) -> Result<()> {
        let status = self
            .state
            .status_of(id)
            .ok_or_else(|| PlanrunError::UnknownAction(id.to_string()))?;

        if !matches!(status, Status::Pending | Status::Failed | Status::Blocked) {
            return Err(PlanrunError::InvalidMarkDone {
                action: id.to_string(),
                status,
            });
        }

        self.audited(id, Status::Succeeded, note.unwrap_or("marked done by operator"));
        info!(action = %id, "marked succeeded");
        self.persist()
    }

    fn audited(&mut self, id: &str, to: Status, note: &str) {
        let from = self.state.status_of(id).unwrap_or(Status::Pending);
        let meta = TransitionMeta::now().with_summary(note);
        self.audit.push(AuditEntry {
            at: meta.at,
            action: id.to_string(),
            from,
            to,
            note: Some(note.to_string()),
        });
        apply(&mut self.state, id, to, &meta);
    }
}

/// Check that `snapshot` can describe a run of `plan`: supported schema,
/// exactly the plan's actions, and no derived statuses.
pub fn check_snapshot(plan: &Plan, snapshot: &Snapshot) -> Result<()> {
    if snapshot.schema_version == 0 || snapshot.schema_version > SCHEMA_VERSION {
        return Err(PlanrunError::StateCorruption(format!(
            "unsupported snapshot schema version {}",
            snapshot.schema_version
        )));
    }

    for id in snapshot.actions.keys() {
        if !plan.contains(id) {
            return Err(PlanrunError::StateCorruption(format!(
                "snapshot refers to action '{id}', which is not in the plan"
            )));
        }
    }
    for id in plan.action_ids() {
        if !snapshot.actions.contains_key(id) {
            return Err(PlanrunError::StateCorruption(format!(
                "snapshot has no record for action '{id}'"
            )));
        }
    }
    if let Some((id, _)) = snapshot
        .actions
        .iter()
        .find(|(_, r)| !r.status.is_persistable())
    {
        return Err(PlanrunError::StateCorruption(format!(
            "action '{id}' is stored as ready, which is never persisted"
        )));
    }
    Ok(())
}

fn apply(state: &mut ExecutionState, id: &str, to: Status, meta: &TransitionMeta) {
    let Some(record) = state.record_mut(id) else {
        return;
    };
    record.status = to;
    match to {
        Status::Running => {
            record.started_at = Some(meta.at);
            record.ended_at = None;
            record.summary = None;
            record.attempts += 1;
        }
        Status::Succeeded | Status::Failed => {
            record.ended_at = Some(meta.at);
            record.summary = meta.summary.clone();
        }
        Status::Blocked => {
            record.summary = meta.summary.clone();
        }
        Status::Pending => {
            record.started_at = None;
            record.ended_at = None;
            record.summary = meta.summary.clone();
        }
        Status::Ready => {}
    }
}
