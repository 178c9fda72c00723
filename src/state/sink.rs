// src/state/sink.rs

//! Where snapshots go after every state change.

use std::fmt::Debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::Result;
use crate::state::snapshot::Snapshot;

/// Abstract persistence for snapshots.
pub trait SnapshotSink: Send + Debug {
    fn write(&mut self, snapshot: &Snapshot) -> Result<()>;

    /// Location shown to the operator, e.g. in the resume hint.
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// Writes each snapshot to a JSON file, replacing it atomically.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for FileSink {
    fn write(&mut self, snapshot: &Snapshot) -> Result<()> {
        let data = snapshot.to_json()?;
        atomic_write(&self.path, data.as_bytes())?;
        debug!(path = %self.path.display(), bytes = data.len(), "snapshot written");
        Ok(())
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Write `data` to `path` through a tempfile in the same directory, so a
/// crash mid-write never leaves a truncated snapshot behind.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary snapshot in {:?}", dir))?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Keeps every written snapshot in memory.
///
/// Clones share the same history, so a test can hand one clone to the store
/// and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    history: Arc<Mutex<Vec<Snapshot>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All snapshots written so far, oldest first.
    pub fn history(&self) -> Vec<Snapshot> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Snapshot> {
        self.history.lock().ok().and_then(|h| h.last().cloned())
    }

    pub fn writes(&self) -> usize {
        self.history.lock().map(|h| h.len()).unwrap_or(0)
    }
}

impl SnapshotSink for MemorySink {
    fn write(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.history
            .lock()
            .map_err(|_| anyhow!("snapshot history lock poisoned"))?
            .push(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_sink_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/state/run.json");
        let mut sink = FileSink::new(&path);

        sink.write(&Snapshot::empty()).unwrap();

        let back = Snapshot::read_from(&path).unwrap();
        assert_eq!(back, Snapshot::empty());
        assert_eq!(sink.location(), Some(path.as_path()));
    }

    #[test]
    fn memory_sink_clones_share_history() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.write(&Snapshot::empty()).unwrap();
        writer.write(&Snapshot::empty()).unwrap();
        assert_eq!(sink.writes(), 2);
    }
}
