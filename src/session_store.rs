//! Run snapshot persistence across the human checkpoint.
//!
//! A run suspended in `AwaitingHuman` (or interrupted anywhere else) is saved
//! as a versioned JSON snapshot keyed by run id, so a later process can load
//! it and continue from the recorded phase.
//!
//! ## Design Decisions
//!
//! - **Keyed store trait**: the orchestrator only sees `SessionStore`; the
//!   file store backs the CLI, the memory store backs tests and embedders.
//! - **Snapshot location**: `~/.content-alchemist/sessions/<run-id>.json`
//! - **Atomic writes**: temp file plus rename, serialized with an `fs2` lock.

use crate::domain::{Phase, RunId};
use crate::state::WorkflowState;
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Current snapshot format version.
/// Increment this when making breaking changes to the snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A persisted run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Snapshot format version for migration compatibility
    pub version: u32,
    /// Timestamp when this snapshot was written (RFC3339 format)
    pub saved_at: String,
    pub state: WorkflowState,
}

impl SessionSnapshot {
    pub fn new(state: WorkflowState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            state,
        }
    }

    pub fn info(&self) -> RunSummary {
        RunSummary {
            run_id: self.state.run_id().to_string(),
            topic: self.state.topic().to_string(),
            phase: self.state.phase(),
            iteration_count: self.state.iteration_count(),
            max_iterations: self.state.params().max_iterations,
            saved_at: self.saved_at.clone(),
        }
    }
}

/// Information about a persisted run for listing purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub topic: String,
    pub phase: Phase,
    pub iteration_count: u32,
    pub max_iterations: u32,
    pub saved_at: String,
}

/// Keyed persistence boundary for run state.
pub trait SessionStore: Send + Sync {
    fn save(&self, state: &WorkflowState) -> Result<()>;

    /// Returns `None` when no snapshot exists for the id.
    fn load(&self, run_id: &RunId) -> Result<Option<WorkflowState>>;

    /// Lists persisted runs, most recently saved first.
    fn list(&self) -> Result<Vec<RunSummary>>;

    fn remove(&self, run_id: &RunId) -> Result<()>;
}

/// Stores one JSON snapshot file per run in a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create sessions directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn snapshot_path(&self, run_id: &RunId) -> PathBuf {
        self.dir.join(format!("{}.json", run_id))
    }

    /// Opens and exclusively locks the store's lock file. The lock is released
    /// when the returned handle is dropped.
    fn lock(&self) -> Result<File> {
        let path = self.dir.join(".lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock: {}", path.display()))?;
        Ok(file)
    }

    fn read_snapshot(path: &Path) -> Result<SessionSnapshot> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot file: {}", path.display()))?;
        let snapshot: SessionSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot file: {}", path.display()))?;

        if snapshot.version > SNAPSHOT_VERSION {
            anyhow::bail!(
                "Snapshot version {} is newer than supported version {}. Please upgrade alchemist.",
                snapshot.version,
                SNAPSHOT_VERSION
            );
        }
        Ok(snapshot)
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, state: &WorkflowState) -> Result<()> {
        let snapshot = SessionSnapshot::new(state.clone());
        let path = self.snapshot_path(state.run_id());
        let temp_path = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(&snapshot)
            .context("Failed to serialize run snapshot")?;

        let _lock = self.lock()?;
        fs::write(&temp_path, content)
            .with_context(|| format!("Failed to write temp snapshot file: {}", temp_path.display()))?;
        fs::rename(&temp_path, &path)
            .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;
        Ok(())
    }

    fn load(&self, run_id: &RunId) -> Result<Option<WorkflowState>> {
        let path = self.snapshot_path(run_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::read_snapshot(&path)?.state))
    }

    fn list(&self) -> Result<Vec<RunSummary>> {
        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read sessions directory: {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match Self::read_snapshot(&path) {
                    Ok(snapshot) => runs.push(snapshot.info()),
                    Err(e) => tracing::warn!(path = %path.display(), "skipping snapshot: {:#}", e),
                }
            }
        }

        // Newest first
        runs.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(runs)
    }

    fn remove(&self, run_id: &RunId) -> Result<()> {
        let path = self.snapshot_path(run_id);
        let _lock = self.lock()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to delete snapshot: {}", path.display()))?;
        }
        Ok(())
    }
}

/// In-process store keyed by run id.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    runs: Mutex<HashMap<String, SessionSnapshot>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn runs(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionSnapshot>>> {
        self.runs
            .lock()
            .map_err(|_| anyhow::anyhow!("session store lock poisoned"))
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, state: &WorkflowState) -> Result<()> {
        self.runs()?
            .insert(state.run_id().to_string(), SessionSnapshot::new(state.clone()));
        Ok(())
    }

    fn load(&self, run_id: &RunId) -> Result<Option<WorkflowState>> {
        Ok(self
            .runs()?
            .get(&run_id.to_string())
            .map(|s| s.state.clone()))
    }

    fn list(&self) -> Result<Vec<RunSummary>> {
        let mut runs: Vec<RunSummary> = self.runs()?.values().map(SessionSnapshot::info).collect();
        runs.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(runs)
    }

    fn remove(&self, run_id: &RunId) -> Result<()> {
        self.runs()?.remove(&run_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Topic;
    use crate::state::RunParameters;
    use tempfile::TempDir;

    fn test_state(topic: &str) -> WorkflowState {
        WorkflowState::new(Topic::new(topic).unwrap(), RunParameters::default())
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("sessions")).unwrap();
        let state = test_state("Tides");

        store.save(&state).unwrap();
        let loaded = store.load(state.run_id()).unwrap().expect("snapshot exists");
        assert_eq!(loaded.run_id(), state.run_id());
        assert_eq!(loaded.topic().as_str(), "Tides");

        // No temp file left behind
        let leftovers: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_file_store_missing_run() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        assert!(store.load(&RunId::new()).unwrap().is_none());
    }

    #[test]
    fn test_file_store_list_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        let a = test_state("Tides");
        let b = test_state("Wind");
        store.save(&a).unwrap();
        store.save(&b).unwrap();
        fs::write(dir.path().join("garbage.json"), "{not json").unwrap();

        let runs = store.list().unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().any(|r| r.topic == "Wind"));

        store.remove(a.run_id()).unwrap();
        assert!(store.load(a.run_id()).unwrap().is_none());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_newer_snapshot_version_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        let state = test_state("Tides");

        let mut snapshot = serde_json::to_value(SessionSnapshot::new(state.clone())).unwrap();
        snapshot["version"] = serde_json::json!(SNAPSHOT_VERSION + 1);
        fs::write(
            dir.path().join(format!("{}.json", state.run_id())),
            snapshot.to_string(),
        )
        .unwrap();

        let err = store.load(state.run_id()).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_memory_store_is_keyed_by_run() {
        let store = MemorySessionStore::new();
        let a = test_state("Tides");
        let b = test_state("Wind");
        store.save(&a).unwrap();
        store.save(&b).unwrap();

        assert_eq!(
            store.load(b.run_id()).unwrap().unwrap().topic().as_str(),
            "Wind"
        );
        store.remove(b.run_id()).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
