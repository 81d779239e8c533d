//! I/O boundary traits for testability
//!
//! These traits abstract external I/O and the member collaborator, allowing
//! services to be tested with in-memory implementations.

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::domain::{MemberId, NodeId, ProductionCapacity, Snapshot};

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Replace the file content in one step: readers see old or new, never a mix.
    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Create directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

/// Where the orchard state lives between runs.
pub trait StateRepository: Send + Sync {
    /// Load the last saved snapshot, `None` if nothing was saved yet.
    fn load(&self) -> io::Result<Option<Snapshot>>;

    /// Replace the saved snapshot.
    fn save(&self, snapshot: &Snapshot) -> io::Result<()>;

    /// Human readable location, for messages.
    fn location(&self) -> String;
}

/// Member-side operations the core consumes but does not own.
///
/// Calls are synchronous and confined to the member's own state.
pub trait MemberCollaborator: Send + Sync {
    /// Quantity the member produced for `node` this period.
    fn harvest_from_production(
        &self,
        member: MemberId,
        node: NodeId,
        capacity: Option<&ProductionCapacity>,
    ) -> i64;

    /// Record one period of engagement for the member on `node`.
    fn record_engagement(&self, member: MemberId, node: NodeId) -> Result<(), String>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        self.ensure_parent(path)?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                self.create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Snapshot stored as pretty JSON in a single file.
pub struct JsonStateRepository {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl JsonStateRepository {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateRepository for JsonStateRepository {
    fn load(&self) -> io::Result<Option<Snapshot>> {
        if !self.fs.exists(&self.path) {
            return Ok(None);
        }
        let content = self.fs.read_to_string(&self.path)?;
        let snapshot = serde_json::from_str(&content)?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> io::Result<()> {
        let content = serde_json::to_string_pretty(snapshot)?;
        self.fs.write_atomic(&self.path, &content)?;
        debug!(path = %self.path.display(), "saved orchard state");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keeps the snapshot in memory. Saves can be made to fail on demand.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    snapshot: Mutex<Option<Snapshot>>,
    fail_saves: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `save` fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn saved(&self) -> Option<Snapshot> {
        self.snapshot.lock().ok().and_then(|s| s.clone())
    }
}

impl StateRepository for InMemoryRepository {
    fn load(&self) -> io::Result<Option<Snapshot>> {
        let guard = self
            .snapshot
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "repository lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, snapshot: &Snapshot) -> io::Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "save refused"));
        }
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "repository lock poisoned"))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Default collaborator: members produce their capacity's full monthly yield.
#[derive(Debug, Default)]
pub struct CapacityYield;

impl MemberCollaborator for CapacityYield {
    fn harvest_from_production(
        &self,
        _member: MemberId,
        _node: NodeId,
        capacity: Option<&ProductionCapacity>,
    ) -> i64 {
        capacity.map(|c| c.monthly_yield.max(0)).unwrap_or(0)
    }

    fn record_engagement(&self, member: MemberId, node: NodeId) -> Result<(), String> {
        debug!(member = %member, node = %node, "engagement recorded");
        Ok(())
    }
}

/// Collaborator that remembers every engagement call.
///
/// Members listed in `refused` fail their engagement.
#[derive(Debug, Default)]
pub struct EngagementLog {
    calls: Mutex<Vec<(MemberId, NodeId)>>,
    refused: BTreeSet<MemberId>,
}

impl EngagementLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing(refused: impl IntoIterator<Item = MemberId>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            refused: refused.into_iter().collect(),
        }
    }

    pub fn calls(&self) -> Vec<(MemberId, NodeId)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl MemberCollaborator for EngagementLog {
    fn harvest_from_production(
        &self,
        member: MemberId,
        node: NodeId,
        capacity: Option<&ProductionCapacity>,
    ) -> i64 {
        CapacityYield.harvest_from_production(member, node, capacity)
    }

    fn record_engagement(&self, member: MemberId, node: NodeId) -> Result<(), String> {
        if self.refused.contains(&member) {
            return Err(format!("member {} cannot engage", member));
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((member, node));
        }
        Ok(())
    }
}
