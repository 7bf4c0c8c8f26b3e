//! Watcher vocabulary and the missing-files table.
//!
//! The project core never touches the file system directly; it asks the
//! project host for watcher handles and records why each one is closed so
//! tests can assert on lifecycle without string matching.

use crate::paths::NormalizedPath;
use rustc_hash::FxHashMap;

/// What a watcher is observing. Used for logging and host-side policy only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchType {
    FailedLookupLocation,
    MissingFilePath,
    ConfigFilePath,
    WildcardDirectories,
    TypeRoot,
}

/// File-system event kinds delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileWatchEventKind {
    Created,
    Changed,
    Deleted,
}

/// Why a watcher was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherCloseReason {
    /// The owning project is shutting down.
    ProjectClose,
    /// The watched path is no longer referenced.
    NotNeeded,
    /// A missing file came into existence.
    FileCreated,
    /// A wildcard directory's recursive flag changed.
    RecursiveChanged,
}

/// Opaque token identifying a watcher registration with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherHandle(pub u64);

/// One watcher per file the current program references but that does not
/// exist on disk. Reconciled against the program after every graph update.
#[derive(Debug, Default)]
pub struct MissingFilesMap {
    map: FxHashMap<NormalizedPath, WatcherHandle>,
}

impl MissingFilesMap {
    pub fn contains(&self, path: &NormalizedPath) -> bool {
        self.map.contains_key(path)
    }

    pub fn insert(&mut self, path: NormalizedPath, handle: WatcherHandle) {
        self.map.insert(path, handle);
    }

    pub fn remove(&mut self, path: &NormalizedPath) -> Option<WatcherHandle> {
        self.map.remove(path)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &NormalizedPath> {
        self.map.keys()
    }

    /// Drain every entry, e.g. on project close.
    pub fn take_all(&mut self) -> Vec<(NormalizedPath, WatcherHandle)> {
        self.map.drain().collect()
    }
}
