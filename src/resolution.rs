//! Module-resolution seam and the resolution-cache adapter.
//!
//! The resolver itself is external; the adapter tracks which files' cached
//! resolutions were invalidated, exposes the recording window the graph
//! update runs under, and owns one failed-lookup watcher per location a
//! resolution probe touched without finding a file. An event on a
//! failed-lookup location invalidates the resolutions of every file that
//! probed it.

use crate::options::CompilerOptions;
use crate::paths::NormalizedPath;
use crate::service::ProjectHost;
use crate::watch::{WatchType, WatcherCloseReason, WatcherHandle};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// A successful module resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    pub resolved_file_name: String,
    pub path: NormalizedPath,
    /// Whether the target lives in an external package directory.
    pub is_external_library_import: bool,
}

/// Outcome of resolving one specifier from one file.
#[derive(Debug, Clone, Default)]
pub struct ResolutionResult {
    pub resolved: Option<ResolvedModule>,
    /// Locations probed without finding a file; watched so their creation
    /// can re-trigger resolution.
    pub failed_lookup_locations: Vec<String>,
}

/// External resolver seam.
pub trait ModuleResolver {
    fn resolve(
        &mut self,
        containing_file: &str,
        specifier: &str,
        options: &CompilerOptions,
    ) -> ResolutionResult;
}

/// Bookkeeping wrapper around the external resolver.
pub struct ResolutionCache {
    case_sensitive: bool,
    /// Files whose cached resolutions must be discarded at the next update.
    invalidated: FxHashSet<NormalizedPath>,
    invalidate_all: bool,
    /// Snapshot taken by `start_recording`; answers the per-file predicate
    /// the engine consults during the update.
    window: Option<FxHashSet<NormalizedPath>>,
    window_all: bool,
    /// Failed lookups reported during the current engine pass:
    /// location → containing files.
    staged: FxHashMap<NormalizedPath, FxHashSet<NormalizedPath>>,
    watchers: FxHashMap<NormalizedPath, (WatcherHandle, FxHashSet<NormalizedPath>)>,
}

impl ResolutionCache {
    pub fn new(case_sensitive: bool) -> ResolutionCache {
        ResolutionCache {
            case_sensitive,
            invalidated: FxHashSet::default(),
            invalidate_all: false,
            window: None,
            window_all: false,
            staged: FxHashMap::default(),
            watchers: FxHashMap::default(),
        }
    }

    /// Discard the cached resolutions of one file.
    pub fn invalidate(&mut self, path: &NormalizedPath) {
        self.invalidated.insert(path.clone());
    }

    /// Discard every cached resolution; used when compiler options change
    /// in resolution-affecting ways.
    pub fn clear(&mut self) {
        self.invalidate_all = true;
        self.invalidated.clear();
    }

    /// Open the recording window for one graph update. The set of files
    /// invalidated so far becomes the window snapshot.
    pub fn start_recording(&mut self) {
        self.window = Some(std::mem::take(&mut self.invalidated));
        self.window_all = std::mem::take(&mut self.invalidate_all);
        self.staged.clear();
    }

    /// Predicate published to the engine: should this file's cached
    /// resolutions be discarded during the current update?
    pub fn has_invalidated_resolution(&self, path: &NormalizedPath) -> bool {
        self.window_all
            || self
                .window
                .as_ref()
                .is_some_and(|window| window.contains(path))
    }

    /// Close the recording window and return the files whose resolutions
    /// changed during the update, sorted.
    pub fn finish_recording(&mut self) -> Vec<NormalizedPath> {
        self.window_all = false;
        let mut changed: Vec<NormalizedPath> =
            self.window.take().unwrap_or_default().into_iter().collect();
        changed.sort();
        changed
    }

    /// Record a failed lookup location observed while resolving from
    /// `containing`. Called by the engine for every failed lookup of the
    /// new program.
    pub fn note_failed_lookup(&mut self, containing: &NormalizedPath, location: &str) {
        let location = NormalizedPath::new(location, self.case_sensitive);
        self.staged
            .entry(location)
            .or_default()
            .insert(containing.clone());
    }

    /// Reconcile failed-lookup watchers against what the last engine pass
    /// reported: watch new locations, close watchers for locations no
    /// resolution probes anymore.
    pub fn commit_failed_lookups(&mut self, host: &dyn ProjectHost, project: &str) {
        let staged = std::mem::take(&mut self.staged);

        let gone: Vec<NormalizedPath> = self
            .watchers
            .keys()
            .filter(|location| !staged.contains_key(*location))
            .cloned()
            .collect();
        for location in gone {
            if let Some((handle, _)) = self.watchers.remove(&location) {
                host.close_file_watcher(
                    WatchType::FailedLookupLocation,
                    project,
                    &location,
                    handle,
                    WatcherCloseReason::NotNeeded,
                );
            }
        }

        for (location, containing) in staged {
            match self.watchers.get_mut(&location) {
                Some((_, refs)) => *refs = containing,
                None => {
                    let handle =
                        host.add_file_watcher(WatchType::FailedLookupLocation, project, &location);
                    self.watchers.insert(location, (handle, containing));
                }
            }
        }
    }

    /// A watched failed-lookup location saw a file-system event: invalidate
    /// every file whose resolution probed it. Returns whether the location
    /// was known.
    pub fn invalidate_failed_lookup(&mut self, location: &NormalizedPath) -> bool {
        let Some((_, containing)) = self.watchers.get(location) else {
            return false;
        };
        debug!(
            location = %location,
            files = containing.len(),
            "failed lookup location changed"
        );
        for path in containing {
            self.invalidated.insert(path.clone());
        }
        true
    }

    pub fn watched_failed_lookups(&self) -> impl Iterator<Item = &NormalizedPath> {
        self.watchers.keys()
    }

    /// Close every failed-lookup watcher, e.g. on project close.
    pub fn close_watchers(
        &mut self,
        host: &dyn ProjectHost,
        project: &str,
        reason: WatcherCloseReason,
    ) {
        for (location, (handle, _)) in self.watchers.drain() {
            host.close_file_watcher(
                WatchType::FailedLookupLocation,
                project,
                &location,
                handle,
                reason,
            );
        }
        self.invalidated.clear();
        self.staged.clear();
        self.window = None;
        self.window_all = false;
        self.invalidate_all = false;
    }
}
