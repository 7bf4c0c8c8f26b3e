//! Seams to the surrounding server.
//!
//! The project core consumes two host surfaces: [`ServerHost`] is the
//! process-level environment (file system, hashing, plugin module loading)
//! and [`ProjectHost`] is the project service (watcher registry, update
//! scheduling, typings acquisition, policy flags). Both are object-safe so
//! tests can substitute recording fakes.

use crate::options::TypeAcquisition;
use crate::paths::{NormalizedPath, combine_paths, normalize_slashes};
use crate::plugins::PluginModule;
use crate::watch::{WatchType, WatcherCloseReason, WatcherHandle};
use anyhow::{Result, anyhow};
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::Hasher;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

/// Process-level host surface.
pub trait ServerHost {
    /// Resolve a possibly-relative path against the host's notion of the
    /// current directory.
    fn resolve_path(&self, path: &str) -> String;

    fn file_exists(&self, path: &str) -> bool;

    fn read_file(&self, path: &str) -> Option<String>;

    /// Recursive listing of the files under `root` carrying one of
    /// `extensions`. Exclusion policy is the caller's business.
    fn read_directory(&self, root: &str, extensions: &[&str]) -> Vec<String>;

    /// Stable content hash used for file version strings.
    fn create_hash(&self, data: &str) -> String;

    fn get_executing_file_path(&self) -> String;

    /// Load a plugin module by name from `initial_dir`. Failures are
    /// reported, never thrown past the project core.
    fn require(&self, initial_dir: &str, module_name: &str) -> Result<Arc<dyn PluginModule>>;
}

/// Typings-acquisition helper owned by the project service.
pub trait TypingsCache {
    /// Return the declaration files to add to the project's input set,
    /// given its current unresolved imports. The result is compared
    /// element-wise by the caller; ordering should be stable.
    fn typings_for_project(
        &self,
        project: &str,
        type_acquisition: &TypeAcquisition,
        unresolved_imports: &[String],
        has_changes: bool,
    ) -> Vec<String>;
}

/// Project-service surface consumed by every project.
pub trait ProjectHost {
    fn add_file_watcher(
        &self,
        watch_type: WatchType,
        project: &str,
        path: &NormalizedPath,
    ) -> WatcherHandle;

    fn close_file_watcher(
        &self,
        watch_type: WatchType,
        project: &str,
        path: &NormalizedPath,
        handle: WatcherHandle,
        reason: WatcherCloseReason,
    );

    fn add_directory_watcher(
        &self,
        watch_type: WatchType,
        project: &str,
        path: &NormalizedPath,
        recursive: bool,
    ) -> WatcherHandle;

    fn close_directory_watcher(
        &self,
        watch_type: WatchType,
        project: &str,
        path: &NormalizedPath,
        handle: WatcherHandle,
        reason: WatcherCloseReason,
    );

    /// Schedule one coalesced graph update for the project on the service
    /// task. Multiple dirty signals collapse into a single refresh.
    fn schedule_project_update(&self, project: &str);

    /// Ask the service to reload a configured project whose config file
    /// changed. The reload runs on the service task, not re-entrantly.
    fn reload_configured_project(&self, project: &str);

    /// (Re)start the config-file watches that could later promote an
    /// inferred root into a configured project.
    fn start_watching_config_files_for_inferred_root(&self, root: &NormalizedPath);

    fn stop_watching_config_files_for_inferred_root(&self, root: &NormalizedPath);

    fn typings_cache(&self) -> &dyn TypingsCache;

    fn use_single_inferred_project(&self) -> bool;

    fn allow_local_plugin_loads(&self) -> bool;

    fn global_plugins(&self) -> Vec<String>;

    fn plugin_probe_locations(&self) -> Vec<String>;

    /// Default library file to include unless `noLib` is set.
    fn default_library_file_name(&self) -> Option<String>;

    fn global_typings_cache_location(&self) -> Option<String>;
}

/// [`ServerHost`] backed by the real file system. Plugin modules come from
/// an explicit registry, since plugins are linked into the process rather
/// than loaded dynamically.
pub struct DiskServerHost {
    current_directory: String,
    executing_file_path: String,
    plugin_registry: FxHashMap<String, Arc<dyn PluginModule>>,
}

impl DiskServerHost {
    pub fn new(current_directory: impl Into<String>) -> DiskServerHost {
        let executing_file_path = std::env::current_exe()
            .map(|path| normalize_slashes(&path.to_string_lossy()))
            .unwrap_or_default();
        DiskServerHost {
            current_directory: normalize_slashes(&current_directory.into()),
            executing_file_path,
            plugin_registry: FxHashMap::default(),
        }
    }

    pub fn register_plugin(&mut self, name: &str, module: Arc<dyn PluginModule>) {
        self.plugin_registry.insert(name.to_string(), module);
    }
}

impl ServerHost for DiskServerHost {
    fn resolve_path(&self, path: &str) -> String {
        let normalized = normalize_slashes(path);
        if normalized.starts_with('/') || normalized.chars().nth(1) == Some(':') {
            normalized
        } else {
            combine_paths(&self.current_directory, &normalized)
        }
    }

    fn file_exists(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn read_file(&self, path: &str) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }

    fn read_directory(&self, root: &str, extensions: &[&str]) -> Vec<String> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let Ok(entry) = entry else {
                continue;
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = normalize_slashes(&entry.path().to_string_lossy());
            if extensions.iter().any(|ext| path.ends_with(ext)) {
                files.push(path);
            }
        }
        files.sort();
        files
    }

    fn create_hash(&self, data: &str) -> String {
        let mut hasher = FxHasher::default();
        hasher.write(data.as_bytes());
        format!("{:016x}", hasher.finish())
    }

    fn get_executing_file_path(&self) -> String {
        self.executing_file_path.clone()
    }

    fn require(&self, _initial_dir: &str, module_name: &str) -> Result<Arc<dyn PluginModule>> {
        self.plugin_registry
            .get(module_name)
            .cloned()
            .ok_or_else(|| anyhow!("cannot find module '{module_name}'"))
    }
}
