//! Configured projects.
//!
//! A configured project is rooted in a config file: the file list comes
//! from `files`/`include`/`exclude`, plugins load at construction, and
//! three watcher collections (config file, wildcard directories, type
//! roots) keep the root set honest. A change to the config file itself sets
//! the reload latch; the next graph update defers to the service's reload
//! path instead of recomputing.

use crate::config::{ParsedProjectConfig, WildcardDirectory, load_project_config};
use crate::engine::LanguageService;
use crate::errors::ProjectDiagnostic;
use crate::options::{CompilerOptions, PluginEntry, TypeAcquisition};
use crate::paths::{NormalizedPath, combine_paths, directory_of, normalize_slashes};
use crate::plugins::{PluginCreateInfo, PluginModule, ProjectView};
use crate::project::{Flavor, Project, no_input_files_position};
use crate::resolution::ModuleResolver;
use crate::script::{ProjectId, ScriptStore};
use crate::service::{ProjectHost, ServerHost};
use crate::watch::{FileWatchEventKind, WatchType, WatcherCloseReason, WatcherHandle};
use anyhow::Result;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) struct WildcardWatcher {
    pub handle: WatcherHandle,
    pub recursive: bool,
}

pub(crate) struct ConfiguredState {
    pub config_file_path: NormalizedPath,
    pub config_file_name: String,
    pub open_ref_count: u32,
    pub pending_reload: bool,
    pub config_file_watcher: Option<WatcherHandle>,
    pub wildcard_directory_watchers: FxHashMap<NormalizedPath, WildcardWatcher>,
    pub type_root_watchers: FxHashMap<NormalizedPath, WatcherHandle>,
    pub plugin_modules: Vec<(String, Arc<dyn PluginModule>)>,
    pub extended_config_files: Vec<String>,
    pub has_explicit_files: bool,
}

impl Project {
    /// Create a configured project from a resolved config-file path. Loads
    /// the config, installs plugins, adds the configured roots, and opens
    /// the watcher collections.
    pub fn new_configured(
        id: ProjectId,
        config_file_name: &str,
        host: Rc<dyn ProjectHost>,
        server: Rc<dyn ServerHost>,
        scripts: Rc<RefCell<ScriptStore>>,
        language_service: Box<dyn LanguageService>,
        resolver: Box<dyn ModuleResolver>,
    ) -> Result<Project> {
        let config_file_name = normalize_slashes(config_file_name);
        let parsed = load_project_config(&*server, &config_file_name)?;
        let config_file_path = scripts.borrow().to_path(&config_file_name);

        let (language_service, plugin_modules) = enable_plugins(
            &*host,
            &*server,
            &config_file_name,
            &parsed.options,
            language_service,
        );

        let state = ConfiguredState {
            config_file_path: config_file_path.clone(),
            config_file_name: config_file_name.clone(),
            open_ref_count: 0,
            pending_reload: false,
            config_file_watcher: None,
            wildcard_directory_watchers: FxHashMap::default(),
            type_root_watchers: FxHashMap::default(),
            plugin_modules,
            extended_config_files: parsed.extended_config_files.clone(),
            has_explicit_files: parsed.has_explicit_files,
        };
        let mut project = Project::new_common(
            config_file_name,
            id,
            Flavor::Configured(state),
            host,
            server,
            scripts,
            language_service,
            resolver,
            parsed.compile_on_save,
        );
        project.type_acquisition =
            TypeAcquisition::normalized(parsed.type_acquisition.as_ref(), false);
        project.set_compiler_options(&parsed.options);
        project.apply_config_roots(&parsed);

        let watcher = project.host.add_file_watcher(
            WatchType::ConfigFilePath,
            &project.project_name,
            &config_file_path,
        );
        if let Flavor::Configured(state) = &mut project.flavor {
            state.config_file_watcher = Some(watcher);
        }
        project.watch_wildcard_directories(&parsed.wildcard_directories);
        project.watch_type_roots();
        project.update_error_on_no_input_files(!parsed.file_names.is_empty());
        Ok(project)
    }

    pub fn config_file_name(&self) -> Option<&str> {
        match &self.flavor {
            Flavor::Configured(state) => Some(&state.config_file_name),
            _ => None,
        }
    }

    pub fn config_file_path(&self) -> Option<&NormalizedPath> {
        match &self.flavor {
            Flavor::Configured(state) => Some(&state.config_file_path),
            _ => None,
        }
    }

    pub fn pending_reload(&self) -> bool {
        matches!(&self.flavor, Flavor::Configured(state) if state.pending_reload)
    }

    /// Latch a reload request; the next graph update defers to the
    /// service's reload path.
    pub fn set_pending_reload(&mut self) {
        if let Flavor::Configured(state) = &mut self.flavor {
            state.pending_reload = true;
            self.mark_as_dirty();
        }
    }

    pub fn open_ref_count(&self) -> u32 {
        match &self.flavor {
            Flavor::Configured(state) => state.open_ref_count,
            _ => 0,
        }
    }

    pub fn add_open_ref(&mut self) {
        if let Flavor::Configured(state) = &mut self.flavor {
            state.open_ref_count += 1;
        }
    }

    /// Drop one open-script reference. The service deletes the project when
    /// the returned count reaches zero.
    pub fn release_open_ref(&mut self) -> u32 {
        match &mut self.flavor {
            Flavor::Configured(state) => {
                state.open_ref_count = state.open_ref_count.saturating_sub(1);
                state.open_ref_count
            }
            _ => 0,
        }
    }

    /// Re-evaluate the config file from disk: recompute roots, options,
    /// type acquisition, and the watcher collections.
    pub fn reload_configuration(&mut self) -> Result<()> {
        let config_file_name = match &self.flavor {
            Flavor::Configured(state) => state.config_file_name.clone(),
            _ => return Ok(()),
        };
        let parsed = load_project_config(&*self.server, &config_file_name)?;

        let desired_roots: FxHashSet<NormalizedPath> = {
            let scripts = self.scripts.borrow();
            parsed
                .file_names
                .iter()
                .chain(parsed.missing_files.iter())
                .map(|name| scripts.to_path(name))
                .collect()
        };
        let stale: Vec<NormalizedPath> = self
            .root_files_map
            .keys()
            .filter(|path| !desired_roots.contains(*path))
            .cloned()
            .collect();
        for path in stale {
            self.remove_file(&path, true);
        }

        if let Flavor::Configured(state) = &mut self.flavor {
            state.extended_config_files = parsed.extended_config_files.clone();
            state.has_explicit_files = parsed.has_explicit_files;
        }
        self.type_acquisition =
            TypeAcquisition::normalized(parsed.type_acquisition.as_ref(), false);
        self.compile_on_save_enabled = parsed.compile_on_save;
        self.set_compiler_options(&parsed.options);
        self.apply_config_roots(&parsed);
        self.watch_wildcard_directories(&parsed.wildcard_directories);
        self.watch_type_roots();
        self.update_error_on_no_input_files(!parsed.file_names.is_empty());
        self.mark_as_dirty();
        Ok(())
    }

    fn apply_config_roots(&mut self, parsed: &ParsedProjectConfig) {
        for file_name in &parsed.file_names {
            let path = {
                let text = self.server.read_file(file_name);
                let mut scripts = self.scripts.borrow_mut();
                scripts.get_or_create(file_name, false, text, None)
            };
            if !self.root_files_map.contains_key(&path) {
                self.add_root(&path);
            }
        }
        for file_name in &parsed.missing_files {
            self.add_missing_file_root(file_name);
        }
    }

    /// Union of every plugin's contributed files, sorted and unique.
    pub(crate) fn configured_external_files(&self) -> Vec<String> {
        let Flavor::Configured(state) = &self.flavor else {
            return Vec::new();
        };
        let view = ProjectView {
            project_name: &self.project_name,
            config_file_name: Some(&state.config_file_name),
        };
        let mut files = Vec::new();
        for (name, module) in &state.plugin_modules {
            let contributed = module.external_files(&view);
            if !contributed.is_empty() {
                debug!(plugin = %name, files = contributed.len(), "plugin contributed external files");
            }
            files.extend(contributed);
        }
        files.sort();
        files.dedup();
        files
    }

    /// Maintain the no-input-files diagnostic: removed once the project has
    /// files, added while it has none and the config lists no explicit
    /// `files`.
    pub fn update_error_on_no_input_files(&mut self, has_file_names: bool) {
        let (config_file_name, has_explicit_files) = match &self.flavor {
            Flavor::Configured(state) => {
                (state.config_file_name.clone(), state.has_explicit_files)
            }
            _ => return,
        };
        let position = no_input_files_position(&self.project_errors);
        if has_file_names {
            if let Some(position) = position {
                self.project_errors.remove(position);
            }
        } else if !has_explicit_files && position.is_none() {
            self.project_errors
                .push(ProjectDiagnostic::no_input_files(&config_file_name));
        }
    }

    /// The config file itself changed or disappeared: latch a reload and
    /// schedule a refresh.
    pub fn on_config_file_event(&mut self, _event: FileWatchEventKind) {
        if self.closed || !matches!(self.flavor, Flavor::Configured(_)) {
            return;
        }
        self.set_pending_reload();
        self.host.schedule_project_update(&self.project_name);
    }

    /// A change under a wildcard directory may add or remove root files.
    pub fn on_wildcard_directory_event(
        &mut self,
        _path: &NormalizedPath,
        _event: FileWatchEventKind,
    ) {
        if self.closed || !matches!(self.flavor, Flavor::Configured(_)) {
            return;
        }
        self.mark_as_dirty();
        self.host.schedule_project_update(&self.project_name);
    }

    /// A change under an effective type root may add or remove ambient
    /// declaration packages.
    pub fn on_type_root_event(&mut self, _path: &NormalizedPath, _event: FileWatchEventKind) {
        if self.closed || !matches!(self.flavor, Flavor::Configured(_)) {
            return;
        }
        self.mark_as_dirty();
        self.host.schedule_project_update(&self.project_name);
    }

    fn watch_wildcard_directories(&mut self, directories: &[WildcardDirectory]) {
        let desired: FxHashMap<NormalizedPath, bool> = {
            let scripts = self.scripts.borrow();
            directories
                .iter()
                .map(|wildcard| (scripts.to_path(&wildcard.directory), wildcard.recursive))
                .collect()
        };
        let Flavor::Configured(state) = &mut self.flavor else {
            return;
        };

        let stale: Vec<NormalizedPath> = state
            .wildcard_directory_watchers
            .keys()
            .filter(|path| !desired.contains_key(*path))
            .cloned()
            .collect();
        for path in stale {
            if let Some(watcher) = state.wildcard_directory_watchers.remove(&path) {
                self.host.close_directory_watcher(
                    WatchType::WildcardDirectories,
                    &self.project_name,
                    &path,
                    watcher.handle,
                    WatcherCloseReason::NotNeeded,
                );
            }
        }

        for (path, recursive) in &desired {
            match state
                .wildcard_directory_watchers
                .get(path)
                .map(|watcher| watcher.recursive)
            {
                Some(existing) if existing == *recursive => continue,
                Some(_) => {
                    if let Some(watcher) = state.wildcard_directory_watchers.remove(path) {
                        self.host.close_directory_watcher(
                            WatchType::WildcardDirectories,
                            &self.project_name,
                            path,
                            watcher.handle,
                            WatcherCloseReason::RecursiveChanged,
                        );
                    }
                }
                None => {}
            }
            let handle = self.host.add_directory_watcher(
                WatchType::WildcardDirectories,
                &self.project_name,
                path,
                *recursive,
            );
            state
                .wildcard_directory_watchers
                .insert(path.clone(), WildcardWatcher {
                    handle,
                    recursive: *recursive,
                });
        }
    }

    /// Directories supplying ambient declaration packages: `typeRoots` when
    /// configured, else `node_modules/@types` next to the config file.
    pub fn effective_type_roots(&self) -> Vec<String> {
        let Flavor::Configured(state) = &self.flavor else {
            return Vec::new();
        };
        let config_dir = directory_of(&state.config_file_name).unwrap_or(".");
        match &self.compiler_options.type_roots {
            Some(roots) => roots
                .iter()
                .map(|root| combine_paths(config_dir, root))
                .collect(),
            None => vec![combine_paths(config_dir, "node_modules/@types")],
        }
    }

    fn watch_type_roots(&mut self) {
        let desired: FxHashSet<NormalizedPath> = {
            let scripts = self.scripts.borrow();
            self.effective_type_roots()
                .iter()
                .map(|root| scripts.to_path(root))
                .collect()
        };
        let Flavor::Configured(state) = &mut self.flavor else {
            return;
        };

        let stale: Vec<NormalizedPath> = state
            .type_root_watchers
            .keys()
            .filter(|path| !desired.contains(*path))
            .cloned()
            .collect();
        for path in stale {
            if let Some(handle) = state.type_root_watchers.remove(&path) {
                self.host.close_directory_watcher(
                    WatchType::TypeRoot,
                    &self.project_name,
                    &path,
                    handle,
                    WatcherCloseReason::NotNeeded,
                );
            }
        }
        for path in desired {
            if !state.type_root_watchers.contains_key(&path) {
                let handle = self.host.add_directory_watcher(
                    WatchType::TypeRoot,
                    &self.project_name,
                    &path,
                    true,
                );
                state.type_root_watchers.insert(path, handle);
            }
        }
    }

    /// Close type-root, wildcard-directory, and config-file watchers, in
    /// that order.
    pub(crate) fn close_configured_watchers(&mut self, reason: WatcherCloseReason) {
        let Flavor::Configured(state) = &mut self.flavor else {
            return;
        };
        for (path, handle) in state.type_root_watchers.drain() {
            self.host.close_directory_watcher(
                WatchType::TypeRoot,
                &self.project_name,
                &path,
                handle,
                reason,
            );
        }
        for (path, watcher) in state.wildcard_directory_watchers.drain() {
            self.host.close_directory_watcher(
                WatchType::WildcardDirectories,
                &self.project_name,
                &path,
                watcher.handle,
                reason,
            );
        }
        if let Some(handle) = state.config_file_watcher.take() {
            self.host.close_file_watcher(
                WatchType::ConfigFilePath,
                &self.project_name,
                &state.config_file_path,
                handle,
                reason,
            );
        }
    }
}

/// Resolve and activate the configured plugin list, wrapping the language
/// service in load order. Local loads (the config directory, prepended) are
/// gated by service policy; failures are logged and skipped, never fatal.
fn enable_plugins(
    host: &dyn ProjectHost,
    server: &dyn ServerHost,
    config_file_name: &str,
    options: &CompilerOptions,
    mut language_service: Box<dyn LanguageService>,
) -> (Box<dyn LanguageService>, Vec<(String, Arc<dyn PluginModule>)>) {
    let mut search_paths: Vec<String> = Vec::new();
    if host.allow_local_plugin_loads()
        && let Some(config_dir) = directory_of(config_file_name)
    {
        search_paths.push(config_dir.to_string());
    }
    // Package root before the global probe locations.
    if let Some(executing_dir) = directory_of(&server.get_executing_file_path()) {
        search_paths.push(executing_dir.to_string());
    }
    search_paths.extend(host.plugin_probe_locations());

    let mut entries: Vec<PluginEntry> = options.plugins.clone().unwrap_or_default();
    for global in host.global_plugins() {
        if !entries.iter().any(|entry| entry.name == global) {
            entries.push(PluginEntry {
                name: global,
                config: serde_json::Value::Null,
            });
        }
    }

    let mut modules = Vec::new();
    for entry in entries {
        let mut resolved = None;
        for search_path in &search_paths {
            match server.require(search_path, &entry.name) {
                Ok(module) => {
                    resolved = Some(module);
                    break;
                }
                Err(error) => {
                    debug!(plugin = %entry.name, path = %search_path, %error, "plugin probe failed");
                }
            }
        }
        let Some(module) = resolved else {
            warn!(plugin = %entry.name, "could not resolve plugin module");
            continue;
        };

        let info = PluginCreateInfo {
            project_name: config_file_name.to_string(),
            config: entry.config.clone(),
        };
        match module.create(&info, language_service) {
            Ok(wrapped) => {
                language_service = wrapped;
                modules.push((entry.name.clone(), module));
            }
            Err(failure) => {
                warn!(plugin = %entry.name, error = %failure.error, "plugin activation failed");
                language_service = failure.language_service;
            }
        }
    }
    (language_service, modules)
}
