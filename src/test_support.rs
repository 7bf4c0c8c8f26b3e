//! Shared test fixtures.
//!
//! Provides an in-memory server host, a recording project host, a
//! table-driven module resolver, and a deterministic fake language service
//! so project tests can drive the full graph-update protocol without a
//! compiler or a file system.

use crate::engine::{EmitOutput, LanguageService, OutputFile, ProgramHost};
use crate::options::{CompilerOptions, TypeAcquisition};
use crate::paths::{NormalizedPath, normalize_slashes};
use crate::plugins::{PluginActivationError, PluginCreateInfo, PluginModule, ProjectView};
use crate::program::{Program, ProgramUpdate, SourceFileSnapshot, StructureReuse};
use crate::project::Project;
use crate::resolution::{ModuleResolver, ResolutionResult, ResolvedModule};
use crate::script::{ProjectId, ScriptStore};
use crate::service::{ProjectHost, ServerHost, TypingsCache};
use crate::watch::{WatchType, WatcherCloseReason, WatcherHandle};
use anyhow::{Result, anyhow};
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::hash::Hasher;
use std::rc::Rc;
use std::sync::Arc;

pub const CASE_SENSITIVE: bool = true;

pub fn path_of(file_name: &str) -> NormalizedPath {
    NormalizedPath::new(file_name, CASE_SENSITIVE)
}

// ---------------------------------------------------------------------------
// Server host

#[derive(Default)]
pub struct TestServerHost {
    files: RefCell<FxHashMap<String, String>>,
    plugins: RefCell<FxHashMap<String, Arc<dyn PluginModule>>>,
    /// Every `require` probe as (initial dir, module name), in call order.
    pub require_log: RefCell<Vec<(String, String)>>,
}

impl TestServerHost {
    pub fn new() -> TestServerHost {
        TestServerHost::default()
    }

    pub fn write_file(&self, path: &str, text: &str) {
        self.files
            .borrow_mut()
            .insert(normalize_slashes(path), text.to_string());
    }

    pub fn remove_file(&self, path: &str) {
        self.files.borrow_mut().remove(&normalize_slashes(path));
    }

    pub fn register_plugin(&self, name: &str, module: Arc<dyn PluginModule>) {
        self.plugins.borrow_mut().insert(name.to_string(), module);
    }
}

impl ServerHost for TestServerHost {
    fn resolve_path(&self, path: &str) -> String {
        normalize_slashes(path)
    }

    fn file_exists(&self, path: &str) -> bool {
        self.files.borrow().contains_key(&normalize_slashes(path))
    }

    fn read_file(&self, path: &str) -> Option<String> {
        self.files.borrow().get(&normalize_slashes(path)).cloned()
    }

    fn read_directory(&self, root: &str, extensions: &[&str]) -> Vec<String> {
        let root = normalize_slashes(root);
        let prefix = format!("{root}/");
        let mut out: Vec<String> = self
            .files
            .borrow()
            .keys()
            .filter(|path| path.starts_with(&prefix))
            .filter(|path| extensions.iter().any(|ext| path.ends_with(ext)))
            .cloned()
            .collect();
        out.sort();
        out
    }

    fn create_hash(&self, data: &str) -> String {
        let mut hasher = FxHasher::default();
        hasher.write(data.as_bytes());
        format!("{:016x}", hasher.finish())
    }

    fn get_executing_file_path(&self) -> String {
        "/server/bin/language-server".to_string()
    }

    fn require(&self, initial_dir: &str, module_name: &str) -> Result<Arc<dyn PluginModule>> {
        self.require_log
            .borrow_mut()
            .push((initial_dir.to_string(), module_name.to_string()));
        self.plugins
            .borrow()
            .get(module_name)
            .cloned()
            .ok_or_else(|| anyhow!("cannot find module '{module_name}'"))
    }
}

// ---------------------------------------------------------------------------
// Project host

#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    FileAdded {
        watch_type: WatchType,
        path: NormalizedPath,
        handle: WatcherHandle,
    },
    FileClosed {
        watch_type: WatchType,
        path: NormalizedPath,
        handle: WatcherHandle,
        reason: WatcherCloseReason,
    },
    DirectoryAdded {
        watch_type: WatchType,
        path: NormalizedPath,
        recursive: bool,
        handle: WatcherHandle,
    },
    DirectoryClosed {
        watch_type: WatchType,
        path: NormalizedPath,
        handle: WatcherHandle,
        reason: WatcherCloseReason,
    },
}

#[derive(Default)]
pub struct TestTypingsCache {
    pub response: RefCell<Vec<String>>,
    pub calls: RefCell<Vec<(Vec<String>, bool)>>,
}

impl TypingsCache for TestTypingsCache {
    fn typings_for_project(
        &self,
        _project: &str,
        type_acquisition: &TypeAcquisition,
        unresolved_imports: &[String],
        has_changes: bool,
    ) -> Vec<String> {
        self.calls
            .borrow_mut()
            .push((unresolved_imports.to_vec(), has_changes));
        if type_acquisition.enable == Some(false) {
            return Vec::new();
        }
        self.response.borrow().clone()
    }
}

pub struct RecordingProjectHost {
    next_handle: Cell<u64>,
    pub events: RefCell<Vec<WatchEvent>>,
    pub scheduled_updates: RefCell<Vec<String>>,
    pub reload_requests: RefCell<Vec<String>>,
    pub inferred_root_watches: RefCell<Vec<(NormalizedPath, bool)>>,
    pub typings: TestTypingsCache,
    pub single_inferred: Cell<bool>,
    pub local_plugin_loads: Cell<bool>,
    pub globals: RefCell<Vec<String>>,
    pub probe_locations: RefCell<Vec<String>>,
    pub default_library: RefCell<Option<String>>,
}

impl Default for RecordingProjectHost {
    fn default() -> RecordingProjectHost {
        RecordingProjectHost {
            next_handle: Cell::new(1),
            events: RefCell::new(Vec::new()),
            scheduled_updates: RefCell::new(Vec::new()),
            reload_requests: RefCell::new(Vec::new()),
            inferred_root_watches: RefCell::new(Vec::new()),
            typings: TestTypingsCache::default(),
            single_inferred: Cell::new(false),
            local_plugin_loads: Cell::new(true),
            globals: RefCell::new(Vec::new()),
            probe_locations: RefCell::new(vec!["/plugins".to_string()]),
            default_library: RefCell::new(None),
        }
    }
}

impl RecordingProjectHost {
    pub fn new() -> RecordingProjectHost {
        RecordingProjectHost::default()
    }

    fn next(&self) -> WatcherHandle {
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        WatcherHandle(handle)
    }

    /// Paths with a currently open watcher of the given type.
    pub fn open_watchers(&self, watch_type: WatchType) -> Vec<NormalizedPath> {
        let mut open: Vec<NormalizedPath> = Vec::new();
        for event in self.events.borrow().iter() {
            match event {
                WatchEvent::FileAdded {
                    watch_type: t,
                    path,
                    ..
                }
                | WatchEvent::DirectoryAdded {
                    watch_type: t,
                    path,
                    ..
                } if *t == watch_type => open.push(path.clone()),
                WatchEvent::FileClosed {
                    watch_type: t,
                    path,
                    ..
                }
                | WatchEvent::DirectoryClosed {
                    watch_type: t,
                    path,
                    ..
                } if *t == watch_type => {
                    if let Some(idx) = open.iter().position(|p| p == path) {
                        open.remove(idx);
                    }
                }
                _ => {}
            }
        }
        open
    }

    /// The reason the most recent close of `path` carried, if any.
    pub fn last_close_reason(&self, path: &NormalizedPath) -> Option<WatcherCloseReason> {
        self.events
            .borrow()
            .iter()
            .rev()
            .find_map(|event| match event {
                WatchEvent::FileClosed {
                    path: closed,
                    reason,
                    ..
                }
                | WatchEvent::DirectoryClosed {
                    path: closed,
                    reason,
                    ..
                } if closed == path => Some(*reason),
                _ => None,
            })
    }
}

impl ProjectHost for RecordingProjectHost {
    fn add_file_watcher(
        &self,
        watch_type: WatchType,
        _project: &str,
        path: &NormalizedPath,
    ) -> WatcherHandle {
        let handle = self.next();
        self.events.borrow_mut().push(WatchEvent::FileAdded {
            watch_type,
            path: path.clone(),
            handle,
        });
        handle
    }

    fn close_file_watcher(
        &self,
        watch_type: WatchType,
        _project: &str,
        path: &NormalizedPath,
        handle: WatcherHandle,
        reason: WatcherCloseReason,
    ) {
        self.events.borrow_mut().push(WatchEvent::FileClosed {
            watch_type,
            path: path.clone(),
            handle,
            reason,
        });
    }

    fn add_directory_watcher(
        &self,
        watch_type: WatchType,
        _project: &str,
        path: &NormalizedPath,
        recursive: bool,
    ) -> WatcherHandle {
        let handle = self.next();
        self.events.borrow_mut().push(WatchEvent::DirectoryAdded {
            watch_type,
            path: path.clone(),
            recursive,
            handle,
        });
        handle
    }

    fn close_directory_watcher(
        &self,
        watch_type: WatchType,
        _project: &str,
        path: &NormalizedPath,
        handle: WatcherHandle,
        reason: WatcherCloseReason,
    ) {
        self.events.borrow_mut().push(WatchEvent::DirectoryClosed {
            watch_type,
            path: path.clone(),
            handle,
            reason,
        });
    }

    fn schedule_project_update(&self, project: &str) {
        self.scheduled_updates.borrow_mut().push(project.to_string());
    }

    fn reload_configured_project(&self, project: &str) {
        self.reload_requests.borrow_mut().push(project.to_string());
    }

    fn start_watching_config_files_for_inferred_root(&self, root: &NormalizedPath) {
        self.inferred_root_watches
            .borrow_mut()
            .push((root.clone(), true));
    }

    fn stop_watching_config_files_for_inferred_root(&self, root: &NormalizedPath) {
        self.inferred_root_watches
            .borrow_mut()
            .push((root.clone(), false));
    }

    fn typings_cache(&self) -> &dyn TypingsCache {
        &self.typings
    }

    fn use_single_inferred_project(&self) -> bool {
        self.single_inferred.get()
    }

    fn allow_local_plugin_loads(&self) -> bool {
        self.local_plugin_loads.get()
    }

    fn global_plugins(&self) -> Vec<String> {
        self.globals.borrow().clone()
    }

    fn plugin_probe_locations(&self) -> Vec<String> {
        self.probe_locations.borrow().clone()
    }

    fn default_library_file_name(&self) -> Option<String> {
        self.default_library.borrow().clone()
    }

    fn global_typings_cache_location(&self) -> Option<String> {
        Some("/typings-cache".to_string())
    }
}

// ---------------------------------------------------------------------------
// Resolver

/// Table-driven resolver: (containing file name, specifier) → target file
/// name, with optional failed lookup locations for misses.
#[derive(Default)]
pub struct TableResolver {
    pub resolutions: Rc<RefCell<FxHashMap<(String, String), String>>>,
    pub failed_lookups: Rc<RefCell<FxHashMap<(String, String), Vec<String>>>>,
}

impl ModuleResolver for TableResolver {
    fn resolve(
        &mut self,
        containing_file: &str,
        specifier: &str,
        _options: &CompilerOptions,
    ) -> ResolutionResult {
        let key = (containing_file.to_string(), specifier.to_string());
        let resolved = self.resolutions.borrow().get(&key).map(|target| {
            ResolvedModule {
                resolved_file_name: target.clone(),
                path: path_of(target),
                is_external_library_import: target.contains("/node_modules/"),
            }
        });
        let failed_lookup_locations = if resolved.is_none() {
            self.failed_lookups.borrow().get(&key).cloned().unwrap_or_default()
        } else {
            Vec::new()
        };
        ResolutionResult {
            resolved,
            failed_lookup_locations,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine

#[derive(Default)]
pub struct FakeEngineState {
    /// file name → specifiers it imports.
    pub imports: FxHashMap<String, Vec<String>>,
    pub structural_recomputes: u32,
    pub update_calls: u32,
    pub semantic_cache_clears: u32,
    /// Delegation order through plugin wrappers down to the engine.
    pub wrapper_log: Vec<String>,
    last_program: Option<Arc<Program>>,
    last_inputs: Vec<String>,
    last_versions: FxHashMap<NormalizedPath, u64>,
    last_missing: Vec<(NormalizedPath, String)>,
    last_failed_lookups: Vec<(NormalizedPath, String)>,
}

pub struct FakeLanguageService {
    pub state: Rc<RefCell<FakeEngineState>>,
}

impl FakeLanguageService {
    pub fn new(state: Rc<RefCell<FakeEngineState>>) -> FakeLanguageService {
        FakeLanguageService { state }
    }
}

impl LanguageService for FakeLanguageService {
    fn update_program(&mut self, host: &mut ProgramHost<'_>) -> ProgramUpdate {
        let mut state = self.state.borrow_mut();
        state.update_calls += 1;
        state.wrapper_log.push("engine".to_string());

        let quiescent = state.last_program.is_some()
            && state.last_inputs.as_slice() == host.file_names
            && state
                .last_versions
                .iter()
                .all(|(path, version)| {
                    host.scripts.get(path).map(|info| info.version()) == Some(*version)
                })
            && state
                .last_missing
                .iter()
                .all(|(_, name)| !host.server.file_exists(name))
            && !state
                .last_versions
                .keys()
                .any(|path| host.resolution.has_invalidated_resolution(path));
        if quiescent {
            // Re-advertise the failed lookups so watcher reconciliation
            // sees the full set for this pass too.
            for (path, location) in &state.last_failed_lookups {
                host.resolution.note_failed_lookup(path, location);
            }
            return ProgramUpdate {
                program: state.last_program.clone().unwrap(),
                structure_reuse: StructureReuse::Completely,
            };
        }

        state.structural_recomputes += 1;
        let mut files = Vec::new();
        let mut missing: Vec<(NormalizedPath, String)> = Vec::new();
        let mut versions = FxHashMap::default();
        let mut failed = Vec::new();
        let mut seen = FxHashSet::default();
        let mut queue: VecDeque<String> = host.file_names.iter().cloned().collect();

        while let Some(file_name) = queue.pop_front() {
            let path = host.scripts.to_path(&file_name);
            if !seen.insert(path.clone()) {
                continue;
            }

            let text = match host.scripts.get(&path).and_then(|info| info.text().cloned()) {
                Some(text) => Some(text.to_string()),
                None => host.server.read_file(&file_name),
            };
            let Some(text) = text else {
                missing.push((path, file_name));
                continue;
            };
            if !host.scripts.contains(&path) {
                host.scripts
                    .get_or_create(&file_name, false, Some(text.clone()), None);
            }
            versions.insert(
                path.clone(),
                host.scripts.get(&path).map(|info| info.version()).unwrap_or(0),
            );

            let specifiers = state.imports.get(&file_name).cloned().unwrap_or_default();
            let mut resolved_modules = FxHashMap::default();
            for specifier in specifiers {
                let result = host.resolver.resolve(&file_name, &specifier, host.options);
                for location in &result.failed_lookup_locations {
                    host.resolution.note_failed_lookup(&path, location);
                    failed.push((path.clone(), location.clone()));
                }
                if let Some(resolved) = &result.resolved {
                    queue.push_back(resolved.resolved_file_name.clone());
                }
                resolved_modules.insert(specifier, result.resolved);
            }

            files.push(SourceFileSnapshot {
                path: path.clone(),
                file_name: file_name.clone(),
                version: host.server.create_hash(&text),
                resolved_modules,
                is_external_library: file_name.contains("/node_modules/"),
            });
        }

        let program = Arc::new(Program::new(
            files,
            missing.iter().map(|(path, _)| path.clone()).collect(),
        ));
        state.last_program = Some(program.clone());
        state.last_inputs = host.file_names.to_vec();
        state.last_versions = versions;
        state.last_missing = missing;
        state.last_failed_lookups = failed;
        ProgramUpdate {
            program,
            structure_reuse: StructureReuse::Not,
        }
    }

    fn clear_semantic_cache(&mut self) {
        self.state.borrow_mut().semantic_cache_clears += 1;
    }

    fn emit_file(&mut self, path: &NormalizedPath) -> EmitOutput {
        let state = self.state.borrow();
        let Some(file) = state
            .last_program
            .as_ref()
            .and_then(|program| program.get(path))
        else {
            return EmitOutput {
                output_files: Vec::new(),
                emit_skipped: true,
            };
        };
        let name = file.file_name.replace(".ts", ".js");
        EmitOutput {
            output_files: vec![OutputFile {
                name,
                text: format!("// emitted from {}\n", file.file_name),
            }],
            emit_skipped: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Plugins

/// Wrapper service installed by [`TestPlugin`]; records delegation order.
pub struct WrappingService {
    name: String,
    inner: Box<dyn LanguageService>,
    state: Rc<RefCell<FakeEngineState>>,
}

impl LanguageService for WrappingService {
    fn update_program(&mut self, host: &mut ProgramHost<'_>) -> ProgramUpdate {
        self.state.borrow_mut().wrapper_log.push(self.name.clone());
        self.inner.update_program(host)
    }

    fn clear_semantic_cache(&mut self) {
        self.inner.clear_semantic_cache();
    }

    fn emit_file(&mut self, path: &NormalizedPath) -> EmitOutput {
        self.inner.emit_file(path)
    }
}

pub struct TestPlugin {
    pub name: String,
    pub state: Rc<RefCell<FakeEngineState>>,
    pub fail_create: bool,
    pub external: Rc<RefCell<Vec<String>>>,
}

impl PluginModule for TestPlugin {
    fn create(
        &self,
        _info: &PluginCreateInfo,
        language_service: Box<dyn LanguageService>,
    ) -> Result<Box<dyn LanguageService>, PluginActivationError> {
        if self.fail_create {
            return Err(PluginActivationError {
                language_service,
                error: anyhow!("plugin '{}' refused to activate", self.name),
            });
        }
        Ok(Box::new(WrappingService {
            name: self.name.clone(),
            inner: language_service,
            state: self.state.clone(),
        }))
    }

    fn external_files(&self, _project: &ProjectView<'_>) -> Vec<String> {
        self.external.borrow().clone()
    }
}

// ---------------------------------------------------------------------------
// Fixture

/// Everything a project test needs, wired together.
pub struct ProjectFixture {
    pub host: Rc<RecordingProjectHost>,
    pub server: Rc<TestServerHost>,
    pub scripts: Rc<RefCell<ScriptStore>>,
    pub engine: Rc<RefCell<FakeEngineState>>,
    pub resolutions: Rc<RefCell<FxHashMap<(String, String), String>>>,
    pub failed_lookups: Rc<RefCell<FxHashMap<(String, String), Vec<String>>>>,
}

impl ProjectFixture {
    pub fn new() -> ProjectFixture {
        ProjectFixture {
            host: Rc::new(RecordingProjectHost::new()),
            server: Rc::new(TestServerHost::new()),
            scripts: Rc::new(RefCell::new(ScriptStore::new(CASE_SENSITIVE))),
            engine: Rc::new(RefCell::new(FakeEngineState::default())),
            resolutions: Rc::new(RefCell::new(FxHashMap::default())),
            failed_lookups: Rc::new(RefCell::new(FxHashMap::default())),
        }
    }

    pub fn language_service(&self) -> Box<dyn LanguageService> {
        Box::new(FakeLanguageService::new(self.engine.clone()))
    }

    pub fn resolver(&self) -> Box<TableResolver> {
        Box::new(TableResolver {
            resolutions: self.resolutions.clone(),
            failed_lookups: self.failed_lookups.clone(),
        })
    }

    pub fn inferred_project(&self, id: u32) -> Project {
        Project::new_inferred(
            ProjectId(id),
            self.host.clone(),
            self.server.clone(),
            self.scripts.clone(),
            self.language_service(),
            self.resolver(),
            None,
            None,
        )
    }

    pub fn configured_project(&self, id: u32, config_file_name: &str) -> anyhow::Result<Project> {
        Project::new_configured(
            ProjectId(id),
            config_file_name,
            self.host.clone(),
            self.server.clone(),
            self.scripts.clone(),
            self.language_service(),
            self.resolver(),
        )
    }

    /// Write a file, register it in the store, and add it as a root.
    pub fn add_root_script(
        &self,
        project: &mut Project,
        file_name: &str,
        text: &str,
    ) -> NormalizedPath {
        self.server.write_file(file_name, text);
        let path = self
            .scripts
            .borrow_mut()
            .get_or_create(file_name, true, Some(text.to_string()), None);
        project.add_root(&path);
        path
    }

    pub fn set_imports(&self, file_name: &str, specifiers: &[&str]) {
        self.engine.borrow_mut().imports.insert(
            file_name.to_string(),
            specifiers.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn add_resolution(&self, containing: &str, specifier: &str, target: &str) {
        self.resolutions.borrow_mut().insert(
            (containing.to_string(), specifier.to_string()),
            target.to_string(),
        );
    }

    pub fn edit_script(&self, project: &mut Project, file_name: &str, text: &str) {
        self.server.write_file(file_name, text);
        let path = path_of(file_name);
        self.scripts.borrow_mut().edit(&path, text.to_string());
        project.register_file_update(file_name);
        project.mark_as_dirty();
    }
}
