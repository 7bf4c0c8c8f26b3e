//! The per-project state machine.
//!
//! A project ties together root files, compiler options, the resolution
//! cache, the unresolved-imports index, the incremental builder, and the
//! watcher set, and keeps three independently versioned notions of state:
//!
//! - `project_state_version` bumps on every mutation that could invalidate
//!   the graph (dirty tracking);
//! - `project_structure_version` bumps when a graph update observed a
//!   program whose structure could not be completely reused;
//! - script-info content versions live in the script store.
//!
//! The three flavors (inferred, configured, external) share this machinery
//! and diverge only in policy, dispatched on the flavor tag.

use crate::builder::BuilderState;
use crate::engine::LanguageService;
use crate::errors::{NO_INPUT_FILES, ProjectDiagnostic, ProjectError};
use crate::options::{CompilerOptions, TypeAcquisition, changes_affect_module_resolution};
use crate::paths::{NormalizedPath, normalize_slashes};
use crate::program::{Program, StructureReuse};
use crate::resolution::{ModuleResolver, ResolutionCache};
use crate::script::{ProjectId, ScriptStore, is_declaration_file_name, is_js_or_dts_file_name};
use crate::service::{ProjectHost, ServerHost};
use crate::unresolved::{UnresolvedImportsIndex, extract_unresolved_imports};
use crate::watch::{FileWatchEventKind, MissingFilesMap, WatchType, WatcherCloseReason};

use crate::configured::ConfiguredState;
use crate::external::ExternalState;
use crate::inferred::InferredState;

use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info_span};

/// Project flavor tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Inferred,
    Configured,
    External,
}

/// Flavor-specific state payload.
pub(crate) enum Flavor {
    Inferred(InferredState),
    Configured(ConfiguredState),
    External(ExternalState),
}

/// A root-table entry: an attached script info, or a placeholder for a
/// configured file that does not exist on disk yet.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RootEntry {
    Attached(NormalizedPath),
    Missing(String),
}

/// Header of every delta-protocol response.
#[derive(Debug, Clone)]
pub struct ProjectInfo {
    pub project_name: String,
    /// Structure version at the time of the response.
    pub version: u64,
    pub is_inferred: bool,
    pub options: CompilerOptions,
    pub language_service_disabled: bool,
}

/// Added/removed/updated file names relative to the previous report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub updated: Vec<String>,
}

/// Body of a delta-protocol response.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectFiles {
    /// Baseline: the complete current file list.
    Full(Vec<String>),
    /// Diff against the previously reported snapshot.
    Changes(FileDiff),
    /// Nothing changed since the known version.
    Unchanged,
}

/// Result of [`Project::get_changes_since_version`].
#[derive(Debug, Clone)]
pub struct ProjectChanges {
    pub info: ProjectInfo,
    pub files: ProjectFiles,
    pub project_errors: Vec<ProjectDiagnostic>,
}

pub struct Project {
    pub(crate) project_name: String,
    pub(crate) id: ProjectId,
    pub(crate) flavor: Flavor,

    pub(crate) host: Rc<dyn ProjectHost>,
    pub(crate) server: Rc<dyn ServerHost>,
    pub(crate) scripts: Rc<RefCell<ScriptStore>>,
    pub(crate) language_service: Box<dyn LanguageService>,
    pub(crate) resolver: Box<dyn ModuleResolver>,
    pub(crate) resolution: ResolutionCache,
    pub(crate) builder: BuilderState,

    pub(crate) compiler_options: CompilerOptions,
    pub(crate) type_acquisition: TypeAcquisition,
    pub(crate) compile_on_save_enabled: bool,
    pub(crate) language_service_enabled: bool,

    pub(crate) root_files: Vec<NormalizedPath>,
    pub(crate) root_files_map: FxHashMap<NormalizedPath, RootEntry>,

    pub(crate) program: Option<Arc<Program>>,
    pub(crate) missing_files: MissingFilesMap,
    pub(crate) external_files: Vec<NormalizedPath>,
    pub(crate) typing_files: Vec<String>,
    pub(crate) last_cached_unresolved_imports: Option<Arc<[String]>>,
    pub(crate) unresolved_imports: UnresolvedImportsIndex,

    pub(crate) project_state_version: u64,
    pub(crate) project_structure_version: u64,
    pub(crate) dirty: bool,

    pub(crate) last_reported_files: Option<FxHashMap<NormalizedPath, String>>,
    pub(crate) last_reported_version: Option<u64>,
    pub(crate) updated_file_names: FxHashSet<String>,

    pub(crate) project_errors: Vec<ProjectDiagnostic>,
    pub(crate) closed: bool,
}

impl Project {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_common(
        project_name: String,
        id: ProjectId,
        flavor: Flavor,
        host: Rc<dyn ProjectHost>,
        server: Rc<dyn ServerHost>,
        scripts: Rc<RefCell<ScriptStore>>,
        language_service: Box<dyn LanguageService>,
        resolver: Box<dyn ModuleResolver>,
        compile_on_save_enabled: bool,
    ) -> Project {
        let case_sensitive = scripts.borrow().use_case_sensitive_file_names();
        Project {
            project_name,
            id,
            flavor,
            host,
            server,
            scripts,
            language_service,
            resolver,
            resolution: ResolutionCache::new(case_sensitive),
            builder: BuilderState::new(),
            compiler_options: CompilerOptions::default(),
            type_acquisition: TypeAcquisition::default(),
            compile_on_save_enabled,
            language_service_enabled: true,
            root_files: Vec::new(),
            root_files_map: FxHashMap::default(),
            program: None,
            missing_files: MissingFilesMap::default(),
            external_files: Vec::new(),
            typing_files: Vec::new(),
            last_cached_unresolved_imports: None,
            unresolved_imports: UnresolvedImportsIndex::default(),
            project_state_version: 0,
            project_structure_version: 0,
            dirty: true,
            last_reported_files: None,
            last_reported_version: None,
            updated_file_names: FxHashSet::default(),
            project_errors: Vec::new(),
            closed: false,
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn id(&self) -> ProjectId {
        self.id
    }

    pub fn kind(&self) -> ProjectKind {
        match self.flavor {
            Flavor::Inferred(_) => ProjectKind::Inferred,
            Flavor::Configured(_) => ProjectKind::Configured,
            Flavor::External(_) => ProjectKind::External,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn compiler_options(&self) -> &CompilerOptions {
        &self.compiler_options
    }

    pub fn language_service_enabled(&self) -> bool {
        self.language_service_enabled
    }

    pub fn compile_on_save_enabled(&self) -> bool {
        self.compile_on_save_enabled
    }

    pub fn project_state_version(&self) -> u64 {
        self.project_state_version
    }

    pub fn project_structure_version(&self) -> u64 {
        self.project_structure_version
    }

    /// Version token echoed by the session layer to detect staleness.
    pub fn get_project_version(&self) -> String {
        self.project_state_version.to_string()
    }

    pub fn typing_files(&self) -> &[String] {
        &self.typing_files
    }

    pub fn external_file_paths(&self) -> &[NormalizedPath] {
        &self.external_files
    }

    pub fn cached_unresolved_imports(&self) -> Option<&Arc<[String]>> {
        self.last_cached_unresolved_imports.as_ref()
    }

    pub fn unresolved_imports_for(&self, path: &NormalizedPath) -> Option<&Arc<[String]>> {
        self.unresolved_imports.get(path)
    }

    pub fn has_missing_file(&self, path: &NormalizedPath) -> bool {
        self.missing_files.contains(path)
    }

    pub fn missing_file_count(&self) -> usize {
        self.missing_files.len()
    }

    pub fn current_program(&self) -> Option<&Arc<Program>> {
        self.program.as_ref()
    }

    pub fn project_errors(&self) -> &[ProjectDiagnostic] {
        &self.project_errors
    }

    /// Project-wide diagnostics: only entries without a file attribution.
    pub fn get_global_project_errors(&self) -> Vec<ProjectDiagnostic> {
        self.project_errors
            .iter()
            .filter(|diag| diag.file.is_none())
            .cloned()
            .collect()
    }

    pub(crate) fn to_path(&self, file_name: &str) -> NormalizedPath {
        self.scripts.borrow().to_path(file_name)
    }

    pub fn has_roots(&self) -> bool {
        !self.root_files_map.is_empty()
    }

    pub fn is_root(&self, path: &NormalizedPath) -> bool {
        self.root_files_map.contains_key(path)
    }

    /// Root file names: attached roots in insertion order, then missing
    /// placeholders in sorted order.
    pub fn root_file_names(&self) -> Vec<String> {
        let scripts = self.scripts.borrow();
        let mut names: Vec<String> = self
            .root_files
            .iter()
            .filter_map(|path| scripts.get(path).map(|info| info.file_name().to_string()))
            .collect();
        let mut missing: Vec<String> = self
            .root_files_map
            .values()
            .filter_map(|entry| match entry {
                RootEntry::Missing(name) => Some(name.clone()),
                RootEntry::Attached(_) => None,
            })
            .collect();
        missing.sort();
        names.extend(missing);
        names
    }

    /// The engine's input set: roots plus acquired typing files.
    pub(crate) fn script_file_names(&self) -> Vec<String> {
        let mut names = self.root_file_names();
        names.extend(self.typing_files.iter().cloned());
        names
    }

    /// Add an existing script info as a root.
    pub fn add_root(&mut self, path: &NormalizedPath) {
        debug_assert!(!self.closed, "operation on closed project");
        debug_assert!(
            !self.root_files_map.contains_key(path),
            "file is already a root of this project"
        );
        let file_name = {
            let scripts = self.scripts.borrow();
            match scripts.get(path) {
                Some(info) => info.file_name().to_string(),
                None => return,
            }
        };
        self.root_files.push(path.clone());
        self.root_files_map
            .insert(path.clone(), RootEntry::Attached(path.clone()));
        self.scripts.borrow_mut().attach(path, self.id);
        self.on_root_added(path, &file_name);
        self.mark_as_dirty();
    }

    /// Record a configured root that does not exist on disk yet.
    pub fn add_missing_file_root(&mut self, file_name: &str) {
        debug_assert!(!self.closed, "operation on closed project");
        let normalized = normalize_slashes(file_name);
        let path = self.to_path(&normalized);
        if !self.root_files_map.contains_key(&path) {
            self.root_files_map.insert(path, RootEntry::Missing(normalized));
            self.mark_as_dirty();
        }
    }

    /// Remove a file from the project: drop its root entry if present,
    /// invalidate its resolutions, forget its unresolved imports, and
    /// optionally detach it from the script store.
    pub fn remove_file(&mut self, path: &NormalizedPath, detach: bool) {
        debug_assert!(!self.closed, "operation on closed project");
        let was_root = self.root_files_map.remove(path).is_some();
        if was_root {
            self.root_files.retain(|root| root != path);
        }
        self.resolution.invalidate(path);
        self.unresolved_imports.remove(path);
        if detach {
            self.scripts.borrow_mut().detach(path, self.id);
        }
        if was_root {
            self.on_root_removed(path);
        }
        self.mark_as_dirty();
    }

    /// Replace the compiler options. No-op when the effective options are
    /// structurally unchanged; otherwise resolution-affecting differences
    /// clear the resolver state and the unresolved-imports index.
    pub fn set_compiler_options(&mut self, options: &CompilerOptions) {
        debug_assert!(!self.closed, "operation on closed project");
        let mut new_options = options.clone();
        match &self.flavor {
            Flavor::Inferred(state) => {
                new_options.allow_js = Some(true);
                new_options.max_node_module_js_depth = if state.is_js_inferred_project {
                    Some(2)
                } else {
                    None
                };
                new_options.no_emit_for_js_files = Some(true);
            }
            Flavor::External(_) => {
                new_options.no_emit_for_js_files = Some(true);
            }
            Flavor::Configured(_) => {}
        }
        new_options.allow_non_ts_extensions = Some(true);

        if new_options == self.compiler_options {
            return;
        }
        if changes_affect_module_resolution(&self.compiler_options, &new_options) {
            self.unresolved_imports.clear();
            self.last_cached_unresolved_imports = None;
            self.resolution.clear();
        }
        self.compiler_options = new_options;
        self.mark_as_dirty();
    }

    /// Effective type-acquisition settings for the typings helper.
    pub fn get_type_acquisition(&self) -> TypeAcquisition {
        match &self.flavor {
            Flavor::Inferred(_) => TypeAcquisition {
                enable: Some(self.all_root_files_are_js_or_dts()),
                include: Vec::new(),
                exclude: Vec::new(),
            },
            Flavor::Configured(_) | Flavor::External(_) => self.type_acquisition.clone(),
        }
    }

    /// The directory the project is anchored in, when one can be derived.
    pub fn get_project_root_path(&self) -> Option<NormalizedPath> {
        match &self.flavor {
            Flavor::Inferred(state) => {
                if let Some(root) = &state.project_root_path {
                    return Some(root.clone());
                }
                if !self.host.use_single_inferred_project() {
                    return self.root_files.first().and_then(|path| path.parent());
                }
                None
            }
            Flavor::Configured(state) => state.config_file_path.parent(),
            Flavor::External(state) => match &state.project_file_path {
                Some(project_file_path) => self.to_path(project_file_path).parent(),
                None => self.to_path(&self.project_name).parent(),
            },
        }
    }

    pub fn mark_as_dirty(&mut self) {
        self.dirty = true;
        self.project_state_version += 1;
    }

    /// Hook called by the script store owner when a file's content changed.
    /// Accumulates the `updated` list between delta reports and discards
    /// the file's cached resolution state, since an edit can change its
    /// import set.
    pub fn register_file_update(&mut self, file_name: &str) {
        let normalized = normalize_slashes(file_name);
        let path = self.to_path(&normalized);
        self.resolution.invalidate(&path);
        self.unresolved_imports.remove(&path);
        self.updated_file_names.insert(normalized);
    }

    pub fn all_root_files_are_js_or_dts(&self) -> bool {
        self.root_file_names()
            .iter()
            .all(|name| is_js_or_dts_file_name(name))
    }

    pub fn all_files_are_js_or_dts(&self) -> bool {
        match &self.program {
            Some(program) => program
                .files()
                .iter()
                .all(|file| is_js_or_dts_file_name(&file.file_name)),
            None => true,
        }
    }

    pub fn has_one_or_more_js_and_no_ts_files(&self) -> bool {
        let Some(program) = &self.program else {
            return false;
        };
        let mut has_js = false;
        for file in program.files() {
            let name = &file.file_name;
            if is_declaration_file_name(name) {
                continue;
            }
            match crate::script::has_js_like_extension(name) {
                true => has_js = true,
                false => return false,
            }
        }
        has_js
    }

    pub fn is_non_ts_project(&self) -> bool {
        self.program
            .as_ref()
            .is_some_and(|program| !program.files().is_empty())
            && self.all_files_are_js_or_dts()
    }

    pub fn is_js_only_project(&self) -> bool {
        self.has_one_or_more_js_and_no_ts_files()
    }

    /// Look up the script info for `file_name` within this project.
    /// `Ok(None)` when the store does not know the file; an error when the
    /// file exists but is not attached to this project.
    pub fn script_info_for_file_name(
        &self,
        file_name: &str,
    ) -> Result<Option<NormalizedPath>, ProjectError> {
        let path = self.to_path(file_name);
        let scripts = self.scripts.borrow();
        match scripts.get(&path) {
            None => Ok(None),
            Some(info) if info.is_attached_to(self.id) => Ok(Some(path.clone())),
            Some(info) => Err(ProjectError::DocumentDoesNotBelongToProject {
                file_name: info.file_name().to_string(),
                project: self.project_name.clone(),
            }),
        }
    }

    /// Synchronize the graph and hand out the language service.
    pub fn language_service(&mut self, ensure_synchronized: bool) -> &dyn LanguageService {
        if ensure_synchronized && self.dirty && !self.closed {
            self.update_graph();
        }
        self.language_service.as_ref()
    }

    pub fn enable_language_service(&mut self) {
        if self.closed || self.language_service_enabled {
            return;
        }
        self.language_service_enabled = true;
        self.mark_as_dirty();
    }

    pub fn disable_language_service(&mut self) {
        if !self.language_service_enabled {
            return;
        }
        self.language_service_enabled = false;
        self.builder.clear();
        self.language_service.clear_semantic_cache();
        self.mark_as_dirty();
    }

    /// Files to recompile when `file` is saved. Empty while the language
    /// service is disabled.
    pub fn get_compile_on_save_affected_file_list(&mut self, path: &NormalizedPath) -> Vec<String> {
        if !self.language_service_enabled || self.closed {
            return Vec::new();
        }
        if self.dirty {
            self.update_graph();
        }
        self.builder.affected_files(path)
    }

    /// Emit one file through the builder. Returns `false` when emit was
    /// skipped (language service disabled, file unknown, or engine skip).
    pub fn emit_file(
        &mut self,
        path: &NormalizedPath,
        write: &mut dyn FnMut(&str, &str),
    ) -> bool {
        if !self.language_service_enabled || self.closed {
            return false;
        }
        if self.dirty {
            self.update_graph();
        }
        if !self.builder.contains(path) {
            return false;
        }
        let output = self.language_service.emit_file(path);
        if output.emit_skipped {
            return false;
        }
        for file in &output.output_files {
            write(&file.name, &file.text);
        }
        self.builder.mark_emitted(path);
        true
    }

    /// The central protocol: recompute the program, retach script infos,
    /// refresh unresolved imports and typing files, and feed the builder.
    /// Returns `true` iff the file set is unchanged.
    pub fn update_graph(&mut self) -> bool {
        debug_assert!(!self.closed, "operation on closed project");
        let _span = info_span!("update_graph", project = %self.project_name).entered();

        if self.take_pending_reload() {
            // The reload path publishes its own updates.
            self.host.reload_configured_project(&self.project_name);
            return true;
        }

        self.resolution.start_recording();
        let mut has_changes = self.update_graph_worker();
        let changed_resolutions = self.resolution.finish_recording();
        for path in &changed_resolutions {
            self.unresolved_imports.remove(path);
        }
        let mut all_changed_resolutions: FxHashSet<NormalizedPath> =
            changed_resolutions.iter().cloned().collect();

        if has_changes || !changed_resolutions.is_empty() {
            let mut sink = Vec::new();
            if let Some(program) = self.program.clone() {
                for file in program.files() {
                    extract_unresolved_imports(&mut self.unresolved_imports, file, &mut sink);
                }
            }
            sink.sort();
            sink.dedup();
            self.last_cached_unresolved_imports = Some(Arc::from(sink));
        }
        let unresolved_imports = self
            .last_cached_unresolved_imports
            .clone()
            .unwrap_or_else(|| Arc::from(Vec::new()));

        let mut typing_files = self.host.typings_cache().typings_for_project(
            &self.project_name,
            &self.get_type_acquisition(),
            &unresolved_imports,
            has_changes,
        );
        typing_files.sort();
        typing_files.dedup();
        if typing_files != self.typing_files {
            // The typing list only grows the input set, so a single re-run
            // converges; the helper is not consulted again this call.
            self.typing_files = typing_files;
            self.mark_as_dirty();
            self.resolution.start_recording();
            let second_pass_changes = self.update_graph_worker();
            for path in self.resolution.finish_recording() {
                self.unresolved_imports.remove(&path);
                all_changed_resolutions.insert(path);
            }
            has_changes = has_changes || second_pass_changes;
        }

        if self.language_service_enabled {
            if let Some(program) = self.program.clone() {
                let changed = &all_changed_resolutions;
                self.builder
                    .on_program_update(&program, &|path| changed.contains(path));
            }
        } else {
            self.builder.clear();
        }

        if has_changes {
            self.project_structure_version += 1;
        }
        !has_changes
    }

    /// One graph worker pass: recompute the program and reconcile script
    /// attachments, missing-file watchers, and plugin-contributed external
    /// files against it.
    fn update_graph_worker(&mut self) -> bool {
        self.dirty = false;

        let file_names = self.script_file_names();
        let old_program = self.program.clone();

        let update = {
            let mut scripts = self.scripts.borrow_mut();
            let mut host = crate::engine::ProgramHost {
                file_names: &file_names,
                options: &self.compiler_options,
                scripts: &mut *scripts,
                server: &*self.server,
                resolution: &mut self.resolution,
                resolver: &mut *self.resolver,
                old_program: old_program.as_ref(),
            };
            self.language_service.update_program(&mut host)
        };
        let new_program = update.program;
        self.program = Some(new_program.clone());

        let has_changes = match &old_program {
            None => true,
            Some(old) => {
                !Arc::ptr_eq(old, &new_program)
                    && update.structure_reuse != StructureReuse::Completely
            }
        };

        if has_changes {
            {
                let mut scripts = self.scripts.borrow_mut();
                if let Some(old) = &old_program {
                    for file in old.files() {
                        if !new_program.contains(&file.path) {
                            scripts.detach(&file.path, self.id);
                        }
                    }
                }
                for file in new_program.files() {
                    scripts.attach(&file.path, self.id);
                }
            }

            let current_missing: FxHashSet<NormalizedPath> =
                new_program.missing_file_paths().iter().cloned().collect();
            let stale: Vec<NormalizedPath> = self
                .missing_files
                .paths()
                .filter(|path| !current_missing.contains(*path))
                .cloned()
                .collect();
            for path in stale {
                if let Some(handle) = self.missing_files.remove(&path) {
                    self.host.close_file_watcher(
                        WatchType::MissingFilePath,
                        &self.project_name,
                        &path,
                        handle,
                        WatcherCloseReason::NotNeeded,
                    );
                }
            }
            for path in &current_missing {
                if !self.missing_files.contains(path) {
                    let handle = self.host.add_file_watcher(
                        WatchType::MissingFilePath,
                        &self.project_name,
                        path,
                    );
                    self.missing_files.insert(path.clone(), handle);
                }
            }
        }

        self.resolution
            .commit_failed_lookups(&*self.host, &self.project_name);

        self.reconcile_external_files();

        debug!(
            project = %self.project_name,
            files = self.program.as_ref().map_or(0, |p| p.files().len()),
            has_changes,
            "graph worker pass finished"
        );
        has_changes
    }

    /// Diff the plugin-contributed external file set (sorted merge-diff)
    /// and retach script infos accordingly. Detachment of program leavers
    /// has already happened, so a file that re-enters through this set is
    /// attached afresh.
    fn reconcile_external_files(&mut self) {
        let mut new_files: Vec<(NormalizedPath, String)> = {
            let scripts = self.scripts.borrow();
            self.flavor_external_files()
                .into_iter()
                .map(|name| {
                    let name = normalize_slashes(&name);
                    (scripts.to_path(&name), name)
                })
                .collect()
        };
        new_files.sort_by(|a, b| a.0.cmp(&b.0));
        new_files.dedup_by(|a, b| a.0 == b.0);

        let old = std::mem::take(&mut self.external_files);
        let mut scripts = self.scripts.borrow_mut();
        let mut old_iter = old.iter().peekable();
        let mut new_iter = new_files.iter().peekable();
        loop {
            match (old_iter.peek(), new_iter.peek()) {
                (Some(old_path), Some((new_path, new_name))) => {
                    if *old_path < new_path {
                        scripts.detach(old_path, self.id);
                        old_iter.next();
                    } else if new_path < *old_path {
                        let path = scripts.get_or_create(new_name, false, None, None);
                        scripts.attach(&path, self.id);
                        new_iter.next();
                    } else {
                        old_iter.next();
                        new_iter.next();
                    }
                }
                (Some(old_path), None) => {
                    scripts.detach(old_path, self.id);
                    old_iter.next();
                }
                (None, Some((_, new_name))) => {
                    let path = scripts.get_or_create(new_name, false, None, None);
                    scripts.attach(&path, self.id);
                    new_iter.next();
                }
                (None, None) => break,
            }
        }
        drop(scripts);
        self.external_files = new_files.into_iter().map(|(path, _)| path).collect();
    }

    /// Compose the reported file list. External-library files drop out when
    /// `exclude_files_from_external_libraries`; the config file and its
    /// extended sources are appended for configured projects unless
    /// `exclude_config_files`.
    pub fn get_file_names(
        &self,
        exclude_files_from_external_libraries: bool,
        exclude_config_files: bool,
    ) -> Vec<String> {
        let mut names = if !self.language_service_enabled || self.program.is_none() {
            self.root_file_names()
        } else {
            let program = self.program.as_ref().unwrap();
            let mut names = Vec::new();
            if self.compiler_options.no_lib != Some(true)
                && let Some(lib) = self.host.default_library_file_name()
            {
                names.push(lib);
            }
            for file in program.files() {
                if exclude_files_from_external_libraries && file.is_external_library {
                    continue;
                }
                names.push(file.file_name.clone());
            }
            names
        };
        if !exclude_config_files && let Flavor::Configured(state) = &self.flavor {
            names.push(state.config_file_name.clone());
            names.extend(state.extended_config_files.iter().cloned());
        }
        names
    }

    fn current_file_snapshot(&self) -> FxHashMap<NormalizedPath, String> {
        let scripts = self.scripts.borrow();
        self.get_file_names(false, false)
            .into_iter()
            .map(|name| (scripts.to_path(&name), name))
            .collect()
    }

    /// Versioned delta reporting. Returns the full list on the first call
    /// or a version mismatch, a diff against the previous report otherwise,
    /// and an info-only response when nothing changed.
    pub fn get_changes_since_version(&mut self, last_known_version: Option<u64>) -> ProjectChanges {
        let info = ProjectInfo {
            project_name: self.project_name.clone(),
            version: self.project_structure_version,
            is_inferred: matches!(self.flavor, Flavor::Inferred(_)),
            options: self.compiler_options.clone(),
            language_service_disabled: !self.language_service_enabled,
        };
        let project_errors = self.project_errors.clone();

        if last_known_version.is_some() && last_known_version == self.last_reported_version {
            let known = last_known_version.unwrap();
            if self.project_structure_version == known && self.updated_file_names.is_empty() {
                return ProjectChanges {
                    info,
                    files: ProjectFiles::Unchanged,
                    project_errors,
                };
            }

            let current = self.current_file_snapshot();
            let previous = self.last_reported_files.take().unwrap_or_default();
            let mut added: Vec<String> = current
                .iter()
                .filter(|(path, _)| !previous.contains_key(*path))
                .map(|(_, name)| name.clone())
                .collect();
            let mut removed: Vec<String> = previous
                .iter()
                .filter(|(path, _)| !current.contains_key(*path))
                .map(|(_, name)| name.clone())
                .collect();
            added.sort();
            removed.sort();
            let mut updated: Vec<String> = self.updated_file_names.drain().collect();
            updated.sort();

            self.last_reported_files = Some(current);
            self.last_reported_version = Some(self.project_structure_version);
            return ProjectChanges {
                info,
                files: ProjectFiles::Changes(FileDiff {
                    added,
                    removed,
                    updated,
                }),
                project_errors,
            };
        }

        let current = self.current_file_snapshot();
        let mut files: Vec<String> = current.values().cloned().collect();
        files.sort();
        self.last_reported_files = Some(current);
        self.last_reported_version = Some(self.project_structure_version);
        self.updated_file_names.clear();
        ProjectChanges {
            info,
            files: ProjectFiles::Full(files),
            project_errors,
        }
    }

    /// A watched missing file saw an event. Creation closes the watcher,
    /// dirties the project, and schedules a coalesced refresh.
    pub fn on_missing_file_event(&mut self, path: &NormalizedPath, event: FileWatchEventKind) {
        if self.closed || event != FileWatchEventKind::Created {
            return;
        }
        if let Some(handle) = self.missing_files.remove(path) {
            self.host.close_file_watcher(
                WatchType::MissingFilePath,
                &self.project_name,
                path,
                handle,
                WatcherCloseReason::FileCreated,
            );
            self.mark_as_dirty();
            self.host.schedule_project_update(&self.project_name);
        }
    }

    /// A watched failed-lookup location saw an event: resolution for every
    /// file that probed it is stale.
    pub fn on_failed_lookup_event(&mut self, location: &NormalizedPath, _event: FileWatchEventKind) {
        if self.closed {
            return;
        }
        if self.resolution.invalidate_failed_lookup(location) {
            self.mark_as_dirty();
            self.host.schedule_project_update(&self.project_name);
        }
    }

    /// Release every resource. Safe to call once; later calls are no-ops
    /// and every public read afterwards reports the closed state.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        {
            let mut scripts = self.scripts.borrow_mut();
            if let Some(program) = &self.program {
                for file in program.files() {
                    scripts.detach(&file.path, self.id);
                }
            }
            for path in &self.root_files {
                scripts.detach(path, self.id);
            }
            for path in &self.external_files {
                scripts.detach(path, self.id);
            }
        }

        // Watcher drain order: missing-file, failed-lookup, type-root,
        // wildcard-directory, config-file.
        for (path, handle) in self.missing_files.take_all() {
            self.host.close_file_watcher(
                WatchType::MissingFilePath,
                &self.project_name,
                &path,
                handle,
                WatcherCloseReason::ProjectClose,
            );
        }
        self.resolution
            .close_watchers(&*self.host, &self.project_name, WatcherCloseReason::ProjectClose);
        self.close_flavor_watchers();

        self.program = None;
        self.builder.clear();
        self.unresolved_imports.clear();
        self.last_cached_unresolved_imports = None;
        self.root_files.clear();
        self.root_files_map.clear();
        self.external_files.clear();
        self.typing_files.clear();
        self.closed = true;
    }

    fn on_root_added(&mut self, path: &NormalizedPath, file_name: &str) {
        if matches!(self.flavor, Flavor::Inferred(_)) {
            self.inferred_root_added(path, file_name);
        }
    }

    fn on_root_removed(&mut self, path: &NormalizedPath) {
        if matches!(self.flavor, Flavor::Inferred(_)) {
            self.inferred_root_removed(path);
        }
    }

    fn flavor_external_files(&self) -> Vec<String> {
        match &self.flavor {
            Flavor::Configured(_) => self.configured_external_files(),
            Flavor::Inferred(_) | Flavor::External(_) => Vec::new(),
        }
    }

    fn take_pending_reload(&mut self) -> bool {
        match &mut self.flavor {
            Flavor::Configured(state) if state.pending_reload => {
                state.pending_reload = false;
                true
            }
            _ => false,
        }
    }

    fn close_flavor_watchers(&mut self) {
        if matches!(self.flavor, Flavor::Configured(_)) {
            self.close_configured_watchers(WatcherCloseReason::ProjectClose);
        }
    }
}

pub(crate) fn no_input_files_position(errors: &[ProjectDiagnostic]) -> Option<usize> {
    errors.iter().position(|diag| diag.code == NO_INPUT_FILES)
}
