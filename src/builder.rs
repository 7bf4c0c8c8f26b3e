//! Incremental builder adapter.
//!
//! The builder consumes successive program snapshots and keeps just enough
//! state to answer compile-on-save queries: per-file version strings, a
//! reverse-dependency index derived from each snapshot's resolution tables,
//! and the set of files whose emit is pending. It never parses anything;
//! emit text comes from the engine.

use crate::paths::NormalizedPath;
use crate::program::Program;
use crate::script::is_declaration_file_name;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct BuilderState {
    file_versions: FxHashMap<NormalizedPath, String>,
    file_names: FxHashMap<NormalizedPath, String>,
    /// importee → importers.
    reverse_deps: FxHashMap<NormalizedPath, FxHashSet<NormalizedPath>>,
    pending_emit: FxHashSet<NormalizedPath>,
    program_files: FxHashSet<NormalizedPath>,
}

impl BuilderState {
    pub fn new() -> BuilderState {
        BuilderState::default()
    }

    /// Absorb a new program snapshot: refresh versions, rebuild the
    /// reverse-dependency index, and mark changed or resolution-invalidated
    /// files pending emit.
    pub fn on_program_update(
        &mut self,
        program: &Program,
        has_invalidated_resolution: &dyn Fn(&NormalizedPath) -> bool,
    ) {
        let mut new_versions = FxHashMap::default();
        let mut new_names = FxHashMap::default();
        let mut new_files = FxHashSet::default();
        let mut reverse: FxHashMap<NormalizedPath, FxHashSet<NormalizedPath>> =
            FxHashMap::default();

        for file in program.files() {
            new_files.insert(file.path.clone());
            new_names.insert(file.path.clone(), file.file_name.clone());

            let changed = self.file_versions.get(&file.path) != Some(&file.version);
            if changed || has_invalidated_resolution(&file.path) {
                self.pending_emit.insert(file.path.clone());
            }
            new_versions.insert(file.path.clone(), file.version.clone());

            for resolution in file.resolved_modules.values().flatten() {
                reverse
                    .entry(resolution.path.clone())
                    .or_default()
                    .insert(file.path.clone());
            }
        }

        self.pending_emit.retain(|path| new_files.contains(path));
        self.file_versions = new_versions;
        self.file_names = new_names;
        self.reverse_deps = reverse;
        self.program_files = new_files;
    }

    /// Files to recompile when `path` is saved: the file itself plus its
    /// transitive dependents, restricted to the current program. Declaration
    /// files produce no emit and are filtered out.
    pub fn affected_files(&self, path: &NormalizedPath) -> Vec<String> {
        if !self.program_files.contains(path) {
            return Vec::new();
        }

        let mut seen = FxHashSet::default();
        let mut queue = VecDeque::new();
        seen.insert(path.clone());
        queue.push_back(path.clone());
        while let Some(current) = queue.pop_front() {
            if let Some(dependents) = self.reverse_deps.get(&current) {
                for dependent in dependents {
                    if self.program_files.contains(dependent) && seen.insert(dependent.clone()) {
                        queue.push_back(dependent.clone());
                    }
                }
            }
        }

        let mut names: Vec<String> = seen
            .into_iter()
            .filter_map(|path| self.file_names.get(&path).cloned())
            .filter(|name| !is_declaration_file_name(name))
            .collect();
        names.sort();
        names
    }

    pub fn emit_pending(&self, path: &NormalizedPath) -> bool {
        self.pending_emit.contains(path)
    }

    pub fn mark_emitted(&mut self, path: &NormalizedPath) {
        self.pending_emit.remove(path);
    }

    pub fn contains(&self, path: &NormalizedPath) -> bool {
        self.program_files.contains(path)
    }

    /// Drop all builder state but keep the allocation so later change
    /// events can still be reported.
    pub fn clear(&mut self) {
        self.file_versions.clear();
        self.file_names.clear();
        self.reverse_deps.clear();
        self.pending_emit.clear();
        self.program_files.clear();
    }
}
