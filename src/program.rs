//! Program snapshots.
//!
//! A program is the engine's immutable view of one compilation: the source
//! files in scope, each with its per-file resolution table, plus the paths
//! the compilation referenced but could not find. The project replaces its
//! snapshot atomically during a graph update and keeps the previous one only
//! long enough to compute diffs.

use crate::paths::NormalizedPath;
use crate::resolution::ResolvedModule;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// How much of the previous program the engine reused. Only `Completely`
/// signals that the file set is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureReuse {
    Not,
    SafeModules,
    Completely,
}

/// One source file inside a program snapshot.
#[derive(Debug, Clone)]
pub struct SourceFileSnapshot {
    pub path: NormalizedPath,
    pub file_name: String,
    /// Content version string, stable across updates when the text is
    /// unchanged.
    pub version: String,
    /// Specifier → resolution result; `None` marks a failed resolution.
    pub resolved_modules: FxHashMap<String, Option<ResolvedModule>>,
    /// Whether the file came out of an external package directory.
    pub is_external_library: bool,
}

/// Immutable compilation snapshot.
#[derive(Debug)]
pub struct Program {
    files: Vec<SourceFileSnapshot>,
    by_path: FxHashMap<NormalizedPath, usize>,
    missing_file_paths: Vec<NormalizedPath>,
}

impl Program {
    pub fn new(files: Vec<SourceFileSnapshot>, missing_file_paths: Vec<NormalizedPath>) -> Program {
        let by_path = files
            .iter()
            .enumerate()
            .map(|(idx, file)| (file.path.clone(), idx))
            .collect();
        Program {
            files,
            by_path,
            missing_file_paths,
        }
    }

    pub fn files(&self) -> &[SourceFileSnapshot] {
        &self.files
    }

    pub fn contains(&self, path: &NormalizedPath) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn get(&self, path: &NormalizedPath) -> Option<&SourceFileSnapshot> {
        self.by_path.get(path).map(|&idx| &self.files[idx])
    }

    pub fn missing_file_paths(&self) -> &[NormalizedPath] {
        &self.missing_file_paths
    }
}

/// Result of one engine recomputation.
#[derive(Debug)]
pub struct ProgramUpdate {
    pub program: Arc<Program>,
    pub structure_reuse: StructureReuse,
}
