//! Unresolved-imports index.
//!
//! For each source file the index caches the bare package names whose
//! resolution failed, trimmed to their package prefix. The typings helper
//! consumes the deduplicated union to decide which declaration packages to
//! acquire. Entries drop out when a file's resolutions change and the whole
//! index clears when compiler options change in resolution-affecting ways.

use crate::paths::NormalizedPath;
use crate::program::SourceFileSnapshot;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Per-file cache of failed bare specifiers, versioned.
#[derive(Debug, Default)]
pub struct UnresolvedImportsIndex {
    per_file: FxHashMap<NormalizedPath, Arc<[String]>>,
    version: u64,
}

impl UnresolvedImportsIndex {
    pub fn get(&self, path: &NormalizedPath) -> Option<&Arc<[String]>> {
        self.per_file.get(path)
    }

    pub fn remove(&mut self, path: &NormalizedPath) {
        if self.per_file.remove(path).is_some() {
            self.version += 1;
        }
    }

    pub fn clear(&mut self) {
        if !self.per_file.is_empty() {
            self.per_file.clear();
            self.version += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.per_file.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn insert(&mut self, path: NormalizedPath, imports: Arc<[String]>) {
        self.per_file.insert(path, imports);
        self.version += 1;
    }
}

/// Collect the unresolved package names of `file` into `sink`, consulting
/// the cache first. On a miss the file's resolution table is scanned and the
/// result persisted, empty-list sentinel included, so later passes
/// short-circuit.
pub fn extract_unresolved_imports(
    index: &mut UnresolvedImportsIndex,
    file: &SourceFileSnapshot,
    sink: &mut Vec<String>,
) {
    if let Some(cached) = index.get(&file.path) {
        sink.extend(cached.iter().cloned());
        return;
    }

    let mut imports: Vec<String> = file
        .resolved_modules
        .iter()
        .filter(|(specifier, resolution)| resolution.is_none() && !is_relative_specifier(specifier))
        .map(|(specifier, _)| package_name_of(specifier).to_string())
        .collect();
    imports.sort();
    imports.dedup();

    sink.extend(imports.iter().cloned());
    index.insert(file.path.clone(), Arc::from(imports));
}

fn is_relative_specifier(specifier: &str) -> bool {
    let trimmed = specifier.trim();
    trimmed.starts_with('.') || trimmed.starts_with('/')
}

/// Trim a bare specifier to its package prefix: the first segment, or the
/// first two segments for scoped names.
pub fn package_name_of(specifier: &str) -> &str {
    let trimmed = specifier.trim();
    if let Some(rest) = trimmed.strip_prefix('@') {
        match rest.find('/') {
            Some(scope_end) => match rest[scope_end + 1..].find('/') {
                Some(name_end) => &trimmed[..1 + scope_end + 1 + name_end],
                None => trimmed,
            },
            None => trimmed,
        }
    } else {
        match trimmed.find('/') {
            Some(end) => &trimmed[..end],
            None => trimmed,
        }
    }
}
