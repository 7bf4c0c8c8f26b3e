//! Compilation-engine seam.
//!
//! The engine is consumed as a black box: given the project's current file
//! set, options, and script contents, it produces an immutable [`Program`]
//! snapshot together with a structure-reuse flag. The project core never
//! looks inside parsing or checking; it only diffs snapshots. Plugins wrap
//! the language service in an ordered decorator chain, so every entry point
//! here must stay object-safe.

use crate::options::CompilerOptions;
use crate::paths::NormalizedPath;
use crate::program::{Program, ProgramUpdate};
use crate::resolution::{ModuleResolver, ResolutionCache};
use crate::script::ScriptStore;
use crate::service::ServerHost;
use std::sync::Arc;

/// One emitted output file.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFile {
    pub name: String,
    pub text: String,
}

/// Result of emitting a single source file.
#[derive(Debug, Clone, Default)]
pub struct EmitOutput {
    pub output_files: Vec<OutputFile>,
    pub emit_skipped: bool,
}

/// The view of project state an engine recomputation runs against.
///
/// `file_names` is the input set (roots plus typing files). The engine may
/// create script infos for files it discovers through resolution, consults
/// `resolution.has_invalidated_resolution` to decide which per-file results
/// to discard, and must report every failed lookup location of the new
/// program through `resolution.note_failed_lookup`.
pub struct ProgramHost<'a> {
    pub file_names: &'a [String],
    pub options: &'a CompilerOptions,
    pub scripts: &'a mut ScriptStore,
    pub server: &'a dyn ServerHost,
    pub resolution: &'a mut ResolutionCache,
    pub resolver: &'a mut dyn ModuleResolver,
    pub old_program: Option<&'a Arc<Program>>,
}

/// The language-service surface the project core drives.
pub trait LanguageService {
    /// Recompute the program for the current project state. Returning the
    /// previous `Arc` with [`StructureReuse::Completely`] signals an
    /// unchanged file set.
    ///
    /// [`StructureReuse::Completely`]: crate::program::StructureReuse::Completely
    fn update_program(&mut self, host: &mut ProgramHost<'_>) -> ProgramUpdate;

    /// Drop checker-level caches. Called when the language service is
    /// disabled for the project.
    fn clear_semantic_cache(&mut self);

    /// Emit one file of the current program.
    fn emit_file(&mut self, path: &NormalizedPath) -> EmitOutput;
}
