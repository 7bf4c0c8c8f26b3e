//! Compiler options and type-acquisition settings.
//!
//! Options are tsconfig-shaped and deserialize from camelCase JSON. Only the
//! subset the project core inspects is modeled as typed fields; the engine
//! receives the whole struct and interprets the rest.

use serde::Deserialize;
use std::collections::HashMap;

/// Compiler options as configured per project.
///
/// `None` means "not specified"; defaulting is the engine's business except
/// for the handful of options the project core itself rewrites
/// (`allowNonTsExtensions`, and the inferred-project JS overrides).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    pub allow_js: Option<bool>,
    pub allow_non_ts_extensions: Option<bool>,
    pub base_url: Option<String>,
    pub check_js: Option<bool>,
    pub declaration: Option<bool>,
    pub max_node_module_js_depth: Option<u32>,
    pub module: Option<String>,
    pub module_resolution: Option<String>,
    pub no_emit: Option<bool>,
    pub no_emit_for_js_files: Option<bool>,
    pub no_lib: Option<bool>,
    pub no_resolve: Option<bool>,
    pub out_dir: Option<String>,
    pub out_file: Option<String>,
    pub paths: Option<HashMap<String, Vec<String>>>,
    pub plugins: Option<Vec<PluginEntry>>,
    pub resolve_json_module: Option<bool>,
    pub root_dirs: Option<Vec<String>>,
    pub source_map: Option<bool>,
    pub strict: Option<bool>,
    pub target: Option<String>,
    pub type_roots: Option<Vec<String>>,
    pub types: Option<Vec<String>>,
}

/// A plugin reference from `compilerOptions.plugins`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginEntry {
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Whether switching from `old` to `new` can change module-resolution
/// results. A change in any of these options discards every cached
/// resolution and the unresolved-imports index.
pub fn changes_affect_module_resolution(old: &CompilerOptions, new: &CompilerOptions) -> bool {
    old.allow_js != new.allow_js
        || old.base_url != new.base_url
        || old.max_node_module_js_depth != new.max_node_module_js_depth
        || old.module != new.module
        || old.module_resolution != new.module_resolution
        || old.no_resolve != new.no_resolve
        || old.paths != new.paths
        || old.resolve_json_module != new.resolve_json_module
        || old.root_dirs != new.root_dirs
        || old.target != new.target
        || old.type_roots != new.type_roots
        || old.types != new.types
}

/// Automatic type-acquisition settings.
///
/// `enable: None` means "not specified"; project flavors default it from
/// their root composition. `include`/`exclude` default to empty lists.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeAcquisition {
    pub enable: Option<bool>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl TypeAcquisition {
    /// Clone `from` (or start empty) and fill the missing `enable` flag.
    /// Callers keep ownership of their value; aliasing is never observable.
    pub fn normalized(from: Option<&TypeAcquisition>, default_enable: bool) -> TypeAcquisition {
        let mut acquisition = from.cloned().unwrap_or_default();
        if acquisition.enable.is_none() {
            acquisition.enable = Some(default_enable);
        }
        acquisition
    }
}
