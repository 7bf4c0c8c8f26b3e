//! Config-file loading for configured projects.
//!
//! Config files are tsconfig-shaped JSON. Loading resolves the `extends`
//! chain (child fields win, cycles terminate the chain), evaluates
//! `files`/`include`/`exclude` over the host file system, and derives the
//! wildcard directories whose watchers keep the root set current.

use crate::options::{CompilerOptions, TypeAcquisition};
use crate::paths::{combine_paths, directory_of, normalize_slashes};
use crate::service::ServerHost;
use anyhow::{Context, Result, anyhow};
use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

pub(crate) const DEFAULT_EXCLUDES: [&str; 3] =
    ["node_modules", "bower_components", "jspm_packages"];

/// Excluded from globbed discovery unless explicitly included; compiled
/// once.
static DEFAULT_EXCLUDE_SET: Lazy<GlobSet> = Lazy::new(|| {
    let patterns: Vec<String> = DEFAULT_EXCLUDES
        .iter()
        .map(|dir| format!("{dir}/**"))
        .collect();
    build_globset(&patterns).expect("default exclude patterns are valid globs")
});

/// Raw config-file shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfigFile {
    pub extends: Option<String>,
    pub compiler_options: Option<CompilerOptions>,
    pub files: Option<Vec<String>>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub type_acquisition: Option<TypeAcquisition>,
    pub compile_on_save: Option<bool>,
}

/// A directory captured by an include glob. Changes under it may add or
/// remove root files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardDirectory {
    pub directory: String,
    pub recursive: bool,
}

/// Fully evaluated config: options plus the concrete input set.
#[derive(Debug, Default)]
pub struct ParsedProjectConfig {
    pub options: CompilerOptions,
    pub type_acquisition: Option<TypeAcquisition>,
    pub compile_on_save: bool,
    /// Inputs that exist on disk, absolute and slash-normalized, sorted.
    pub file_names: Vec<String>,
    /// Literal `files` entries absent on disk; become missing-file roots.
    pub missing_files: Vec<String>,
    pub wildcard_directories: Vec<WildcardDirectory>,
    pub extended_config_files: Vec<String>,
    /// Whether the config listed explicit `files`. Gates the
    /// no-input-files diagnostic.
    pub has_explicit_files: bool,
}

/// Load and evaluate the config file at `config_file_name`.
pub fn load_project_config(
    server: &dyn ServerHost,
    config_file_name: &str,
) -> Result<ParsedProjectConfig> {
    let config_file_name = normalize_slashes(config_file_name);
    let mut seen = FxHashSet::default();
    seen.insert(config_file_name.clone());
    let mut extended_config_files = Vec::new();
    let raw = load_raw_config(server, &config_file_name, &mut seen, &mut extended_config_files)?;
    let config: ProjectConfigFile = serde_json::from_value(raw)
        .with_context(|| format!("failed to parse config file: {config_file_name}"))?;

    let base_dir = directory_of(&config_file_name).unwrap_or(".").to_string();
    let options = config.compiler_options.clone().unwrap_or_default();
    let allow_js = options.allow_js == Some(true);

    let mut file_names = Vec::new();
    let mut missing_files = Vec::new();
    for file in config.files.iter().flatten() {
        let path = combine_paths(&base_dir, file);
        if server.file_exists(&path) {
            file_names.push(path);
        } else {
            missing_files.push(path);
        }
    }

    // `include` defaults to everything only when `files` is also absent.
    let include_patterns: Vec<String> = match (&config.files, &config.include) {
        (_, Some(include)) => include.iter().map(|p| expand_include_pattern(p)).collect(),
        (None, None) => vec!["**/*".to_string()],
        (Some(_), None) => Vec::new(),
    };

    let mut wildcard_directories = Vec::new();
    if !include_patterns.is_empty() {
        let include_set = build_globset(&include_patterns)
            .with_context(|| format!("invalid include patterns in {config_file_name}"))?;
        let exclude_set = build_exclude_globset(&config, &options)
            .with_context(|| format!("invalid exclude patterns in {config_file_name}"))?;

        let mut extensions = vec![".ts", ".tsx"];
        if allow_js {
            extensions.extend([".js", ".jsx", ".mjs", ".cjs"]);
        }
        for candidate in server.read_directory(&base_dir, &extensions) {
            let candidate = normalize_slashes(&candidate);
            let Some(rel) = relative_to(&candidate, &base_dir) else {
                continue;
            };
            if include_set.is_match(rel)
                && !DEFAULT_EXCLUDE_SET.is_match(rel)
                && !exclude_set.is_match(rel)
            {
                file_names.push(candidate);
            }
        }

        wildcard_directories = wildcard_directories_of(&include_patterns, &base_dir);
    }

    file_names.sort();
    file_names.dedup();

    Ok(ParsedProjectConfig {
        options,
        type_acquisition: config.type_acquisition.clone(),
        compile_on_save: config.compile_on_save.unwrap_or(false),
        file_names,
        missing_files,
        wildcard_directories,
        extended_config_files,
        has_explicit_files: config.files.is_some(),
    })
}

fn load_raw_config(
    server: &dyn ServerHost,
    config_file_name: &str,
    seen: &mut FxHashSet<String>,
    extended: &mut Vec<String>,
) -> Result<Value> {
    let text = server
        .read_file(config_file_name)
        .ok_or_else(|| anyhow!("failed to read config file: {config_file_name}"))?;
    let mut value: Value = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config file: {config_file_name}"))?;

    let extends = value
        .get("extends")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(extends) = extends {
        let base_dir = directory_of(config_file_name).unwrap_or(".");
        let mut parent_path = combine_paths(base_dir, &extends);
        if !parent_path.ends_with(".json") {
            parent_path.push_str(".json");
        }
        if seen.insert(parent_path.clone()) {
            if server.file_exists(&parent_path) {
                extended.push(parent_path.clone());
                let parent = load_raw_config(server, &parent_path, seen, extended)?;
                merge_missing_fields(&mut value, parent);
            } else {
                warn!(config = %config_file_name, extends = %parent_path, "extended config not found");
            }
        }
    }
    Ok(value)
}

/// Merge `parent` under `child`: child-specified fields win wholesale,
/// except `compilerOptions` which merges key-wise.
fn merge_missing_fields(child: &mut Value, parent: Value) {
    let (Value::Object(child_map), Value::Object(parent_map)) = (child, parent) else {
        return;
    };
    for (key, parent_value) in parent_map {
        if key == "extends" {
            continue;
        }
        if key == "compilerOptions" {
            match child_map.entry(key) {
                serde_json::map::Entry::Vacant(vacant) => {
                    vacant.insert(parent_value);
                }
                serde_json::map::Entry::Occupied(mut occupied) => {
                    if let (Value::Object(child_options), Value::Object(parent_options)) =
                        (occupied.get_mut(), parent_value)
                    {
                        for (option, value) in parent_options {
                            child_options.entry(option).or_insert(value);
                        }
                    }
                }
            }
            continue;
        }
        child_map.entry(key).or_insert(parent_value);
    }
}

/// Directory includes match everything beneath them.
fn expand_include_pattern(pattern: &str) -> String {
    let pattern = normalize_slashes(pattern);
    if contains_glob_meta(&pattern) || has_file_extension(&pattern) {
        pattern
    } else {
        format!("{pattern}/**/*")
    }
}

fn contains_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

fn has_file_extension(pattern: &str) -> bool {
    pattern
        .rsplit('/')
        .next()
        .is_some_and(|last| last.contains('.'))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn build_exclude_globset(config: &ProjectConfigFile, options: &CompilerOptions) -> Result<GlobSet> {
    let mut patterns: Vec<String> = config
        .exclude
        .iter()
        .flatten()
        .map(|exclude| expand_include_pattern(exclude))
        .collect();
    if let Some(out_dir) = &options.out_dir {
        patterns.push(format!("{}/**", normalize_slashes(out_dir)));
    }
    build_globset(&patterns)
}

fn relative_to<'a>(path: &'a str, base_dir: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(base_dir)?;
    rest.strip_prefix('/').or(Some(rest)).filter(|r| !r.is_empty())
}

/// Derive the watched wildcard directories from include patterns: the
/// longest non-glob prefix of each pattern, recursive when the wildcard
/// spans more than the final path component.
pub fn wildcard_directories_of(
    include_patterns: &[String],
    base_dir: &str,
) -> Vec<WildcardDirectory> {
    let mut directories: Vec<WildcardDirectory> = Vec::new();
    for pattern in include_patterns {
        let Some(meta_pos) = pattern.find(['*', '?', '[', '{']) else {
            continue;
        };
        let prefix = &pattern[..meta_pos];
        let directory = match prefix.rfind('/') {
            Some(idx) => combine_paths(base_dir, &prefix[..idx]),
            None => base_dir.to_string(),
        };
        let remainder = &pattern[meta_pos..];
        let recursive = remainder.contains("**") || remainder.contains('/');

        match directories
            .iter_mut()
            .find(|existing| existing.directory == directory)
        {
            Some(existing) => existing.recursive |= recursive,
            None => directories.push(WildcardDirectory {
                directory,
                recursive,
            }),
        }
    }
    directories
}
