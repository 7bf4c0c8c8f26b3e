//! Script infos and the script store.
//!
//! The script store owns the canonical per-file record: content, open/close
//! state, and the set of projects each file is attached to. Projects hold
//! normalized paths and ask the store for views, which keeps the
//! project↔file graph free of back-references: detach is a set removal.

use crate::paths::{NormalizedPath, normalize_slashes};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Identifies a project in attachment sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectId(pub u32);

/// Classification of a script by content kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Unknown,
    Js,
    Jsx,
    Ts,
    Tsx,
    Json,
    External,
}

impl ScriptKind {
    /// Derive the kind from the file extension.
    pub fn from_file_name(file_name: &str) -> ScriptKind {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".tsx") {
            ScriptKind::Tsx
        } else if lower.ends_with(".ts") || lower.ends_with(".mts") || lower.ends_with(".cts") {
            ScriptKind::Ts
        } else if lower.ends_with(".jsx") {
            ScriptKind::Jsx
        } else if lower.ends_with(".js") || lower.ends_with(".mjs") || lower.ends_with(".cjs") {
            ScriptKind::Js
        } else if lower.ends_with(".json") {
            ScriptKind::Json
        } else {
            ScriptKind::Unknown
        }
    }
}

/// Declaration files carry compound extensions, so check those before the
/// plain `.ts` family.
pub fn is_declaration_file_name(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.ends_with(".d.ts") || lower.ends_with(".d.mts") || lower.ends_with(".d.cts")
}

/// JS-dialect source, including the module-flavored extensions.
pub fn has_js_like_extension(file_name: &str) -> bool {
    matches!(
        ScriptKind::from_file_name(file_name),
        ScriptKind::Js | ScriptKind::Jsx
    )
}

/// Whether the file is a JS-dialect source or a declaration file. This is
/// the predicate behind type-acquisition defaults.
pub fn is_js_or_dts_file_name(file_name: &str) -> bool {
    has_js_like_extension(file_name) || is_declaration_file_name(file_name)
}

/// The canonical per-file record.
#[derive(Debug)]
pub struct ScriptInfo {
    file_name: String,
    path: NormalizedPath,
    script_kind: ScriptKind,
    open_by_client: bool,
    has_mixed_content: bool,
    version: u64,
    text: Option<Arc<str>>,
    attached_projects: FxHashSet<ProjectId>,
}

impl ScriptInfo {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    pub fn script_kind(&self) -> ScriptKind {
        self.script_kind
    }

    pub fn is_open_by_client(&self) -> bool {
        self.open_by_client
    }

    pub fn has_mixed_content(&self) -> bool {
        self.has_mixed_content
    }

    /// Content version; bumped on every edit.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn text(&self) -> Option<&Arc<str>> {
        self.text.as_ref()
    }

    pub fn is_attached_to(&self, project: ProjectId) -> bool {
        self.attached_projects.contains(&project)
    }

    pub fn attached_projects(&self) -> impl Iterator<Item = ProjectId> + '_ {
        self.attached_projects.iter().copied()
    }

    pub fn is_orphan(&self) -> bool {
        self.attached_projects.is_empty()
    }
}

/// Owner of every [`ScriptInfo`]. Shared between the project service and
/// all projects; attach/detach keeps both sides consistent.
#[derive(Debug)]
pub struct ScriptStore {
    infos: FxHashMap<NormalizedPath, ScriptInfo>,
    use_case_sensitive_file_names: bool,
}

impl ScriptStore {
    pub fn new(use_case_sensitive_file_names: bool) -> ScriptStore {
        ScriptStore {
            infos: FxHashMap::default(),
            use_case_sensitive_file_names,
        }
    }

    pub fn use_case_sensitive_file_names(&self) -> bool {
        self.use_case_sensitive_file_names
    }

    /// Canonical key for a file name under this store's case rule.
    pub fn to_path(&self, file_name: &str) -> NormalizedPath {
        NormalizedPath::new(file_name, self.use_case_sensitive_file_names)
    }

    pub fn get(&self, path: &NormalizedPath) -> Option<&ScriptInfo> {
        self.infos.get(path)
    }

    pub fn contains(&self, path: &NormalizedPath) -> bool {
        self.infos.contains_key(path)
    }

    /// Fetch or create the info for `file_name`. An existing info keeps its
    /// content; `text` seeds a new one only.
    pub fn get_or_create(
        &mut self,
        file_name: &str,
        opened_by_client: bool,
        text: Option<String>,
        script_kind: Option<ScriptKind>,
    ) -> NormalizedPath {
        let path = self.to_path(file_name);
        if let Some(info) = self.infos.get_mut(&path) {
            if opened_by_client {
                info.open_by_client = true;
            }
            return path;
        }
        let file_name = normalize_slashes(file_name);
        let kind = script_kind.unwrap_or_else(|| ScriptKind::from_file_name(&file_name));
        self.infos.insert(
            path.clone(),
            ScriptInfo {
                file_name,
                path: path.clone(),
                script_kind: kind,
                open_by_client: opened_by_client,
                has_mixed_content: false,
                version: 1,
                text: text.map(Arc::from),
                attached_projects: FxHashSet::default(),
            },
        );
        path
    }

    /// Replace the content of an existing script and bump its version.
    /// Returns the projects that should see the file as updated.
    pub fn edit(&mut self, path: &NormalizedPath, text: String) -> Vec<ProjectId> {
        let Some(info) = self.infos.get_mut(path) else {
            return Vec::new();
        };
        info.text = Some(Arc::from(text));
        info.version += 1;
        info.attached_projects.iter().copied().collect()
    }

    pub fn open_by_client(&mut self, path: &NormalizedPath) {
        if let Some(info) = self.infos.get_mut(path) {
            info.open_by_client = true;
        }
    }

    pub fn close_by_client(&mut self, path: &NormalizedPath) {
        if let Some(info) = self.infos.get_mut(path) {
            info.open_by_client = false;
        }
    }

    /// Attach `path` to `project`; returns whether the attachment is new.
    pub fn attach(&mut self, path: &NormalizedPath, project: ProjectId) -> bool {
        match self.infos.get_mut(path) {
            Some(info) => info.attached_projects.insert(project),
            None => false,
        }
    }

    /// Detach `path` from `project`; returns whether it was attached.
    pub fn detach(&mut self, path: &NormalizedPath, project: ProjectId) -> bool {
        match self.infos.get_mut(path) {
            Some(info) => info.attached_projects.remove(&project),
            None => false,
        }
    }

    pub fn is_attached(&self, path: &NormalizedPath, project: ProjectId) -> bool {
        self.infos
            .get(path)
            .is_some_and(|info| info.is_attached_to(project))
    }
}
