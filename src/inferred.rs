//! Inferred projects.
//!
//! An inferred project collects loose open files that no config file
//! claims. Names are synthetic and monotonically numbered. The project
//! tracks whether its roots make it a JS-flavored project and rewrites the
//! JS-related compiler options on every flip.

use crate::options::CompilerOptions;
use crate::paths::NormalizedPath;
use crate::project::{Flavor, Project};
use crate::resolution::ModuleResolver;
use crate::script::{
    ProjectId, ScriptStore, has_js_like_extension, is_declaration_file_name,
};
use crate::engine::LanguageService;
use crate::service::{ProjectHost, ServerHost};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_INFERRED_PROJECT: AtomicU32 = AtomicU32::new(1);

pub(crate) struct InferredState {
    pub is_js_inferred_project: bool,
    pub project_root_path: Option<NormalizedPath>,
}

impl Project {
    /// Create an inferred project with a synthetic name.
    #[allow(clippy::too_many_arguments)]
    pub fn new_inferred(
        id: ProjectId,
        host: Rc<dyn ProjectHost>,
        server: Rc<dyn ServerHost>,
        scripts: Rc<RefCell<ScriptStore>>,
        language_service: Box<dyn LanguageService>,
        resolver: Box<dyn ModuleResolver>,
        compiler_options: Option<&CompilerOptions>,
        project_root_path: Option<&str>,
    ) -> Project {
        let ordinal = NEXT_INFERRED_PROJECT.fetch_add(1, Ordering::Relaxed);
        let project_name = format!("/dev/null/inferredProject{ordinal}*");
        let root = project_root_path.map(|path| scripts.borrow().to_path(path));
        let mut project = Project::new_common(
            project_name,
            id,
            Flavor::Inferred(InferredState {
                is_js_inferred_project: false,
                project_root_path: root,
            }),
            host,
            server,
            scripts,
            language_service,
            resolver,
            false,
        );
        let options = compiler_options.cloned().unwrap_or_default();
        project.set_compiler_options(&options);
        project
    }

    pub fn is_js_inferred_project(&self) -> bool {
        matches!(&self.flavor, Flavor::Inferred(state) if state.is_js_inferred_project)
    }

    pub(crate) fn toggle_js_inferred_project(&mut self, is_js: bool) {
        let Flavor::Inferred(state) = &mut self.flavor else {
            return;
        };
        if state.is_js_inferred_project == is_js {
            return;
        }
        state.is_js_inferred_project = is_js;
        // Re-derive the JS-related option overrides under the new flavor.
        let options = self.compiler_options.clone();
        self.set_compiler_options(&options);
    }

    pub(crate) fn inferred_root_added(&mut self, path: &NormalizedPath, file_name: &str) {
        if !self.is_js_inferred_project()
            && has_js_like_extension(file_name)
            && !is_declaration_file_name(file_name)
        {
            self.toggle_js_inferred_project(true);
        }
        // A config file created later may promote this root into a
        // configured project.
        self.host.start_watching_config_files_for_inferred_root(path);
    }

    pub(crate) fn inferred_root_removed(&mut self, path: &NormalizedPath) {
        if self.is_js_inferred_project() && !self.has_js_root() {
            self.toggle_js_inferred_project(false);
        }
        self.host.stop_watching_config_files_for_inferred_root(path);
    }

    fn has_js_root(&self) -> bool {
        self.root_file_names()
            .iter()
            .any(|name| has_js_like_extension(name) && !is_declaration_file_name(name))
    }
}
