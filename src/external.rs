//! External projects.
//!
//! An external build system names the project and owns its file watching;
//! the core does no plugin loading and opens no wildcard or type-root
//! watchers for this flavor.

use crate::engine::LanguageService;
use crate::options::{CompilerOptions, TypeAcquisition};
use crate::paths::normalize_slashes;
use crate::project::{Flavor, Project};
use crate::resolution::ModuleResolver;
use crate::script::{ProjectId, ScriptStore};
use crate::service::{ProjectHost, ServerHost};
use std::cell::RefCell;
use std::rc::Rc;

pub(crate) struct ExternalState {
    pub project_file_path: Option<String>,
}

impl Project {
    /// Create an external project under the caller-supplied name.
    #[allow(clippy::too_many_arguments)]
    pub fn new_external(
        id: ProjectId,
        project_name: &str,
        host: Rc<dyn ProjectHost>,
        server: Rc<dyn ServerHost>,
        scripts: Rc<RefCell<ScriptStore>>,
        language_service: Box<dyn LanguageService>,
        resolver: Box<dyn ModuleResolver>,
        compiler_options: &CompilerOptions,
        type_acquisition: Option<&TypeAcquisition>,
        project_file_path: Option<&str>,
        compile_on_save_enabled: bool,
    ) -> Project {
        let mut project = Project::new_common(
            normalize_slashes(project_name),
            id,
            Flavor::External(ExternalState {
                project_file_path: project_file_path.map(normalize_slashes),
            }),
            host,
            server,
            scripts,
            language_service,
            resolver,
            compile_on_save_enabled,
        );
        project.set_compiler_options(compiler_options);
        project.set_type_acquisition(type_acquisition);
        project
    }

    /// Replace the type-acquisition settings of an external project. The
    /// caller's value is cloned and missing fields are defaulted on the
    /// clone: `enable` falls back to whether every root is a JS or
    /// declaration file, `include`/`exclude` to empty lists.
    pub fn set_type_acquisition(&mut self, type_acquisition: Option<&TypeAcquisition>) {
        if !matches!(self.flavor, Flavor::External(_)) {
            return;
        }
        let normalized =
            TypeAcquisition::normalized(type_acquisition, self.all_root_files_are_js_or_dts());
        if normalized != self.type_acquisition {
            self.type_acquisition = normalized;
            self.mark_as_dirty();
        }
    }
}
