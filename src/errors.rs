//! Project-level errors and diagnostics.
//!
//! The core absorbs transient collaborator failures (plugin loads, plugin
//! callbacks, resolution misses) and logs them; the only failure that
//! propagates to callers is [`ProjectError`]. Project-wide conditions such
//! as a config file matching no inputs are recorded as
//! [`ProjectDiagnostic`]s on the project instead.

use crate::paths::NormalizedPath;
use thiserror::Error;

/// TS18003: No inputs were found in config file.
pub const NO_INPUT_FILES: u32 = 18003;

/// The single error the project core propagates.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// The file is known to the script store but not attached to this
    /// project.
    #[error("file '{file_name}' does not belong to project '{project}'")]
    DocumentDoesNotBelongToProject { file_name: String, project: String },
}

/// A project-scoped diagnostic. `file` is `None` for project-global
/// conditions; diagnostics carrying a file reference stay in the general
/// pool.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDiagnostic {
    pub code: u32,
    pub message: String,
    pub file: Option<NormalizedPath>,
}

impl ProjectDiagnostic {
    /// The configured-project diagnostic for a config file whose
    /// `include`/`files` matched nothing.
    pub fn no_input_files(config_file_name: &str) -> ProjectDiagnostic {
        ProjectDiagnostic {
            code: NO_INPUT_FILES,
            message: format!("No inputs were found in config file '{config_file_name}'."),
            file: None,
        }
    }
}
