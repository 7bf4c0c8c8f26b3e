//! Language-service plugins.
//!
//! Plugins are trusted in-process extenders resolved through
//! [`ServerHost::require`] and composed as an ordered decorator chain: each
//! module's `create` receives the current language service and returns a
//! wrapped one that becomes the project's service. A failing plugin hands
//! the unwrapped service back, so later plugins still wrap the original.
//!
//! [`ServerHost::require`]: crate::service::ServerHost::require

use crate::engine::LanguageService;
use anyhow::Error;

/// What a plugin's `create` gets to see.
pub struct PluginCreateInfo {
    pub project_name: String,
    /// The plugin's entry from `compilerOptions.plugins`, verbatim.
    pub config: serde_json::Value,
}

/// A `create` failure. Carries the service back so composition continues
/// with the unwrapped one.
pub struct PluginActivationError {
    pub language_service: Box<dyn LanguageService>,
    pub error: Error,
}

/// Read-only view of the owning project handed to plugin callbacks.
pub struct ProjectView<'a> {
    pub project_name: &'a str,
    pub config_file_name: Option<&'a str>,
}

/// A resolved plugin module.
pub trait PluginModule {
    /// Wrap `language_service`. On error the project keeps the unwrapped
    /// service and logs the failure.
    fn create(
        &self,
        info: &PluginCreateInfo,
        language_service: Box<dyn LanguageService>,
    ) -> Result<Box<dyn LanguageService>, PluginActivationError>;

    /// Extra files this plugin contributes to the project. Modules without
    /// the capability inherit the empty default.
    fn external_files(&self, project: &ProjectView<'_>) -> Vec<String> {
        let _ = project;
        Vec::new()
    }
}

impl std::fmt::Debug for dyn PluginModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PluginModule")
    }
}
