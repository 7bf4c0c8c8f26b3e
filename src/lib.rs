//! Project-core subsystem of a TypeScript-compatible language server.
//!
//! This crate is the per-project half of a language service: it tracks
//! which source files participate in a compilation, keeps resolver and
//! compiler caches coherent as files change on disk, feeds an incremental
//! builder, and reports versioned change deltas to a client session. The
//! compiler front-end, the module resolver, and the multi-project service
//! are consumed through seams (`engine`, `resolution`, `service`); this
//! crate owns the state machine between them:
//!
//! - three project flavors (inferred, configured, external) sharing one
//!   [`Project`] state machine, dispatched on a flavor tag;
//! - the graph-update protocol: resolution recording, program diffing,
//!   script-info retach, unresolved-import extraction, typings feedback;
//! - watcher lifecycle with typed close reasons;
//! - the versioned delta-reporting protocol for client sessions.

pub mod builder;
pub mod config;
pub mod engine;
pub mod errors;
pub mod options;
pub mod paths;
pub mod plugins;
pub mod program;
pub mod resolution;
pub mod script;
pub mod service;
pub mod unresolved;
pub mod watch;

mod configured;
mod external;
mod inferred;
mod project;

pub use errors::{NO_INPUT_FILES, ProjectDiagnostic, ProjectError};
pub use options::{CompilerOptions, PluginEntry, TypeAcquisition};
pub use paths::NormalizedPath;
pub use program::{Program, ProgramUpdate, SourceFileSnapshot, StructureReuse};
pub use project::{
    FileDiff, Project, ProjectChanges, ProjectFiles, ProjectInfo, ProjectKind,
};
pub use script::{ProjectId, ScriptInfo, ScriptKind, ScriptStore};
pub use watch::{FileWatchEventKind, WatchType, WatcherCloseReason, WatcherHandle};

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod resolution_tests;
