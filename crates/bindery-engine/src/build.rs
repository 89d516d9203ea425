//! Build-system boundary
//!
//! The incremental build system is an external collaborator. This module
//! pins down the slice of it the import engine consumes: dependency edges,
//! forced rebuilds, artifact deletion, rebuild-triggered tasks, and module
//! production. Artifact layout, scheduling, and freshness tracking stay on
//! the collaborator's side of the line.
//!
//! The `build` call is synchronous and may take arbitrary wall-clock time;
//! no timeout is imposed here, and a rebuild in flight cannot be cancelled.

use std::sync::Arc;

use thiserror::Error;

use bindery_core::{Module, ModuleId};

use crate::error::EngineError;

/// Errors surfaced from the build-system collaborator
#[derive(Debug, Error)]
pub enum BuildError {
    /// Target is not known to the build system
    #[error("unknown build target: {0}")]
    UnknownTarget(String),

    /// The build pipeline reported a failure
    #[error("build of '{target}' failed: {reason}")]
    BuildFailed {
        /// Target that was built
        target: String,
        /// Collaborator-supplied description
        reason: String,
    },

    /// The compiled artifact could not be deleted
    #[error("could not delete artifact for '{target}': {reason}")]
    DeleteFailed {
        /// Target whose artifact was deleted
        target: String,
        /// Collaborator-supplied description
        reason: String,
    },

    /// The module could not be produced
    #[error("require of '{target}' failed: {reason}")]
    RequireFailed {
        /// Target that was required
        target: String,
        /// Collaborator-supplied description
        reason: String,
    },
}

/// Task body run after the target it is attached to has been (re)built.
pub type RebuildHook = Box<dyn Fn() -> Result<(), EngineError> + Send + Sync>;

/// The slice of the incremental build system the import engine consumes.
pub trait BuildSystem: Send + Sync {
    /// Record that the importing unit depends on `target`.
    fn record_dependency(&self, target: &ModuleId);

    /// Whether the build system tracks `target`.
    fn target_is_known(&self, target: &ModuleId) -> bool;

    /// Force a (re)build of `target`.
    fn build(&self, target: &ModuleId) -> Result<(), BuildError>;

    /// Delete the compiled artifact for `target`, so the next build starts
    /// from source.
    fn delete_artifact(&self, target: &ModuleId) -> Result<(), BuildError>;

    /// Attach `hook` to run whenever `target`'s build is re-run.
    fn define_task(&self, name: &str, hook: RebuildHook);

    /// Produce the loaded module for `target`, building if stale.
    fn require(&self, target: &ModuleId) -> Result<Arc<Module>, BuildError>;

    /// Return the already-loaded handle for `target` without rechecking
    /// freshness.
    fn require_cached(&self, target: &ModuleId) -> Result<Arc<Module>, BuildError>;
}
