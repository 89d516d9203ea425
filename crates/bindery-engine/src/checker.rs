//! Static binding validation with rebuild recovery
//!
//! Validates a canonical binding list against the exporting module's export
//! oracle. A mismatch against a *statically known* export list is a plain
//! specification error. A mismatch that only a dynamic query could reveal
//! may instead mean the compiled artifact is stale, so the failure carries an
//! explicit rebuild-and-recheck action rather than retrying silently:
//! deleting and rebuilding an artifact is an observable, potentially
//! expensive side effect, and the caller decides whether it happens.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use rustc_hash::FxHashSet;
use thiserror::Error;

use bindery_core::ModuleId;

use crate::bindings::Binding;
use crate::build::{BuildError, BuildSystem};
use crate::language::{Language, LanguageError};

/// Errors from binding validation
#[derive(Debug, Error)]
pub enum CheckError {
    /// The same export is requested twice in one import
    #[error("duplicate binding of export '{name}'")]
    DuplicateBinding {
        /// The duplicated export name
        name: String,
    },

    /// Requested names are not a subset of the module's exports
    #[error("module '{module}' does not export {missing:?} (available: {available:?})")]
    ExportMismatch {
        /// The module the check ran against
        module: ModuleId,
        /// All requested export names
        requested: Vec<String>,
        /// Requested names absent from the export list
        missing: Vec<String>,
        /// The export list the check ran against
        available: Vec<String>,
        /// Present when the exports were not statically known, so a rebuild
        /// may fix the mismatch. Consumed by [`RebuildAction::invoke`].
        recovery: Option<RebuildAction>,
    },

    /// The export oracle failed
    #[error(transparent)]
    Language(#[from] LanguageError),

    /// Rebuild recovery failed inside the build system
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Policy for mismatches discovered through a dynamic export query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Invoke the rebuild action once; a second mismatch is fatal.
    #[default]
    Auto,
    /// Return the mismatch with the action attached for the caller to invoke.
    Manual,
}

/// Deferred "delete the stale artifact, rebuild, re-check" action.
///
/// Inspectable and operator-invocable; the re-run it performs never offers a
/// second recovery, so a check invocation rebuilds at most once.
pub struct RebuildAction {
    language: Arc<dyn Language>,
    build: Arc<dyn BuildSystem>,
    target: ModuleId,
    bindings: Vec<Binding>,
}

impl RebuildAction {
    /// The target this action would rebuild.
    pub fn target(&self) -> &ModuleId {
        &self.target
    }

    /// Delete the stale artifact, force a fresh build, and re-run the check.
    pub fn invoke(self) -> Result<(), CheckError> {
        tracing::debug!(target = %self.target, "rebuilding module after export mismatch");
        self.build.delete_artifact(&self.target)?;
        self.build.build(&self.target)?;
        check_once(
            &self.language,
            &self.build,
            &self.target,
            &self.bindings,
            false,
        )
    }
}

impl fmt::Debug for RebuildAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RebuildAction")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Validate `bindings` against the exports of `target`.
///
/// Duplicate export names fail fatally before the oracle is consulted. A
/// statically answered mismatch is fatal. A dynamically answered mismatch is
/// handled per `policy`: `Auto` rebuilds once and re-checks, `Manual` hands
/// the rebuild action back to the caller.
pub fn check_bindings(
    language: &Arc<dyn Language>,
    build: &Arc<dyn BuildSystem>,
    target: &ModuleId,
    bindings: &[Binding],
    policy: RecoveryPolicy,
) -> Result<(), CheckError> {
    let result = check_once(language, build, target, bindings, true);
    match (policy, result) {
        (
            RecoveryPolicy::Auto,
            Err(CheckError::ExportMismatch {
                recovery: Some(action),
                ..
            }),
        ) => action.invoke(),
        (_, other) => other,
    }
}

fn check_once(
    language: &Arc<dyn Language>,
    build: &Arc<dyn BuildSystem>,
    target: &ModuleId,
    bindings: &[Binding],
    offer_recovery: bool,
) -> Result<(), CheckError> {
    // Duplicates are a specification error, never retried.
    let mut seen = FxHashSet::default();
    for binding in bindings {
        if !seen.insert(binding.export.as_str()) {
            return Err(CheckError::DuplicateBinding {
                name: binding.export.clone(),
            });
        }
    }

    // Static answer first: an explicit import list validates without
    // compiling anything when the language can tell.
    let answer = language.static_exports(&target.source)?;
    if answer.known {
        let missing = missing_names(bindings, &answer.names);
        return if missing.is_empty() {
            Ok(())
        } else {
            Err(mismatch(target, bindings, &answer.names, missing, None))
        };
    }

    // Dynamic answer; a mismatch here may just mean a stale artifact.
    let names = language.dynamic_exports(&target.source)?;
    let missing = missing_names(bindings, &names);
    if missing.is_empty() {
        return Ok(());
    }

    let recovery = offer_recovery.then(|| RebuildAction {
        language: language.clone(),
        build: build.clone(),
        target: target.clone(),
        bindings: bindings.to_vec(),
    });
    Err(mismatch(target, bindings, &names, missing, recovery))
}

fn missing_names(bindings: &[Binding], exports: &IndexSet<String>) -> Vec<String> {
    bindings
        .iter()
        .filter(|binding| !exports.contains(&binding.export))
        .map(|binding| binding.export.clone())
        .collect()
}

fn mismatch(
    target: &ModuleId,
    bindings: &[Binding],
    available: &IndexSet<String>,
    missing: Vec<String>,
    recovery: Option<RebuildAction>,
) -> CheckError {
    CheckError::ExportMismatch {
        module: target.clone(),
        requested: bindings.iter().map(|b| b.export.clone()).collect(),
        missing,
        available: available.iter().cloned().collect(),
        recovery,
    }
}
