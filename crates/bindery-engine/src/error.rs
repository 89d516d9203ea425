//! Engine-level error umbrella
//!
//! Per-concern error enums live next to the code that raises them; this is
//! the single type the engine API surfaces, with conversions from each.

use thiserror::Error;

use bindery_core::ModuleError;

use crate::bindings::ExpandError;
use crate::build::BuildError;
use crate::checker::CheckError;
use crate::language::LanguageError;
use crate::resolver::ResolveError;

/// Any failure surfaced by the import engine API
#[derive(Debug, Error)]
pub enum EngineError {
    /// Import resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Binding expansion failed
    #[error(transparent)]
    Expand(#[from] ExpandError),

    /// Binding validation failed
    #[error(transparent)]
    Check(#[from] CheckError),

    /// A module reference failed
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// The build-system collaborator failed
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A language plugin failed
    #[error(transparent)]
    Language(#[from] LanguageError),
}
