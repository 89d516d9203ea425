//! Language plugin contract
//!
//! Each supported source language is an opaque plugin: it names itself,
//! claims file extensions, answers export queries, and optionally supplies
//! the conventional source path for imports that name a language but no file.
//! The export queries form the oracle the static-binding checker runs
//! against: `static_exports` must be cheap and compilation-free, while
//! `dynamic_exports` is allowed to compile the module to find out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use thiserror::Error;

use bindery_core::LangId;

/// Errors a language plugin can surface from export introspection
#[derive(Debug, Error)]
pub enum LanguageError {
    /// Static export scan failed
    #[error("export scan of '{path}' failed: {reason}")]
    ScanFailed {
        /// Source file that was scanned
        path: String,
        /// Plugin-supplied description
        reason: String,
    },

    /// Compilation during a dynamic export query failed
    #[error("compilation of '{path}' failed: {reason}")]
    CompileFailed {
        /// Source file that was compiled
        path: String,
        /// Plugin-supplied description
        reason: String,
    },
}

/// Answer to a static export query.
#[derive(Debug, Clone)]
pub struct ExportAnswer {
    /// Export names, in declaration order.
    pub names: IndexSet<String>,
    /// False when exports cannot be determined without compiling.
    pub known: bool,
}

impl ExportAnswer {
    /// A statically known export list.
    pub fn known(names: IndexSet<String>) -> Self {
        Self { names, known: true }
    }

    /// Exports cannot be determined without compiling.
    pub fn unknown() -> Self {
        Self {
            names: IndexSet::new(),
            known: false,
        }
    }
}

/// Contract every language front end satisfies.
pub trait Language: Send + Sync {
    /// Canonical language identifier.
    fn id(&self) -> LangId;

    /// File extensions (without the dot) this language claims, for
    /// source-based language inference.
    fn extensions(&self) -> &[&str];

    /// Exports of `source`, as far as they are statically determinable.
    fn static_exports(&self, source: &Path) -> Result<ExportAnswer, LanguageError>;

    /// Exports of `source`, compiling the module if necessary.
    fn dynamic_exports(&self, source: &Path) -> Result<IndexSet<String>, LanguageError>;

    /// Conventional source path for a `(language, module-name)` import, if
    /// this language defines one.
    fn default_source(&self, module_name: &str, base_dir: &Path) -> Option<PathBuf> {
        let _ = (module_name, base_dir);
        None
    }
}

/// Registry of installed language plugins.
///
/// Lookup is by canonical id; inference is by file extension in registration
/// order, so the first registered language claiming an extension wins.
#[derive(Default)]
pub struct LanguageRegistry {
    languages: Vec<Arc<dyn Language>>,
    by_id: FxHashMap<LangId, usize>,
}

impl LanguageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a language plugin. Re-registering an id replaces the plugin.
    pub fn register(&mut self, language: Arc<dyn Language>) {
        let id = language.id();
        match self.by_id.get(&id) {
            Some(&index) => self.languages[index] = language,
            None => {
                self.by_id.insert(id, self.languages.len());
                self.languages.push(language);
            }
        }
    }

    /// Look up a language by canonical id.
    pub fn get(&self, id: &LangId) -> Option<Arc<dyn Language>> {
        self.by_id
            .get(id)
            .map(|&index| self.languages[index].clone())
    }

    /// Infer the language of `source` from its file extension.
    pub fn infer(&self, source: &Path) -> Option<Arc<dyn Language>> {
        let ext = source.extension()?.to_str()?;
        self.languages
            .iter()
            .find(|language| language.extensions().contains(&ext))
            .cloned()
    }

    /// Number of installed languages.
    pub fn len(&self) -> usize {
        self.languages.len()
    }

    /// Whether no languages are installed.
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}
