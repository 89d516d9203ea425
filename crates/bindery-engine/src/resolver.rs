//! Import resolution
//!
//! Turns a possibly-partial import specification into a fully resolved plan:
//! canonical language, absolute source path, and the expanded binding list.
//! Either the language or the source may be omitted, as long as the other
//! (plus contextual defaults) lets the resolver infer it.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use bindery_core::{LangId, ModuleId};

use crate::bindings::{apply_prefix, expand, Binding, BindingSpec, ExpandError};
use crate::language::{Language, LanguageRegistry};

/// Errors that can occur during import resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Language omitted and not inferable
    #[error("cannot resolve import '{module_name}': {detail}")]
    MissingLanguage {
        /// Local name of the import being resolved
        module_name: String,
        /// Why inference failed
        detail: String,
    },

    /// Language given, but it has no source convention for this module name
    #[error("cannot resolve import '{module_name}': language '{language}' supplies no source path")]
    MissingSource {
        /// Local name of the import being resolved
        module_name: String,
        /// The language that was asked for a conventional path
        language: LangId,
    },

    /// A language id that is not registered
    #[error("unknown language: {0}")]
    UnknownLanguage(LangId),

    /// Binding expansion failed
    #[error(transparent)]
    Expand(#[from] ExpandError),
}

/// A possibly-partial import specification.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Language of the imported module, if stated.
    pub language: Option<LangId>,
    /// Source path of the imported module, if stated. May be relative to
    /// `base_dir`.
    pub source: Option<PathBuf>,
    /// Which bindings to import.
    pub bindings: BindingSpec,
    /// Local name the module is being bound under.
    pub module_name: String,
    /// Directory relative paths and source conventions resolve against.
    pub base_dir: PathBuf,
    /// Prefix prepended to every local alias, if any.
    pub prefix: Option<String>,
}

impl ImportRequest {
    /// A request with neither language nor source stated.
    pub fn new(module_name: &str, base_dir: impl Into<PathBuf>, bindings: BindingSpec) -> Self {
        Self {
            language: None,
            source: None,
            bindings,
            module_name: module_name.to_string(),
            base_dir: base_dir.into(),
            prefix: None,
        }
    }

    /// State the language.
    pub fn with_language(mut self, language: LangId) -> Self {
        self.language = Some(language);
        self
    }

    /// State the source path.
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Prefix every local alias.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }
}

/// A fully resolved import: language, absolute source, canonical bindings.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    /// Canonical language id.
    pub language: LangId,
    /// Absolute source path.
    pub source: PathBuf,
    /// Expanded, prefixed binding clauses.
    pub bindings: Vec<Binding>,
    /// Local name the module is bound under.
    pub module_name: String,
}

impl ImportPlan {
    /// Identity of the module this plan imports.
    pub fn module_id(&self) -> ModuleId {
        ModuleId::new(self.language.clone(), self.source.clone())
    }
}

/// Resolves import requests against the installed languages.
pub struct Resolver {
    languages: Arc<LanguageRegistry>,
}

impl Resolver {
    /// Create a resolver over the installed languages.
    pub fn new(languages: Arc<LanguageRegistry>) -> Self {
        Self { languages }
    }

    /// Resolve `request` into a plan.
    ///
    /// Case split on what the request states:
    /// 1. language and source: canonicalize both;
    /// 2. source only: infer the language from the source's extension;
    /// 3. language only: ask the language's source-naming convention;
    /// 4. neither: fails, nothing to infer from.
    ///
    /// Once both are fixed, the binding spec is expanded against them and the
    /// prefix applied last.
    pub fn resolve(&self, request: &ImportRequest) -> Result<ImportPlan, ResolveError> {
        let (language, source) = match (&request.language, &request.source) {
            (Some(lang), Some(source)) => {
                let language = self.lookup(lang)?;
                (language, absolutize(source, &request.base_dir))
            }
            (None, Some(source)) => {
                let source = absolutize(source, &request.base_dir);
                let language = self.languages.infer(&source).ok_or_else(|| {
                    ResolveError::MissingLanguage {
                        module_name: request.module_name.clone(),
                        detail: format!(
                            "no registered language claims '{}'",
                            source.display()
                        ),
                    }
                })?;
                (language, source)
            }
            (Some(lang), None) => {
                let language = self.lookup(lang)?;
                let source = language
                    .default_source(&request.module_name, &request.base_dir)
                    .ok_or_else(|| ResolveError::MissingSource {
                        module_name: request.module_name.clone(),
                        language: lang.clone(),
                    })?;
                (language, absolutize(&source, &request.base_dir))
            }
            (None, None) => {
                return Err(ResolveError::MissingLanguage {
                    module_name: request.module_name.clone(),
                    detail: "language or source required".to_string(),
                })
            }
        };

        let mut bindings = expand(&request.bindings, language.as_ref(), &source)?;
        apply_prefix(&mut bindings, request.prefix.as_deref());

        Ok(ImportPlan {
            language: language.id(),
            source,
            bindings,
            module_name: request.module_name.clone(),
        })
    }

    fn lookup(&self, id: &LangId) -> Result<Arc<dyn Language>, ResolveError> {
        self.languages
            .get(id)
            .ok_or_else(|| ResolveError::UnknownLanguage(id.clone()))
    }
}

/// Absolutize `path` against `base`, folding `.` and `..` lexically.
///
/// Resolution is lexical on purpose: the source file may not exist yet (the
/// build system will produce diagnostics for that), so no filesystem access
/// happens here.
fn absolutize(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
