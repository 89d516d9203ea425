//! Binding specifications and expansion
//!
//! Turns the binding half of an import specification into the canonical list
//! of clauses the import will install: which export, bound under which local
//! name, as which kind. Expansion of `All`-style specs discovers the export
//! list through the language; explicit lists are canonicalized without any
//! oracle contact, so expansion-time errors stay distinguishable from
//! validation-time errors raised later by the checker.

use std::path::Path;

use indexmap::IndexSet;
use thiserror::Error;

use crate::language::{Language, LanguageError};

/// Errors from binding-spec expansion
#[derive(Debug, Error)]
pub enum ExpandError {
    /// An import-set expression referenced a name the module does not export
    #[error("unknown export '{name}' (available: {available:?})")]
    UnknownExport {
        /// The name the expression asked for
        name: String,
        /// The names the expression could have asked for
        available: Vec<String>,
    },

    /// Export discovery failed inside the language plugin
    #[error(transparent)]
    Language(#[from] LanguageError),
}

/// How a binding is installed at the importing site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasKind {
    /// Plain value binding; refreshed when the module is rebuilt.
    Value,
    /// Callable binding, invoked directly; refreshed when the module is
    /// rebuilt.
    Callable,
    /// Syntax-level transform; resolved once at expansion time and never
    /// refreshed, since already-expanded syntax cannot change retroactively.
    Syntax,
}

/// Canonical binding clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Name in the exporting module's namespace.
    pub export: String,
    /// Local name the value is bound under.
    pub local: String,
    /// Kind of the local binding.
    pub kind: AliasKind,
}

impl Binding {
    /// Create a clause.
    pub fn new(export: impl Into<String>, local: impl Into<String>, kind: AliasKind) -> Self {
        Self {
            export: export.into(),
            local: local.into(),
            kind,
        }
    }

    /// A value clause bound under the exported name itself.
    pub fn value(export: &str) -> Self {
        Self::new(export, export, AliasKind::Value)
    }
}

/// One clause of an explicit binding list, before canonicalization.
#[derive(Debug, Clone)]
pub enum RawBinding {
    /// A bare name: bind as a value under the same name.
    Name(String),
    /// A callable-tagged name.
    Callable(String),
    /// A syntax-tagged name.
    Syntax(String),
    /// A renamed clause; the alias carries its own kind.
    Renamed {
        /// Exported name.
        name: String,
        /// Local alias.
        alias: String,
        /// Kind of the alias.
        kind: AliasKind,
    },
}

/// Set-algebra expression over a module's export names.
///
/// Expressions are evaluated against the oracle's reported export list and
/// preserve its order. Operations act on the *local* names of their operand,
/// so a rename is visible to an enclosing subset or exclusion.
#[derive(Debug, Clone)]
pub enum ImportSet {
    /// Every name the module exports.
    All,
    /// Subset of `from`, keeping only `names`.
    Only {
        /// Operand expression.
        from: Box<ImportSet>,
        /// Local names to keep.
        names: Vec<String>,
    },
    /// `from` minus `names`.
    Except {
        /// Operand expression.
        from: Box<ImportSet>,
        /// Local names to drop.
        names: Vec<String>,
    },
    /// `from` with entries renamed.
    Rename {
        /// Operand expression.
        from: Box<ImportSet>,
        /// `(old local name, new local name)` pairs.
        renames: Vec<(String, String)>,
    },
    /// Union of both operand sets.
    Union(Box<ImportSet>, Box<ImportSet>),
}

/// The binding half of an import specification.
#[derive(Debug, Clone)]
pub enum BindingSpec {
    /// Every export, each bound as a value.
    All,
    /// Every export, each bound as a callable.
    AllAsCallables,
    /// A set-algebra expression over the export list.
    Set(ImportSet),
    /// An explicit clause list; expansion never consults the oracle.
    Explicit(Vec<RawBinding>),
}

/// Expand `spec` into canonical bindings for `(language, source)`.
///
/// `All`, `AllAsCallables` and `Set` need the export list; when the language
/// cannot answer statically, the dynamic query is forced even though it may
/// compile the module. Static-only avoidance of compilation is reserved for
/// the explicit-list case, where the checker gives better error locality.
pub fn expand(
    spec: &BindingSpec,
    language: &dyn Language,
    source: &Path,
) -> Result<Vec<Binding>, ExpandError> {
    match spec {
        BindingSpec::All => Ok(discovered_exports(language, source)?
            .iter()
            .map(|name| Binding::new(name.clone(), name.clone(), AliasKind::Value))
            .collect()),
        BindingSpec::AllAsCallables => Ok(discovered_exports(language, source)?
            .iter()
            .map(|name| Binding::new(name.clone(), name.clone(), AliasKind::Callable))
            .collect()),
        BindingSpec::Set(expr) => {
            let exports = discovered_exports(language, source)?;
            let pairs = eval_import_set(expr, &exports)?;
            Ok(pairs
                .into_iter()
                .map(|(export, local)| Binding::new(export, local, AliasKind::Value))
                .collect())
        }
        BindingSpec::Explicit(raw) => Ok(raw.iter().map(canonical).collect()),
    }
}

/// Prepend `prefix` to every local alias.
///
/// A pure rename: alias kinds are preserved, exported names untouched, and
/// `None` is the identity.
pub fn apply_prefix(bindings: &mut [Binding], prefix: Option<&str>) {
    if let Some(prefix) = prefix {
        for binding in bindings {
            binding.local = format!("{prefix}{}", binding.local);
        }
    }
}

fn canonical(raw: &RawBinding) -> Binding {
    match raw {
        RawBinding::Name(name) => Binding::new(name, name, AliasKind::Value),
        RawBinding::Callable(name) => Binding::new(name, name, AliasKind::Callable),
        RawBinding::Syntax(name) => Binding::new(name, name, AliasKind::Syntax),
        RawBinding::Renamed { name, alias, kind } => Binding::new(name, alias, *kind),
    }
}

fn discovered_exports(
    language: &dyn Language,
    source: &Path,
) -> Result<IndexSet<String>, ExpandError> {
    let answer = language.static_exports(source)?;
    if answer.known {
        Ok(answer.names)
    } else {
        Ok(language.dynamic_exports(source)?)
    }
}

/// Evaluate a set expression to ordered `(export, local)` pairs.
fn eval_import_set(
    expr: &ImportSet,
    exports: &IndexSet<String>,
) -> Result<Vec<(String, String)>, ExpandError> {
    match expr {
        ImportSet::All => Ok(exports
            .iter()
            .map(|name| (name.clone(), name.clone()))
            .collect()),
        ImportSet::Only { from, names } => {
            let pairs = eval_import_set(from, exports)?;
            require_known(names, &pairs)?;
            Ok(pairs
                .into_iter()
                .filter(|(_, local)| names.contains(local))
                .collect())
        }
        ImportSet::Except { from, names } => {
            let pairs = eval_import_set(from, exports)?;
            require_known(names, &pairs)?;
            Ok(pairs
                .into_iter()
                .filter(|(_, local)| !names.contains(local))
                .collect())
        }
        ImportSet::Rename { from, renames } => {
            let pairs = eval_import_set(from, exports)?;
            let old_names: Vec<String> = renames.iter().map(|(old, _)| old.clone()).collect();
            require_known(&old_names, &pairs)?;
            Ok(pairs
                .into_iter()
                .map(|(export, local)| {
                    let renamed = renames
                        .iter()
                        .find(|(old, _)| *old == local)
                        .map(|(_, new)| new.clone())
                        .unwrap_or(local);
                    (export, renamed)
                })
                .collect())
        }
        ImportSet::Union(a, b) => {
            let mut pairs = eval_import_set(a, exports)?;
            for pair in eval_import_set(b, exports)? {
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
            Ok(pairs)
        }
    }
}

fn require_known(names: &[String], pairs: &[(String, String)]) -> Result<(), ExpandError> {
    for name in names {
        if !pairs.iter().any(|(_, local)| local == name) {
            return Err(ExpandError::UnknownExport {
                name: name.clone(),
                available: pairs.iter().map(|(_, local)| local.clone()).collect(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bindery_core::LangId;

    use super::*;
    use crate::language::ExportAnswer;

    /// Oracle stub with counters, so tests can observe which query ran.
    struct StubLang {
        exports: Vec<&'static str>,
        known: bool,
        static_calls: AtomicUsize,
        dynamic_calls: AtomicUsize,
    }

    impl StubLang {
        fn new(exports: Vec<&'static str>, known: bool) -> Self {
            Self {
                exports,
                known,
                static_calls: AtomicUsize::new(0),
                dynamic_calls: AtomicUsize::new(0),
            }
        }

        fn names(&self) -> IndexSet<String> {
            self.exports.iter().map(|s| s.to_string()).collect()
        }
    }

    impl Language for StubLang {
        fn id(&self) -> LangId {
            LangId::new("toy")
        }

        fn extensions(&self) -> &[&str] {
            &["toy"]
        }

        fn static_exports(&self, _source: &Path) -> Result<ExportAnswer, LanguageError> {
            self.static_calls.fetch_add(1, Ordering::SeqCst);
            if self.known {
                Ok(ExportAnswer::known(self.names()))
            } else {
                Ok(ExportAnswer::unknown())
            }
        }

        fn dynamic_exports(&self, _source: &Path) -> Result<IndexSet<String>, LanguageError> {
            self.dynamic_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.names())
        }
    }

    fn source() -> PathBuf {
        PathBuf::from("/src/lib.toy")
    }

    #[test]
    fn test_all_yields_value_clauses_in_oracle_order() {
        let lang = StubLang::new(vec!["a", "b", "c"], true);
        let bindings = expand(&BindingSpec::All, &lang, &source()).unwrap();

        assert_eq!(
            bindings,
            vec![
                Binding::value("a"),
                Binding::value("b"),
                Binding::value("c")
            ]
        );
        assert_eq!(lang.dynamic_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_all_as_callables_kind() {
        let lang = StubLang::new(vec!["f", "g"], true);
        let bindings = expand(&BindingSpec::AllAsCallables, &lang, &source()).unwrap();

        assert_eq!(bindings.len(), 2);
        assert!(bindings.iter().all(|b| b.kind == AliasKind::Callable));
    }

    #[test]
    fn test_all_forces_dynamic_query_when_unknown() {
        let lang = StubLang::new(vec!["x"], false);
        let bindings = expand(&BindingSpec::All, &lang, &source()).unwrap();

        assert_eq!(bindings, vec![Binding::value("x")]);
        assert_eq!(lang.static_calls.load(Ordering::SeqCst), 1);
        assert_eq!(lang.dynamic_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_never_touches_oracle() {
        let lang = StubLang::new(vec![], true);
        let spec = BindingSpec::Explicit(vec![
            RawBinding::Name("x".to_string()),
            RawBinding::Callable("f".to_string()),
            RawBinding::Syntax("m".to_string()),
            RawBinding::Renamed {
                name: "y".to_string(),
                alias: "z".to_string(),
                kind: AliasKind::Callable,
            },
        ]);

        let bindings = expand(&spec, &lang, &source()).unwrap();
        assert_eq!(
            bindings,
            vec![
                Binding::new("x", "x", AliasKind::Value),
                Binding::new("f", "f", AliasKind::Callable),
                Binding::new("m", "m", AliasKind::Syntax),
                Binding::new("y", "z", AliasKind::Callable),
            ]
        );
        assert_eq!(lang.static_calls.load(Ordering::SeqCst), 0);
        assert_eq!(lang.dynamic_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_import_set_only_and_except() {
        let lang = StubLang::new(vec!["a", "b", "c"], true);

        let only = BindingSpec::Set(ImportSet::Only {
            from: Box::new(ImportSet::All),
            names: vec!["a".to_string(), "c".to_string()],
        });
        let bindings = expand(&only, &lang, &source()).unwrap();
        assert_eq!(bindings, vec![Binding::value("a"), Binding::value("c")]);

        let except = BindingSpec::Set(ImportSet::Except {
            from: Box::new(ImportSet::All),
            names: vec!["b".to_string()],
        });
        let bindings = expand(&except, &lang, &source()).unwrap();
        assert_eq!(bindings, vec![Binding::value("a"), Binding::value("c")]);
    }

    #[test]
    fn test_import_set_rename_feeds_enclosing_ops() {
        let lang = StubLang::new(vec!["a", "b"], true);

        // Rename a -> x, then keep only x: the subset sees the renamed name.
        let spec = BindingSpec::Set(ImportSet::Only {
            from: Box::new(ImportSet::Rename {
                from: Box::new(ImportSet::All),
                renames: vec![("a".to_string(), "x".to_string())],
            }),
            names: vec!["x".to_string()],
        });

        let bindings = expand(&spec, &lang, &source()).unwrap();
        assert_eq!(bindings, vec![Binding::new("a", "x", AliasKind::Value)]);
    }

    #[test]
    fn test_import_set_union_dedupes() {
        let lang = StubLang::new(vec!["a", "b"], true);

        let spec = BindingSpec::Set(ImportSet::Union(
            Box::new(ImportSet::Only {
                from: Box::new(ImportSet::All),
                names: vec!["a".to_string()],
            }),
            Box::new(ImportSet::All),
        ));

        let bindings = expand(&spec, &lang, &source()).unwrap();
        assert_eq!(bindings, vec![Binding::value("a"), Binding::value("b")]);
    }

    #[test]
    fn test_import_set_unknown_name() {
        let lang = StubLang::new(vec!["a"], true);

        let spec = BindingSpec::Set(ImportSet::Only {
            from: Box::new(ImportSet::All),
            names: vec!["missing".to_string()],
        });

        let err = expand(&spec, &lang, &source()).unwrap_err();
        match err {
            ExpandError::UnknownExport { name, available } => {
                assert_eq!(name, "missing");
                assert_eq!(available, vec!["a".to_string()]);
            }
            other => panic!("expected UnknownExport, got {other:?}"),
        }
    }

    #[test]
    fn test_prefix_is_pure_rename() {
        let mut bindings = vec![
            Binding::new("a", "a", AliasKind::Value),
            Binding::new("f", "f", AliasKind::Callable),
            Binding::new("m", "mm", AliasKind::Syntax),
        ];

        apply_prefix(&mut bindings, Some("lib/"));
        assert_eq!(
            bindings,
            vec![
                Binding::new("a", "lib/a", AliasKind::Value),
                Binding::new("f", "lib/f", AliasKind::Callable),
                Binding::new("m", "lib/mm", AliasKind::Syntax),
            ]
        );
    }

    #[test]
    fn test_no_prefix_is_identity() {
        let mut bindings = vec![Binding::value("a")];
        let before = bindings.clone();
        apply_prefix(&mut bindings, None);
        assert_eq!(bindings, before);
    }
}
