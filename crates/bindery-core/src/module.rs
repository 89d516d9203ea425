//! Module representation and reference protocol
//!
//! A loaded module is one of a closed set of concrete representations behind
//! a single variant type. `get` and `exports` dispatch exhaustively over the
//! variants, so adding a representation is a deliberate change rather than ad
//! hoc runtime type inspection. Module identity is the `(language, source)`
//! pair, never object identity: two loads of the same pair are the same
//! module for caching and claim tracking, and a reload is observable as a new
//! `Arc` carrying the same id.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::value::Value;

/// Errors from the module reference protocol
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Requested export is not present in the module
    #[error("module '{module}' has no export named '{name}'")]
    NoSuchExport {
        /// The module that was referenced
        module: String,
        /// The export that was requested
        name: String,
    },

    /// The representation offers no export enumeration
    #[error("'{0}' is not an enumerable module")]
    NotAModule(String),

    /// Module object absent or malformed
    #[error("invalid module object for '{0}'")]
    InvalidModule(String),

    /// A callable binding resolved to a non-callable value
    #[error("export '{name}' of module '{module}' is not callable")]
    NotCallable {
        /// The module that was referenced
        module: String,
        /// The export that was requested
        name: String,
    },
}

/// Canonical identifier of a source language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LangId(Arc<str>);

impl LangId {
    /// Create a language id from its canonical name.
    pub fn new(id: &str) -> Self {
        LangId(Arc::from(id))
    }

    /// The canonical name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LangId {
    fn from(id: &str) -> Self {
        LangId::new(id)
    }
}

impl fmt::Display for LangId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a compiled unit: `(language, absolute source path)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId {
    /// Language the unit is written in.
    pub language: LangId,
    /// Absolute path of the source file.
    pub source: PathBuf,
}

impl ModuleId {
    /// Create a module id.
    pub fn new(language: LangId, source: impl Into<PathBuf>) -> Self {
        Self {
            language,
            source: source.into(),
        }
    }

    /// The build-target name this unit is known by at the build boundary.
    pub fn target_name(&self) -> String {
        format!("{}:{}", self.language, self.source.display())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.language, self.source.display())
    }
}

/// Lookup function backing callable and table representations.
pub type LookupFn = Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// Distinguished export name of a single-default-value module.
pub const DEFAULT_EXPORT: &str = "default";

/// Concrete module representations.
pub enum ModuleRepr {
    /// Bare lookup function. Cannot enumerate its exports; a language that
    /// wants enumeration wraps it in a `Table`.
    Callable(LookupFn),
    /// Associative mapping from export name to value.
    Map(FxHashMap<String, Value>),
    /// Structured export table: an ordered export list plus a lookup function.
    Table {
        /// Export names in declaration order.
        exports: IndexSet<String>,
        /// Resolves one export name to its value.
        lookup: LookupFn,
    },
    /// Single-default-value module; only [`DEFAULT_EXPORT`] is valid.
    Default(Value),
}

impl fmt::Debug for ModuleRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleRepr::Callable(_) => f.write_str("ModuleRepr::Callable(..)"),
            ModuleRepr::Map(map) => write!(f, "ModuleRepr::Map({} entries)", map.len()),
            ModuleRepr::Table { exports, .. } => {
                write!(f, "ModuleRepr::Table({} exports)", exports.len())
            }
            ModuleRepr::Default(_) => f.write_str("ModuleRepr::Default(..)"),
        }
    }
}

/// A loaded module: identity plus representation, shared as `Arc<Module>`.
#[derive(Debug)]
pub struct Module {
    id: ModuleId,
    repr: ModuleRepr,
}

impl Module {
    /// Create a module from its identity and representation.
    pub fn new(id: ModuleId, repr: ModuleRepr) -> Self {
        Self { id, repr }
    }

    /// The module's identity.
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Resolve one export to its value.
    pub fn get(&self, name: &str) -> Result<Value, ModuleError> {
        let value = match &self.repr {
            ModuleRepr::Callable(lookup) => lookup(name),
            ModuleRepr::Map(map) => map.get(name).cloned(),
            ModuleRepr::Table { lookup, .. } => lookup(name),
            ModuleRepr::Default(value) if name == DEFAULT_EXPORT => Some(value.clone()),
            ModuleRepr::Default(_) => None,
        };
        value.ok_or_else(|| ModuleError::NoSuchExport {
            module: self.id.to_string(),
            name: name.to_string(),
        })
    }

    /// Enumerate the module's export names, in the representation's order.
    ///
    /// A bare `Callable` has no enumeration and fails with `NotAModule`.
    pub fn exports(&self) -> Result<IndexSet<String>, ModuleError> {
        match &self.repr {
            ModuleRepr::Callable(_) => Err(ModuleError::NotAModule(self.id.to_string())),
            ModuleRepr::Map(map) => Ok(map.keys().cloned().collect()),
            ModuleRepr::Table { exports, .. } => Ok(exports.clone()),
            ModuleRepr::Default(_) => Ok(std::iter::once(DEFAULT_EXPORT.to_string()).collect()),
        }
    }
}

/// Gate against binding to a malformed module object.
///
/// Fails with `InvalidModule` when the module is absent, otherwise forces one
/// export enumeration so a non-enumerable representation surfaces
/// `NotAModule` here instead of at an arbitrary later reference.
pub fn validate(id: &ModuleId, module: Option<&Arc<Module>>) -> Result<(), ModuleError> {
    let module = module.ok_or_else(|| ModuleError::InvalidModule(id.to_string()))?;
    module.exports().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_id() -> ModuleId {
        ModuleId::new(LangId::new("toy"), "/src/lib.toy")
    }

    fn map_module() -> Module {
        let mut map = FxHashMap::default();
        map.insert("add".to_string(), Value::data(1i64));
        map.insert("sub".to_string(), Value::data(2i64));
        Module::new(test_id(), ModuleRepr::Map(map))
    }

    #[test]
    fn test_map_get_and_exports() {
        let module = map_module();
        assert_eq!(module.get("add").unwrap().downcast_ref::<i64>(), Some(&1));

        let exports = module.exports().unwrap();
        assert!(exports.contains("add"));
        assert!(exports.contains("sub"));
        assert_eq!(exports.len(), 2);
    }

    #[test]
    fn test_missing_export() {
        let module = map_module();
        let err = module.get("mul").unwrap_err();
        assert!(matches!(err, ModuleError::NoSuchExport { name, .. } if name == "mul"));
    }

    #[test]
    fn test_table_preserves_order() {
        let exports: IndexSet<String> = ["c", "a", "b"].iter().map(|s| s.to_string()).collect();
        let module = Module::new(
            test_id(),
            ModuleRepr::Table {
                exports,
                lookup: Arc::new(|name| Some(Value::data(name.to_string()))),
            },
        );

        let names: Vec<_> = module.exports().unwrap().into_iter().collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert!(module.get("a").is_ok());
    }

    #[test]
    fn test_default_module_single_key() {
        let module = Module::new(test_id(), ModuleRepr::Default(Value::data(7i64)));

        assert_eq!(
            module.get(DEFAULT_EXPORT).unwrap().downcast_ref::<i64>(),
            Some(&7)
        );
        assert!(matches!(
            module.get("anything"),
            Err(ModuleError::NoSuchExport { .. })
        ));

        let exports: Vec<_> = module.exports().unwrap().into_iter().collect();
        assert_eq!(exports, vec![DEFAULT_EXPORT.to_string()]);
    }

    #[test]
    fn test_callable_module_not_enumerable() {
        let module = Module::new(
            test_id(),
            ModuleRepr::Callable(Arc::new(|name| {
                (name == "dyn").then(|| Value::data(0i64))
            })),
        );

        assert!(module.get("dyn").is_ok());
        assert!(matches!(module.exports(), Err(ModuleError::NotAModule(_))));
    }

    #[test]
    fn test_validate() {
        let id = test_id();
        assert!(matches!(
            validate(&id, None),
            Err(ModuleError::InvalidModule(_))
        ));

        let ok = Arc::new(map_module());
        assert!(validate(&id, Some(&ok)).is_ok());

        let opaque = Arc::new(Module::new(
            test_id(),
            ModuleRepr::Callable(Arc::new(|_| None)),
        ));
        assert!(matches!(
            validate(&id, Some(&opaque)),
            Err(ModuleError::NotAModule(_))
        ));
    }
}
