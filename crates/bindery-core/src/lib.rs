//! Bindery core runtime
//!
//! This crate provides the runtime half of the bindery import engine:
//! - Module representation and the polymorphic reference protocol
//! - Per-call-site inline caches with a weak-referenced invalidation registry
//! - Claimed-module collision diagnostics
//!
//! The planning half (resolution, expansion, validation, build integration)
//! lives in `bindery-engine`.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cache;
pub mod claims;
pub mod module;
pub mod value;

pub use cache::{CacheRegistry, CallableCache, InlineCache};
pub use claims::ClaimTable;
pub use module::{
    validate, LangId, LookupFn, Module, ModuleError, ModuleId, ModuleRepr, DEFAULT_EXPORT,
};
pub use value::{CallFn, Value};
