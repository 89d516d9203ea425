//! Bindery import engine
//!
//! A language-agnostic module and import engine layered on an incremental
//! build system. Code written under any installed source language exposes
//! named bindings (values, callable entry points, syntax-level transforms);
//! consumer code imports a subset of them by explicit list, by set
//! expression, or wholesale, with the guarantees that:
//! - requested bindings actually exist in the target module,
//! - stale compiled artifacts can be rebuilt when the check fails,
//! - repeated lookups are amortized through per-call-site inline caches
//!   that are invalidated when the module is reloaded.
//!
//! Control flow: [`Resolver`] → binding expansion ([`bindings`]) →
//! [`checker`] (consulting the language's export oracle, possibly driving a
//! rebuild) → module reference (`bindery-core`) → inline caches.
//!
//! Language front ends and the build system itself are collaborators behind
//! the [`Language`] and [`BuildSystem`] traits.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bindings;
pub mod build;
pub mod checker;
pub mod engine;
pub mod error;
pub mod language;
pub mod resolver;

pub use bindings::{
    apply_prefix, expand, AliasKind, Binding, BindingSpec, ExpandError, ImportSet, RawBinding,
};
pub use build::{BuildError, BuildSystem, RebuildHook};
pub use checker::{check_bindings, CheckError, RebuildAction, RecoveryPolicy};
pub use engine::{EngineOptions, ImportEngine, LinkedImport};
pub use error::EngineError;
pub use language::{ExportAnswer, Language, LanguageError, LanguageRegistry};
pub use resolver::{ImportPlan, ImportRequest, ResolveError, Resolver};
