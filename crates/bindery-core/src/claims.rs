//! Claimed-module diagnostics
//!
//! Tracks which source each local module name was last bound to. Rebinding a
//! name to a different source is usually a sign of a copy-paste slip or a
//! stale editor buffer, so it is logged, but it never blocks an import.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::module::ModuleId;

/// Process-wide map from local module-binding name to its claimed source.
///
/// Purely diagnostic: collisions warn, never error. Cleared only by an
/// explicit [`reset`](ClaimTable::reset), e.g. before a full reload.
#[derive(Debug, Default)]
pub struct ClaimTable {
    claims: Mutex<FxHashMap<String, ModuleId>>,
}

impl ClaimTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name` is bound to `id`.
    ///
    /// The check-then-set is atomic with respect to concurrent claims of the
    /// same name. Returns the previous claim when `name` was already bound to
    /// a different source, after logging a warning.
    pub fn claim(&self, name: &str, id: &ModuleId) -> Option<ModuleId> {
        let mut claims = self.claims.lock();
        let previous = claims.insert(name.to_string(), id.clone());
        match previous {
            Some(prev) if prev != *id => {
                tracing::warn!(
                    name,
                    old = %prev,
                    new = %id,
                    "module name rebound to a different source"
                );
                Some(prev)
            }
            _ => None,
        }
    }

    /// The source currently claimed by `name`, if any.
    pub fn claimed(&self, name: &str) -> Option<ModuleId> {
        self.claims.lock().get(name).cloned()
    }

    /// Number of claimed names.
    pub fn len(&self) -> usize {
        self.claims.lock().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.claims.lock().is_empty()
    }

    /// Drop all claims. Explicit process-lifecycle hook.
    pub fn reset(&self) {
        self.claims.lock().clear();
    }
}
