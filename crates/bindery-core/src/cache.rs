//! Inline caches for module references
//!
//! Every lexical reference site owns one cache cell. The first access
//! resolves the export through the module's reference protocol, stores the
//! value, and records the cell as a weak dependent of the module in the
//! process-wide registry. Later accesses read the cell directly: no registry
//! lookup, no dispatch through the module representation. Reloading a module
//! invalidates every still-live cell filled from it, forcing a refill on the
//! next access.
//!
//! The registry holds weak references only. A cell whose owning call site has
//! been discarded is reclaimable even while the registry still lists it;
//! expired entries are pruned opportunistically during registration and
//! dropped during invalidation.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::module::{Module, ModuleError, ModuleId};
use crate::value::Value;

/// A per-call-site memo cell for one module reference.
///
/// Starts unbound. Owned by the call site as `Arc<InlineCache>`; the cell
/// lives exactly as long as the compiled code containing the site.
#[derive(Debug, Default)]
pub struct InlineCache {
    slot: RwLock<Option<Value>>,
}

impl InlineCache {
    /// Create an unbound cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the cell, filling it from `module` on first access.
    ///
    /// The filled fast path is a single uncontended read of the slot.
    pub fn load(
        self: &Arc<Self>,
        registry: &CacheRegistry,
        module: &Module,
        name: &str,
    ) -> Result<Value, ModuleError> {
        if let Some(value) = self.slot.read().clone() {
            return Ok(value);
        }
        self.fill(registry, module, name)
    }

    fn fill(
        self: &Arc<Self>,
        registry: &CacheRegistry,
        module: &Module,
        name: &str,
    ) -> Result<Value, ModuleError> {
        let computed = module.get(name)?;

        // A racing fill of the same cell wins; both readers observe one value.
        let value = {
            let mut slot = self.slot.write();
            match &*slot {
                Some(existing) => existing.clone(),
                None => {
                    *slot = Some(computed.clone());
                    computed
                }
            }
        };

        registry.register(module.id(), self);
        Ok(value)
    }

    /// Current contents, without filling.
    pub fn peek(&self) -> Option<Value> {
        self.slot.read().clone()
    }

    /// Reset the cell to unbound.
    pub(crate) fn clear(&self) {
        *self.slot.write() = None;
    }
}

/// An inline cache whose contents are guaranteed callable.
///
/// The callable check runs once at fill time, so call sites invoke the cached
/// entry point without a per-call type check. A non-callable export fails the
/// fill and is not left cached.
#[derive(Debug, Default)]
pub struct CallableCache {
    cell: Arc<InlineCache>,
}

impl CallableCache {
    /// Create an unbound callable cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the cell, filling and type-checking on first access.
    pub fn load(
        &self,
        registry: &CacheRegistry,
        module: &Module,
        name: &str,
    ) -> Result<Value, ModuleError> {
        let value = self.cell.load(registry, module, name)?;
        if value.is_callable() {
            Ok(value)
        } else {
            self.cell.clear();
            Err(ModuleError::NotCallable {
                module: module.id().to_string(),
                name: name.to_string(),
            })
        }
    }

    /// Invoke the cached entry point.
    pub fn call(
        &self,
        registry: &CacheRegistry,
        module: &Module,
        name: &str,
        args: &[Value],
    ) -> Result<Value, ModuleError> {
        match self.load(registry, module, name)? {
            Value::Callable(f) => Ok(f(args)),
            Value::Data(_) => Err(ModuleError::NotCallable {
                module: module.id().to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Current contents, without filling.
    pub fn peek(&self) -> Option<Value> {
        self.cell.peek()
    }
}

/// Process-wide registry of filled cells, keyed by module identity.
///
/// Registration and invalidation for one module are mutually exclusive
/// (per-key locking); fills of different cells for the same module serialize
/// only this bookkeeping, never the value computation.
#[derive(Debug, Default)]
pub struct CacheRegistry {
    filled: DashMap<ModuleId, Vec<Weak<InlineCache>>>,
}

impl CacheRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `cell` as filled from the module `id`.
    ///
    /// Deduplicates by cell identity and prunes entries whose weak reference
    /// has already expired.
    fn register(&self, id: &ModuleId, cell: &Arc<InlineCache>) {
        let mut bucket = self.filled.entry(id.clone()).or_default();
        bucket.retain(|weak| weak.strong_count() > 0);

        let ptr = Arc::as_ptr(cell);
        if bucket.iter().all(|weak| Weak::as_ptr(weak) != ptr) {
            bucket.push(Arc::downgrade(cell));
        }
    }

    /// Reset every still-live cell filled from `id` back to unbound.
    ///
    /// Returns the number of live cells cleared; expired entries are dropped.
    pub fn invalidate(&self, id: &ModuleId) -> usize {
        let Some((_, cells)) = self.filled.remove(id) else {
            return 0;
        };

        let mut cleared = 0;
        for weak in cells {
            if let Some(cell) = weak.upgrade() {
                cell.clear();
                cleared += 1;
            }
        }
        tracing::debug!(module = %id, cleared, "invalidated inline caches");
        cleared
    }

    /// Number of cells currently registered for `id`, expired entries included.
    pub fn tracked(&self, id: &ModuleId) -> usize {
        self.filled.get(id).map(|bucket| bucket.len()).unwrap_or(0)
    }

    /// Drop all registrations. Explicit process-lifecycle hook.
    pub fn reset(&self) {
        self.filled.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::module::{LangId, ModuleRepr};

    fn test_id() -> ModuleId {
        ModuleId::new(LangId::new("toy"), "/src/lib.toy")
    }

    /// Module whose lookups are counted, to observe cache fills.
    fn counting_module(counter: Arc<AtomicUsize>) -> Module {
        Module::new(
            test_id(),
            ModuleRepr::Callable(Arc::new(move |name| {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(Value::data(name.to_string()))
            })),
        )
    }

    #[test]
    fn test_second_read_hits_cache() {
        let counter = Arc::new(AtomicUsize::new(0));
        let module = counting_module(counter.clone());
        let registry = CacheRegistry::new();
        let cell = Arc::new(InlineCache::new());

        let first = cell.load(&registry, &module, "x").unwrap();
        let second = cell.load(&registry, &module, "x").unwrap();

        assert!(Value::same_value(&first, &second));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate_forces_exactly_one_refill() {
        let counter = Arc::new(AtomicUsize::new(0));
        let module = counting_module(counter.clone());
        let registry = CacheRegistry::new();
        let cell = Arc::new(InlineCache::new());

        cell.load(&registry, &module, "x").unwrap();
        assert_eq!(registry.invalidate(&test_id()), 1);
        assert!(cell.peek().is_none());

        cell.load(&registry, &module, "x").unwrap();
        cell.load(&registry, &module, "x").unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_unknown_module_is_noop() {
        let registry = CacheRegistry::new();
        assert_eq!(registry.invalidate(&test_id()), 0);
    }

    #[test]
    fn test_dropped_cell_is_not_counted() {
        let counter = Arc::new(AtomicUsize::new(0));
        let module = counting_module(counter);
        let registry = CacheRegistry::new();

        let cell = Arc::new(InlineCache::new());
        cell.load(&registry, &module, "x").unwrap();
        assert_eq!(registry.tracked(&test_id()), 1);

        drop(cell);
        assert_eq!(registry.invalidate(&test_id()), 0);
    }

    #[test]
    fn test_registration_dedupes_by_cell() {
        let counter = Arc::new(AtomicUsize::new(0));
        let module = counting_module(counter);
        let registry = CacheRegistry::new();
        let cell = Arc::new(InlineCache::new());

        cell.load(&registry, &module, "x").unwrap();
        registry.invalidate(&test_id());
        cell.load(&registry, &module, "x").unwrap();
        cell.load(&registry, &module, "x").unwrap();

        assert_eq!(registry.tracked(&test_id()), 1);
    }

    #[test]
    fn test_expired_entries_pruned_on_register() {
        let counter = Arc::new(AtomicUsize::new(0));
        let module = counting_module(counter);
        let registry = CacheRegistry::new();

        let dead = Arc::new(InlineCache::new());
        dead.load(&registry, &module, "x").unwrap();
        drop(dead);
        assert_eq!(registry.tracked(&test_id()), 1);

        let live = Arc::new(InlineCache::new());
        live.load(&registry, &module, "y").unwrap();
        assert_eq!(registry.tracked(&test_id()), 1);
    }

    #[test]
    fn test_callable_cache_rejects_data() {
        let module = Module::new(
            test_id(),
            ModuleRepr::Callable(Arc::new(|_| Some(Value::data(1i64)))),
        );
        let registry = CacheRegistry::new();
        let cell = CallableCache::new();

        let err = cell.load(&registry, &module, "x").unwrap_err();
        assert!(matches!(err, ModuleError::NotCallable { .. }));
        assert!(cell.peek().is_none());
    }

    #[test]
    fn test_callable_cache_invokes() {
        let module = Module::new(
            test_id(),
            ModuleRepr::Callable(Arc::new(|_| {
                Some(Value::callable(|args| {
                    let a = args[0].downcast_ref::<i64>().copied().unwrap_or(0);
                    let b = args[1].downcast_ref::<i64>().copied().unwrap_or(0);
                    Value::data(a + b)
                }))
            })),
        );
        let registry = CacheRegistry::new();
        let cell = CallableCache::new();

        let sum = cell
            .call(&registry, &module, "add", &[Value::data(2i64), Value::data(3i64)])
            .unwrap();
        assert_eq!(sum.downcast_ref::<i64>(), Some(&5));
    }
}
