//! Import engine: plan construction and application
//!
//! `plan` resolves and expands a request into an immutable [`ImportPlan`];
//! `link` is the apply phase that claims the module name, registers the
//! dependency edge, validates the bindings (with rebuild recovery per the
//! configured policy), loads the module, installs per-site inline caches,
//! and attaches the rebuild-triggered refresh task.
//!
//! All process-wide state (claim table, cache registry) is owned by the
//! engine value and reset through it; there is no ambient global state.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use bindery_core::{
    validate, CacheRegistry, CallableCache, ClaimTable, InlineCache, Module, ModuleError,
    ModuleId, Value,
};

use crate::bindings::{AliasKind, Binding};
use crate::build::BuildSystem;
use crate::checker::{check_bindings, RecoveryPolicy};
use crate::error::EngineError;
use crate::language::LanguageRegistry;
use crate::resolver::{ImportPlan, ImportRequest, ResolveError, Resolver};

/// Engine construction options.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Recovery policy applied when a dynamically answered check fails.
    pub recovery: RecoveryPolicy,
}

/// One installed binding: its clause plus the per-site cache.
struct BoundName {
    binding: Binding,
    site: CacheSite,
}

enum CacheSite {
    Value(Arc<InlineCache>),
    Callable(CallableCache),
    /// Syntax transforms resolve once at link time; rebuilds cannot
    /// retroactively change already-expanded syntax.
    Syntax(Value),
}

struct LinkedInner {
    id: ModuleId,
    module: RwLock<Arc<Module>>,
    bindings: Vec<BoundName>,
    caches: Arc<CacheRegistry>,
}

/// A linked import: the live module handle plus its installed bindings.
///
/// Cheap to clone; clones share the same cells and module handle.
#[derive(Clone)]
pub struct LinkedImport {
    inner: Arc<LinkedInner>,
}

impl fmt::Debug for LinkedImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedImport")
            .field("id", &self.inner.id)
            .field("locals", &self.locals())
            .finish()
    }
}

impl LinkedImport {
    /// Identity of the imported module.
    pub fn id(&self) -> &ModuleId {
        &self.inner.id
    }

    /// The current module handle. Rebuilds swap this for a fresh one.
    pub fn module(&self) -> Arc<Module> {
        self.inner.module.read().clone()
    }

    /// Local names installed by this import, in clause order.
    pub fn locals(&self) -> Vec<&str> {
        self.inner
            .bindings
            .iter()
            .map(|bound| bound.binding.local.as_str())
            .collect()
    }

    /// The value bound under `local`, through the site's inline cache.
    pub fn value(&self, local: &str) -> Result<Value, ModuleError> {
        let bound = self.find(local)?;
        let module = self.module();
        match &bound.site {
            CacheSite::Value(cell) => {
                cell.load(&self.inner.caches, &module, &bound.binding.export)
            }
            CacheSite::Callable(cell) => {
                cell.load(&self.inner.caches, &module, &bound.binding.export)
            }
            CacheSite::Syntax(value) => Ok(value.clone()),
        }
    }

    /// Invoke the callable bound under `local`.
    pub fn call(&self, local: &str, args: &[Value]) -> Result<Value, ModuleError> {
        let bound = self.find(local)?;
        let module = self.module();
        match &bound.site {
            CacheSite::Callable(cell) => {
                cell.call(&self.inner.caches, &module, &bound.binding.export, args)
            }
            CacheSite::Value(cell) => {
                let value = cell.load(&self.inner.caches, &module, &bound.binding.export)?;
                match value {
                    Value::Callable(f) => Ok(f(args)),
                    Value::Data(_) => Err(self.not_callable(&bound.binding)),
                }
            }
            CacheSite::Syntax(_) => Err(self.not_callable(&bound.binding)),
        }
    }

    fn find(&self, local: &str) -> Result<&BoundName, ModuleError> {
        self.inner
            .bindings
            .iter()
            .find(|bound| bound.binding.local == local)
            .ok_or_else(|| ModuleError::NoSuchExport {
                module: self.inner.id.to_string(),
                name: local.to_string(),
            })
    }

    fn not_callable(&self, binding: &Binding) -> ModuleError {
        ModuleError::NotCallable {
            module: self.inner.id.to_string(),
            name: binding.export.clone(),
        }
    }
}

/// The import engine: installed languages, the build boundary, and the
/// process-wide runtime state.
pub struct ImportEngine {
    languages: Arc<LanguageRegistry>,
    build: Arc<dyn BuildSystem>,
    resolver: Resolver,
    caches: Arc<CacheRegistry>,
    claims: ClaimTable,
    options: EngineOptions,
}

impl ImportEngine {
    /// Create an engine with default options.
    pub fn new(languages: Arc<LanguageRegistry>, build: Arc<dyn BuildSystem>) -> Self {
        Self::with_options(languages, build, EngineOptions::default())
    }

    /// Create an engine with explicit options.
    pub fn with_options(
        languages: Arc<LanguageRegistry>,
        build: Arc<dyn BuildSystem>,
        options: EngineOptions,
    ) -> Self {
        Self {
            resolver: Resolver::new(languages.clone()),
            languages,
            build,
            caches: Arc::new(CacheRegistry::new()),
            claims: ClaimTable::new(),
            options,
        }
    }

    /// The cache registry owned by this engine.
    pub fn caches(&self) -> &Arc<CacheRegistry> {
        &self.caches
    }

    /// The claim table owned by this engine.
    pub fn claims(&self) -> &ClaimTable {
        &self.claims
    }

    /// Resolve and expand `request` into an immutable plan.
    ///
    /// Installs nothing. Export discovery for `All`-style specs may compile
    /// the module when the language cannot answer statically.
    pub fn plan(&self, request: &ImportRequest) -> Result<ImportPlan, EngineError> {
        Ok(self.resolver.resolve(request)?)
    }

    /// Apply `plan`: claim, validate, load, and install bindings.
    pub fn link(&self, plan: &ImportPlan) -> Result<LinkedImport, EngineError> {
        let id = plan.module_id();
        let language = self
            .languages
            .get(&plan.language)
            .ok_or_else(|| ResolveError::UnknownLanguage(plan.language.clone()))?;

        // Collision diagnostics only; never blocks the import.
        let _ = self.claims.claim(&plan.module_name, &id);

        self.build.record_dependency(&id);
        check_bindings(
            &language,
            &self.build,
            &id,
            &plan.bindings,
            self.options.recovery,
        )?;

        let module = self.build.require(&id)?;
        validate(&id, Some(&module))?;

        let bindings = plan
            .bindings
            .iter()
            .map(|binding| {
                let site = match binding.kind {
                    AliasKind::Value => CacheSite::Value(Arc::new(InlineCache::new())),
                    AliasKind::Callable => CacheSite::Callable(CallableCache::new()),
                    AliasKind::Syntax => CacheSite::Syntax(module.get(&binding.export)?),
                };
                Ok(BoundName {
                    binding: binding.clone(),
                    site,
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        let inner = Arc::new(LinkedInner {
            id,
            module: RwLock::new(module),
            bindings,
            caches: self.caches.clone(),
        });
        self.install_rebuild_task(&inner);

        Ok(LinkedImport { inner })
    }

    /// Convenience: `plan` then `link`.
    pub fn import(&self, request: &ImportRequest) -> Result<LinkedImport, EngineError> {
        let plan = self.plan(request)?;
        self.link(&plan)
    }

    /// Attach the rebuild-triggered refresh task for `inner`'s target.
    ///
    /// The hook holds only a weak reference to the import, so a discarded
    /// call site does not keep its bindings alive through the task registry.
    fn install_rebuild_task(&self, inner: &Arc<LinkedInner>) {
        let weak = Arc::downgrade(inner);
        let build = self.build.clone();
        let caches = self.caches.clone();
        let name = format!("refresh:{}", inner.id.target_name());

        self.build.define_task(
            &name,
            Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return Ok(());
                };

                // The task runs right after the target was rebuilt, so the
                // already-loaded handle is current; no freshness recheck.
                let fresh = build.require_cached(&inner.id)?;
                let changed = {
                    let current = inner.module.read();
                    !Arc::ptr_eq(&*current, &fresh)
                };
                if !changed {
                    return Ok(());
                }

                *inner.module.write() = fresh.clone();
                caches.invalidate(&inner.id);

                // Eagerly re-fill value and callable bindings from the fresh
                // handle. Callable sites go back through their
                // callable-asserting fill; syntax bindings stay as expanded.
                for bound in &inner.bindings {
                    match &bound.site {
                        CacheSite::Value(cell) => {
                            cell.load(&caches, &fresh, &bound.binding.export)?;
                        }
                        CacheSite::Callable(cell) => {
                            cell.load(&caches, &fresh, &bound.binding.export)?;
                        }
                        CacheSite::Syntax(_) => {}
                    }
                }
                Ok(())
            }),
        );
    }

    /// Drop all process-wide state: claims and cache registrations.
    ///
    /// Explicit lifecycle hook, e.g. before a full reload of the host.
    pub fn reset(&self) {
        self.claims.reset();
        self.caches.reset();
    }
}
