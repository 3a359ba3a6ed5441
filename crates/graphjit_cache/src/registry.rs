//! Process-wide shared resources, keyed by container and name.
//!
//! Used to hand every caller on a device the same `CompilationCache`.

use ahash::AHashMap;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

use crate::cache::CompilationCache;
use crate::compiler::Compiler;
use crate::error::{CompileError, Result};

/// Container under which compilation caches are registered
pub const CACHE_CONTAINER: &str = "graphjit";

type Resource = Arc<dyn Any + Send + Sync>;
type Slot = Arc<OnceCell<Resource>>;

#[derive(Default)]
pub struct ResourceRegistry {
    slots: RwLock<AHashMap<(String, String), Slot>>,
}

pub static GLOBAL_RESOURCE_REGISTRY: Lazy<ResourceRegistry> = Lazy::new(ResourceRegistry::default);

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static ResourceRegistry {
        &GLOBAL_RESOURCE_REGISTRY
    }

    /// Return the resource stored under `(container, name)`, creating it with `factory`
    /// if there is none yet.
    ///
    /// Concurrent callers for the same key wait for a single `factory` run. If it fails
    /// nothing is stored and the next call tries again.
    pub fn lookup_or_create<T, F>(&self, container: &str, name: &str, factory: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T>,
    {
        let slot = self.slot(container, name);
        let resource = slot.get_or_try_init(|| {
            debug!(container, name, "creating shared resource");
            factory().map(|value| Arc::new(value) as Resource)
        })?;
        Self::downcast(container, name, Arc::clone(resource))
    }

    /// Existing resource only; `None` if absent, still being created, or of another type
    pub fn lookup<T: Any + Send + Sync>(&self, container: &str, name: &str) -> Option<Arc<T>> {
        let key = (container.to_string(), name.to_string());
        let slot = self.slots.read().get(&key).cloned()?;
        let resource = slot.get()?;
        Arc::clone(resource).downcast::<T>().ok()
    }

    /// Forget a resource. Holders of its `Arc` keep it alive.
    pub fn remove(&self, container: &str, name: &str) -> bool {
        let key = (container.to_string(), name.to_string());
        self.slots.write().remove(&key).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    fn slot(&self, container: &str, name: &str) -> Slot {
        let key = (container.to_string(), name.to_string());
        if let Some(slot) = self.slots.read().get(&key) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(key).or_default())
    }

    fn downcast<T: Any + Send + Sync>(container: &str, name: &str, resource: Resource) -> Result<Arc<T>> {
        resource.downcast::<T>().map_err(|_| {
            CompileError::invalid_argument(format!(
                "resource {container}/{name} exists with a different type"
            ))
        })
    }
}

/// The compilation cache for `device_type`, created by `make` on first use
pub fn shared_compilation_cache<C, F>(
    registry: &ResourceRegistry,
    device_type: &str,
    make: F,
) -> Result<Arc<CompilationCache<C>>>
where
    C: Compiler,
    F: FnOnce() -> Result<CompilationCache<C>>,
{
    registry.lookup_or_create(CACHE_CONTAINER, device_type, make)
}
