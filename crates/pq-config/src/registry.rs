use parking_lot::Mutex;
use pq_error::PqError;
use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    sync::Arc,
};
use thiserror::Error;

pub trait Injectable: Any + Send + Sync + Clone {}

/// Service locator used to thread shared components (a catalog handle, a
/// codebook cache) through `Configurable::try_from_config` without every
/// config struct needing a constructor argument for each one.
///
/// Values are cloned on retrieval; store cheaply-clonable, shared-state types
/// (an `Arc<Inner>` wrapper) rather than owning data directly.
#[derive(Default)]
pub struct Registry {
    storage: Arc<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Type [{0}] not found in the registry")]
    TypeNotFound(String),
}

impl PqError for RegistryError {
    fn code(&self) -> pq_error::ErrorCodes {
        pq_error::ErrorCodes::Internal
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn register<T: Injectable>(&self, value: T) {
        let mut storage = self.storage.lock();
        storage.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Injectable>(&self) -> Result<T, RegistryError> {
        let storage = self.storage.lock();
        storage
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| RegistryError::TypeNotFound(type_name::<T>().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Default)]
    struct TestInjectable {
        inner: Arc<AtomicUsize>,
    }

    impl Injectable for TestInjectable {}

    #[test]
    fn registry_returns_same_value() {
        let registry = Registry::new();
        registry.register(TestInjectable::default());
        let retrieved = registry
            .get::<TestInjectable>()
            .expect("TestInjectable was registered");
        retrieved
            .inner
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let retrieved_again = registry.get::<TestInjectable>().unwrap();
        assert_eq!(
            retrieved_again.inner.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[test]
    fn registry_missing_type_errors() {
        let registry = Registry::new();
        assert!(registry.get::<TestInjectable>().is_err());
    }
}
