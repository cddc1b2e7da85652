//! Backend Registry
//!
//! Creates sub-queue backends from their configured type name. Built-in
//! backends register themselves with the [`builtin_backend!`] macro and are
//! collected by [`BackendRegistry::with_builtins`]; tests and embedding
//! applications register their own factories with
//! [`BackendRegistry::register`].

use crate::queue::error::{QueueError, QueueResult};
use crate::queue::traits::SubQueue;
use inventory;
use std::collections::HashMap;
use std::sync::Arc;

/// Constructor of a backend
///
/// The factory receives the registry creating it, so routers can build their
/// own sub-queues from the same set of types.
pub type BackendFactory =
    Arc<dyn Fn(&BackendRegistry) -> QueueResult<Box<dyn SubQueue>> + Send + Sync>;

/// Entry for a builtin backend in the dynamic registry
pub struct BuiltinBackendEntry {
    pub type_name: &'static str,
    pub factory: fn(&BackendRegistry) -> QueueResult<Box<dyn SubQueue>>,
}

// Collect all builtin backend entries
inventory::collect!(BuiltinBackendEntry);

/// Macro for registering builtin backends
#[macro_export]
macro_rules! builtin_backend {
    ($type_name:expr, $factory_expr:expr) => {
        inventory::submit!($crate::queue::registry::BuiltinBackendEntry {
            type_name: $type_name,
            factory: $factory_expr
        });
    };
}

/// Name to factory map used to instantiate backends
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every builtin backend
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for entry in inventory::iter::<BuiltinBackendEntry>() {
            let factory = entry.factory;
            registry.register(entry.type_name, move |registry| factory(registry));
        }
        registry
    }

    /// Register a factory, replacing any previous one with the same name
    pub fn register<F>(&mut self, type_name: &str, factory: F)
    where
        F: Fn(&BackendRegistry) -> QueueResult<Box<dyn SubQueue>> + Send + Sync + 'static,
    {
        if self
            .factories
            .insert(type_name.to_string(), Arc::new(factory))
            .is_some()
        {
            log::debug!("Backend type '{}' registered again", type_name);
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Sorted list of the registered type names
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate a backend by type name
    pub fn create(&self, type_name: &str) -> QueueResult<Box<dyn SubQueue>> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| QueueError::BackendNotFound {
                type_name: type_name.to_string(),
            })?;

        factory(self).map_err(|e| match e {
            QueueError::BackendConstructionFailed { .. } => e,
            other => QueueError::BackendConstructionFailed {
                type_name: type_name.to_string(),
                cause: other.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::memory::{MemoryQueue, MEMORY_QUEUE_TYPE};

    #[test]
    fn test_builtins_include_memory_queue() {
        let registry = BackendRegistry::with_builtins();
        assert!(registry.contains(MEMORY_QUEUE_TYPE));

        let queue = registry.create(MEMORY_QUEUE_TYPE).unwrap();
        assert_eq!(queue.name(), MEMORY_QUEUE_TYPE);
    }

    #[test]
    fn test_builtins_include_routers() {
        let registry = BackendRegistry::with_builtins();
        let names = registry.type_names();
        for type_name in ["configurable", "fixed", MEMORY_QUEUE_TYPE] {
            assert!(names.iter().any(|name| name == type_name), "{}", type_name);
        }

        let router = registry.create("configurable").unwrap();
        assert!(router.name().starts_with("configurable."));
    }

    #[test]
    fn test_unknown_type() {
        let registry = BackendRegistry::new();
        match registry.create("sqlite") {
            Err(QueueError::BackendNotFound { type_name }) => assert_eq!(type_name, "sqlite"),
            Err(other) => panic!("Expected BackendNotFound, got {:?}", other),
            Ok(_) => panic!("Expected BackendNotFound"),
        }
    }

    #[test]
    fn test_factory_failure_is_wrapped() {
        let mut registry = BackendRegistry::new();
        registry.register("broken", |_| Err(QueueError::QueueFull { max_size: 0 }));

        match registry.create("broken") {
            Err(QueueError::BackendConstructionFailed { type_name, cause }) => {
                assert_eq!(type_name, "broken");
                assert!(cause.contains("full"));
            }
            Err(other) => panic!("Expected BackendConstructionFailed, got {:?}", other),
            Ok(_) => panic!("Expected BackendConstructionFailed"),
        }
    }

    #[test]
    fn test_register_and_list() {
        let mut registry = BackendRegistry::new();
        registry.register("b", |_| Ok(Box::new(MemoryQueue::new())));
        registry.register("a", |_| Ok(Box::new(MemoryQueue::with_max_size(2))));

        assert_eq!(registry.type_names(), vec!["a".to_string(), "b".to_string()]);
        assert!(registry.create("a").is_ok());
    }
}
