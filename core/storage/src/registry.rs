//! Store registry for resolving a backend from configuration.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::store::RecordStore;
use dadpass_common::{Error, Result};

/// Factory function type for creating stores.
pub type StoreFactory = Box<dyn Fn(&Value) -> Result<Arc<dyn RecordStore>> + Send + Sync>;

/// Registry for record store factories.
///
/// Backends are looked up by name and built from a JSON config object.
pub struct StoreRegistry {
    factories: HashMap<String, StoreFactory>,
}

impl StoreRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a store factory.
    ///
    /// # Errors
    /// - Returns `Config` if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: StoreFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::Config(format!(
                "Store '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a store by name and configuration.
    ///
    /// # Errors
    /// - Store not registered
    /// - Configuration invalid for the store
    pub fn resolve(&self, name: &str, config: &Value) -> Result<Arc<dyn RecordStore>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::Config(format!("Store '{}' is not registered", name)))?;
        factory(config)
    }

    /// Names of registered stores.
    pub fn stores(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a store is registered.
    pub fn has_store(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn required_str<'a>(config: &'a Value, field: &str, store: &str) -> Result<&'a str> {
    config
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Config(format!("{} store requires '{}'", store, field)))
}

/// Create a registry with the bundled stores: `memory`, `local`, `sqlite`.
pub fn create_default_registry() -> StoreRegistry {
    let mut factories: HashMap<String, StoreFactory> = HashMap::new();

    factories.insert(
        "memory".to_string(),
        Box::new(|_config| Ok(Arc::new(crate::memory::MemoryStore::new()))),
    );

    factories.insert(
        "local".to_string(),
        Box::new(|config| {
            let root = required_str(config, "root", "local")?;
            Ok(Arc::new(crate::local::LocalStore::new(root)?))
        }),
    );

    factories.insert(
        "sqlite".to_string(),
        Box::new(|config| {
            let path = required_str(config, "path", "sqlite")?;
            Ok(Arc::new(crate::sqlite::SqliteStore::open(path)?))
        }),
    );

    StoreRegistry { factories }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_register_and_resolve() {
        let mut registry = StoreRegistry::new();
        registry
            .register("test", Box::new(|_| Ok(Arc::new(MemoryStore::new()))))
            .unwrap();

        let store = registry.resolve("test", &Value::Null).unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = StoreRegistry::new();
        registry
            .register("test", Box::new(|_| Ok(Arc::new(MemoryStore::new()))))
            .unwrap();

        let result = registry.register("test", Box::new(|_| Ok(Arc::new(MemoryStore::new()))));
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let registry = StoreRegistry::new();
        assert!(matches!(
            registry.resolve("unknown", &Value::Null),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_default_registry_stores() {
        let registry = create_default_registry();
        assert_eq!(registry.stores(), vec!["local", "memory", "sqlite"]);
    }

    #[test]
    fn test_default_registry_requires_config() {
        let registry = create_default_registry();
        assert!(registry.resolve("local", &json!({})).is_err());
        assert!(registry.resolve("sqlite", &json!({ "path": 7 })).is_err());
    }

    #[test]
    fn test_default_registry_builds_backends() {
        let dir = tempfile::tempdir().unwrap();
        let registry = create_default_registry();

        let local = registry
            .resolve("local", &json!({ "root": dir.path().join("records") }))
            .unwrap();
        assert_eq!(local.name(), "local");

        let sqlite = registry
            .resolve("sqlite", &json!({ "path": dir.path().join("messages.db") }))
            .unwrap();
        assert_eq!(sqlite.name(), "sqlite");
    }
}
