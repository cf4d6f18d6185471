// Registry module - Desired configuration of every known service

use crate::config::ServiceConfig;
use crate::error::{Result, WardenError};
use crate::store::ServiceStore;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Mapping of service name to desired configuration
///
/// The in-memory map is authoritative. Every mutation is handed to the store;
/// a failed save is reported to the caller but the mutation stays applied.
pub struct ServiceRegistry {
    services: RwLock<BTreeMap<String, ServiceConfig>>,
    store: Box<dyn ServiceStore>,
}

impl ServiceRegistry {
    /// Create a registry and load whatever the store currently holds
    pub fn open<S: ServiceStore + 'static>(store: S) -> Self {
        let services = match store.load_all() {
            Ok(services) => {
                info!("Loaded {} service(s) from registry store", services.len());
                services
            }
            Err(e) => {
                warn!("Starting with an empty registry: {}", e);
                BTreeMap::new()
            }
        };

        Self {
            services: RwLock::new(services),
            store: Box::new(store),
        }
    }

    /// Insert or replace a service configuration and persist the full set
    pub async fn register(&self, config: ServiceConfig) -> Result<()> {
        config.validate()?;

        let mut services = self.services.write().await;
        let name = config.name.clone();
        let replaced = services.insert(name.clone(), config).is_some();

        if replaced {
            info!("Service {} updated", name);
        } else {
            info!("Service {} registered", name);
        }

        self.persist(&services)
    }

    /// Remove a service configuration and persist the full set
    ///
    /// Callers must have stopped the service's process first; the supervisor's
    /// `deregister` does both under the service's lock.
    pub async fn deregister(&self, name: &str) -> Result<ServiceConfig> {
        let mut services = self.services.write().await;
        let removed = services
            .remove(name)
            .ok_or_else(|| WardenError::NotFound(name.to_string()))?;

        info!("Service {} removed", name);

        self.persist(&services)?;
        Ok(removed)
    }

    pub async fn get(&self, name: &str) -> Option<ServiceConfig> {
        self.services.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.services.read().await.contains_key(name)
    }

    /// Snapshot of every configuration, ordered by name
    pub async fn list(&self) -> Vec<ServiceConfig> {
        self.services.read().await.values().cloned().collect()
    }

    pub async fn names(&self) -> Vec<String> {
        self.services.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.services.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.services.read().await.is_empty()
    }

    fn persist(&self, services: &BTreeMap<String, ServiceConfig>) -> Result<()> {
        self.store.save_all(services).map_err(|e| {
            error!("Failed to persist registry: {}", e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonFileStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Store whose saves always fail
    struct BrokenStore {
        saves: Arc<AtomicUsize>,
    }

    impl ServiceStore for BrokenStore {
        fn load_all(&self) -> Result<BTreeMap<String, ServiceConfig>> {
            Err(WardenError::PersistenceFailure("disk on fire".to_string()))
        }

        fn save_all(&self, _services: &BTreeMap<String, ServiceConfig>) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Err(WardenError::PersistenceFailure("read-only filesystem".to_string()))
        }
    }

    fn config(name: &str) -> ServiceConfig {
        ServiceConfig::new(name, "/tmp", 9000, "sleep 30")
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let registry = ServiceRegistry::open(JsonFileStore::new(temp_dir.path().join("r.json")));

        registry.register(config("api")).await.unwrap();

        assert!(registry.contains("api").await);
        assert_eq!(registry.get("api").await.unwrap().port, 9000);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_replaces_existing() {
        let temp_dir = TempDir::new().unwrap();
        let registry = ServiceRegistry::open(JsonFileStore::new(temp_dir.path().join("r.json")));

        registry.register(config("api")).await.unwrap();
        let mut updated = config("api");
        updated.port = 9100;
        registry.register(updated).await.unwrap();

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get("api").await.unwrap().port, 9100);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let registry = ServiceRegistry::open(JsonFileStore::new(temp_dir.path().join("r.json")));

        let result = registry.register(config("")).await;
        assert!(matches!(result, Err(WardenError::MissingConfigField(_))));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_registry_reloads_from_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("r.json");

        {
            let registry = ServiceRegistry::open(JsonFileStore::new(&path));
            registry.register(config("b")).await.unwrap();
            registry.register(config("a")).await.unwrap();
        }

        let registry = ServiceRegistry::open(JsonFileStore::new(&path));
        assert_eq!(registry.names().await, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_deregister() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("r.json");
        let registry = ServiceRegistry::open(JsonFileStore::new(&path));

        registry.register(config("api")).await.unwrap();
        let removed = registry.deregister("api").await.unwrap();

        assert_eq!(removed.name, "api");
        assert!(!registry.contains("api").await);
        assert!(JsonFileStore::new(&path).load_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deregister_unknown() {
        let temp_dir = TempDir::new().unwrap();
        let registry = ServiceRegistry::open(JsonFileStore::new(temp_dir.path().join("r.json")));

        let result = registry.deregister("ghost").await;
        assert!(matches!(result, Err(WardenError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_memory_state() {
        let saves = Arc::new(AtomicUsize::new(0));
        let registry = ServiceRegistry::open(BrokenStore {
            saves: Arc::clone(&saves),
        });

        // Load failed, registry starts empty
        assert!(registry.is_empty().await);

        let result = registry.register(config("api")).await;
        assert!(matches!(result, Err(WardenError::PersistenceFailure(_))));
        assert!(registry.contains("api").await);

        let result = registry.deregister("api").await;
        assert!(matches!(result, Err(WardenError::PersistenceFailure(_))));
        assert!(!registry.contains("api").await);

        assert_eq!(saves.load(Ordering::SeqCst), 2);
    }
}
