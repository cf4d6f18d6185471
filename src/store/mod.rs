// Store module - Durable copy of the service registry

use crate::config::ServiceConfig;
use crate::error::{Result, WardenError};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Persistence hand-off for the service registry
///
/// The registry calls `save_all` after every mutation and `load_all` once at
/// startup. Implementations report failures as `PersistenceFailure`.
pub trait ServiceStore: Send + Sync {
    fn load_all(&self) -> Result<BTreeMap<String, ServiceConfig>>;

    fn save_all(&self, services: &BTreeMap<String, ServiceConfig>) -> Result<()>;
}

/// JSON file store: one object mapping service name to its configuration
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ServiceStore for JsonFileStore {
    fn load_all(&self) -> Result<BTreeMap<String, ServiceConfig>> {
        // A registry that was never saved is empty, not broken
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let file = File::open(&self.path).map_err(|e| {
            WardenError::PersistenceFailure(format!("Failed to open registry file: {}", e))
        })?;

        let services: BTreeMap<String, ServiceConfig> =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                WardenError::PersistenceFailure(format!("Failed to parse registry file: {}", e))
            })?;

        for (key, config) in &services {
            if key != &config.name {
                return Err(WardenError::PersistenceFailure(format!(
                    "Registry entry '{}' holds service named '{}'",
                    key, config.name
                )));
            }
        }

        Ok(services)
    }

    fn save_all(&self, services: &BTreeMap<String, ServiceConfig>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    WardenError::PersistenceFailure(format!(
                        "Failed to create registry directory: {}",
                        e
                    ))
                })?;
            }
        }

        // Write to a temporary file first, then rename over the real one
        let temp_path = self.path.with_extension("tmp");

        {
            let file = File::create(&temp_path).map_err(|e| {
                WardenError::PersistenceFailure(format!(
                    "Failed to create temp registry file: {}",
                    e
                ))
            })?;

            let mut writer = BufWriter::new(file);

            serde_json::to_writer_pretty(&mut writer, services).map_err(|e| {
                WardenError::PersistenceFailure(format!("Failed to serialize registry: {}", e))
            })?;

            writer.flush().map_err(|e| {
                WardenError::PersistenceFailure(format!("Failed to flush registry file: {}", e))
            })?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            WardenError::PersistenceFailure(format!("Failed to rename temp registry file: {}", e))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn services(names: &[&str]) -> BTreeMap<String, ServiceConfig> {
        names
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    ServiceConfig::new(*name, "/tmp", 8000, "sleep 30"),
                )
            })
            .collect()
    }

    #[test]
    fn test_load_nonexistent_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("apis_config.json"));

        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("apis_config.json"));

        let mut saved = services(&["auth", "billing"]);
        saved.get_mut("auth").unwrap().env_vars.insert("MODE".into(), "prod".into());
        store.save_all(&saved).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_save_replaces_previous_contents() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("apis_config.json"));

        store.save_all(&services(&["a", "b"])).unwrap();
        store.save_all(&services(&["c"])).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["c"]);
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("apis_config.json");
        let store = JsonFileStore::new(&path);

        store.save_all(&services(&["a"])).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_load_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("apis_config.json");
        fs::write(&path, "{ not json").unwrap();

        let result = JsonFileStore::new(&path).load_all();
        assert!(matches!(result, Err(WardenError::PersistenceFailure(_))));
    }

    #[test]
    fn test_load_mismatched_key() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("apis_config.json");
        fs::write(
            &path,
            r#"{"alias": {"name": "real", "path": ".", "port": 1, "command": "true"}}"#,
        )
        .unwrap();

        let result = JsonFileStore::new(&path).load_all();
        assert!(matches!(result, Err(WardenError::PersistenceFailure(_))));
    }

    #[test]
    fn test_load_apis_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("apis_config.json");
        fs::write(
            &path,
            r#"{
  "orders": {
    "name": "orders",
    "path": "/srv/orders",
    "port": 8080,
    "command": "python app.py",
    "auto_restart": true,
    "health_check_url": "http://localhost:8080/health",
    "env_vars": null
  }
}"#,
        )
        .unwrap();

        let loaded = JsonFileStore::new(&path).load_all().unwrap();
        let orders = &loaded["orders"];
        assert_eq!(orders.port, 8080);
        assert_eq!(
            orders.health_check_url.as_deref(),
            Some("http://localhost:8080/health")
        );
    }
}
