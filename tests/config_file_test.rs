use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use warden::registry::ServiceRegistry;
use warden::store::{JsonFileStore, ServiceStore};
use warden::{WardenError, WardenSettings};

#[test]
fn test_load_toml_settings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("warden.toml");
    fs::write(
        &path,
        r#"
store_path = "/var/lib/warden/apis_config.json"
sample_interval_secs = 15
disk_mount = "/data"

[logging]
level = "debug"
log_file = "/var/log/warden.log"
"#,
    )
    .unwrap();

    let settings = WardenSettings::from_file(&path).unwrap();

    assert_eq!(
        settings.store_path,
        PathBuf::from("/var/lib/warden/apis_config.json")
    );
    assert_eq!(settings.sample_interval_secs, 15);
    assert_eq!(settings.disk_mount, PathBuf::from("/data"));
    assert_eq!(settings.reconcile_interval_secs, 60);
    assert_eq!(settings.history_capacity, 1000);
    assert_eq!(settings.logging.level, "debug");
    assert_eq!(
        settings.logging.log_file,
        Some(PathBuf::from("/var/log/warden.log"))
    );
}

#[test]
fn test_load_json_settings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("warden.json");
    fs::write(&path, r#"{"reconcile_interval_secs": 5, "stop_grace_secs": 3}"#).unwrap();

    let settings = WardenSettings::from_file(&path).unwrap();

    assert_eq!(settings.reconcile_interval_secs, 5);
    assert_eq!(settings.stop_grace_secs, 3);
    assert_eq!(settings.sample_interval_secs, 30);
}

#[test]
fn test_zero_interval_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("warden.toml");
    fs::write(&path, "sample_interval_secs = 0\n").unwrap();

    let result = WardenSettings::from_file(&path);

    assert!(matches!(result, Err(WardenError::ConfigValidation(_))));
}

#[test]
fn test_missing_settings_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = WardenSettings::load_or_default(&dir.path().join("absent.toml")).unwrap();

    assert_eq!(settings, WardenSettings::default());
}

#[tokio::test]
async fn test_registry_reads_existing_service_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("apis_config.json");
    fs::write(
        &path,
        r#"{
  "users-api": {
    "name": "users-api",
    "path": "/srv/users",
    "port": 8001,
    "command": "python app.py --port 8001",
    "auto_restart": true,
    "health_check_url": "http://localhost:8001/health",
    "env_vars": {"DEBUG": "0"}
  },
  "worker": {
    "name": "worker",
    "path": "/srv/worker",
    "port": 9000,
    "command": "node worker.js",
    "auto_restart": false,
    "health_check_url": null,
    "env_vars": null
  }
}"#,
    )
    .unwrap();

    let registry = ServiceRegistry::open(JsonFileStore::new(&path));

    assert_eq!(registry.names().await, vec!["users-api", "worker"]);

    let users = registry.get("users-api").await.unwrap();
    assert_eq!(users.port, 8001);
    assert_eq!(users.env_vars.get("DEBUG").map(String::as_str), Some("0"));

    let worker = registry.get("worker").await.unwrap();
    assert!(!worker.auto_restart);
    assert!(worker.health_check_url.is_none());
    assert!(worker.env_vars.is_empty());
}

#[tokio::test]
async fn test_corrupt_service_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("apis_config.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        JsonFileStore::new(&path).load_all(),
        Err(WardenError::PersistenceFailure(_))
    ));

    let registry = ServiceRegistry::open(JsonFileStore::new(&path));
    assert!(registry.is_empty().await);
}
