//! Module configuration and parameters persisted through the TOML store

use modhost::config::api::{ConfigStore, TomlConfigStore};
use modhost::host::api::{HostConfig, HostError, ModuleHost};
use modhost::module::builtin::heartbeat::HeartbeatModule;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_parameters_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.toml");
    std::fs::write(
        &path,
        "[modhost.\"modules/heartbeat\"]\nconfiguration = { interval_ms = 10 }\n",
    )
    .unwrap();

    let first_run = {
        let store = TomlConfigStore::open(&path).unwrap();
        let host = ModuleHost::builder()
            .config_store(Arc::new(store) as Arc<dyn ConfigStore>)
            .build()
            .unwrap();
        let heartbeat = Arc::new(HeartbeatModule::new());
        host.register_shared(heartbeat.clone()).await.unwrap();
        host.start().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        host.shutdown().await;
        heartbeat.sequence()
    };
    assert!(first_run > 0);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("modules/heartbeat/parameters"));
    assert!(contents.contains("interval_ms = 10"));

    let reopened = TomlConfigStore::open(&path).unwrap();
    let host = ModuleHost::builder()
        .config_store(Arc::new(reopened) as Arc<dyn ConfigStore>)
        .build()
        .unwrap();
    let heartbeat = Arc::new(HeartbeatModule::new());
    host.register_shared(heartbeat.clone()).await.unwrap();
    assert_eq!(heartbeat.sequence(), first_run);
    host.shutdown().await;
}

#[tokio::test]
async fn test_host_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("modhost.toml");
    std::fs::write(
        &path,
        "[host]\nconfig_root = \"lab\"\ninitialize_timeout_ms = 500\n",
    )
    .unwrap();

    let config = HostConfig::load(&path).await.unwrap();
    assert_eq!(config.config_root, "lab");
    assert_eq!(config.initialize_timeout_ms, 500);
    assert_eq!(config.uninitialize_timeout_ms, HostConfig::default().uninitialize_timeout_ms);

    let missing = HostConfig::load(&dir.path().join("absent.toml")).await;
    assert!(matches!(missing, Err(HostError::ConfigFile { .. })));

    std::fs::write(&path, "[host]\nlog_message_limit = 4\n").unwrap();
    assert!(matches!(
        HostConfig::load(&path).await,
        Err(HostError::InvalidConfig { .. })
    ));
}
