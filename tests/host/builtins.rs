//! Heartbeat and journal builtins running inside a host

use modhost::config::api::{ConfigStore, MemoryConfigStore};
use modhost::context::api::{CallerContext, ModuleId};
use modhost::host::api::ModuleHost;
use modhost::module::builtin::api::builtin_factories;
use modhost::module::builtin::heartbeat::HeartbeatModule;
use modhost::module::builtin::journal::Journal;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn fast_heartbeat_store() -> Arc<MemoryConfigStore> {
    let store = Arc::new(MemoryConfigStore::new());
    store
        .set(
            "modhost",
            "modules/heartbeat",
            "configuration",
            Some(json!({ "interval_ms": 20 })),
        )
        .unwrap();
    store
}

fn host_with(store: &Arc<MemoryConfigStore>) -> ModuleHost {
    ModuleHost::builder()
        .config_store(Arc::clone(store) as Arc<dyn ConfigStore>)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_journal_records_heartbeats_and_lifecycle() {
    let store = fast_heartbeat_store();
    let host = host_with(&store);

    let report = host.load(builtin_factories(&[])).await.unwrap();
    assert!(report.is_success());
    assert_eq!(
        report.loaded,
        vec![ModuleId::new("heartbeat"), ModuleId::new("journal")]
    );

    tokio::time::sleep(Duration::from_millis(200)).await;

    let journal = host.resolve_one::<dyn Journal>().unwrap();
    assert_eq!(journal.provider(), &ModuleId::new("journal"));
    assert!(journal.invoke(|j| j.heartbeats()) >= 2);

    let entries = journal.invoke(|j| j.entries());
    assert!(entries
        .iter()
        .any(|e| e.source.is_none() && e.text.contains("'heartbeat'")));
    assert!(entries
        .iter()
        .any(|e| e.source == Some(ModuleId::new("heartbeat"))));

    let shutdown = host.shutdown().await;
    assert!(shutdown.is_clean());

    let persisted = store
        .get("modhost", "modules/heartbeat/parameters", "sequence")
        .unwrap()
        .and_then(|v| v.as_u64())
        .unwrap();
    assert!(persisted >= 2);
}

#[tokio::test]
async fn test_journal_attributes_external_and_module_entries() {
    let host = ModuleHost::new();
    host.load(builtin_factories(&["heartbeat".to_string()]))
        .await
        .unwrap();
    assert_eq!(host.modules(), vec![ModuleId::new("journal")]);

    let external = host.resolve_one::<dyn Journal>().unwrap();
    external.invoke(|j| j.record("from outside"));

    let on_behalf = CallerContext::scope(Some(ModuleId::new("operator")), async {
        host.resolve_one::<dyn Journal>()
    })
    .await
    .unwrap();
    on_behalf.invoke(|j| j.record("from operator"));

    let entries = external.invoke(|j| j.entries());
    let outside = entries.iter().find(|e| e.text == "from outside").unwrap();
    let operator = entries.iter().find(|e| e.text == "from operator").unwrap();
    assert_eq!(outside.source, None);
    assert_eq!(operator.source, Some(ModuleId::new("operator")));

    host.shutdown().await;
}

#[tokio::test]
async fn test_heartbeat_resumes_its_sequence() {
    let store = fast_heartbeat_store();
    store
        .set(
            "modhost",
            "modules/heartbeat/parameters",
            "sequence",
            Some(json!(41)),
        )
        .unwrap();

    let host = host_with(&store);
    let heartbeat = Arc::new(HeartbeatModule::new());
    host.register_shared(heartbeat.clone()).await.unwrap();
    assert_eq!(heartbeat.sequence(), 41);

    host.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    host.shutdown().await;

    let persisted = store
        .get("modhost", "modules/heartbeat/parameters", "sequence")
        .unwrap()
        .and_then(|v| v.as_u64())
        .unwrap();
    assert!(persisted > 41);
    assert_eq!(persisted, heartbeat.sequence());
}
