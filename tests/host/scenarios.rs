//! End to end host scenarios

use crate::common::{LinkDown, Listener, Sensor, Thermometer};
use modhost::context::api::ModuleId;
use modhost::host::api::{factory, HostError, ModuleHost};
use modhost::module::api::{LifecyclePhase, ModuleState};
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_base_type_subscription_receives_derived_messages() {
    let host = ModuleHost::new();
    let listener = Arc::new(Listener::new("m1", None));
    host.register_shared(listener.clone()).await.unwrap();
    host.start().await.unwrap();

    let report = host.bus().send(LinkDown { code: 7 }).await;
    assert_eq!(report.delivered, 1);
    assert_eq!(listener.codes(), vec![7]);
}

#[tokio::test]
async fn test_filtered_subscription_only_sees_matching_codes() {
    let host = ModuleHost::new();
    let listener = Arc::new(Listener::new("m1", Some(1)));
    host.register_shared(listener.clone()).await.unwrap();
    host.start().await.unwrap();

    let rejected = host.bus().send(LinkDown { code: 2 }).await;
    assert!(rejected.is_empty());
    assert!(listener.codes().is_empty());

    host.bus().send(LinkDown { code: 1 }).await;
    assert_eq!(listener.codes(), vec![1]);
}

#[tokio::test]
async fn test_failed_module_is_excluded_and_unresolvable() {
    let host = ModuleHost::new();
    let report = host
        .load(vec![
            factory(|| Listener::new("m1", None)),
            factory(|| Sensor::new("m2", 21.5).failing()),
        ])
        .await
        .unwrap();

    assert_eq!(report.loaded, vec![ModuleId::new("m1")]);
    let failure = report.failure_for("m2").unwrap();
    assert_eq!(failure.phase, LifecyclePhase::Initialize);
    assert!(failure.to_string().contains("sensor hardware missing"));

    assert_eq!(host.modules(), vec![ModuleId::new("m1")]);
    assert_eq!(host.module_state("m2"), Some(ModuleState::Faulted));
    assert!(host.resolve_one::<dyn Thermometer>().is_none());
}

#[tokio::test]
async fn test_module_does_not_resolve_its_own_capability() {
    let seen = Arc::new(Mutex::new(None));
    let record = Arc::clone(&seen);
    let host = ModuleHost::new();
    host.register(move || {
        Sensor::new("m1", 19.0).with_initializer(move |handle| {
            *record.lock().unwrap() = Some(handle.resolve_one::<dyn Thermometer>().is_some());
        })
    })
    .await
    .unwrap();
    host.start().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), Some(false));
    assert!(host.resolve_one::<dyn Thermometer>().is_some());
}

#[tokio::test]
async fn test_sensor_serves_the_requesting_module() {
    let served = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&served);
    let host = ModuleHost::new();
    host.register(|| Sensor::new("outdoor", 4.0)).await.unwrap();
    host.register(move || {
        Sensor::new("indoor", 21.0).with_initializer(move |handle| {
            for thermometer in handle.resolve_many::<dyn Thermometer>() {
                let reading = thermometer.invoke(|t| (t.celsius(), t.serving()));
                record.lock().unwrap().push(reading);
            }
        })
    })
    .await
    .unwrap();
    host.start().await.unwrap();

    assert_eq!(
        *served.lock().unwrap(),
        vec![(4.0, Some("indoor".to_string()))]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_teardown_racing_resolution_yields_consistent_snapshots() {
    let host = Arc::new(ModuleHost::new());
    host.register(|| Sensor::new("m1", 1.0)).await.unwrap();
    host.register(|| Sensor::new("m2", 2.0)).await.unwrap();
    host.start().await.unwrap();

    let reader = {
        let host = Arc::clone(&host);
        tokio::spawn(async move {
            let mut snapshots = Vec::new();
            for _ in 0..300 {
                let providers: Vec<String> = host
                    .resolve_many::<dyn Thermometer>()
                    .iter()
                    .map(|t| t.provider().to_string())
                    .collect();
                snapshots.push(providers);
                tokio::task::yield_now().await;
            }
            snapshots
        })
    };
    let shutdown = host.shutdown().await;
    assert_eq!(shutdown.unloaded, vec![ModuleId::new("m2"), ModuleId::new("m1")]);

    let full = ["m1".to_string(), "m2".to_string()];
    for providers in reader.await.unwrap() {
        assert_eq!(providers[..], full[..providers.len()]);
    }
    assert!(matches!(
        host.register(|| Sensor::new("m3", 3.0)).await,
        Err(HostError::InvalidState { .. })
    ));
}
