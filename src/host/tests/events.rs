use super::fixtures::{calls, Behavior, TestModule};
use crate::context::api::{CallerContext, ModuleId};
use crate::host::api::{LifecycleEvent, ModuleFaulted, ModuleHost};
use crate::messaging::api::Handler;
use crate::module::api::ModuleState;
use std::sync::{Arc, Mutex};

type Seen = Arc<Mutex<Vec<(String, ModuleState, Option<ModuleId>)>>>;

fn watch(host: &ModuleHost) -> Seen {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    host.bus()
        .subscribe(
            &ModuleId::new("watcher"),
            Handler::<dyn LifecycleEvent>::from_fn(move |event| {
                record.lock().unwrap().push((
                    event.module().to_string(),
                    event.state(),
                    CallerContext::current(),
                ));
                Ok(())
            }),
            None,
        )
        .unwrap();
    seen
}

#[tokio::test]
async fn test_lifecycle_events_are_published() {
    let calls = calls();
    let host = ModuleHost::new();
    let seen = watch(&host);

    host.register(|| TestModule::new("good", &calls)).await.unwrap();
    let _ = host
        .register(|| TestModule::new("bad", &calls).initialize(Behavior::Fail))
        .await;
    host.start().await.unwrap();
    host.shutdown().await;

    let events: Vec<_> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|(module, state, _)| (module.clone(), *state))
        .collect();
    assert_eq!(
        events,
        vec![
            ("bad".to_string(), ModuleState::Faulted),
            ("good".to_string(), ModuleState::PostInitialized),
            ("good".to_string(), ModuleState::Uninitialized),
        ]
    );

    // Handlers run as the subscribing module
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .all(|(_, _, caller)| caller == &Some(ModuleId::new("watcher"))));
}

#[tokio::test]
async fn test_fault_event_carries_the_failure() {
    let calls = calls();
    let host = ModuleHost::new();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&failures);
    host.bus()
        .subscribe(
            &ModuleId::new("watcher"),
            Handler::<ModuleFaulted>::from_fn(move |event| {
                record.lock().unwrap().push(event.failure.clone());
                Ok(())
            }),
            None,
        )
        .unwrap();

    let _ = host
        .register(|| TestModule::new("bad", &calls).initialize(Behavior::Fail))
        .await;

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].module, ModuleId::new("bad"));
    assert!(failures[0].to_string().contains("initialize refused"));
}

#[tokio::test]
async fn test_faulted_module_loses_its_subscriptions() {
    let calls = calls();
    let host = ModuleHost::new();
    let result = host
        .register(|| {
            TestModule::new("subscriber", &calls)
                .on_initialize(|handle| {
                    handle.subscribe(Handler::<dyn LifecycleEvent>::from_fn(|_| Ok(())), None)?;
                    Ok(())
                })
                .initialize(Behavior::Fail)
        })
        .await;

    assert!(result.is_err());
    assert_eq!(host.bus().subscription_count(&ModuleId::new("subscriber")), 0);
    assert!(!host.bus().is_observed::<dyn LifecycleEvent>());
}
