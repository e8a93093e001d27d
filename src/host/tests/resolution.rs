use super::fixtures::{calls, Greeter, TestModule};
use crate::context::api::{CallerContext, ModuleId};
use crate::host::api::ModuleHost;
use crate::module::api::ModuleError;
use std::sync::{Arc, Mutex};

fn providers(found: &[crate::locator::api::Attributed<dyn Greeter>]) -> Vec<String> {
    found.iter().map(|a| a.provider().to_string()).collect()
}

#[tokio::test]
async fn test_resolve_many_in_registration_order() {
    let calls = calls();
    let host = ModuleHost::new();
    for name in ["p1", "p2", "p3"] {
        host.register(|| TestModule::new(name, &calls).greeting(name))
            .await
            .unwrap();
    }

    let found = host.resolve_many::<dyn Greeter>();
    assert_eq!(providers(&found), vec!["p1", "p2", "p3"]);
    assert!(found.iter().all(|a| a.caller().is_none()));

    let first = host.resolve_one::<dyn Greeter>().unwrap();
    assert_eq!(first.provider(), &ModuleId::new("p1"));
    assert_eq!(first.invoke(|g| g.greet()), "p1");
}

#[tokio::test]
async fn test_module_never_resolves_itself() {
    let calls = calls();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let host = ModuleHost::new();

    host.register(|| TestModule::new("other", &calls).greeting("hello"))
        .await
        .unwrap();
    let record = Arc::clone(&seen);
    host.register(move || {
        TestModule::new("self", &calls)
            .greeting("me")
            .on_post_initialize(move |handle| {
                let found = handle.resolve_many::<dyn Greeter>();
                record.lock().unwrap().extend(providers(&found));
                Ok(())
            })
    })
    .await
    .unwrap();
    host.start().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["other".to_string()]);
}

#[tokio::test]
async fn test_resolve_one_without_providers_is_none() {
    let calls = calls();
    let host = ModuleHost::new();
    host.register(|| {
        TestModule::new("lonely", &calls)
            .greeting("hi")
            .on_initialize(|handle| match handle.resolve_one::<dyn Greeter>() {
                None => Ok(()),
                Some(found) => Err(ModuleError::failed(format!(
                    "unexpected provider {}",
                    found.provider()
                ))),
            })
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_calls_are_attributed_to_the_requesting_module() {
    let calls = calls();
    let seen = Arc::new(Mutex::new(None));
    let host = ModuleHost::new();

    host.register(|| TestModule::new("provider", &calls).greeting("hi"))
        .await
        .unwrap();
    let record = Arc::clone(&seen);
    host.register(move || {
        TestModule::new("requester", &calls).on_post_initialize(move |handle| {
            let greeter = handle
                .resolve_one::<dyn Greeter>()
                .ok_or_else(|| ModuleError::failed("no greeter"))?;
            assert_eq!(greeter.caller(), Some(&ModuleId::new("requester")));
            *record.lock().unwrap() = greeter.invoke(|g| g.seen_caller());
            Ok(())
        })
    })
    .await
    .unwrap();
    host.start().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), Some(ModuleId::new("requester")));
}

#[tokio::test]
async fn test_nested_calls_keep_the_outer_caller() {
    let calls = calls();
    let host = ModuleHost::new();
    host.register(|| TestModule::new("inner", &calls).greeting("inner"))
        .await
        .unwrap();

    let greeter = CallerContext::scope(Some(ModuleId::new("outer")), async {
        host.resolve_one::<dyn Greeter>()
    })
    .await
    .unwrap();
    assert_eq!(greeter.caller(), Some(&ModuleId::new("outer")));

    // A second hop made while serving the first keeps the original caller
    let nested = greeter.invoke(|_| host.resolve_one::<dyn Greeter>()).unwrap();
    assert_eq!(nested.caller(), Some(&ModuleId::new("outer")));
    assert_eq!(nested.invoke(|g| g.seen_caller()), Some(ModuleId::new("outer")));

    let seen = greeter
        .invoke_async(|g| async move { g.seen_caller() })
        .await;
    assert_eq!(seen, Some(ModuleId::new("outer")));
    assert_eq!(CallerContext::current(), None);
}

#[tokio::test]
async fn test_reserved_capability_is_never_resolved() {
    let calls = calls();
    let host = ModuleHost::builder().reserve::<dyn Greeter>().build().unwrap();
    host.register(|| TestModule::new("hidden", &calls).greeting("psst"))
        .await
        .unwrap();

    assert!(host.resolve_one::<dyn Greeter>().is_none());
    assert!(host.module_statuses()[0].capabilities.is_empty());
}

#[tokio::test]
async fn test_resolution_is_empty_after_shutdown() {
    let calls = calls();
    let host = ModuleHost::new();
    host.register(|| TestModule::new("gone", &calls).greeting("bye"))
        .await
        .unwrap();
    host.start().await.unwrap();
    assert_eq!(host.resolve_many::<dyn Greeter>().len(), 1);

    host.shutdown().await;
    assert!(host.resolve_many::<dyn Greeter>().is_empty());
    assert!(host.resolve_one::<dyn Greeter>().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resolution_during_shutdown_sees_a_prefix() {
    let calls = calls();
    let host = Arc::new(ModuleHost::new());
    let names: Vec<String> = (0..8).map(|i| format!("p{i}")).collect();
    for name in &names {
        host.register(|| TestModule::new(name, &calls).greeting(name))
            .await
            .unwrap();
    }
    host.start().await.unwrap();

    let reader = {
        let host = Arc::clone(&host);
        tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..500 {
                seen.push(providers(&host.resolve_many::<dyn Greeter>()));
                tokio::task::yield_now().await;
            }
            seen
        })
    };

    host.shutdown().await;
    for snapshot in reader.await.unwrap() {
        assert_eq!(snapshot[..], names[..snapshot.len()]);
    }
}
