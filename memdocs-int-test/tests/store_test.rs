use memdocs::collection::{ChangeKind, ChangeListener, ChangeSignal, Document};
use memdocs::doc;
use memdocs::errors::{DocsResult, ErrorKind};
use memdocs::query::DocsQuery;
use memdocs::store::{to_collection_paths, ArrayUnion, Fixture, StoreBuilder};
use memdocs_int_test::test_util::{
    cleanup, create_delayed_test_context, create_test_context, run_test, wait_until, ITEMS,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_create_assigns_next_id() {
    run_test(
        || create_test_context(),
        |ctx| {
            let id = ctx.store().create(ITEMS, doc! { "name": "c" })?;
            assert_eq!(id, "2");
            assert_eq!(ctx.store().get(ITEMS)?["2"], doc! { "id": "2", "name": "c" });
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_created_document_reaches_live_query() {
    run_test(
        || create_test_context(),
        |ctx| {
            let seen: Arc<Mutex<Vec<Vec<Document>>>> = Arc::new(Mutex::new(Vec::new()));
            let sink = seen.clone();
            let _subscription = ctx.service().value_changes(DocsQuery::new(ITEMS), move |result: DocsResult<Vec<Document>>| {
                sink.lock().unwrap().push(result.unwrap());
            })?;

            let id = ctx.service().create(ITEMS, doc! { "name": "c" })?;
            wait_until(|| {
                seen.lock()
                    .unwrap()
                    .last()
                    .map(|docs| docs.iter().any(|d| d.id().as_deref() == Some(id.as_str())))
                    .unwrap_or(false)
            });
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_create_waits_for_latency() {
    run_test(
        || create_delayed_test_context(Duration::from_millis(150)),
        |ctx| {
            let start = Instant::now();
            ctx.store().create(ITEMS, doc! { "name": "slow" })?;
            assert!(start.elapsed() >= Duration::from_millis(150));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_deleted_ids_are_not_reused() {
    run_test(
        || create_test_context(),
        |ctx| {
            let store = ctx.store();
            store.delete_by_id("/items/0")?;
            let id = store.create(ITEMS, doc! { "name": "c" })?;
            assert_eq!(id, "2");
            assert_eq!(store.get(ITEMS)?.len(), 2);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_partial_update_preserves_fields() {
    run_test(
        || create_test_context(),
        |ctx| {
            let store = ctx.store();
            store.update_by_id("/items/0", Some(&doc! { "name": "aa" }), None)?;
            let union = ArrayUnion::new().field("tag", vec!["x", "z"]);
            store.update_by_id("/items/1", None, Some(&union))?;

            let items = store.get(ITEMS)?;
            assert_eq!(items["0"], doc! { "id": "0", "name": "aa", "tag": "x" });
            assert_eq!(items["1"], doc! { "id": "1", "name": "b", "tag": ["y", "x", "z"] });
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_replace_forces_path_id() {
    run_test(
        || create_test_context(),
        |ctx| {
            let store = ctx.store();
            store.replace_by_id("/items/1", doc! { "id": "99", "name": "z" })?;
            let query = DocsQuery::new(ITEMS).start_after(doc! { "id": "0" });
            let result = ctx.service().get(&query)?;
            assert_eq!(result, vec![doc! { "id": "1", "name": "z" }]);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_delete_is_idempotent_and_announced() {
    run_test(
        || create_test_context(),
        |ctx| {
            let store = ctx.store();
            let kinds = Arc::new(Mutex::new(Vec::new()));
            let sink = kinds.clone();
            let _subscription = store.subscribe(ChangeListener::new(move |signal: ChangeSignal| {
                sink.lock().unwrap().push(signal.kind());
                Ok(())
            }))?;

            store.delete_by_id("/items/1")?;
            store.delete_by_id("/items/1")?;
            wait_until(|| kinds.lock().unwrap().len() == 2);
            assert_eq!(*kinds.lock().unwrap(), vec![ChangeKind::Delete, ChangeKind::Delete]);
            assert_eq!(store.get(ITEMS)?.len(), 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_missing_collection_recovers() {
    run_test(
        || create_test_context(),
        |ctx| {
            let results = Arc::new(Mutex::new(Vec::new()));
            let sink = results.clone();
            let _subscription = ctx.service().count(DocsQuery::new("/later"), move |result: DocsResult<usize>| {
                sink.lock().unwrap().push(result.map_err(|e| e.kind().clone()));
            })?;
            assert_eq!(results.lock().unwrap()[0], Err(ErrorKind::NotFound));

            let err = ctx.store().create("/later", doc! { "name": "x" }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::NotFound);

            ctx.store().add_collection("/later")?;
            ctx.store().create("/later", doc! { "name": "x" })?;
            wait_until(|| results.lock().unwrap().last() == Some(&Ok(1)));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_invalid_document_path() {
    run_test(
        || create_test_context(),
        |ctx| {
            let err = ctx.store().delete_by_id("/items/").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidPath);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_store_from_nested_fixture() {
    let fixture = Fixture::from_json_str(
        r#"{
            "users": {
                "u1": { "name": "Ann", "subCollection": { "orders": { "o1": { "total": 3 } } } }
            }
        }"#,
    )
    .unwrap();
    let paths = to_collection_paths(&fixture).unwrap();
    assert!(paths.contains_key("/orders"));

    let store = StoreBuilder::new().fixture(fixture).open().unwrap();
    assert_eq!(store.collection_paths(), vec!["/orders".to_string(), "/users".to_string()]);
    assert_eq!(store.get("users").unwrap()["u1"], doc! { "name": "Ann" });
    assert_eq!(store.get("/orders").unwrap()["o1"], doc! { "total": 3 });
}

#[test]
fn test_observer_writes_back_into_store() {
    run_test(
        || create_test_context(),
        |ctx| {
            ctx.store().add_collection("/audit")?;
            let weak_store = ctx.store().downgrade();
            let emissions = Arc::new(Mutex::new(0usize));
            let sink = emissions.clone();
            let _items = ctx.service().value_changes(DocsQuery::new(ITEMS), move |_: DocsResult<Vec<Document>>| {
                let second = {
                    let mut seen = sink.lock().unwrap();
                    *seen += 1;
                    *seen == 2
                };
                if let (true, Some(store)) = (second, weak_store.upgrade()) {
                    store
                        .update_by_id("/audit/0", Some(&doc! { "event": "items changed" }), None)
                        .unwrap();
                }
            })?;

            let (sender, receiver) = std::sync::mpsc::channel();
            let writer = ctx.store().clone();
            std::thread::spawn(move || {
                let result = writer.update_by_id("/items/0", Some(&doc! { "name": "z" }), None);
                let _ = sender.send(result.is_ok());
            });

            assert_eq!(receiver.recv_timeout(Duration::from_secs(5)), Ok(true));
            assert_eq!(ctx.store().get("/audit")?["0"], doc! { "id": "0", "event": "items changed" });
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
