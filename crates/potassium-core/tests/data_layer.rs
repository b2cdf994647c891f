//! End-to-end scenarios for models, collections and their event streams.

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use potassium_core::{
    CollectionOptions, DataCollection, DataError, DataModel, DataObject, EventDetail,
    ModelOptions, Subscription, Value, changed_event, endpoint,
};
use serde_json::json;

/// Names of every event `target` triggers while the guard lives.
fn record<T: DataObject>(target: &T) -> (Rc<RefCell<Vec<String>>>, Subscription) {
    let names = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&names);
    let sub = target.subscribe(potassium_core::EventFilter::All, move |name, _| {
        sink.borrow_mut().push(name.to_owned());
    });
    (names, sub)
}

#[test]
fn model_lifecycle() {
    let model = DataModel::from_json(json!({"title": "draft", "pageCount": 0})).unwrap();
    let (names, _sub) = record(&model);

    model
        .set_batch([("title", Value::from("final")), ("pageCount", Value::from(12))])
        .unwrap();
    model.increment("pageCount", 1).unwrap();
    model.reset(json!({"title": "reprint"})).unwrap();

    assert_eq!(
        *names.borrow(),
        vec![
            "changed:title",
            "changed:pageCount",
            "changed",
            "changed:pageCount",
            "changed",
            "changed:pageCount",
            "changed:title",
            "changed",
        ]
    );
    assert!(model.get("pageCount").is_null());
    assert_eq!(model.to_json(), json!({"title": "reprint", "pageCount": null}));
}

#[test]
fn nested_collection_survives_sets() {
    let options = ModelOptions::new().with_collection_field("flowers", CollectionOptions::new());
    let garden = DataModel::from_json_with(json!({"flowers": [{"id": 1}]}), options).unwrap();

    let flowers = garden.get("flowers").as_collection().cloned().unwrap();
    let (names, _sub) = record(&flowers);

    garden
        .set("flowers", json!([{"id": 2}, {"id": 3}]))
        .unwrap();

    let again = garden.get("flowers").as_collection().cloned().unwrap();
    assert!(again.ptr_eq(&flowers));
    assert_eq!(flowers.len(), 2);
    assert_eq!(*names.borrow(), vec!["removed", "added", "added", "reset"]);
}

#[test]
fn collection_entries_know_their_collection() {
    let collection = DataCollection::from_json(json!([{"id": "a"}])).unwrap();
    let added = collection.add(json!({"id": "b"})).unwrap().unwrap();
    assert!(added.collection().unwrap().ptr_eq(&collection));

    let adopted = DataModel::from_json(json!({"id": "c"})).unwrap();
    collection.add(&adopted).unwrap();
    assert!(adopted.collection().is_none());
    assert_eq!(collection.len(), 3);
}

#[test]
fn listener_panic_aborts_remaining_delivery() {
    let model = DataModel::new();
    let reached = Rc::new(RefCell::new(false));

    let _boom = model.subscribe(changed_event("x"), |_, _| panic!("listener failure"));
    let r = Rc::clone(&reached);
    let _late = model.subscribe(changed_event("x"), move |_, _| *r.borrow_mut() = true);

    let result = catch_unwind(AssertUnwindSafe(|| model.set("x", 1)));
    assert!(result.is_err());
    assert!(!*reached.borrow());

    // The value was stored before dispatch and the listener list is intact.
    assert_eq!(model.get("x"), 1);
    assert_eq!(model.events().listener_count(), 2);
}

#[test]
fn reentrant_listener_sees_consistent_state() {
    let model = DataModel::new();
    let target = model.clone();
    let _sub = model.subscribe(changed_event("celsius"), move |_, event| {
        if let EventDetail::FieldChanged { value, .. } = &event.detail {
            let celsius = value.as_f64().unwrap_or_default();
            target.set("fahrenheit", celsius * 9.0 / 5.0 + 32.0).unwrap();
        }
    });

    model.set("celsius", 100).unwrap();
    assert_eq!(model.get("fahrenheit").as_f64(), Some(212.0));
}

#[test]
fn listener_added_during_dispatch_waits_for_next_trigger() {
    let model = DataModel::new();
    let late_hits = Rc::new(RefCell::new(0));
    let keep: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

    let handle = model.clone();
    let hits = Rc::clone(&late_hits);
    let store = Rc::clone(&keep);
    let _first = model.subscribe(changed_event("x"), move |_, _| {
        if store.borrow().is_empty() {
            let hits = Rc::clone(&hits);
            let sub = handle.subscribe(changed_event("x"), move |_, _| *hits.borrow_mut() += 1);
            store.borrow_mut().push(sub);
        }
    });

    model.set("x", 1).unwrap();
    assert_eq!(*late_hits.borrow(), 0);
    model.set("x", 2).unwrap();
    assert_eq!(*late_hits.borrow(), 1);
}

#[test]
fn collection_fetch_replaces_entries() {
    let collection = DataCollection::with_options(
        CollectionOptions::new().with_endpoint(endpoint::fixed("/flowers")),
    );

    struct Once;
    impl potassium_core::Fetcher for Once {
        fn fetch_json(&self, url: &str) -> Result<serde_json::Value, potassium_core::FetchError> {
            assert_eq!(url, "/flowers");
            Ok(json!([{"id": 1}, {"id": 2}]))
        }
    }

    let (names, _sub) = record(&collection);
    collection.fetch(&Once).unwrap();
    assert_eq!(collection.len(), 2);
    assert_eq!(
        *names.borrow(),
        vec!["fetching", "added", "added", "reset", "fetched"]
    );
}

#[test]
fn aborted_batch_still_reports_applied_fields() {
    let model = DataModel::new();
    model.set("child", DataModel::new()).unwrap();

    let (names, _sub) = record(&model);
    let err = model
        .set_batch([("a", Value::from(1)), ("child", Value::from("not an object"))])
        .unwrap_err();

    assert!(matches!(err, DataError::InvalidPayload { expected: "object", .. }));
    assert_eq!(*names.borrow(), vec!["changed:a", "changed"]);
}
