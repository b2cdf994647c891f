#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use potassium_core::{DataCollection, DataModel, DataObject};
use potassium_runtime::{CollectionView, FocusContext};
use serde_json::{Value as Json, json};

#[derive(Arbitrary, Debug)]
enum Op {
    Add(u8),
    Remove(u8),
    Reset(Vec<u8>),
    Filter(Option<u8>),
    Focus(u8),
}

fuzz_target!(|ops: Vec<Op>| {
    let collection = DataCollection::new();
    let focus = FocusContext::new();
    let view = CollectionView::new(&collection, &focus);

    for op in ops.iter().take(64) {
        match op {
            Op::Add(id) => {
                let _ = collection.add(json!({"id": id % 8}));
            }
            Op::Remove(id) => {
                if let Ok(probe) = DataModel::from_json(json!({"id": id % 8})) {
                    collection.remove(&probe);
                }
            }
            Op::Reset(ids) => {
                let items: Vec<Json> = ids.iter().map(|id| json!({"id": id % 8})).collect();
                let _ = collection.reset(Json::Array(items));
            }
            Op::Filter(modulus) => match modulus {
                Some(m) => {
                    let m = i64::from(m % 3 + 1);
                    view.filter(Some(Box::new(move |model: &DataModel| {
                        model.id().as_i64().is_some_and(|id| id % m == 0)
                    })));
                }
                None => view.filter(None),
            },
            Op::Focus(index) => {
                if let Some(item) = view.at(usize::from(*index)) {
                    item.set_accepts_text_input_focus(true);
                    item.focus();
                }
            }
        }

        assert_eq!(view.len(), collection.len());
        assert!(view.visible_count() <= view.len());
        if let Some(focused) = focus.focused() {
            assert!(!focused.is_cleaned_up());
        }
    }

    view.cleanup();
    assert_eq!(collection.events().listener_count(), 0);
});
