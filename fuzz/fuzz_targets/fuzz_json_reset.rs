#![no_main]

use libfuzzer_sys::fuzz_target;
use potassium_core::{CollectionOptions, DataCollection, DataModel, DataObject, ModelOptions};
use serde_json::Value as Json;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = serde_json::from_slice::<Json>(data) else {
        return;
    };

    let options = ModelOptions::new()
        .with_model_field("child", ModelOptions::new())
        .with_collection_field("items", CollectionOptions::new());
    let model = DataModel::with_options(options);
    if model.reset(json.clone()).is_ok() {
        // A second reset with the same snapshot is a no-op.
        let snapshot = model.to_json();
        if model.reset(snapshot.clone()).is_ok() {
            assert_eq!(model.to_json(), snapshot);
        }
    }

    let collection = DataCollection::new();
    if collection.reset(json).is_ok() {
        let len = collection.len();
        assert_eq!(collection.iter().count(), len);
    }
});
