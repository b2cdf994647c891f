#![forbid(unsafe_code)]

//! Ordered, duplicate-filtered sequence of models.
//!
//! Entries are [`DataModel`] handles built from raw JSON by the collection's
//! item factory, or adopted as-is when the caller passes a model. Equality
//! for `add`, `index_of` and `remove` is [`DataModel::same_entity`]: handle
//! identity, or the same non-null `id`.
//!
//! # Event Order
//!
//! `reset` fires every `removed` (front to back), then every `added`, then a
//! single `reset`. A rejected payload leaves the collection untouched and
//! fires nothing.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value as Json;

use crate::error::{DataError, json_kind};
use crate::event::Observable;
use crate::fetch::Endpoint;
use crate::model::{DataModel, ModelOptions};
use crate::object::{ADDED, DataEvent, DataObject, DataRef, EventDetail, REMOVED, RESET};

/// Construction context handed to an item factory.
pub struct ItemContext {
    collection: WeakCollection,
}

impl ItemContext {
    /// The collection the item is being built for.
    #[must_use]
    pub fn collection(&self) -> Option<DataCollection> {
        self.collection.upgrade()
    }

    /// Weak back-reference suitable for storing in the item.
    #[must_use]
    pub fn weak_collection(&self) -> WeakCollection {
        self.collection.clone()
    }
}

/// Builds one entry from its raw payload.
pub type ItemFactory = Rc<dyn Fn(Json, &ItemContext) -> Result<DataModel, DataError>>;

/// Construction options for a [`DataCollection`].
#[derive(Clone, Default)]
pub struct CollectionOptions {
    item: ModelOptions,
    factory: Option<ItemFactory>,
    endpoint: Option<Rc<dyn Endpoint>>,
}

impl CollectionOptions {
    /// Default options: entries are plain [`DataModel`]s.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options passed to every default-built entry.
    #[must_use]
    pub fn with_item_options(mut self, options: ModelOptions) -> Self {
        self.item = options;
        self
    }

    /// Replace the default entry constructor.
    #[must_use]
    pub fn with_factory(
        mut self,
        factory: impl Fn(Json, &ItemContext) -> Result<DataModel, DataError> + 'static,
    ) -> Self {
        self.factory = Some(Rc::new(factory));
        self
    }

    /// Attach the endpoint used by `url`, `parse` and `fetch`.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Endpoint + 'static) -> Self {
        self.endpoint = Some(Rc::new(endpoint));
        self
    }

    /// Options for default-built entries.
    #[must_use]
    pub fn item_options(&self) -> &ModelOptions {
        &self.item
    }
}

impl fmt::Debug for CollectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionOptions")
            .field("item", &self.item)
            .field("has_factory", &self.factory.is_some())
            .field("has_endpoint", &self.endpoint.is_some())
            .finish()
    }
}

/// Input accepted by [`DataCollection::add`].
#[derive(Clone, Debug)]
pub enum CollectionItem {
    /// Raw payload, wrapped by the item factory.
    Raw(Json),
    /// Existing model, adopted without copying.
    Model(DataModel),
}

impl From<Json> for CollectionItem {
    fn from(json: Json) -> Self {
        Self::Raw(json)
    }
}

impl From<DataModel> for CollectionItem {
    fn from(model: DataModel) -> Self {
        Self::Model(model)
    }
}

impl From<&DataModel> for CollectionItem {
    fn from(model: &DataModel) -> Self {
        Self::Model(model.clone())
    }
}

struct CollectionShared {
    entries: RefCell<Vec<DataModel>>,
    events: Observable<DataEvent>,
    options: CollectionOptions,
}

/// Non-owning handle to a collection, held by its entries.
#[derive(Clone)]
pub struct WeakCollection(Weak<CollectionShared>);

impl WeakCollection {
    /// The collection, if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<DataCollection> {
        self.0.upgrade().map(|shared| DataCollection { shared })
    }
}

impl fmt::Debug for WeakCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCollection")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}

/// Observable ordered set of models.
#[derive(Clone)]
pub struct DataCollection {
    shared: Rc<CollectionShared>,
}

impl Default for DataCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl DataCollection {
    /// Empty collection with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(CollectionOptions::default())
    }

    /// Empty collection with `options`.
    #[must_use]
    pub fn with_options(options: CollectionOptions) -> Self {
        Self {
            shared: Rc::new(CollectionShared {
                entries: RefCell::new(Vec::new()),
                events: Observable::new(),
                options,
            }),
        }
    }

    /// Collection built from a JSON array (or `null` for empty).
    ///
    /// # Errors
    ///
    /// [`DataError::InvalidPayload`] for non-array payloads, or whatever the
    /// item factory reports.
    pub fn from_json(data: Json) -> Result<Self, DataError> {
        Self::from_json_with(data, CollectionOptions::default())
    }

    /// Collection built from a JSON array with `options`.
    ///
    /// # Errors
    ///
    /// See [`from_json`](Self::from_json).
    pub fn from_json_with(data: Json, options: CollectionOptions) -> Result<Self, DataError> {
        let collection = Self::with_options(options);
        let items = expect_array(data)?;
        collection.add_batch(items)?;
        Ok(collection)
    }

    /// Handle identity.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Weak handle for back-references.
    #[must_use]
    pub fn downgrade(&self) -> WeakCollection {
        WeakCollection(Rc::downgrade(&self.shared))
    }

    /// Options this collection was built with.
    #[must_use]
    pub fn options(&self) -> &CollectionOptions {
        &self.shared.options
    }

    /// Entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.entries.borrow().len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.entries.borrow().is_empty()
    }

    /// Entry at `index`.
    ///
    /// # Errors
    ///
    /// [`DataError::IndexOutOfRange`] outside `[0, len)`.
    pub fn at(&self, index: usize) -> Result<DataModel, DataError> {
        let entries = self.shared.entries.borrow();
        entries
            .get(index)
            .cloned()
            .ok_or(DataError::IndexOutOfRange {
                index,
                len: entries.len(),
            })
    }

    /// Entry at `index`, if in range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<DataModel> {
        self.shared.entries.borrow().get(index).cloned()
    }

    /// First entry.
    #[must_use]
    pub fn first(&self) -> Option<DataModel> {
        self.shared.entries.borrow().first().cloned()
    }

    /// Last entry.
    #[must_use]
    pub fn last(&self) -> Option<DataModel> {
        self.shared.entries.borrow().last().cloned()
    }

    /// Position of the first entry equal to `item`.
    #[must_use]
    pub fn index_of(&self, item: &DataModel) -> Option<usize> {
        self.shared
            .entries
            .borrow()
            .iter()
            .position(|entry| entry.same_entity(item))
    }

    /// Whether an entry equal to `item` is present.
    #[must_use]
    pub fn contains(&self, item: &DataModel) -> bool {
        self.index_of(item).is_some()
    }

    /// First entry matching `predicate`.
    pub fn find(&self, mut predicate: impl FnMut(&DataModel) -> bool) -> Option<DataModel> {
        self.iter().find(|entry| predicate(entry))
    }

    /// Iterate the entries present when the call was made.
    ///
    /// Mutating the collection while iterating does not affect the
    /// iterator; call `iter` again to observe the new state.
    #[must_use]
    pub fn iter(&self) -> Iter {
        Iter {
            entries: self.shared.entries.borrow().clone().into_iter(),
        }
    }

    /// Snapshot of the entries.
    #[must_use]
    pub fn to_vec(&self) -> Vec<DataModel> {
        self.shared.entries.borrow().clone()
    }

    /// Append one entry and fire `added`.
    ///
    /// Raw payloads are wrapped by the item factory first. Returns the
    /// appended entry, or `None` when an equal entry is already present.
    ///
    /// # Errors
    ///
    /// Whatever the item factory reports.
    pub fn add(&self, item: impl Into<CollectionItem>) -> Result<Option<DataModel>, DataError> {
        let model = match item.into() {
            CollectionItem::Model(model) => model,
            CollectionItem::Raw(json) => self.create_item(json)?,
        };
        Ok(self.append(model))
    }

    /// Apply [`add`](Self::add) to each item in order. Returns the appended
    /// entries.
    ///
    /// # Errors
    ///
    /// Stops at the first item the factory rejects.
    pub fn add_batch<I>(&self, items: I) -> Result<Vec<DataModel>, DataError>
    where
        I: IntoIterator,
        I::Item: Into<CollectionItem>,
    {
        let mut added = Vec::new();
        for item in items {
            if let Some(model) = self.add(item)? {
                added.push(model);
            }
        }
        Ok(added)
    }

    /// Remove the entry equal to `item` and fire `removed` with it.
    ///
    /// Returns the stored entry, which may be a different handle than
    /// `item` when they match by `id`. Absent items are a silent no-op.
    pub fn remove(&self, item: &DataModel) -> Option<DataModel> {
        let index = self.index_of(item)?;
        let removed = self.shared.entries.borrow_mut().remove(index);
        tracing::debug!(index, len = self.len(), "collection entry removed");
        self.trigger(REMOVED, EventDetail::Removed(removed.clone()));
        Some(removed)
    }

    fn create_item(&self, json: Json) -> Result<DataModel, DataError> {
        match &self.shared.options.factory {
            Some(factory) => factory(
                json,
                &ItemContext {
                    collection: self.downgrade(),
                },
            ),
            None => DataModel::build(json, self.shared.options.item.clone(), Some(self.downgrade())),
        }
    }

    fn append(&self, model: DataModel) -> Option<DataModel> {
        {
            let mut entries = self.shared.entries.borrow_mut();
            if entries.iter().any(|entry| entry.same_entity(&model)) {
                return None;
            }
            entries.push(model.clone());
        }
        tracing::debug!(len = self.len(), "collection entry added");
        self.trigger(ADDED, EventDetail::Added(model.clone()));
        Some(model)
    }

    /// Replace every entry with `source`'s entries, adopting its models
    /// as they are.
    pub(crate) fn reset_from(&self, source: &DataCollection) {
        self.replace_entries(source.to_vec());
    }

    /// Remove every entry, append `incoming`, then fire `reset`.
    fn replace_entries(&self, incoming: Vec<DataModel>) {
        tracing::debug!(
            removing = self.len(),
            adding = incoming.len(),
            "collection reset"
        );

        loop {
            let removed = {
                let mut entries = self.shared.entries.borrow_mut();
                if entries.is_empty() {
                    break;
                }
                entries.remove(0)
            };
            self.trigger(REMOVED, EventDetail::Removed(removed));
        }
        for model in incoming {
            self.append(model);
        }
        self.trigger(RESET, EventDetail::Reset);
    }
}

fn expect_array(data: Json) -> Result<Vec<Json>, DataError> {
    match data {
        Json::Array(items) => Ok(items),
        Json::Null => Ok(Vec::new()),
        other => Err(DataError::InvalidPayload {
            expected: "array",
            found: json_kind(&other),
        }),
    }
}

impl DataObject for DataCollection {
    fn events(&self) -> &Observable<DataEvent> {
        &self.shared.events
    }

    fn data_ref(&self) -> DataRef {
        DataRef::Collection(self.clone())
    }

    fn endpoint(&self) -> Option<&Rc<dyn Endpoint>> {
        self.shared.options.endpoint.as_ref()
    }

    /// Replace every entry with entries built from a JSON array.
    ///
    /// Entries are built before anything is removed, so a rejected payload
    /// or a failing factory leaves the collection as it was.
    fn reset(&self, data: Json) -> Result<(), DataError> {
        let incoming = expect_array(data)?
            .into_iter()
            .map(|json| self.create_item(json))
            .collect::<Result<Vec<_>, _>>()?;
        self.replace_entries(incoming);
        Ok(())
    }

    fn to_json(&self) -> Json {
        Json::Array(self.iter().map(|entry| entry.to_json()).collect())
    }

    /// Release listeners and drop the entries without events.
    fn cleanup(&self) {
        self.clear_listeners();
        self.shared.entries.borrow_mut().clear();
    }
}

impl fmt::Debug for DataCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataCollection")
            .field("len", &self.len())
            .field("listener_count", &self.shared.events.listener_count())
            .finish()
    }
}

/// Iterator over a snapshot of a collection's entries.
#[derive(Debug)]
pub struct Iter {
    entries: std::vec::IntoIter<DataModel>,
}

impl Iterator for Iter {
    type Item = DataModel;

    fn next(&mut self) -> Option<DataModel> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl DoubleEndedIterator for Iter {
    fn next_back(&mut self) -> Option<DataModel> {
        self.entries.next_back()
    }
}

impl ExactSizeIterator for Iter {}

impl IntoIterator for &DataCollection {
    type Item = DataModel;
    type IntoIter = Iter;

    fn into_iter(self) -> Iter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::EventLog;
    use serde_json::json;

    fn ids(collection: &DataCollection) -> Vec<Json> {
        collection.iter().map(|entry| entry.id().to_json()).collect()
    }

    #[test]
    fn construction_wraps_each_element() {
        let collection = DataCollection::from_json(json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(ids(&collection), vec![json!(1), json!(2)]);

        let first = collection.at(0).unwrap();
        assert!(first.collection().unwrap().ptr_eq(&collection));
    }

    #[test]
    fn at_out_of_range() {
        let collection = DataCollection::from_json(json!([{}])).unwrap();
        assert!(collection.at(0).is_ok());
        assert_eq!(
            collection.at(1).unwrap_err(),
            DataError::IndexOutOfRange { index: 1, len: 1 }
        );
        assert!(collection.get(1).is_none());
    }

    #[test]
    fn add_same_instance_twice() {
        let collection = DataCollection::new();
        let log = EventLog::attach(&collection);
        let model = DataModel::new();

        assert!(collection.add(&model).unwrap().is_some());
        assert!(collection.add(&model).unwrap().is_none());
        assert_eq!(collection.len(), 1);
        assert_eq!(log.names(), vec!["added"]);
    }

    #[test]
    fn add_filters_duplicates_by_id() {
        let collection = DataCollection::from_json(json!([{"id": "a"}])).unwrap();
        assert!(collection.add(json!({"id": "a", "extra": 1})).unwrap().is_none());
        assert!(collection.add(json!({"id": "b"})).unwrap().is_some());
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn add_batch_adds_values_in_order() {
        let collection = DataCollection::new();
        let added = collection
            .add_batch(vec![json!({"id": 3}), json!({"id": 4})])
            .unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(ids(&collection), vec![json!(3), json!(4)]);
    }

    #[test]
    fn remove_by_id_returns_stored_entry() {
        let collection = DataCollection::from_json(json!([{"id": 1, "name": "kept"}])).unwrap();
        let stored = collection.at(0).unwrap();
        let log = EventLog::attach(&collection);

        let probe = DataModel::from_json(json!({"id": 1})).unwrap();
        let removed = collection.remove(&probe).unwrap();
        assert!(removed.ptr_eq(&stored));
        assert!(collection.is_empty());
        assert_eq!(log.names(), vec!["removed"]);
        let EventDetail::Removed(entry) = &log.last().unwrap().event.detail else {
            panic!("expected removed detail");
        };
        assert!(entry.ptr_eq(&stored));
    }

    #[test]
    fn remove_missing_is_silent() {
        let collection = DataCollection::from_json(json!([{"id": 1}])).unwrap();
        let log = EventLog::attach(&collection);
        assert!(collection.remove(&DataModel::new()).is_none());
        assert!(log.is_empty());
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn reset_event_order() {
        let collection = DataCollection::from_json(json!([{"id": 1}, {"id": 2}])).unwrap();
        let log = EventLog::attach(&collection);
        collection.reset(json!([{"id": 3}, {"id": 4}])).unwrap();

        assert_eq!(
            log.names(),
            vec!["removed", "removed", "added", "added", "reset"]
        );
        assert_eq!(ids(&collection), vec![json!(3), json!(4)]);
    }

    #[test]
    fn reset_rejects_non_array_untouched() {
        let collection = DataCollection::from_json(json!([{"id": 1}])).unwrap();
        let log = EventLog::attach(&collection);
        assert_eq!(
            collection.reset(json!({"id": 2})),
            Err(DataError::InvalidPayload {
                expected: "array",
                found: "object"
            })
        );
        assert_eq!(collection.len(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn iteration_is_restartable_snapshot() {
        let collection = DataCollection::from_json(json!([{"id": 1}, {"id": 2}])).unwrap();
        let mut iter = collection.iter();
        collection.add(json!({"id": 3})).unwrap();

        assert_eq!(iter.len(), 2);
        assert!(iter.next().is_some());
        assert_eq!(collection.iter().count(), 3);
        assert_eq!((&collection).into_iter().count(), 3);
    }

    #[test]
    fn custom_factory_receives_context() {
        let options = CollectionOptions::new().with_factory(|json, ctx| {
            let model = DataModel::from_json(json)?;
            model.set("attached", ctx.collection().is_some())?;
            Ok(model)
        });
        let collection = DataCollection::from_json_with(json!([{"id": 1}]), options).unwrap();
        assert_eq!(collection.at(0).unwrap().get("attached"), true);
    }

    #[test]
    fn item_options_apply_to_entries() {
        let options = CollectionOptions::new().with_item_options(
            ModelOptions::new().with_collection_field("tags", CollectionOptions::new()),
        );
        let collection =
            DataCollection::from_json_with(json!([{"tags": [{"id": "x"}]}]), options).unwrap();
        let entry = collection.at(0).unwrap();
        assert_eq!(entry.get("tags").as_collection().map(DataCollection::len), Some(1));
    }

    #[test]
    fn find_and_first_last() {
        let collection =
            DataCollection::from_json(json!([{"id": 1, "n": "a"}, {"id": 2, "n": "b"}])).unwrap();
        let found = collection.find(|entry| entry.get("n") == "b").unwrap();
        assert_eq!(found.id(), 2);
        assert_eq!(collection.first().unwrap().id(), 1);
        assert_eq!(collection.last().unwrap().id(), 2);
    }

    #[test]
    fn entries_outlive_collection_without_back_reference() {
        let entry = {
            let collection = DataCollection::from_json(json!([{"id": 1}])).unwrap();
            collection.at(0).unwrap()
        };
        assert!(entry.collection().is_none());
    }

    #[test]
    fn to_json_and_cleanup() {
        let collection = DataCollection::from_json(json!([{"id": 1}])).unwrap();
        assert_eq!(collection.to_json(), json!([{"id": 1}]));
        let log = EventLog::attach(&collection);
        collection.cleanup();
        assert!(collection.is_empty());
        assert_eq!(collection.trigger(ADDED, EventDetail::Reset), 0);
        assert!(log.is_empty());
    }
}
