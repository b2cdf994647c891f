#![forbid(unsafe_code)]

//! Observable key/value store with batched change events.
//!
//! # Event Protocol
//!
//! A batch (`set`, `set_batch`, `reset`) fires, for each field whose stored
//! value actually changed, `changed:<field>` with the resolved value, in
//! batch order. If anything changed, one trailing `changed` carries every
//! changed field. A batch with no effective change is silent.
//!
//! # Field Resolution
//!
//! For each `(field, incoming)` pair, in priority order:
//!
//! 1. `incoming` is a nested object: if the field already holds a nested
//!    object of the same kind it is reset in place from `incoming`'s own
//!    values, so nested handles inside `incoming` are adopted rather than
//!    copied (the stored handle is kept); otherwise `incoming` is adopted.
//!    Re-setting the very same handle is a no-change, and a model already
//!    being merged into is left alone, so reference cycles terminate.
//! 2. The field is declared in [`ModelOptions`]: an existing nested object
//!    is reset in place with the raw payload, otherwise a new one is built
//!    from the declared [`FieldSchema`].
//! 3. Plain field: an identical value is a no-change; a stored nested
//!    object is reset in place; anything else is stored as-is.
//!
//! Resetting in place keeps listeners held on the nested object valid.
//!
//! # Invariants
//!
//! 1. `set(f, v)` twice with the same plain `v` emits only once.
//! 2. `reset` is a full replace: fields missing from the payload end up
//!    `null` and emit `changed:<field>`.
//! 3. No `RefCell` borrow is held while events are dispatched or nested
//!    objects are reset.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use crate::collection::{CollectionOptions, DataCollection, WeakCollection};
use crate::error::{DataError, json_kind};
use crate::event::Observable;
use crate::fetch::Endpoint;
use crate::object::{CHANGED, DataEvent, DataObject, DataRef, EventDetail, changed_event};
use crate::value::Value;

/// Kind of nested object a declared field holds.
#[derive(Clone, Debug)]
pub enum FieldSchema {
    /// A nested model built with these options.
    Model(ModelOptions),
    /// A nested collection built with these options.
    Collection(CollectionOptions),
}

impl FieldSchema {
    /// Build a fresh nested object from a raw payload.
    ///
    /// # Errors
    ///
    /// [`DataError::InvalidPayload`] when the payload shape does not fit.
    pub fn instantiate(&self, data: Json) -> Result<Value, DataError> {
        match self {
            Self::Model(options) => {
                DataModel::from_json_with(data, options.clone()).map(Value::Model)
            }
            Self::Collection(options) => {
                DataCollection::from_json_with(data, options.clone()).map(Value::Collection)
            }
        }
    }
}

/// Construction options for a [`DataModel`].
///
/// ```
/// use potassium_core::{CollectionOptions, DataModel, ModelOptions};
/// use serde_json::json;
///
/// let options = ModelOptions::new()
///     .with_collection_field("flowers", CollectionOptions::new())
///     .with_model_field("author", ModelOptions::new());
///
/// let model = DataModel::from_json_with(
///     json!({"flowers": [{"petals": 5}], "author": {"name": "Ada"}}),
///     options,
/// )
/// .unwrap();
/// assert_eq!(model.get("flowers").as_collection().map(|c| c.len()), Some(1));
/// assert_eq!(model.get("author").as_model().unwrap().get("name"), "Ada");
/// ```
#[derive(Clone, Default)]
pub struct ModelOptions {
    fields: HashMap<String, FieldSchema>,
    endpoint: Option<Rc<dyn Endpoint>>,
}

impl ModelOptions {
    /// Options with no declared fields and no endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `field` as a nested model.
    #[must_use]
    pub fn with_model_field(mut self, field: impl Into<String>, options: ModelOptions) -> Self {
        self.fields.insert(field.into(), FieldSchema::Model(options));
        self
    }

    /// Declare `field` as a nested collection.
    #[must_use]
    pub fn with_collection_field(
        mut self,
        field: impl Into<String>,
        options: CollectionOptions,
    ) -> Self {
        self.fields
            .insert(field.into(), FieldSchema::Collection(options));
        self
    }

    /// Attach the endpoint used by `url`, `parse` and `fetch`.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Endpoint + 'static) -> Self {
        self.endpoint = Some(Rc::new(endpoint));
        self
    }

    /// Declared schema for `field`.
    #[must_use]
    pub fn field_schema(&self, field: &str) -> Option<&FieldSchema> {
        self.fields.get(field)
    }

    pub(crate) fn endpoint(&self) -> Option<&Rc<dyn Endpoint>> {
        self.endpoint.as_ref()
    }
}

impl fmt::Debug for ModelOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelOptions")
            .field("fields", &self.fields)
            .field("has_endpoint", &self.endpoint.is_some())
            .finish()
    }
}

/// Ordered `field → resolved value` pairs changed by one batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Changes {
    entries: Vec<(String, Value)>,
}

impl Changes {
    /// Number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// New value of `field`, if it changed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Whether `field` changed.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Changed field names in batch order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterate `(field, value)` pairs in batch order.
    pub fn iter(&self) -> std::slice::Iter<'_, (String, Value)> {
        self.entries.iter()
    }

    fn record(&mut self, field: String, value: Value) {
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }
}

impl IntoIterator for Changes {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

struct ModelShared {
    fields: std::cell::RefCell<IndexMap<String, Value>>,
    merging: std::cell::Cell<bool>,
    events: Observable<DataEvent>,
    options: ModelOptions,
    collection: Option<WeakCollection>,
}

/// Observable key/value record.
///
/// Cloning shares the same record; see the module docs for the change
/// protocol.
#[derive(Clone)]
pub struct DataModel {
    shared: Rc<ModelShared>,
}

enum FieldUpdate {
    Unchanged,
    Changed(Value),
}

/// Accumulates one batch and emits its events.
struct Batch<'a> {
    model: &'a DataModel,
    changes: Changes,
}

impl<'a> Batch<'a> {
    fn new(model: &'a DataModel) -> Self {
        Self {
            model,
            changes: Changes::default(),
        }
    }

    fn record(&mut self, field: String, value: Value) {
        self.model.trigger(
            &changed_event(&field),
            EventDetail::FieldChanged {
                field: field.clone(),
                value: value.clone(),
            },
        );
        self.changes.record(field, value);
    }

    fn finish(self) -> Changes {
        if !self.changes.is_empty() {
            self.model
                .trigger(CHANGED, EventDetail::Changed(self.changes.clone()));
        }
        self.changes
    }
}

impl Default for DataModel {
    fn default() -> Self {
        Self::new()
    }
}

impl DataModel {
    /// Empty model with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ModelOptions::default())
    }

    /// Empty model with `options`.
    #[must_use]
    pub fn with_options(options: ModelOptions) -> Self {
        Self::empty(options, None)
    }

    /// Model holding `data` (an object, or `null` for empty).
    ///
    /// # Errors
    ///
    /// [`DataError::InvalidPayload`] for non-object payloads.
    pub fn from_json(data: Json) -> Result<Self, DataError> {
        Self::from_json_with(data, ModelOptions::default())
    }

    /// Model holding `data`, with declared fields coerced per `options`.
    ///
    /// # Errors
    ///
    /// [`DataError::InvalidPayload`] for non-object payloads.
    pub fn from_json_with(data: Json, options: ModelOptions) -> Result<Self, DataError> {
        Self::build(data, options, None)
    }

    pub(crate) fn build(
        data: Json,
        options: ModelOptions,
        collection: Option<WeakCollection>,
    ) -> Result<Self, DataError> {
        let model = Self::empty(options, collection);
        model.set_json(data)?;
        Ok(model)
    }

    fn empty(options: ModelOptions, collection: Option<WeakCollection>) -> Self {
        Self {
            shared: Rc::new(ModelShared {
                fields: std::cell::RefCell::new(IndexMap::new()),
                merging: std::cell::Cell::new(false),
                events: Observable::new(),
                options,
                collection,
            }),
        }
    }

    /// Handle identity.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Options this model was built with.
    #[must_use]
    pub fn options(&self) -> &ModelOptions {
        &self.shared.options
    }

    /// The collection that generated this model, while it is alive.
    #[must_use]
    pub fn collection(&self) -> Option<DataCollection> {
        self.shared.collection.as_ref().and_then(WeakCollection::upgrade)
    }

    /// Stored value, or `null` when absent, `null` or the empty string.
    #[must_use]
    pub fn get(&self, field: &str) -> Value {
        self.get_or(field, Value::NULL)
    }

    /// Stored value, or `default` when absent, `null` or the empty string.
    #[must_use]
    pub fn get_or(&self, field: &str, default: impl Into<Value>) -> Value {
        match self.shared.fields.borrow().get(field) {
            Some(value) if !value.is_blank() => value.clone(),
            _ => default.into(),
        }
    }

    /// The `id` field.
    #[must_use]
    pub fn id(&self) -> Value {
        self.get("id")
    }

    /// Whether `field` is present, even if `null`.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.shared.fields.borrow().contains_key(field)
    }

    /// Field names in insertion order.
    #[must_use]
    pub fn fields(&self) -> Vec<String> {
        self.shared.fields.borrow().keys().cloned().collect()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.fields.borrow().len()
    }

    /// Whether the model has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.fields.borrow().is_empty()
    }

    /// Set one field.
    ///
    /// # Errors
    ///
    /// Propagates a failed in-place reset of a nested object.
    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) -> Result<Changes, DataError> {
        self.set_batch([(field.into(), value.into())])
    }

    /// Set several fields as one batch.
    ///
    /// If a field fails, the batch stops there; the trailing `changed` still
    /// reports the fields applied before it.
    ///
    /// # Errors
    ///
    /// Propagates a failed in-place reset of a nested object.
    pub fn set_batch<I, K, V>(&self, values: I) -> Result<Changes, DataError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut batch = Batch::new(self);
        for (field, value) in values {
            let field = field.into();
            match self.apply_field(&field, value.into()) {
                Ok(FieldUpdate::Changed(resolved)) => batch.record(field, resolved),
                Ok(FieldUpdate::Unchanged) => {}
                Err(err) => {
                    batch.finish();
                    return Err(err);
                }
            }
        }
        Ok(batch.finish())
    }

    /// Set every key of a JSON object as one batch. `null` is an empty batch.
    ///
    /// # Errors
    ///
    /// [`DataError::InvalidPayload`] for non-object payloads.
    pub fn set_json(&self, data: Json) -> Result<Changes, DataError> {
        match data {
            Json::Object(map) => self.set_batch(map),
            Json::Null => Ok(Changes::default()),
            other => Err(DataError::InvalidPayload {
                expected: "object",
                found: json_kind(&other),
            }),
        }
    }

    /// Add `amount` to a numeric field; an absent or `null` field counts as 0.
    ///
    /// # Errors
    ///
    /// [`DataError::NotNumeric`] when the field holds anything but a number.
    pub fn increment(&self, field: &str, amount: i64) -> Result<Changes, DataError> {
        let current = self.shared.fields.borrow().get(field).cloned();
        let next = match current {
            None | Some(Value::Plain(Json::Null)) => Json::from(amount),
            Some(Value::Plain(Json::Number(n))) => {
                match n.as_i64().and_then(|current| current.checked_add(amount)) {
                    Some(sum) => Json::from(sum),
                    None => {
                        let sum = n.as_f64().unwrap_or_default() + amount as f64;
                        match serde_json::Number::from_f64(sum) {
                            Some(sum) => Json::Number(sum),
                            None => {
                                return Err(DataError::NotNumeric {
                                    field: field.to_owned(),
                                });
                            }
                        }
                    }
                }
            }
            Some(_) => {
                return Err(DataError::NotNumeric {
                    field: field.to_owned(),
                });
            }
        };
        self.set(field, next)
    }

    /// Identity, or both sides carry the same non-null `id`.
    #[must_use]
    pub fn same_entity(&self, other: &DataModel) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (mine, theirs) = (self.id(), other.id());
        !mine.is_null() && !theirs.is_null() && mine.identical(&theirs)
    }

    fn store(&self, field: &str, value: Value) {
        self.shared
            .fields
            .borrow_mut()
            .insert(field.to_owned(), value);
    }

    fn apply_field(&self, field: &str, incoming: Value) -> Result<FieldUpdate, DataError> {
        let current = self.shared.fields.borrow().get(field).cloned();
        let existing = current.as_ref().and_then(Value::to_data_ref);

        let json = match incoming {
            Value::Plain(json) => json,
            object => return self.merge_object(field, existing, object),
        };

        if let Some(schema) = self.shared.options.field_schema(field) {
            if let Some(existing) = existing {
                existing.reset(json)?;
                return Ok(FieldUpdate::Changed(existing.into()));
            }
            let created = schema.instantiate(json)?;
            self.store(field, created.clone());
            return Ok(FieldUpdate::Changed(created));
        }

        if let Some(Value::Plain(stored)) = &current {
            if *stored == json {
                return Ok(FieldUpdate::Unchanged);
            }
        }
        if let Some(existing) = existing {
            existing.reset(json)?;
            return Ok(FieldUpdate::Changed(existing.into()));
        }
        let value = Value::Plain(json);
        self.store(field, value.clone());
        Ok(FieldUpdate::Changed(value))
    }

    fn merge_object(
        &self,
        field: &str,
        existing: Option<DataRef>,
        incoming: Value,
    ) -> Result<FieldUpdate, DataError> {
        let Some(incoming_ref) = incoming.to_data_ref() else {
            return Ok(FieldUpdate::Unchanged);
        };
        match (existing, &incoming) {
            (Some(existing), _) if existing.ptr_eq(&incoming_ref) => Ok(FieldUpdate::Unchanged),
            (Some(DataRef::Model(existing)), Value::Model(source)) => {
                existing.reset_from(source)?;
                Ok(FieldUpdate::Changed(existing.into()))
            }
            (Some(DataRef::Collection(existing)), Value::Collection(source)) => {
                existing.reset_from(source);
                Ok(FieldUpdate::Changed(existing.into()))
            }
            _ => {
                self.store(field, incoming.clone());
                Ok(FieldUpdate::Changed(incoming.clone()))
            }
        }
    }

    /// Full replace from another model's stored values. Nested objects held
    /// by `source` are passed through as handles.
    pub(crate) fn reset_from(&self, source: &DataModel) -> Result<(), DataError> {
        if self.shared.merging.replace(true) {
            return Ok(());
        }
        let incoming: Vec<(String, Value)> = source
            .shared
            .fields
            .borrow()
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        let result = self.replace_fields(incoming);
        self.shared.merging.set(false);
        result
    }

    /// Null every stored field missing from `incoming`, then apply
    /// `incoming`; one batch.
    fn replace_fields(&self, incoming: Vec<(String, Value)>) -> Result<(), DataError> {
        let stale: Vec<String> = self
            .shared
            .fields
            .borrow()
            .iter()
            .filter(|(field, value)| {
                !value.is_null() && !incoming.iter().any(|(name, _)| name == *field)
            })
            .map(|(field, _)| field.clone())
            .collect();
        tracing::debug!(stale = stale.len(), incoming = incoming.len(), "model reset");

        let mut batch = Batch::new(self);
        for field in stale {
            self.store(&field, Value::NULL);
            batch.record(field, Value::NULL);
        }
        for (field, value) in incoming {
            match self.apply_field(&field, value) {
                Ok(FieldUpdate::Changed(resolved)) => batch.record(field, resolved),
                Ok(FieldUpdate::Unchanged) => {}
                Err(err) => {
                    batch.finish();
                    return Err(err);
                }
            }
        }
        batch.finish();
        Ok(())
    }
}

impl DataObject for DataModel {
    fn events(&self) -> &Observable<DataEvent> {
        &self.shared.events
    }

    fn data_ref(&self) -> DataRef {
        DataRef::Model(self.clone())
    }

    fn endpoint(&self) -> Option<&Rc<dyn Endpoint>> {
        self.shared.options.endpoint()
    }

    /// Full replace. Fields missing from `data` are nulled first (dropping any
    /// nested object they held), then `data` is applied; both parts share
    /// one batch.
    fn reset(&self, data: Json) -> Result<(), DataError> {
        let incoming = match data {
            Json::Object(map) => map,
            Json::Null => Map::new(),
            other => {
                return Err(DataError::InvalidPayload {
                    expected: "object",
                    found: json_kind(&other),
                });
            }
        };
        self.replace_fields(
            incoming
                .into_iter()
                .map(|(field, json)| (field, Value::Plain(json)))
                .collect(),
        )
    }

    /// Deep snapshot; nested objects are inlined, so a model graph with a
    /// reference cycle must not be serialized.
    fn to_json(&self) -> Json {
        Json::Object(
            self.shared
                .fields
                .borrow()
                .iter()
                .map(|(field, value)| (field.clone(), value.to_json()))
                .collect(),
        )
    }

    /// Identity, or the same non-null `id`; never equal to a collection.
    fn equals(&self, other: &DataRef) -> bool {
        match other {
            DataRef::Model(model) => self.same_entity(model),
            DataRef::Collection(_) => false,
        }
    }

    /// Release listeners and drop the stored fields.
    fn cleanup(&self) {
        self.clear_listeners();
        self.shared.fields.borrow_mut().clear();
    }
}

impl fmt::Debug for DataModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataModel")
            .field("fields", &self.fields())
            .field("listener_count", &self.shared.events.listener_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::EventLog;
    use serde_json::json;

    #[test]
    fn get_defaults() {
        let model = DataModel::from_json(json!({"empty": "", "none": null, "zero": 0})).unwrap();
        assert!(model.get("bogus").is_null());
        assert_eq!(model.get_or("bogus", "moon"), "moon");
        assert_eq!(model.get_or("empty", "fallback"), "fallback");
        assert_eq!(model.get_or("none", "fallback"), "fallback");
        assert_eq!(model.get_or("zero", 5), 0);
    }

    #[test]
    fn set_emits_field_then_changed() {
        let model = DataModel::new();
        let log = EventLog::attach(&model);

        let changes = model.set("moon", "unit").unwrap();
        assert_eq!(changes.get("moon").cloned(), Some(Value::from("unit")));
        assert_eq!(model.get("moon"), "unit");
        assert_eq!(model.get_or("moon", "goon"), "unit");
        assert_eq!(log.names(), vec!["changed:moon", "changed"]);
    }

    #[test]
    fn set_same_value_is_silent() {
        let model = DataModel::new();
        model.set("dink", "donk").unwrap();
        let log = EventLog::attach(&model);

        let changes = model.set("dink", "donk").unwrap();
        assert!(changes.is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn batch_order_and_payload() {
        let model = DataModel::new();
        let log = EventLog::attach(&model);
        model.set_batch([("dink", "donk"), ("pink", "punk")]).unwrap();

        assert_eq!(log.names(), vec!["changed:dink", "changed:pink", "changed"]);
        let last = log.last().unwrap();
        let EventDetail::Changed(changes) = &last.event.detail else {
            panic!("expected a changed batch, got {:?}", last.event.detail);
        };
        assert_eq!(changes.fields().collect::<Vec<_>>(), vec!["dink", "pink"]);
    }

    #[test]
    fn batch_skips_unchanged_fields() {
        let model = DataModel::from_json(json!({"a": 1})).unwrap();
        let log = EventLog::attach(&model);
        let changes = model.set_batch([("a", 1), ("b", 2)]).unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(log.names(), vec!["changed:b", "changed"]);
    }

    #[test]
    fn setting_null_on_absent_field_is_a_change() {
        let model = DataModel::new();
        let changes = model.set("x", Value::NULL).unwrap();
        assert!(changes.contains("x"));
        assert!(model.contains("x"));
        assert!(model.set("x", Value::NULL).unwrap().is_empty());
    }

    #[test]
    fn increment_counts_from_zero() {
        let model = DataModel::new();
        let log = EventLog::attach(&model);
        model.increment("pageCount", 1).unwrap();
        assert_eq!(model.get("pageCount"), 1);
        assert_eq!(log.names(), vec!["changed:pageCount", "changed"]);

        model.increment("pageCount", -2).unwrap();
        assert_eq!(model.get("pageCount"), -1);
        model.increment("pageCount", 10).unwrap();
        assert_eq!(model.get("pageCount"), 9);
    }

    #[test]
    fn increment_float_and_non_numeric() {
        let model = DataModel::from_json(json!({"ratio": 0.5, "name": "x"})).unwrap();
        model.increment("ratio", 1).unwrap();
        assert_eq!(model.get("ratio").as_f64(), Some(1.5));
        assert_eq!(
            model.increment("name", 1),
            Err(DataError::NotNumeric {
                field: "name".into()
            })
        );
    }

    #[test]
    fn increment_never_stores_a_non_number() {
        let model = DataModel::from_json(json!({"big": f64::MAX, "wide": u64::MAX})).unwrap();
        model.increment("big", i64::MAX).unwrap();
        assert_eq!(model.get("big").as_f64(), Some(f64::MAX));
        model.increment("wide", 1).unwrap();
        assert!(model.get("wide").as_f64().is_some());
    }

    #[test]
    fn declared_collection_field_is_coerced() {
        let model = DataModel::with_options(
            ModelOptions::new().with_collection_field("flowers", CollectionOptions::new()),
        );
        model
            .set("flowers", json!([{"petals": 5}, {"petals": 6}]))
            .unwrap();
        let flowers = model.get("flowers");
        let flowers = flowers.as_collection().expect("collection");
        assert_eq!(flowers.iter().count(), 2);
    }

    #[test]
    fn declared_field_keeps_identity_across_sets() {
        let model = DataModel::with_options(
            ModelOptions::new().with_model_field("author", ModelOptions::new()),
        );
        model.set("author", json!({"name": "Ada"})).unwrap();
        let author = model.get("author").as_model().cloned().unwrap();
        let author_log = EventLog::attach(&author);

        model.set("author", json!({"name": "Grace"})).unwrap();
        let again = model.get("author").as_model().cloned().unwrap();
        assert!(again.ptr_eq(&author));
        assert_eq!(author.get("name"), "Grace");
        assert_eq!(author_log.names(), vec!["changed:name", "changed"]);
    }

    #[test]
    fn plain_payload_resets_adopted_model_in_place() {
        let model = DataModel::new();
        let sub = DataModel::from_json(json!({"mesmer": "scout"})).unwrap();
        model.set("subModel", sub.clone()).unwrap();
        assert_eq!(model.get("subModel").as_model().unwrap().get("mesmer"), "scout");

        model.set("subModel", json!({"cheese": "tall"})).unwrap();
        let held = model.get("subModel").as_model().cloned().unwrap();
        assert!(held.ptr_eq(&sub));
        assert_eq!(held.get("cheese"), "tall");
        assert!(held.get("mesmer").is_null());
    }

    #[test]
    fn incoming_model_merges_into_existing_model() {
        let model = DataModel::new();
        let first = DataModel::from_json(json!({"a": 1})).unwrap();
        model.set("child", first.clone()).unwrap();

        let second = DataModel::from_json(json!({"b": 2})).unwrap();
        let log = EventLog::attach(&model);
        model.set("child", second.clone()).unwrap();

        let held = model.get("child").as_model().cloned().unwrap();
        assert!(held.ptr_eq(&first));
        assert!(!held.ptr_eq(&second));
        assert!(held.get("a").is_null());
        assert_eq!(held.get("b"), 2);
        assert_eq!(log.names(), vec!["changed:child", "changed"]);
    }

    #[test]
    fn merging_a_model_keeps_its_nested_handles() {
        let parent = DataModel::new();
        let existing = DataModel::from_json(json!({"title": "old"})).unwrap();
        parent.set("child", existing.clone()).unwrap();

        let tags = DataCollection::from_json(json!([{"id": 1}])).unwrap();
        let incoming = DataModel::new();
        incoming.set("tags", tags.clone()).unwrap();
        parent.set("child", incoming).unwrap();

        let held = parent.get("child").as_model().cloned().unwrap();
        assert!(held.ptr_eq(&existing));
        assert!(held.get("tags").as_collection().unwrap().ptr_eq(&tags));
        assert!(held.get("title").is_null());
    }

    #[test]
    fn merging_a_collection_adopts_its_entries() {
        let parent = DataModel::new();
        let existing = DataCollection::from_json(json!([{"id": 1}])).unwrap();
        parent.set("items", existing.clone()).unwrap();
        let incoming = DataCollection::from_json(json!([{"id": 2}, {"id": 3}])).unwrap();
        let second = incoming.at(0).unwrap();
        let log = EventLog::attach(&existing);

        parent.set("items", incoming).unwrap();

        let held = parent.get("items").as_collection().cloned().unwrap();
        assert!(held.ptr_eq(&existing));
        assert!(held.at(0).unwrap().ptr_eq(&second));
        assert_eq!(log.names(), vec!["removed", "added", "added", "reset"]);
    }

    #[test]
    fn merging_through_reference_cycles_terminates() {
        let a = DataModel::new();
        let b = DataModel::new();
        a.set("child", b.clone()).unwrap();
        b.set("parent", a.clone()).unwrap();
        let c = DataModel::new();
        let d = DataModel::new();
        c.set("child", d.clone()).unwrap();

        c.set("child", a.clone()).unwrap();
        assert!(c.get("child").as_model().unwrap().ptr_eq(&d));
        assert!(d.get("child").as_model().unwrap().ptr_eq(&b));

        let looped = DataModel::new();
        looped.set("me", looped.clone()).unwrap();
        let other = DataModel::new();
        other.set("me", other.clone()).unwrap();
        looped.set("me", other.clone()).unwrap();
        assert!(looped.get("me").as_model().unwrap().ptr_eq(&looped));

        for model in [a, b, looped, other] {
            model.cleanup();
        }
    }

    #[test]
    fn same_handle_twice_is_no_change() {
        let model = DataModel::new();
        let child = DataModel::new();
        model.set("child", child.clone()).unwrap();
        assert!(model.set("child", child).unwrap().is_empty());
    }

    #[test]
    fn reset_is_full_replace_with_events() {
        let model = DataModel::from_json(json!({"a": 1, "b": 2})).unwrap();
        let log = EventLog::attach(&model);
        model.reset(json!({"b": 3, "c": 4})).unwrap();

        assert!(model.get("a").is_null());
        assert_eq!(model.get("b"), 3);
        assert_eq!(model.get("c"), 4);
        assert_eq!(
            log.names(),
            vec!["changed:a", "changed:b", "changed:c", "changed"]
        );
    }

    #[test]
    fn reset_rejects_non_objects() {
        let model = DataModel::from_json(json!({"a": 1})).unwrap();
        assert_eq!(
            model.reset(json!([1, 2])),
            Err(DataError::InvalidPayload {
                expected: "object",
                found: "array"
            })
        );
        assert_eq!(model.get("a"), 1);
    }

    #[test]
    fn equals_by_identity_or_id() {
        let a = DataModel::from_json(json!({"id": 1})).unwrap();
        let b = DataModel::from_json(json!({"id": 1})).unwrap();
        let c = DataModel::from_json(json!({"id": 2})).unwrap();
        let anon_1 = DataModel::new();
        let anon_2 = DataModel::new();

        assert!(a.equals(&b.data_ref()));
        assert!(!a.equals(&c.data_ref()));
        assert!(anon_1.equals(&anon_1.data_ref()));
        assert!(!anon_1.equals(&anon_2.data_ref()));
        assert!(!a.equals(&DataCollection::new().data_ref()));
    }

    #[test]
    fn cleanup_silences_listeners() {
        let model = DataModel::new();
        let log = EventLog::attach(&model);
        model.cleanup();

        assert_eq!(model.trigger("changed:foo", EventDetail::Reset), 0);
        assert!(log.is_empty());
    }

    #[test]
    fn listener_can_read_model_during_dispatch() {
        let model = DataModel::new();
        let seen = Rc::new(std::cell::RefCell::new(Value::NULL));
        let s = Rc::clone(&seen);
        let _sub = model.subscribe(changed_event("x"), move |_, event| {
            if let Some(target) = event.target.as_model() {
                *s.borrow_mut() = target.get("x");
            }
        });
        model.set("x", "hello").unwrap();
        assert_eq!(*seen.borrow(), "hello");
    }

    #[test]
    fn to_json_snapshots_nested_objects() {
        let model = DataModel::with_options(
            ModelOptions::new().with_collection_field("tags", CollectionOptions::new()),
        );
        model
            .set_json(json!({"title": "t", "tags": [{"id": 1}]}))
            .unwrap();
        assert_eq!(model.to_json(), json!({"title": "t", "tags": [{"id": 1}]}));
    }
}
