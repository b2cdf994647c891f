#![forbid(unsafe_code)]

//! The capability set shared by models and collections.
//!
//! [`DataObject`] is the trait every observable, fetchable unit of state
//! implements: it owns an [`Observable<DataEvent>`], can be `reset` from a
//! raw JSON payload, and optionally knows its remote endpoint. [`DataRef`]
//! is the type-erased handle used wherever either kind may appear (event
//! targets, nested field values).

use std::fmt;
use std::rc::Rc;

use serde_json::Value as Json;

use crate::collection::DataCollection;
use crate::error::DataError;
use crate::event::{Callback, EventFilter, Observable, Subscription};
use crate::fetch::{self, Endpoint, Fetcher};
use crate::model::{Changes, DataModel};
use crate::value::Value;

/// Emitted once per batch in which at least one field changed.
pub const CHANGED: &str = "changed";
/// Emitted by a collection for each appended entry.
pub const ADDED: &str = "added";
/// Emitted by a collection for each removed entry.
pub const REMOVED: &str = "removed";
/// Emitted by a collection after a full reset.
pub const RESET: &str = "reset";
/// Emitted before a fetch request goes out.
pub const FETCHING: &str = "fetching";
/// Emitted when a fetch finishes, successfully or not.
pub const FETCHED: &str = "fetched";

/// Name of the per-field change event: `changed:<field>`.
#[must_use]
pub fn changed_event(field: &str) -> String {
    format!("{CHANGED}:{field}")
}

/// What happened, for a [`DataEvent`].
#[derive(Clone, Debug)]
pub enum EventDetail {
    /// A single field resolved to a new value.
    FieldChanged {
        /// Field name.
        field: String,
        /// Resolved stored value.
        value: Value,
    },
    /// Trailing batch event with every changed field.
    Changed(Changes),
    /// An entry was appended to a collection.
    Added(DataModel),
    /// An entry was removed from a collection.
    Removed(DataModel),
    /// A collection finished a full reset.
    Reset,
    /// A fetch is about to be sent.
    Fetching,
    /// A fetch finished.
    Fetched {
        /// Parsed payload on success.
        data: Option<Json>,
        /// Failure, if any.
        error: Option<crate::error::FetchError>,
    },
}

/// Event delivered to data-object listeners.
#[derive(Clone, Debug)]
pub struct DataEvent {
    /// The object that triggered the event.
    pub target: DataRef,
    /// Event payload.
    pub detail: EventDetail,
}

/// Listener callback type for data objects.
pub type DataCallback = Callback<DataEvent>;

/// Type-erased handle to a model or collection.
#[derive(Clone)]
pub enum DataRef {
    /// A model handle.
    Model(DataModel),
    /// A collection handle.
    Collection(DataCollection),
}

impl DataRef {
    /// Handle identity.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Model(a), Self::Model(b)) => a.ptr_eq(b),
            (Self::Collection(a), Self::Collection(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// The model, if this is one.
    #[must_use]
    pub fn as_model(&self) -> Option<&DataModel> {
        match self {
            Self::Model(model) => Some(model),
            Self::Collection(_) => None,
        }
    }

    /// The collection, if this is one.
    #[must_use]
    pub fn as_collection(&self) -> Option<&DataCollection> {
        match self {
            Self::Collection(collection) => Some(collection),
            Self::Model(_) => None,
        }
    }
}

impl fmt::Debug for DataRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(model) => fmt::Debug::fmt(model, f),
            Self::Collection(collection) => fmt::Debug::fmt(collection, f),
        }
    }
}

impl From<DataModel> for DataRef {
    fn from(model: DataModel) -> Self {
        Self::Model(model)
    }
}

impl From<&DataModel> for DataRef {
    fn from(model: &DataModel) -> Self {
        Self::Model(model.clone())
    }
}

impl From<DataCollection> for DataRef {
    fn from(collection: DataCollection) -> Self {
        Self::Collection(collection)
    }
}

impl From<&DataCollection> for DataRef {
    fn from(collection: &DataCollection) -> Self {
        Self::Collection(collection.clone())
    }
}

/// Observable, resettable, fetchable state.
///
/// Implementors supply the listener list, a handle to themselves, their
/// endpoint and the `reset`/`to_json` pair; everything else has a default.
pub trait DataObject {
    /// This object's own listener list.
    fn events(&self) -> &Observable<DataEvent>;

    /// A type-erased handle to this object.
    fn data_ref(&self) -> DataRef;

    /// Remote endpoint, if one was configured.
    fn endpoint(&self) -> Option<&Rc<dyn Endpoint>>;

    /// Fully replace internal state from `data`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidPayload`] when `data` has the wrong shape.
    fn reset(&self, data: Json) -> Result<(), DataError>;

    /// Deep JSON snapshot of the current state.
    fn to_json(&self) -> Json;

    /// Equality used for collection lookups. Identity unless overridden.
    fn equals(&self, other: &DataRef) -> bool {
        self.data_ref().ptr_eq(other)
    }

    /// URL used by [`fetch`](Self::fetch).
    ///
    /// # Errors
    ///
    /// [`DataError::NotImplemented`] when no endpoint is configured.
    fn url(&self) -> Result<String, DataError> {
        match self.endpoint() {
            Some(endpoint) => endpoint.url(&self.data_ref()),
            None => Err(DataError::NotImplemented { operation: "url" }),
        }
    }

    /// Transform a fetched payload before `reset`. Identity by default.
    ///
    /// # Errors
    ///
    /// Whatever the endpoint's parser reports.
    fn parse(&self, data: Json) -> Result<Json, DataError> {
        match self.endpoint() {
            Some(endpoint) => endpoint.parse(data),
            None => Ok(data),
        }
    }

    /// Register `callback` for events passing `filter`.
    fn add_listener(&self, callback: &DataCallback, filter: impl Into<EventFilter>)
    where
        Self: Sized,
    {
        self.events().add_listener(callback, filter);
    }

    /// Remove registrations of `callback`; see [`Observable::remove_listener`].
    fn remove_listener(&self, callback: &DataCallback, event_name: Option<&str>) -> usize {
        self.events().remove_listener(callback, event_name)
    }

    /// Dispatch an event with this object as target.
    fn trigger(&self, event_name: &str, detail: EventDetail) -> usize {
        let event = DataEvent {
            target: self.data_ref(),
            detail,
        };
        self.events().trigger(event_name, &event)
    }

    /// Drop this object's own listener list.
    fn clear_listeners(&self) {
        self.events().clear_listeners();
    }

    /// Release this object's listeners. Nested objects are left alone.
    fn cleanup(&self) {
        self.clear_listeners();
    }

    /// Register a closure and return a guard that removes exactly that
    /// registration from exactly this object when dropped.
    fn subscribe(
        &self,
        filter: impl Into<EventFilter>,
        f: impl Fn(&str, &DataEvent) + 'static,
    ) -> Subscription
    where
        Self: Sized,
    {
        let callback = Callback::new(f);
        let filter = filter.into();
        self.events().add_listener(&callback, filter.clone());
        let target = self.data_ref();
        Subscription::new(move || {
            let name = match &filter {
                EventFilter::All => None,
                EventFilter::Named(name) => Some(name.as_str()),
            };
            target.remove_listener(&callback, name);
        })
    }

    /// Fetch from the endpoint, then `parse` and `reset`.
    ///
    /// Emits `fetching`, then `fetched` carrying either the parsed data or
    /// the error.
    ///
    /// # Errors
    ///
    /// [`DataError::NotImplemented`] without an endpoint (no events are
    /// emitted), otherwise [`DataError::Fetch`].
    fn fetch(&self, fetcher: &dyn Fetcher) -> Result<(), DataError>
    where
        Self: Sized,
    {
        fetch::run_fetch(self, fetcher)
    }
}

impl DataObject for DataRef {
    fn events(&self) -> &Observable<DataEvent> {
        match self {
            Self::Model(model) => model.events(),
            Self::Collection(collection) => collection.events(),
        }
    }

    fn data_ref(&self) -> DataRef {
        self.clone()
    }

    fn endpoint(&self) -> Option<&Rc<dyn Endpoint>> {
        match self {
            Self::Model(model) => model.endpoint(),
            Self::Collection(collection) => collection.endpoint(),
        }
    }

    fn reset(&self, data: Json) -> Result<(), DataError> {
        match self {
            Self::Model(model) => model.reset(data),
            Self::Collection(collection) => collection.reset(data),
        }
    }

    fn to_json(&self) -> Json {
        match self {
            Self::Model(model) => model.to_json(),
            Self::Collection(collection) => collection.to_json(),
        }
    }

    fn equals(&self, other: &DataRef) -> bool {
        match self {
            Self::Model(model) => model.equals(other),
            Self::Collection(collection) => collection.equals(other),
        }
    }

    fn cleanup(&self) {
        match self {
            Self::Model(model) => model.cleanup(),
            Self::Collection(collection) => collection.cleanup(),
        }
    }
}
