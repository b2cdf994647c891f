#![forbid(unsafe_code)]

//! Observable data layer for Potassium.
//!
//! - [`Observable`]: ordered listener list with synchronous dispatch.
//! - [`DataModel`]: key/value record with batched `changed` events and
//!   nested models/collections that are reset in place.
//! - [`DataCollection`]: ordered, duplicate-filtered set of models with
//!   `added` / `removed` / `reset` events.
//! - [`DataObject`]: the capability set both share (listeners, `reset`,
//!   `parse`, `equals`, `cleanup`, `fetch`).
//! - [`Endpoint`] / [`Fetcher`]: where remote data lives and how it is
//!   retrieved.
//!
//! # Architecture
//!
//! Models and collections are `Rc` handles over `RefCell` state and are
//! single-threaded. Cloning a handle shares the object; identity is pointer
//! identity. Events are `(name, &DataEvent)` pairs whose target is the
//! triggering object.
//!
//! ```
//! use potassium_core::{DataModel, DataObject, changed_event};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let model = DataModel::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! let _sub = model.subscribe(changed_event("title"), move |name, _| {
//!     sink.borrow_mut().push(name.to_owned());
//! });
//!
//! model.set("title", "Hello").unwrap();
//! model.set("title", "Hello").unwrap();
//! assert_eq!(*seen.borrow(), vec!["changed:title"]);
//! ```

pub mod collection;
pub mod error;
pub mod event;
pub mod fetch;
pub mod model;
pub mod object;
pub mod value;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use collection::{
    CollectionItem, CollectionOptions, DataCollection, ItemContext, ItemFactory, Iter,
    WeakCollection,
};
pub use error::{DataError, FetchError};
pub use event::{Callback, EventFilter, EventListener, Observable, Subscription};
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::{Endpoint, Fetcher, HttpFetcherConfig, endpoint};
pub use model::{Changes, DataModel, FieldSchema, ModelOptions};
pub use object::{
    ADDED, CHANGED, DataCallback, DataEvent, DataObject, DataRef, EventDetail, FETCHED, FETCHING,
    REMOVED, RESET, changed_event,
};
pub use value::Value;
