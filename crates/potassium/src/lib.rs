#![forbid(unsafe_code)]

//! Potassium public facade.
//!
//! Re-exports the data layer ([`data`]) and, with the default `runtime`
//! feature, the view plumbing (`view`). Most programs only need the
//! [`prelude`].
//!
//! ```
//! use potassium::prelude::*;
//! use serde_json::json;
//!
//! let books = DataCollection::from_json(json!([{"id": 1, "title": "Dune"}])).unwrap();
//! let focus = FocusContext::new();
//! let view = CollectionView::new(&books, &focus);
//!
//! books.add(json!({"id": 2, "title": "Emma"})).unwrap();
//! assert_eq!(view.len(), 2);
//! ```

pub use potassium_core as data;
#[cfg(feature = "runtime")]
pub use potassium_runtime as view;

#[cfg(feature = "runtime")]
pub use potassium_runtime::{bind, bind_map};

/// Commonly used types.
pub mod prelude {
    pub use potassium_core::{
        CollectionOptions, DataCollection, DataError, DataEvent, DataModel, DataObject, DataRef,
        Endpoint, EventDetail, EventFilter, FetchError, Fetcher, HttpFetcherConfig, ModelOptions,
        Observable, Subscription, Value, changed_event, endpoint,
    };
    #[cfg(feature = "http")]
    pub use potassium_core::HttpFetcher;

    #[cfg(feature = "runtime")]
    pub use potassium_runtime::{
        Binding, BindingScope, CollectionView, Component, ComponentDetail, ComponentEvent,
        FieldBinding, FocusContext, ItemView,
    };
}
