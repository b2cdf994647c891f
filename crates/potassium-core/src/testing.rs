#![forbid(unsafe_code)]

//! Deterministic test doubles.
//!
//! Available under `cfg(test)` and the `test-helpers` feature.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value as Json;

use crate::error::FetchError;
use crate::event::{EventFilter, Subscription};
use crate::fetch::Fetcher;
use crate::object::{DataEvent, DataObject};

/// One recorded dispatch.
#[derive(Clone, Debug)]
pub struct LoggedEvent {
    /// Event name as triggered.
    pub name: String,
    /// Event payload.
    pub event: DataEvent,
}

/// Records every event a data object triggers while the log is alive.
#[derive(Debug)]
pub struct EventLog {
    entries: Rc<RefCell<Vec<LoggedEvent>>>,
    _subscription: Subscription,
}

impl EventLog {
    /// Record every event of `target`.
    pub fn attach<T: DataObject>(target: &T) -> Self {
        Self::attach_filtered(target, EventFilter::All)
    }

    /// Record events of `target` passing `filter`.
    pub fn attach_filtered<T: DataObject>(target: &T, filter: impl Into<EventFilter>) -> Self {
        let entries = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&entries);
        let subscription = target.subscribe(filter, move |name, event| {
            sink.borrow_mut().push(LoggedEvent {
                name: name.to_owned(),
                event: event.clone(),
            });
        });
        Self {
            entries,
            _subscription: subscription,
        }
    }

    /// Event names in dispatch order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Every recorded event.
    #[must_use]
    pub fn entries(&self) -> Vec<LoggedEvent> {
        self.entries.borrow().clone()
    }

    /// Most recent event.
    #[must_use]
    pub fn last(&self) -> Option<LoggedEvent> {
        self.entries.borrow().last().cloned()
    }

    /// How many times `name` fired.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| entry.name == name)
            .count()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Forget recorded events; keep recording.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Synchronous [`Fetcher`] answering from a fixed URL table.
///
/// Unknown URLs fail with [`FetchError::NotFound`]. Every request is
/// recorded, hit or miss.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    responses: RefCell<HashMap<String, Result<Json, FetchError>>>,
    requests: RefCell<Vec<String>>,
}

impl StaticFetcher {
    /// Fetcher with no responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`respond`](Self::respond).
    #[must_use]
    pub fn with_response(self, url: impl Into<String>, data: Json) -> Self {
        self.respond(url, data);
        self
    }

    /// Answer `url` with `data`.
    pub fn respond(&self, url: impl Into<String>, data: Json) {
        self.responses.borrow_mut().insert(url.into(), Ok(data));
    }

    /// Answer `url` with `error`.
    pub fn fail(&self, url: impl Into<String>, error: FetchError) {
        self.responses.borrow_mut().insert(url.into(), Err(error));
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl Fetcher for StaticFetcher {
    fn fetch_json(&self, url: &str) -> Result<Json, FetchError> {
        self.requests.borrow_mut().push(url.to_owned());
        self.responses
            .borrow()
            .get(url)
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::NotFound {
                    url: url.to_owned(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataModel;
    use serde_json::json;

    #[test]
    fn log_stops_recording_when_dropped() {
        let model = DataModel::new();
        let log = EventLog::attach(&model);
        model.set("a", 1).unwrap();
        assert_eq!(log.count("changed"), 1);
        drop(log);
        assert_eq!(model.trigger("changed", crate::object::EventDetail::Reset), 0);
    }

    #[test]
    fn filtered_log() {
        let model = DataModel::new();
        let log = EventLog::attach_filtered(&model, "changed");
        model.set_batch([("a", 1), ("b", 2)]).unwrap();
        assert_eq!(log.names(), vec!["changed"]);
    }

    #[test]
    fn static_fetcher_records_requests() {
        let fetcher = StaticFetcher::new().with_response("/a", json!(1));
        fetcher.fail(
            "/b",
            FetchError::Status {
                url: "/b".into(),
                status: 500,
            },
        );
        assert_eq!(fetcher.fetch_json("/a"), Ok(json!(1)));
        assert!(matches!(fetcher.fetch_json("/b"), Err(FetchError::Status { status: 500, .. })));
        assert!(matches!(fetcher.fetch_json("/c"), Err(FetchError::NotFound { .. })));
        assert_eq!(fetcher.requests(), vec!["/a", "/b", "/c"]);
    }
}
