#![forbid(unsafe_code)]

//! Error types for the data layer.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Contract violation | No endpoint configured for `url()` | `NotImplemented`, returned before any event |
//! | Index out of range | `DataCollection::at` outside `[0, len)` | `IndexOutOfRange` |
//! | Wrong payload shape | `reset` with a non-object / non-array | `InvalidPayload`, state untouched |
//! | Non-numeric increment | `increment` on a string, bool, nested object | `NotNumeric` |
//! | Fetch failure | Transport, status, decode, parse or reset error | `fetched` event + `Fetch` |
//!
//! Listener panics are not represented here: they unwind through
//! `trigger` to the caller.

use thiserror::Error;

/// Errors returned by data-layer operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// A required hook was not provided by the configuration.
    #[error("{operation} is not implemented for this data object")]
    NotImplemented {
        /// Name of the missing hook (e.g. `"url"`).
        operation: &'static str,
    },

    /// Collection index outside `[0, len)`.
    #[error("index out of range: {index} (len {len})")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Collection length at the time of the call.
        len: usize,
    },

    /// A raw payload had the wrong JSON shape.
    #[error("invalid payload: expected {expected}, found {found}")]
    InvalidPayload {
        /// Expected JSON kind.
        expected: &'static str,
        /// JSON kind actually received.
        found: &'static str,
    },

    /// `increment` on a field that does not hold a number.
    #[error("field '{field}' does not hold a number")]
    NotNumeric {
        /// Offending field name.
        field: String,
    },

    /// Fetch pipeline failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Failure of a single fetch. Carried inside `fetched` events, hence `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be sent or the connection failed.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying error message.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("request to {url} returned status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response body was not valid JSON.
    #[error("response from {url} is not valid JSON: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Decoder message.
        message: String,
    },

    /// The JSON was received but `parse` or `reset` rejected it.
    #[error("payload from {url} was rejected: {message}")]
    Payload {
        /// Requested URL.
        url: String,
        /// Rejection message.
        message: String,
    },

    /// No response is registered for the URL.
    #[error("no response for {url}")]
    NotFound {
        /// Requested URL.
        url: String,
    },
}

/// Name of the JSON kind, for `InvalidPayload` messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
