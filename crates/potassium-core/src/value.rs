#![forbid(unsafe_code)]

//! Field values held by a [`DataModel`].
//!
//! A field holds either plain JSON or a nested data object. Nested objects
//! are handles, so cloning a [`Value`] never deep-copies a model or
//! collection.

use std::fmt;

use serde_json::Value as Json;

use crate::collection::DataCollection;
use crate::model::DataModel;
use crate::object::{DataObject, DataRef};

/// A field value: plain JSON or a nested model/collection.
#[derive(Clone)]
pub enum Value {
    /// Plain JSON (null, bool, number, string, array, object).
    Plain(Json),
    /// A nested model.
    Model(DataModel),
    /// A nested collection.
    Collection(DataCollection),
}

impl Value {
    /// JSON `null`.
    pub const NULL: Self = Self::Plain(Json::Null);

    /// Whether this is JSON `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Plain(Json::Null))
    }

    /// Whether `get` treats this value as absent: `null` or the empty string.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Plain(Json::Null) => true,
            Self::Plain(Json::String(s)) => s.is_empty(),
            _ => false,
        }
    }

    /// Operational identity: structural equality for plain JSON, handle
    /// identity for nested objects.
    #[must_use]
    pub fn identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Plain(a), Self::Plain(b)) => a == b,
            (Self::Model(a), Self::Model(b)) => a.ptr_eq(b),
            (Self::Collection(a), Self::Collection(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// The plain JSON, if this is not a nested object.
    #[must_use]
    pub fn as_json(&self) -> Option<&Json> {
        match self {
            Self::Plain(json) => Some(json),
            _ => None,
        }
    }

    /// String content of a plain string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Json::as_str)
    }

    /// Integer content of a plain number value.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_json().and_then(Json::as_i64)
    }

    /// Floating-point content of a plain number value.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_json().and_then(Json::as_f64)
    }

    /// Boolean content of a plain bool value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.as_json().and_then(Json::as_bool)
    }

    /// The nested model, if any.
    #[must_use]
    pub fn as_model(&self) -> Option<&DataModel> {
        match self {
            Self::Model(model) => Some(model),
            _ => None,
        }
    }

    /// The nested collection, if any.
    #[must_use]
    pub fn as_collection(&self) -> Option<&DataCollection> {
        match self {
            Self::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    /// Whether this holds a nested data object.
    #[must_use]
    pub fn is_data_object(&self) -> bool {
        !matches!(self, Self::Plain(_))
    }

    /// The nested object as a type-erased handle.
    #[must_use]
    pub fn to_data_ref(&self) -> Option<DataRef> {
        match self {
            Self::Plain(_) => None,
            Self::Model(model) => Some(DataRef::Model(model.clone())),
            Self::Collection(collection) => Some(DataRef::Collection(collection.clone())),
        }
    }

    /// Deep JSON snapshot; nested objects are serialized by value.
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Self::Plain(json) => json.clone(),
            Self::Model(model) => model.to_json(),
            Self::Collection(collection) => collection.to_json(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(json) => write!(f, "Plain({json})"),
            Self::Model(model) => f.debug_tuple("Model").field(model).finish(),
            Self::Collection(collection) => f.debug_tuple("Collection").field(collection).finish(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.identical(other)
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<i64> for Value {
    fn eq(&self, other: &i64) -> bool {
        self.as_i64() == Some(*other)
    }
}

impl PartialEq<i32> for Value {
    fn eq(&self, other: &i32) -> bool {
        self.as_i64() == Some(i64::from(*other))
    }
}

impl PartialEq<bool> for Value {
    fn eq(&self, other: &bool) -> bool {
        self.as_bool() == Some(*other)
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Self::Plain(json)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Plain(Json::String(s.to_owned()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Plain(Json::String(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Plain(Json::Bool(b))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Plain(Json::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Plain(Json::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Plain(Json::from(n))
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `null`.
    fn from(n: f64) -> Self {
        Self::Plain(Json::from(n))
    }
}

impl From<DataModel> for Value {
    fn from(model: DataModel) -> Self {
        Self::Model(model)
    }
}

impl From<DataCollection> for Value {
    fn from(collection: DataCollection) -> Self {
        Self::Collection(collection)
    }
}

impl From<DataRef> for Value {
    fn from(object: DataRef) -> Self {
        match object {
            DataRef::Model(model) => Self::Model(model),
            DataRef::Collection(collection) => Self::Collection(collection),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NULL, Into::into)
    }
}
