//! Typed partial documents.

use std::fmt;
use std::marker::PhantomData;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use docmap_schema::Mapped;

use crate::error::{json_kind, MapperError, MapperResult};

/// A literal document, possibly partial, for class `T`.
///
/// Used wherever a call names a class and supplies raw fields instead of a
/// full instance (`index(User, {"name": "Bob"})`-style calls and bulk items).
pub struct Partial<T> {
    fields: Map<String, Value>,
    _class: PhantomData<fn() -> T>,
}

impl<T: Mapped> Partial<T> {
    pub fn new() -> Self {
        Self::from_map(Map::new())
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            _class: PhantomData,
        }
    }

    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> MapperResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self::from_map(fields)),
            other => Err(MapperError::NotADocument {
                found: json_kind(&other),
            }),
        }
    }

    /// Serialize a full instance into a partial document.
    pub fn from_instance(instance: &T) -> MapperResult<Self> {
        Self::from_value(serde_json::to_value(instance)?)
    }

    /// Set one field.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<T: Mapped> Default for Partial<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Partial<T> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            _class: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Partial<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Partial").field(&self.fields).finish()
    }
}

impl<T> PartialEq for Partial<T> {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl<T> Serialize for Partial<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
