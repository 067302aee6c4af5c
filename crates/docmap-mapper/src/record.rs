//! Reconstructed instances.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use docmap_schema::{ClassId, Mapped};

use crate::error::{MapperError, MapperResult};

/// One reconstructed field value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// A raw value copied verbatim.
    Leaf(Value),
    /// A single embedded instance.
    Object(Record),
    /// An array of embedded instances. Falsy elements stay leaves.
    Nested(Vec<FieldValue>),
}

impl FieldValue {
    /// The JSON form of this value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Leaf(value) => value.clone(),
            Self::Object(record) => record.to_value(),
            Self::Nested(items) => Value::Array(items.iter().map(FieldValue::to_value).collect()),
        }
    }

    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            Self::Leaf(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Self::Object(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&[FieldValue]> {
        match self {
            Self::Nested(items) => Some(items),
            _ => None,
        }
    }
}

/// An instance of a class, holding only the fields that were present in its
/// source. Absent fields are never written, not even as `null`.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    class: ClassId,
    fields: IndexMap<String, FieldValue>,
}

impl Record {
    pub(crate) fn new(class: ClassId) -> Self {
        Self {
            class,
            fields: IndexMap::new(),
        }
    }

    pub(crate) fn set(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    /// The class this record is an instance of.
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Returns `true` if this record is an instance of `T`.
    pub fn is<T: Mapped>(&self) -> bool {
        self.class.is::<T>()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names, in schema declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The JSON object formed by the present fields.
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_value()))
            .collect();
        Value::Object(map)
    }

    /// Convert into a typed instance of its class.
    pub fn into_instance<T: Mapped>(self) -> MapperResult<T> {
        if !self.is::<T>() {
            return Err(MapperError::ClassMismatch {
                record: self.class.name().to_string(),
                requested: T::class_name().to_string(),
            });
        }
        Ok(serde_json::from_value(self.to_value())?)
    }
}

/// The outcome of reconstructing a raw source.
#[derive(Clone, Debug, PartialEq)]
pub enum Reconstructed {
    /// There was no source; no instance was created.
    Absent,
    One(Record),
    Many(Vec<FieldValue>),
}

impl Reconstructed {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn into_one(self) -> Option<Record> {
        match self {
            Self::One(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_many(self) -> Option<Vec<FieldValue>> {
        match self {
            Self::Many(values) => Some(values),
            _ => None,
        }
    }
}
