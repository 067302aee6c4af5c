//! Rebuilding instances from raw documents.

use serde_json::{Map, Value};

use docmap_schema::{ClassId, FieldKind, Mapped, PropertyTree, Registry};

use crate::error::{MapperError, MapperResult};
use crate::record::{FieldValue, Record, Reconstructed};

/// Rebuilds instance graphs from raw documents, guided by the registry.
///
/// Pure and synchronous: it only transforms data that was already fetched.
#[derive(Clone, Copy)]
pub struct DocumentMapper<'r> {
    registry: &'r Registry,
}

impl<'r> DocumentMapper<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Reconstruct `class` from `source`.
    ///
    /// - no source, or a falsy one (`null`, `false`, `0`, `""`): [`Reconstructed::Absent`]
    /// - an array: one value per element, see [`FieldValue`]
    /// - an object: one record
    /// - any other value: one record with no fields
    ///
    /// Only declared fields present in the source are written. Undeclared
    /// keys are dropped.
    pub fn reconstruct(&self, class: ClassId, source: Option<&Value>) -> MapperResult<Reconstructed> {
        let tree = self.registry.property_tree_of(class)?;
        Ok(match source {
            None => Reconstructed::Absent,
            Some(value) if is_falsy(value) => Reconstructed::Absent,
            Some(Value::Array(items)) => {
                Reconstructed::Many(items.iter().map(|item| embedded_value(class, tree, item)).collect())
            }
            Some(Value::Object(map)) => Reconstructed::One(build_record(class, tree, map)),
            Some(_) => Reconstructed::One(Record::new(class)),
        })
    }

    /// Reconstruct a single typed instance. An array source is an error.
    pub fn instantiate<T: Mapped>(&self, source: Option<&Value>) -> MapperResult<Option<T>> {
        match self.reconstruct(ClassId::of::<T>(), source)? {
            Reconstructed::Absent => Ok(None),
            Reconstructed::One(record) => record.into_instance().map(Some),
            Reconstructed::Many(_) => Err(MapperError::UnexpectedSource {
                class: T::class_name().to_string(),
                found: "array",
            }),
        }
    }

    /// Reconstruct typed instances from an array source.
    ///
    /// A missing source yields no instances; a single object yields one.
    /// Falsy array elements stay in place as `None`.
    pub fn instantiate_all<T: Mapped>(&self, source: Option<&Value>) -> MapperResult<Vec<Option<T>>> {
        let values = match self.reconstruct(ClassId::of::<T>(), source)? {
            Reconstructed::Absent => Vec::new(),
            Reconstructed::One(record) => vec![FieldValue::Object(record)],
            Reconstructed::Many(values) => values,
        };
        values
            .into_iter()
            .map(|value| match value {
                FieldValue::Object(record) => record.into_instance().map(Some),
                _ => Ok(None),
            })
            .collect()
    }
}

/// `null`, `false`, `0` and `""`: values copied as they are instead of
/// being turned into instances.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// One instance of `class` built from `raw`. Falsy values are kept verbatim;
/// a value that is not an object yields an instance with no fields.
fn embedded_value(class: ClassId, tree: &PropertyTree, raw: &Value) -> FieldValue {
    match raw {
        raw if is_falsy(raw) => FieldValue::Leaf(raw.clone()),
        Value::Object(map) => FieldValue::Object(build_record(class, tree, map)),
        _ => FieldValue::Object(Record::new(class)),
    }
}

fn build_record(class: ClassId, tree: &PropertyTree, source: &Map<String, Value>) -> Record {
    let mut record = Record::new(class);
    for (name, descriptor) in tree {
        let Some(raw) = source.get(name) else {
            continue;
        };

        let value = match (&descriptor.embedded, descriptor.kind, raw) {
            (_, FieldKind::Leaf, raw) | (None, _, raw) => FieldValue::Leaf(raw.clone()),
            (Some(embedded), FieldKind::Object, raw) => embedded_value(embedded.class, &embedded.properties, raw),
            (Some(embedded), FieldKind::Nested, Value::Array(items)) => FieldValue::Nested(
                items
                    .iter()
                    .map(|item| embedded_value(embedded.class, &embedded.properties, item))
                    .collect(),
            ),
            // Not an array: nothing to map element-wise.
            (Some(_), FieldKind::Nested, raw) => FieldValue::Leaf(raw.clone()),
        };
        record.set(name, value);
    }
    record
}
