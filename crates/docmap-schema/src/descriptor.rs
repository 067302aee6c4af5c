//! Index and property descriptors, and the declaration inputs that build them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::class::{ClassId, Mapped};
use crate::error::{SchemaError, SchemaResult};

// ---------------------------------------------------------------------------
// Index descriptor
// ---------------------------------------------------------------------------

/// Resolved index metadata for a class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Store index name, lowercased.
    pub index: String,
    /// Store type name, lowercased.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Field the document id is read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    /// Opaque index settings, sent when the index is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

impl IndexDescriptor {
    /// A copy of this descriptor with `prefix` prepended to the index name.
    pub fn prefixed(&self, prefix: Option<&str>) -> Self {
        let mut copy = self.clone();
        if let Some(prefix) = prefix {
            copy.index = format!("{prefix}{}", self.index);
        }
        copy
    }
}

/// Options accepted by an index declaration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexOptions {
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub settings: Option<Value>,
}

impl IndexOptions {
    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = Some(settings);
        self
    }
}

/// An index declaration: an optional `"index"` / `"index/type"` path plus
/// options. Path segments win over the options' `index`/`type`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexSpec {
    path: Option<String>,
    options: IndexOptions,
}

impl IndexSpec {
    /// Index and type both derived from the class name.
    pub fn class_default() -> Self {
        Self::default()
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            options: IndexOptions::default(),
        }
    }

    pub fn options(options: IndexOptions) -> Self {
        Self {
            path: None,
            options,
        }
    }

    /// Attach options to a path declaration (typically for settings).
    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve `(index, type)` names for a class called `class_name`.
    ///
    /// Empty strings count as "not given". Both names are lowercased.
    pub(crate) fn resolve_names(&self, class_name: &str) -> SchemaResult<(String, String)> {
        let non_empty = |s: &Option<String>| s.clone().filter(|v| !v.is_empty());

        let name = non_empty(&self.path)
            .or_else(|| non_empty(&self.options.index))
            .unwrap_or_else(|| class_name.to_string());

        let mut parts = name.split('/');
        let index = parts.next().unwrap_or_default().to_string();
        let type_name = parts
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| non_empty(&self.options.type_name))
            .unwrap_or_else(|| index.clone());

        if index.is_empty() {
            return Err(SchemaError::IndexUndefined {
                class: class_name.to_string(),
            });
        }

        Ok((index.to_lowercase(), type_name.to_lowercase()))
    }

    pub(crate) fn settings(&self) -> Option<&Value> {
        self.options.settings.as_ref()
    }
}

impl From<&str> for IndexSpec {
    fn from(path: &str) -> Self {
        Self::path(path)
    }
}

impl From<String> for IndexSpec {
    fn from(path: String) -> Self {
        Self::path(path)
    }
}

impl From<IndexOptions> for IndexSpec {
    fn from(options: IndexOptions) -> Self {
        Self::options(options)
    }
}

// ---------------------------------------------------------------------------
// Property descriptors
// ---------------------------------------------------------------------------

/// How a field maps onto the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Scalar value with store-facing options only.
    Leaf,
    /// A single embedded document of another class.
    Object,
    /// An array of embedded documents of another class.
    Nested,
}

impl FieldKind {
    pub fn is_embedded(&self) -> bool {
        !matches!(self, Self::Leaf)
    }
}

/// Ordered mapping from field name to descriptor, in declaration order.
pub type PropertyTree = IndexMap<String, PropertyDescriptor>;

/// The schema of an embedded class, captured when the field was declared.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddedSchema {
    pub class: ClassId,
    pub properties: PropertyTree,
}

/// One declared field.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDescriptor {
    pub kind: FieldKind,
    /// Store-facing options (`type`, `analyzer`, `boost`, ...).
    pub options: Map<String, Value>,
    /// Present for `object` and `nested` fields only.
    pub embedded: Option<EmbeddedSchema>,
}

impl PropertyDescriptor {
    /// A leaf field with the given options.
    pub fn leaf(options: Map<String, Value>) -> Self {
        Self {
            kind: FieldKind::Leaf,
            options,
            embedded: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Field declarations
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum FieldShape {
    Type(String),
    Options(Value),
    Object(ClassId),
    Nested(ClassId),
}

/// A field declaration: a bare type tag, an options object, or a reference
/// to another class embedded as `object` or `nested`.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSpec {
    shape: FieldShape,
    extra: Map<String, Value>,
}

impl FieldSpec {
    /// A bare type tag such as `"text"` or `"integer"`.
    pub fn of_type(type_tag: impl Into<String>) -> Self {
        Self::from_shape(FieldShape::Type(type_tag.into()))
    }

    /// Raw store-facing options. Must be a JSON object.
    pub fn options(options: Value) -> Self {
        Self::from_shape(FieldShape::Options(options))
    }

    /// A single embedded document of class `T`.
    pub fn object<T: Mapped>() -> Self {
        Self::from_shape(FieldShape::Object(ClassId::of::<T>()))
    }

    /// An array of embedded documents of class `T`.
    pub fn nested<T: Mapped>() -> Self {
        Self::from_shape(FieldShape::Nested(ClassId::of::<T>()))
    }

    /// Add one store-facing option on top of the declaration.
    pub fn option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    fn from_shape(shape: FieldShape) -> Self {
        Self {
            shape,
            extra: Map::new(),
        }
    }

    /// The class this field embeds, if any, with its kind.
    pub(crate) fn embedded_class(&self) -> Option<(FieldKind, ClassId)> {
        match self.shape {
            FieldShape::Object(class) => Some((FieldKind::Object, class)),
            FieldShape::Nested(class) => Some((FieldKind::Nested, class)),
            _ => None,
        }
    }

    /// Build the store-facing options for field `name`.
    pub(crate) fn build_options(&self, name: &str) -> SchemaResult<Map<String, Value>> {
        let mut options = match &self.shape {
            FieldShape::Type(tag) => {
                let mut map = Map::new();
                map.insert("type".into(), Value::String(tag.clone()));
                map
            }
            FieldShape::Options(Value::Object(map)) => map.clone(),
            FieldShape::Options(other) => {
                return Err(SchemaError::InvalidFieldOptions {
                    field: name.to_string(),
                    found: json_kind(other).to_string(),
                })
            }
            FieldShape::Object(_) => type_only("object"),
            FieldShape::Nested(_) => type_only("nested"),
        };
        for (key, value) in &self.extra {
            options.insert(key.clone(), value.clone());
        }
        Ok(options)
    }
}

impl From<&str> for FieldSpec {
    fn from(type_tag: &str) -> Self {
        Self::of_type(type_tag)
    }
}

impl From<Value> for FieldSpec {
    fn from(options: Value) -> Self {
        Self::options(options)
    }
}

fn type_only(tag: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("type".into(), Value::String(tag.into()));
    map
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
