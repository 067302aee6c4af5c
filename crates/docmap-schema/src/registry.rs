//! The class-keyed schema registry.
//!
//! Registration happens on a [`RegistryBuilder`], once, at program start.
//! [`RegistryBuilder::freeze`] turns it into an immutable [`Registry`] that
//! readers share for the rest of the process. Nothing mutates a frozen
//! registry, so readers need no locking.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::class::{ClassId, Mapped};
use crate::descriptor::{
    EmbeddedSchema, FieldSpec, IndexDescriptor, IndexSpec, PropertyDescriptor, PropertyTree,
};
use crate::error::{SchemaError, SchemaResult};

/// A type that declares its own schema.
///
/// ```
/// use docmap_schema::{ClassDeclaration, Mapped, RegistryBuilder, Schema, SchemaResult};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Tweet {
///     id: Option<String>,
///     message: Option<String>,
/// }
///
/// impl Mapped for Tweet {}
///
/// impl Schema for Tweet {
///     fn declare(class: &mut ClassDeclaration<'_>) -> SchemaResult<()> {
///         class
///             .index("twitter/tweet")?
///             .field("id", "keyword")?
///             .primary()?
///             .field("message", "text")?;
///         Ok(())
///     }
/// }
///
/// let mut builder = RegistryBuilder::new();
/// builder.register::<Tweet>().unwrap();
/// let registry = builder.freeze();
/// assert_eq!(registry.index_descriptor::<Tweet>().unwrap().index, "twitter");
/// ```
pub trait Schema: Mapped {
    fn declare(class: &mut ClassDeclaration<'_>) -> SchemaResult<()>;
}

/// Registration state for one class.
#[derive(Clone, Debug, Default)]
struct ClassEntry {
    /// `(index, type)`, set by an index declaration.
    names: Option<(String, String)>,
    primary: Option<String>,
    settings: Option<Value>,
    properties: PropertyTree,
}

impl ClassEntry {
    fn descriptor(&self) -> Option<IndexDescriptor> {
        let (index, type_name) = self.names.clone()?;
        Some(IndexDescriptor {
            index,
            type_name,
            primary: self.primary.clone(),
            settings: self.settings.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// RegistryBuilder
// ---------------------------------------------------------------------------

/// Mutable registry used during the registration phase.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: HashMap<ClassId, ClassEntry>,
    /// Classes in first-declaration order.
    order: Vec<ClassId>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, class: ClassId) -> &mut ClassEntry {
        if !self.entries.contains_key(&class) {
            self.order.push(class);
        }
        self.entries.entry(class).or_default()
    }

    /// Declare (or re-declare) the index of `class`.
    ///
    /// Merges into any earlier declaration: a primary field declared before
    /// the index is kept. Settings are replaced by this declaration's.
    pub fn declare_index(&mut self, class: ClassId, spec: impl Into<IndexSpec>) -> SchemaResult<()> {
        let spec = spec.into();
        let (index, type_name) = spec.resolve_names(class.name())?;
        debug!(class = %class, %index, type_name = %type_name, "index declared");
        let entry = self.entry(class);
        entry.names = Some((index, type_name));
        entry.settings = spec.settings().cloned();
        Ok(())
    }

    /// Append a field to the property tree of `class`.
    ///
    /// An `object`/`nested` field copies the referenced class's property tree
    /// as it stands now, so referenced classes must be declared first.
    pub fn declare_field(
        &mut self,
        class: ClassId,
        name: &str,
        spec: impl Into<FieldSpec>,
    ) -> SchemaResult<()> {
        let spec = spec.into();

        let exists = self
            .entries
            .get(&class)
            .is_some_and(|entry| entry.properties.contains_key(name));
        if exists {
            return Err(SchemaError::DuplicateField {
                class: class.name().to_string(),
                field: name.to_string(),
            });
        }

        let options = spec.build_options(name)?;
        let descriptor = match spec.embedded_class() {
            Some((kind, referenced)) => PropertyDescriptor {
                kind,
                options,
                embedded: Some(EmbeddedSchema {
                    class: referenced,
                    properties: self.property_tree_of(referenced)?.clone(),
                }),
            },
            None => PropertyDescriptor::leaf(options),
        };

        debug!(class = %class, field = name, kind = ?descriptor.kind, "field declared");
        self.entry(class)
            .properties
            .insert(name.to_string(), descriptor);
        Ok(())
    }

    /// Mark `name` as the id source of `class`.
    pub fn declare_primary(&mut self, class: ClassId, name: &str) -> SchemaResult<()> {
        let entry = self.entry(class);
        if let Some(existing) = &entry.primary {
            return Err(SchemaError::DuplicatePrimary {
                class: class.name().to_string(),
                existing: existing.clone(),
                field: name.to_string(),
            });
        }
        entry.primary = Some(name.to_string());
        debug!(class = %class, field = name, "primary declared");
        Ok(())
    }

    /// Start a fluent declaration for `T`.
    pub fn class<T: Mapped>(&mut self) -> ClassDeclaration<'_> {
        ClassDeclaration {
            builder: self,
            class: ClassId::of::<T>(),
            current_field: None,
        }
    }

    /// Run `T`'s own [`Schema::declare`].
    pub fn register<T: Schema>(&mut self) -> SchemaResult<()> {
        let mut declaration = self.class::<T>();
        T::declare(&mut declaration)
    }

    fn property_tree_of(&self, class: ClassId) -> SchemaResult<&PropertyTree> {
        self.entries
            .get(&class)
            .map(|entry| &entry.properties)
            .filter(|properties| !properties.is_empty())
            .ok_or_else(|| SchemaError::MissingProperties(class.name().to_string()))
    }

    /// End the registration phase.
    pub fn freeze(self) -> Registry {
        debug!(classes = self.order.len(), "registry frozen");
        Registry {
            entries: self.entries,
            order: self.order,
        }
    }
}

// ---------------------------------------------------------------------------
// ClassDeclaration
// ---------------------------------------------------------------------------

/// Fluent declaration handle for one class.
pub struct ClassDeclaration<'a> {
    builder: &'a mut RegistryBuilder,
    class: ClassId,
    current_field: Option<String>,
}

impl ClassDeclaration<'_> {
    pub fn class_id(&self) -> ClassId {
        self.class
    }

    pub fn index(&mut self, spec: impl Into<IndexSpec>) -> SchemaResult<&mut Self> {
        self.builder.declare_index(self.class, spec)?;
        Ok(self)
    }

    pub fn field(&mut self, name: &str, spec: impl Into<FieldSpec>) -> SchemaResult<&mut Self> {
        self.builder.declare_field(self.class, name, spec)?;
        self.current_field = Some(name.to_string());
        Ok(self)
    }

    /// Mark the most recently declared field as primary.
    pub fn primary(&mut self) -> SchemaResult<&mut Self> {
        let field = self
            .current_field
            .clone()
            .ok_or_else(|| SchemaError::NoCurrentField(self.class.name().to_string()))?;
        self.builder.declare_primary(self.class, &field)?;
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Frozen, read-only registry.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<ClassId, ClassEntry>,
    order: Vec<ClassId>,
}

impl Registry {
    /// Index descriptor of `class`, as declared (no prefix).
    pub fn index_descriptor_of(&self, class: ClassId) -> SchemaResult<IndexDescriptor> {
        self.entries
            .get(&class)
            .and_then(ClassEntry::descriptor)
            .ok_or_else(|| SchemaError::MissingIndex(class.name().to_string()))
    }

    pub fn index_descriptor<T: Mapped>(&self) -> SchemaResult<IndexDescriptor> {
        self.index_descriptor_of(ClassId::of::<T>())
    }

    /// Index descriptor of `class` with `prefix` applied to the index name.
    pub fn resolve_index(&self, class: ClassId, prefix: Option<&str>) -> SchemaResult<IndexDescriptor> {
        Ok(self.index_descriptor_of(class)?.prefixed(prefix))
    }

    /// Property tree of `class`.
    pub fn property_tree_of(&self, class: ClassId) -> SchemaResult<&PropertyTree> {
        self.entries
            .get(&class)
            .map(|entry| &entry.properties)
            .filter(|properties| !properties.is_empty())
            .ok_or_else(|| SchemaError::MissingProperties(class.name().to_string()))
    }

    pub fn property_tree<T: Mapped>(&self) -> SchemaResult<&PropertyTree> {
        self.property_tree_of(ClassId::of::<T>())
    }

    /// Every class with a declared index, in declaration order.
    pub fn indexed_classes(&self) -> Vec<ClassId> {
        self.order
            .iter()
            .filter(|class| {
                self.entries
                    .get(class)
                    .is_some_and(|entry| entry.names.is_some())
            })
            .copied()
            .collect()
    }

    /// The id carried by `document` in the primary field of `class`.
    ///
    /// Strings are used as-is and numbers are stringified; anything else
    /// (including an empty string or a missing field) yields `None`.
    pub fn primary_id(&self, class: ClassId, document: &Map<String, Value>) -> SchemaResult<Option<String>> {
        let descriptor = self.index_descriptor_of(class)?;
        let primary = descriptor
            .primary
            .ok_or_else(|| SchemaError::MissingPrimaryKeyDefinition(class.name().to_string()))?;
        Ok(document.get(&primary).and_then(id_value))
    }
}

/// Interpret a document value as an id.
pub fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldKind, IndexOptions};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct Tweet;
    impl Mapped for Tweet {}

    #[derive(Serialize, Deserialize)]
    struct Country;
    impl Mapped for Country {}

    #[derive(Serialize, Deserialize)]
    struct City;
    impl Mapped for City {}

    fn class<T: Mapped>() -> ClassId {
        ClassId::of::<T>()
    }

    #[test]
    fn default_index_uses_class_name() {
        let mut builder = RegistryBuilder::new();
        builder.declare_index(class::<Tweet>(), IndexSpec::class_default()).unwrap();
        let registry = builder.freeze();
        let descriptor = registry.index_descriptor::<Tweet>().unwrap();
        assert_eq!(descriptor.index, "tweet");
        assert_eq!(descriptor.type_name, "tweet");
        assert_eq!(descriptor.primary, None);
    }

    #[test]
    fn undefined_index_is_rejected() {
        let mut builder = RegistryBuilder::new();
        let err = builder.declare_index(class::<Tweet>(), "/type").unwrap_err();
        assert!(matches!(err, SchemaError::IndexUndefined { .. }));
    }

    #[test]
    fn primary_before_index_is_merged() {
        let mut builder = RegistryBuilder::new();
        builder.declare_primary(class::<Tweet>(), "id").unwrap();
        builder.declare_index(class::<Tweet>(), "twitter/tweet").unwrap();
        let registry = builder.freeze();
        let descriptor = registry.index_descriptor::<Tweet>().unwrap();
        assert_eq!(descriptor.primary.as_deref(), Some("id"));
        assert_eq!(descriptor.index, "twitter");
    }

    #[test]
    fn settings_are_kept() {
        let mut builder = RegistryBuilder::new();
        let spec = IndexSpec::path("tweeter/twt")
            .with_options(IndexOptions::default().with_settings(json!({ "number_of_shards": 3 })));
        builder.declare_index(class::<Tweet>(), spec).unwrap();
        let registry = builder.freeze();
        assert_eq!(
            registry.index_descriptor::<Tweet>().unwrap().settings,
            Some(json!({ "number_of_shards": 3 }))
        );
    }

    #[test]
    fn duplicate_primary_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.declare_primary(class::<Tweet>(), "id").unwrap();
        let err = builder.declare_primary(class::<Tweet>(), "uid").unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicatePrimary {
                class: "Tweet".into(),
                existing: "id".into(),
                field: "uid".into()
            }
        );
    }

    #[test]
    fn duplicate_field_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.declare_field(class::<Tweet>(), "name", "text").unwrap();
        let err = builder.declare_field(class::<Tweet>(), "name", "keyword").unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateField {
                class: "Tweet".into(),
                field: "name".into()
            }
        );
    }

    #[test]
    fn same_field_name_on_different_classes() {
        let mut builder = RegistryBuilder::new();
        builder.declare_field(class::<Tweet>(), "name", "text").unwrap();
        builder.declare_field(class::<City>(), "name", "text").unwrap();
    }

    #[test]
    fn missing_metadata_errors() {
        let registry = RegistryBuilder::new().freeze();
        assert_eq!(
            registry.index_descriptor::<Tweet>().unwrap_err(),
            SchemaError::MissingIndex("Tweet".into())
        );
        assert_eq!(
            registry.property_tree::<Tweet>().unwrap_err(),
            SchemaError::MissingProperties("Tweet".into())
        );
    }

    #[test]
    fn index_without_fields_has_no_properties() {
        let mut builder = RegistryBuilder::new();
        builder.declare_index(class::<Tweet>(), IndexSpec::class_default()).unwrap();
        let registry = builder.freeze();
        assert!(registry.property_tree::<Tweet>().is_err());
    }

    #[test]
    fn embedded_fields_capture_referenced_tree() {
        let mut builder = RegistryBuilder::new();
        builder.declare_field(class::<Country>(), "name", "text").unwrap();
        builder
            .declare_field(class::<City>(), "country", FieldSpec::object::<Country>())
            .unwrap();
        builder
            .declare_field(class::<Tweet>(), "cities", FieldSpec::nested::<City>())
            .unwrap();
        let registry = builder.freeze();

        let cities = &registry.property_tree::<Tweet>().unwrap()["cities"];
        assert_eq!(cities.kind, FieldKind::Nested);
        let embedded = cities.embedded.as_ref().unwrap();
        assert!(embedded.class.is::<City>());
        let country = &embedded.properties["country"];
        assert_eq!(country.kind, FieldKind::Object);
        assert!(country.embedded.as_ref().unwrap().properties.contains_key("name"));
    }

    #[test]
    fn referencing_an_undeclared_class_fails() {
        let mut builder = RegistryBuilder::new();
        let err = builder
            .declare_field(class::<City>(), "country", FieldSpec::object::<Country>())
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingProperties("Country".into()));
    }

    #[test]
    fn fluent_declaration() {
        let mut builder = RegistryBuilder::new();
        builder
            .class::<Tweet>()
            .index(IndexSpec::class_default())
            .unwrap()
            .field("id", "keyword")
            .unwrap()
            .primary()
            .unwrap()
            .field("message", "text")
            .unwrap();
        let registry = builder.freeze();
        assert_eq!(
            registry.index_descriptor::<Tweet>().unwrap().primary.as_deref(),
            Some("id")
        );
        let names: Vec<&String> = registry.property_tree::<Tweet>().unwrap().keys().collect();
        assert_eq!(names, ["id", "message"]);
    }

    #[test]
    fn primary_needs_a_current_field() {
        let mut builder = RegistryBuilder::new();
        let err = builder.class::<Tweet>().primary().err().unwrap();
        assert_eq!(err, SchemaError::NoCurrentField("Tweet".into()));
    }

    #[test]
    fn indexed_classes_in_declaration_order() {
        let mut builder = RegistryBuilder::new();
        builder.declare_field(class::<Country>(), "name", "text").unwrap();
        builder.declare_index(class::<Tweet>(), IndexSpec::class_default()).unwrap();
        builder.declare_index(class::<City>(), IndexSpec::class_default()).unwrap();
        let registry = builder.freeze();
        assert_eq!(registry.indexed_classes(), vec![class::<Tweet>(), class::<City>()]);
    }

    #[test]
    fn primary_id_lookup() {
        let mut builder = RegistryBuilder::new();
        builder.declare_index(class::<Tweet>(), IndexSpec::class_default()).unwrap();
        builder.declare_primary(class::<Tweet>(), "id").unwrap();
        builder.declare_index(class::<City>(), IndexSpec::class_default()).unwrap();
        let registry = builder.freeze();

        let doc = |v: Value| v.as_object().unwrap().clone();
        assert_eq!(
            registry.primary_id(class::<Tweet>(), &doc(json!({ "id": "007" }))).unwrap(),
            Some("007".into())
        );
        assert_eq!(
            registry.primary_id(class::<Tweet>(), &doc(json!({ "id": 7 }))).unwrap(),
            Some("7".into())
        );
        assert_eq!(
            registry.primary_id(class::<Tweet>(), &doc(json!({ "id": "" }))).unwrap(),
            None
        );
        assert_eq!(
            registry.primary_id(class::<City>(), &doc(json!({ "id": "1" }))).unwrap_err(),
            SchemaError::MissingPrimaryKeyDefinition("City".into())
        );
    }
}
