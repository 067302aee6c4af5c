//! Resolution of call shapes into canonical request descriptors.
//!
//! Every store operation can be addressed several ways: with an instance,
//! with a class and an id, with a class and a partial document, and so on.
//! Each shape has its own entry point on [`QueryResolver`]; [`Target`] names
//! the shape so operations can accept any of them.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use docmap_schema::{id_value, ClassId, Mapped, Registry};

use crate::error::{json_kind, MapperError, MapperResult};
use crate::partial::Partial;

/// Canonical request shape.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryStructure {
    pub class: ClassId,
    pub document: Option<Map<String, Value>>,
    /// The document id; empty when none was given or derivable.
    pub id: String,
    pub index: String,
    pub type_name: String,
}

impl QueryStructure {
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }
}

/// The ways a call can address a document.
#[derive(Debug)]
pub enum Target<'a, T> {
    /// A full instance; the id comes from its primary field.
    Instance(&'a T),
    /// A full instance with an explicit id.
    InstanceWithId(&'a T, String),
    /// The class alone.
    Class,
    /// The class and an explicit id.
    Id(String),
    /// The class and a partial document; the id comes from its primary field.
    Partial(Partial<T>),
    /// The class, an explicit id and a partial document.
    IdAndPartial(String, Partial<T>),
}

impl<'a, T: Mapped> Target<'a, T> {
    pub fn instance(instance: &'a T) -> Self {
        Self::Instance(instance)
    }

    pub fn instance_with_id(instance: &'a T, id: impl Into<String>) -> Self {
        Self::InstanceWithId(instance, id.into())
    }

    pub fn class() -> Self {
        Self::Class
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn partial(partial: Partial<T>) -> Self {
        Self::Partial(partial)
    }

    pub fn id_and_partial(id: impl Into<String>, partial: Partial<T>) -> Self {
        Self::IdAndPartial(id.into(), partial)
    }
}

/// Bulk action written in each action-description record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulkAction {
    Index,
    Create,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Create => "create",
        }
    }
}

/// Resolves call shapes against the registry, applying the index prefix.
#[derive(Clone, Copy)]
pub struct QueryResolver<'r> {
    registry: &'r Registry,
    prefix: Option<&'r str>,
}

impl<'r> QueryResolver<'r> {
    pub fn new(registry: &'r Registry, prefix: Option<&'r str>) -> Self {
        Self { registry, prefix }
    }

    pub fn from_instance<T: Mapped>(&self, instance: &T) -> MapperResult<QueryStructure> {
        let document = Partial::from_instance(instance)?.into_map();
        self.resolve_parts(ClassId::of::<T>(), Some(document), None)
    }

    pub fn from_instance_with_id<T: Mapped>(&self, instance: &T, id: &str) -> MapperResult<QueryStructure> {
        let document = Partial::from_instance(instance)?.into_map();
        self.resolve_parts(ClassId::of::<T>(), Some(document), Some(id))
    }

    pub fn from_class<T: Mapped>(&self) -> MapperResult<QueryStructure> {
        self.from_class_id(ClassId::of::<T>())
    }

    /// Like [`Self::from_class`], for a class known only by its id.
    pub fn from_class_id(&self, class: ClassId) -> MapperResult<QueryStructure> {
        self.resolve_parts(class, None, None)
    }

    pub fn from_class_and_id<T: Mapped>(&self, id: &str) -> MapperResult<QueryStructure> {
        self.resolve_parts(ClassId::of::<T>(), None, Some(id))
    }

    pub fn from_class_and_partial<T: Mapped>(&self, partial: Partial<T>) -> MapperResult<QueryStructure> {
        self.resolve_parts(ClassId::of::<T>(), Some(partial.into_map()), None)
    }

    pub fn from_class_id_and_partial<T: Mapped>(
        &self,
        id: &str,
        partial: Partial<T>,
    ) -> MapperResult<QueryStructure> {
        self.resolve_parts(ClassId::of::<T>(), Some(partial.into_map()), Some(id))
    }

    /// Resolve whichever shape `target` names.
    pub fn resolve<T: Mapped>(&self, target: Target<'_, T>) -> MapperResult<QueryStructure> {
        match target {
            Target::Instance(instance) => self.from_instance(instance),
            Target::InstanceWithId(instance, id) => self.from_instance_with_id(instance, &id),
            Target::Class => self.from_class::<T>(),
            Target::Id(id) => self.from_class_and_id::<T>(&id),
            Target::Partial(partial) => self.from_class_and_partial(partial),
            Target::IdAndPartial(id, partial) => self.from_class_id_and_partial(&id, partial),
        }
    }

    /// Shared resolution. An empty explicit id counts as no id, in which
    /// case the primary field of the document (if declared) supplies it.
    fn resolve_parts(
        &self,
        class: ClassId,
        document: Option<Map<String, Value>>,
        id: Option<&str>,
    ) -> MapperResult<QueryStructure> {
        let descriptor = self.registry.resolve_index(class, self.prefix)?;

        let id = id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| {
                let primary = descriptor.primary.as_ref()?;
                document.as_ref()?.get(primary).and_then(id_value)
            })
            .unwrap_or_default();

        debug!(class = %class, index = %descriptor.index, id = %id, "query resolved");
        Ok(QueryStructure {
            class,
            document,
            id,
            index: descriptor.index,
            type_name: descriptor.type_name,
        })
    }

    /// Build a bulk request body: an action-description record followed by
    /// the document, for each document in order.
    ///
    /// `_id` is written only when the class declares a primary field and the
    /// document carries a non-empty value for it.
    pub fn bulk_body<I, D>(&self, action: BulkAction, class: ClassId, documents: I) -> MapperResult<Vec<Value>>
    where
        I: IntoIterator<Item = D>,
        D: Serialize,
    {
        let descriptor = self.registry.resolve_index(class, self.prefix)?;
        let documents = documents.into_iter();
        let mut body = Vec::with_capacity(documents.size_hint().0 * 2);

        for document in documents {
            let document = match serde_json::to_value(document)? {
                Value::Object(map) => map,
                other => {
                    return Err(MapperError::NotADocument {
                        found: json_kind(&other),
                    })
                }
            };

            let mut description = Map::new();
            description.insert("_index".into(), Value::String(descriptor.index.clone()));
            description.insert("_type".into(), Value::String(descriptor.type_name.clone()));
            if let Some(id) = descriptor
                .primary
                .as_ref()
                .and_then(|primary| document.get(primary))
                .and_then(id_value)
            {
                description.insert("_id".into(), Value::String(id));
            }

            let mut record = Map::new();
            record.insert(action.as_str().into(), Value::Object(description));
            body.push(Value::Object(record));
            body.push(Value::Object(document));
        }

        Ok(body)
    }
}
