//! Index administration for mapped classes.

use serde_json::{json, Value};
use tracing::debug;

use docmap_schema::{compile, ClassId, IndexDescriptor, Mapped, Registry};
use docmap_store::{AckResponse, StoreClient, StoreRequest};

use crate::error::DocmapResult;

/// Index administration, addressed by class. The configured prefix applies
/// to every index name.
pub struct Indices<'a, C> {
    client: &'a C,
    registry: &'a Registry,
    prefix: Option<&'a str>,
}

impl<'a, C: StoreClient> Indices<'a, C> {
    pub(crate) fn new(client: &'a C, registry: &'a Registry, prefix: Option<&'a str>) -> Self {
        Self {
            client,
            registry,
            prefix,
        }
    }

    fn descriptor<T: Mapped>(&self) -> DocmapResult<IndexDescriptor> {
        Ok(self.registry.resolve_index(ClassId::of::<T>(), self.prefix)?)
    }

    /// Create the index of class `T` with its declared settings.
    pub async fn create<T: Mapped>(&self) -> DocmapResult<AckResponse> {
        let descriptor = self.descriptor::<T>()?;
        let mut request = StoreRequest::new().index(descriptor.index);
        if let Some(settings) = descriptor.settings {
            request = request.body(settings);
        }
        Ok(self.client.create_index(request).await?)
    }

    pub async fn delete<T: Mapped>(&self) -> DocmapResult<AckResponse> {
        let descriptor = self.descriptor::<T>()?;
        Ok(self.client.delete_index(StoreRequest::new().index(descriptor.index)).await?)
    }

    pub async fn exists<T: Mapped>(&self) -> DocmapResult<bool> {
        let descriptor = self.descriptor::<T>()?;
        Ok(self.client.index_exists(StoreRequest::new().index(descriptor.index)).await?)
    }

    /// Flush the index of class `T`. Extra parameters travel in `params`;
    /// an index already set there wins.
    pub async fn flush<T: Mapped>(&self, params: StoreRequest) -> DocmapResult<AckResponse> {
        let descriptor = self.descriptor::<T>()?;
        let mut request = params;
        if request.index.is_none() {
            request.index = Some(descriptor.index);
        }
        Ok(self.client.flush_index(request).await?)
    }

    pub async fn refresh<T: Mapped>(&self) -> DocmapResult<AckResponse> {
        let descriptor = self.descriptor::<T>()?;
        Ok(self.client.refresh_index(StoreRequest::new().index(descriptor.index)).await?)
    }

    /// Install the compiled mapping of class `T`. Undeclared fields are
    /// rejected by the store (`"dynamic": "strict"`).
    pub async fn put_mapping<T: Mapped>(&self) -> DocmapResult<AckResponse> {
        let descriptor = self.descriptor::<T>()?;
        let properties = compile(self.registry.property_tree::<T>()?);
        debug!(index = %descriptor.index, type_name = %descriptor.type_name, fields = properties.len(), "putting mapping");

        let request = StoreRequest::new()
            .targeting(&descriptor.index, &descriptor.type_name)
            .body(json!({
                "dynamic": "strict",
                "properties": Value::Object(properties),
            }));
        Ok(self.client.put_mapping(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Docmap, DocmapConfig, DocmapError};
    use docmap_schema::{FieldSpec, IndexOptions, IndexSpec, Mapped, RegistryBuilder, SchemaError};
    use docmap_store::{InMemoryStore, StoreClient, StoreError, StoreRequest};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Country {
        name: Option<String>,
    }
    impl Mapped for Country {}

    #[derive(Debug, Serialize, Deserialize)]
    struct City {
        name: Option<String>,
        country: Option<Country>,
    }
    impl Mapped for City {}

    fn docmap(prefix: &str) -> Docmap<InMemoryStore> {
        let mut builder = RegistryBuilder::new();
        builder
            .class::<Country>()
            .field("name", "keyword")
            .unwrap();
        builder
            .class::<City>()
            .index(
                IndexSpec::path("geo/city")
                    .with_options(IndexOptions::default().with_settings(json!({ "number_of_shards": 2 }))),
            )
            .unwrap()
            .field("name", FieldSpec::of_type("text").option("boost", json!(2)))
            .unwrap()
            .field("country", FieldSpec::nested::<Country>())
            .unwrap();
        Docmap::new(InMemoryStore::new(), builder.freeze(), DocmapConfig::with_prefix(prefix))
    }

    #[tokio::test]
    async fn create_uses_declared_settings() {
        let docmap = docmap("t_");
        let indices = docmap.indices();
        assert!(!indices.exists::<City>().await.unwrap());
        assert!(indices.create::<City>().await.unwrap().acknowledged);
        assert!(indices.exists::<City>().await.unwrap());
        assert_eq!(
            docmap.client().settings("t_geo"),
            Some(json!({ "number_of_shards": 2 }))
        );
    }

    #[tokio::test]
    async fn put_mapping_sends_the_compiled_tree() {
        let docmap = docmap("t_");
        let indices = docmap.indices();
        indices.create::<City>().await.unwrap();
        indices.put_mapping::<City>().await.unwrap();

        assert_eq!(
            docmap.client().mapping("t_geo", "city"),
            Some(json!({
                "dynamic": "strict",
                "properties": {
                    "name": { "type": "text", "boost": 2 },
                    "country": {
                        "type": "nested",
                        "properties": { "name": { "type": "keyword" } }
                    }
                }
            }))
        );
    }

    #[tokio::test]
    async fn flush_refresh_and_delete() {
        let docmap = docmap("");
        let indices = docmap.indices();
        indices.create::<City>().await.unwrap();
        indices
            .flush::<City>(StoreRequest::new().param("wait_if_ongoing", json!(true)))
            .await
            .unwrap();
        indices.refresh::<City>().await.unwrap();
        indices.delete::<City>().await.unwrap();

        let err = indices.refresh::<City>().await.unwrap_err();
        assert_eq!(err, DocmapError::Store(StoreError::IndexNotFound("geo".into())));
    }

    #[tokio::test]
    async fn class_without_index_is_rejected_before_the_store() {
        let docmap = docmap("");
        let err = docmap.indices().create::<Country>().await.unwrap_err();
        assert_eq!(err, DocmapError::Schema(SchemaError::MissingIndex("Country".into())));
        assert!(docmap.client().calls().is_empty());
    }

    #[tokio::test]
    async fn admin_calls_use_the_prefixed_index() {
        let docmap = docmap("t_");
        docmap.indices().create::<City>().await.unwrap();
        let exists = docmap
            .client()
            .index_exists(StoreRequest::new().index("geo"))
            .await
            .unwrap();
        assert!(!exists);
    }
}
