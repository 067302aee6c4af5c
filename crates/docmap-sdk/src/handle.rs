//! The [`Docmap`] handle: typed document operations over a store client.

use std::ops::Deref;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use docmap_bulk::{BulkPipeline, BulkReport, BulkSource};
use docmap_mapper::{DocumentMapper, QueryResolver, QueryStructure, Target};
use docmap_schema::{global, ClassId, Mapped, Registry};
use docmap_store::{AckResponse, CountResponse, GetResponse, SearchResponse, StoreClient, StoreRequest, WriteResponse};

use crate::config::DocmapConfig;
use crate::error::{DocmapError, DocmapResult};
use crate::indices::Indices;

/// A fetched document with the raw store response.
#[derive(Clone, Debug)]
pub struct Fetched<T> {
    pub response: GetResponse,
    /// `None` when the response carries no source.
    pub document: Option<T>,
}

/// Documents of a search or scroll page with the raw store response.
#[derive(Clone, Debug)]
pub struct Found<T> {
    pub response: SearchResponse,
    /// One document per hit that carries a source, in hit order.
    pub documents: Vec<T>,
}

enum RegistryHandle {
    Shared(Arc<Registry>),
    Global(&'static Registry),
}

impl Deref for RegistryHandle {
    type Target = Registry;

    fn deref(&self) -> &Registry {
        match self {
            Self::Shared(registry) => registry,
            Self::Global(registry) => registry,
        }
    }
}

/// High-level docmap API.
///
/// Every metadata or validation failure is reported before the store is
/// called. Store failures are returned unchanged.
pub struct Docmap<C> {
    client: C,
    registry: RegistryHandle,
    config: DocmapConfig,
}

impl<C: StoreClient> Docmap<C> {
    pub fn new(client: C, registry: impl Into<Arc<Registry>>, config: DocmapConfig) -> Self {
        Self {
            client,
            registry: RegistryHandle::Shared(registry.into()),
            config,
        }
    }

    /// Use the process-wide registry; it must be installed already.
    pub fn with_global_registry(client: C, config: DocmapConfig) -> DocmapResult<Self> {
        Ok(Self {
            client,
            registry: RegistryHandle::Global(global::registry()?),
            config,
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &DocmapConfig {
        &self.config
    }

    /// Index administration for mapped classes.
    pub fn indices(&self) -> Indices<'_, C> {
        Indices::new(&self.client, &self.registry, self.config.prefix())
    }

    /// Every class with a declared index, in declaration order.
    pub fn indexed_classes(&self) -> Vec<ClassId> {
        self.registry.indexed_classes()
    }

    pub async fn close(&self) -> DocmapResult<()> {
        Ok(self.client.close().await?)
    }

    fn resolver(&self) -> QueryResolver<'_> {
        QueryResolver::new(&self.registry, self.config.prefix())
    }

    fn mapper(&self) -> DocumentMapper<'_> {
        DocumentMapper::new(&self.registry)
    }

    // ---- Reads ----

    /// Fetch the document of class `T` with the given id.
    pub async fn get<T: Mapped>(&self, id: &str) -> DocmapResult<Fetched<T>> {
        self.get_with(StoreRequest::new().id(id)).await
    }

    /// Fetch one document of class `T`. The index and type default to the
    /// class's; values already set on `request` win.
    pub async fn get_with<T: Mapped>(&self, request: StoreRequest) -> DocmapResult<Fetched<T>> {
        let query = self.resolver().from_class::<T>()?;
        let response = self.client.get(addressed(request, &query)).await?;
        let document = self.mapper().instantiate::<T>(response.source.as_ref())?;
        Ok(Fetched { response, document })
    }

    /// Search documents of class `T`. The index and type default to the
    /// class's; values already set on `request` win.
    pub async fn search<T: Mapped>(&self, request: StoreRequest) -> DocmapResult<Found<T>> {
        let query = self.resolver().from_class::<T>()?;
        let response = self.client.search(addressed(request, &query)).await?;
        self.found(response)
    }

    /// Fetch the next page of a scrolled search of class `T`.
    pub async fn scroll<T: Mapped>(&self, request: StoreRequest) -> DocmapResult<Found<T>> {
        // Fail on unmapped classes before the cursor advances.
        self.registry.property_tree::<T>()?;
        let response = self.client.scroll(request).await?;
        self.found(response)
    }

    /// Release a scroll cursor that will not be read to the end.
    pub async fn clear_scroll(&self, request: StoreRequest) -> DocmapResult<AckResponse> {
        Ok(self.client.clear_scroll(request).await?)
    }

    fn found<T: Mapped>(&self, response: SearchResponse) -> DocmapResult<Found<T>> {
        let mapper = self.mapper();
        let mut documents = Vec::with_capacity(response.hits.hits.len());
        for hit in &response.hits.hits {
            if let Some(document) = mapper.instantiate::<T>(hit.source.as_ref())? {
                documents.push(document);
            }
        }
        Ok(Found { response, documents })
    }

    /// Count documents of class `T`. The index and type default to the
    /// class's; values already set on `request` win.
    pub async fn count<T: Mapped>(&self, request: StoreRequest) -> DocmapResult<CountResponse> {
        let query = self.resolver().from_class::<T>()?;
        Ok(self.client.count(addressed(request, &query)).await?)
    }

    /// Count with a request passed through untouched.
    pub async fn count_raw(&self, request: StoreRequest) -> DocmapResult<CountResponse> {
        Ok(self.client.count(request).await?)
    }

    // ---- Writes ----

    /// Store a new document. Fails in the store if the id is taken.
    pub async fn create<T: Mapped>(&self, target: Target<'_, T>) -> DocmapResult<WriteResponse> {
        let request = self.write_request(target)?;
        Ok(self.client.create(request).await?)
    }

    /// Store a document, replacing any previous version. Without an id the
    /// store generates one.
    pub async fn index<T: Mapped>(&self, target: Target<'_, T>) -> DocmapResult<WriteResponse> {
        let request = self.write_request(target)?;
        Ok(self.client.index(request).await?)
    }

    /// Apply a partial document to an existing document.
    pub async fn update<T: Mapped>(&self, target: Target<'_, T>) -> DocmapResult<WriteResponse> {
        let QueryStructure {
            class,
            document,
            id,
            index,
            type_name,
        } = self.resolver().resolve(target)?;
        let document = document.ok_or(DocmapError::DocumentMissing)?;
        if id.is_empty() {
            return Err(id_missing("updating", class));
        }

        let request = StoreRequest::new()
            .targeting(&index, &type_name)
            .id(id)
            .body(json!({ "doc": document }));
        Ok(self.client.update(request).await?)
    }

    pub async fn delete<T: Mapped>(&self, target: Target<'_, T>) -> DocmapResult<WriteResponse> {
        let query = self.resolver().resolve(target)?;
        if !query.has_id() {
            return Err(id_missing("deleting", query.class));
        }

        let request = StoreRequest::new()
            .targeting(&query.index, &query.type_name)
            .id(query.id);
        Ok(self.client.delete(request).await?)
    }

    fn write_request<T: Mapped>(&self, target: Target<'_, T>) -> DocmapResult<StoreRequest> {
        let QueryStructure {
            document,
            id,
            index,
            type_name,
            ..
        } = self.resolver().resolve(target)?;
        let document = document.ok_or(DocmapError::DocumentMissing)?;

        let mut request = StoreRequest::new()
            .targeting(&index, &type_name)
            .body(Value::Object(document));
        if !id.is_empty() {
            request = request.id(id);
        }
        Ok(request)
    }

    // ---- Bulk ----

    /// Index every item of `source` as a document of class `T`, in chunks.
    ///
    /// Stops at the first failure; chunks submitted before it stay indexed.
    pub async fn bulk_index<T, D>(&self, source: impl Into<BulkSource<D>>) -> DocmapResult<BulkReport>
    where
        T: Mapped,
        D: Serialize + Send,
    {
        let mut pipeline = BulkPipeline::new(&self.client, self.resolver());
        Ok(pipeline.run::<T, D>(source.into()).await?)
    }
}

fn id_missing(operation: &'static str, class: ClassId) -> DocmapError {
    DocmapError::IdMissing {
        operation,
        class: class.name().to_string(),
    }
}

/// Fill in the class's index and type where `request` leaves them unset.
fn addressed(mut request: StoreRequest, query: &QueryStructure) -> StoreRequest {
    if request.index.is_none() {
        request.index = Some(query.index.clone());
    }
    if request.type_name.is_none() {
        request.type_name = Some(query.type_name.clone());
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmap_mapper::{MapperError, Partial};
    use docmap_schema::{ClassDeclaration, FieldSpec, RegistryBuilder, Schema, SchemaError, SchemaResult};
    use docmap_store::{InMemoryStore, Operation, StoreError};
    use serde::Deserialize;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Address {
        city: Option<String>,
    }
    impl Mapped for Address {}
    impl Schema for Address {
        fn declare(class: &mut ClassDeclaration<'_>) -> SchemaResult<()> {
            class.field("city", "keyword")?;
            Ok(())
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<Address>,
    }
    impl Mapped for User {}
    impl Schema for User {
        fn declare(class: &mut ClassDeclaration<'_>) -> SchemaResult<()> {
            class
                .index("app/user")?
                .field("id", "keyword")?
                .primary()?
                .field("name", "text")?
                .field("address", FieldSpec::object::<Address>())?;
            Ok(())
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Unmapped {
        id: String,
    }
    impl Mapped for Unmapped {}

    fn docmap(prefix: Option<&str>) -> Docmap<InMemoryStore> {
        let mut builder = RegistryBuilder::new();
        builder.register::<Address>().unwrap();
        builder.register::<User>().unwrap();
        let config = DocmapConfig {
            index_prefix: prefix.map(str::to_string),
        };
        Docmap::new(InMemoryStore::new(), builder.freeze(), config)
    }

    fn bob() -> User {
        User {
            id: Some("007".into()),
            name: Some("Bob".into()),
            address: Some(Address {
                city: Some("Paris".into()),
            }),
        }
    }

    #[tokio::test]
    async fn index_then_get_roundtrips_through_the_schema() {
        let docmap = docmap(None);
        let written = docmap.index(Target::instance(&bob())).await.unwrap();
        assert_eq!(written.id, "007");
        assert_eq!(written.index, "app");

        let fetched = docmap.get::<User>("007").await.unwrap();
        assert!(fetched.response.found);
        assert_eq!(fetched.document, Some(bob()));
    }

    #[tokio::test]
    async fn get_drops_undeclared_fields() {
        let docmap = docmap(None);
        docmap
            .client()
            .index(
                StoreRequest::new()
                    .targeting("app", "user")
                    .id("1")
                    .body(json!({ "id": "1", "name": "Tom", "age": 40 })),
            )
            .await
            .unwrap();

        let fetched = docmap.get::<User>("1").await.unwrap();
        assert_eq!(
            fetched.document,
            Some(User {
                id: Some("1".into()),
                name: Some("Tom".into()),
                address: None,
            })
        );
    }

    #[tokio::test]
    async fn missing_document_is_a_store_error() {
        let docmap = docmap(None);
        docmap.index(Target::instance(&bob())).await.unwrap();
        let err = docmap.get::<User>("nope").await.unwrap_err();
        assert_eq!(
            err,
            DocmapError::Store(StoreError::NotFound {
                index: "app".into(),
                id: "nope".into()
            })
        );
    }

    #[tokio::test]
    async fn prefix_applies_to_every_operation() {
        let docmap = docmap(Some("test_"));
        docmap.index(Target::instance(&bob())).await.unwrap();
        assert!(docmap.client().document("test_app", "user", "007").is_some());

        let count = docmap.count::<User>(StoreRequest::new()).await.unwrap();
        assert_eq!(count.count, 1);
        assert!(docmap.get::<User>("007").await.unwrap().document.is_some());
    }

    #[tokio::test]
    async fn index_without_id_lets_the_store_choose() {
        let docmap = docmap(None);
        let partial = Partial::<User>::new().with("name", json!("Anonymous"));
        let written = docmap.index(Target::partial(partial)).await.unwrap();
        assert!(written.id.starts_with("auto-"));
        let request = &docmap.client().calls_of(Operation::Index)[0].request;
        assert!(request.get("id").is_none());
    }

    #[tokio::test]
    async fn create_with_explicit_id() {
        let docmap = docmap(None);
        let partial = Partial::<User>::new().with("name", json!("Bob"));
        let written = docmap
            .create(Target::id_and_partial("42", partial.clone()))
            .await
            .unwrap();
        assert_eq!(written.id, "42");

        let err = docmap
            .create(Target::id_and_partial("42", partial))
            .await
            .unwrap_err();
        assert!(matches!(err, DocmapError::Store(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn writes_need_a_document() {
        let docmap = docmap(None);
        assert_eq!(
            docmap.index(Target::<User>::id("1")).await.unwrap_err(),
            DocmapError::DocumentMissing
        );
        assert_eq!(
            docmap.create(Target::<User>::class()).await.unwrap_err(),
            DocmapError::DocumentMissing
        );
        assert_eq!(
            docmap.update(Target::<User>::id("1")).await.unwrap_err(),
            DocmapError::DocumentMissing
        );
        assert!(docmap.client().calls().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_need_an_id() {
        let docmap = docmap(None);
        let partial = Partial::<User>::new().with("name", json!("Bob"));
        assert_eq!(
            docmap.update(Target::partial(partial)).await.unwrap_err(),
            DocmapError::IdMissing {
                operation: "updating",
                class: "User".into()
            }
        );
        assert_eq!(
            docmap.delete(Target::<User>::class()).await.unwrap_err(),
            DocmapError::IdMissing {
                operation: "deleting",
                class: "User".into()
            }
        );
        assert!(docmap.client().calls().is_empty());
    }

    #[tokio::test]
    async fn update_sends_a_partial_doc() {
        let docmap = docmap(None);
        docmap.index(Target::instance(&bob())).await.unwrap();

        let partial = Partial::<User>::new().with("name", json!("Robert"));
        docmap
            .update(Target::id_and_partial("007", partial))
            .await
            .unwrap();

        let request = &docmap.client().calls_of(Operation::Update)[0].request;
        assert_eq!(request["body"], json!({ "doc": { "name": "Robert" } }));
        let fetched = docmap.get::<User>("007").await.unwrap();
        assert_eq!(fetched.document.unwrap().name.as_deref(), Some("Robert"));
    }

    #[tokio::test]
    async fn delete_by_instance() {
        let docmap = docmap(None);
        docmap.index(Target::instance(&bob())).await.unwrap();
        let deleted = docmap.delete(Target::instance(&bob())).await.unwrap();
        assert_eq!(deleted.result, "deleted");
        assert_eq!(docmap.count::<User>(StoreRequest::new()).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn search_and_scroll_map_hits() {
        let docmap = docmap(None);
        let users: Vec<User> = (0..5)
            .map(|i| User {
                id: Some(i.to_string()),
                name: Some(format!("user {i}")),
                address: None,
            })
            .collect();
        docmap.bulk_index::<User, User>(users).await.unwrap();

        let page = docmap
            .search::<User>(
                StoreRequest::new()
                    .param("size", json!(3))
                    .param("scroll", json!("30s")),
            )
            .await
            .unwrap();
        assert_eq!(page.documents.len(), 3);
        assert_eq!(page.documents[0].name.as_deref(), Some("user 0"));

        let scroll_id = page.response.scroll_id.unwrap();
        let next = docmap
            .scroll::<User>(StoreRequest::new().param("scroll_id", json!(scroll_id)))
            .await
            .unwrap();
        assert_eq!(next.documents.len(), 2);
        assert_eq!(next.documents[1].id.as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn clear_scroll_releases_the_cursor() {
        let docmap = docmap(None);
        docmap.bulk_index::<User, User>(vec![bob()]).await.unwrap();

        let page = docmap
            .search::<User>(
                StoreRequest::new()
                    .param("size", json!(1))
                    .param("scroll", json!("30s")),
            )
            .await
            .unwrap();
        assert_eq!(docmap.client().open_scrolls(), 1);

        let scroll_id = page.response.scroll_id.unwrap();
        docmap
            .clear_scroll(StoreRequest::new().param("scroll_id", json!(scroll_id)))
            .await
            .unwrap();
        assert_eq!(docmap.client().open_scrolls(), 0);
        assert_eq!(docmap.client().calls_of(Operation::ClearScroll).len(), 1);
    }

    #[tokio::test]
    async fn odd_embedded_values_do_not_fail_a_page() {
        let docmap = docmap(None);
        for (id, address) in [("1", json!(null)), ("2", json!("Paris")), ("3", json!({ "city": "Lyon" }))] {
            docmap
                .client()
                .index(
                    StoreRequest::new()
                        .targeting("app", "user")
                        .id(id)
                        .body(json!({ "id": id, "address": address })),
                )
                .await
                .unwrap();
        }

        let page = docmap.search::<User>(StoreRequest::new()).await.unwrap();
        let addresses: Vec<_> = page.documents.iter().map(|user| user.address.clone()).collect();
        assert_eq!(
            addresses,
            vec![
                None,
                Some(Address { city: None }),
                Some(Address {
                    city: Some("Lyon".into())
                }),
            ]
        );
    }

    #[tokio::test]
    async fn explicit_request_target_wins() {
        let docmap = docmap(None);
        docmap
            .client()
            .index(
                StoreRequest::new()
                    .targeting("archive", "user")
                    .id("1")
                    .body(json!({ "name": "Old" })),
            )
            .await
            .unwrap();

        let found = docmap
            .search::<User>(StoreRequest::new().index("archive"))
            .await
            .unwrap();
        assert_eq!(found.documents.len(), 1);
        assert_eq!(docmap.count_raw(StoreRequest::new()).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn unmapped_class_fails_before_the_store() {
        let docmap = docmap(None);
        let err = docmap.get::<Unmapped>("1").await.unwrap_err();
        assert_eq!(
            err,
            DocmapError::Mapper(MapperError::Schema(SchemaError::MissingIndex("Unmapped".into())))
        );
        let err = docmap
            .scroll::<Unmapped>(StoreRequest::new().param("scroll_id", json!("scroll-1")))
            .await
            .unwrap_err();
        assert_eq!(err, DocmapError::Schema(SchemaError::MissingProperties("Unmapped".into())));
        assert!(docmap.client().calls().is_empty());
    }

    #[tokio::test]
    async fn bulk_failure_surfaces_the_store_error() {
        let docmap = docmap(None);
        docmap
            .client()
            .fail_next(Operation::Bulk, StoreError::Transport("timeout".into()));
        let err = docmap
            .bulk_index::<User, User>(vec![bob()])
            .await
            .unwrap_err();
        assert_eq!(err, DocmapError::Store(StoreError::Transport("timeout".into())));
    }

    #[tokio::test]
    async fn bulk_index_from_a_channel() {
        let docmap = docmap(None);
        let (feeder, source) = BulkSource::channel(4);
        let producer = tokio::spawn(async move {
            for i in 0..10 {
                let partial = Partial::<User>::new().with("id", json!(i)).with("name", json!("x"));
                feeder.send(partial).await?;
            }
            Ok::<_, docmap_bulk::BulkError>(())
        });

        let report = docmap.bulk_index::<User, Partial<User>>(source).await.unwrap();
        producer.await.unwrap().unwrap();
        assert_eq!(report, BulkReport { chunks: 1, documents: 10 });
        assert!(docmap.client().document("app", "user", "9").is_some());
    }

    #[tokio::test]
    async fn indexed_classes_lists_declared_indices() {
        let docmap = docmap(None);
        assert_eq!(docmap.indexed_classes(), vec![ClassId::of::<User>()]);
    }

    #[tokio::test]
    async fn global_registry_backs_a_handle() {
        let mut builder = RegistryBuilder::new();
        builder.register::<Address>().unwrap();
        builder.register::<User>().unwrap();
        global::install(builder.freeze()).unwrap();

        let docmap = Docmap::with_global_registry(InMemoryStore::new(), DocmapConfig::default()).unwrap();
        docmap.index(Target::instance(&bob())).await.unwrap();
        assert_eq!(docmap.get::<User>("007").await.unwrap().document, Some(bob()));
    }

    #[tokio::test]
    async fn close_reaches_the_client() {
        let docmap = docmap(None);
        docmap.close().await.unwrap();
        assert!(docmap.client().is_closed());
        assert_eq!(
            docmap.get::<User>("1").await.unwrap_err(),
            DocmapError::Store(StoreError::Closed)
        );
    }
}
