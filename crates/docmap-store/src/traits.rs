//! The [`StoreClient`] trait: what the engine needs from a document store.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::request::{
    AckResponse, BulkRequest, BulkResponse, CountResponse, GetResponse, SearchResponse,
    StoreRequest, WriteResponse,
};

/// Client for a document store.
///
/// The engine only assembles requests and unpacks responses. Transport,
/// retries and consistency belong to the implementation. Errors must be
/// reported as-is; callers never see them rewritten.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Submit a bulk body of action/document pairs.
    async fn bulk(&self, request: BulkRequest) -> StoreResult<BulkResponse>;

    /// Fetch one document by id.
    async fn get(&self, request: StoreRequest) -> StoreResult<GetResponse>;

    async fn search(&self, request: StoreRequest) -> StoreResult<SearchResponse>;

    /// Fetch the next page of a scrolled search. The cursor travels in the
    /// `scroll_id` parameter.
    async fn scroll(&self, request: StoreRequest) -> StoreResult<SearchResponse>;

    /// Release a scroll cursor before it is drained. Unknown ids are not an
    /// error.
    async fn clear_scroll(&self, request: StoreRequest) -> StoreResult<AckResponse>;

    async fn count(&self, request: StoreRequest) -> StoreResult<CountResponse>;

    /// Store a new document; fails if the id is already taken.
    async fn create(&self, request: StoreRequest) -> StoreResult<WriteResponse>;

    /// Store a document, replacing any previous version.
    async fn index(&self, request: StoreRequest) -> StoreResult<WriteResponse>;

    /// Partially update a document; the body is `{"doc": {...}}`.
    async fn update(&self, request: StoreRequest) -> StoreResult<WriteResponse>;

    async fn delete(&self, request: StoreRequest) -> StoreResult<WriteResponse>;

    /// Release the connection. Later calls may fail with `Closed`.
    async fn close(&self) -> StoreResult<()>;

    // ---- Index administration ----

    /// Create an index; the body carries its settings.
    async fn create_index(&self, request: StoreRequest) -> StoreResult<AckResponse>;

    async fn delete_index(&self, request: StoreRequest) -> StoreResult<AckResponse>;

    async fn index_exists(&self, request: StoreRequest) -> StoreResult<bool>;

    async fn flush_index(&self, request: StoreRequest) -> StoreResult<AckResponse>;

    async fn refresh_index(&self, request: StoreRequest) -> StoreResult<AckResponse>;

    /// Install a mapping for a type of an index.
    async fn put_mapping(&self, request: StoreRequest) -> StoreResult<AckResponse>;
}
