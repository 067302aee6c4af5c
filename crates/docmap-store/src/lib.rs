//! Document store client contract for docmap.
//!
//! The mapping engine drives a document store through the [`StoreClient`]
//! trait. It builds requests and unpacks two response shapes: a single
//! document under `_source`, and many documents under `hits.hits[]._source`.
//! Transport, retries and consistency are the client's business.
//!
//! # Backends
//!
//! - [`InMemoryStore`] -- in-process store for tests and embedding, with a
//!   call log and failure injection
//!
//! # Design Rules
//!
//! 1. Store errors reach callers unchanged.
//! 2. Nothing here retries.
//! 3. Requests are plain data; building one never touches the network.

pub mod error;
pub mod memory;
pub mod request;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryStore, Operation, RecordedCall};
pub use request::{
    AckResponse, BulkRequest, BulkResponse, CountResponse, GetResponse, Hit, Hits, SearchResponse,
    StoreRequest, WriteResponse,
};
pub use traits::StoreClient;
