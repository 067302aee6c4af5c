//! High-level API for docmap.
//!
//! [`Docmap`] ties a frozen schema registry to a store client. It offers
//! typed reads (`get`, `search`, `scroll`, `count`), writes addressed by any
//! [`Target`] shape (`create`, `index`, `update`, `delete`), chunked bulk
//! indexing, and per-class index administration through [`Indices`].
//!
//! This is the main entry point for applications embedding docmap.

pub mod config;
pub mod error;
pub mod handle;
pub mod indices;

pub use handle::{Docmap, Fetched, Found};
pub use config::DocmapConfig;
pub use error::{DocmapError, DocmapResult};
pub use indices::Indices;

// Re-export key types
pub use docmap_bulk::{BulkFeeder, BulkReport, BulkSource, MAX_CHUNK_SIZE};
pub use docmap_mapper::{Partial, Target};
pub use docmap_schema::{ClassId, FieldSpec, IndexOptions, IndexSpec, Mapped, Registry, RegistryBuilder, Schema};
pub use docmap_store::{InMemoryStore, StoreClient, StoreError, StoreRequest};
