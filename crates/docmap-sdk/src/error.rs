use docmap_bulk::BulkError;
use docmap_mapper::MapperError;
use docmap_schema::SchemaError;
use docmap_store::StoreError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocmapError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Mapper(#[from] MapperError),

    /// Errors from the store, exactly as the client reported them.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Bulk(BulkError),

    /// A write was addressed without a document.
    #[error("document is missing")]
    DocumentMissing,

    #[error("id is missing when {operation} a {class}")]
    IdMissing { operation: &'static str, class: String },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Bulk failures that wrap a store or mapping error surface as that error.
impl From<BulkError> for DocmapError {
    fn from(error: BulkError) -> Self {
        match error {
            BulkError::Store(error) => Self::Store(error),
            BulkError::Mapper(error) => Self::Mapper(error),
            other => Self::Bulk(other),
        }
    }
}

pub type DocmapResult<T> = Result<T, DocmapError>;
