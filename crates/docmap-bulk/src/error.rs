use docmap_mapper::MapperError;
use docmap_store::StoreError;

/// Errors that abort a bulk pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BulkError {
    /// A chunk could not be turned into a bulk body.
    #[error(transparent)]
    Mapper(#[from] MapperError),

    /// The store rejected a chunk submission.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The item source reported a failure.
    #[error("bulk source failed: {0}")]
    Source(String),

    /// The pipeline stopped consuming the source.
    #[error("bulk source abandoned by the pipeline")]
    Abandoned,
}

impl BulkError {
    pub fn source_failure(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }
}

/// Convenience alias for bulk operations.
pub type BulkResult<T> = Result<T, BulkError>;
