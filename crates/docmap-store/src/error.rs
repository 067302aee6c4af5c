/// Errors reported by a document store.
///
/// The engine never wraps, retries or suppresses these; they reach the
/// caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The requested document does not exist.
    #[error("document not found: {index}/{id}")]
    NotFound { index: String, id: String },

    /// The requested index does not exist.
    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// A document with the same index, type and id already exists.
    #[error("version conflict: {index}/{id} already exists")]
    Conflict { index: String, id: String },

    /// The store refused the request (validation, malformed body, ...).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Network or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The client was closed.
    #[error("client is closed")]
    Closed,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
