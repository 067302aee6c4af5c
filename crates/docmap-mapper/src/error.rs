use docmap_schema::SchemaError;

/// Errors from reconstruction and request resolution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapperError {
    /// Missing or invalid schema metadata.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A single instance was requested from a source holding several.
    #[error("cannot build {class} from {found}")]
    UnexpectedSource { class: String, found: &'static str },

    /// A value meant to be a document is not a JSON object.
    #[error("document must be an object, found {found}")]
    NotADocument { found: &'static str },

    /// A record was converted into a type other than its class.
    #[error("record of class {record} cannot become a {requested}")]
    ClassMismatch {
        record: String,
        requested: String,
    },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MapperError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for mapper operations.
pub type MapperResult<T> = Result<T, MapperError>;

/// Short name of a JSON value's kind, for error messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
