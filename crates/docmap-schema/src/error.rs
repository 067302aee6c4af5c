/// Errors raised while declaring or reading class schemas.
///
/// Every variant is raised synchronously, before any store call is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The index path or options resolved to an empty index name.
    #[error("index undefined for class {class}")]
    IndexUndefined { class: String },

    /// A field name was declared twice for the same class.
    #[error("field {class}.{field} declared more than once")]
    DuplicateField { class: String, field: String },

    /// A second primary field was declared for a class.
    #[error("duplicate primary key for class {class} ({existing}, {field})")]
    DuplicatePrimary {
        class: String,
        existing: String,
        field: String,
    },

    /// The class was used before its index was declared.
    #[error("index is missing for class {0}")]
    MissingIndex(String),

    /// The class was used before any of its fields were declared.
    #[error("properties are missing for class {0}")]
    MissingProperties(String),

    /// An id was requested through the primary field of a class that has none.
    #[error("primary not defined for class {0}")]
    MissingPrimaryKeyDefinition(String),

    /// `primary()` was called on a declaration with no field declared yet.
    #[error("no field declared yet on class {0}; declare a field before marking it primary")]
    NoCurrentField(String),

    /// Field options must be a JSON object.
    #[error("invalid options for field {field}: expected an object, got {found}")]
    InvalidFieldOptions { field: String, found: String },

    /// The process-wide registry was installed twice.
    #[error("a registry is already installed for this process")]
    RegistryAlreadyInstalled,

    /// The process-wide registry was read before being installed.
    #[error("no registry installed for this process")]
    RegistryNotInstalled,
}

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
