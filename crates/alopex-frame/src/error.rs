/// Errors returned by `alopex-frame` operations.
#[derive(Debug, thiserror::Error)]
pub enum DataFrameError {
    /// No native constructor exists for the requested data type.
    #[error("unsupported data type: {variant}")]
    UnsupportedType { variant: String },

    /// A host value could not be coerced to the target type under strict mode.
    #[error("could not convert value {value} to {target}")]
    Conversion { value: String, target: String },

    /// A fixed-width host buffer of an unrecognized element kind.
    #[error("unsupported buffer kind: {ctor_name}")]
    UnsupportedBufferKind { ctor_name: String },

    /// Caller-contract violation on an option record.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Schema-related mismatch (e.g. duplicate names or different schema across batches).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// Data type mismatch (e.g. non-numeric aggregation or incompatible dtypes).
    #[error(
        "type mismatch{column}: expected {expected}, got {actual}",
        column = column_display(.column)
    )]
    TypeMismatch {
        column: Option<String>,
        expected: String,
        actual: String,
    },

    /// Referenced column does not exist.
    #[error("column not found: {name}")]
    ColumnNotFound { name: String },

    /// Operation is not supported or invalid for the current inputs.
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// Invalid configuration option was provided.
    #[error("invalid configuration option '{option}': {message}")]
    Configuration { option: String, message: String },

    /// Serialization or deserialization failed.
    #[error("{format} serialization error: {message}")]
    Serialization { format: String, message: String },

    /// Opaque failure reported by the execution engine.
    #[error("engine error: {message}")]
    Engine { message: String },

    /// Error originating from Arrow compute / record batch APIs.
    #[error("arrow error: {source}")]
    Arrow { source: arrow::error::ArrowError },
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, DataFrameError>;

impl DataFrameError {
    /// Create an unsupported data type error.
    pub fn unsupported_type(variant: impl Into<String>) -> Self {
        Self::UnsupportedType {
            variant: variant.into(),
        }
    }

    /// Create a strict-mode conversion error.
    pub fn conversion(value: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Conversion {
            value: value.into(),
            target: target.into(),
        }
    }

    /// Create an unsupported buffer kind error.
    pub fn unsupported_buffer_kind(ctor_name: impl Into<String>) -> Self {
        Self::UnsupportedBufferKind {
            ctor_name: ctor_name.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a schema mismatch error with a message.
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    /// Create a type mismatch error with optional column context.
    pub fn type_mismatch(
        column: impl Into<Option<String>>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            column: column.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a missing column error.
    pub fn column_not_found(name: impl Into<String>) -> Self {
        Self::ColumnNotFound { name: name.into() }
    }

    /// Create an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn configuration(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            option: option.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error for the given format.
    pub fn serialization(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Create an opaque engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }
}

impl From<arrow::error::ArrowError> for DataFrameError {
    fn from(source: arrow::error::ArrowError) -> Self {
        Self::Arrow { source }
    }
}

fn column_display(column: &Option<String>) -> String {
    column
        .as_ref()
        .map(|c| format!(" for column '{c}'"))
        .unwrap_or_default()
}
