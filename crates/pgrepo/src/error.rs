//! Error types for pgrepo

use thiserror::Error;

/// Result type alias for pgrepo operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for statement compilation and execution
#[derive(Debug, Error)]
pub enum OrmError {
    /// A where/sort/select references a property the model does not declare
    #[error("Unknown property '{property}' on model '{model}'")]
    UnknownProperty { model: String, property: String },

    /// A relation column points at a model missing from the registry
    #[error("Unable to find model '{related}' referenced by {model}.{property}")]
    UnknownRelatedModel {
        model: String,
        property: String,
        related: String,
    },

    /// An insert row lacks a value for a required column
    #[error("Create statement for '{model}' is missing value for required field: {property}")]
    MissingRequiredField { model: String, property: String },

    /// A comparison or relation value is unset
    #[error("Undefined value: {0}")]
    UndefinedValue(String),

    /// A pattern/comparison constraint was given a value of the wrong shape
    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    /// An ordering operator was applied to an array or json column
    #[error("Operator '{operator}' is not supported for property '{property}'")]
    UnsupportedOperator { operator: String, property: String },

    /// Invalid limit/skip or statement arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Invalid model metadata
    #[error("Validation error: {0}")]
    Validation(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create an unknown-property error
    pub fn unknown_property(model: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            model: model.into(),
            property: property.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Whether the error was raised while compiling a statement, before any I/O.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownProperty { .. }
                | Self::UnknownRelatedModel { .. }
                | Self::MissingRequiredField { .. }
                | Self::UndefinedValue(_)
                | Self::InvalidConstraint(_)
                | Self::UnsupportedOperator { .. }
                | Self::InvalidArgument(_)
        )
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_errors_are_classified() {
        assert!(OrmError::unknown_property("Product", "nope").is_compile_error());
        assert!(OrmError::InvalidArgument("limit".into()).is_compile_error());
        assert!(!OrmError::not_found("row").is_compile_error());
    }

    #[test]
    fn unknown_property_message_names_model() {
        let err = OrmError::unknown_property("Product", "nope");
        assert_eq!(err.to_string(), "Unknown property 'nope' on model 'Product'");
    }
}
