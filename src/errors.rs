use sea_orm::error::DbErr;

// gRPC error mapping module
#[cfg(feature = "grpc")]
pub mod grpc;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Storage failure other than a missing row.
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Conversion aborted after some order items were already written in the
    /// enclosing transaction. The transaction is rolled back, so none of them
    /// are kept.
    #[error("Conversion aborted after {processed} of {total} items: {source}")]
    PartialFailure {
        processed: usize,
        total: usize,
        #[source]
        source: Box<ServiceError>,
    },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Queue error: {0}")]
    QueueError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {} not found", kind, id))
    }

    /// Innermost error, looking through `PartialFailure` wrappers.
    pub fn root_cause(&self) -> &ServiceError {
        match self {
            ServiceError::PartialFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), ServiceError::NotFound(_))
    }

    /// Stable machine-readable code, used as a log field.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "storage_error",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::PartialFailure { .. } => "partial_failure",
            Self::Timeout(_) => "timeout",
            Self::QueueError(_) => "queue_error",
            Self::SerializationError(_) => "serialization_error",
            Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_unwraps_partial_failure() {
        let err = ServiceError::PartialFailure {
            processed: 2,
            total: 5,
            source: Box::new(ServiceError::not_found("Product", "abc")),
        };
        assert!(err.is_not_found());
        assert_eq!(err.error_code(), "partial_failure");
        assert_eq!(err.root_cause().error_code(), "not_found");
        assert_eq!(
            err.to_string(),
            "Conversion aborted after 2 of 5 items: Not found: Product abc not found"
        );
    }

    #[test]
    fn db_errors_convert_to_storage_errors() {
        let err: ServiceError = DbErr::Custom("connection reset".into()).into();
        assert_eq!(err.error_code(), "storage_error");
        assert!(!err.is_not_found());
    }
}
