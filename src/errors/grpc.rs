use tonic::Status;
use tracing::error;

use super::ServiceError;

/// Extension trait for converting ServiceError to gRPC Status with proper codes
pub trait IntoGrpcStatus {
    fn into_grpc_status(self) -> Status;
}

impl IntoGrpcStatus for ServiceError {
    fn into_grpc_status(self) -> Status {
        match self {
            ServiceError::NotFound(msg) => Status::not_found(msg),
            ServiceError::ValidationError(msg) | ServiceError::InvalidInput(msg) => {
                Status::invalid_argument(msg)
            }
            ServiceError::PartialFailure {
                processed,
                total,
                source,
            } => {
                error!(processed, total, "Conversion aborted: {}", source);
                Status::aborted(format!(
                    "Conversion aborted after {} of {} items: {}",
                    processed,
                    total,
                    source.into_grpc_status().message()
                ))
            }
            ServiceError::Timeout(msg) => Status::deadline_exceeded(msg),
            ServiceError::DatabaseError(err) => {
                error!("Database error: {}", err);
                Status::internal("Database operation failed")
            }
            ServiceError::QueueError(msg) => {
                error!("Queue error: {}", msg);
                Status::internal("Message queue operation failed")
            }
            ServiceError::SerializationError(msg) => {
                error!("Serialization error: {}", msg);
                Status::internal("Data serialization failed")
            }
            ServiceError::InternalError(msg) => {
                error!("Internal error: {}", msg);
                Status::internal("Internal server error")
            }
            ServiceError::Other(err) => {
                error!("Other error: {}", err);
                Status::internal("An unexpected error occurred")
            }
        }
    }
}

/// Helper function to map Result<T, ServiceError> to Result<T, Status>
pub fn map_service_error<T>(result: Result<T, ServiceError>) -> Result<T, Status> {
    result.map_err(|e| e.into_grpc_status())
}
