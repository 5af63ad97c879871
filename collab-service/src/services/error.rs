use super::remote::RemoteError;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote service error in {operation}: {message}")]
    RemoteService {
        operation: &'static str,
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(anyhow::Error),
}

impl From<RemoteError> for BrokerError {
    fn from(err: RemoteError) -> Self {
        BrokerError::RemoteService {
            operation: err.operation,
            message: err.message,
        }
    }
}

impl From<mongodb::error::Error> for BrokerError {
    fn from(err: mongodb::error::Error) -> Self {
        BrokerError::Storage(anyhow::Error::new(err))
    }
}

impl From<mongodb::bson::ser::Error> for BrokerError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        BrokerError::Storage(anyhow::Error::new(err))
    }
}

impl From<BrokerError> for AppError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::PermissionDenied(e) => AppError::Forbidden(anyhow::anyhow!(e)),
            BrokerError::NotFound(e) => AppError::NotFound(anyhow::anyhow!(e)),
            BrokerError::RemoteService { operation, message } => {
                AppError::BadGateway(format!("{}: {}", operation, message))
            }
            BrokerError::Validation(e) => AppError::BadGateway(e),
            BrokerError::Storage(e) => AppError::DatabaseError(e),
        }
    }
}
