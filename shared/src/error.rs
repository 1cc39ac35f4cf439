use serde_json::json;
use thiserror::Error;

use crate::envelope::Message;
use crate::rpc_error::RpcError;
use crate::transaction::TransactionFailure;
use crate::validation::ValidationErrors;

/// Classified failure of a backing store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("foreign key constraint failed: {0}")]
    ForeignKeyViolation(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store error: {0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Transaction(#[from] TransactionFailure),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => 400,
            AppError::Unauthorized(_) => 401,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::Transaction(failure) => failure.status_code(),
            AppError::Store(err) => store_status(err),
            AppError::Internal(_) => 500,
        }
    }

    /// Converts the failure into the shape sent back over the internal
    /// channel. Store and internal details are not forwarded.
    pub fn to_rpc_error(&self) -> RpcError {
        let status = self.status_code();
        match self {
            AppError::Validation(errors) => RpcError::new(
                status,
                Message::Many(errors.messages()),
                json!({ "fields": errors.errors() }),
            ),
            AppError::NotFound(msg) => RpcError::new(status, msg.as_str(), "NotFound"),
            AppError::BadRequest(msg) => RpcError::new(status, msg.as_str(), "BadRequest"),
            AppError::Conflict(msg) => RpcError::new(status, msg.as_str(), "Conflict"),
            AppError::Unauthorized(msg) => RpcError::new(status, msg.as_str(), "Unauthorized"),
            AppError::Transaction(TransactionFailure::Store(err)) | AppError::Store(err) => {
                let (message, kind) = store_message(err);
                RpcError::new(status, message, kind)
            }
            AppError::Transaction(failure) => {
                RpcError::new(status, failure.public_message(), failure.kind())
            }
            AppError::Internal(_) => RpcError::new(status, "Internal server error", "InternalError"),
        }
    }
}

pub(crate) fn store_status(err: &StoreError) -> u16 {
    match err {
        StoreError::UniqueViolation(_) => 409,
        StoreError::ForeignKeyViolation(_) => 400,
        StoreError::NotFound(_) => 404,
        StoreError::Unavailable(_) => 503,
        StoreError::Other(_) => 500,
    }
}

fn store_message(err: &StoreError) -> (&'static str, &'static str) {
    match err {
        StoreError::UniqueViolation(_) => {
            ("A record with this value already exists", "UniqueConstraintViolation")
        }
        StoreError::ForeignKeyViolation(_) => {
            ("Foreign key constraint failed", "ForeignKeyConstraintViolation")
        }
        StoreError::NotFound(_) => ("Record not found", "RecordNotFound"),
        StoreError::Unavailable(_) => ("Service temporarily unavailable", "ServiceUnavailable"),
        StoreError::Other(_) => ("Database operation failed", "DatabaseError"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrors;

    #[test]
    fn validation_errors_become_message_lists() {
        let mut errors = ValidationErrors::default();
        errors.push("email", "email must be an email");
        errors.push("password", "password must be longer than or equal to 6 characters");
        let rpc = AppError::from(errors).to_rpc_error();
        assert_eq!(rpc.status_code(), 400);
        assert!(rpc.message().is_many());
        assert_eq!(rpc.error()["fields"][0]["field"], "email");
    }

    #[test]
    fn store_errors_hide_raw_detail() {
        let err = AppError::Store(StoreError::UniqueViolation("users_email_key".into()));
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.status_code(), 409);
        assert_eq!(rpc.error(), &json!("UniqueConstraintViolation"));
        assert!(!rpc.message().joined().contains("users_email_key"));
    }

    #[test]
    fn business_errors_keep_their_status() {
        assert_eq!(AppError::Conflict("already graded".into()).status_code(), 409);
        assert_eq!(AppError::NotFound("x".into()).to_rpc_error().status(), 404);
        assert_eq!(AppError::Internal("boom".into()).to_rpc_error().message().joined(), "Internal server error");
    }

    #[test]
    fn transaction_failures_map_to_distinct_statuses() {
        let timeout = AppError::from(TransactionFailure::Timeout(5000)).to_rpc_error();
        assert_eq!(timeout.status_code(), 504);
        assert_eq!(timeout.error(), &json!("TransactionTimeout"));

        let wait = AppError::from(TransactionFailure::MaxWaitExceeded(100)).to_rpc_error();
        assert_eq!(wait.status_code(), 503);
        assert_eq!(wait.error(), &json!("TransactionMaxWaitExceeded"));

        let store = AppError::from(TransactionFailure::Store(StoreError::Other("x".into())));
        assert_eq!(store.status_code(), 500);
    }
}
