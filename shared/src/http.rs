//! Axum reply helpers for the downstream services: every success is an
//! envelope, every failure an RPC error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sea_orm::DbErr;
use serde::Serialize;
use tracing::{error, warn};

use crate::envelope::ResponseEnvelope;
use crate::error::{AppError, StoreError};

#[derive(Debug)]
pub struct ApiError(pub AppError);

impl<E: Into<AppError>> From<E> for ApiError {
    fn from(e: E) -> Self {
        ApiError(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let rpc = self.0.to_rpc_error();
        let status = StatusCode::from_u16(rpc.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        (status, Json(rpc)).into_response()
    }
}

pub type Reply<T> = Result<(StatusCode, Json<ResponseEnvelope<T>>), ApiError>;

pub fn ok<T: Serialize>(data: T, message: &str) -> Reply<T> {
    Ok((StatusCode::OK, Json(ResponseEnvelope::success_with(data, message))))
}

pub fn created<T: Serialize>(data: T, message: &str) -> Reply<T> {
    Ok((StatusCode::CREATED, Json(ResponseEnvelope::success_with(data, message))))
}

pub fn db_err(e: DbErr) -> AppError {
    StoreError::from(e).into()
}

/// Path ids arrive as text so a bad value still gets an error envelope.
pub fn parse_id(raw: &str) -> Result<i32, AppError> {
    raw.parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::BadRequest("Validation failed (numeric string is expected)".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::HttpBody;

    #[tokio::test]
    async fn errors_render_as_rpc_error_bodies() {
        let res = ApiError(AppError::Conflict("Email already registered".into())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let bytes = res.into_body().data().await.unwrap().unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["statusCode"], serde_json::json!(409));
        assert_eq!(body["message"], serde_json::json!("Email already registered"));
        assert_eq!(body["error"], serde_json::json!("Conflict"));
    }

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_id("12").unwrap(), 12);
        assert_eq!(parse_id("abc").unwrap_err().status_code(), 400);
        assert!(parse_id("0").is_err());
        assert!(parse_id("-3").is_err());
    }

    #[test]
    fn store_failures_keep_their_status() {
        assert_eq!(db_err(DbErr::RecordNotFound("submissions".into())).status_code(), 404);
        let err: AppError = StoreError::UniqueViolation("users_email_key".into()).into();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn success_replies_carry_their_status() {
        let (status, Json(env)) = created(serde_json::json!({"id": 1}), "Exam created").unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(env.error.is_none());
        let (status, _) = ok((), "done").unwrap();
        assert_eq!(status, StatusCode::OK);
    }
}
