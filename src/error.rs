use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

use crate::market::MarketError;

#[derive(Debug, ThisError)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("password hashing error: {0}")]
    PasswordHash(String),

    #[error("token encoding error: {0}")]
    TokenEncoding(#[source] jsonwebtoken::errors::Error),

    #[error("multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("market data error: {0}")]
    Market(#[from] MarketError),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    fn parts(self) -> (StatusCode, ApiErrorBody) {
        let (status, code, message) = match self {
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", msg),
            ApiError::BadRequest(msg) | ApiError::Spreadsheet(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Multipart(e) => {
                let status = e.status();
                let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "PAYLOAD_TOO_LARGE"
                } else {
                    "BAD_REQUEST"
                };
                (status, code, e.body_text())
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Market(MarketError::CircuitOpen) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "MARKET_UNAVAILABLE",
                "Market data provider is temporarily unavailable.".to_string(),
            ),
            ApiError::Market(e) => {
                error!(error = %e, "market data request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "BAD_GATEWAY",
                    "Market data provider is unavailable.".to_string(),
                )
            }
            ApiError::Database(_)
            | ApiError::Json(_)
            | ApiError::Io(_)
            | ApiError::PasswordHash(_)
            | ApiError::TokenEncoding(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred.".to_string(),
            ),
        };
        (
            status,
            ApiErrorBody {
                code: code.to_string(),
                message,
            },
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if matches!(
            self,
            ApiError::Database(_)
                | ApiError::Json(_)
                | ApiError::Io(_)
                | ApiError::PasswordHash(_)
                | ApiError::TokenEncoding(_)
        ) {
            error!(error = %self, "request failed with internal error");
        }
        let (status, body) = self.parts();
        let mut resp = (status, Json(ApiErrorResponse { error: body })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            resp.headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        resp
    }
}

/// Standardized API error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: ApiError) -> (StatusCode, ApiErrorResponse, bool) {
        let resp = err.into_response();
        let status = resp.status();
        let has_challenge = resp.headers().contains_key(WWW_AUTHENTICATE);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap(), has_challenge)
    }

    #[tokio::test]
    async fn not_found_keeps_message() {
        let (status, body, _) = body_of(ApiError::not_found("Watchlist not found")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "NOT_FOUND");
        assert_eq!(body.error.message, "Watchlist not found");
    }

    #[tokio::test]
    async fn unauthorized_sets_bearer_challenge() {
        let (status, body, challenge) =
            body_of(ApiError::unauthorized("Could not validate credentials")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error.message, "Could not validate credentials");
        assert!(challenge);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body, _) = body_of(ApiError::PasswordHash("salt exploded".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.error.message.contains("salt"));
    }
}
