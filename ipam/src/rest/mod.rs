//! REST API.
//!
//! Thin JSON surface over the allocation engine. Every mutating endpoint
//! maps to exactly one engine operation; authentication is left to whatever
//! sits in front of the daemon.

pub mod handlers;
pub mod routes;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::engine::Engine;
use crate::error::{Error, ErrorKind};

pub use routes::{ApiDoc, create_router};

/// Shared application state
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// API error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub code: u32,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: 400,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code {
            400 => StatusCode::BAD_REQUEST,
            404 => StatusCode::NOT_FOUND,
            409 => StatusCode::CONFLICT,
            503 => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let code = match e.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Exhausted => 503,
            ErrorKind::Internal => {
                error!(error = %e, "Request failed");
                500
            }
        };
        ApiError {
            error: e.to_string(),
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let cases = [
            (Error::InvalidCidr("x".to_string()), 400),
            (Error::AddressNotFound("10.0.0.1".to_string()), 404),
            (Error::AlreadyFree("10.0.0.1".to_string()), 409),
            (Error::PoolExhausted, 503),
            (Error::Corrupt("bad".to_string()), 500),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError::from(err).code, code);
        }
    }

    #[test]
    fn test_error_status() {
        let response = ApiError::bad_request("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::from(Error::PoolExhausted).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
