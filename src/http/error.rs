// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application error type mapping to HTTP status codes.
//!
//! Every error body has the shape `{"error": "<message>"}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::errors::ServiceError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Bad request input (400).
    Validation(String),
    /// Model or store failure (500).
    Internal(String),
}

impl AppError {
    /// Maps a service error, prefixing internal failures with what the
    /// endpoint was doing (e.g. "Failed to search").
    pub fn from_service(err: ServiceError, action: &str) -> Self {
        if err.is_validation() {
            AppError::Validation(err.to_string())
        } else {
            tracing::error!(error = %err, "{}", action);
            AppError::Internal(format!("{}: {}", action, err))
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(reason = %rejection.body_text(), "rejected request body");
        AppError::Validation(ServiceError::MissingText.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let response = AppError::from_service(ServiceError::EmptyText, "Failed to search").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_failure_maps_to_internal() {
        let err = AppError::from_service(
            ServiceError::Store(anyhow::anyhow!("disk full")),
            "Failed to create embedding",
        );
        match &err {
            AppError::Internal(msg) => {
                assert_eq!(msg, "Failed to create embedding: vector store failed: disk full")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
