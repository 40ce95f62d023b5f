//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use glucolog_common::Error;
use serde_json::json;
use tracing::error;

/// Wraps the common error type for use as an Axum handler rejection
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            Error::InvalidInput(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Error::Authentication(_) | Error::Upstream { .. } | Error::Network(_) => {
                (StatusCode::BAD_GATEWAY, self.0.to_string())
            }
            _ => {
                error!("Request failed: {}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (Error::Authentication("x".into()), StatusCode::BAD_GATEWAY),
            (
                Error::Upstream {
                    status: 500,
                    message: "x".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (Error::Network("x".into()), StatusCode::BAD_GATEWAY),
            (
                Error::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            let response = ApiError(error).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
