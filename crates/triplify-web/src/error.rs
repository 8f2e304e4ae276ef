//! Error-to-response mapping.
//!
//! Handlers return `Result<_, ApiError>`; the client always receives a
//! JSON body with an `error` field and a matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
use triplify_common::TriplifyError;

#[derive(Debug)]
pub struct ApiError(pub TriplifyError);

impl<E> From<E> for ApiError
where
    E: Into<TriplifyError>,
{
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TriplifyError::Unauthorized => StatusCode::UNAUTHORIZED,
            TriplifyError::Locked => StatusCode::LOCKED,
            TriplifyError::Forbidden => StatusCode::FORBIDDEN,
            TriplifyError::NotFound(_) => StatusCode::NOT_FOUND,
            TriplifyError::Auth(_)
            | TriplifyError::Query(_)
            | TriplifyError::Convert(_)
            | TriplifyError::Csv(_)
            | TriplifyError::Turtle(_)
            | TriplifyError::Serialization(_) => StatusCode::BAD_REQUEST,
            TriplifyError::Store { .. } | TriplifyError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_their_status_codes() {
        let response = ApiError(TriplifyError::Unauthorized).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = ApiError(TriplifyError::Locked).into_response();
        assert_eq!(response.status(), StatusCode::LOCKED);
        let response = ApiError(TriplifyError::Forbidden).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn bad_payloads_are_client_errors() {
        let response = ApiError(TriplifyError::Query("nope".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_failures_are_gateway_errors() {
        let response = ApiError(TriplifyError::Store { status: 500, body: "x".to_string() })
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
