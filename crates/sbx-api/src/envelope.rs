//! The `{success, data|error, message, request_id}` response envelope every
//! endpoint wraps its body in (spec component C10), grounded on
//! `at-bridge`'s `ApiError`/`IntoResponse` pattern but widened to the
//! success/failure envelope shape this API requires instead of a bare
//! `{"error": msg}`.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use uuid::Uuid;

use sbx_core::error::AdmissionError;

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
    message: String,
    request_id: Uuid,
}

/// Wrap a successful payload with HTTP 200.
pub fn ok<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    respond(StatusCode::OK, data, message)
}

/// Wrap a successful payload with an explicit status (used for 202 accepted).
pub fn ok_with_status<T: Serialize>(status: StatusCode, data: T, message: impl Into<String>) -> Response {
    respond(status, data, message)
}

fn respond<T: Serialize>(status: StatusCode, data: T, message: impl Into<String>) -> Response {
    let body = Envelope {
        success: true,
        data: Some(data),
        error: None,
        message: message.into(),
        request_id: Uuid::new_v4(),
    };
    (status, Json(body)).into_response()
}

/// The admission-level error taxonomy (§7), mapped to its wire status and
/// wrapped in the same envelope shape as a success response.
pub struct ApiError(pub AdmissionError);

impl From<AdmissionError> for ApiError {
    fn from(e: AdmissionError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AdmissionError::Purl(_) => StatusCode::BAD_REQUEST,
            AdmissionError::Auth => StatusCode::UNAUTHORIZED,
            AdmissionError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            AdmissionError::NotFound(_) => StatusCode::NOT_FOUND,
            AdmissionError::Method => StatusCode::METHOD_NOT_ALLOWED,
            AdmissionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Envelope::<()> {
            success: false,
            data: None,
            error: Some(self.0.category()),
            message: self.0.to_string(),
            request_id: Uuid::new_v4(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbx_core::purl::PurlError;

    #[tokio::test]
    async fn auth_error_maps_to_401() {
        let resp = ApiError(AdmissionError::Auth).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn purl_error_maps_to_400() {
        let resp = ApiError(AdmissionError::Purl(PurlError::MissingScheme)).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn envelope_body_carries_success_flag() {
        let resp = ok(serde_json::json!({"task_id": "abc"}), "queued");
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["task_id"], "abc");
    }
}
