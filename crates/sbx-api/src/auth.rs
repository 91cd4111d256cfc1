//! Credential gate (spec component C2), grounded on `at-bridge`'s
//! `AuthLayer`/`AuthMiddleware` (header extraction: `X-API-Key` then
//! `Authorization: Bearer`, compared in constant time with `subtle`) but
//! reshaped into an axum `FromRequestParts` extractor, since a per-
//! credential gate needs an async store lookup and a `last_used` write that
//! a synchronous `tower::Layer` key comparison doesn't naturally support.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use subtle::ConstantTimeEq;

use sbx_core::error::AdmissionError;
use sbx_core::types::Credential;

use crate::envelope::ApiError;
use crate::state::ApiState;

/// Extracts and authenticates the caller's credential, applying the
/// per-credential fixed-window rate limit as part of extraction so no
/// handler can accidentally skip it.
pub struct AuthedCredential(pub Credential);

impl FromRequestParts<Arc<ApiState>> for AuthedCredential {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or(AdmissionError::Auth)?;

        let credential = state
            .store
            .credentials
            .get_by_key(&token)
            .await
            .map_err(|e| AdmissionError::Internal(e.to_string()))?
            .ok_or(AdmissionError::Auth)?;

        if !credential.is_active || !bool::from(credential.key.as_bytes().ct_eq(token.as_bytes())) {
            return Err(AdmissionError::Auth.into());
        }

        if !state
            .rate_limiter
            .check_and_increment(credential.id, credential.rate_limit_per_hour)
        {
            return Err(AdmissionError::RateLimit {
                limit: credential.rate_limit_per_hour,
            }
            .into());
        }

        let _ = state.store.credentials.touch_last_used(credential.id).await;

        Ok(AuthedCredential(credential))
    }
}

fn extract_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            parts
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|s| s.to_string())
        })
}

/// The optional `X-Idempotency-Key` header honored by `submit` (spec §6).
pub fn extract_idempotency_key(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("x-idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt;

    use sbx_store::Store;
    use sbx_worker::{AdmissionController, TimeoutSupervisor};

    async fn test_state() -> Arc<ApiState> {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open_in_memory(dir.path()).await.unwrap());
        let admission = Arc::new(AdmissionController::new(store.clone(), 24, 30, "http://x/media"));
        let containers: Arc<dyn sbx_worker::ContainerSupervisor> =
            Arc::new(sbx_worker::DockerContainerSupervisor);
        let timeout_supervisor = Arc::new(TimeoutSupervisor::new(
            store.clone(),
            containers,
            std::time::Duration::from_secs(10),
        ));
        Arc::new(ApiState::new(store, admission, timeout_supervisor))
    }

    async fn authed_ping(AuthedCredential(_cred): AuthedCredential) -> &'static str {
        "pong"
    }

    fn test_router(state: Arc<ApiState>) -> Router {
        Router::new().route("/ping", get(authed_ping)).with_state(state)
    }

    #[tokio::test]
    async fn missing_credential_is_rejected() {
        let state = test_state().await;
        let app = test_router(state);
        let req = Request::builder().uri("/ping").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_key_via_x_api_key_header_is_accepted() {
        let state = test_state().await;
        let cred = Credential::new("sk-test".into(), "ci", 100);
        state.store.credentials.insert(cred.clone()).await.unwrap();
        let app = test_router(state);
        let req = Request::builder()
            .uri("/ping")
            .header("X-API-Key", "sk-test")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn deactivated_credential_is_rejected() {
        let state = test_state().await;
        let cred = Credential::new("sk-dead".into(), "ci", 100);
        state.store.credentials.insert(cred.clone()).await.unwrap();
        state.store.credentials.deactivate(cred.id).await.unwrap();
        let app = test_router(state);
        let req = Request::builder()
            .uri("/ping")
            .header("Authorization", "Bearer sk-dead")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn exhausted_rate_limit_is_rejected() {
        let state = test_state().await;
        let cred = Credential::new("sk-limited".into(), "ci", 1);
        state.store.credentials.insert(cred.clone()).await.unwrap();
        let app = test_router(state);

        let req = Request::builder()
            .uri("/ping")
            .header("X-API-Key", "sk-limited")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.clone().oneshot(req).await.unwrap().status(), axum::http::StatusCode::OK);

        let req2 = Request::builder()
            .uri("/ping")
            .header("X-API-Key", "sk-limited")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            app.oneshot(req2).await.unwrap().status(),
            axum::http::StatusCode::TOO_MANY_REQUESTS
        );
    }
}
