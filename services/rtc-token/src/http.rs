//! HTTP surface speaking the callable function protocol.
//!
//! `POST /generateAgoraToken` takes `{"data": {...}}` and answers
//! `{"result": {...}}` or `{"error": {"status", "message"}}`.

use crate::agora::{AccessTokenBuilder, RtcTokenSigner};
use crate::auth::{CallerIdentity, IdentityVerifier};
use crate::error::{ErrorCode, ErrorResponse};
use crate::handler::{IssueTokenRequest, TokenIssuer};
use crate::metrics;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use uuid::Uuid;

/// Path of the token callable.
pub const CALLABLE_PATH: &str = "/generateAgoraToken";

/// Response header carrying the correlation id of an error.
pub const CORRELATION_ID_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

/// Transport limits.
#[derive(Debug, Clone, Copy)]
pub struct HttpOptions {
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Maximum in-flight requests
    pub max_concurrency: usize,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_concurrency: 10,
        }
    }
}

/// Shared handler state.
pub struct AppState<V, S = AccessTokenBuilder> {
    verifier: V,
    issuer: TokenIssuer<S>,
}

impl<V: IdentityVerifier, S: RtcTokenSigner> AppState<V, S> {
    /// Combine a verifier and an issuer.
    #[must_use]
    pub const fn new(verifier: V, issuer: TokenIssuer<S>) -> Self {
        Self { verifier, issuer }
    }
}

/// Build the service router.
pub fn router<V, S>(state: AppState<V, S>, options: HttpOptions) -> Router
where
    V: IdentityVerifier,
    S: RtcTokenSigner + 'static,
{
    Router::new()
        .route(CALLABLE_PATH, post(generate_token::<V, S>))
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .with_state(Arc::new(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(options.request_timeout))
                .layer(GlobalConcurrencyLimitLayer::new(options.max_concurrency)),
        )
}

async fn generate_token<V, S>(
    State(state): State<Arc<AppState<V, S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    V: IdentityVerifier,
    S: RtcTokenSigner + 'static,
{
    let Some(request) = parse_callable(&headers, &body) else {
        let correlation_id = Uuid::new_v4();
        warn!(%correlation_id, "Malformed callable request");
        metrics::record_rejection(ErrorCode::InvalidArgument.as_str());
        return error_response(&ErrorResponse::bad_request(correlation_id));
    };

    let identity = caller_identity(&state.verifier, &headers).await;

    match state.issuer.issue(identity.as_ref(), &request) {
        Ok(issued) => (StatusCode::OK, Json(json!({ "result": issued }))).into_response(),
        Err(err) => {
            let response = ErrorResponse::from_error(&err, Uuid::new_v4());
            if response.status == ErrorCode::Internal {
                error!(correlation_id = %response.correlation_id, error = %err, "Token request failed");
            } else {
                warn!(correlation_id = %response.correlation_id, error = %err, "Token request rejected");
            }
            error_response(&response)
        }
    }
}

/// Identity from the bearer token, if one is present and verifies.
async fn caller_identity<V: IdentityVerifier>(
    verifier: &V,
    headers: &HeaderMap,
) -> Option<CallerIdentity> {
    let value = headers.get(header::AUTHORIZATION)?;
    let Some(raw) = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        warn!("Authorization header is not a bearer token");
        return None;
    };

    verifier
        .verify(raw)
        .await
        .inspect_err(|e| warn!(error = %e, "ID token rejected"))
        .ok()
}

/// Payload of a callable request; `None` when the body is not one.
fn parse_callable(headers: &HeaderMap, body: &[u8]) -> Option<IssueTokenRequest> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with("application/json"));
    if !is_json {
        return None;
    }

    let mut envelope: Value = serde_json::from_slice(body).ok()?;
    let data = envelope.as_object_mut()?.remove("data")?;
    match data {
        Value::Object(_) => serde_json::from_value(data).ok(),
        _ => Some(IssueTokenRequest::default()),
    }
}

fn error_response(response: &ErrorResponse) -> Response {
    let mut http = (
        response.status.http_status(),
        Json(json!({ "error": response })),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&response.correlation_id.to_string()) {
        http.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    http
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_text() -> Response {
    match metrics::render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
