//! Callable protocol tests against the router.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use rtc_token::agora::AccessToken;
use rtc_token::auth::{AuthError, CallerIdentity, IdentityVerifier};
use rtc_token::http::{self, AppState, HttpOptions, CALLABLE_PATH, CORRELATION_ID_HEADER};
use rtc_token::{Credentials, TokenIssuer};
use serde_json::{json, Value};
use tower::ServiceExt;

const APP_ID: &str = "970CA35de60c44645bbae8a215061b33";
const APP_CERT: &str = "5CFd2fd1755d40ecb72977518be15d3b";
const VALID_ID_TOKEN: &str = "valid-id-token";

/// Accepts exactly one token string.
struct StaticVerifier;

impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, raw_token: &str) -> Result<CallerIdentity, AuthError> {
        if raw_token == VALID_ID_TOKEN {
            Ok(CallerIdentity {
                uid: "user-1".to_string(),
                email: Some("user@example.com".to_string()),
                sign_in_provider: Some("password".to_string()),
                issued_at: 0,
                expires_at: i64::MAX,
            })
        } else {
            Err(AuthError::TokenInvalid)
        }
    }
}

fn app(credentials: Credentials) -> Router {
    http::router(
        AppState::new(StaticVerifier, TokenIssuer::new(credentials)),
        HttpOptions::default(),
    )
}

fn configured_app() -> Router {
    app(Credentials::new(APP_ID, APP_CERT))
}

fn callable(body: &Value, id_token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(CALLABLE_PATH)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = id_token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn assert_error(body: &Value, status: &str, message: &str) {
    assert_eq!(body["error"]["status"], status);
    assert_eq!(body["error"]["message"], message);
}

#[tokio::test]
async fn test_issues_token_for_authenticated_caller() {
    let (status, body) = send(
        configured_app(),
        callable(&json!({"data": {"channelName": "room42", "uid": 7}}), Some(VALID_ID_TOKEN)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let token = body["result"]["token"].as_str().unwrap();
    assert!(token.starts_with("007"));
    assert_eq!(body["result"].as_object().unwrap().len(), 1);

    let parsed = AccessToken::parse(token).unwrap();
    assert!(parsed.verify(APP_CERT));
    assert_eq!(parsed.token().app_id(), APP_ID);
    assert!((3599..=3600).contains(&parsed.token().expire()));
    let rtc = parsed.token().rtc().unwrap();
    assert_eq!(rtc.channel_name(), "room42");
    assert_eq!(rtc.uid(), "7");
}

#[tokio::test]
async fn test_missing_authorization_is_unauthenticated() {
    let (status, body) = send(
        configured_app(),
        callable(&json!({"data": {"channelName": "room42"}}), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error(&body, "UNAUTHENTICATED", "The function must be called while authenticated.");
}

#[tokio::test]
async fn test_invalid_id_token_is_unauthenticated() {
    let (status, body) = send(
        configured_app(),
        callable(&json!({"data": {"channelName": "room42"}}), Some("forged")),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error(&body, "UNAUTHENTICATED", "The function must be called while authenticated.");
}

#[tokio::test]
async fn test_unauthenticated_wins_over_bad_payload() {
    let (status, body) = send(configured_app(), callable(&json!({"data": {}}), None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error(&body, "UNAUTHENTICATED", "The function must be called while authenticated.");
}

#[tokio::test]
async fn test_missing_channel_is_invalid_argument() {
    for data in [json!({}), json!({"channelName": ""}), json!(null)] {
        let (status, body) = send(
            configured_app(),
            callable(&json!({ "data": data }), Some(VALID_ID_TOKEN)),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_error(&body, "INVALID_ARGUMENT", "Missing channel name in request data.");
    }
}

#[tokio::test]
async fn test_missing_credentials_is_internal() {
    let (status, body) = send(
        app(Credentials::new(APP_ID, "")),
        callable(&json!({"data": {"channelName": "room42"}}), Some(VALID_ID_TOKEN)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_error(&body, "INTERNAL", "Server configuration error: Agora credentials not set.");
}

#[tokio::test]
async fn test_signing_failure_is_internal() {
    let (status, body) = send(
        app(Credentials::new("not-an-app-id", APP_CERT)),
        callable(&json!({"data": {"channelName": "room42"}}), Some(VALID_ID_TOKEN)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_error(&body, "INTERNAL", "Failed to generate token due to an internal server error.");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let request = Request::builder()
        .method(Method::POST)
        .uri(CALLABLE_PATH)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {VALID_ID_TOKEN}"))
        .body(Body::from("{not json"))
        .unwrap();

    let response = configured_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().contains_key(CORRELATION_ID_HEADER));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_error(&body, "INVALID_ARGUMENT", "Bad Request");
}

#[tokio::test]
async fn test_body_without_data_is_bad_request() {
    let (status, body) = send(
        configured_app(),
        callable(&json!({"channelName": "room42"}), Some(VALID_ID_TOKEN)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "INVALID_ARGUMENT", "Bad Request");
}

#[tokio::test]
async fn test_health() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(configured_app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_metrics_exposed_after_issuance() {
    let app = configured_app();
    let _ = send(
        app.clone(),
        callable(&json!({"data": {"channelName": "room42"}}), Some(VALID_ID_TOKEN)),
    )
    .await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("rtc_token_tokens_issued_total"));
}
