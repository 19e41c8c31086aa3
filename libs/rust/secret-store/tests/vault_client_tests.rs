//! Vault client tests against a mock Vault server.

use secrecy::{ExposeSecret, SecretString};
use secret_store::{SecretError, SecretProvider, VaultClient, VaultConfig};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn kv_body(data: serde_json::Value) -> serde_json::Value {
    json!({
        "request_id": "0c6b9c2e",
        "lease_id": "",
        "lease_duration": 0,
        "renewable": false,
        "data": {
            "data": data,
            "metadata": {
                "created_time": "2024-01-01T00:00:00Z",
                "deletion_time": "",
                "destroyed": false,
                "version": 3
            }
        }
    })
}

fn token_client(server: &MockServer) -> VaultClient {
    let config = VaultConfig::new(server.uri(), "agora")
        .with_token(SecretString::from("s.static".to_string()));
    VaultClient::new(config).unwrap()
}

#[tokio::test]
async fn test_reads_named_field_with_static_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/agora"))
        .and(header("X-Vault-Token", "s.static"))
        .respond_with(ResponseTemplate::new(200).set_body_json(kv_body(json!({
            "APP_ID": "970ca35de60c44645bbae8a215061b33",
            "APP_CERTIFICATE": "5cfd2fd1755d40ecb72977518be15d3b"
        }))))
        .mount(&server)
        .await;

    let client = token_client(&server);

    let app_id = client.get_secret("APP_ID").await.unwrap().unwrap();
    assert_eq!(app_id.expose_secret(), "970ca35de60c44645bbae8a215061b33");

    let cert = client.get_secret("APP_CERTIFICATE").await.unwrap().unwrap();
    assert_eq!(cert.expose_secret(), "5cfd2fd1755d40ecb72977518be15d3b");
}

#[tokio::test]
async fn test_batch_read_fetches_document_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/agora"))
        .respond_with(ResponseTemplate::new(200).set_body_json(kv_body(json!({
            "APP_ID": "970ca35de60c44645bbae8a215061b33",
            "APP_CERTIFICATE": "5cfd2fd1755d40ecb72977518be15d3b"
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let client = token_client(&server);
    let values = client
        .get_secrets(&["APP_ID", "APP_CERTIFICATE", "UNSET"])
        .await
        .unwrap();

    assert_eq!(values.len(), 3);
    assert_eq!(values[0].as_ref().unwrap().expose_secret(), "970ca35de60c44645bbae8a215061b33");
    assert_eq!(values[1].as_ref().unwrap().expose_secret(), "5cfd2fd1755d40ecb72977518be15d3b");
    assert!(values[2].is_none());
}

#[tokio::test]
async fn test_missing_field_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/agora"))
        .respond_with(ResponseTemplate::new(200).set_body_json(kv_body(json!({
            "APP_ID": "970ca35de60c44645bbae8a215061b33"
        }))))
        .mount(&server)
        .await;

    let client = token_client(&server);
    assert!(client.get_secret("APP_CERTIFICATE").await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_document_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/agora"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "errors": [] })))
        .mount(&server)
        .await;

    let client = token_client(&server);
    assert!(client.get_secret("APP_ID").await.unwrap().is_none());
}

#[tokio::test]
async fn test_non_string_field_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/agora"))
        .respond_with(ResponseTemplate::new(200).set_body_json(kv_body(json!({ "APP_ID": 42 }))))
        .mount(&server)
        .await;

    let client = token_client(&server);
    let err = client.get_secret("APP_ID").await.unwrap_err();
    assert!(matches!(err, SecretError::InvalidEncoding(_)));
}

#[tokio::test]
async fn test_forbidden_maps_to_permission_denied() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/agora"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "errors": ["permission denied"] })))
        .mount(&server)
        .await;

    let client = token_client(&server);
    let err = client.get_secret("APP_ID").await.unwrap_err();
    assert!(matches!(err, SecretError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/agora"))
        .respond_with(ResponseTemplate::new(503).set_body_string("sealed"))
        .mount(&server)
        .await;

    let client = token_client(&server);
    let err = client.get_secret("APP_ID").await.unwrap_err();
    assert!(matches!(err, SecretError::Unavailable(_)));
}

#[tokio::test]
async fn test_kubernetes_login_token_is_reused() {
    let server = MockServer::start().await;

    let jwt_file = tempfile_with("service-account-jwt\n");

    Mock::given(method("POST"))
        .and(path("/v1/auth/kubernetes/login"))
        .and(body_partial_json(json!({ "role": "rtc-token", "jwt": "service-account-jwt" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth": {
                "client_token": "s.k8s",
                "policies": ["rtc-token"],
                "lease_duration": 3600,
                "renewable": true
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/secret/data/agora"))
        .and(header("X-Vault-Token", "s.k8s"))
        .respond_with(ResponseTemplate::new(200).set_body_json(kv_body(json!({
            "APP_ID": "970ca35de60c44645bbae8a215061b33",
            "APP_CERTIFICATE": "5cfd2fd1755d40ecb72977518be15d3b"
        }))))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = VaultConfig::new(server.uri(), "agora").with_role("rtc-token");
    config.token_path = jwt_file.path().to_string_lossy().into_owned();
    let client = VaultClient::new(config).unwrap();

    assert!(client.get_secret("APP_ID").await.unwrap().is_some());
    assert!(client.get_secret("APP_CERTIFICATE").await.unwrap().is_some());
}

#[tokio::test]
async fn test_login_failure_is_auth_error() {
    let server = MockServer::start().await;
    let jwt_file = tempfile_with("service-account-jwt");

    Mock::given(method("POST"))
        .and(path("/v1/auth/kubernetes/login"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid role"))
        .mount(&server)
        .await;

    let mut config = VaultConfig::new(server.uri(), "agora").with_role("unknown");
    config.token_path = jwt_file.path().to_string_lossy().into_owned();
    let client = VaultClient::new(config).unwrap();

    let err = client.get_secret("APP_ID").await.unwrap_err();
    assert!(matches!(err, SecretError::AuthenticationFailed(_)));
}

fn tempfile_with(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
