//! Vault HTTP client reading secrets from a KV v2 document.

use crate::{
    config::VaultConfig,
    error::{SecretError, SecretResult},
    provider::SecretProvider,
    secrets::{KvReadResponse, LoginResponse},
};
use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Client token obtained from a login, with its expiry.
struct CachedToken {
    token: SecretString,
    expires_at: Option<Instant>,
}

/// Vault client with cached Kubernetes login.
pub struct VaultClient {
    config: VaultConfig,
    http: Client,
    token: RwLock<Option<CachedToken>>,
}

impl VaultClient {
    /// Create a new Vault client.
    ///
    /// # Errors
    ///
    /// Returns an error if neither a static token nor a login role is
    /// configured, or the HTTP client cannot be built.
    pub fn new(config: VaultConfig) -> SecretResult<Self> {
        if config.token.is_none() && config.role.is_empty() {
            return Err(SecretError::InvalidConfig(
                "either a Vault token or a Kubernetes auth role is required".to_string(),
            ));
        }
        if config.secret_path.is_empty() {
            return Err(SecretError::InvalidConfig("secret path is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(SecretError::Http)?;

        Ok(Self {
            config,
            http,
            token: RwLock::new(None),
        })
    }

    /// Authenticate with Kubernetes auth method.
    #[instrument(skip(self), fields(role = %self.config.role))]
    pub async fn authenticate(&self) -> SecretResult<()> {
        let jwt = tokio::fs::read_to_string(&self.config.token_path)
            .await
            .map_err(|e| SecretError::auth_failed(e.to_string()))?;

        let url = format!("{}/v1/auth/kubernetes/login", self.config.base_url());
        let body = serde_json::json!({
            "role": self.config.role,
            "jwt": jwt.trim()
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SecretError::unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SecretError::auth_failed(format!("Status {status}: {text}")));
        }

        let login: LoginResponse = response.json().await?;
        let ttl = Duration::from_secs(login.auth.lease_duration);
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);

        *self.token.write().await = Some(CachedToken {
            token: SecretString::from(login.auth.client_token),
            expires_at,
        });

        info!(ttl_secs = ttl.as_secs(), "Authenticated with Vault");
        Ok(())
    }

    async fn get_token(&self) -> SecretResult<SecretString> {
        if let Some(token) = &self.config.token {
            return Ok(token.clone());
        }

        let needs_auth = match &*self.token.read().await {
            Some(CachedToken {
                expires_at: Some(exp),
                ..
            }) => exp.saturating_duration_since(Instant::now()) < self.config.grace_period,
            Some(CachedToken { expires_at: None, .. }) => false,
            None => true,
        };

        if needs_auth {
            self.authenticate().await?;
        }

        self.token
            .read()
            .await
            .as_ref()
            .map(|cached| cached.token.clone())
            .ok_or_else(|| SecretError::auth_failed("No token available"))
    }

    async fn request<T: DeserializeOwned>(&self, method: Method, path: &str) -> SecretResult<T> {
        let token = self.get_token().await?;
        let url = format!("{}/v1/{}", self.config.base_url(), path);

        let response = self
            .http
            .request(method, &url)
            .header("X-Vault-Token", token.expose_secret())
            .send()
            .await
            .map_err(|e| SecretError::unavailable(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => return Err(SecretError::not_found(path)),
            StatusCode::FORBIDDEN => return Err(SecretError::PermissionDenied(path.to_string())),
            StatusCode::TOO_MANY_REQUESTS => return Err(SecretError::RateLimited),
            _ if !status.is_success() => {
                let text = response.text().await.unwrap_or_default();
                return Err(SecretError::unavailable(format!("Status {status}: {text}")));
            }
            _ => {}
        }

        response.json().await.map_err(SecretError::from)
    }

    /// Read the configured KV v2 document and deserialize its data.
    ///
    /// # Errors
    ///
    /// Returns an error if Vault is unreachable, denies access, has no
    /// document at the path, or the data does not deserialize into `T`.
    #[instrument(skip(self), fields(path = %self.config.secret_path))]
    pub async fn read_document<T: DeserializeOwned>(&self) -> SecretResult<T> {
        let path = format!("{}/data/{}", self.config.mount, self.config.secret_path);
        let response: KvReadResponse<T> = self.request(Method::GET, &path).await?;

        if let Some(metadata) = &response.data.metadata {
            debug!(version = metadata.version, "Read secret document");
        }

        Ok(response.data.data)
    }
}

impl SecretProvider for VaultClient {
    fn backend(&self) -> &'static str {
        "vault"
    }

    async fn get_secret(&self, name: &str) -> SecretResult<Option<SecretString>> {
        match self.secret_map().await? {
            Some(document) => field(&document, name),
            None => Ok(None),
        }
    }

    async fn get_secrets(&self, names: &[&str]) -> SecretResult<Vec<Option<SecretString>>> {
        let Some(document) = self.secret_map().await? else {
            return Ok(names.iter().map(|_| None).collect());
        };
        names.iter().map(|name| field(&document, name)).collect()
    }
}

type SecretMap = HashMap<String, serde_json::Value>;

impl VaultClient {
    /// The KV document as a field map, `None` when there is no document.
    async fn secret_map(&self) -> SecretResult<Option<SecretMap>> {
        match self.read_document().await {
            Ok(document) => Ok(Some(document)),
            Err(SecretError::SecretNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn field(document: &SecretMap, name: &str) -> SecretResult<Option<SecretString>> {
    match document.get(name) {
        Some(serde_json::Value::String(value)) => Ok(Some(SecretString::from(value.clone()))),
        Some(serde_json::Value::Null) | None => Ok(None),
        Some(_) => Err(SecretError::InvalidEncoding(name.to_string())),
    }
}
