//! Type-Safe Configuration with Validation
//!
//! Values come from the process environment (after loading an optional
//! `.env` file). Token lifetime and role are fixed and not configurable.

use crate::credentials::{APP_CERTIFICATE_SECRET, APP_ID_SECRET};
use secrecy::SecretString;
use secret_store::VaultConfig;
use std::env;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Google's JWK set for Firebase ID token signing keys.
pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl { field: String, reason: String },

    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Invalid TTL value
    #[error("Invalid TTL: must be greater than 0")]
    InvalidTtl,

    /// A numeric setting that must be positive is zero
    #[error("{0} must be greater than 0")]
    MustBePositive(&'static str),

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Unknown secret backend
    #[error("Unknown secret backend {0:?}: expected \"env\" or \"vault\"")]
    UnknownBackend(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError { name: String, reason: String },
}

/// Where the RTC credentials are read from.
#[derive(Debug, Clone)]
pub enum SecretBackend {
    /// Process environment, with an optional name prefix
    Env {
        /// Prefix prepended to every secret name
        prefix: String,
    },
    /// Vault KV v2 document
    Vault(VaultConfig),
}

impl SecretBackend {
    /// Backend name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Env { .. } => "env",
            Self::Vault(_) => "vault",
        }
    }
}

/// Service configuration with validation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port (1-65535)
    pub port: u16,
    /// Firebase project whose ID tokens are accepted
    pub project_id: String,
    /// JWKS endpoint URL
    pub jwks_url: Url,
    /// JWKS cache TTL in seconds when the response carries no max-age
    pub jwks_cache_ttl_seconds: u64,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum in-flight requests
    pub max_concurrency: usize,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Log level filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
    /// Credential source
    pub secret_backend: SecretBackend,
    /// Secret name of the app id
    pub app_id_secret: String,
    /// Secret name of the app certificate
    pub app_certificate_secret: String,
}

impl Config {
    /// Loads configuration from environment variables with validation.
    ///
    /// # Errors
    ///
    /// Fails when a variable cannot be parsed or a required one is missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Fails when a variable cannot be parsed or a required one is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let project_id = ["FIREBASE_PROJECT_ID", "GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"]
            .into_iter()
            .find_map(|name| vars.get(name))
            .ok_or_else(|| ConfigError::MissingRequired("FIREBASE_PROJECT_ID".to_string()))?;

        let config = Self {
            host: vars.get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: vars.parse("PORT", 8080)?,
            project_id,
            jwks_url: vars.url("JWKS_URL", DEFAULT_JWKS_URL)?,
            jwks_cache_ttl_seconds: vars.parse("JWKS_CACHE_TTL", 3600)?,
            request_timeout_secs: vars.parse("REQUEST_TIMEOUT", 60)?,
            max_concurrency: vars.parse("MAX_CONCURRENCY", 10)?,
            shutdown_timeout_seconds: vars.parse("SHUTDOWN_TIMEOUT", 30)?,
            log_level: vars.get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: vars.parse("LOG_JSON", true)?,
            secret_backend: secret_backend(&vars)?,
            app_id_secret: vars
                .get("APP_ID_SECRET")
                .unwrap_or_else(|| APP_ID_SECRET.to_string()),
            app_certificate_secret: vars
                .get("APP_CERTIFICATE_SECRET")
                .unwrap_or_else(|| APP_CERTIFICATE_SECRET.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.jwks_cache_ttl_seconds == 0 {
            return Err(ConfigError::InvalidTtl);
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::MustBePositive("REQUEST_TIMEOUT"));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::MustBePositive("MAX_CONCURRENCY"));
        }
        if let SecretBackend::Vault(vault) = &self.secret_backend {
            if vault.token.is_none() && vault.role.is_empty() {
                return Err(ConfigError::MissingRequired(
                    "VAULT_TOKEN or VAULT_ROLE".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Address to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Graceful shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// Fallback JWKS cache lifetime.
    #[must_use]
    pub const fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_seconds)
    }
}

fn secret_backend<F>(vars: &Vars<F>) -> Result<SecretBackend, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let backend = vars.get("SECRET_BACKEND").unwrap_or_else(|| "env".to_string());
    match backend.to_ascii_lowercase().as_str() {
        "env" => Ok(SecretBackend::Env {
            prefix: vars.get("SECRET_PREFIX").unwrap_or_default(),
        }),
        "vault" => {
            let addr = vars
                .get("VAULT_ADDR")
                .ok_or_else(|| ConfigError::MissingRequired("VAULT_ADDR".to_string()))?;
            Url::parse(&addr).map_err(|e| ConfigError::InvalidUrl {
                field: "VAULT_ADDR".to_string(),
                reason: e.to_string(),
            })?;

            let mut vault = VaultConfig::new(
                addr,
                vars.get("VAULT_SECRET_PATH")
                    .unwrap_or_else(|| "rtc-token".to_string()),
            );
            if let Some(mount) = vars.get("VAULT_MOUNT") {
                vault = vault.with_mount(mount);
            }
            if let Some(role) = vars.get("VAULT_ROLE") {
                vault = vault.with_role(role);
            }
            if let Some(token) = vars.get("VAULT_TOKEN") {
                vault = vault.with_token(SecretString::from(token));
            }
            Ok(SecretBackend::Vault(vault))
        }
        _ => Err(ConfigError::UnknownBackend(backend)),
    }
}

/// Variable lookup that treats empty values as unset.
struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    /// Parse a variable with a default value.
    fn parse<T: std::str::FromStr>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
                name: name.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    /// Parse a URL variable with a default value.
    fn url(&self, name: &str, default: &str) -> Result<Url, ConfigError> {
        let url_str = self.get(name).unwrap_or_else(|| default.to_string());
        Url::parse(&url_str).map_err(|e| ConfigError::InvalidUrl {
            field: name.to_string(),
            reason: e.to_string(),
        })
    }
}
