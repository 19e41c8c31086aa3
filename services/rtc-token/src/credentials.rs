//! RTC project credentials.

use secrecy::{ExposeSecret, SecretString};
use secret_store::{SecretProvider, SecretResult};
use std::fmt;
use tracing::{info, warn};

/// Default secret name of the app id.
pub const APP_ID_SECRET: &str = "APP_ID";
/// Default secret name of the app certificate.
pub const APP_CERTIFICATE_SECRET: &str = "APP_CERTIFICATE";

/// App id and certificate of the RTC project, loaded once per process.
#[derive(Clone)]
pub struct Credentials {
    app_id: String,
    app_certificate: SecretString,
}

impl Credentials {
    /// Create credentials from explicit values.
    #[must_use]
    pub fn new(app_id: impl Into<String>, app_certificate: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_certificate: SecretString::from(app_certificate.into()),
        }
    }

    /// Read both credentials from `provider` in one lookup. A secret that
    /// is not set loads as an empty string.
    ///
    /// # Errors
    ///
    /// Fails only when the backend itself fails.
    pub async fn load<P: SecretProvider>(
        provider: &P,
        app_id_name: &str,
        app_certificate_name: &str,
    ) -> SecretResult<Self> {
        let mut values = provider
            .get_secrets(&[app_id_name, app_certificate_name])
            .await?
            .into_iter();
        let app_id = values
            .next()
            .flatten()
            .map(|s| s.expose_secret().to_string())
            .unwrap_or_default();
        let app_certificate = values
            .next()
            .flatten()
            .unwrap_or_else(|| SecretString::from(String::new()));

        let credentials = Self {
            app_id,
            app_certificate,
        };

        let missing = credentials.missing();
        if missing.is_empty() {
            info!(backend = provider.backend(), "RTC credentials loaded");
        } else {
            warn!(backend = provider.backend(), missing = ?missing, "RTC credentials incomplete");
        }
        Ok(credentials)
    }

    /// App id.
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// App certificate.
    #[must_use]
    pub fn app_certificate(&self) -> &str {
        self.app_certificate.expose_secret()
    }

    /// Names of the credentials that are empty.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.app_id.is_empty() {
            missing.push(APP_ID_SECRET);
        }
        if self.app_certificate.expose_secret().is_empty() {
            missing.push(APP_CERTIFICATE_SECRET);
        }
        missing
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_certificate", &"[REDACTED]")
            .finish()
    }
}
