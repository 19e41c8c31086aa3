//! Vault client configuration.

use secrecy::SecretString;
use std::time::Duration;

/// Default Kubernetes service account token location.
pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Vault client configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address
    pub addr: String,
    /// Kubernetes auth role name
    pub role: String,
    /// Static client token; skips Kubernetes login when set
    pub token: Option<SecretString>,
    /// Service account token path
    pub token_path: String,
    /// KV v2 mount point
    pub mount: String,
    /// Path of the KV document holding the secrets, relative to the mount
    pub secret_path: String,
    /// Request timeout
    pub timeout: Duration,
    /// Re-authenticate when the client token has less than this left
    pub grace_period: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            addr: "https://vault.vault.svc:8200".to_string(),
            role: String::new(),
            token: None,
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            mount: "secret".to_string(),
            secret_path: "rtc-token".to_string(),
            timeout: Duration::from_secs(30),
            grace_period: Duration::from_secs(300),
        }
    }
}

impl VaultConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(addr: impl Into<String>, secret_path: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            secret_path: secret_path.into(),
            ..Default::default()
        }
    }

    /// Authenticate with a static token.
    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    /// Authenticate through Kubernetes login with this role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Set the KV v2 mount point.
    #[must_use]
    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into();
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set grace period.
    #[must_use]
    pub const fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Trimmed base address without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.addr.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VaultConfig::default();
        assert_eq!(config.grace_period, Duration::from_secs(300));
        assert_eq!(config.mount, "secret");
        assert!(config.token.is_none());
    }

    #[test]
    fn test_builder() {
        let config = VaultConfig::new("http://127.0.0.1:8200/", "agora")
            .with_role("rtc-token")
            .with_mount("kv")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.base_url(), "http://127.0.0.1:8200");
        assert_eq!(config.secret_path, "agora");
        assert_eq!(config.role, "rtc-token");
        assert_eq!(config.mount, "kv");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
