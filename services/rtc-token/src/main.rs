//! RTC Token Service - Main Entry Point

use std::sync::Arc;

use anyhow::Context;
use rtc_token::auth::{ClaimRules, JwkCache, JwtValidator};
use rtc_token::config::{Config, SecretBackend};
use rtc_token::http::{self, AppState, HttpOptions};
use rtc_token::observability::{init_tracing, TracingConfig};
use rtc_token::shutdown::{serve_with_shutdown, wait_for_signal};
use rtc_token::{Credentials, TokenIssuer};
use secret_store::{EnvSecretProvider, VaultClient};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;

    init_tracing(
        &TracingConfig::default()
            .with_log_level(&config.log_level)
            .with_json_output(config.log_json),
    )?;

    info!(
        project_id = %config.project_id,
        secret_backend = config.secret_backend.name(),
        "Starting RTC Token Service"
    );

    let credentials = load_credentials(&config).await?;

    let jwk_cache = JwkCache::new(config.jwks_url.as_str(), config.jwks_cache_ttl())
        .context("Failed to create JWK cache")?;
    let validator = JwtValidator::new(
        Arc::new(jwk_cache),
        ClaimRules::for_project(&config.project_id),
    );

    let app = http::router(
        AppState::new(validator, TokenIssuer::new(credentials)),
        HttpOptions {
            request_timeout: config.request_timeout(),
            max_concurrency: config.max_concurrency,
        },
    );

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    info!(addr = %listener.local_addr()?, "RTC Token Service listening");

    serve_with_shutdown(listener, app, wait_for_signal(), config.shutdown_timeout()).await?;

    info!("RTC Token Service stopped");
    Ok(())
}

async fn load_credentials(config: &Config) -> anyhow::Result<Credentials> {
    let (app_id, certificate) = (&config.app_id_secret, &config.app_certificate_secret);
    let credentials = match &config.secret_backend {
        SecretBackend::Env { prefix } => {
            let provider = EnvSecretProvider::from_env().with_prefix(prefix.as_str());
            Credentials::load(&provider, app_id, certificate).await?
        }
        SecretBackend::Vault(vault) => {
            let client = VaultClient::new(vault.clone())?;
            Credentials::load(&client, app_id, certificate).await?
        }
    };
    Ok(credentials)
}
