//! JWK cache with single-flight refresh.
//!
//! Keys are fetched from the published JWK set, held locally until the
//! response's `Cache-Control: max-age` (or the configured TTL) runs out, and
//! refreshed by at most one request at a time. Unknown key ids never force
//! a fetch while the set is fresh.

use super::AuthError;
use arc_swap::ArcSwapOption;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use jsonwebtoken::DecodingKey;
use reqwest::header::{HeaderMap, CACHE_CONTROL};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Base64url length of a 2048-bit modulus.
const MIN_RSA_MODULUS_B64_LEN: usize = 342;

/// JSON Web Key structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type
    pub kty: String,
    /// Key ID
    pub kid: String,
    /// Key use (sig, enc)
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    /// Algorithm
    pub alg: Option<String>,
    /// RSA modulus
    pub n: Option<String>,
    /// RSA exponent
    pub e: Option<String>,
}

/// JSON Web Key Set structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    /// List of keys
    pub keys: Vec<Jwk>,
}

struct LocalCacheEntry {
    keys: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

type InflightFuture = Shared<BoxFuture<'static, Result<Arc<LocalCacheEntry>, AuthError>>>;

/// JWK cache with single-flight refresh.
pub struct JwkCache {
    local_cache: Arc<ArcSwapOption<LocalCacheEntry>>,
    jwks_url: String,
    ttl: Duration,
    inflight: Arc<Mutex<Option<InflightFuture>>>,
    http_client: reqwest::Client,
}

impl JwkCache {
    /// Creates a cache for the JWK set at `jwks_url`.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new(jwks_url: impl Into<String>, ttl: Duration) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::JwkCacheError {
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            local_cache: Arc::new(ArcSwapOption::empty()),
            jwks_url: jwks_url.into(),
            ttl,
            inflight: Arc::new(Mutex::new(None)),
            http_client,
        })
    }

    /// Gets a decoding key by key ID.
    ///
    /// The set is fetched only when the cache is empty or past its
    /// `max-age`; a `kid` missing from a fresh set is unknown.
    ///
    /// # Errors
    ///
    /// Fails when the JWK set cannot be fetched or has no key `kid`.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.try_get_local(kid) {
            return Ok((*key).clone());
        }

        if self.is_stale() {
            self.refresh_single_flight().await?;
        }

        self.try_get_local(kid)
            .map(|k| (*k).clone())
            .ok_or_else(|| AuthError::UnknownKey {
                kid: kid.to_string(),
            })
    }

    fn try_get_local(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.local_cache.load();
        (*cache)
            .as_ref()
            .filter(|entry| entry.expires_at > Instant::now())
            .and_then(|entry| entry.keys.get(kid).cloned())
    }

    /// Checks if the local cache is stale.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        let cache = self.local_cache.load();
        (*cache)
            .as_ref()
            .is_none_or(|entry| entry.expires_at <= Instant::now())
    }

    /// Refreshes the cache; concurrent callers share one HTTP request.
    ///
    /// The fetch runs on its own task, which stores the keys and clears
    /// `inflight` whether or not any caller is still waiting.
    async fn refresh_single_flight(&self) -> Result<(), AuthError> {
        let mut inflight_guard = self.inflight.lock().await;

        if let Some(fut) = inflight_guard.as_ref().filter(|fut| fut.peek().is_none()) {
            let fut = fut.clone();
            drop(inflight_guard);
            fut.await?;
            return Ok(());
        }

        // Another caller may have refreshed while we waited for the lock.
        if !self.is_stale() {
            return Ok(());
        }

        let fetch = fetch_jwks(self.http_client.clone(), self.jwks_url.clone(), self.ttl);
        let local_cache = Arc::clone(&self.local_cache);
        let inflight = Arc::clone(&self.inflight);

        let task = tokio::spawn(async move {
            let result = fetch.await;
            if let Ok(entry) = &result {
                local_cache.store(Some(Arc::clone(entry)));
                info!(keys = entry.keys.len(), "JWKS cache updated");
            }
            inflight.lock().await.take();
            result
        });

        let shared_fut: InflightFuture = task
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(AuthError::JwkCacheError {
                        reason: format!("JWKS refresh task failed: {e}"),
                    })
                })
            })
            .boxed()
            .shared();
        *inflight_guard = Some(shared_fut.clone());
        drop(inflight_guard);

        shared_fut.await.map(|_| ())
    }

    /// Converts an RSA JWK to a `DecodingKey`.
    fn jwk_to_decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
        if jwk.kty != "RSA" {
            warn!(kty = %jwk.kty, kid = %jwk.kid, "Unsupported key type");
            return None;
        }
        let n = jwk.n.as_ref()?;
        let e = jwk.e.as_ref()?;

        if n.trim_end_matches('=').len() < MIN_RSA_MODULUS_B64_LEN {
            warn!(kid = %jwk.kid, "RSA key too small, rejecting");
            return None;
        }

        DecodingKey::from_rsa_components(n, e).ok()
    }

    /// Gets the number of locally cached keys.
    #[must_use]
    pub fn local_key_count(&self) -> usize {
        let cache = self.local_cache.load();
        (*cache).as_ref().map_or(0, |entry| entry.keys.len())
    }
}

/// Fetches the JWK set and keeps its usable RSA keys.
async fn fetch_jwks(
    client: reqwest::Client,
    url: String,
    default_ttl: Duration,
) -> Result<Arc<LocalCacheEntry>, AuthError> {
    info!(url = %url, "Fetching JWKS");

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| AuthError::JwkCacheError {
            reason: format!("Failed to fetch JWKS: {e}"),
        })?;

    if !response.status().is_success() {
        warn!(status = %response.status(), "JWKS fetch failed");
        return Err(AuthError::JwkCacheError {
            reason: format!("JWKS fetch failed with status: {}", response.status()),
        });
    }

    let ttl = max_age(response.headers()).unwrap_or(default_ttl);
    let jwks: Jwks = response.json().await.map_err(|e| AuthError::JwkCacheError {
        reason: format!("Failed to parse JWKS: {e}"),
    })?;

    let keys = jwks
        .keys
        .iter()
        .filter_map(|jwk| JwkCache::jwk_to_decoding_key(jwk).map(|key| (jwk.kid.clone(), Arc::new(key))))
        .collect();

    Ok(Arc::new(LocalCacheEntry {
        keys,
        expires_at: Instant::now() + ttl,
    }))
}

/// `max-age` directive of a `Cache-Control` header.
fn max_age(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(CACHE_CONTROL)?
        .to_str()
        .ok()?
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
