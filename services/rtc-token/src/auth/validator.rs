//! ID token validator backed by the JWK cache.

use super::jwk_cache::JwkCache;
use super::token::{ClaimRules, Token, Unvalidated, Validated};
use super::{AuthError, CallerIdentity, IdentityVerifier};
use std::sync::Arc;

/// Firebase ID token validator
pub struct JwtValidator {
    jwk_cache: Arc<JwkCache>,
    rules: ClaimRules,
}

impl JwtValidator {
    /// Creates a validator for tokens issued to `rules.project_id`.
    #[must_use]
    pub const fn new(jwk_cache: Arc<JwkCache>, rules: ClaimRules) -> Self {
        Self { jwk_cache, rules }
    }

    /// Parse, verify the signature, then check claims.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's error.
    pub async fn validate_token(&self, raw_token: &str) -> Result<Token<Validated>, AuthError> {
        let unvalidated = Token::<Unvalidated>::parse(raw_token)?;
        let signature_validated = unvalidated.validate_signature(&self.jwk_cache).await?;
        signature_validated.validate_claims(&self.rules, chrono::Utc::now().timestamp())
    }
}

impl IdentityVerifier for JwtValidator {
    async fn verify(&self, raw_token: &str) -> Result<CallerIdentity, AuthError> {
        self.validate_token(raw_token).await.map(|token| token.identity())
    }
}
