//! Type-state ID token with compile-time validation guarantees.
//!
//! Claims can only be read through [`Token<Validated>`], which is reachable
//! only by passing the signature check and then the claim rules.

use std::marker::PhantomData;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Header, Validation};

use super::claims::{Claims, MAX_SUBJECT_LEN};
use super::jwk_cache::JwkCache;
use super::{AuthError, CallerIdentity};

/// Issuer prefix of Firebase ID tokens.
pub const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

mod private {
    pub trait Sealed {}
}

/// Marker trait for token validation states
pub trait TokenState: private::Sealed {}

/// Parsed header only
#[derive(Debug)]
pub struct Unvalidated;
impl private::Sealed for Unvalidated {}
impl TokenState for Unvalidated {}

/// Signature verified against a published key
#[derive(Debug)]
pub struct SignatureValidated;
impl private::Sealed for SignatureValidated {}
impl TokenState for SignatureValidated {}

/// Signature and claims verified
#[derive(Debug)]
pub struct Validated;
impl private::Sealed for Validated {}
impl TokenState for Validated {}

/// Rules an ID token's claims must satisfy.
#[derive(Debug, Clone)]
pub struct ClaimRules {
    /// Project the token must be issued for
    pub project_id: String,
    /// Allowed clock skew in seconds
    pub leeway_secs: i64,
}

impl ClaimRules {
    /// Rules for `project_id` with a 60 second leeway.
    #[must_use]
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            leeway_secs: 60,
        }
    }

    /// Expected `iss` claim.
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("{ISSUER_PREFIX}{}", self.project_id)
    }
}

/// Type-state token wrapper
#[derive(Debug)]
pub struct Token<State: TokenState> {
    raw: String,
    header: Header,
    claims: Option<Claims>,
    _state: PhantomData<State>,
}

impl Token<Unvalidated> {
    /// Parse the header of a raw JWT.
    ///
    /// # Errors
    ///
    /// Fails when the header cannot be decoded, the algorithm is not RS256
    /// or no key id is present.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let header = decode_header(raw).map_err(|e| AuthError::TokenMalformed {
            reason: format!("Invalid header: {e}"),
        })?;

        if header.alg != Algorithm::RS256 {
            return Err(AuthError::TokenMalformed {
                reason: format!("Unexpected algorithm {:?}", header.alg),
            });
        }
        if header.kid.as_deref().is_none_or(str::is_empty) {
            return Err(AuthError::TokenMalformed {
                reason: "Missing kid in header".to_string(),
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            header,
            claims: None,
            _state: PhantomData,
        })
    }

    /// Key id from the header.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Verify the signature with the key named by `kid`.
    ///
    /// # Errors
    ///
    /// Fails when the key is unknown or the signature does not match.
    pub async fn validate_signature(
        self,
        cache: &JwkCache,
    ) -> Result<Token<SignatureValidated>, AuthError> {
        let kid = self.kid().unwrap_or_default().to_string();
        let key = cache.get_key(&kid).await?;
        self.validate_signature_with_key(&key)
    }

    /// Verify the signature with a specific key.
    ///
    /// # Errors
    ///
    /// Fails when the signature does not match or the payload is not a
    /// claims object.
    pub fn validate_signature_with_key(
        self,
        key: &DecodingKey,
    ) -> Result<Token<SignatureValidated>, AuthError> {
        // Time and audience checks belong to the claims stage.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let token_data = decode::<Claims>(&self.raw, key, &validation)?;

        Ok(Token {
            raw: self.raw,
            header: self.header,
            claims: Some(token_data.claims),
            _state: PhantomData,
        })
    }
}

impl Token<SignatureValidated> {
    /// Check the claims against `rules` at unix time `now`.
    ///
    /// # Errors
    ///
    /// Fails on expiry, a future `iat`/`auth_time`, or a wrong issuer,
    /// audience or subject.
    pub fn validate_claims(self, rules: &ClaimRules, now: i64) -> Result<Token<Validated>, AuthError> {
        let claims = self.claims.as_ref().ok_or_else(|| AuthError::TokenMalformed {
            reason: "Claims not available".to_string(),
        })?;

        if claims.is_expired(now - rules.leeway_secs) {
            return Err(AuthError::TokenExpired { expired_at: claims.exp });
        }
        if claims.iat > now + rules.leeway_secs {
            return Err(AuthError::TokenNotYetValid { valid_from: claims.iat });
        }
        if let Some(auth_time) = claims.auth_time.filter(|t| *t > now + rules.leeway_secs) {
            return Err(AuthError::TokenNotYetValid { valid_from: auth_time });
        }

        let mut invalid = Vec::new();
        if claims.iss != rules.issuer() {
            invalid.push("iss".to_string());
        }
        if claims.aud != rules.project_id {
            invalid.push("aud".to_string());
        }
        if claims.sub.is_empty() || claims.sub.len() > MAX_SUBJECT_LEN {
            invalid.push("sub".to_string());
        }
        if !invalid.is_empty() {
            return Err(AuthError::ClaimsInvalid { claims: invalid });
        }

        Ok(Token {
            raw: self.raw,
            header: self.header,
            claims: self.claims,
            _state: PhantomData,
        })
    }

}

impl Token<Validated> {
    /// Validated claims.
    ///
    /// # Panics
    ///
    /// Never: every path into this state carries claims.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn claims(&self) -> &Claims {
        self.claims.as_ref().expect("Validated token must have claims")
    }

    /// Caller identity carried by the token.
    #[must_use]
    pub fn identity(&self) -> CallerIdentity {
        let claims = self.claims();
        CallerIdentity {
            uid: claims.sub.clone(),
            email: claims.email.clone(),
            sign_in_provider: claims.sign_in_provider().map(str::to_string),
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

