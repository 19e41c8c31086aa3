//! Caller authentication.
//!
//! Callers present a Firebase ID token as a bearer token. A token that
//! verifies yields a [`CallerIdentity`]; the issuance handler receives that
//! identity as an explicit argument.

pub mod claims;
pub mod jwk_cache;
pub mod token;
pub mod validator;

pub use claims::Claims;
pub use jwk_cache::{Jwk, JwkCache, Jwks};
pub use token::{ClaimRules, SignatureValidated, Token, TokenState, Unvalidated, Validated};
pub use validator::JwtValidator;

use serde::Serialize;
use std::future::Future;
use thiserror::Error;

/// Verified identity of the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerIdentity {
    /// User id (`sub` claim)
    pub uid: String,
    /// Email, when the account has one
    pub email: Option<String>,
    /// Provider the user signed in with
    pub sign_in_provider: Option<String>,
    /// Unix time the ID token was issued
    pub issued_at: i64,
    /// Unix time the ID token expires
    pub expires_at: i64,
}

/// ID token verification failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token signature verification failed
    #[error("Token signature invalid")]
    TokenInvalid,

    /// Token has expired
    #[error("Token expired at {expired_at}")]
    TokenExpired {
        /// Unix time the token expired
        expired_at: i64,
    },

    /// Token is issued in the future
    #[error("Token not yet valid until {valid_from}")]
    TokenNotYetValid {
        /// Unix time the token becomes valid
        valid_from: i64,
    },

    /// Token structure is malformed
    #[error("Token malformed: {reason}")]
    TokenMalformed {
        /// Description of the malformation
        reason: String,
    },

    /// Claims do not match the expected project or subject rules
    #[error("Claims invalid: {claims:?}")]
    ClaimsInvalid {
        /// Names of the failing claims
        claims: Vec<String>,
    },

    /// No published key matches the token's key id
    #[error("No signing key with kid {kid}")]
    UnknownKey {
        /// Key id from the token header
        kid: String,
    },

    /// JWK set could not be fetched or parsed
    #[error("JWK cache error: {reason}")]
    JwkCacheError {
        /// Description of the cache error
        reason: String,
    },
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => Self::TokenInvalid,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::TokenMalformed {
                reason: err.to_string(),
            },
            _ => Self::TokenMalformed {
                reason: "Token validation failed".to_string(),
            },
        }
    }
}

/// Verifies a raw bearer token into a caller identity.
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Verify `raw_token`.
    fn verify(&self, raw_token: &str) -> impl Future<Output = Result<CallerIdentity, AuthError>> + Send;
}
