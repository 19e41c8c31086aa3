//! Firebase ID token claims.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum length of a user id (`sub`).
pub const MAX_SUBJECT_LEN: usize = 128;

/// Claims of a Firebase ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer, `https://securetoken.google.com/<project>`
    pub iss: String,
    /// User id
    pub sub: String,
    /// Audience, the project id
    pub aud: String,
    /// Expiration time (unix seconds)
    pub exp: i64,
    /// Issued at (unix seconds)
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Time the user signed in
    pub auth_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Email address, when the account has one
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Whether the email was verified
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Sign-in details
    pub firebase: Option<FirebaseClaim>,
    #[serde(flatten)]
    /// Custom claims
    pub custom: HashMap<String, serde_json::Value>,
}

/// The `firebase` claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseClaim {
    #[serde(default)]
    /// Provider used to sign in, e.g. `password`
    pub sign_in_provider: String,
    #[serde(default)]
    /// Linked provider identities
    pub identities: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// Whether the token has expired at unix time `now`.
    #[must_use]
    pub const fn is_expired(&self, now: i64) -> bool {
        self.exp <= now
    }

    /// Sign-in provider, if the token names one.
    #[must_use]
    pub fn sign_in_provider(&self) -> Option<&str> {
        self.firebase
            .as_ref()
            .map(|f| f.sign_in_provider.as_str())
            .filter(|p| !p.is_empty())
    }
}
