//! Token issuance handler.
//!
//! Checks the caller identity and payload, reads the credentials, computes
//! the expiry and hands everything to the signer.

use crate::agora::{AccessTokenBuilder, RtcRole, RtcTokenSigner, SigningError};
use crate::auth::CallerIdentity;
use crate::credentials::Credentials;
use crate::error::{TokenError, MSG_INVALID_UID, MSG_MISSING_CHANNEL};
use crate::metrics;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{error, info, warn};

/// Lifetime of an issued token in seconds.
pub const TOKEN_TTL_SECONDS: i64 = 3600;

/// Role granted to every issued token.
pub const TOKEN_ROLE: RtcRole = RtcRole::Publisher;

/// Payload of a token request.
///
/// Fields are kept as raw JSON so that wrong types produce the same caller
/// messages as missing values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenRequest {
    /// Channel to join
    #[serde(default)]
    pub channel_name: Option<Value>,
    /// Numeric user id, 0 when absent
    #[serde(default)]
    pub uid: Option<Value>,
}

impl IssueTokenRequest {
    /// Request for `channel_name` without a uid.
    #[must_use]
    pub fn for_channel(channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: Some(Value::String(channel_name.into())),
            uid: None,
        }
    }

    /// Set the uid.
    #[must_use]
    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(Value::from(uid));
        self
    }

    fn channel_name(&self) -> Result<&str, TokenError> {
        match &self.channel_name {
            Some(Value::String(name)) if !name.is_empty() => Ok(name),
            _ => Err(TokenError::InvalidArgument {
                message: MSG_MISSING_CHANNEL,
            }),
        }
    }

    fn uid(&self) -> Result<u32, TokenError> {
        let invalid = || TokenError::InvalidArgument {
            message: MSG_INVALID_UID,
        };
        match &self.uid {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(invalid),
            Some(_) => Err(invalid()),
        }
    }
}

/// A signed token and its absolute expiry.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    /// Opaque RTC token
    pub token: String,
    /// Unix time the token expires
    #[serde(skip)]
    pub expires_at: u32,
}

/// Issues RTC tokens for authenticated callers.
pub struct TokenIssuer<S = AccessTokenBuilder> {
    credentials: Credentials,
    signer: S,
}

impl TokenIssuer<AccessTokenBuilder> {
    /// Issuer using the production signer.
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self::with_signer(credentials, AccessTokenBuilder::new())
    }
}

impl<S: RtcTokenSigner> TokenIssuer<S> {
    /// Issuer using a specific signer.
    #[must_use]
    pub const fn with_signer(credentials: Credentials, signer: S) -> Self {
        Self {
            credentials,
            signer,
        }
    }

    /// Issue a token for `caller`.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` without a caller, `InvalidArgument` for a bad
    /// payload, `Misconfigured` or `Signing` when no token can be built.
    pub fn issue(
        &self,
        caller: Option<&CallerIdentity>,
        request: &IssueTokenRequest,
    ) -> Result<IssuedToken, TokenError> {
        let started = Instant::now();
        let result = self.issue_at(caller, request, chrono::Utc::now().timestamp());

        match &result {
            Ok(_) => {
                metrics::record_token_issued(TOKEN_ROLE.as_str());
                metrics::record_issue_latency(started.elapsed().as_secs_f64());
            }
            Err(err) => metrics::record_rejection(err.code().as_str()),
        }
        result
    }

    fn issue_at(
        &self,
        caller: Option<&CallerIdentity>,
        request: &IssueTokenRequest,
        now: i64,
    ) -> Result<IssuedToken, TokenError> {
        let Some(caller) = caller else {
            warn!("Token request without caller identity");
            return Err(TokenError::missing_identity());
        };

        let channel_name = request.channel_name().inspect_err(|_| {
            warn!(caller = %caller.uid, "Token request missing channel name");
        })?;
        let uid = request.uid().inspect_err(|_| {
            warn!(caller = %caller.uid, channel = %channel_name, uid = ?request.uid, "Token request with invalid uid");
        })?;

        let missing = self.credentials.missing();
        if !missing.is_empty() {
            error!(missing = ?missing, "RTC credentials not configured");
            return Err(TokenError::Misconfigured { missing });
        }

        let expire_at = now + TOKEN_TTL_SECONDS;
        let privilege_expired_ts =
            u32::try_from(expire_at).map_err(|_| SigningError::TimestampOutOfRange(expire_at))?;

        let token = self
            .signer
            .build_token_with_uid(
                self.credentials.app_id(),
                self.credentials.app_certificate(),
                channel_name,
                uid,
                TOKEN_ROLE,
                privilege_expired_ts,
            )
            .inspect_err(|e| {
                error!(error = %e, channel = %channel_name, uid, "Error generating RTC token");
            })?;

        info!(
            caller = %caller.uid,
            channel = %channel_name,
            uid,
            role = %TOKEN_ROLE,
            expires_at = privilege_expired_ts,
            "RTC token generated"
        );

        Ok(IssuedToken {
            token,
            expires_at: privilege_expired_ts,
        })
    }
}
