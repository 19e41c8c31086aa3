//! RTC token builder: roles, privileges and the signer seam used by the
//! issuance handler.

use super::access_token::{AccessToken, Privilege, ServiceRtc};
use super::SigningError;
use serde::Serialize;
use std::fmt;

/// Role granted by an RTC token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RtcRole {
    /// Send and receive media.
    Publisher = 1,
    /// Receive media only.
    Subscriber = 2,
}

impl RtcRole {
    /// Privileges carried by a token with this role.
    #[must_use]
    pub const fn privileges(self) -> &'static [Privilege] {
        match self {
            Self::Publisher => &[
                Privilege::JoinChannel,
                Privilege::PublishAudioStream,
                Privilege::PublishVideoStream,
                Privilege::PublishDataStream,
            ],
            Self::Subscriber => &[Privilege::JoinChannel],
        }
    }

    /// Lowercase role name for logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Publisher => "publisher",
            Self::Subscriber => "subscriber",
        }
    }
}

impl fmt::Display for RtcRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token-signing primitive called by the issuance handler.
#[cfg_attr(test, mockall::automock)]
pub trait RtcTokenSigner: Send + Sync {
    /// Build a token for `uid` in `channel_name`, valid until the absolute
    /// unix time `privilege_expired_ts`.
    ///
    /// # Errors
    ///
    /// Returns an error when the credentials are malformed or the expiry
    /// is not in the future.
    fn build_token_with_uid(
        &self,
        app_id: &str,
        app_certificate: &str,
        channel_name: &str,
        uid: u32,
        role: RtcRole,
        privilege_expired_ts: u32,
    ) -> Result<String, SigningError>;
}

/// Production signer producing `007` tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessTokenBuilder;

impl AccessTokenBuilder {
    /// Create a builder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Build with an explicit issue time. Token and privilege lifetimes are
    /// both `privilege_expired_ts - issue_ts` seconds.
    fn build_at(
        issue_ts: u32,
        app_id: &str,
        app_certificate: &str,
        mut service: ServiceRtc,
        role: RtcRole,
        privilege_expired_ts: u32,
    ) -> Result<String, SigningError> {
        if service.channel_name().is_empty() {
            return Err(SigningError::EmptyChannelName);
        }
        let expire = privilege_expired_ts
            .checked_sub(issue_ts)
            .filter(|secs| *secs > 0)
            .ok_or(SigningError::ExpiryNotInFuture {
                issued_at: i64::from(issue_ts),
                expire_at: privilege_expired_ts,
            })?;

        for privilege in role.privileges() {
            service.add_privilege(*privilege, expire);
        }

        let mut token = AccessToken::new(app_id, issue_ts, expire);
        token.add_service(service);
        token.build(app_certificate)
    }
}

impl RtcTokenSigner for AccessTokenBuilder {
    fn build_token_with_uid(
        &self,
        app_id: &str,
        app_certificate: &str,
        channel_name: &str,
        uid: u32,
        role: RtcRole,
        privilege_expired_ts: u32,
    ) -> Result<String, SigningError> {
        Self::build_at(
            now()?,
            app_id,
            app_certificate,
            ServiceRtc::new(channel_name, uid),
            role,
            privilege_expired_ts,
        )
    }
}

fn now() -> Result<u32, SigningError> {
    let ts = chrono::Utc::now().timestamp();
    u32::try_from(ts).map_err(|_| SigningError::TimestampOutOfRange(ts))
}
