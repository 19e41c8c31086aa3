//! RTC token signing.
//!
//! Builds signed `007` access tokens that an RTC media service accepts for
//! joining (and optionally publishing into) a channel.

pub mod access_token;
pub mod packer;
pub mod rtc;

pub use access_token::{AccessToken, Privilege, ServiceRtc, SignedAccessToken};
pub use rtc::{AccessTokenBuilder, RtcRole, RtcTokenSigner};

use thiserror::Error;

/// Token construction and decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// App id is not 32 hex characters
    #[error("Invalid app id: expected 32 hex characters")]
    InvalidAppId,

    /// App certificate is not 32 hex characters
    #[error("Invalid app certificate: expected 32 hex characters")]
    InvalidAppCertificate,

    /// Channel name is empty
    #[error("Channel name is empty")]
    EmptyChannelName,

    /// Token has no service section
    #[error("Token has no service")]
    NoService,

    /// Expiry is not after the issue time
    #[error("Privilege expiry {expire_at} is not after issue time {issued_at}")]
    ExpiryNotInFuture {
        /// Unix time the token would have been issued at
        issued_at: i64,
        /// Requested absolute expiry
        expire_at: u32,
    },

    /// Clock outside the 32-bit unix time range of the token format
    #[error("Timestamp {0} does not fit the token format")]
    TimestampOutOfRange(i64),

    /// A field is too long for its length prefix
    #[error("Field too long to pack: {0}")]
    FieldTooLong(usize),

    /// Compression failed
    #[error("Token compression failed: {0}")]
    Compression(String),

    /// Token string does not start with a supported version
    #[error("Unsupported token version: {0}")]
    UnsupportedVersion(String),

    /// Token carries a service this crate does not decode
    #[error("Unsupported service type: {0}")]
    UnsupportedService(u16),

    /// Token body does not match the packed layout
    #[error("Malformed token: {0}")]
    Malformed(String),
}
