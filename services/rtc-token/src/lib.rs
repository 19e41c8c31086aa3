//! RTC Token Service library.
//!
//! Issues short-lived RTC access tokens to callers holding a verified
//! Firebase ID token. Credentials come from a secret store; tokens are
//! signed in-process.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agora;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handler;
pub mod http;
pub mod metrics;
pub mod observability;
pub mod shutdown;

// Re-exports for convenience
pub use config::Config;
pub use credentials::Credentials;
pub use error::TokenError;
pub use handler::{IssueTokenRequest, IssuedToken, TokenIssuer};
