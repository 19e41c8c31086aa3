//! Secret retrieval for RTC platform services.
//!
//! Secrets are either injected into the process environment by the
//! deployment platform ([`EnvSecretProvider`]) or read from a HashiCorp
//! Vault KV v2 document ([`VaultClient`]). Both sit behind the
//! [`SecretProvider`] trait so services can be wired to either at startup.

pub mod client;
pub mod config;
pub mod env;
pub mod error;
pub mod provider;
pub mod secrets;

pub use client::VaultClient;
pub use config::VaultConfig;
pub use env::EnvSecretProvider;
pub use error::{SecretError, SecretResult};
pub use provider::SecretProvider;
