//! Generic secret provider trait.
//!
//! Uses native async traits (Rust 2024 edition).

use crate::error::SecretResult;
use secrecy::SecretString;
use std::future::Future;

/// Source of named secret values.
///
/// `Ok(None)` means the secret is not set in the backend. An empty value is
/// returned unchanged; deciding whether empty is acceptable is the caller's
/// concern.
pub trait SecretProvider: Send + Sync {
    /// Short backend name, used in log fields.
    fn backend(&self) -> &'static str;

    /// Look up a secret by name.
    fn get_secret(
        &self,
        name: &str,
    ) -> impl Future<Output = SecretResult<Option<SecretString>>> + Send;

    /// Look up several secrets, returned in the order of `names`.
    ///
    /// Backends that keep all secrets in one document override this to
    /// read it once.
    fn get_secrets(
        &self,
        names: &[&str],
    ) -> impl Future<Output = SecretResult<Vec<Option<SecretString>>>> + Send {
        async move {
            let mut values = Vec::with_capacity(names.len());
            for name in names {
                values.push(self.get_secret(name).await?);
            }
            Ok(values)
        }
    }
}
