//! Secrets injected into the process environment by the deployment platform.

use crate::error::{SecretError, SecretResult};
use crate::provider::SecretProvider;
use secrecy::SecretString;
use std::collections::HashMap;
use std::ffi::OsString;

/// Environment-backed secret provider.
///
/// The environment is captured once at construction; later changes to the
/// process environment are not observed.
pub struct EnvSecretProvider {
    prefix: String,
    vars: HashMap<OsString, OsString>,
}

impl EnvSecretProvider {
    /// Snapshot the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars_os())
    }

    /// Build a provider over an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        Self {
            prefix: String::new(),
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Prepend `prefix` to every looked-up name (`APP_ID` -> `AGORA_APP_ID`).
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn variable_name(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }
}

impl SecretProvider for EnvSecretProvider {
    fn backend(&self) -> &'static str {
        "env"
    }

    async fn get_secret(&self, name: &str) -> SecretResult<Option<SecretString>> {
        let key = self.variable_name(name);
        match self.vars.get(&OsString::from(&key)) {
            Some(value) => value
                .clone()
                .into_string()
                .map(|v| Some(SecretString::from(v)))
                .map_err(|_| SecretError::InvalidEncoding(key)),
            None => Ok(None),
        }
    }
}
