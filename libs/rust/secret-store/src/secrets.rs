//! Vault response bodies.

use serde::Deserialize;

/// Body of a KV v2 read.
#[derive(Debug, Deserialize)]
pub struct KvReadResponse<T> {
    /// Document and its metadata
    pub data: KvDocument<T>,
}

/// A KV v2 document.
#[derive(Debug, Deserialize)]
pub struct KvDocument<T> {
    /// Stored key/value data
    pub data: T,
    /// Version metadata; absent on some mounts
    #[serde(default)]
    pub metadata: Option<DocumentMetadata>,
}

/// Version metadata of a KV v2 document.
#[derive(Debug, Deserialize)]
pub struct DocumentMetadata {
    /// Document version
    #[serde(default)]
    pub version: u32,
    /// Creation time, RFC 3339
    #[serde(default)]
    pub created_time: String,
}

/// Body of a Kubernetes auth login.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    /// Issued client token
    pub auth: LoginAuth,
}

/// Client token issued by a login.
#[derive(Debug, Deserialize)]
pub struct LoginAuth {
    /// Token to send as `X-Vault-Token`
    pub client_token: String,
    /// Token lifetime in seconds; 0 means it does not expire
    #[serde(default)]
    pub lease_duration: u64,
}
