//! Connection settings for the control plane and the object store.

use serde::Deserialize;

/// Control-plane API connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlPlaneConfig {
    /// Base URL of the control-plane HTTP API.
    #[serde(default = "default_url")]
    pub url: String,

    /// Bearer token sent with every request, if set.
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost:4566".to_owned()
}

const fn default_timeout_secs() -> u64 {
    10
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Object store settings for deployable packages.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base URL of the object store.
    #[serde(default = "default_url")]
    pub url: String,

    /// Bucket receiving packages.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Object key of the function package.
    #[serde(default = "default_key")]
    pub key: String,

    /// Upload timeout in seconds.
    #[serde(default = "default_upload_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_bucket() -> String {
    "hefoki".to_owned()
}

fn default_key() -> String {
    "packages/updater.zip".to_owned()
}

const fn default_upload_timeout_secs() -> u64 {
    120
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            bucket: default_bucket(),
            key: default_key(),
            timeout_secs: default_upload_timeout_secs(),
        }
    }
}
