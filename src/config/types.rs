//! Core configuration types for page bundling
//!
//! `BundleConfig` is what a run is built from. It can be deserialized from a
//! JSON file and refined with [`super::BundleConfigBuilder`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::builder::validate;
use crate::error::{BundleError, BundleResult};
use crate::resource::ResourceType;
use crate::utils::constants::{
    DEFAULT_BROWSER_TIMEOUT_SECS, DEFAULT_MAX_RESOURCE_BYTES, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_TOR_SOCKS_PROXY,
};

/// Options handed to the transport with every fetch
///
/// Shared by every resource of a run behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    /// Load http(s) resources through headless Chromium
    #[serde(alias = "headlessBrowserTransport")]
    pub headless_browser: bool,

    /// Route http(s) requests through a SOCKS proxy (Tor)
    #[serde(alias = "torTransport")]
    pub tor: bool,

    /// Proxy used when `tor` is set; defaults to the local Tor daemon
    #[serde(alias = "socksProxyAgentString")]
    pub socks_proxy: Option<String>,

    /// Extra request headers for HTTP transports
    pub headers: BTreeMap<String, String>,

    pub request_timeout_secs: u64,

    pub browser_timeout_secs: u64,

    /// Bodies larger than this fail with status 413
    pub max_resource_bytes: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            headless_browser: false,
            tor: false,
            socks_proxy: None,
            headers: BTreeMap::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            browser_timeout_secs: DEFAULT_BROWSER_TIMEOUT_SECS,
            max_resource_bytes: DEFAULT_MAX_RESOURCE_BYTES,
        }
    }
}

impl TransportOptions {
    /// SOCKS endpoint for Tor-routed requests
    #[must_use]
    pub fn socks_endpoint(&self) -> &str {
        self.socks_proxy.as_deref().unwrap_or(DEFAULT_TOR_SOCKS_PROXY)
    }
}

/// What the built-in removal and modification plugins do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalOptions {
    /// CSS selectors removed before style inlining
    pub pre_style: Vec<String>,

    /// CSS selectors removed after style inlining
    pub post_style: Vec<String>,

    /// Drop HTML comments from the final document
    pub strip_comments: bool,

    /// Blank raster images of at most 1x1 pixels
    pub remove_tracking_pixels: bool,

    /// Resource types whose bodies are blanked before inlining
    pub drop_types: Vec<ResourceType>,
}

/// Main configuration struct for a bundling run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    pub(crate) transport: TransportOptions,
    pub(crate) removals: RemovalOptions,
    /// Where the final markup is written; `None` leaves it to the caller
    pub(crate) output: Option<PathBuf>,
}

impl BundleConfig {
    /// Parse and validate a configuration from JSON
    pub fn from_json_str(json: &str) -> BundleResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BundleError::Config(format!("Invalid config: {e}")))?;
        validate(&config)?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> BundleResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            BundleError::Config(format!("Cannot read config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }
}
