//! Fluent builder for `BundleConfig`
//!
//! Resolution order is fixed: base configuration (default, or one loaded
//! from a file) → requested presets in [`Preset`] declaration order →
//! explicit builder settings. The result is validated once and is
//! immutable for the duration of a run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::presets::Preset;
use super::types::BundleConfig;
use crate::error::{BundleError, BundleResult};
use crate::resource::ResourceType;

#[derive(Debug, Clone, Default)]
pub struct BundleConfigBuilder {
    pub(crate) base: Option<BundleConfig>,
    pub(crate) presets: Vec<Preset>,
    pub(crate) headless_browser: Option<bool>,
    pub(crate) tor: Option<bool>,
    pub(crate) socks_proxy: Option<String>,
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) request_timeout_secs: Option<u64>,
    pub(crate) browser_timeout_secs: Option<u64>,
    pub(crate) max_resource_bytes: Option<usize>,
    pub(crate) pre_style: Vec<String>,
    pub(crate) post_style: Vec<String>,
    pub(crate) strip_comments: Option<bool>,
    pub(crate) remove_tracking_pixels: Option<bool>,
    pub(crate) drop_types: Vec<ResourceType>,
    pub(crate) output: Option<PathBuf>,
}

impl BundleConfig {
    /// Create a builder for configuring a `BundleConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> BundleConfigBuilder {
        BundleConfigBuilder::default()
    }
}

impl BundleConfigBuilder {
    /// Start from an existing configuration instead of the defaults
    #[must_use]
    pub fn from_config(config: BundleConfig) -> Self {
        Self {
            base: Some(config),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn preset(mut self, preset: Preset) -> Self {
        self.presets.push(preset);
        self
    }

    #[must_use]
    pub fn headless_browser(mut self, enabled: bool) -> Self {
        self.headless_browser = Some(enabled);
        self
    }

    #[must_use]
    pub fn tor(mut self, enabled: bool) -> Self {
        self.tor = Some(enabled);
        self
    }

    /// SOCKS proxy for Tor-routed requests, e.g. `socks5h://127.0.0.1:9150`
    #[must_use]
    pub fn socks_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.socks_proxy = Some(proxy.into());
        self
    }

    /// Add a request header; later values for the same name win
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn browser_timeout_secs(mut self, secs: u64) -> Self {
        self.browser_timeout_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn max_resource_bytes(mut self, bytes: usize) -> Self {
        self.max_resource_bytes = Some(bytes);
        self
    }

    /// Remove elements matching `selector` before styles are inlined
    #[must_use]
    pub fn remove_before_styles(mut self, selector: impl Into<String>) -> Self {
        self.pre_style.push(selector.into());
        self
    }

    /// Remove elements matching `selector` after styles are inlined
    #[must_use]
    pub fn remove_after_styles(mut self, selector: impl Into<String>) -> Self {
        self.post_style.push(selector.into());
        self
    }

    #[must_use]
    pub fn strip_comments(mut self, enabled: bool) -> Self {
        self.strip_comments = Some(enabled);
        self
    }

    #[must_use]
    pub fn remove_tracking_pixels(mut self, enabled: bool) -> Self {
        self.remove_tracking_pixels = Some(enabled);
        self
    }

    /// Blank every resource of `resource_type` before inlining
    #[must_use]
    pub fn drop_type(mut self, resource_type: ResourceType) -> Self {
        self.drop_types.push(resource_type);
        self
    }

    #[must_use]
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn build(self) -> BundleResult<BundleConfig> {
        let mut config = self.base.unwrap_or_default();

        let mut presets = self.presets;
        presets.sort();
        presets.dedup();
        for preset in presets {
            preset.apply(&mut config);
        }

        let transport = &mut config.transport;
        if let Some(enabled) = self.headless_browser {
            transport.headless_browser = enabled;
        }
        if let Some(enabled) = self.tor {
            transport.tor = enabled;
        }
        if let Some(proxy) = self.socks_proxy {
            transport.socks_proxy = Some(proxy);
        }
        transport.headers.extend(self.headers);
        if let Some(secs) = self.request_timeout_secs {
            transport.request_timeout_secs = secs;
        }
        if let Some(secs) = self.browser_timeout_secs {
            transport.browser_timeout_secs = secs;
        }
        if let Some(bytes) = self.max_resource_bytes {
            transport.max_resource_bytes = bytes;
        }

        let removals = &mut config.removals;
        removals.pre_style.extend(self.pre_style);
        removals.post_style.extend(self.post_style);
        if let Some(enabled) = self.strip_comments {
            removals.strip_comments = enabled;
        }
        if let Some(enabled) = self.remove_tracking_pixels {
            removals.remove_tracking_pixels = enabled;
        }
        for resource_type in self.drop_types {
            if !removals.drop_types.contains(&resource_type) {
                removals.drop_types.push(resource_type);
            }
        }

        if self.output.is_some() {
            config.output = self.output;
        }

        validate(&config)?;
        Ok(config)
    }
}

/// Reject settings no transport can work with
pub(crate) fn validate(config: &BundleConfig) -> BundleResult<()> {
    let transport = &config.transport;
    if transport.request_timeout_secs == 0 {
        return Err(BundleError::Config("request_timeout_secs must be positive".into()));
    }
    if transport.browser_timeout_secs == 0 {
        return Err(BundleError::Config("browser_timeout_secs must be positive".into()));
    }
    if transport.max_resource_bytes == 0 {
        return Err(BundleError::Config("max_resource_bytes must be positive".into()));
    }
    if let Some(proxy) = &transport.socks_proxy
        && !proxy.starts_with("socks")
    {
        return Err(BundleError::Config(format!(
            "socks_proxy must be a socks4/socks5 URL, got '{proxy}'"
        )));
    }
    for selector in config
        .removals
        .pre_style
        .iter()
        .chain(&config.removals.post_style)
    {
        if selector.trim().is_empty() {
            return Err(BundleError::Config("removal selectors must not be empty".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build() {
        let config = BundleConfig::builder().build().unwrap();
        assert_eq!(config, BundleConfig::default());
    }

    #[test]
    fn test_explicit_setting_beats_preset() {
        let config = BundleConfig::builder()
            .headless_browser(false)
            .preset(Preset::Rendered)
            .build()
            .unwrap();
        assert!(!config.headless_browser());
    }

    #[test]
    fn test_presets_apply_in_declaration_order() {
        let forward = BundleConfig::builder()
            .preset(Preset::Minimal)
            .preset(Preset::NoScripts)
            .build()
            .unwrap();
        let reverse = BundleConfig::builder()
            .preset(Preset::NoScripts)
            .preset(Preset::Minimal)
            .build()
            .unwrap();
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_anonymous_clears_file_headers_but_keeps_builder_headers() {
        let mut base = BundleConfig::default();
        base.transport.headers.insert("Cookie".into(), "secret".into());

        let config = BundleConfigBuilder::from_config(base)
            .preset(Preset::Anonymous)
            .header("Accept", "*/*")
            .build()
            .unwrap();

        assert!(config.tor());
        assert!(!config.transport().headers.contains_key("Cookie"));
        assert_eq!(config.transport().headers.get("Accept").map(String::as_str), Some("*/*"));
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        assert!(BundleConfig::builder().request_timeout_secs(0).build().is_err());
        assert!(BundleConfig::builder().socks_proxy("http://127.0.0.1:8080").build().is_err());
        assert!(BundleConfig::builder().remove_before_styles(" ").build().is_err());
    }
}
