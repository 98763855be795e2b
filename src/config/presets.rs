//! Named bundles of settings
//!
//! Presets are applied to the base configuration in declaration order,
//! whatever order they were requested in, and before any explicit builder
//! setting. A later preset may therefore refine an earlier one, and an
//! explicit setting always wins.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::BundleConfig;
use crate::resource::ResourceType;

/// Elements that load or run code
const SCRIPT_SELECTORS: &[&str] = &["script", "noscript", "iframe", "object", "embed"];

/// Elements that carry media rather than text
const MEDIA_SELECTORS: &[&str] = &["img", "picture", "video", "audio", "svg", "canvas", "source", "track"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Render pages in headless Chromium
    Rendered,
    /// Route through Tor with a generic header set
    Anonymous,
    /// Remove scripts and script-like embeds
    NoScripts,
    /// Keep text and styles only
    TextOnly,
    /// Remove comments and tracking pixels
    Minimal,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Rendered,
        Preset::Anonymous,
        Preset::NoScripts,
        Preset::TextOnly,
        Preset::Minimal,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Preset::Rendered => "rendered",
            Preset::Anonymous => "anonymous",
            Preset::NoScripts => "no-scripts",
            Preset::TextOnly => "text-only",
            Preset::Minimal => "minimal",
        }
    }

    pub(crate) fn apply(self, config: &mut BundleConfig) {
        match self {
            Preset::Rendered => {
                config.transport.headless_browser = true;
            }
            Preset::Anonymous => {
                config.transport.tor = true;
                config.transport.headers.clear();
            }
            Preset::NoScripts => {
                extend_unique(&mut config.removals.pre_style, SCRIPT_SELECTORS);
                push_unique(&mut config.removals.drop_types, ResourceType::Script);
            }
            Preset::TextOnly => {
                extend_unique(&mut config.removals.pre_style, SCRIPT_SELECTORS);
                extend_unique(&mut config.removals.post_style, MEDIA_SELECTORS);
                for resource_type in [
                    ResourceType::Script,
                    ResourceType::Image,
                    ResourceType::Audio,
                    ResourceType::Video,
                ] {
                    push_unique(&mut config.removals.drop_types, resource_type);
                }
            }
            Preset::Minimal => {
                config.removals.strip_comments = true;
                config.removals.remove_tracking_pixels = true;
            }
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn extend_unique(target: &mut Vec<String>, selectors: &[&str]) {
    for selector in selectors {
        if !target.iter().any(|s| s == selector) {
            target.push((*selector).to_string());
        }
    }
}

fn push_unique<T: PartialEq>(target: &mut Vec<T>, value: T) {
    if !target.contains(&value) {
        target.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_only_implies_no_script_removals() {
        let mut config = BundleConfig::default();
        Preset::TextOnly.apply(&mut config);

        assert!(config.removals.pre_style.iter().any(|s| s == "script"));
        assert!(config.removals.post_style.iter().any(|s| s == "img"));
        assert!(config.removals.drop_types.contains(&ResourceType::Image));
    }

    #[test]
    fn test_presets_are_idempotent() {
        let mut config = BundleConfig::default();
        Preset::NoScripts.apply(&mut config);
        Preset::NoScripts.apply(&mut config);
        assert_eq!(config.removals.pre_style.len(), SCRIPT_SELECTORS.len());
        assert_eq!(config.removals.drop_types, vec![ResourceType::Script]);
    }
}
