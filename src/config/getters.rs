//! Getter methods for `BundleConfig`

use std::path::Path;

use super::types::{BundleConfig, RemovalOptions, TransportOptions};

impl BundleConfig {
    #[must_use]
    pub fn transport(&self) -> &TransportOptions {
        &self.transport
    }

    #[must_use]
    pub fn removals(&self) -> &RemovalOptions {
        &self.removals
    }

    #[must_use]
    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    #[must_use]
    pub fn headless_browser(&self) -> bool {
        self.transport.headless_browser
    }

    #[must_use]
    pub fn tor(&self) -> bool {
        self.transport.tor
    }

    #[must_use]
    pub fn strip_comments(&self) -> bool {
        self.removals.strip_comments
    }

    #[must_use]
    pub fn remove_tracking_pixels(&self) -> bool {
        self.removals.remove_tracking_pixels
    }
}
