//! Configuration module for page bundling
//!
//! This module provides the `BundleConfig` struct, its builder and the
//! named presets that can be layered onto it.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod presets;
pub mod types;

// Re-exports for public API
pub use builder::BundleConfigBuilder;
pub use presets::Preset;
pub use types::{BundleConfig, RemovalOptions, TransportOptions};
