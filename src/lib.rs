pub mod cache;
pub mod config;
pub mod css;
pub mod document;
pub mod error;
pub mod locator;
pub mod logging;
pub mod pipeline;
pub mod plugins;
pub mod resource;
pub mod transport;
pub mod utils;

pub use cache::{CacheSummary, ResourceCache};
pub use config::{BundleConfig, BundleConfigBuilder, Preset, RemovalOptions, TransportOptions};
pub use error::{BundleError, BundleResult};
pub use locator::{Locator, Protocol};
pub use logging::{BuildLogger, LogLevel, MemoryLogger, SilentLogger, TracingLogger};
pub use pipeline::{
    BuildContext, BundleOutput, BundleSummary, Bundler, DocumentPhase, FnHook, Slot, Stage,
    StageHook, StageTiming, hook_fn,
};
pub use plugins::{
    CommentStripper, DocumentPlugin, MarkupPlugin, ResourcePlugin, SelectorRemover,
    TrackingPixelRemover, TypeDropper,
};
pub use resource::{FetchStatus, Resource, ResourceHandle, ResourceType};
pub use transport::{Dispatcher, FetchRequest, Transport, TransportFuture, TransportResponse};

/// Bundle `entry` with `config` through the default dispatcher
///
/// The headless browser, if one was launched, is closed before returning.
pub async fn bundle(entry: &str, config: BundleConfig) -> BundleResult<BundleOutput> {
    let bundler = Bundler::new(config);
    let result = bundler.run(entry).await;
    bundler.shutdown().await;
    result
}
