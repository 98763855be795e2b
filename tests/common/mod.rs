//! Test utilities shared by the bundler integration tests

use kodegen_tools_pagebundle::{
    BundleConfig, Bundler, FetchRequest, SilentLogger, Transport, TransportFuture,
    TransportResponse,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One transparent GIF pixel
#[allow(dead_code)]
pub const PIXEL_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

/// PNG header of a 2x2 image; enough for content sniffing
#[allow(dead_code)]
pub const SMALL_PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR\x00\x00\x00\x02\x00\x00\x00\x02\x08\x06\x00\x00\x00";

/// In-memory transport serving fixed bodies by absolute locator
///
/// Unknown locators fail with 404. Every request is counted.
#[derive(Default)]
pub struct MapTransport {
    bodies: HashMap<String, Vec<u8>>,
    calls: Mutex<HashMap<String, usize>>,
}

#[allow(dead_code)]
impl MapTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    /// Requests made for `url` so far
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }
}

impl Transport for MapTransport {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> TransportFuture<'a> {
        *self
            .calls
            .lock()
            .entry(request.absolute_url.clone())
            .or_default() += 1;
        let response = match self.bodies.get(&request.absolute_url) {
            Some(body) => TransportResponse::success(body.clone(), 200),
            None => TransportResponse::failure(404),
        };
        Box::pin(async move {
            tokio::task::yield_now().await;
            response
        })
    }
}

/// Quiet bundler over `transport`
#[allow(dead_code)]
pub fn bundler(config: BundleConfig, transport: &Arc<MapTransport>) -> Bundler {
    let transport: Arc<dyn Transport> = transport.clone();
    Bundler::with_transport(config, transport).with_logger(Arc::new(SilentLogger))
}

/// Minimal HTML document around `head` and `body` fragments
#[allow(dead_code)]
pub fn page(head: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Fixture</title>
    {head}
</head>
<body>
    {body}
</body>
</html>"#
    )
}

/// Number of non-overlapping occurrences of `needle` in `haystack`
#[allow(dead_code)]
pub fn occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
