//! Transports
//!
//! A transport turns a [`FetchRequest`] into a [`TransportResponse`]. It
//! never fails the build: every outcome, including "nothing came back", is
//! expressed as a response with a status code.
//!
//! [`Dispatcher`] is the production transport. It routes each request by
//! protocol and transport options:
//!
//! | protocol      | options                  | transport                 |
//! |---------------|--------------------------|---------------------------|
//! | `file`        | any                      | local filesystem          |
//! | `http(s)`     | `headless_browser`       | headless Chromium         |
//! | `http(s)`     | `tor`                    | HTTP through SOCKS proxy  |
//! | `http(s)`     | neither                  | direct HTTP               |
//! | `data`        | any                      | in-memory decode          |
//! | anything else | any                      | failure, status 404       |

pub mod browser;
pub mod data;
pub mod file;
pub mod http;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::TransportOptions;
use crate::locator::Protocol;
use crate::logging::BuildLogger;
use crate::utils::constants::{STATUS_NO_RESPONSE, STATUS_NOT_FOUND};

pub use browser::BrowserSession;
pub use data::parse_data_url;

/// Everything a transport needs to fetch one resource
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub absolute_url: String,
    pub protocol: Protocol,
    pub options: Arc<TransportOptions>,
}

/// Outcome of a single transport dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub bytes: Option<Vec<u8>>,
    pub success: bool,
    /// HTTP status, or a synthetic code for non-HTTP transports
    pub status_code: u16,
}

impl TransportResponse {
    #[must_use]
    pub fn success(bytes: Vec<u8>, status_code: u16) -> Self {
        Self {
            bytes: Some(bytes),
            success: true,
            status_code,
        }
    }

    #[must_use]
    pub fn failure(status_code: u16) -> Self {
        Self {
            bytes: None,
            success: false,
            status_code,
        }
    }
}

/// Boxed future returned by [`Transport::fetch`]
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = TransportResponse> + Send + 'a>>;

/// Fetches resources by absolute locator
pub trait Transport: Send + Sync {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> TransportFuture<'a>;
}

/// Transport chosen for one request
///
/// For http(s) the headless browser wins over Tor, and Tor over a direct
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    File,
    Browser,
    Tor,
    Http,
    Data,
    Unsupported,
}

impl Route {
    fn for_request(request: &FetchRequest) -> Self {
        let options = &request.options;
        match &request.protocol {
            Protocol::File => Self::File,
            Protocol::Http | Protocol::Https if options.headless_browser => Self::Browser,
            Protocol::Http | Protocol::Https if options.tor => Self::Tor,
            Protocol::Http | Protocol::Https => Self::Http,
            Protocol::Data => Self::Data,
            Protocol::Unsupported(_) => Self::Unsupported,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Browser => "browser",
            Self::Tor => "tor",
            Self::Http => "http",
            Self::Data => "data",
            Self::Unsupported => "none",
        }
    }
}

/// Identifies a reusable HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    proxy: Option<String>,
    timeout_secs: u64,
}

/// Protocol-routing production transport
///
/// Holds one HTTP client per proxy/timeout combination and at most one
/// headless browser, launched on the first browser-routed request and kept
/// until [`Dispatcher::shutdown`].
pub struct Dispatcher {
    logger: Arc<dyn BuildLogger>,
    clients: Mutex<HashMap<ClientKey, reqwest::Client>>,
    browser: RwLock<Option<BrowserSession>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(logger: Arc<dyn BuildLogger>) -> Self {
        Self {
            logger,
            clients: Mutex::new(HashMap::new()),
            browser: RwLock::new(None),
        }
    }

    fn client(&self, proxy: Option<&str>, timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
        let key = ClientKey {
            proxy: proxy.map(str::to_string),
            timeout_secs,
        };
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }
        let client = http::build_client(proxy, timeout_secs)?;
        clients.insert(key, client.clone());
        Ok(client)
    }

    async fn fetch_http(&self, request: &FetchRequest) -> TransportResponse {
        let options = &request.options;
        let (proxy, headers) = if options.tor {
            (
                Some(options.socks_endpoint()),
                http::anonymized_headers(&options.headers),
            )
        } else {
            (None, options.headers.clone())
        };

        let client = match self.client(proxy, options.request_timeout_secs) {
            Ok(client) => client,
            Err(e) => {
                self.logger
                    .error(&format!("Cannot build HTTP client for {}: {e:#}", request.absolute_url));
                return TransportResponse::failure(STATUS_NO_RESPONSE);
            }
        };

        http::fetch(&client, &request.absolute_url, &headers, options.max_resource_bytes).await
    }

    async fn fetch_rendered(&self, request: &FetchRequest) -> TransportResponse {
        let timeout_secs = request.options.browser_timeout_secs;

        {
            let session = self.browser.read().await;
            if let Some(session) = session.as_ref() {
                return session.fetch(&request.absolute_url, timeout_secs).await;
            }
        }

        let mut slot = self.browser.write().await;
        if slot.is_none() {
            match BrowserSession::launch().await {
                Ok(session) => *slot = Some(session),
                Err(e) => {
                    self.logger.error(&format!("Failed to launch headless browser: {e:#}"));
                    return TransportResponse::failure(STATUS_NO_RESPONSE);
                }
            }
        }
        let session = slot.downgrade();
        match session.as_ref() {
            Some(session) => session.fetch(&request.absolute_url, timeout_secs).await,
            None => TransportResponse::failure(STATUS_NO_RESPONSE),
        }
    }

    async fn dispatch(&self, request: &FetchRequest) -> TransportResponse {
        let route = Route::for_request(request);
        let response = match route {
            Route::File => file::fetch(&request.absolute_url, request.options.max_resource_bytes).await,
            Route::Browser => self.fetch_rendered(request).await,
            Route::Tor | Route::Http => self.fetch_http(request).await,
            Route::Data => data::fetch(&request.absolute_url),
            Route::Unsupported => {
                self.logger.warn(&format!(
                    "Unsupported protocol '{}' for {}",
                    request.protocol, request.absolute_url
                ));
                TransportResponse::failure(STATUS_NOT_FOUND)
            }
        };

        let route = route.name();
        let shown = display_locator(&request.absolute_url);
        if response.success {
            self.logger.info(&format!(
                "Fetched {shown} via {route} ({})",
                response.status_code
            ));
        } else {
            self.logger.warn(&format!(
                "Failed to fetch {shown} via {route} ({})",
                response.status_code
            ));
        }
        response
    }

    /// Close the headless browser, if one was launched
    pub async fn shutdown(&self) {
        let session = self.browser.write().await.take();
        if let Some(session) = session {
            session.close().await;
        }
    }
}

impl Transport for Dispatcher {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> TransportFuture<'a> {
        Box::pin(self.dispatch(request))
    }
}

/// Shorten `data:` locators for log lines
fn display_locator(locator: &str) -> String {
    const MAX: usize = 80;
    if locator.len() <= MAX {
        return locator.to_string();
    }
    let cut = (0..=MAX).rev().find(|i| locator.is_char_boundary(*i)).unwrap_or(0);
    format!("{}...", &locator[..cut])
}
