//! Resources and their shared handles
//!
//! A [`Resource`] is one fetchable artifact referenced by the page. It is
//! fetched at most once; afterwards it carries either bytes (success) or
//! nothing (failure). MIME type and extension are always derived from the
//! current bytes and are recomputed in exactly one place, [`Resource::update`].

pub mod sniff;
pub mod types;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;

use crate::config::TransportOptions;
use crate::locator::{Locator, Protocol};
use crate::transport::{FetchRequest, Transport, TransportResponse};

pub use sniff::{OCTET_STREAM, image_dimensions, sniff};
pub use types::{FetchStatus, ResourceType};

/// One fetchable artifact of the page
#[derive(Clone)]
pub struct Resource {
    url: String,
    locator: Locator,
    resource_type: ResourceType,
    transport_options: Arc<TransportOptions>,
    bytes: Option<Vec<u8>>,
    status: FetchStatus,
    status_code: Option<u16>,
    mime_type: Option<String>,
    extension: Option<String>,
    fetch_counter: u32,
    in_flight: bool,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("url", &self.url)
            .field("absolute_url", &self.locator.absolute())
            .field("resource_type", &self.resource_type)
            .field("status", &self.status)
            .field("status_code", &self.status_code)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.as_ref().map(Vec::len))
            .field("fetch_counter", &self.fetch_counter)
            .finish_non_exhaustive()
    }
}

impl Resource {
    /// Create an unfetched resource
    pub fn new(
        url: impl Into<String>,
        locator: Locator,
        resource_type: ResourceType,
        transport_options: Arc<TransportOptions>,
    ) -> Self {
        Self {
            url: url.into(),
            locator,
            resource_type,
            transport_options,
            bytes: None,
            status: FetchStatus::Unfetched,
            status_code: None,
            mime_type: None,
            extension: None,
            fetch_counter: 0,
            in_flight: false,
        }
    }

    /// The reference as it was first registered
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn absolute_url(&self) -> &str {
        self.locator.absolute()
    }

    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.locator.base()
    }

    #[must_use]
    pub fn protocol(&self) -> &Protocol {
        self.locator.protocol()
    }

    #[must_use]
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    #[must_use]
    pub fn transport_options(&self) -> &Arc<TransportOptions> {
        &self.transport_options
    }

    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    #[must_use]
    pub fn status(&self) -> FetchStatus {
        self.status
    }

    /// Code reported by the transport (synthetic for non-HTTP transports)
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Number of completed fetch attempts; never exceeds one
    #[must_use]
    pub fn fetch_counter(&self) -> u32 {
        self.fetch_counter
    }

    /// Body decoded as UTF-8 (lossy, without a leading BOM)
    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.bytes.as_deref().map(|bytes| {
            let text = String::from_utf8_lossy(bytes);
            text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
        })
    }

    /// Snapshot of everything a transport needs to fetch this resource
    #[must_use]
    pub fn request(&self) -> FetchRequest {
        FetchRequest {
            absolute_url: self.locator.absolute().to_string(),
            protocol: self.locator.protocol().clone(),
            options: Arc::clone(&self.transport_options),
        }
    }

    /// Fetch this resource if it has not been fetched yet
    ///
    /// Used for resources that live outside the shared cache (imported
    /// style sheets). Cached resources go through [`ResourceHandle::fetch`].
    pub async fn fetch(&mut self, transport: &dyn Transport) {
        if !self.status.is_unfetched() {
            return;
        }
        let request = self.request();
        let response = transport.fetch(&request).await;
        self.apply(response);
    }

    /// Record a transport response
    pub(crate) fn apply(&mut self, response: TransportResponse) {
        self.fetch_counter += 1;
        self.status_code = Some(response.status_code);
        if response.success {
            self.status = FetchStatus::Success;
            self.update(Some(response.bytes.unwrap_or_default()));
        } else {
            self.status = FetchStatus::Failure;
            self.update(None);
        }
    }

    /// Replace the body and recompute MIME type and extension
    ///
    /// `None` clears the body. The fetch status is left untouched, so a
    /// plugin can blank a successfully fetched resource.
    pub fn update(&mut self, bytes: Option<Vec<u8>>) {
        match bytes.as_deref() {
            Some(body) => {
                let suffix = self.locator.suffix();
                let (mime_type, extension) = sniff(body, suffix.as_deref());
                self.mime_type = Some(mime_type);
                self.extension = Some(extension);
            }
            None => {
                self.mime_type = None;
                self.extension = None;
            }
        }
        self.bytes = bytes;
    }

    /// `data:` URI of the current body
    ///
    /// Anything but a successfully fetched resource with bytes yields the
    /// empty string.
    #[must_use]
    pub fn to_base64(&self) -> String {
        if !self.status.is_success() {
            return String::new();
        }
        match (&self.bytes, &self.mime_type) {
            (Some(bytes), Some(mime_type)) => {
                format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
            }
            _ => String::new(),
        }
    }
}

/// Shared, interior-mutable reference to a cached [`Resource`]
///
/// Every holder of a handle observes the same resource: an update made
/// through one handle is visible through all of them.
#[derive(Clone)]
pub struct ResourceHandle(Arc<Mutex<Resource>>);

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.lock().fmt(f)
    }
}

impl ResourceHandle {
    #[must_use]
    pub fn new(resource: Resource) -> Self {
        Self(Arc::new(Mutex::new(resource)))
    }

    /// Lock the resource for inspection or mutation
    ///
    /// Never hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, Resource> {
        self.0.lock()
    }

    #[must_use]
    pub fn status(&self) -> FetchStatus {
        self.0.lock().status()
    }

    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.0.lock().resource_type()
    }

    #[must_use]
    pub fn absolute_url(&self) -> String {
        self.0.lock().absolute_url().to_string()
    }

    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.0.lock().text()
    }

    #[must_use]
    pub fn to_base64(&self) -> String {
        self.0.lock().to_base64()
    }

    pub fn update(&self, bytes: Option<Vec<u8>>) {
        self.0.lock().update(bytes);
    }

    /// Clone of the current resource state
    #[must_use]
    pub fn snapshot(&self) -> Resource {
        self.0.lock().clone()
    }

    /// True when both handles refer to the same cache entry
    #[must_use]
    pub fn ptr_eq(&self, other: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Fetch the resource unless it was fetched already or a fetch is running
    ///
    /// The claim is taken under the lock, so concurrent callers on the same
    /// entry dispatch at most one transport request. Returns whether this
    /// call performed the fetch.
    pub async fn fetch(&self, transport: &dyn Transport) -> bool {
        let request = {
            let mut resource = self.0.lock();
            if !resource.status.is_unfetched() || resource.in_flight {
                return false;
            }
            resource.in_flight = true;
            resource.request()
        };

        let response = transport.fetch(&request).await;

        let mut resource = self.0.lock();
        resource.in_flight = false;
        resource.apply(response);
        true
    }
}
