//! Deduplicating resource registry for one bundling run
//!
//! Entries are keyed by absolute locator. Registering a key that already
//! exists returns the existing handle, so every place in the page that
//! points at the same target shares one [`Resource`] and one fetch.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::TransportOptions;
use crate::error::BundleResult;
use crate::locator::Locator;
use crate::resource::{FetchStatus, Resource, ResourceHandle, ResourceType};
use crate::transport::Transport;

/// Counts of cache entries by fetch outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub unfetched: usize,
}

#[derive(Clone)]
pub struct ResourceCache {
    entries: HashMap<String, ResourceHandle>,
    transport: Arc<dyn Transport>,
    options: Arc<TransportOptions>,
}

impl fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("ResourceCache")
            .field("entries", &keys)
            .finish_non_exhaustive()
    }
}

impl ResourceCache {
    /// Create an empty cache whose resources fetch through `transport`
    pub fn new(transport: Arc<dyn Transport>, options: Arc<TransportOptions>) -> Self {
        Self {
            entries: HashMap::new(),
            transport,
            options,
        }
    }

    /// Register a reference resolved as an entry locator
    pub fn register(&mut self, url: &str, resource_type: ResourceType) -> BundleResult<ResourceHandle> {
        let locator = Locator::entry(url)?;
        Ok(self.register_locator(locator, resource_type))
    }

    /// Register a reference found inside the resource described by `parent`
    pub fn register_within(
        &mut self,
        reference: &str,
        parent: &Locator,
        resource_type: ResourceType,
    ) -> BundleResult<ResourceHandle> {
        let locator = Locator::within(reference, parent)?;
        Ok(self.register_locator(locator, resource_type))
    }

    /// Register an already resolved locator
    ///
    /// An existing entry keeps its original reference and type.
    pub fn register_locator(&mut self, locator: Locator, resource_type: ResourceType) -> ResourceHandle {
        let options = &self.options;
        self.entries
            .entry(locator.absolute().to_string())
            .or_insert_with(|| {
                let raw = locator.raw().to_string();
                ResourceHandle::new(Resource::new(raw, locator, resource_type, Arc::clone(options)))
            })
            .clone()
    }

    /// True if `absolute` is a key
    #[must_use]
    pub fn has(&self, absolute: &str) -> bool {
        self.entries.contains_key(absolute)
    }

    #[must_use]
    pub fn get(&self, absolute: &str) -> Option<ResourceHandle> {
        self.entries.get(absolute).cloned()
    }

    /// Look up a reference as it appears inside `parent`
    ///
    /// References that cannot be resolved are simply absent.
    #[must_use]
    pub fn lookup(&self, reference: &str, parent: &Locator) -> Option<ResourceHandle> {
        let locator = Locator::within(reference, parent).ok()?;
        self.get(locator.absolute())
    }

    /// Entries of one type, sharing handles with this cache
    #[must_use]
    pub fn subset_by_type(&self, resource_type: ResourceType) -> ResourceCache {
        let entries = self
            .entries
            .iter()
            .filter(|(_, handle)| handle.resource_type() == resource_type)
            .map(|(key, handle)| (key.clone(), handle.clone()))
            .collect();
        Self {
            entries,
            transport: Arc::clone(&self.transport),
            options: Arc::clone(&self.options),
        }
    }

    /// Fetch every unfetched entry concurrently and wait for all to settle
    ///
    /// Returns the number of transport requests issued.
    pub async fn fetch_all_unfetched(&self) -> usize {
        let transport = self.transport.as_ref();
        let pending = self
            .entries
            .values()
            .filter(|handle| handle.status().is_unfetched())
            .map(|handle| handle.fetch(transport));

        join_all(pending).await.into_iter().filter(|fetched| *fetched).count()
    }

    /// Fetch the unfetched entries of one type
    pub async fn fetch_subset_unfetched(&self, resource_type: ResourceType) -> usize {
        self.subset_by_type(resource_type).fetch_all_unfetched().await
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(absolute locator, handle)` pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceHandle)> {
        self.entries.iter().map(|(key, handle)| (key.as_str(), handle))
    }

    pub fn handles(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.entries.values()
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    #[must_use]
    pub fn options(&self) -> &Arc<TransportOptions> {
        &self.options
    }

    #[must_use]
    pub fn summary(&self) -> CacheSummary {
        let mut summary = CacheSummary {
            total: self.entries.len(),
            ..CacheSummary::default()
        };
        for handle in self.entries.values() {
            match handle.status() {
                FetchStatus::Success => summary.succeeded += 1,
                FetchStatus::Failure => summary.failed += 1,
                FetchStatus::Unfetched => summary.unfetched += 1,
            }
        }
        summary
    }
}
