//! Per-build state shared by stages and hooks

use kuchiki::NodeRef;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheSummary, ResourceCache};
use crate::config::BundleConfig;
use crate::error::{BundleError, BundleResult};
use crate::locator::Locator;
use crate::logging::BuildLogger;

use super::stage::Stage;

/// Wall time spent in one stage, hooks included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed: Duration,
}

/// What a finished build reports besides its markup
#[derive(Debug, Clone, Serialize)]
pub struct BundleSummary {
    /// Absolute locator of the entry page
    pub entry: String,
    pub resources: CacheSummary,
    pub timings: Vec<StageTiming>,
    pub markup_bytes: usize,
}

/// Result of a successful build
#[derive(Debug, Clone)]
pub struct BundleOutput {
    pub html: String,
    pub summary: BundleSummary,
}

/// Everything a build knows, handed to every stage and hook
///
/// Fields filled in by a stage are `None` until that stage has run. Hooks
/// may read and replace them; a stage that finds its input missing fails
/// with [`BundleError::StageState`].
pub struct BuildContext {
    pub(crate) config: BundleConfig,
    pub(crate) entry_reference: String,
    pub(crate) entry: Option<Locator>,
    pub(crate) document_base: Option<Locator>,
    pub(crate) cache: ResourceCache,
    pub(crate) document: Option<NodeRef>,
    pub(crate) entry_markup: Option<String>,
    pub(crate) final_markup: Option<String>,
    pub(crate) logger: Arc<dyn BuildLogger>,
    pub(crate) timings: Vec<StageTiming>,
}

impl BuildContext {
    pub(crate) fn new(
        config: BundleConfig,
        entry_reference: &str,
        cache: ResourceCache,
        logger: Arc<dyn BuildLogger>,
    ) -> Self {
        Self {
            config,
            entry_reference: entry_reference.to_string(),
            entry: None,
            document_base: None,
            cache,
            document: None,
            entry_markup: None,
            final_markup: None,
            logger,
            timings: Vec::new(),
        }
    }

    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    /// The entry reference as the caller passed it
    pub fn entry_reference(&self) -> &str {
        &self.entry_reference
    }

    /// Entry locator, resolved by the initial fetch
    pub fn entry(&self) -> Option<&Locator> {
        self.entry.as_ref()
    }

    /// Locator document references resolve against; honours `<base href>`
    pub fn document_base(&self) -> Option<&Locator> {
        self.document_base.as_ref()
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResourceCache {
        &mut self.cache
    }

    pub fn document(&self) -> Option<&NodeRef> {
        self.document.as_ref()
    }

    pub fn set_document(&mut self, document: NodeRef) {
        self.document = Some(document);
    }

    pub fn entry_markup(&self) -> Option<&str> {
        self.entry_markup.as_deref()
    }

    /// Replace the entry markup; only useful before document creation
    pub fn set_entry_markup(&mut self, markup: impl Into<String>) {
        self.entry_markup = Some(markup.into());
    }

    pub fn final_markup(&self) -> Option<&str> {
        self.final_markup.as_deref()
    }

    pub fn set_final_markup(&mut self, markup: impl Into<String>) {
        self.final_markup = Some(markup.into());
    }

    pub fn logger(&self) -> &dyn BuildLogger {
        self.logger.as_ref()
    }

    /// Timings of the stages finished so far
    pub fn timings(&self) -> &[StageTiming] {
        &self.timings
    }

    pub(crate) fn record_timing(&mut self, stage: Stage, elapsed: Duration) {
        self.timings.push(StageTiming { stage, elapsed });
    }

    pub(crate) fn require_entry(&self, stage: Stage) -> BundleResult<&Locator> {
        self.entry.as_ref().ok_or_else(|| missing(stage, "entry locator"))
    }

    pub(crate) fn require_document(&self, stage: Stage) -> BundleResult<NodeRef> {
        self.document.clone().ok_or_else(|| missing(stage, "document"))
    }

    pub(crate) fn require_document_base(&self, stage: Stage) -> BundleResult<Locator> {
        self.document_base.clone().ok_or_else(|| missing(stage, "document base"))
    }

    pub(crate) fn require_entry_markup(&self, stage: Stage) -> BundleResult<&str> {
        self.entry_markup.as_deref().ok_or_else(|| missing(stage, "entry markup"))
    }

    pub(crate) fn require_final_markup(&self, stage: Stage) -> BundleResult<String> {
        self.final_markup.clone().ok_or_else(|| missing(stage, "final markup"))
    }

    pub(crate) fn summary(&self) -> BundleSummary {
        BundleSummary {
            entry: self
                .entry
                .as_ref()
                .map_or_else(|| self.entry_reference.clone(), |e| e.absolute().to_string()),
            resources: self.cache.summary(),
            timings: self.timings.clone(),
            markup_bytes: self.final_markup.as_ref().map_or(0, String::len),
        }
    }
}

fn missing(stage: Stage, what: &str) -> BundleError {
    BundleError::StageState {
        stage,
        message: format!("no {what} in the build context"),
    }
}
