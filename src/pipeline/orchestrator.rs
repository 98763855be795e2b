//! Build driver
//!
//! A [`Bundler`] owns the configuration, the transport and the extension
//! tables. Each call to [`Bundler::run`] gets a fresh cache and context, then
//! walks [`Stage::ALL`] strictly in order: `Before` hooks, the stage body,
//! `After` hooks. The first error aborts the run.

use anyhow::Context;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::ResourceCache;
use crate::config::BundleConfig;
use crate::error::{BundleError, BundleResult};
use crate::logging::{BuildLogger, TracingLogger};
use crate::plugins::{DocumentPlugin, MarkupPlugin, ResourcePlugin};
use crate::transport::{Dispatcher, Transport};

use super::context::{BuildContext, BundleOutput};
use super::hooks::{HookTable, StageHook};
use super::stage::{Slot, Stage};
use super::stages::{DocumentPhase, PluginTable, run_stage};

pub struct Bundler {
    config: BundleConfig,
    transport: Arc<dyn Transport>,
    /// Set when the bundler built its own transport and must shut it down
    dispatcher: Option<Arc<Dispatcher>>,
    logger: Arc<dyn BuildLogger>,
    hooks: HookTable,
    plugins: PluginTable,
}

impl fmt::Debug for Bundler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundler")
            .field("config", &self.config)
            .field("owns_dispatcher", &self.dispatcher.is_some())
            .field("hooks", &self.hooks.len())
            .field("plugins", &self.plugins.len())
            .finish_non_exhaustive()
    }
}

impl Bundler {
    /// Bundler fetching through the protocol-routing [`Dispatcher`] and
    /// reporting to `tracing`
    #[must_use]
    pub fn new(config: BundleConfig) -> Self {
        let logger: Arc<dyn BuildLogger> = Arc::new(TracingLogger);
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&logger)));
        Self {
            config,
            transport: dispatcher.clone(),
            dispatcher: Some(dispatcher),
            logger,
            hooks: HookTable::default(),
            plugins: PluginTable::default(),
        }
    }

    /// Bundler fetching through a caller-supplied transport
    #[must_use]
    pub fn with_transport(config: BundleConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            dispatcher: None,
            logger: Arc::new(TracingLogger),
            hooks: HookTable::default(),
            plugins: PluginTable::default(),
        }
    }

    /// Report build progress to `logger`
    ///
    /// A bundler that owns its dispatcher rebuilds it so dispatch lines go
    /// to the same sink.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn BuildLogger>) -> Self {
        if self.dispatcher.is_some() {
            let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&logger)));
            self.transport = dispatcher.clone();
            self.dispatcher = Some(dispatcher);
        }
        self.logger = logger;
        self
    }

    /// Append a hook to the `slot` of `stage`
    #[must_use]
    pub fn hook(mut self, stage: Stage, slot: Slot, hook: impl StageHook + 'static) -> Self {
        self.hooks.add(stage, slot, Box::new(hook));
        self
    }

    #[must_use]
    pub fn document_plugin(mut self, phase: DocumentPhase, plugin: impl DocumentPlugin + 'static) -> Self {
        self.plugins.add_document(phase, Box::new(plugin));
        self
    }

    #[must_use]
    pub fn resource_plugin(mut self, plugin: impl ResourcePlugin + 'static) -> Self {
        self.plugins.resources.push(Box::new(plugin));
        self
    }

    #[must_use]
    pub fn markup_plugin(mut self, plugin: impl MarkupPlugin + 'static) -> Self {
        self.plugins.markup.push(Box::new(plugin));
        self
    }

    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    /// Bundle the page at `entry` into one self-contained document
    ///
    /// The returned future is not `Send`: the document tree lives on the
    /// calling task.
    pub async fn run(&self, entry: &str) -> BundleResult<BundleOutput> {
        let started = Instant::now();
        let cache = ResourceCache::new(
            Arc::clone(&self.transport),
            Arc::new(self.config.transport().clone()),
        );
        let mut ctx = BuildContext::new(self.config.clone(), entry, cache, Arc::clone(&self.logger));
        self.logger.info(&format!("Bundling {entry}"));

        for stage in Stage::ALL {
            let stage_started = Instant::now();
            self.logger.debug(&format!("Stage {stage} started"));

            self.run_hooks(stage, Slot::Before, &mut ctx).await?;
            run_stage(stage, &mut ctx, &self.plugins).await?;
            self.run_hooks(stage, Slot::After, &mut ctx).await?;

            let elapsed = stage_started.elapsed();
            ctx.record_timing(stage, elapsed);
            self.logger.debug(&format!("Stage {stage} finished in {elapsed:?}"));
        }

        let html = ctx.require_final_markup(Stage::FinalMarkupCreation)?;
        if let Some(path) = self.config.output() {
            tokio::fs::write(path, html.as_bytes())
                .await
                .with_context(|| format!("Failed to write bundle to {}", path.display()))?;
            self.logger.info(&format!("Wrote {} bytes to {}", html.len(), path.display()));
        }

        let summary = ctx.summary();
        self.logger.info(&format!(
            "Bundled {} in {:?}: {} resources, {} failed",
            summary.entry,
            started.elapsed(),
            summary.resources.total,
            summary.resources.failed
        ));
        Ok(BundleOutput { html, summary })
    }

    async fn run_hooks(&self, stage: Stage, slot: Slot, ctx: &mut BuildContext) -> BundleResult<()> {
        for hook in self.hooks.get(stage, slot) {
            hook.run(ctx).await.map_err(|e| BundleError::Hook {
                stage,
                hook: hook.name().to_string(),
                message: format!("{e:#}"),
            })?;
        }
        Ok(())
    }

    /// Release the headless browser, if this bundler launched one
    pub async fn shutdown(&self) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.shutdown().await;
        }
    }
}
