//! Built-in stage bodies

use std::sync::Arc;

use crate::css::{ImportResolver, inline_cache_stylesheets};
use crate::document::{
    document_locator, inline_resources, inline_stylesheet_links, parse_document,
    process_inline_styles, register_resources, register_stylesheets, serialize_document,
};
use crate::error::{BundleError, BundleResult};
use crate::plugins::{
    CommentStripper, DocumentPlugin, MarkupPlugin, ResourcePlugin, SelectorRemover,
    TrackingPixelRemover, TypeDropper,
};
use crate::resource::ResourceType;

use super::context::BuildContext;
use super::stage::Stage;

/// Stage whose body runs a phase's document collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentPhase {
    /// Before style sheets are inlined
    PreStyle,
    /// After style sheets are inlined
    PostStyle,
    /// After every reference is inlined
    Final,
}

impl DocumentPhase {
    #[must_use]
    pub fn stage(self) -> Stage {
        match self {
            DocumentPhase::PreStyle => Stage::PreStyleRemovals,
            DocumentPhase::PostStyle => Stage::PostStyleRemovals,
            DocumentPhase::Final => Stage::FinalInlineModifications,
        }
    }
}

/// Collaborators registered on a bundler, grouped by where they run
#[derive(Default)]
pub(crate) struct PluginTable {
    pub(crate) pre_style: Vec<Box<dyn DocumentPlugin>>,
    pub(crate) post_style: Vec<Box<dyn DocumentPlugin>>,
    pub(crate) final_document: Vec<Box<dyn DocumentPlugin>>,
    pub(crate) resources: Vec<Box<dyn ResourcePlugin>>,
    pub(crate) markup: Vec<Box<dyn MarkupPlugin>>,
}

impl PluginTable {
    pub(crate) fn add_document(&mut self, phase: DocumentPhase, plugin: Box<dyn DocumentPlugin>) {
        match phase {
            DocumentPhase::PreStyle => self.pre_style.push(plugin),
            DocumentPhase::PostStyle => self.post_style.push(plugin),
            DocumentPhase::Final => self.final_document.push(plugin),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pre_style.len()
            + self.post_style.len()
            + self.final_document.len()
            + self.resources.len()
            + self.markup.len()
    }
}

/// Run the built-in body of `stage`
pub(crate) async fn run_stage(stage: Stage, ctx: &mut BuildContext, plugins: &PluginTable) -> BundleResult<()> {
    match stage {
        Stage::InitialFetch => initial_fetch(ctx).await,
        Stage::DocumentCreation => document_creation(ctx),
        Stage::PreStyleRemovals => {
            let remover = SelectorRemover::new(ctx.config.removals().pre_style.clone());
            document_collaborators(ctx, stage, &remover, &plugins.pre_style)
        }
        Stage::StyleInlining => style_inlining(ctx).await,
        Stage::PostStyleRemovals => {
            let remover = SelectorRemover::new(ctx.config.removals().post_style.clone());
            document_collaborators(ctx, stage, &remover, &plugins.post_style)
        }
        Stage::ResourceDiscovery => resource_discovery(ctx),
        Stage::ResourceFetch => {
            let dispatched = ctx.cache.fetch_all_unfetched().await;
            ctx.logger.info(&format!("Fetched {dispatched} resources"));
            Ok(())
        }
        Stage::ResourceModifications => {
            resource_modifications(ctx, &plugins.resources);
            Ok(())
        }
        Stage::ResourceInlining => {
            let document = ctx.require_document(stage)?;
            let context = ctx.require_document_base(stage)?;
            inline_resources(&document, &context, &ctx.cache)?;
            Ok(())
        }
        Stage::FinalInlineModifications => {
            if ctx.config.strip_comments() {
                apply_document_plugin(ctx, stage, &CommentStripper)?;
            }
            for plugin in &plugins.final_document {
                apply_document_plugin(ctx, stage, plugin.as_ref())?;
            }
            Ok(())
        }
        Stage::FinalDocumentCreation => {
            let document = ctx.require_document(stage)?;
            ctx.final_markup = Some(serialize_document(&document)?);
            Ok(())
        }
        Stage::FinalMarkupCreation => final_markup_creation(ctx, &plugins.markup),
    }
}

async fn initial_fetch(ctx: &mut BuildContext) -> BundleResult<()> {
    let handle = ctx.cache.register(&ctx.entry_reference, ResourceType::Html)?;
    let transport = Arc::clone(ctx.cache.transport());
    handle.fetch(transport.as_ref()).await;

    let (locator, markup, status, status_code) = {
        let resource = handle.lock();
        (
            resource.locator().clone(),
            resource.text(),
            resource.status(),
            resource.status_code(),
        )
    };
    if !status.is_success() {
        return Err(BundleError::EntryFetch {
            url: locator.absolute().to_string(),
            status_code: status_code.unwrap_or_default(),
        });
    }

    ctx.logger.info(&format!("Fetched entry page {}", locator.absolute()));
    ctx.entry = Some(locator);
    ctx.entry_markup = Some(markup.unwrap_or_default());
    Ok(())
}

fn document_creation(ctx: &mut BuildContext) -> BundleResult<()> {
    let stage = Stage::DocumentCreation;
    let document = parse_document(ctx.require_entry_markup(stage)?);
    let base = document_locator(&document, ctx.require_entry(stage)?)?;
    ctx.document = Some(document);
    ctx.document_base = Some(base);
    Ok(())
}

async fn style_inlining(ctx: &mut BuildContext) -> BundleResult<()> {
    let stage = Stage::StyleInlining;
    let document = ctx.require_document(stage)?;
    let context = ctx.require_document_base(stage)?;

    {
        let resolver = ImportResolver::for_cache(&ctx.cache, ctx.logger.as_ref());
        process_inline_styles(&document, &context, &resolver).await?;
    }

    let linked = register_stylesheets(&document, &context, &mut ctx.cache)?;
    if linked == 0 {
        return Ok(());
    }
    ctx.cache.fetch_subset_unfetched(ResourceType::Css).await;
    inline_cache_stylesheets(&ctx.cache, ctx.logger.as_ref()).await?;
    let replaced = inline_stylesheet_links(&document, &context, &ctx.cache)?;
    ctx.logger.info(&format!("Inlined {replaced} style sheets"));
    Ok(())
}

fn resource_discovery(ctx: &mut BuildContext) -> BundleResult<()> {
    let stage = Stage::ResourceDiscovery;
    let document = ctx.require_document(stage)?;
    let context = ctx.require_document_base(stage)?;
    let seen = register_resources(&document, &context, &mut ctx.cache)?;
    ctx.logger
        .debug(&format!("Discovered {seen} references, {} cache entries", ctx.cache.len()));
    Ok(())
}

fn document_collaborators(
    ctx: &BuildContext,
    stage: Stage,
    remover: &SelectorRemover,
    plugins: &[Box<dyn DocumentPlugin>],
) -> BundleResult<()> {
    if !remover.is_empty() {
        apply_document_plugin(ctx, stage, remover)?;
    }
    for plugin in plugins {
        apply_document_plugin(ctx, stage, plugin.as_ref())?;
    }
    Ok(())
}

/// A failing collaborator is reported and skipped
fn apply_document_plugin(ctx: &BuildContext, stage: Stage, plugin: &dyn DocumentPlugin) -> BundleResult<()> {
    let document = ctx.require_document(stage)?;
    if let Err(e) = plugin.apply(&document) {
        ctx.logger
            .warn(&format!("Collaborator '{}' failed during {stage}: {e:#}", plugin.name()));
    }
    Ok(())
}

fn resource_modifications(ctx: &BuildContext, plugins: &[Box<dyn ResourcePlugin>]) {
    let mut builtin: Vec<Box<dyn ResourcePlugin>> = Vec::new();
    if ctx.config.remove_tracking_pixels() {
        builtin.push(Box::new(TrackingPixelRemover));
    }
    let dropper = TypeDropper::new(ctx.config.removals().drop_types.iter().copied());
    if !dropper.is_empty() {
        builtin.push(Box::new(dropper));
    }

    for plugin in builtin.iter().chain(plugins) {
        if let Err(e) = plugin.apply(&ctx.cache) {
            ctx.logger.warn(&format!(
                "Collaborator '{}' failed during {}: {e:#}",
                plugin.name(),
                Stage::ResourceModifications
            ));
        }
    }
}

fn final_markup_creation(ctx: &mut BuildContext, plugins: &[Box<dyn MarkupPlugin>]) -> BundleResult<()> {
    let stage = Stage::FinalMarkupCreation;
    let mut markup = ctx.require_final_markup(stage)?;
    for plugin in plugins {
        match plugin.apply(&markup) {
            Ok(rewritten) => markup = rewritten,
            Err(e) => ctx
                .logger
                .warn(&format!("Collaborator '{}' failed during {stage}: {e:#}", plugin.name())),
        }
    }
    ctx.final_markup = Some(markup);
    Ok(())
}
