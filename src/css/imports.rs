//! `@import` resolution
//!
//! Resolution runs in two phases. The fetch phase walks the import graph
//! breadth first from the root sheet, keeping a visited set keyed by
//! absolute locator, so every distinct target is fetched at most once and
//! the walk ends when no unvisited target is left. The assembly phase then
//! splices fetched sheets into their importers, tracking the chain of
//! ancestors so an import cycle is cut instead of expanded.
//!
//! Import targets are fetched as standalone resources: they are merged into
//! the importing text and never become entries of the shared cache.

use futures::future::join_all;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::cache::ResourceCache;
use crate::config::TransportOptions;
use crate::error::BundleResult;
use crate::locator::Locator;
use crate::logging::BuildLogger;
use crate::resource::{Resource, ResourceType};
use crate::transport::Transport;

use super::rebase::rebase;
use super::tokens::{ImportRule, scan_imports};

/// A fetched import target, rebased against its own base
#[derive(Debug)]
struct FetchedSheet {
    locator: Locator,
    text: String,
    imports: Vec<ImportRule>,
}

/// `None` marks a target whose fetch failed
type SheetGraph = HashMap<String, Option<FetchedSheet>>;

/// Transport plumbing shared by every import fetch of one build
pub struct ImportResolver<'a> {
    transport: &'a dyn Transport,
    options: Arc<TransportOptions>,
    logger: &'a dyn BuildLogger,
}

impl<'a> ImportResolver<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        options: Arc<TransportOptions>,
        logger: &'a dyn BuildLogger,
    ) -> Self {
        Self {
            transport,
            options,
            logger,
        }
    }

    /// Resolver using the transport and options of `cache`
    pub fn for_cache(cache: &'a ResourceCache, logger: &'a dyn BuildLogger) -> Self {
        Self::new(cache.transport().as_ref(), Arc::clone(cache.options()), logger)
    }

    /// Replace every `@import` in `css` with the text it imports
    ///
    /// `css` must already be rebased against `parent`, the locator of the
    /// sheet (or document) that holds it. A failed import is left as
    /// written; an import of a sheet already being expanded is dropped.
    pub async fn inline_imports(&self, css: &str, parent: &Locator) -> BundleResult<String> {
        let root_imports = scan_imports(css);
        if root_imports.is_empty() {
            return Ok(css.to_string());
        }

        let graph = self.fetch_graph(&root_imports, parent).await?;
        let mut ancestors = vec![parent.absolute().to_string()];
        assemble(css, &root_imports, parent, &graph, &mut ancestors)
    }

    async fn fetch_graph(&self, root_imports: &[ImportRule], parent: &Locator) -> BundleResult<SheetGraph> {
        let mut visited = HashSet::from([parent.absolute().to_string()]);
        let mut queue = VecDeque::new();
        enqueue(root_imports, parent, &mut visited, &mut queue)?;

        let mut graph = SheetGraph::new();
        while !queue.is_empty() {
            let level: Vec<Locator> = queue.drain(..).collect();
            let fetched = join_all(level.into_iter().map(|locator| self.fetch_sheet(locator))).await;

            for resource in fetched {
                let locator = resource.locator().clone();
                let absolute = locator.absolute().to_string();

                let Some(text) = resource.status().is_success().then(|| resource.text()).flatten() else {
                    self.logger.warn(&format!(
                        "Import {absolute} could not be fetched; keeping the @import rule"
                    ));
                    graph.insert(absolute, None);
                    continue;
                };

                let text = rebase(&text, &locator)?;
                let imports = scan_imports(&text);
                enqueue(&imports, &locator, &mut visited, &mut queue)?;
                graph.insert(
                    absolute,
                    Some(FetchedSheet {
                        locator,
                        text,
                        imports,
                    }),
                );
            }
        }
        Ok(graph)
    }

    async fn fetch_sheet(&self, locator: Locator) -> Resource {
        let mut resource = Resource::new(
            locator.raw().to_string(),
            locator,
            ResourceType::Css,
            Arc::clone(&self.options),
        );
        resource.fetch(self.transport).await;
        resource
    }
}

fn enqueue(
    imports: &[ImportRule],
    parent: &Locator,
    visited: &mut HashSet<String>,
    queue: &mut VecDeque<Locator>,
) -> BundleResult<()> {
    for rule in imports {
        let target = Locator::within(&rule.target, parent)?;
        if visited.insert(target.absolute().to_string()) {
            queue.push_back(target);
        }
    }
    Ok(())
}

fn assemble(
    text: &str,
    imports: &[ImportRule],
    parent: &Locator,
    graph: &SheetGraph,
    ancestors: &mut Vec<String>,
) -> BundleResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for rule in imports {
        let target = Locator::within(&rule.target, parent)?;
        let absolute = target.absolute();
        out.push_str(&text[cursor..rule.range.start]);

        if ancestors.iter().any(|a| a == absolute) {
            log::debug!("Dropping cyclic @import of {absolute}");
        } else if let Some(Some(sheet)) = graph.get(absolute) {
            ancestors.push(absolute.to_string());
            let body = assemble(&sheet.text, &sheet.imports, &sheet.locator, graph, ancestors)?;
            ancestors.pop();
            out.push_str(&wrap_conditions(&body, &rule.conditions));
        } else {
            out.push_str(&text[rule.range.clone()]);
        }

        cursor = rule.range.end;
    }

    out.push_str(&text[cursor..]);
    Ok(out)
}

/// Scope imported text to the import's media list
///
/// `layer(...)` and `supports(...)` conditions have no `@media` equivalent
/// and are dropped.
fn wrap_conditions(body: &str, conditions: &str) -> String {
    let media = conditions.trim();
    let lower = media.to_ascii_lowercase();
    if media.is_empty() || lower.starts_with("layer") || lower.starts_with("supports(") {
        if !media.is_empty() {
            log::debug!("Dropping unsupported @import condition '{media}'");
        }
        return body.to_string();
    }
    format!("@media {media} {{\n{body}\n}}")
}

/// Rebase every fetched CSS resource in `cache` and inline its imports
pub async fn inline_cache_stylesheets(cache: &ResourceCache, logger: &dyn BuildLogger) -> BundleResult<()> {
    let resolver = ImportResolver::for_cache(cache, logger);

    for handle in cache.subset_by_type(ResourceType::Css).handles() {
        let (text, locator) = {
            let resource = handle.lock();
            if !resource.status().is_success() {
                continue;
            }
            (resource.text(), resource.locator().clone())
        };
        let Some(text) = text else { continue };

        let rebased = rebase(&text, &locator)?;
        let inlined = resolver.inline_imports(&rebased, &locator).await?;
        if inlined != text {
            handle.update(Some(inlined.into_bytes()));
        }
    }
    Ok(())
}
