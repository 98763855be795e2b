//! Reference discovery
//!
//! Walks the document and registers every external reference in the
//! resource cache, typed by the element that holds it. Discovery never
//! fetches; the pipeline fetches registered entries in a later stage.

use kuchiki::NodeRef;

use crate::cache::ResourceCache;
use crate::css::collect_urls;
use crate::error::BundleResult;
use crate::locator::Locator;
use crate::resource::ResourceType;

use super::{attribute, is_inert_reference, select_all};

/// Element/attribute pair that holds one external reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSelector {
    pub selector: &'static str,
    pub attribute: &'static str,
    pub resource_type: ResourceType,
}

const fn reference(
    selector: &'static str,
    attribute: &'static str,
    resource_type: ResourceType,
) -> ReferenceSelector {
    ReferenceSelector {
        selector,
        attribute,
        resource_type,
    }
}

pub(crate) const STYLESHEET_SELECTOR: &str = r#"link[rel~="stylesheet"][href]"#;

/// Single-locator references, in discovery order
pub const REFERENCE_SELECTORS: &[ReferenceSelector] = &[
    reference("script[src]", "src", ResourceType::Script),
    reference("img[src]", "src", ResourceType::Image),
    reference(r#"input[type="image"][src]"#, "src", ResourceType::Image),
    reference("video[poster]", "poster", ResourceType::Image),
    reference("audio[src]", "src", ResourceType::Audio),
    reference("audio source[src]", "src", ResourceType::Audio),
    reference("video[src]", "src", ResourceType::Video),
    reference("video source[src]", "src", ResourceType::Video),
    reference("track[src]", "src", ResourceType::Other),
    reference(r#"link[rel~="icon"][href]"#, "href", ResourceType::Favicon),
    reference(r#"link[rel~="apple-touch-icon"][href]"#, "href", ResourceType::Favicon),
    reference(r#"link[rel~="preload"][as="font"][href]"#, "href", ResourceType::Font),
    reference(r#"link[rel~="preload"][as="image"][href]"#, "href", ResourceType::Image),
];

/// Elements whose `srcset` contributes its first candidate
pub(crate) const SRCSET_SELECTORS: &[&str] = &["img[srcset]", "picture source[srcset]"];

/// First candidate of a `srcset` list: its locator and descriptor
pub(crate) fn first_srcset_candidate(srcset: &str) -> Option<(&str, &str)> {
    let candidate = srcset.split(',').map(str::trim).find(|c| !c.is_empty())?;
    let (url, descriptor) = match candidate.split_once(char::is_whitespace) {
        Some((url, descriptor)) => (url, descriptor.trim()),
        None => (candidate, ""),
    };
    Some((url, descriptor))
}

/// Register every `<link rel="stylesheet">` as a css resource
///
/// Returns the number of links seen.
pub fn register_stylesheets(
    document: &NodeRef,
    context: &Locator,
    cache: &mut ResourceCache,
) -> BundleResult<usize> {
    let mut seen = 0;
    for link in select_all(document, STYLESHEET_SELECTOR)? {
        let Some(href) = attribute(&link, "href") else { continue };
        if is_inert_reference(&href) {
            continue;
        }
        cache.register_within(&href, context, ResourceType::Css)?;
        seen += 1;
    }
    log::debug!("Registered {seen} linked style sheets");
    Ok(seen)
}

/// Register every non-stylesheet reference in the document
///
/// Covers [`REFERENCE_SELECTORS`], the first `srcset` candidate of images
/// and picture sources, and `url()` locators in `<style>` blocks and
/// `style` attributes. Returns the number of references seen.
pub fn register_resources(
    document: &NodeRef,
    context: &Locator,
    cache: &mut ResourceCache,
) -> BundleResult<usize> {
    let mut seen = 0;

    for entry in REFERENCE_SELECTORS {
        for element in select_all(document, entry.selector)? {
            let Some(value) = attribute(&element, entry.attribute) else { continue };
            if is_inert_reference(&value) {
                continue;
            }
            cache.register_within(&value, context, entry.resource_type)?;
            seen += 1;
        }
    }

    for selector in SRCSET_SELECTORS {
        for element in select_all(document, selector)? {
            let Some(srcset) = attribute(&element, "srcset") else { continue };
            let Some((url, _)) = first_srcset_candidate(&srcset) else { continue };
            if is_inert_reference(url) {
                continue;
            }
            cache.register_within(url, context, ResourceType::Image)?;
            seen += 1;
        }
    }

    for style in select_all(document, "style")? {
        let css = style.as_node().text_contents();
        for (locator, resource_type) in collect_urls(&css, context) {
            cache.register_locator(locator, resource_type);
            seen += 1;
        }
    }

    for element in select_all(document, "[style]")? {
        let Some(css) = attribute(&element, "style") else { continue };
        for (locator, resource_type) in collect_urls(&css, context) {
            cache.register_locator(locator, resource_type);
            seen += 1;
        }
    }

    log::debug!("Registered {seen} document references, {} cache entries", cache.len());
    Ok(seen)
}
