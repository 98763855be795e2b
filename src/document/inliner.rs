//! Reference inlining
//!
//! Replaces the references registered by discovery with the content the
//! cache holds for them. Every lookup goes through the cache, so a reference
//! that was never registered is left exactly as written.

use kuchiki::NodeRef;

use crate::cache::ResourceCache;
use crate::css::{CssUrl, ImportResolver, rebase, rewrite_urls};
use crate::error::BundleResult;
use crate::locator::Locator;
use crate::resource::{ResourceHandle, ResourceType};

use super::discovery::{
    REFERENCE_SELECTORS, SRCSET_SELECTORS, STYLESHEET_SELECTOR, first_srcset_candidate,
};
use super::{
    attribute, create_element, is_inert_reference, remove_attribute, select_all, set_attribute,
    set_text,
};

/// Attributes that pin the original bytes or origin of a reference
const INTEGRITY_ATTRIBUTES: &[&str] = &["integrity", "crossorigin"];

/// Rebase `<style>` blocks and `style` attributes, and inline the imports
/// of each block
pub async fn process_inline_styles(
    document: &NodeRef,
    context: &Locator,
    resolver: &ImportResolver<'_>,
) -> BundleResult<()> {
    for style in select_all(document, "style")? {
        let node = style.as_node();
        let css = node.text_contents();
        let rebased = rebase(&css, context)?;
        let inlined = resolver.inline_imports(&rebased, context).await?;
        if inlined != css {
            set_text(node, &inlined);
        }
    }

    for element in select_all(document, "[style]")? {
        let Some(css) = attribute(&element, "style") else { continue };
        let rebased = rebase(&css, context)?;
        if rebased != css {
            set_attribute(&element, "style", rebased);
        }
    }
    Ok(())
}

/// Replace every linked style sheet with a `<style>` holding its text
///
/// The `media` attribute carries over. A sheet that failed to fetch leaves
/// an empty `<style>`. Returns the number of links replaced.
pub fn inline_stylesheet_links(
    document: &NodeRef,
    context: &Locator,
    cache: &ResourceCache,
) -> BundleResult<usize> {
    let mut replaced = 0;

    for link in select_all(document, STYLESHEET_SELECTOR)? {
        let Some(href) = attribute(&link, "href") else { continue };
        if is_inert_reference(&href) {
            continue;
        }
        let Some(handle) = cache.lookup(&href, context) else { continue };

        let css = success_text(&handle).unwrap_or_default();
        let style = create_element("style")?;
        if let Some(media) = attribute(&link, "media")
            && let Some(element) = style.as_element()
        {
            element.attributes.borrow_mut().insert("media", media);
        }
        set_text(&style, &css);

        link.as_node().insert_before(style);
        link.as_node().detach();
        replaced += 1;
    }

    log::debug!("Replaced {replaced} style sheet links");
    Ok(replaced)
}

/// Swap every registered reference for its data URI or inline text
///
/// Returns the number of references replaced.
pub fn inline_resources(
    document: &NodeRef,
    context: &Locator,
    cache: &ResourceCache,
) -> BundleResult<usize> {
    let mut replaced = 0;

    for entry in REFERENCE_SELECTORS {
        for element in select_all(document, entry.selector)? {
            let Some(value) = attribute(&element, entry.attribute) else { continue };
            if is_inert_reference(&value) {
                continue;
            }
            let Some(handle) = cache.lookup(&value, context) else { continue };

            if entry.resource_type == ResourceType::Script {
                remove_attribute(&element, "src");
                set_text(element.as_node(), &success_text(&handle).unwrap_or_default());
            } else {
                set_attribute(&element, entry.attribute, handle.to_base64());
            }
            for name in INTEGRITY_ATTRIBUTES {
                remove_attribute(&element, name);
            }
            replaced += 1;
        }
    }

    for selector in SRCSET_SELECTORS {
        for element in select_all(document, selector)? {
            let Some(srcset) = attribute(&element, "srcset") else { continue };
            let Some((url, descriptor)) = first_srcset_candidate(&srcset) else { continue };
            if is_inert_reference(url) {
                continue;
            }
            let Some(handle) = cache.lookup(url, context) else { continue };

            let data = handle.to_base64();
            if data.is_empty() {
                remove_attribute(&element, "srcset");
            } else {
                set_attribute(&element, "srcset", format!("{data} {descriptor}").trim_end().to_string());
            }
            replaced += 1;
        }
    }

    for style in select_all(document, "style")? {
        let node = style.as_node();
        let css = node.text_contents();
        let embedded = embed_urls(&css, context, cache)?;
        if embedded != css {
            set_text(node, &embedded);
            replaced += 1;
        }
    }

    for element in select_all(document, "[style]")? {
        let Some(css) = attribute(&element, "style") else { continue };
        let embedded = embed_urls(&css, context, cache)?;
        if embedded != css {
            set_attribute(&element, "style", embedded);
            replaced += 1;
        }
    }

    log::debug!("Inlined {replaced} references");
    Ok(replaced)
}

fn success_text(handle: &ResourceHandle) -> Option<String> {
    let resource = handle.lock();
    if resource.status().is_success() {
        resource.text()
    } else {
        None
    }
}

/// Replace each cached `url()` in `css` with its data URI
fn embed_urls(css: &str, context: &Locator, cache: &ResourceCache) -> BundleResult<String> {
    rewrite_urls(css, |url: &CssUrl| {
        if url.is_import || url.is_local() {
            return Ok(None);
        }
        Ok(cache.lookup(&url.value, context).map(|handle| handle.to_base64()))
    })
}
