//! Locator rewriting inside style sheets

use crate::error::BundleResult;
use crate::locator::Locator;
use crate::resource::ResourceType;

use super::tokens::{CssUrl, scan_urls};

/// Rewrite embedded locators through `replace`
///
/// `replace` returns the new locator for a token, or `None` to leave the
/// token as written. Text outside replaced tokens is copied unchanged.
pub fn rewrite_urls<F>(css: &str, mut replace: F) -> BundleResult<String>
where
    F: FnMut(&CssUrl) -> BundleResult<Option<String>>,
{
    let urls = scan_urls(css);
    if urls.is_empty() {
        return Ok(css.to_string());
    }

    let mut out = String::with_capacity(css.len());
    let mut cursor = 0;
    for url in &urls {
        if let Some(locator) = replace(url)? {
            out.push_str(&css[cursor..url.range.start]);
            out.push_str(&url.render(&locator));
            cursor = url.range.end;
        }
    }
    out.push_str(&css[cursor..]);
    Ok(out)
}

/// Rewrite every embedded locator to its absolute form
///
/// `parent` is the locator of the style sheet (or of the document holding
/// an inline style); its base and protocol drive resolution. Data URIs and
/// fragment-only references are left alone.
pub fn rebase(css: &str, parent: &Locator) -> BundleResult<String> {
    rewrite_urls(css, |url| {
        if url.is_local() {
            return Ok(None);
        }
        let locator = Locator::within(&url.value, parent)?;
        if locator.absolute() == url.value {
            return Ok(None);
        }
        Ok(Some(locator.absolute().to_string()))
    })
}

/// Every resource an already rebased style sheet references, with the type
/// implied by its context
///
/// `@import` targets are not included; imports are merged into the text
/// rather than tracked as resources.
pub fn collect_urls(css: &str, parent: &Locator) -> Vec<(Locator, ResourceType)> {
    scan_urls(css)
        .into_iter()
        .filter(|url| !url.is_import && !url.is_local())
        .filter_map(|url| {
            let resource_type = url.resource_type();
            match Locator::within(&url.value, parent) {
                Ok(locator) => Some((locator, resource_type)),
                Err(e) => {
                    log::debug!("Skipping unresolvable style locator '{}': {e}", url.value);
                    None
                }
            }
        })
        .collect()
}
