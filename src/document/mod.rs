//! HTML document handling on top of `kuchiki`
//!
//! The document is parsed once per build and mutated in place by every
//! stage. [`discovery`] registers what the page references, [`inliner`]
//! swaps those references for embedded content.

pub mod discovery;
pub mod inliner;

use anyhow::Context;
use kuchiki::traits::TendrilSink;
use kuchiki::{ElementData, NodeDataRef, NodeRef};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{BundleError, BundleResult};
use crate::locator::Locator;

pub use discovery::{ReferenceSelector, register_resources, register_stylesheets};
pub use inliner::{inline_resources, inline_stylesheet_links, process_inline_styles};

lazy_static! {
    static ref RAW_TEXT_CLOSE: Regex =
        Regex::new(r"(?i)</(style|script)").expect("BUG: hardcoded raw text regex is invalid");
    static ref FOREIGN_SCHEME: Regex =
        Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]+):").expect("BUG: hardcoded scheme regex is invalid");
}

/// Parse markup into a mutable document tree
#[must_use]
pub fn parse_document(markup: &str) -> NodeRef {
    kuchiki::parse_html().one(markup)
}

/// Serialize the document tree back to markup
pub fn serialize_document(document: &NodeRef) -> BundleResult<String> {
    let mut buf = Vec::new();
    document
        .serialize(&mut buf)
        .context("Failed to serialize document")?;
    String::from_utf8(buf)
        .map_err(|e| BundleError::Document(format!("serialized document is not UTF-8: {e}")))
}

/// Every element matching `selector`, collected before any mutation
pub fn select_all(document: &NodeRef, selector: &str) -> BundleResult<Vec<NodeDataRef<ElementData>>> {
    Ok(document
        .select(selector)
        .map_err(|()| BundleError::Document(format!("invalid selector '{selector}'")))?
        .collect())
}

/// Locator that references inside `document` resolve against
///
/// Without a `<base href>` this is the entry locator. A base ending in a
/// separator names a directory; any other base resolves next to itself.
pub fn document_locator(document: &NodeRef, entry: &Locator) -> BundleResult<Locator> {
    let Ok(base) = document.select_first("base[href]") else {
        return Ok(entry.clone());
    };
    let href = base
        .attributes
        .borrow()
        .get("href")
        .map(|href| href.trim().to_string())
        .unwrap_or_default();
    if href.is_empty() {
        return Ok(entry.clone());
    }

    let resolved = Locator::within(&href, entry)?;
    log::debug!("Document base set to {} by <base href>", resolved.absolute());
    if href.ends_with('/') || href.ends_with('\\') {
        Ok(resolved.as_directory())
    } else {
        Ok(resolved)
    }
}

/// Attribute value, trimmed, if present and non-empty
pub(crate) fn attribute(element: &NodeDataRef<ElementData>, name: &str) -> Option<String> {
    element
        .attributes
        .borrow()
        .get(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(crate) fn set_attribute(element: &NodeDataRef<ElementData>, name: &str, value: String) {
    element.attributes.borrow_mut().insert(name, value);
}

pub(crate) fn remove_attribute(element: &NodeDataRef<ElementData>, name: &str) {
    element.attributes.borrow_mut().remove(name);
}

/// Replace every child of `node` with a single text node
pub(crate) fn set_text(node: &NodeRef, text: &str) {
    let children: Vec<NodeRef> = node.children().collect();
    for child in children {
        child.detach();
    }
    if !text.is_empty() {
        node.append(NodeRef::new_text(escape_raw_text(text)));
    }
}

/// Create a detached element with no attributes or children
pub(crate) fn create_element(tag: &str) -> BundleResult<NodeRef> {
    let fragment = kuchiki::parse_html().one(format!("<{tag}></{tag}>"));
    let element = fragment
        .select_first(tag)
        .map_err(|()| BundleError::Document(format!("could not create <{tag}> element")))?;
    let node = element.as_node().clone();
    node.detach();
    Ok(node)
}

/// Keep embedded text from closing its `<style>` or `<script>` element early
pub(crate) fn escape_raw_text(text: &str) -> String {
    RAW_TEXT_CLOSE.replace_all(text, "<\\/$1").into_owned()
}

/// True for attribute values that never name a fetchable resource:
/// fragments, data URIs and schemes such as `javascript:` or `mailto:`
pub(crate) fn is_inert_reference(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') {
        return true;
    }
    FOREIGN_SCHEME.captures(value).is_some_and(|caps| {
        let scheme = caps[1].to_ascii_lowercase();
        !matches!(scheme.as_str(), "http" | "https" | "file")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_keeps_structure() {
        let doc = parse_document("<html><head><title>t</title></head><body><p id=a>x</p></body></html>");
        let html = serialize_document(&doc).unwrap();
        assert!(html.contains("<title>t</title>"));
        assert!(html.contains(r#"<p id="a">x</p>"#));
    }

    #[test]
    fn test_document_locator_without_base_is_entry() {
        let entry = Locator::entry("https://example.com/a/index.html").unwrap();
        let doc = parse_document("<p>x</p>");
        let located = document_locator(&doc, &entry).unwrap();
        assert_eq!(located, entry);
    }

    #[test]
    fn test_base_href_directory() {
        let entry = Locator::entry("https://example.com/a/index.html").unwrap();
        let doc = parse_document(r#"<head><base href="https://cdn.test/static/"></head>"#);
        let located = document_locator(&doc, &entry).unwrap();

        let child = Locator::within("app.css", &located).unwrap();
        assert_eq!(child.absolute(), "https://cdn.test/static/app.css");
    }

    #[test]
    fn test_base_href_relative_to_entry() {
        let entry = Locator::entry("https://example.com/a/index.html").unwrap();
        let doc = parse_document(r#"<head><base href="../b/page.html"></head>"#);
        let located = document_locator(&doc, &entry).unwrap();

        let child = Locator::within("x.png", &located).unwrap();
        assert_eq!(child.absolute(), "https://example.com/b/x.png");
    }

    #[test]
    fn test_set_text_escapes_closing_tags() {
        let doc = parse_document("<style>old</style>");
        let style = doc.select_first("style").unwrap();
        set_text(style.as_node(), "a::after{content:'</style>'}");

        let html = serialize_document(&doc).unwrap();
        assert!(html.contains(r"<style>a::after{content:'<\/style>'}</style>"));
    }

    #[test]
    fn test_create_element_is_detached() {
        let node = create_element("style").unwrap();
        assert!(node.parent().is_none());
        assert_eq!(&*node.as_element().unwrap().name.local, "style");
    }

    #[test]
    fn test_inert_references() {
        assert!(is_inert_reference(""));
        assert!(is_inert_reference("#top"));
        assert!(is_inert_reference("data:image/gif;base64,R0lG"));
        assert!(is_inert_reference("javascript:void(0)"));
        assert!(is_inert_reference("mailto:a@b.c"));
        assert!(!is_inert_reference("img/a.png"));
        assert!(!is_inert_reference("https://cdn.test/a.png"));
        assert!(!is_inert_reference("C:\\site\\a.png"));
        assert!(!is_inert_reference("//cdn.test/a.png"));
    }
}
