//! Locator resolution
//!
//! Turns the reference strings found in markup and style sheets into
//! canonical absolute locators. Every resource in a build is keyed by the
//! absolute form produced here, so two spellings of the same target
//! (`p.png`, `./p.png`, `/site/p.png`) collapse to one cache entry.
//!
//! `file` locators are plain filesystem paths (a `file://` reference is
//! converted on the way in); `http`/`https` locators are serialized URLs;
//! `data` locators are carried verbatim.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};
use url::Url;

use crate::error::{BundleError, BundleResult};

lazy_static! {
    // These patterns are hardcoded and syntactically valid.
    // If they fail to compile, it indicates a compile-time bug in the pattern strings.
    static ref SCHEME_PREFIX: Regex = Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*)://")
        .expect("BUG: hardcoded scheme pattern is invalid - this is a compile-time bug");

    static ref SINGLE_SLASH_SCHEME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]+:/[^/]")
        .expect("BUG: hardcoded single-slash scheme pattern is invalid - this is a compile-time bug");
}

/// Transport protocol of a locator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    File,
    Http,
    Https,
    Data,
    /// Any other scheme; the dispatcher fails these with 404
    Unsupported(String),
}

impl Protocol {
    /// Map a URL scheme to a protocol (case-insensitive)
    #[must_use]
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme.to_ascii_lowercase().as_str() {
            "file" => Self::File,
            "http" => Self::Http,
            "https" => Self::Https,
            "data" => Self::Data,
            other => Self::Unsupported(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::File => "file",
            Self::Http => "http",
            Self::Https => "https",
            Self::Data => "data",
            Self::Unsupported(scheme) => scheme,
        }
    }

    #[must_use]
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn starts_with_data(reference: &str) -> bool {
    reference
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
}

/// True when the reference carries its own protocol (`scheme://` or `data:`)
#[must_use]
pub fn has_protocol(reference: &str) -> bool {
    SCHEME_PREFIX.is_match(reference) || starts_with_data(reference)
}

/// Detect the protocol of a reference
///
/// A reference starting with `scheme://` or `data:` names its own protocol;
/// anything else inherits the protocol of the document that referenced it.
#[must_use]
pub fn detect_protocol(reference: &str, inherited: &Protocol) -> Protocol {
    if let Some(captures) = SCHEME_PREFIX.captures(reference) {
        return Protocol::from_scheme(&captures[1]);
    }
    if starts_with_data(reference) {
        return Protocol::Data;
    }
    inherited.clone()
}

/// Repair two malformed reference patterns produced by legacy authoring tools
///
/// - `\\host/path` becomes `//host/path`
/// - `http:/path` (exactly one slash after the colon) loses its scheme and
///   becomes `/path`; it is not "corrected" into `http://path`.
#[must_use]
pub fn correct(reference: &str) -> String {
    let trimmed = reference.trim();

    if let Some(rest) = trimmed.strip_prefix("\\\\") {
        return format!("//{rest}");
    }

    if !starts_with_data(trimmed)
        && SINGLE_SLASH_SCHEME.is_match(trimmed)
        && let Some(colon) = trimmed.find(':')
    {
        return trimmed[colon + 1..].to_string();
    }

    trimmed.to_string()
}

/// Resolve a reference to an absolute locator
///
/// References that already carry a protocol are returned unchanged, as are
/// local paths that exist on disk when resolving under `file` (absolute
/// paths, or any path while no base has been established yet).
///
/// Otherwise resolution dispatches on `protocol`: `file` joins the base
/// directory (the working directory when there is no base), `http`/`https`
/// perform RFC 3986 resolution against the base, and `data` is
/// self-contained.
pub fn resolve_absolute(
    reference: &str,
    protocol: &Protocol,
    base: Option<&str>,
) -> BundleResult<String> {
    if has_protocol(reference) {
        return Ok(reference.to_string());
    }

    match protocol {
        Protocol::File => {
            let path = Path::new(reference);
            if path.is_absolute() && path.exists() {
                return Ok(normalize_path(path).to_string_lossy().into_owned());
            }
            if base.is_none() && path.exists() {
                return Ok(reference.to_string());
            }

            let dir = match base {
                Some(base) => PathBuf::from(base),
                None => std::env::current_dir()
                    .map_err(|e| BundleError::locator(reference, e))?,
            };
            let joined = dir.join(strip_query_and_fragment(reference));
            Ok(normalize_path(&joined).to_string_lossy().into_owned())
        }
        Protocol::Http | Protocol::Https => {
            let base = base.ok_or_else(|| {
                BundleError::locator(reference, "no base locator to resolve against")
            })?;
            let base_url = Url::parse(base)
                .map_err(|e| BundleError::locator(base, format!("invalid base URL: {e}")))?;
            let resolved = base_url
                .join(reference)
                .map_err(|e| BundleError::locator(reference, e))?;
            Ok(resolved.to_string())
        }
        Protocol::Data | Protocol::Unsupported(_) => Ok(reference.to_string()),
    }
}

/// Base used to resolve references found inside the resource at `absolute`
///
/// `file` yields the parent directory with a trailing separator;
/// `http`/`https` yield the origin plus the path without its final segment
/// and with a trailing slash. Self-contained protocols have no base.
#[must_use]
pub fn base_of(absolute: &str, protocol: &Protocol) -> Option<String> {
    match protocol {
        Protocol::File => {
            let path = std::path::absolute(absolute).unwrap_or_else(|_| PathBuf::from(absolute));
            path.parent().map(|parent| {
                let mut dir = parent.to_string_lossy().into_owned();
                if !dir.ends_with(MAIN_SEPARATOR) {
                    dir.push(MAIN_SEPARATOR);
                }
                dir
            })
        }
        Protocol::Http | Protocol::Https => Url::parse(absolute)
            .ok()
            .and_then(|url| url.join("./").ok())
            .map(|url| url.to_string()),
        Protocol::Data | Protocol::Unsupported(_) => None,
    }
}

fn strip_query_and_fragment(reference: &str) -> &str {
    reference
        .find(['?', '#'])
        .map_or(reference, |idx| &reference[..idx])
}

/// Lexically collapse `.` and `..` components without touching the filesystem
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// A reference together with its resolved absolute form, protocol and base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    raw: String,
    absolute: String,
    protocol: Protocol,
    base: Option<String>,
}

impl Locator {
    /// Resolve the entry locator of a build
    ///
    /// There is no base yet, so scheme-less references are treated as local
    /// paths relative to the working directory.
    pub fn entry(reference: &str) -> BundleResult<Self> {
        Self::resolve(reference, &Protocol::File, None)
    }

    /// Resolve a reference found inside the resource described by `parent`
    pub fn within(reference: &str, parent: &Locator) -> BundleResult<Self> {
        Self::resolve(reference, &parent.protocol, parent.base.as_deref())
    }

    /// Resolve a reference against an explicit protocol/base context
    pub fn resolve(reference: &str, inherited: &Protocol, base: Option<&str>) -> BundleResult<Self> {
        if reference.trim().is_empty() {
            return Err(BundleError::locator(reference, "empty reference"));
        }

        let mut corrected = correct(reference);

        // A protocol-relative reference has no meaning inside a local document
        if corrected.starts_with("//") && *inherited == Protocol::File {
            corrected = format!("https:{corrected}");
        }

        let protocol = detect_protocol(&corrected, inherited);
        let mut absolute = resolve_absolute(&corrected, &protocol, base)?;
        let mut protocol = detect_protocol(&absolute, &protocol);

        if protocol == Protocol::File && SCHEME_PREFIX.is_match(&absolute) {
            let path = Url::parse(&absolute)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| BundleError::locator(reference, "invalid file URL"))?;
            absolute = normalize_path(&path).to_string_lossy().into_owned();
            protocol = Protocol::File;
        }

        let base = base_of(&absolute, &protocol);

        Ok(Self {
            raw: reference.to_string(),
            absolute,
            protocol,
            base,
        })
    }

    /// Replace the base used for nested references (e.g. `<base href>`)
    #[must_use]
    pub fn with_base(mut self, base: Option<String>) -> Self {
        self.base = base;
        self
    }

    /// Treat this locator as a directory, so nested references resolve
    /// inside it rather than next to it
    #[must_use]
    pub fn as_directory(mut self) -> Self {
        let separator = match self.protocol {
            Protocol::File => MAIN_SEPARATOR,
            Protocol::Http | Protocol::Https => '/',
            Protocol::Data | Protocol::Unsupported(_) => return self,
        };
        let mut dir = self.absolute.clone();
        if !dir.ends_with(separator) {
            dir.push(separator);
        }
        self.base = Some(dir);
        self
    }

    /// The reference exactly as it was first seen
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn absolute(&self) -> &str {
        &self.absolute
    }

    #[must_use]
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    #[must_use]
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Lower-cased file extension of the final path segment, if any
    #[must_use]
    pub fn suffix(&self) -> Option<String> {
        let path = match self.protocol {
            Protocol::Http | Protocol::Https => Url::parse(&self.absolute)
                .ok()
                .map(|url| url.path().to_string())?,
            Protocol::File => self.absolute.clone(),
            Protocol::Data | Protocol::Unsupported(_) => return None,
        };

        Path::new(&path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.absolute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_reference_against_http_base() {
        let result = resolve_absolute("test.html", &Protocol::Http, Some("http://base.test")).unwrap();
        assert_eq!(result, "http://base.test/test.html");
    }

    #[test]
    fn test_parent_segments_resolve_against_http_base() {
        let parent = Locator::entry("https://example.com/path/page.html").unwrap();
        let child = Locator::within("../styles/main.css", &parent).unwrap();

        assert_eq!(child.absolute(), "https://example.com/styles/main.css");
        assert_eq!(child.protocol(), &Protocol::Https);
        assert_eq!(child.base(), Some("https://example.com/styles/"));
    }

    #[test]
    fn test_detect_protocol_inherits_without_scheme() {
        assert_eq!(detect_protocol("img/a.png", &Protocol::Https), Protocol::Https);
        assert_eq!(detect_protocol("HTTP://x.test/a", &Protocol::File), Protocol::Http);
        assert_eq!(detect_protocol("data:text/plain,hi", &Protocol::Http), Protocol::Data);
        assert_eq!(
            detect_protocol("ftp://x.test/a", &Protocol::Http),
            Protocol::Unsupported("ftp".to_string())
        );
    }

    #[test]
    fn test_correct_backslash_prefix() {
        assert_eq!(correct(r"\\cdn.test/lib.js"), "//cdn.test/lib.js");
    }

    #[test]
    fn test_correct_strips_single_slash_scheme() {
        assert_eq!(correct("http:/images/a.png"), "/images/a.png");
        assert_eq!(correct("http://images/a.png"), "http://images/a.png");
        assert_eq!(correct("data:image/png;base64,AAAA"), "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_single_slash_scheme_resolves_against_origin() {
        let parent = Locator::entry("https://example.com/deep/page.html").unwrap();
        let child = Locator::within("http:/images/a.png", &parent).unwrap();
        assert_eq!(child.absolute(), "https://example.com/images/a.png");
    }

    #[test]
    fn test_protocol_relative_inside_local_document() {
        let parent = Locator::resolve("/site/index.html", &Protocol::File, Some("/site/")).unwrap();
        let child = Locator::within("//cdn.test/lib.js", &parent).unwrap();
        assert_eq!(child.absolute(), "https://cdn.test/lib.js");
        assert_eq!(child.protocol(), &Protocol::Https);
    }

    #[test]
    fn test_http_base_drops_final_segment_and_query() {
        assert_eq!(
            base_of("https://example.com/a/b/c.css?v=1", &Protocol::Https).as_deref(),
            Some("https://example.com/a/b/")
        );
        assert_eq!(
            base_of("http://base.test", &Protocol::Http).as_deref(),
            Some("http://base.test/")
        );
        assert_eq!(base_of("data:text/css,a{}", &Protocol::Data), None);
    }

    #[test]
    fn test_file_base_has_trailing_separator() {
        let base = base_of("/srv/site/css/main.css", &Protocol::File).unwrap();
        assert!(base.ends_with(MAIN_SEPARATOR));
        assert!(base.ends_with(&format!("css{MAIN_SEPARATOR}")));
    }

    #[test]
    fn test_file_references_collapse_dot_segments() {
        let parent = Locator::resolve("/srv/site/index.html", &Protocol::File, Some("/srv/site/")).unwrap();
        let a = Locator::within("img/p.png", &parent).unwrap();
        let b = Locator::within("./img/../img/p.png", &parent).unwrap();
        assert_eq!(a.absolute(), b.absolute());
        assert_eq!(a.raw(), "img/p.png");
        assert_eq!(b.raw(), "./img/../img/p.png");
    }

    #[test]
    fn test_existing_absolute_path_is_normalized() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("site")).unwrap();
        std::fs::create_dir_all(dir.path().join("img")).unwrap();
        std::fs::write(dir.path().join("img").join("p.png"), b"png").unwrap();
        let page = dir.path().join("site").join("index.html");
        let parent = Locator::entry(&page.to_string_lossy()).unwrap();

        let relative = Locator::within("../img/p.png", &parent).unwrap();
        let spelled_out = dir.path().join("site").join("..").join("img").join("p.png");
        let absolute = Locator::within(&spelled_out.to_string_lossy(), &parent).unwrap();

        assert_eq!(relative.absolute(), absolute.absolute());
        assert!(!absolute.absolute().contains(".."));
    }

    #[test]
    fn test_file_url_becomes_path() {
        let locator = Locator::entry("file:///srv/site/index.html").unwrap();
        assert_eq!(locator.protocol(), &Protocol::File);
        assert_eq!(locator.absolute(), "/srv/site/index.html");
    }

    #[test]
    fn test_entry_without_scheme_joins_working_directory() {
        let locator = Locator::entry("definitely-missing-page.html").unwrap();
        let expected = std::env::current_dir().unwrap().join("definitely-missing-page.html");
        assert_eq!(locator.protocol(), &Protocol::File);
        assert_eq!(locator.absolute(), expected.to_string_lossy());
    }

    #[test]
    fn test_file_reference_query_is_ignored() {
        let parent = Locator::resolve("/srv/site/index.html", &Protocol::File, Some("/srv/site/")).unwrap();
        let child = Locator::within("fonts/icons.woff2?v=4.7#iefix", &parent).unwrap();
        assert_eq!(child.absolute(), "/srv/site/fonts/icons.woff2");
        assert_eq!(child.suffix().as_deref(), Some("woff2"));
    }

    #[test]
    fn test_data_locator_is_self_contained() {
        let parent = Locator::entry("https://example.com/").unwrap();
        let child = Locator::within("data:image/gif;base64,R0lGOD", &parent).unwrap();
        assert_eq!(child.protocol(), &Protocol::Data);
        assert_eq!(child.absolute(), "data:image/gif;base64,R0lGOD");
        assert_eq!(child.base(), None);
    }

    #[test]
    fn test_directory_locator_resolves_inside() {
        let dir = Locator::entry("https://cdn.test/assets/").unwrap().as_directory();
        let child = Locator::within("app.js", &dir).unwrap();
        assert_eq!(child.absolute(), "https://cdn.test/assets/app.js");

        let local = Locator::resolve("/srv/static", &Protocol::File, Some("/srv/")).unwrap().as_directory();
        let child = Locator::within("a.png", &local).unwrap();
        assert_eq!(child.absolute(), "/srv/static/a.png");
    }

    #[test]
    fn test_http_without_base_is_structural_error() {
        let err = resolve_absolute("a.css", &Protocol::Http, None).unwrap_err();
        assert!(matches!(err, BundleError::Locator { .. }));
    }

    #[test]
    fn test_empty_reference_is_rejected() {
        let parent = Locator::entry("https://example.com/").unwrap();
        assert!(Locator::within("   ", &parent).is_err());
    }
}
