//! Resource classification and fetch state

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a resource is used for in the page
///
/// The type is fixed at registration from the context the reference was
/// found in (a `<script src>` is a script, a `url()` inside `@font-face` is
/// a font) and never changes afterwards, even if the fetched bytes turn
/// out to be something else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Html,
    Css,
    Script,
    Image,
    Audio,
    Video,
    Font,
    Cursor,
    Favicon,
    Other,
}

impl ResourceType {
    pub const ALL: [ResourceType; 10] = [
        ResourceType::Html,
        ResourceType::Css,
        ResourceType::Script,
        ResourceType::Image,
        ResourceType::Audio,
        ResourceType::Video,
        ResourceType::Font,
        ResourceType::Cursor,
        ResourceType::Favicon,
        ResourceType::Other,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Html => "html",
            ResourceType::Css => "css",
            ResourceType::Script => "script",
            ResourceType::Image => "image",
            ResourceType::Audio => "audio",
            ResourceType::Video => "video",
            ResourceType::Font => "font",
            ResourceType::Cursor => "cursor",
            ResourceType::Favicon => "favicon",
            ResourceType::Other => "other",
        }
    }

    /// Parse a type name as accepted on the command line and in config files
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the single fetch a resource is allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// Not fetched yet
    #[default]
    Unfetched,
    /// The transport delivered a body
    Success,
    /// The transport gave up; the resource has no bytes
    Failure,
}

impl FetchStatus {
    #[must_use]
    pub fn is_unfetched(self) -> bool {
        self == FetchStatus::Unfetched
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        self == FetchStatus::Success
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Unfetched => write!(f, "unfetched"),
            FetchStatus::Success => write!(f, "success"),
            FetchStatus::Failure => write!(f, "failure"),
        }
    }
}
