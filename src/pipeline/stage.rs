//! Stage identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a build, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    InitialFetch,
    DocumentCreation,
    PreStyleRemovals,
    StyleInlining,
    PostStyleRemovals,
    ResourceDiscovery,
    ResourceFetch,
    ResourceModifications,
    ResourceInlining,
    FinalInlineModifications,
    FinalDocumentCreation,
    FinalMarkupCreation,
}

impl Stage {
    /// Every stage, in the order a build runs them
    pub const ALL: [Stage; 12] = [
        Stage::InitialFetch,
        Stage::DocumentCreation,
        Stage::PreStyleRemovals,
        Stage::StyleInlining,
        Stage::PostStyleRemovals,
        Stage::ResourceDiscovery,
        Stage::ResourceFetch,
        Stage::ResourceModifications,
        Stage::ResourceInlining,
        Stage::FinalInlineModifications,
        Stage::FinalDocumentCreation,
        Stage::FinalMarkupCreation,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Stage::InitialFetch => "initial-fetch",
            Stage::DocumentCreation => "document-creation",
            Stage::PreStyleRemovals => "pre-style-removals",
            Stage::StyleInlining => "style-inlining",
            Stage::PostStyleRemovals => "post-style-removals",
            Stage::ResourceDiscovery => "resource-discovery",
            Stage::ResourceFetch => "resource-fetch",
            Stage::ResourceModifications => "resource-modifications",
            Stage::ResourceInlining => "resource-inlining",
            Stage::FinalInlineModifications => "final-inline-modifications",
            Stage::FinalDocumentCreation => "final-document-creation",
            Stage::FinalMarkupCreation => "final-markup-creation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extension slot around a stage body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Before,
    After,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Before => write!(f, "before"),
            Slot::After => write!(f, "after"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_in_declaration_order() {
        assert!(Stage::ALL.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(Stage::ALL[0], Stage::InitialFetch);
        assert_eq!(Stage::ALL[11], Stage::FinalMarkupCreation);
    }

    #[test]
    fn test_names_match_serde() {
        for stage in Stage::ALL {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage.name()));
        }
    }
}
