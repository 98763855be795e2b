//! Document cleanup collaborators

use anyhow::bail;
use kuchiki::NodeRef;

use super::DocumentPlugin;

/// Removes every element matching any of its selectors
#[derive(Debug, Clone, Default)]
pub struct SelectorRemover {
    selectors: Vec<String>,
}

impl SelectorRemover {
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selectors: selectors.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    #[must_use]
    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }
}

impl DocumentPlugin for SelectorRemover {
    fn name(&self) -> &str {
        "selector-remover"
    }

    /// Valid selectors are all applied even when some are invalid; the
    /// invalid ones are reported together afterwards.
    fn apply(&self, document: &NodeRef) -> anyhow::Result<()> {
        let mut invalid = Vec::new();

        for selector in &self.selectors {
            let Ok(matches) = document.select(selector) else {
                invalid.push(selector.as_str());
                continue;
            };
            // Collect before detaching so the traversal is not disturbed
            let matches: Vec<_> = matches.collect();
            log::debug!("Removing {} elements matching '{selector}'", matches.len());
            for element in matches {
                element.as_node().detach();
            }
        }

        if !invalid.is_empty() {
            bail!("invalid removal selectors: {}", invalid.join(", "));
        }
        Ok(())
    }
}

/// Removes every HTML comment
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentStripper;

impl DocumentPlugin for CommentStripper {
    fn name(&self) -> &str {
        "comment-stripper"
    }

    fn apply(&self, document: &NodeRef) -> anyhow::Result<()> {
        let comments: Vec<NodeRef> = document
            .descendants()
            .filter(|node| node.as_comment().is_some())
            .collect();
        log::debug!("Stripping {} comments", comments.len());
        for comment in comments {
            comment.detach();
        }
        Ok(())
    }
}
