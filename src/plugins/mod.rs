//! Content collaborators
//!
//! Collaborators change what ends up in the bundle without knowing about
//! stages. The pipeline decides when each kind runs:
//!
//! | Kind | Receives | Runs in |
//! |---|---|---|
//! | [`DocumentPlugin`] | the document tree | removal stages, final inline modifications |
//! | [`ResourcePlugin`] | the resource cache | resource modifications |
//! | [`MarkupPlugin`] | the serialized markup | final markup creation |
//!
//! A collaborator that fails is reported and skipped; the build carries on
//! with whatever the collaborator left behind. Resource bytes must only be
//! changed through [`ResourceHandle::update`](crate::resource::ResourceHandle::update).

pub mod removal;
pub mod resources;

use kuchiki::NodeRef;

use crate::cache::ResourceCache;

pub use removal::{CommentStripper, SelectorRemover};
pub use resources::{TrackingPixelRemover, TypeDropper};

/// Mutates the document tree in place
pub trait DocumentPlugin: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn apply(&self, document: &NodeRef) -> anyhow::Result<()>;
}

impl<F> DocumentPlugin for F
where
    F: Fn(&NodeRef) -> anyhow::Result<()> + Send + Sync,
{
    fn apply(&self, document: &NodeRef) -> anyhow::Result<()> {
        self(document)
    }
}

/// Rewrites fetched resources through the cache
pub trait ResourcePlugin: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn apply(&self, cache: &ResourceCache) -> anyhow::Result<()>;
}

impl<F> ResourcePlugin for F
where
    F: Fn(&ResourceCache) -> anyhow::Result<()> + Send + Sync,
{
    fn apply(&self, cache: &ResourceCache) -> anyhow::Result<()> {
        self(cache)
    }
}

/// Transforms the final markup string
pub trait MarkupPlugin: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn apply(&self, markup: &str) -> anyhow::Result<String>;
}

impl<F> MarkupPlugin for F
where
    F: Fn(&str) -> anyhow::Result<String> + Send + Sync,
{
    fn apply(&self, markup: &str) -> anyhow::Result<String> {
        self(markup)
    }
}
