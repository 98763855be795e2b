//! Extension points
//!
//! Every stage has a `Before` and an `After` slot. Hooks registered for a
//! slot run in registration order with mutable access to the build context;
//! the first hook error aborts the build.

use futures::future::LocalBoxFuture;
use std::collections::HashMap;

use super::context::BuildContext;
use super::stage::{Slot, Stage};

/// Callback run in a stage's extension slot
///
/// The returned future borrows the context, so it is local to the build's
/// task. Synchronous callbacks are easier to write with [`hook_fn`].
pub trait StageHook: Send + Sync {
    fn name(&self) -> &str;

    fn run<'a>(&'a self, ctx: &'a mut BuildContext) -> LocalBoxFuture<'a, anyhow::Result<()>>;
}

/// A named synchronous closure used as a hook
pub struct FnHook<F> {
    name: String,
    callback: F,
}

/// Wrap a synchronous closure as a [`StageHook`]
pub fn hook_fn<F>(name: impl Into<String>, callback: F) -> FnHook<F>
where
    F: Fn(&mut BuildContext) -> anyhow::Result<()> + Send + Sync,
{
    FnHook {
        name: name.into(),
        callback,
    }
}

impl<F> StageHook for FnHook<F>
where
    F: Fn(&mut BuildContext) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, ctx: &'a mut BuildContext) -> LocalBoxFuture<'a, anyhow::Result<()>> {
        Box::pin(futures::future::ready((self.callback)(ctx)))
    }
}

/// Ordered hook lists keyed by stage and slot
#[derive(Default)]
pub(crate) struct HookTable {
    hooks: HashMap<(Stage, Slot), Vec<Box<dyn StageHook>>>,
}

impl HookTable {
    pub(crate) fn add(&mut self, stage: Stage, slot: Slot, hook: Box<dyn StageHook>) {
        self.hooks.entry((stage, slot)).or_default().push(hook);
    }

    pub(crate) fn get(&self, stage: Stage, slot: Slot) -> &[Box<dyn StageHook>] {
        self.hooks.get(&(stage, slot)).map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }
}
