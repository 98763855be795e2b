//! Staged bundling pipeline
//!
//! | Stage | Built-in body |
//! |---|---|
//! | initial-fetch | resolve and fetch the entry page |
//! | document-creation | parse markup, honour `<base href>` |
//! | pre-style-removals | configured selectors, pre-style collaborators |
//! | style-inlining | rebase inline styles, fetch and inline linked sheets |
//! | post-style-removals | configured selectors, post-style collaborators |
//! | resource-discovery | register every remaining reference |
//! | resource-fetch | fetch all unfetched cache entries |
//! | resource-modifications | tracking pixels, dropped types, resource collaborators |
//! | resource-inlining | swap references for data URIs and inline text |
//! | final-inline-modifications | comment stripping, final collaborators |
//! | final-document-creation | serialize the tree |
//! | final-markup-creation | markup collaborators |

pub mod context;
pub mod hooks;
pub mod orchestrator;
pub mod stage;
pub mod stages;

pub use context::{BuildContext, BundleOutput, BundleSummary, StageTiming};
pub use hooks::{FnHook, StageHook, hook_fn};
pub use orchestrator::Bundler;
pub use stage::{Slot, Stage};
pub use stages::DocumentPhase;
