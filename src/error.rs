//! Error types for bundling operations
//!
//! Only structural failures are errors. A resource that cannot be fetched is
//! recorded on the resource itself (see [`crate::resource::FetchStatus`]) and
//! never surfaces here.

use thiserror::Error;

use crate::pipeline::Stage;

/// Result type alias for bundling operations
pub type BundleResult<T> = Result<T, BundleError>;

/// Error types that abort a bundling run
#[derive(Debug, Error)]
pub enum BundleError {
    /// A reference could not be turned into an absolute locator
    #[error("Invalid locator '{reference}': {message}")]
    Locator { reference: String, message: String },

    /// The entry page itself could not be fetched
    #[error("Failed to fetch entry page {url} (status {status_code})")]
    EntryFetch { url: String, status_code: u16 },

    /// The document tree is unusable
    #[error("Document error: {0}")]
    Document(String),

    /// A built-in stage ran without the state it requires
    #[error("Stage {stage} cannot run: {message}")]
    StageState { stage: Stage, message: String },

    /// An extension-point callback failed
    #[error("Extension hook '{hook}' failed during {stage}: {message}")]
    Hook {
        stage: Stage,
        hook: String,
        message: String,
    },

    /// Configuration rejected by the builder
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for BundleError {
    fn from(err: anyhow::Error) -> Self {
        // Use {:#} to preserve full error chain with context
        Self::Other(format!("{err:#}"))
    }
}

impl BundleError {
    pub(crate) fn locator(reference: &str, message: impl std::fmt::Display) -> Self {
        Self::Locator {
            reference: reference.to_string(),
            message: message.to_string(),
        }
    }
}
