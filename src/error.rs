//! Error types for the visual regression runner

use std::path::PathBuf;

use thiserror::Error;

use crate::scenario::Step;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running scenarios
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to launch or connect to the browser backend
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    /// Target route unreachable or answered with a non-success status
    #[error("Navigation to {url} failed: {reason}")]
    NavigationError { url: String, reason: String },

    /// A wait exceeded its allotted time
    #[error("Timed out after {ms}ms waiting for {what}")]
    Timeout { what: String, ms: u64 },

    /// Rendered DOM did not match an expectation
    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    /// Output directory or screenshot could not be written
    #[error("Filesystem error at {}: {source}", .path.display())]
    FilesystemError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Screenshot capture or decoding failed
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Operation not offered by the selected backend
    #[error("Unsupported by this backend: {0}")]
    Unsupported(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// A scenario aborted at a given step
    #[error("scenario '{scenario}' failed at {step}: {source}")]
    Scenario {
        scenario: String,
        step: Step,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FilesystemError { path: path.into(), source }
    }

    /// The innermost error, looking through scenario context.
    pub fn root(&self) -> &Error {
        match self {
            Error::Scenario { source, .. } => source.root(),
            other => other,
        }
    }

    /// The step a scenario failed at, if this error carries scenario context.
    pub fn step(&self) -> Option<&Step> {
        match self {
            Error::Scenario { step, .. } => Some(step),
            _ => None,
        }
    }
}
