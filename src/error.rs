//! Typed failure taxonomy for the fetch pipeline.
//!
//! Authentication and scrape-structure failures are terminal for a run;
//! per-listing failures are isolated and only counted. Cancellation is a
//! run status, not an error, and never appears here.

use thiserror::Error;

/// Why an authentication attempt did not produce a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// The site rejected the submitted identifier/secret.
    #[error("the site rejected the supplied credentials")]
    InvalidCredentials,

    /// No authenticated page appeared within the credential-login deadline.
    #[error("credential login timed out before an authenticated page appeared")]
    Timeout,

    /// The interactive third-party login was never completed in time.
    #[error("interactive login was not completed before the deadline")]
    LoginTimeout,

    /// The browser itself failed (navigation error, missing form, crash).
    #[error("browser failure during login: {0}")]
    Browser(String),
}

/// Why the setups page could not be turned into listings.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// No recognizable section headings on the page — the site layout
    /// changed and the caller must be told rather than silently retried.
    #[error("setups page structure not recognized (no section headings matched `{heading_selector}`)")]
    StructureUnrecognized { heading_selector: String },

    /// A configured CSS selector failed to parse.
    #[error("invalid scrape selector `{0}`")]
    Selector(String),

    /// The snapshot could not be taken from the browser.
    #[error("browser failure while scraping: {0}")]
    Browser(String),
}

/// Why a single listing failed to land on disk. These never abort the run.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("download failed: {0}")]
    Download(String),

    #[error("archive extraction failed: {0}")]
    Extraction(String),

    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    pub(crate) fn fs(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.display().to_string(),
            source,
        }
    }
}
