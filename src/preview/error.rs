//! Error types for link preview resolution.
//!
//! None of these ever reach a caller of [`super::PreviewResolver::resolve_preview`]:
//! the resolver logs them and degrades to an empty artifact. Providers still
//! return them so the log line says what went wrong.

use thiserror::Error;

/// Errors a preview provider can hit while deriving an artifact.
#[derive(Debug, Clone, Error)]
pub enum PreviewError {
    /// The input is not an http(s) URL the provider can fetch.
    #[error("unsupported url '{url}': {reason}")]
    UnsupportedUrl {
        /// The rejected input
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Network-level failure (DNS, connect, timeout, body read).
    #[error("fetch failed for '{url}': {reason}")]
    Fetch {
        /// The URL being fetched
        url: String,
        /// Underlying transport error text
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("fetch of '{url}' returned HTTP {status}")]
    HttpStatus {
        /// The URL being fetched
        url: String,
        /// Response status code
        status: u16,
    },

    /// The response was not an HTML document.
    #[error("'{url}' is not HTML (content-type: {content_type})")]
    NotHtml {
        /// The URL being fetched
        url: String,
        /// Reported content type
        content_type: String,
    },

    /// The page was fetched but carries no image metadata.
    #[error("no preview image found in '{url}'")]
    NoImage {
        /// The URL whose page was scraped
        url: String,
    },

    /// HTTP client construction failed.
    #[error("preview HTTP client unavailable: {reason}")]
    ClientBuild {
        /// Why construction failed
        reason: String,
    },
}

impl PreviewError {
    /// Creates an `UnsupportedUrl` error.
    #[must_use]
    pub fn unsupported_url(url: &str, reason: &str) -> Self {
        Self::UnsupportedUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `Fetch` error from a transport failure.
    #[must_use]
    pub fn fetch(url: &str, error: &reqwest::Error) -> Self {
        let reason = if error.is_timeout() {
            format!("timed out: {error}")
        } else {
            error.to_string()
        };
        Self::Fetch {
            url: url.to_string(),
            reason,
        }
    }

    /// Creates a `NoImage` error.
    #[must_use]
    pub fn no_image(url: &str) -> Self {
        Self::NoImage {
            url: url.to_string(),
        }
    }
}
