//! Link preview resolution: turn an arbitrary saved URL into a displayable artifact.
//!
//! A preview artifact is either a direct image URL or embeddable markup. It is
//! best-effort: an empty artifact is a valid outcome, and resolution never
//! returns an error to the caller.
//!
//! # Architecture
//!
//! - [`PreviewProvider`] - Async trait that individual providers implement
//! - [`PreviewResolver`] - Priority-ordered provider registry with the fallback loop
//! - [`PreviewStep`] - What a single provider produced
//! - [`YoutubeProvider`] - Video-host special case, no network access
//! - [`OpenGraphProvider`] - Generic fetch-and-scrape of page image metadata
//!
//! # Example
//!
//! ```no_run
//! use linkhive::preview::{build_default_preview_resolver, FetchTimeouts, VideoPreviewStyle};
//!
//! # async fn example() {
//! let resolver = build_default_preview_resolver(VideoPreviewStyle::Thumbnail, FetchTimeouts::default());
//! let artifact = resolver.resolve_preview("https://youtu.be/dQw4w9WgXcQ").await;
//! println!("preview: {artifact}");
//! # }
//! ```

mod error;
mod html;
mod http_client;
mod open_graph;
mod registry;
mod youtube;

pub use error::PreviewError;
pub use html::{absolutize_url, extract_preview_image};
pub use http_client::{BROWSER_USER_AGENT, FetchTimeouts, HTML_ACCEPT, build_preview_http_client};
pub use open_graph::{MAX_PAGE_BYTES, OpenGraphProvider};
pub use registry::PreviewResolver;
pub use youtube::{VideoPreviewStyle, YoutubeProvider, extract_video_id};

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Builds the default resolver: video hosts first, generic scraping as fallback.
///
/// If the scrape client cannot be built the resolver still serves video-host
/// previews and returns empty artifacts for everything else.
#[must_use]
pub fn build_default_preview_resolver(
    video_style: VideoPreviewStyle,
    timeouts: FetchTimeouts,
) -> PreviewResolver {
    let mut resolver = PreviewResolver::new();
    resolver.register(Box::new(YoutubeProvider::new(video_style)));

    match OpenGraphProvider::new(timeouts) {
        Ok(provider) => resolver.register(Box::new(provider)),
        Err(error) => warn!(
            error = %error,
            "Open Graph provider unavailable; only video-host previews will resolve"
        ),
    }
    resolver
}

/// A best-effort preview: image URL, embeddable markup, or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreviewArtifact(String);

impl PreviewArtifact {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The "no preview" artifact.
    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PreviewArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PreviewArtifact {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Priority level for provider ordering.
///
/// Derives `Ord` so that `Specialized < Fallback` for sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProviderPriority {
    /// Host-specific providers that need no network access.
    Specialized = 0,
    /// Generic scraping.
    Fallback = 1,
}

/// Result of a single provider's attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewStep {
    /// The provider produced an artifact.
    Found(PreviewArtifact),
    /// The provider recognised the URL but could not use it; try the next one.
    FallThrough,
}

/// Trait that all preview providers implement.
///
/// Uses `async_trait` so the resolver can hold `Box<dyn PreviewProvider>`.
#[async_trait]
pub trait PreviewProvider: Send + Sync {
    /// Returns the provider's name (e.g., "youtube", "open-graph").
    fn name(&self) -> &str;

    /// Returns the provider's priority level.
    fn priority(&self) -> ProviderPriority;

    /// Returns true if this provider should be tried for `url`.
    fn can_handle(&self, url: &str) -> bool;

    /// Attempts to derive a preview artifact for `url`.
    async fn resolve(&self, url: &str) -> Result<PreviewStep, PreviewError>;
}

/// Infallible preview lookup, the seam the content workflow depends on.
#[async_trait]
pub trait PreviewSource: Send + Sync {
    /// Resolves `url` to a preview; any failure yields an empty artifact.
    async fn resolve_preview(&self, url: &str) -> PreviewArtifact;
}
