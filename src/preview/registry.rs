//! Preview resolver with a priority-ordered provider loop.
//!
//! The [`PreviewResolver`] holds the registered providers and runs them in
//! priority order until one produces an artifact. Every failure is absorbed:
//! the caller always gets a [`PreviewArtifact`], possibly empty.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{PreviewArtifact, PreviewProvider, PreviewSource, PreviewStep};

/// A priority-ordered collection of preview providers.
///
/// Within the same priority level, providers are tried in registration order.
pub struct PreviewResolver {
    providers: Vec<Box<dyn PreviewProvider>>,
}

impl PreviewResolver {
    /// Creates an empty resolver; it resolves everything to an empty artifact.
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Registers a provider.
    pub fn register(&mut self, provider: Box<dyn PreviewProvider>) {
        debug!(
            name = provider.name(),
            priority = ?provider.priority(),
            "Registering preview provider"
        );
        self.providers.push(provider);
    }

    /// Returns the number of registered providers.
    #[must_use]
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Returns all providers willing to handle `url`, sorted by priority.
    #[must_use]
    pub fn find_handlers(&self, url: &str) -> Vec<&dyn PreviewProvider> {
        let mut handlers: Vec<&dyn PreviewProvider> = self
            .providers
            .iter()
            .filter(|p| p.can_handle(url))
            .map(AsRef::as_ref)
            .collect();
        handlers.sort_by_key(|p| p.priority());
        handlers
    }

    /// Resolves `url` to a preview artifact.
    ///
    /// 1. Tries each applicable provider in priority order
    /// 2. On `PreviewStep::Found` with a non-empty artifact → returns it
    /// 3. On `PreviewStep::FallThrough` or an error → logs and tries the next
    /// 4. Returns an empty artifact when no provider succeeds
    #[tracing::instrument(skip_all, fields(url = %url))]
    pub async fn resolve_preview(&self, url: &str) -> PreviewArtifact {
        for provider in self.find_handlers(url) {
            match provider.resolve(url).await {
                Ok(PreviewStep::Found(artifact)) if !artifact.is_empty() => {
                    info!(provider = provider.name(), "Preview resolved");
                    return artifact;
                }
                Ok(PreviewStep::Found(_) | PreviewStep::FallThrough) => {
                    debug!(provider = provider.name(), "Provider fell through");
                }
                Err(error) => {
                    warn!(provider = provider.name(), error = %error, "Preview provider failed");
                }
            }
        }
        PreviewArtifact::empty()
    }
}

impl Default for PreviewResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PreviewSource for PreviewResolver {
    async fn resolve_preview(&self, url: &str) -> PreviewArtifact {
        PreviewResolver::resolve_preview(self, url).await
    }
}
