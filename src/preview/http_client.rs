//! HTTP client used for preview scraping.
//!
//! Pages are fetched the way a browser would ask for them: many sites serve
//! stripped or blocked responses to non-browser user agents, which would hide
//! the Open Graph tags the scraper needs.

use std::time::Duration;

use reqwest::Client;
use reqwest::redirect::Policy;

use super::PreviewError;

/// Browser `User-Agent` sent with scrape requests.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/89.0.4389.82 Safari/537.36";

/// `Accept` header sent with scrape requests.
pub const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

const MAX_REDIRECTS: usize = 10;

/// Connect and total timeouts for preview fetches, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTimeouts {
    pub connect_secs: u64,
    pub total_secs: u64,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            total_secs: 30,
        }
    }
}

/// Builds the scrape client: browser identity, bounded redirects, gzip.
///
/// The final URL after redirects is what relative image paths resolve against.
///
/// # Errors
///
/// Returns [`PreviewError::ClientBuild`] when the TLS backend or system
/// configuration prevents construction.
pub fn build_preview_http_client(timeouts: FetchTimeouts) -> Result<Client, PreviewError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.total_secs))
        .user_agent(BROWSER_USER_AGENT)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .build()
        .map_err(|error| PreviewError::ClientBuild {
            reason: error.to_string(),
        })
}
