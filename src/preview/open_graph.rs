//! Generic preview provider: fetch the page and scrape its image metadata.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;
use url::Url;

use super::html::extract_preview_image;
use super::http_client::{FetchTimeouts, HTML_ACCEPT, build_preview_http_client};
use super::{PreviewArtifact, PreviewError, PreviewProvider, PreviewStep, ProviderPriority};

/// Bytes of a page read before scraping; preview metadata lives in `<head>`.
pub const MAX_PAGE_BYTES: usize = 1024 * 1024;

/// Fallback provider scraping Open Graph / Twitter card / `image_src` metadata.
pub struct OpenGraphProvider {
    client: Client,
}

impl OpenGraphProvider {
    /// Creates the provider with its own scrape client.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::ClientBuild`] when HTTP client construction fails.
    pub fn new(timeouts: FetchTimeouts) -> Result<Self, PreviewError> {
        Ok(Self {
            client: build_preview_http_client(timeouts)?,
        })
    }

    /// Creates the provider around an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for OpenGraphProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenGraphProvider").finish_non_exhaustive()
    }
}

fn parse_fetch_target(url: &str) -> Result<Url, PreviewError> {
    let parsed =
        Url::parse(url.trim()).map_err(|e| PreviewError::unsupported_url(url, &e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(PreviewError::unsupported_url(
            url,
            &format!("scheme '{other}' is not fetchable"),
        )),
    }
}

/// Appends `chunk` up to `limit` total bytes. Returns true once the limit is reached.
fn append_capped(buf: &mut Vec<u8>, chunk: &[u8], limit: usize) -> bool {
    let room = limit.saturating_sub(buf.len());
    buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    buf.len() >= limit
}

/// Reads at most [`MAX_PAGE_BYTES`] of the body and drops the connection after.
async fn read_page_head(response: Response, url: &str) -> Result<String, PreviewError> {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PreviewError::fetch(url, &e))?;
        if append_capped(&mut body, &chunk, MAX_PAGE_BYTES) {
            debug!(limit = MAX_PAGE_BYTES, "Page truncated");
            break;
        }
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("text/html") || lower.contains("application/xhtml")
}

#[async_trait]
impl PreviewProvider for OpenGraphProvider {
    fn name(&self) -> &'static str {
        "open-graph"
    }

    fn priority(&self) -> ProviderPriority {
        ProviderPriority::Fallback
    }

    fn can_handle(&self, _url: &str) -> bool {
        // Unfetchable inputs are reported from resolve() so they get logged.
        true
    }

    #[tracing::instrument(skip(self), fields(provider = "open-graph"))]
    async fn resolve(&self, url: &str) -> Result<PreviewStep, PreviewError> {
        let target = parse_fetch_target(url)?;

        let response = self
            .client
            .get(target)
            .header(ACCEPT, HTML_ACCEPT)
            .send()
            .await
            .map_err(|e| PreviewError::fetch(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PreviewError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // A missing Content-Type is tolerated; plenty of small servers omit it.
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            && !is_html_content_type(content_type)
        {
            return Err(PreviewError::NotHtml {
                url: url.to_string(),
                content_type: content_type.to_string(),
            });
        }

        let page_url = response.url().clone();
        let html = read_page_head(response, url).await?;
        debug!(bytes = html.len(), final_url = %page_url, "Fetched page");

        extract_preview_image(&html, &page_url)
            .map(|image| PreviewStep::Found(PreviewArtifact::new(image)))
            .ok_or_else(|| PreviewError::no_image(url))
    }
}
