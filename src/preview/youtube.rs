//! YouTube preview provider.
//!
//! Video pages are heavy and frequently refuse scrapers, but thumbnails and
//! embeds follow stable URL templates keyed by the video id. The provider
//! therefore never touches the network: it extracts the id from the link text
//! and fills a template.
//!
//! Two link forms are recognised:
//! - long: `youtube.com/watch?v=<id>&...`, id ends at the next `&`
//! - short: `youtu.be/<id>?...`, id ends at the next `?`
//!
//! A recognised host without an extractable id falls through to generic scraping.

use async_trait::async_trait;

use super::{PreviewArtifact, PreviewError, PreviewProvider, PreviewStep, ProviderPriority};

const LONG_FORM_HOST: &str = "youtube.com";
const SHORT_FORM_MARKER: &str = "youtu.be/";

/// Which artifact to produce for a recognised video link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum VideoPreviewStyle {
    /// Direct thumbnail image URL.
    #[default]
    Thumbnail,
    /// `<iframe>` embed markup.
    Embed,
}

impl VideoPreviewStyle {
    /// Fills this style's template with `video_id`.
    #[must_use]
    pub fn render(self, video_id: &str) -> String {
        match self {
            Self::Thumbnail => format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg"),
            Self::Embed => format!(
                "<iframe width=\"288\" height=\"192\" src=\"https://www.youtube.com/embed/{video_id}\" frameborder=\"0\" allow=\"accelerometer; autoplay; encrypted-media; gyroscope; picture-in-picture\" allowfullscreen></iframe>"
            ),
        }
    }
}

/// Extracts the video id from a long- or short-form link.
///
/// Returns `None` for non-YouTube links and for YouTube links without an id
/// (e.g. a channel page or a `watch` URL missing `v=`).
#[must_use]
pub fn extract_video_id(url: &str) -> Option<&str> {
    let id = if url.contains(LONG_FORM_HOST) {
        long_form_id(url)?
    } else {
        let (_, rest) = url.split_once(SHORT_FORM_MARKER)?;
        rest.split(['?', '#']).next()?
    };
    let id = id.trim();
    (!id.is_empty()).then_some(id)
}

fn long_form_id(url: &str) -> Option<&str> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next()?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("v="))
}

/// Special-case provider for YouTube video links.
#[derive(Debug, Clone, Copy, Default)]
pub struct YoutubeProvider {
    style: VideoPreviewStyle,
}

impl YoutubeProvider {
    #[must_use]
    pub fn new(style: VideoPreviewStyle) -> Self {
        Self { style }
    }
}

#[async_trait]
impl PreviewProvider for YoutubeProvider {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn priority(&self) -> ProviderPriority {
        ProviderPriority::Specialized
    }

    fn can_handle(&self, url: &str) -> bool {
        url.contains(LONG_FORM_HOST) || url.contains(SHORT_FORM_MARKER)
    }

    #[tracing::instrument(skip(self), fields(provider = "youtube"))]
    async fn resolve(&self, url: &str) -> Result<PreviewStep, PreviewError> {
        Ok(match extract_video_id(url) {
            Some(id) => PreviewStep::Found(PreviewArtifact::new(self.style.render(id))),
            None => PreviewStep::FallThrough,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_form_id_stops_at_ampersand() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s"),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_long_form_id_not_first_parameter() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?feature=share&v=abc123"),
            Some("abc123")
        );
    }

    #[test]
    fn test_long_form_ignores_parameters_ending_in_v() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?rev=2&v=abc123"),
            Some("abc123")
        );
    }

    #[test]
    fn test_short_form_id_stops_at_question_mark() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=xyz"),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_long_form_without_v_has_no_id() {
        assert_eq!(extract_video_id("https://www.youtube.com/@somechannel"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/playlist?list=PL1"), None);
    }

    #[test]
    fn test_short_form_without_id_has_no_id() {
        assert_eq!(extract_video_id("https://youtu.be/"), None);
        assert_eq!(extract_video_id("https://youtu.be/?si=xyz"), None);
    }

    #[test]
    fn test_non_youtube_link_has_no_id() {
        assert_eq!(extract_video_id("https://vimeo.com/12345?v=1"), None);
    }

    #[test]
    fn test_thumbnail_template() {
        assert_eq!(
            VideoPreviewStyle::Thumbnail.render("abc"),
            "https://img.youtube.com/vi/abc/maxresdefault.jpg"
        );
    }

    #[test]
    fn test_embed_template() {
        let markup = VideoPreviewStyle::Embed.render("abc");
        assert!(markup.starts_with("<iframe width=\"288\" height=\"192\""));
        assert!(markup.contains("src=\"https://www.youtube.com/embed/abc\""));
        assert!(markup.ends_with("allowfullscreen></iframe>"));
    }

    #[tokio::test]
    async fn test_provider_falls_through_without_id() {
        let provider = YoutubeProvider::new(VideoPreviewStyle::Thumbnail);
        assert!(provider.can_handle("https://www.youtube.com/watch"));
        let step = provider
            .resolve("https://www.youtube.com/watch")
            .await
            .unwrap_or(PreviewStep::FallThrough);
        assert_eq!(step, PreviewStep::FallThrough);
    }

    #[tokio::test]
    async fn test_provider_renders_configured_style() {
        let provider = YoutubeProvider::new(VideoPreviewStyle::Embed);
        let step = provider
            .resolve("https://youtu.be/abc")
            .await
            .unwrap_or(PreviewStep::FallThrough);
        let PreviewStep::Found(artifact) = step else {
            panic!("expected an artifact");
        };
        assert!(artifact.as_str().contains("/embed/abc"));
    }
}
