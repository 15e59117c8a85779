//! Integration tests for link preview resolution.
//!
//! Exercises the default resolver (video host first, Open Graph scrape as
//! fallback) against local mock pages.

use std::time::Duration;

use linkhive::preview::{
    BROWSER_USER_AGENT, FetchTimeouts, MAX_PAGE_BYTES, OpenGraphProvider, PreviewError,
    PreviewProvider, PreviewResolver, VideoPreviewStyle, YoutubeProvider,
    build_default_preview_resolver,
};
use wiremock::matchers::{any, header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

fn default_resolver() -> PreviewResolver {
    build_default_preview_resolver(VideoPreviewStyle::Thumbnail, FetchTimeouts::default())
}

fn html_page(head: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<!doctype html><html><head>{head}</head><body>hello</body></html>"),
        "text/html; charset=utf-8",
    )
}

#[tokio::test]
async fn test_open_graph_image_is_returned() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(html_page(
            r#"<meta property="og:image" content="https://cdn.example.com/cover.jpg">"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let artifact = default_resolver()
        .resolve_preview(&format!("{}/article", server.uri()))
        .await;

    assert_eq!(artifact.as_str(), "https://cdn.example.com/cover.jpg");
}

#[tokio::test]
async fn test_scrape_sends_browser_headers() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("user-agent", BROWSER_USER_AGENT))
        .respond_with(html_page(
            r#"<meta name="twitter:image" content="https://cdn.example.com/card.png">"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let artifact = default_resolver()
        .resolve_preview(&format!("{}/page", server.uri()))
        .await;

    assert_eq!(artifact.as_str(), "https://cdn.example.com/card.png");
}

#[tokio::test]
async fn test_relative_image_resolves_against_final_url() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/blog/post", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blog/post"))
        .respond_with(html_page(r#"<meta property="og:image" content="img/hero.png">"#))
        .mount(&server)
        .await;

    let artifact = default_resolver()
        .resolve_preview(&format!("{}/old", server.uri()))
        .await;

    assert_eq!(artifact.as_str(), format!("{}/blog/img/hero.png", server.uri()));
}

#[tokio::test]
async fn test_page_without_image_yields_empty() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(html_page("<title>No image here</title>"))
        .mount(&server)
        .await;

    let artifact = default_resolver()
        .resolve_preview(&format!("{}/plain", server.uri()))
        .await;

    assert!(artifact.is_empty());
}

#[tokio::test]
async fn test_error_status_yields_empty() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_raw(
                r#"<html><head><meta property="og:image" content="https://x/404.png"></head></html>"#,
                "text/html",
            ),
        )
        .mount(&server)
        .await;

    let artifact = default_resolver()
        .resolve_preview(&format!("{}/missing", server.uri()))
        .await;

    assert!(artifact.is_empty());
}

#[tokio::test]
async fn test_non_html_response_yields_empty() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"note": "<meta property=\"og:image\" content=\"https://x/not-a-page.png\">"}"#,
            "application/json",
        ))
        .mount(&server)
        .await;
    let url = format!("{}/data.json", server.uri());

    let scraper = OpenGraphProvider::new(FetchTimeouts::default())
        .unwrap_or_else(|e| panic!("client should build: {e}"));
    match scraper.resolve(&url).await {
        Err(PreviewError::NotHtml { content_type, .. }) => {
            assert_eq!(content_type, "application/json");
        }
        other => panic!("expected NotHtml, got {other:?}"),
    }

    assert!(default_resolver().resolve_preview(&url).await.is_empty());
}

#[tokio::test]
async fn test_oversized_page_reads_only_leading_bytes() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let filler = "x".repeat(MAX_PAGE_BYTES * 2);
    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(html_page(&format!(
            r#"<meta property="og:image" content="https://cdn.example.com/head.png"><!-- {filler} -->"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/buried"))
        .respond_with(html_page(&format!(
            r#"<!-- {filler} --><meta property="og:image" content="https://cdn.example.com/late.png">"#
        )))
        .mount(&server)
        .await;

    let resolver = default_resolver();
    let head = resolver
        .resolve_preview(&format!("{}/huge", server.uri()))
        .await;
    let buried = resolver
        .resolve_preview(&format!("{}/buried", server.uri()))
        .await;

    assert_eq!(head.as_str(), "https://cdn.example.com/head.png");
    assert!(buried.is_empty());
}

#[tokio::test]
async fn test_network_failure_yields_empty() {
    // Nothing listens on port 1; the connection is refused immediately.
    let artifact = default_resolver()
        .resolve_preview("http://127.0.0.1:1/unreachable")
        .await;

    assert!(artifact.is_empty());
}

#[tokio::test]
async fn test_slow_page_is_cut_off_by_timeout() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            html_page(r#"<meta property="og:image" content="https://x/late.png">"#)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let resolver = build_default_preview_resolver(
        VideoPreviewStyle::Thumbnail,
        FetchTimeouts {
            connect_secs: 1,
            total_secs: 1,
        },
    );
    let started = std::time::Instant::now();
    let artifact = resolver
        .resolve_preview(&format!("{}/slow", server.uri()))
        .await;

    assert!(artifact.is_empty());
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_long_form_video_link_makes_no_fetch() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let artifact = default_resolver()
        .resolve_preview(&format!(
            "{}/youtube.com/watch?v=dQw4w9WgXcQ&t=42",
            server.uri()
        ))
        .await;

    assert_eq!(
        artifact.as_str(),
        "https://img.youtube.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"
    );
}

#[tokio::test]
async fn test_short_form_video_link_makes_no_fetch() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let resolver =
        build_default_preview_resolver(VideoPreviewStyle::Embed, FetchTimeouts::default());
    let artifact = resolver
        .resolve_preview(&format!("{}/youtu.be/dQw4w9WgXcQ?si=share", server.uri()))
        .await;

    assert!(artifact.as_str().starts_with("<iframe"));
    assert!(
        artifact
            .as_str()
            .contains("src=\"https://www.youtube.com/embed/dQw4w9WgXcQ\"")
    );
}

#[tokio::test]
async fn test_video_link_without_id_falls_through_to_scrape() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/youtube.com/@channel"))
        .respond_with(html_page(
            r#"<meta property="og:image" content="https://yt3.example.com/avatar.jpg">"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let artifact = default_resolver()
        .resolve_preview(&format!("{}/youtube.com/@channel", server.uri()))
        .await;

    assert_eq!(artifact.as_str(), "https://yt3.example.com/avatar.jpg");
}

#[tokio::test]
async fn test_registration_order_does_not_override_priority() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut resolver = PreviewResolver::new();
    let scraper = OpenGraphProvider::new(FetchTimeouts::default())
        .unwrap_or_else(|e| panic!("client should build: {e}"));
    resolver.register(Box::new(scraper));
    resolver.register(Box::new(YoutubeProvider::new(VideoPreviewStyle::Thumbnail)));

    let artifact = resolver
        .resolve_preview(&format!("{}/youtu.be/abc123", server.uri()))
        .await;

    assert_eq!(
        artifact.as_str(),
        "https://img.youtube.com/vi/abc123/maxresdefault.jpg"
    );
}
