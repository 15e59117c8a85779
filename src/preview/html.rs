//! HTML metadata helpers: meta/link tag scanning and image candidate selection.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static META_TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<meta\b[^>]*>"));

static LINK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<link\b[^>]*>"));

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)([a-z_:\-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
});

/// Meta keys consulted for a preview image, most specific first.
const IMAGE_META_KEYS: [&str; 6] = [
    "og:image:secure_url",
    "og:image",
    "og:image:url",
    "twitter:image",
    "twitter:image:src",
    "image",
];

fn tag_attributes(tag: &str) -> HashMap<String, String> {
    ATTRIBUTE_RE
        .captures_iter(tag)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
            Some((name, decode_entities(value.trim())))
        })
        .collect()
}

/// Collects `<meta>` tags keyed by their `property`, `name` or `itemprop` attribute.
///
/// Keys are lowercased; the first occurrence of a key wins.
#[must_use]
fn meta_values(html: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for tag in META_TAG_RE.find_iter(html) {
        let attributes = tag_attributes(tag.as_str());
        let Some(content) = attributes.get("content").filter(|c| !c.is_empty()) else {
            continue;
        };
        for key_attr in ["property", "name", "itemprop"] {
            if let Some(key) = attributes.get(key_attr) {
                values
                    .entry(key.to_ascii_lowercase())
                    .or_insert_with(|| content.clone());
            }
        }
    }
    values
}

/// Returns the `href` of the first `<link rel="image_src">`.
#[must_use]
fn link_image_src(html: &str) -> Option<String> {
    LINK_TAG_RE.find_iter(html).find_map(|tag| {
        let attributes = tag_attributes(tag.as_str());
        let rel = attributes.get("rel")?;
        if rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("image_src")) {
            attributes.get("href").filter(|href| !href.is_empty()).cloned()
        } else {
            None
        }
    })
}

/// Extracts the best preview image URL from `html`, absolutized against `page_url`.
#[must_use]
pub fn extract_preview_image(html: &str, page_url: &Url) -> Option<String> {
    let metas = meta_values(html);
    IMAGE_META_KEYS
        .iter()
        .find_map(|key| metas.get(*key).cloned())
        .or_else(|| link_image_src(html))
        .and_then(|candidate| absolutize_url(&candidate, page_url))
}

/// Resolves a possibly relative URL string against a base URL.
///
/// Returns the value as-is if it already starts with `http://` or `https://`;
/// normalizes `//...` to the base scheme; otherwise joins with `base_url`.
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value.to_string());
    }
    if value.starts_with("//") {
        return Some(format!("{}:{value}", base_url.scheme()));
    }
    base_url.join(value).ok().map(|url| url.to_string())
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
