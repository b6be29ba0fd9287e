//! Best-effort OpenGraph preview fetcher used to prefill article metadata.
//!
//! Deliberately not a full HTML parser: simple tag matching covers the
//! pages the club links to. Every failure mode (network, timeout,
//! non-text payload, no matching tags) degrades to an empty preview.

use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;

use crate::config::PreviewConfig;

lazy_static! {
    // Meta tags appear with either attribute ordering in the wild
    static ref OG_TITLE_PROP_FIRST: Regex = Regex::new(
        r#"(?i)<meta[^>]+property=["']og:title["'][^>]*content=["']([^"']+)["'][^>]*>"#
    )
    .unwrap();
    static ref OG_TITLE_CONTENT_FIRST: Regex = Regex::new(
        r#"(?i)<meta[^>]+content=["']([^"']+)["'][^>]*property=["']og:title["'][^>]*>"#
    )
    .unwrap();
    static ref OG_IMAGE_PROP_FIRST: Regex = Regex::new(
        r#"(?i)<meta[^>]+property=["']og:image["'][^>]*content=["']([^"']+)["'][^>]*>"#
    )
    .unwrap();
    static ref OG_IMAGE_CONTENT_FIRST: Regex = Regex::new(
        r#"(?i)<meta[^>]+content=["']([^"']+)["'][^>]*property=["']og:image["'][^>]*>"#
    )
    .unwrap();
    static ref TITLE_TAG: Regex = Regex::new(r"(?i)<title>([^<]+)</title>").unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPreview {
    pub title: Option<String>,
    pub image: Option<String>,
}

/// Shared HTTP client for outbound preview fetches; the timeout doubles as
/// the hard cancellation bound for slow hosts.
pub fn build_client(config: &PreviewConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
}

/// Fetch a page and extract preview metadata. Infallible by contract:
/// callers treat a missing field as "no preview available".
pub async fn fetch_preview(client: &reqwest::Client, url: &str) -> LinkPreview {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(url, error = %e, "Preview fetch failed");
            return LinkPreview::default();
        }
    };

    // Only text payloads can carry meta tags worth scraping
    let is_text = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("text/"))
        .unwrap_or(false);
    if !is_text {
        return LinkPreview::default();
    }

    match response.text().await {
        Ok(html) => extract_preview(&html),
        Err(e) => {
            tracing::debug!(url, error = %e, "Preview body read failed");
            LinkPreview::default()
        }
    }
}

/// Pull og:title/og:image out of raw HTML, falling back to `<title>`.
pub fn extract_preview(html: &str) -> LinkPreview {
    let first_capture = |re: &Regex| {
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };

    let title = first_capture(&OG_TITLE_PROP_FIRST)
        .or_else(|| first_capture(&OG_TITLE_CONTENT_FIRST))
        .or_else(|| first_capture(&TITLE_TAG));
    let image =
        first_capture(&OG_IMAGE_PROP_FIRST).or_else(|| first_capture(&OG_IMAGE_CONTENT_FIRST));

    LinkPreview { title, image }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_property_then_content() {
        let html = r#"
            <html><head>
            <meta property="og:title" content="Marathon Tips" />
            <meta property="og:image" content="https://example.com/tips.jpg" />
            <title>fallback</title>
            </head></html>
        "#;
        let preview = extract_preview(html);
        assert_eq!(preview.title.as_deref(), Some("Marathon Tips"));
        assert_eq!(preview.image.as_deref(), Some("https://example.com/tips.jpg"));
    }

    #[test]
    fn test_extract_content_then_property() {
        let html = r#"
            <meta content="Marathon Tips" property="og:title">
            <meta content="https://example.com/tips.jpg" property="og:image">
        "#;
        let preview = extract_preview(html);
        assert_eq!(preview.title.as_deref(), Some("Marathon Tips"));
        assert_eq!(preview.image.as_deref(), Some("https://example.com/tips.jpg"));
    }

    #[test]
    fn test_extract_title_tag_fallback() {
        let html = "<html><head><title>Plain Page</title></head><body></body></html>";
        let preview = extract_preview(html);
        assert_eq!(preview.title.as_deref(), Some("Plain Page"));
        assert_eq!(preview.image, None);
    }

    #[test]
    fn test_extract_single_quotes_and_extra_attrs() {
        let html = r#"<meta data-x='1' property='og:title' id='t' content='Quoted Title'>"#;
        let preview = extract_preview(html);
        assert_eq!(preview.title.as_deref(), Some("Quoted Title"));
    }

    #[test]
    fn test_extract_nothing() {
        assert_eq!(extract_preview("<p>no metadata here</p>"), LinkPreview::default());
        assert_eq!(extract_preview(""), LinkPreview::default());
    }

    #[tokio::test]
    async fn test_fetch_preview_unreachable_host_is_empty() {
        let client = build_client(&PreviewConfig {
            timeout_secs: 1,
            user_agent: "test".to_string(),
        })
        .unwrap();
        // Reserved TLD guarantees resolution failure
        let preview = fetch_preview(&client, "http://runtosip.invalid/post").await;
        assert_eq!(preview, LinkPreview::default());
    }
}
