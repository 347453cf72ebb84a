//! Image rehosting: download images referenced by a draft, upload them to
//! the media library and point the draft at the hosted copies.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Response;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::client::{ApiRequest, WordPressClient};
use super::error::ApiError;
use super::types::{MediaResponse, ProcessedContent, UploadedMedia};
use super::url_guard::{sanitize_filename, validate_image_url, UrlRejection};

/// `![alt](url)` or `![alt](url "title")`
static MARKDOWN_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[([^\]]*)\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#).expect("Invalid markdown image regex")
});

/// `<img ... src="url" ...>` with either quote style
static HTML_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\s+[^>]*src=["']([^"']+)["'][^>]*>"#).expect("Invalid html image regex")
});

/// Same as [`HTML_IMAGE`], split around the `src` value for rewriting.
static HTML_IMAGE_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(<(?i:img)\b[^>]*\s(?i:src)=["'])([^"']+)(["'][^>]*>)"#)
        .expect("Invalid html image src regex")
});

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("Invalid img selector"));

#[derive(Debug, Error)]
enum ImageError {
    #[error("rejected URL: {0}")]
    Rejected(#[from] UrlRejection),
    #[error("image is larger than {limit} bytes ({size} bytes)")]
    TooLarge { size: u64, limit: u64 },
    #[error("not an image: {0}")]
    NotImage(String),
    #[error("download failed: {0}")]
    Fetch(String),
    #[error("download returned HTTP {0}")]
    Status(u16),
    #[error("upload failed: {0}")]
    Upload(#[from] ApiError),
}

impl WordPressClient {
    /// Download an image and upload it to the media library.
    ///
    /// Returns `None` on any failure; a broken image never fails a post.
    pub async fn upload_image(&self, url: &str, filename: &str) -> Option<UploadedMedia> {
        match self.try_upload_image(url, filename).await {
            Ok(media) => Some(media),
            Err(e) => {
                warn!(url = %url, error = %e, "Image upload skipped");
                None
            }
        }
    }

    async fn try_upload_image(&self, url: &str, filename: &str) -> Result<UploadedMedia, ImageError> {
        let source = match validate_image_url(url) {
            Ok(parsed) => parsed,
            Err(UrlRejection::NonPublicHost(_)) if self.options.allow_private_image_hosts => {
                Url::parse(url.trim()).map_err(|e| UrlRejection::Invalid(e.to_string()))?
            }
            Err(rejection) => return Err(rejection.into()),
        };
        let filename = sanitize_filename(filename);
        let limit = self.options.max_image_bytes;

        if self.options.probe_image_size {
            self.probe_image_size(&source, limit).await?;
        }

        let response = self
            .image_http
            .get(source.clone())
            .send()
            .await
            .map_err(|e| ImageError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ImageError::Status(response.status().as_u16()));
        }
        if let Some(size) = declared_length(&response) {
            if size > limit {
                return Err(ImageError::TooLarge { size, limit });
            }
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .or_else(|| mime_guess::from_path(&filename).first_raw().map(String::from))
            .unwrap_or_else(|| "image/jpeg".to_string());
        if !mime.starts_with("image/") {
            return Err(ImageError::NotImage(mime));
        }

        let bytes = read_capped(response, limit).await?;
        if bytes.is_empty() {
            return Err(ImageError::Fetch("empty body".to_string()));
        }

        debug!(url = %url, filename = %filename, mime = %mime, size = bytes.len(), "Uploading image");
        let media: MediaResponse = self
            .request(ApiRequest::post_file("/media", bytes, filename, mime))
            .await?;

        info!(url = %url, media_id = media.id, hosted = %media.source_url, "Image rehosted");
        Ok(UploadedMedia {
            id: media.id,
            hosted_url: media.source_url,
        })
    }

    /// Best-effort size check. Only a declared size over the limit rejects;
    /// a failed HEAD falls through to the download, where the limit is
    /// enforced on the actual bytes.
    async fn probe_image_size(&self, source: &Url, limit: u64) -> Result<(), ImageError> {
        match self.image_http.head(source.clone()).send().await {
            Ok(response) if response.status().is_success() => match declared_length(&response) {
                Some(size) if size > limit => Err(ImageError::TooLarge { size, limit }),
                _ => Ok(()),
            },
            Ok(response) => {
                debug!(url = %source, status = %response.status(), "HEAD probe not successful, continuing");
                Ok(())
            }
            Err(e) => {
                debug!(url = %source, error = %e, "HEAD probe failed, continuing");
                Ok(())
            }
        }
    }

    /// Rehost every image referenced in `content`.
    ///
    /// Each distinct URL is uploaded once, in order of first appearance, and
    /// all of its markdown and `<img>` occurrences are rewritten in place. The
    /// first successful upload becomes the featured image candidate.
    pub async fn process_images(&self, content: &str) -> ProcessedContent {
        let mut processed = content.to_string();
        let mut featured_media_id = None;

        for url in collect_image_urls(content) {
            let filename = filename_from_url(&url);
            if let Some(uploaded) = self.upload_image(&url, &filename).await {
                processed = replace_markdown_image_url(&processed, &url, &uploaded.hosted_url);
                processed = replace_html_image_src(&processed, &url, &uploaded.hosted_url);
                if featured_media_id.is_none() {
                    featured_media_id = Some(uploaded.id);
                }
            }
        }

        ProcessedContent {
            content: processed,
            featured_media_id,
        }
    }
}

fn declared_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

async fn read_capped(mut response: Response, limit: u64) -> Result<Vec<u8>, ImageError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ImageError::Fetch(e.to_string()))?
    {
        append_capped(&mut bytes, &chunk, limit)?;
    }
    Ok(bytes)
}

/// The declared length can be missing or wrong, so the cap is checked
/// against what was actually received.
fn append_capped(bytes: &mut Vec<u8>, chunk: &[u8], limit: u64) -> Result<(), ImageError> {
    let size = (bytes.len() + chunk.len()) as u64;
    if size > limit {
        return Err(ImageError::TooLarge { size, limit });
    }
    bytes.extend_from_slice(chunk);
    Ok(())
}

/// Resolve character references in an `<img src>` value as a browser would.
fn decode_src(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    // The captured value never contains a quote character
    let fragment = Html::parse_fragment(&format!("<img src=\"{raw}\">"));
    fragment
        .select(&IMG)
        .find_map(|img| img.value().attr("src").map(String::from))
        .unwrap_or_else(|| raw.to_string())
}

/// Absolute http(s) image URLs in order of first appearance, deduplicated.
///
/// `<img src>` values are returned with character references decoded, so
/// `?w=1&amp;h=2` in rendered HTML yields the fetchable `?w=1&h=2`.
#[must_use]
pub fn collect_image_urls(content: &str) -> Vec<String> {
    let markdown = MARKDOWN_IMAGE
        .captures_iter(content)
        .filter_map(|caps| caps.get(2))
        .map(|m| (m.start(), m.as_str().to_string()));
    let html = HTML_IMAGE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| (m.start(), decode_src(m.as_str())));

    let mut found: Vec<(usize, String)> = markdown
        .chain(html)
        .filter(|(_, url)| url.starts_with("http://") || url.starts_with("https://"))
        .collect();
    found.sort_by_key(|(pos, _)| *pos);

    let mut urls: Vec<String> = Vec::new();
    for (_, url) in found {
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Upload filename derived from the last path segment of an image URL.
#[must_use]
pub fn filename_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(String::from))
        })
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(&segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or(segment)
        })
        .unwrap_or_else(|| "image.jpg".to_string())
}

/// Point every `![alt](url)` for `url` at `new_url`, keeping alt and title.
#[must_use]
pub fn replace_markdown_image_url(content: &str, url: &str, new_url: &str) -> String {
    let pattern = format!(r#"(!\[[^\]]*\]\(){}(\s+"[^"]*")?(\))"#, regex::escape(url));
    let Ok(re) = Regex::new(&pattern) else {
        warn!(url = %url, "Could not build markdown image pattern");
        return content.to_string();
    };
    re.replace_all(content, |caps: &Captures| {
        format!(
            "{}{}{}{}",
            &caps[1],
            new_url,
            caps.get(2).map_or("", |m| m.as_str()),
            &caps[3]
        )
    })
    .into_owned()
}

/// Point every `<img src>` whose decoded value is `url` at `new_url`,
/// keeping quotes and other attributes.
#[must_use]
pub fn replace_html_image_src(content: &str, url: &str, new_url: &str) -> String {
    HTML_IMAGE_SRC
        .replace_all(content, |caps: &Captures| {
            if decode_src(&caps[2]) == url {
                format!("{}{}{}", &caps[1], new_url.replace('&', "&amp;"), &caps[3])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = "![a](http://x/1.jpg) <img src='http://x/1.jpg'>";

    #[test]
    fn test_collect_dedupes_across_syntax_forms() {
        assert_eq!(collect_image_urls(MIXED), vec!["http://x/1.jpg".to_string()]);
    }

    #[test]
    fn test_collect_uses_document_order() {
        let content = r#"<img src="https://a.example/first.png"> then ![b](https://b.example/second.png "t") and ![c](/relative.png)"#;
        assert_eq!(
            collect_image_urls(content),
            vec![
                "https://a.example/first.png".to_string(),
                "https://b.example/second.png".to_string()
            ]
        );
    }

    #[test]
    fn test_rewrite_preserves_syntax_forms() {
        let out = replace_markdown_image_url(MIXED, "http://x/1.jpg", "https://blog/wp/1.jpg");
        let out = replace_html_image_src(&out, "http://x/1.jpg", "https://blog/wp/1.jpg");
        assert_eq!(
            out,
            "![a](https://blog/wp/1.jpg) <img src='https://blog/wp/1.jpg'>"
        );
    }

    #[test]
    fn test_rewrite_keeps_markdown_title() {
        let out = replace_markdown_image_url(
            r#"![cat](https://x/c.png "A cat")"#,
            "https://x/c.png",
            "https://h/$1.png",
        );
        assert_eq!(out, r#"![cat](https://h/$1.png "A cat")"#);
    }

    #[test]
    fn test_rewrite_html_keeps_other_attributes() {
        let out = replace_html_image_src(
            r#"<IMG alt="x" SRC="https://x/c.png" width="10">"#,
            "https://x/c.png",
            "https://h/c.png",
        );
        assert_eq!(out, r#"<IMG alt="x" SRC="https://h/c.png" width="10">"#);
    }

    #[test]
    fn test_rewrite_ignores_prefix_matches() {
        let out = replace_markdown_image_url(
            "![a](https://x/c.png.bak)",
            "https://x/c.png",
            "https://h/c.png",
        );
        assert_eq!(out, "![a](https://x/c.png.bak)");
    }

    #[test]
    fn test_html_src_references_are_decoded() {
        let content = r#"<p><img src="https://x/a.png?w=1&amp;h=2" alt="a"> <img src='https://x/b.png?q=&#49;'></p>"#;
        assert_eq!(
            collect_image_urls(content),
            vec![
                "https://x/a.png?w=1&h=2".to_string(),
                "https://x/b.png?q=1".to_string()
            ]
        );

        let out = replace_html_image_src(content, "https://x/a.png?w=1&h=2", "https://h/a.png?v=1&s=2");
        assert_eq!(
            out,
            r#"<p><img src="https://h/a.png?v=1&amp;s=2" alt="a"> <img src='https://x/b.png?q=&#49;'></p>"#
        );
    }

    #[test]
    fn test_cap_applies_to_received_bytes() {
        let mut bytes = Vec::new();
        append_capped(&mut bytes, b"abcd", 8).expect("under cap");
        append_capped(&mut bytes, b"efgh", 8).expect("at cap");
        assert!(matches!(
            append_capped(&mut bytes, b"i", 8),
            Err(ImageError::TooLarge { size: 9, limit: 8 })
        ));
        assert_eq!(bytes, b"abcdefgh");
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("https://x/a/b/My%20Cat.png?w=10"), "My Cat.png");
        assert_eq!(filename_from_url("https://x/"), "image.jpg");
        assert_eq!(filename_from_url("nonsense"), "image.jpg");
    }
}
