//! Validation of attacker-controlled image URLs and filenames.
//!
//! Image URLs come straight out of chat transcripts, so they are checked
//! before anything is fetched: only `http`/`https`, and never a host that is
//! a loopback, private, link-local or multicast address literal.

use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use url::{Host, Url};

use crate::constants::MAX_FILENAME_LEN;

/// Extensions accepted as-is on uploaded images.
const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "avif", "svg"];

/// Why an image URL was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlRejection {
    #[error("not a valid URL: {0}")]
    Invalid(String),
    #[error("scheme '{0}' is not allowed")]
    Scheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("host '{0}' is not publicly routable")]
    NonPublicHost(String),
}

/// Parse and validate an image URL before fetching it.
///
/// # Errors
///
/// Returns a [`UrlRejection`] for anything other than an http(s) URL whose
/// host is a domain name or a public IP literal.
pub fn validate_image_url(raw: &str) -> Result<Url, UrlRejection> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlRejection::Invalid(e.to_string()))?;
    check_url(&url)?;
    Ok(url)
}

/// Validate an already parsed URL (used again for every redirect hop).
///
/// # Errors
///
/// Same as [`validate_image_url`].
pub fn check_url(url: &Url) -> Result<(), UrlRejection> {
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlRejection::Scheme(other.to_string())),
    }

    match url.host() {
        None => Err(UrlRejection::MissingHost),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            if domain.is_empty() || domain == "localhost" || domain.ends_with(".localhost") {
                Err(UrlRejection::NonPublicHost(domain))
            } else {
                Ok(())
            }
        }
        Some(Host::Ipv4(ip)) => {
            if is_non_public_ipv4(ip) {
                Err(UrlRejection::NonPublicHost(ip.to_string()))
            } else {
                Ok(())
            }
        }
        Some(Host::Ipv6(ip)) => {
            if is_non_public_ipv6(ip) {
                Err(UrlRejection::NonPublicHost(ip.to_string()))
            } else {
                Ok(())
            }
        }
    }
}

fn is_non_public_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // "this network" 0.0.0.0/8
        || a == 0
        // shared address space 100.64.0.0/10
        || (a == 100 && (64..=127).contains(&b))
}

fn is_non_public_ipv6(ip: Ipv6Addr) -> bool {
    // Mapped ::ffff:a.b.c.d and compatible ::a.b.c.d
    if let Some(v4) = ip.to_ipv4() {
        return is_non_public_ipv4(v4);
    }
    if let Some(v4) = nat64_embedded(ip) {
        return is_non_public_ipv4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // unique local fc00::/7
        || (first & 0xfe00) == 0xfc00
        // link-local fe80::/10
        || (first & 0xffc0) == 0xfe80
}

/// IPv4 address carried in the well-known NAT64 prefix 64:ff9b::/96.
fn nat64_embedded(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    let octets = ip.octets();
    if octets[..12] == [0, 0x64, 0xff, 0x9b, 0, 0, 0, 0, 0, 0, 0, 0] {
        Some(Ipv4Addr::new(octets[12], octets[13], octets[14], octets[15]))
    } else {
        None
    }
}

/// Sanitize a filename taken from an image URL for the media upload.
///
/// This function:
/// - Keeps only the last path component
/// - Drops NUL bytes and `..` sequences
/// - Replaces anything but ASCII alphanumerics, `.`, `_` and `-` with `_`
/// - Forces a `.jpg` extension when no image extension is present
/// - Limits length to 200 characters, keeping the extension
///
/// # Examples
///
/// ```
/// # use wp_blog_poster::wordpress::sanitize_filename;
/// assert_eq!(sanitize_filename("../../etc/passwd"), "passwd.jpg");
/// assert_eq!(sanitize_filename("My Photo.PNG"), "My_Photo.PNG");
/// ```
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    let last = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .replace('\0', "");

    let mut cleaned: String = last
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() => c,
            '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();

    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }

    // Collapse underscore runs and trim edges
    let cleaned = cleaned
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_' || c == '-');

    let (stem, ext) = match cleaned.rsplit_once('.') {
        Some((stem, ext)) if IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
            (stem.trim_end_matches('.').to_string(), ext.to_string())
        }
        _ => (cleaned.to_string(), "jpg".to_string()),
    };
    let stem = if stem.is_empty() { "image".to_string() } else { stem };

    let max_stem = MAX_FILENAME_LEN.saturating_sub(ext.len() + 1);
    let stem = if stem.len() > max_stem {
        // ASCII only at this point, so byte slicing is safe
        &stem[..max_stem]
    } else {
        &stem
    };

    format!("{stem}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_public_literals() {
        for url in [
            "http://127.0.0.1/a.png",
            "http://10.0.0.5/a.png",
            "http://192.168.1.1/a.png",
            "http://172.16.3.4/a.png",
            "http://169.254.1.1/latest/meta-data",
            "http://224.0.0.1/a.png",
            "http://0.0.0.0/a.png",
            "http://100.64.0.1/a.png",
            "http://[::1]/a.png",
            "http://[fd00::1]/a.png",
            "http://[fe80::1]/a.png",
            "http://[ff02::1]/a.png",
            "http://[::ffff:127.0.0.1]/a.png",
            "http://[::127.0.0.1]/a.png",
            "http://[::10.0.0.1]/a.png",
            "http://[64:ff9b::127.0.0.1]/a.png",
            "http://[64:ff9b::a9fe:a9fe]/a.png",
            "http://localhost/a.png",
            "http://foo.localhost/a.png",
        ] {
            assert!(
                matches!(validate_image_url(url), Err(UrlRejection::NonPublicHost(_))),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_decimal_and_hex_loopback_forms() {
        // The URL parser normalizes these to 127.0.0.1
        assert!(validate_image_url("http://2130706433/a.png").is_err());
        assert!(validate_image_url("http://0x7f.0.0.1/a.png").is_err());
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            validate_image_url("file:///etc/passwd"),
            Err(UrlRejection::Scheme(_))
        ));
        assert!(matches!(
            validate_image_url("ftp://example.com/a.png"),
            Err(UrlRejection::Scheme(_))
        ));
        assert!(matches!(
            validate_image_url("not a url"),
            Err(UrlRejection::Invalid(_))
        ));
    }

    #[test]
    fn test_accepts_public_urls() {
        assert!(validate_image_url("https://images.example.com/cat.png").is_ok());
        assert!(validate_image_url("https://93.184.216.34/cat.png").is_ok());
        assert!(validate_image_url("http://[2606:4700::1111]/cat.png").is_ok());
        assert!(validate_image_url("http://[64:ff9b::5db8:d822]/cat.png").is_ok());
    }

    #[test]
    fn test_sanitize_traversal() {
        let name = sanitize_filename("../../etc/passwd");
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
        assert_eq!(name, "passwd.jpg");
    }

    #[test]
    fn test_sanitize_windows_path_and_nul() {
        assert_eq!(sanitize_filename("C:\\temp\\evil\0.png"), "evil.png");
    }

    #[test]
    fn test_sanitize_special_chars() {
        assert_eq!(sanitize_filename("photo (1) #final.webp"), "photo_1_final.webp");
        assert_eq!(sanitize_filename("a..b.png"), "a.b.png");
    }

    #[test]
    fn test_sanitize_forces_jpg() {
        assert_eq!(sanitize_filename("download"), "download.jpg");
        assert_eq!(sanitize_filename("script.php"), "script.php.jpg");
        assert_eq!(sanitize_filename(""), "image.jpg");
        assert_eq!(sanitize_filename("..."), "image.jpg");
    }

    #[test]
    fn test_sanitize_length_cap_keeps_extension() {
        let long = format!("{}.png", "a".repeat(500));
        let name = sanitize_filename(&long);
        assert_eq!(name.len(), MAX_FILENAME_LEN);
        assert!(name.ends_with(".png"));
    }
}
