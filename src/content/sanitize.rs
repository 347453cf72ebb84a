//! Allow-list HTML sanitizer for rendered drafts.
//!
//! Elements outside the allow-list are unwrapped (their text survives),
//! except for tags whose content is itself dangerous, which are dropped
//! whole. Attributes are filtered per tag and URL attributes are checked
//! for script-capable schemes.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node};

/// Removed together with everything inside them.
const DROPPED_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "frame", "frameset",
    "applet",
];

const ALLOWED_TAGS: &[&str] = &[
    // structural
    "div", "span", "p", "br", "hr", "section", "article", "header", "footer", "main", "aside",
    "nav",
    // text
    "h1", "h2", "h3", "h4", "h5", "h6", "a", "strong", "b", "em", "i", "u", "s", "del", "ins",
    "mark", "small", "sub", "sup", "code", "pre", "blockquote", "q", "cite", "abbr", "kbd", "samp",
    "var",
    // lists
    "ul", "ol", "li", "dl", "dt", "dd",
    // tables
    "table", "thead", "tbody", "tfoot", "tr", "th", "td", "caption", "colgroup", "col",
    // media
    "img", "figure", "figcaption", "picture", "source", "video", "audio",
    // semantic
    "details", "summary", "time", "address", "input", "wbr", "data",
];

const VOID_TAGS: &[&str] = &["br", "hr", "img", "col", "source", "input", "wbr"];

const GLOBAL_ATTRS: &[&str] = &["class", "id", "title", "lang", "dir"];

/// Attributes holding a URL, checked with [`is_dangerous_url`].
const URL_ATTRS: &[&str] = &["href", "src", "cite", "poster"];

/// `data:` URLs allowed in attributes: plain raster images only.
static SAFE_DATA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:image/(png|jpe?g|gif|webp)[;,]").expect("Invalid data url regex")
});

fn tag_attrs(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href", "rel", "target", "name"],
        "img" => &["src", "alt", "width", "height", "loading"],
        "source" => &["src", "type", "media"],
        "video" => &["src", "poster", "controls", "width", "height", "loop", "muted"],
        "audio" => &["src", "controls", "loop", "muted"],
        "td" | "th" => &["colspan", "rowspan", "align", "scope"],
        "ol" => &["start", "type", "reversed"],
        "li" => &["value"],
        "col" | "colgroup" => &["span"],
        "time" => &["datetime"],
        "data" => &["value"],
        "blockquote" | "q" | "del" | "ins" => &["cite"],
        "details" => &["open"],
        "input" => &["type", "checked", "disabled"],
        _ => &[],
    }
}

/// Sanitize an HTML fragment.
#[must_use]
pub fn sanitize_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    write_children(fragment.root_element(), &mut out);
    out
}

/// Whether a URL attribute value must be removed.
#[must_use]
pub fn is_dangerous_url(value: &str) -> bool {
    // Browsers ignore embedded whitespace and control characters in the
    // scheme, so "java\tscript:" is still javascript.
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    if ["javascript:", "vbscript:", "file:", "ftp:"]
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
    {
        return true;
    }
    normalized.starts_with("data:") && !SAFE_DATA_URL.is_match(&normalized)
}

fn write_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => escape_text(text, out),
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    write_element(child_element, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let tag = element.value().name().to_ascii_lowercase();

    if DROPPED_TAGS.contains(&tag.as_str()) {
        return;
    }
    if !ALLOWED_TAGS.contains(&tag.as_str()) {
        write_children(element, out);
        return;
    }

    out.push('<');
    out.push_str(&tag);
    let allowed = tag_attrs(&tag);
    let opens_new_tab = tag == "a" && element.value().attr("target").is_some();
    for (name, value) in element.value().attrs() {
        let name = name.to_ascii_lowercase();
        if name.starts_with("on") || (opens_new_tab && name == "rel") {
            continue;
        }
        if !GLOBAL_ATTRS.contains(&name.as_str()) && !allowed.contains(&name.as_str()) {
            continue;
        }
        if URL_ATTRS.contains(&name.as_str()) && is_dangerous_url(value) {
            continue;
        }
        out.push(' ');
        out.push_str(&name);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }
    if opens_new_tab {
        out.push_str(" rel=\"noopener noreferrer\"");
    }
    out.push('>');

    if VOID_TAGS.contains(&tag.as_str()) {
        return;
    }
    write_children(element, out);
    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_javascript_src() {
        assert_eq!(sanitize_html(r#"<img src="javascript:alert(1)">"#), "<img>");
    }

    #[test]
    fn test_removes_script_entirely() {
        assert_eq!(sanitize_html("<script>evil()</script>"), "");
        assert_eq!(sanitize_html("<p>a<script>evil()</script>b</p>"), "<p>ab</p>");
    }

    #[test]
    fn test_unwraps_unknown_tags() {
        assert_eq!(sanitize_html("<foo>bar</foo>"), "bar");
        assert_eq!(sanitize_html("<form><b>kept</b></form>"), "<b>kept</b>");
    }

    #[test]
    fn test_drops_event_handlers_and_unknown_attrs() {
        assert_eq!(
            sanitize_html(r#"<p onclick="x()" style="color:red" class="lead">hi</p>"#),
            r#"<p class="lead">hi</p>"#
        );
    }

    #[test]
    fn test_dangerous_urls() {
        assert!(is_dangerous_url("javascript:alert(1)"));
        assert!(is_dangerous_url("  JaVa\tScRiPt:alert(1)"));
        assert!(is_dangerous_url("vbscript:msgbox"));
        assert!(is_dangerous_url("file:///etc/passwd"));
        assert!(is_dangerous_url("ftp://example.com/x"));
        assert!(is_dangerous_url("data:text/html;base64,PHNjcmlwdD4="));
        assert!(is_dangerous_url("data:image/svg+xml;base64,AAAA"));

        assert!(!is_dangerous_url("data:image/png;base64,iVBORw0KGgo="));
        assert!(!is_dangerous_url("data:image/jpeg;base64,/9j/"));
        assert!(!is_dangerous_url("https://example.com/a.png"));
        assert!(!is_dangerous_url("/relative/path"));
    }

    #[test]
    fn test_keeps_safe_structure() {
        let html = r#"<h2 id="intro">Intro</h2><ul><li><a href="https://x.example">link</a></li></ul><table><tbody><tr><td colspan="2">c</td></tr></tbody></table>"#;
        assert_eq!(sanitize_html(html), html);
    }

    #[test]
    fn test_escapes_text_and_attributes() {
        assert_eq!(
            sanitize_html(r#"<p title="a&quot;b">1 &lt; 2 &amp; 3</p>"#),
            r#"<p title="a&quot;b">1 &lt; 2 &amp; 3</p>"#
        );
    }

    #[test]
    fn test_target_blank_gets_noopener() {
        assert_eq!(
            sanitize_html(r#"<a href="https://x" target="_blank">x</a>"#),
            r#"<a href="https://x" target="_blank" rel="noopener noreferrer">x</a>"#
        );
    }

    #[test]
    fn test_drops_iframe_and_style_content() {
        assert_eq!(
            sanitize_html("<style>p{}</style><iframe src=\"https://x\">fallback</iframe><p>ok</p>"),
            "<p>ok</p>"
        );
    }
}
