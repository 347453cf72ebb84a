//! Turning chat output into post content: draft detection, front matter,
//! title extraction, markdown rendering and HTML sanitization.

pub mod detect;
pub mod draft;
pub mod front_matter;
pub mod markdown;
pub mod sanitize;
pub mod title;

pub use detect::{
    default_rules, is_markdown_content, ContentLocator, LocatorRule, Platform, RuleError,
    SelectorLocator, TextRegion,
};
pub use draft::Draft;
pub use front_matter::{parse_front_matter, FrontMatter};
pub use markdown::markdown_to_html;
pub use sanitize::{is_dangerous_url, sanitize_html};
pub use title::{extract_title, remove_heading_matching_title};
