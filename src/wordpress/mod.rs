//! WordPress REST API access: authenticated client, taxonomy resolution and
//! image rehosting.

pub mod client;
pub mod error;
pub mod media;
pub mod terms;
pub mod types;
pub mod url_guard;

pub use client::{site_origin, ApiRequest, ClientOptions, RequestBody, WordPressClient};
pub use error::{ApiError, ErrorCode};
pub use media::{collect_image_urls, replace_html_image_src, replace_markdown_image_url};
pub use types::{
    CreatedPost, Credentials, CurrentUser, NewPost, PostStatus, ProcessedContent, Term, TermKind,
    TokenTransport, UploadedMedia,
};
pub use url_guard::{sanitize_filename, validate_image_url, UrlRejection};
