//! Shared constants used across the application.

/// User agent string sent with every outbound request.
pub const USER_AGENT: &str = concat!("wp-blog-poster/", env!("CARGO_PKG_VERSION"));

/// Path prefix of the WordPress core REST namespace.
pub const REST_PREFIX: &str = "/wp-json/wp/v2";

/// Header carrying the bearer token in header transport mode.
pub const TOKEN_HEADER: &str = "X-WPBP-Token";

/// Query parameter carrying the bearer token in query transport mode.
pub const TOKEN_QUERY_PARAM: &str = "wpbp_token";

/// Largest image accepted for rehosting (10 MiB).
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Page size used when searching existing terms.
pub const TERM_SEARCH_PAGE_SIZE: u32 = 100;

/// Title used when a draft has neither a front-matter title nor a heading.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Maximum length of a sanitized upload filename, extension included.
pub const MAX_FILENAME_LEN: usize = 200;

/// Version of the inbound message schema understood by the worker.
pub const MESSAGE_SCHEMA_VERSION: u64 = 1;
