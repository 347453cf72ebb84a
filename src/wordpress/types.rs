use serde::{Deserialize, Serialize};

/// How the bearer token travels to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenTransport {
    /// `X-WPBP-Token` request header.
    #[default]
    Header,
    /// `wpbp_token` query parameter. Leaks into server logs; needs consent.
    Query,
}

impl TokenTransport {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Query => "query",
        }
    }
}

/// Site credentials handed to a [`WordPressClient`](super::WordPressClient).
#[derive(Clone, Default)]
pub struct Credentials {
    pub site_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub token_transport: TokenTransport,
    pub query_fallback_consented: bool,
}

impl Credentials {
    /// Build credentials, dropping blank values and stripping whitespace from
    /// the application password (WordPress displays it in groups of four).
    #[must_use]
    pub fn new(
        site_url: &str,
        username: Option<&str>,
        password: Option<&str>,
        token: Option<&str>,
    ) -> Self {
        Self {
            site_url: site_url.trim().trim_end_matches('/').to_string(),
            username: username
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            password: password
                .map(|p| p.chars().filter(|c| !c.is_whitespace()).collect::<String>())
                .filter(|s| !s.is_empty()),
            token: token.map(str::trim).filter(|s| !s.is_empty()).map(String::from),
            token_transport: TokenTransport::Header,
            query_fallback_consented: false,
        }
    }

    #[must_use]
    pub fn with_transport(mut self, transport: TokenTransport) -> Self {
        self.token_transport = transport;
        self
    }

    #[must_use]
    pub fn with_query_fallback_consent(mut self, consented: bool) -> Self {
        self.query_fallback_consented = consented;
        self
    }

    /// Whether any secret is available for authenticating.
    #[must_use]
    pub fn has_secret(&self) -> bool {
        self.token.is_some() || (self.username.is_some() && self.password.is_some())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("site_url", &self.site_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_transport", &self.token_transport)
            .field("query_fallback_consented", &self.query_fallback_consented)
            .finish()
    }
}

/// Taxonomy a term belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Category,
    Tag,
}

impl TermKind {
    /// REST collection path for this taxonomy.
    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Category => "/categories",
            Self::Tag => "/tags",
        }
    }
}

impl std::fmt::Display for TermKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Category => f.write_str("category"),
            Self::Tag => f.write_str("tag"),
        }
    }
}

/// A category or tag as returned by the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: u64,
    pub name: String,
}

/// Result of rehosting one image in the media library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub id: u64,
    pub hosted_url: String,
}

/// Media item fields we read back from `POST /media`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MediaResponse {
    pub id: u64,
    pub source_url: String,
}

/// Content after image rehosting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedContent {
    pub content: String,
    pub featured_media_id: Option<u64>,
}

/// Publication status of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Publish,
    Future,
    Pending,
    Private,
}

impl PostStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Publish => "publish",
            Self::Future => "future",
            Self::Pending => "pending",
            Self::Private => "private",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "publish" => Some(Self::Publish),
            "future" => Some(Self::Future),
            "pending" => Some(Self::Pending),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// Body of `POST /posts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_media: Option<u64>,
}

/// Post representation returned by the server. Fields beyond the ones we
/// read are kept verbatim in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedPost {
    pub id: u64,
    pub status: String,
    #[serde(default)]
    pub link: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Subset of `GET /users/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
}
