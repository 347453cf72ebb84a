use serde::Deserialize;
use thiserror::Error;

/// Error codes produced by this crate (as opposed to codes forwarded from
/// the WordPress server, which are free-form strings).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NetworkError,
    HttpError,
    InvalidResponse,
    NeedsQueryFallbackConsent,
    Auth401,
    Auth403,
    NotFound404,
    Server500,
    NotConfigured,
    ScheduleDateRequired,
    UnknownAction,
    InvalidRequest,
    UnsupportedVersion,
    StorageError,
    Unknown,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::HttpError => "HTTP_ERROR",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::NeedsQueryFallbackConsent => "NEEDS_QUERY_FALLBACK_CONSENT",
            Self::Auth401 => "AUTH_401",
            Self::Auth403 => "AUTH_403",
            Self::NotFound404 => "NOT_FOUND_404",
            Self::Server500 => "SERVER_500",
            Self::NotConfigured => "NOT_CONFIGURED",
            Self::ScheduleDateRequired => "SCHEDULE_DATE_REQUIRED",
            Self::UnknownAction => "UNKNOWN_ACTION",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::UnsupportedVersion => "UNSUPPORTED_VERSION",
            Self::StorageError => "STORAGE_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WordPress error code sent when a request carries no usable credentials.
pub const WP_NOT_LOGGED_IN: &str = "rest_not_logged_in";

/// WordPress error code for a generic forbidden response.
pub const WP_FORBIDDEN: &str = "rest_forbidden";

/// Normalized failure of a REST call: `{status, code, message}`.
///
/// `status` is 0 when no HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} (HTTP {status}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: String,
    pub message: String,
}

#[derive(Deserialize)]
struct WpErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl ApiError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// No response was received.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(0, ErrorCode::NetworkError.as_str(), message)
    }

    /// Build from a non-2xx response body, forwarding the server's
    /// `code`/`message` when the body is a WordPress JSON error.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let fallback_message = format!("HTTP Error {status}");
        match serde_json::from_str::<WpErrorBody>(body) {
            Ok(parsed) => Self::new(
                status,
                parsed
                    .code
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| ErrorCode::HttpError.as_str().to_string()),
                parsed
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or(fallback_message),
            ),
            Err(_) => Self::new(status, ErrorCode::HttpError.as_str(), fallback_message),
        }
    }

    /// The header transport was refused, either because the token header was
    /// stripped before reaching WordPress or because something in front of it
    /// rejected the request.
    #[must_use]
    pub fn is_header_auth_rejection(&self) -> bool {
        match self.status {
            0 => self.is_network(),
            401 => self.code == WP_NOT_LOGGED_IN,
            403 => self.code == ErrorCode::HttpError.as_str() || self.code == WP_FORBIDDEN,
            _ => false,
        }
    }

    #[must_use]
    pub fn needs_query_fallback_consent(&self) -> bool {
        self.code == ErrorCode::NeedsQueryFallbackConsent.as_str()
    }

    #[must_use]
    pub fn is_network(&self) -> bool {
        self.code == ErrorCode::NetworkError.as_str()
    }
}
