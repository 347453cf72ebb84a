//! Request/response schema of the publishing worker.
//!
//! Requests arrive as `{"type": ..., "data": ..., "version"?: 1}` JSON
//! objects; every reply is a [`Response`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::MESSAGE_SCHEMA_VERSION;
use crate::wordpress::{ApiError, ErrorCode, PostStatus, TokenTransport};

/// `TEST_CONNECTION` payload: credentials to try, not yet persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionRequest {
    pub wp_url: String,
    #[serde(default)]
    pub wp_user: Option<String>,
    #[serde(default)]
    pub wp_password: Option<String>,
    #[serde(default)]
    pub wp_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_transport: Option<TokenTransport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_fallback_consented: Option<bool>,
}

/// `CREATE_POST` payload. Categories and tags are names, not ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    TestConnection(TestConnectionRequest),
    CreatePost(CreatePostRequest),
}

impl Request {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TestConnection(_) => "TEST_CONNECTION",
            Self::CreatePost(_) => "CREATE_POST",
        }
    }

    /// Serialize into the wire envelope, version included.
    #[must_use]
    pub fn to_message(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert("version".to_string(), Value::from(MESSAGE_SCHEMA_VERSION));
        }
        value
    }
}

/// Decode a raw message.
///
/// # Errors
///
/// - `UNSUPPORTED_VERSION` when `version` is present and not 1
/// - `UNKNOWN_ACTION` when `type` names no known request
/// - `INVALID_REQUEST` when the envelope or the payload is malformed
pub fn parse_message(message: Value) -> Result<Request, ApiError> {
    let Value::Object(mut envelope) = message else {
        return Err(invalid("message must be a JSON object"));
    };

    if let Some(version) = envelope.get("version") {
        if version.as_u64() != Some(MESSAGE_SCHEMA_VERSION) {
            return Err(ApiError::new(
                0,
                ErrorCode::UnsupportedVersion.as_str(),
                format!("Unsupported message version: {version}"),
            ));
        }
    }

    let kind = match envelope.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        _ => return Err(invalid("missing message type")),
    };
    let data = envelope.remove("data").unwrap_or(Value::Null);

    match kind.as_str() {
        "TEST_CONNECTION" => serde_json::from_value(data)
            .map(Request::TestConnection)
            .map_err(|e| invalid(format!("invalid TEST_CONNECTION payload: {e}"))),
        "CREATE_POST" => serde_json::from_value(data)
            .map(Request::CreatePost)
            .map_err(|e| invalid(format!("invalid CREATE_POST payload: {e}"))),
        other => Err(ApiError::new(
            0,
            ErrorCode::UnknownAction.as_str(),
            format!("Unknown action: {other}"),
        )),
    }
}

fn invalid(message: impl Into<String>) -> ApiError {
    ApiError::new(0, ErrorCode::InvalidRequest.as_str(), message)
}

/// `error` member of a failed [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

/// `data` of a successful `TEST_CONNECTION`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub user: String,
}

/// `data` of a successful `CREATE_POST`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedPost {
    pub id: u64,
    pub status: String,
    pub link: String,
    pub edit_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_query_fallback_consent: bool,
}

impl Response {
    pub fn ok(data: impl Serialize) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            needs_query_fallback_consent: false,
        }
    }

    #[must_use]
    pub fn failure(error: ErrorBody) -> Self {
        let needs_consent = error.code == ErrorCode::NeedsQueryFallbackConsent.as_str();
        Self {
            success: false,
            data: None,
            error: Some(error),
            needs_query_fallback_consent: needs_consent,
        }
    }

    /// Decode `data` into a typed payload.
    #[must_use]
    pub fn data_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.data
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_test_connection() {
        let request = parse_message(json!({
            "type": "TEST_CONNECTION",
            "data": {
                "wpUrl": "https://blog.example.com",
                "wpUser": "admin",
                "wpPassword": "abcd efgh",
                "tokenTransport": "query"
            }
        }))
        .unwrap();
        let Request::TestConnection(data) = request else {
            panic!("wrong variant");
        };
        assert_eq!(data.wp_url, "https://blog.example.com");
        assert_eq!(data.wp_user.as_deref(), Some("admin"));
        assert_eq!(data.wp_token, None);
        assert_eq!(data.token_transport, Some(TokenTransport::Query));
    }

    #[test]
    fn test_parse_create_post_defaults() {
        let request = parse_message(json!({
            "type": "CREATE_POST",
            "version": 1,
            "data": {"title": "Hi", "content": "<p>x</p>", "status": "future", "date": "2030-01-01"}
        }))
        .unwrap();
        let Request::CreatePost(data) = request else {
            panic!("wrong variant");
        };
        assert_eq!(data.status, PostStatus::Future);
        assert!(data.categories.is_empty());
        assert_eq!(data.date.as_deref(), Some("2030-01-01"));
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_message(json!({"type": "DELETE_EVERYTHING", "data": {}})).unwrap_err();
        assert_eq!(err.code, "UNKNOWN_ACTION");

        let err = parse_message(json!({"type": "CREATE_POST", "data": {"status": "bogus"}})).unwrap_err();
        assert_eq!(err.code, "INVALID_REQUEST");

        let err = parse_message(json!({"data": {}})).unwrap_err();
        assert_eq!(err.code, "INVALID_REQUEST");

        let err = parse_message(json!("TEST_CONNECTION")).unwrap_err();
        assert_eq!(err.code, "INVALID_REQUEST");

        let err = parse_message(json!({"type": "CREATE_POST", "version": 2, "data": {}})).unwrap_err();
        assert_eq!(err.code, "UNSUPPORTED_VERSION");
    }

    #[test]
    fn test_request_envelope_round_trip() {
        let request = Request::CreatePost(CreatePostRequest {
            title: "T".into(),
            ..CreatePostRequest::default()
        });
        let message = request.to_message();
        assert_eq!(message["type"], "CREATE_POST");
        assert_eq!(message["version"], 1);
        assert_eq!(parse_message(message).unwrap(), request);
    }

    #[test]
    fn test_response_serialization() {
        let ok = serde_json::to_value(Response::ok(ConnectionInfo { user: "Admin".into() })).unwrap();
        assert_eq!(ok, json!({"success": true, "data": {"user": "Admin"}}));

        let failed = Response::failure(ErrorBody {
            code: "NEEDS_QUERY_FALLBACK_CONSENT".into(),
            message: "m".into(),
            hints: vec![],
        });
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["needsQueryFallbackConsent"], true);
        assert_eq!(value["error"]["code"], "NEEDS_QUERY_FALLBACK_CONSENT");
        assert!(value["error"].get("hints").is_none());
    }
}
