//! User-facing error messages.
//!
//! Turns an [`ApiError`] into the `{code, message, hints}` body sent back to
//! the caller. Transport-level statuses get a fixed, localized explanation;
//! anything else keeps the server's own message.

use serde::{Deserialize, Serialize};

use crate::messages::ErrorBody;
use crate::wordpress::{ApiError, ErrorCode};

/// Language for messages and hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ja,
}

impl Locale {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "en" | "en-us" | "en-gb" | "english" => Some(Self::En),
            "ja" | "ja-jp" | "japanese" => Some(Self::Ja),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ja => "ja",
        }
    }
}

/// Map an error to the body returned to the caller.
#[must_use]
pub fn describe(error: &ApiError, locale: Locale) -> ErrorBody {
    let code = classify(error);
    let message = match code {
        ErrorCode::Auth401
        | ErrorCode::Auth403
        | ErrorCode::NotFound404
        | ErrorCode::Server500
        | ErrorCode::NetworkError
        | ErrorCode::NeedsQueryFallbackConsent
        | ErrorCode::NotConfigured
        | ErrorCode::UnknownAction => fixed_message(code, locale).to_string(),
        _ if error.message.is_empty() => fixed_message(ErrorCode::Unknown, locale).to_string(),
        _ => error.message.clone(),
    };

    let code_str = match code {
        // Keep codes we do not know (server codes, HTTP_ERROR) verbatim.
        ErrorCode::Unknown if !error.code.is_empty() => error.code.clone(),
        known => known.as_str().to_string(),
    };

    ErrorBody {
        code: code_str,
        message,
        hints: hints(code, locale).iter().map(|h| (*h).to_string()).collect(),
    }
}

/// Status-based codes win over the server's code, except for our own
/// consent signal which must survive whatever status it came with.
fn classify(error: &ApiError) -> ErrorCode {
    if error.needs_query_fallback_consent() {
        return ErrorCode::NeedsQueryFallbackConsent;
    }
    match error.status {
        401 => return ErrorCode::Auth401,
        403 => return ErrorCode::Auth403,
        404 => return ErrorCode::NotFound404,
        500..=599 => return ErrorCode::Server500,
        _ => {}
    }
    own_code(&error.code).unwrap_or(ErrorCode::Unknown)
}

fn own_code(code: &str) -> Option<ErrorCode> {
    [
        ErrorCode::NetworkError,
        ErrorCode::InvalidResponse,
        ErrorCode::NotConfigured,
        ErrorCode::ScheduleDateRequired,
        ErrorCode::UnknownAction,
        ErrorCode::InvalidRequest,
        ErrorCode::UnsupportedVersion,
        ErrorCode::StorageError,
    ]
    .into_iter()
    .find(|known| known.as_str() == code)
}

fn fixed_message(code: ErrorCode, locale: Locale) -> &'static str {
    match (code, locale) {
        (ErrorCode::Auth401, Locale::En) => "Invalid credentials (password or token)",
        (ErrorCode::Auth401, Locale::Ja) => "認証情報が間違っています（パスワード/トークン）",
        (ErrorCode::Auth403, Locale::En) => "This user is not allowed to publish posts",
        (ErrorCode::Auth403, Locale::Ja) => "このユーザーには投稿権限がありません",
        (ErrorCode::NotFound404, Locale::En) => "WordPress was not found. Check the site URL",
        (ErrorCode::NotFound404, Locale::Ja) => "WordPressが見つかりません。URLを確認してください",
        (ErrorCode::Server500, Locale::En) => "The server returned an error. Please retry later",
        (ErrorCode::Server500, Locale::Ja) => {
            "サーバーエラーが発生しました。しばらく待ってから再試行してください"
        }
        (ErrorCode::NetworkError, Locale::En) => "Check your network connection",
        (ErrorCode::NetworkError, Locale::Ja) => "ネットワーク接続を確認してください",
        (ErrorCode::NeedsQueryFallbackConsent, Locale::En) => {
            "The token header was blocked. Sending the token as a URL parameter requires your consent"
        }
        (ErrorCode::NeedsQueryFallbackConsent, Locale::Ja) => {
            "トークンヘッダーがブロックされました。URLパラメータでトークンを送信するには同意が必要です"
        }
        (ErrorCode::NotConfigured, Locale::En) => "Setup is not complete",
        (ErrorCode::NotConfigured, Locale::Ja) => "設定が完了していません",
        (ErrorCode::UnknownAction, Locale::En) => "Unknown action",
        (ErrorCode::UnknownAction, Locale::Ja) => "不明なアクション",
        (_, Locale::En) => "An error occurred",
        (_, Locale::Ja) => "エラーが発生しました",
    }
}

fn hints(code: ErrorCode, locale: Locale) -> &'static [&'static str] {
    match (code, locale) {
        (ErrorCode::Auth401, Locale::En) => &[
            "Check that the user name is correct",
            "Use an application password, not your regular login password",
            "Make sure the password was copied completely, spaces included",
            "If you use a token, check that it is the right one",
            "If your host's WAF blocks the Authorization header, use the token plugin instead",
        ],
        (ErrorCode::Auth401, Locale::Ja) => &[
            "ユーザー名が正しいか確認してください",
            "アプリケーションパスワード（通常のログインパスワードではなく）を使用しているか確認してください",
            "パスワードをスペースを含めて正しくコピーしているか確認してください",
            "トークンを使っている場合は正しいトークンか確認してください",
            "レンタルサーバーのWAF等でAuthorizationがブロックされる場合は、トークンプラグイン方式（推奨）を使ってください",
        ],
        (ErrorCode::Auth403, Locale::En) => &[
            "Check that this user can publish posts",
            "Ask the WordPress administrator to check the user's role",
        ],
        (ErrorCode::Auth403, Locale::Ja) => &[
            "このユーザーに投稿権限があるか確認してください",
            "WordPress管理者に権限を確認してください",
        ],
        (ErrorCode::NotFound404, Locale::En) => &[
            "Check that the URL is correct",
            "Check that the WordPress REST API is enabled",
            "Check that no security plugin blocks the API",
        ],
        (ErrorCode::NotFound404, Locale::Ja) => &[
            "URLが正しいか確認してください",
            "WordPressのREST APIが有効か確認してください",
            "セキュリティプラグインがAPIをブロックしていないか確認してください",
        ],
        (ErrorCode::NetworkError, Locale::En) => &[
            "Check your internet connection",
            "Check that the site loads in a browser",
        ],
        (ErrorCode::NetworkError, Locale::Ja) => &[
            "インターネット接続を確認してください",
            "サイトが正常に表示できるか確認してください",
        ],
        (ErrorCode::NeedsQueryFallbackConsent, Locale::En) => &[
            "A URL parameter may be written to server and proxy access logs",
            "Allow the query-parameter fallback only if you accept that risk",
        ],
        (ErrorCode::NeedsQueryFallbackConsent, Locale::Ja) => &[
            "URLパラメータはサーバーやプロキシのアクセスログに残る可能性があります",
            "そのリスクを許容できる場合のみフォールバックを許可してください",
        ],
        (ErrorCode::ScheduleDateRequired, Locale::En) => {
            &["Set a publish date to schedule the post"]
        }
        (ErrorCode::ScheduleDateRequired, Locale::Ja) => &["予約投稿には公開日時を指定してください"],
        (ErrorCode::NotConfigured, Locale::En) => {
            &["Run the configure step with a site URL and credentials"]
        }
        (ErrorCode::NotConfigured, Locale::Ja) => &["サイトURLと認証情報を設定してください"],
        (ErrorCode::Server500 | ErrorCode::UnknownAction | ErrorCode::UnsupportedVersion, _) => &[],
        (_, Locale::En) => &["Check your settings"],
        (_, Locale::Ja) => &["設定内容を確認してください"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wordpress::error::WP_NOT_LOGGED_IN;

    #[test]
    fn test_status_codes_map_to_fixed_codes() {
        let body = describe(&ApiError::new(401, WP_NOT_LOGGED_IN, "nope"), Locale::En);
        assert_eq!(body.code, "AUTH_401");
        assert_eq!(body.hints.len(), 5);

        assert_eq!(describe(&ApiError::new(403, "rest_cannot_create", "x"), Locale::En).code, "AUTH_403");
        assert_eq!(describe(&ApiError::new(404, "rest_no_route", "x"), Locale::En).code, "NOT_FOUND_404");
        assert_eq!(describe(&ApiError::new(502, "HTTP_ERROR", "x"), Locale::En).code, "SERVER_500");
    }

    #[test]
    fn test_network_error_localized() {
        let body = describe(&ApiError::network("connection refused"), Locale::Ja);
        assert_eq!(body.code, "NETWORK_ERROR");
        assert_eq!(body.message, "ネットワーク接続を確認してください");
        assert_eq!(body.hints.len(), 2);
    }

    #[test]
    fn test_consent_signal_survives_status() {
        let err = ApiError::new(403, ErrorCode::NeedsQueryFallbackConsent.as_str(), "blocked");
        let body = describe(&err, Locale::En);
        assert_eq!(body.code, "NEEDS_QUERY_FALLBACK_CONSENT");
        assert!(!body.hints.is_empty());
    }

    #[test]
    fn test_unknown_codes_keep_server_message() {
        let body = describe(&ApiError::new(400, "rest_invalid_param", "Invalid parameter(s): status"), Locale::En);
        assert_eq!(body.code, "rest_invalid_param");
        assert_eq!(body.message, "Invalid parameter(s): status");
        assert_eq!(body.hints, vec!["Check your settings".to_string()]);
    }

    #[test]
    fn test_own_codes_kept() {
        let err = ApiError::new(0, ErrorCode::ScheduleDateRequired.as_str(), "date required");
        let body = describe(&err, Locale::En);
        assert_eq!(body.code, "SCHEDULE_DATE_REQUIRED");
        assert_eq!(body.message, "date required");
    }

    #[test]
    fn test_locale_parse() {
        assert_eq!(Locale::parse("JA"), Some(Locale::Ja));
        assert_eq!(Locale::parse("en-US"), Some(Locale::En));
        assert_eq!(Locale::parse("fr"), None);
    }
}
