//! Message handling: the operations behind `TEST_CONNECTION` and
//! `CREATE_POST`.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::constants::DEFAULT_TITLE;
use crate::date::normalize_date;
use crate::feedback::{describe, Locale};
use crate::messages::{
    parse_message, ConnectionInfo, CreatePostRequest, PublishedPost, Request, Response,
    TestConnectionRequest,
};
use crate::settings::{SettingsStore, StoredSettings};
use crate::wordpress::{
    site_origin, ApiError, ClientOptions, Credentials, ErrorCode, NewPost, PostStatus, TermKind,
    WordPressClient,
};

/// Handles decoded requests against the persisted settings.
///
/// Settings are read at the start of each operation and written at most once,
/// at the end.
pub struct Publisher {
    store: Arc<dyn SettingsStore>,
    options: ClientOptions,
    locale: Locale,
    process_images: bool,
}

impl Publisher {
    pub fn new(store: Arc<dyn SettingsStore>, options: ClientOptions) -> Self {
        Self {
            store,
            options,
            locale: Locale::default(),
            process_images: true,
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn SettingsStore>) -> Self {
        Self::new(store, ClientOptions::from_config(config))
            .with_locale(config.locale)
            .with_image_processing(config.process_images)
    }

    #[must_use]
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    #[must_use]
    pub fn with_image_processing(mut self, enabled: bool) -> Self {
        self.process_images = enabled;
        self
    }

    /// Decode and handle a raw message.
    pub async fn handle_value(&self, message: Value) -> Response {
        match parse_message(message) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!(code = %e.code, message = %e.message, "Rejected message");
                self.failure(&e)
            }
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        let kind = request.kind();
        let result = match request {
            Request::TestConnection(data) => self.test_connection(data).await.map(Response::ok),
            Request::CreatePost(data) => self.create_post(data).await.map(Response::ok),
        };
        result.unwrap_or_else(|e| {
            warn!(kind, status = e.status, code = %e.code, message = %e.message, "Request failed");
            self.failure(&e)
        })
    }

    fn failure(&self, error: &ApiError) -> Response {
        Response::failure(describe(error, self.locale))
    }

    async fn load_settings(&self) -> Result<StoredSettings, ApiError> {
        self.store
            .load()
            .await
            .map_err(|e| ApiError::new(0, ErrorCode::StorageError.as_str(), e.to_string()))
    }

    async fn save_settings(&self, settings: &StoredSettings) {
        // The remote operation already happened; a failed save must not turn
        // it into an error the caller would retry.
        if let Err(e) = self.store.save(settings).await {
            warn!(error = %e, "Failed to persist settings");
        }
    }

    fn client(&self, credentials: Credentials) -> Result<WordPressClient, ApiError> {
        WordPressClient::new(credentials, self.options.clone()).map_err(|e| {
            ApiError::new(
                0,
                ErrorCode::InvalidRequest.as_str(),
                format!("Failed to create HTTP client: {e}"),
            )
        })
    }

    /// Verify credentials with `GET /users/me`.
    ///
    /// The credentials come from the request, not from storage. A transport
    /// switch or a newly granted consent is still persisted.
    #[instrument(skip_all, fields(site = %data.wp_url))]
    async fn test_connection(&self, data: TestConnectionRequest) -> Result<ConnectionInfo, ApiError> {
        let mut settings = self.load_settings().await?;

        let origin = site_origin(&data.wp_url);
        let transport = data
            .token_transport
            .unwrap_or_else(|| settings.transport_for(origin.as_deref()));
        let consented = data
            .query_fallback_consented
            .unwrap_or(settings.query_fallback_consented);

        let credentials = Credentials::new(
            &data.wp_url,
            data.wp_user.as_deref(),
            data.wp_password.as_deref(),
            data.wp_token.as_deref(),
        )
        .with_transport(transport)
        .with_query_fallback_consent(consented);
        let client = self.client(credentials)?;

        let result = client.current_user().await;

        let mut dirty = false;
        if consented && !settings.query_fallback_consented {
            settings.query_fallback_consented = true;
            dirty = true;
        }
        if client.transport_switched() {
            settings.remember_query_transport(client.origin());
            dirty = true;
        }
        if dirty {
            self.save_settings(&settings).await;
        }

        let user = result?;
        let name = [user.name.as_str(), user.slug.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(String::from)
            .or_else(|| data.wp_user.clone())
            .unwrap_or_default();
        info!(user = %name, transport = client.token_transport().as_str(), "Connection test succeeded");
        Ok(ConnectionInfo { user: name })
    }

    /// Publish a post with the stored credentials.
    ///
    /// Order: categories, tags, images, post. Term and image failures are
    /// skipped; only the post creation itself can fail the request.
    #[instrument(skip_all, fields(title = %data.title))]
    async fn create_post(&self, data: CreatePostRequest) -> Result<PublishedPost, ApiError> {
        let mut settings = self.load_settings().await?;
        if !settings.is_configured() {
            return Err(ApiError::new(
                0,
                ErrorCode::NotConfigured.as_str(),
                "Site URL and credentials are not configured",
            ));
        }

        let date = data.date.as_deref().and_then(normalize_date);
        if data.status == PostStatus::Future && date.is_none() {
            return Err(ApiError::new(
                0,
                ErrorCode::ScheduleDateRequired.as_str(),
                "A scheduled post needs a valid publish date",
            ));
        }

        let client = self.client(settings.credentials())?;
        let create_terms = settings.auto_create_terms;

        let categories = client
            .resolve_term_ids(TermKind::Category, &data.categories, create_terms)
            .await;
        let tags = client
            .resolve_term_ids(TermKind::Tag, &data.tags, create_terms)
            .await;

        let (content, featured_media) = if self.process_images && !data.content.is_empty() {
            let processed = client.process_images(&data.content).await;
            (processed.content, processed.featured_media_id)
        } else {
            (data.content, None)
        };

        let title = data.title.trim();
        let post = NewPost {
            title: (if title.is_empty() { DEFAULT_TITLE } else { title }).to_string(),
            content,
            status: data.status,
            categories,
            tags,
            slug: non_blank(data.slug),
            date,
            excerpt: non_blank(data.excerpt),
            featured_media,
        };

        let result = client.create_post(&post).await;

        let mut dirty = false;
        if client.transport_switched() {
            settings.remember_query_transport(client.origin());
            dirty = true;
        }
        if result.is_ok() {
            let used: Vec<String> = data
                .tags
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
            if !used.is_empty() {
                settings
                    .last_used_tags
                    .insert(client.site_url().to_string(), used);
                dirty = true;
            }
        }
        if dirty {
            self.save_settings(&settings).await;
        }

        let created = result?;
        Ok(PublishedPost {
            id: created.id,
            edit_url: format!(
                "{}/wp-admin/post.php?post={}&action=edit",
                client.site_url(),
                created.id
            ),
            status: created.status,
            link: created.link,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryStore;
    use serde_json::json;

    fn publisher(settings: StoredSettings) -> Publisher {
        Publisher::new(Arc::new(MemoryStore::new(settings)), ClientOptions::default())
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let response = publisher(StoredSettings::default())
            .handle_value(json!({"type": "PING", "data": {}}))
            .await;
        assert!(!response.success);
        assert_eq!(response.error.unwrap().code, "UNKNOWN_ACTION");
    }

    #[tokio::test]
    async fn test_create_post_requires_configuration() {
        let response = publisher(StoredSettings::default())
            .handle(Request::CreatePost(CreatePostRequest::default()))
            .await;
        assert_eq!(response.error.unwrap().code, "NOT_CONFIGURED");
    }

    #[tokio::test]
    async fn test_future_post_without_date_rejected_before_network() {
        let settings = StoredSettings {
            // Unroutable; the request must fail before any call is made.
            wp_url: "https://blog.invalid".into(),
            wp_token: Some("tok".into()),
            ..StoredSettings::default()
        };
        let response = publisher(settings)
            .handle(Request::CreatePost(CreatePostRequest {
                title: "Later".into(),
                status: PostStatus::Future,
                date: Some("whenever".into()),
                ..CreatePostRequest::default()
            }))
            .await;
        assert_eq!(response.error.unwrap().code, "SCHEDULE_DATE_REQUIRED");
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" slug ".into())), Some("slug".into()));
        assert_eq!(non_blank(None), None);
    }
}
