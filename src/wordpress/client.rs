use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::error::{ApiError, ErrorCode};
use super::types::{CreatedPost, Credentials, CurrentUser, NewPost, TokenTransport};
use super::url_guard::{check_url, UrlRejection};
use crate::config::Config;
use crate::constants::{MAX_IMAGE_BYTES, REST_PREFIX, TOKEN_HEADER, TOKEN_QUERY_PARAM, USER_AGENT};

/// Redirect hops followed when downloading an image.
const MAX_IMAGE_REDIRECTS: usize = 5;

/// Tunables for a [`WordPressClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub max_image_bytes: u64,
    /// Send a HEAD request before downloading an image to reject oversized
    /// files early.
    pub probe_image_size: bool,
    /// Skip the non-public host check for image URLs. Only for tests and
    /// intranet setups.
    pub allow_private_image_hosts: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_image_bytes: MAX_IMAGE_BYTES,
            probe_image_size: true,
            allow_private_image_hosts: false,
        }
    }
}

impl ClientOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.http_timeout,
            max_image_bytes: config.max_image_bytes,
            probe_image_size: config.image_size_probe,
            allow_private_image_hosts: config.allow_private_image_hosts,
        }
    }
}

/// Request payload. Kept as data so a fallback retry can rebuild it.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    File {
        bytes: Vec<u8>,
        filename: String,
        mime: String,
    },
}

/// One REST call relative to `/wp-json/wp/v2`.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    #[must_use]
    pub fn get(path: &str) -> Self {
        Self {
            method: Method::GET,
            path: path.to_string(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    #[must_use]
    pub fn post_json(path: &str, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.to_string(),
            query: Vec::new(),
            body: RequestBody::Json(body),
        }
    }

    #[must_use]
    pub fn post_file(path: &str, bytes: Vec<u8>, filename: String, mime: String) -> Self {
        Self {
            method: Method::POST,
            path: path.to_string(),
            query: Vec::new(),
            body: RequestBody::File {
                bytes,
                filename,
                mime,
            },
        }
    }

    #[must_use]
    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

/// Authenticated WordPress REST client with header → query token fallback.
///
/// The transport starts from the value remembered in the credentials. When a
/// header-mode call is rejected in a way that suggests the token header was
/// stripped (see [`ApiError::is_header_auth_rejection`]) the client retries
/// once with the token in the query string, but only if the user consented.
/// After a successful fallback the client stays in query mode and
/// [`transport_switched`](Self::transport_switched) reports it so the caller
/// can persist the preference for this origin.
pub struct WordPressClient {
    pub(super) http: Client,
    pub(super) image_http: Client,
    pub(super) options: ClientOptions,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    token: Option<String>,
    query_fallback_consented: bool,
    use_query: AtomicBool,
    switched: AtomicBool,
}

impl WordPressClient {
    /// Create a client for one site.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP clients cannot be built.
    pub fn new(credentials: Credentials, options: ClientOptions) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(options.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let allow_private = options.allow_private_image_hosts;
        let redirect_policy = reqwest::redirect::Policy::custom(move |attempt| {
            match check_redirect(attempt.url(), attempt.previous().len(), allow_private) {
                Ok(()) => attempt.follow(),
                Err(refusal) => attempt.error(refusal),
            }
        });
        let image_http = Client::builder()
            .timeout(options.timeout)
            .user_agent(USER_AGENT)
            .redirect(redirect_policy)
            .build()?;

        Ok(Self {
            http,
            image_http,
            options,
            base_url: credentials.site_url.trim_end_matches('/').to_string(),
            username: credentials.username,
            password: credentials.password,
            token: credentials.token,
            query_fallback_consented: credentials.query_fallback_consented,
            use_query: AtomicBool::new(credentials.token_transport == TokenTransport::Query),
            switched: AtomicBool::new(false),
        })
    }

    /// Site base URL without a trailing slash.
    #[must_use]
    pub fn site_url(&self) -> &str {
        &self.base_url
    }

    /// Serialized origin of the site (`scheme://host[:port]`).
    #[must_use]
    pub fn origin(&self) -> Option<String> {
        site_origin(&self.base_url)
    }

    #[must_use]
    pub fn token_transport(&self) -> TokenTransport {
        if self.use_query.load(Ordering::Relaxed) {
            TokenTransport::Query
        } else {
            TokenTransport::Header
        }
    }

    /// Whether this client fell back to query transport during its lifetime.
    #[must_use]
    pub fn transport_switched(&self) -> bool {
        self.switched.load(Ordering::Relaxed)
    }

    /// Issue a REST call and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns the normalized [`ApiError`] of the final attempt, or an error
    /// with code `NEEDS_QUERY_FALLBACK_CONSENT` when a fallback would be
    /// needed but has not been consented to.
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let (status, value) = self.send_with_fallback(&request).await?;
        serde_json::from_value(value).map_err(|e| {
            ApiError::new(
                status,
                ErrorCode::InvalidResponse.as_str(),
                format!("Unexpected response from {}: {e}", request.path),
            )
        })
    }

    /// `GET /users/me`, used as the connection test.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn current_user(&self) -> Result<CurrentUser, ApiError> {
        self.request(ApiRequest::get("/users/me")).await
    }

    /// `POST /posts`.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn create_post(&self, post: &NewPost) -> Result<CreatedPost, ApiError> {
        let body = serde_json::to_value(post).map_err(|e| {
            ApiError::new(0, ErrorCode::InvalidRequest.as_str(), e.to_string())
        })?;
        let created: CreatedPost = self.request(ApiRequest::post_json("/posts", body)).await?;
        info!(post_id = created.id, status = %created.status, "Post created");
        Ok(created)
    }

    async fn send_with_fallback(
        &self,
        request: &ApiRequest,
    ) -> Result<(u16, serde_json::Value), ApiError> {
        let transport = self.token_transport();
        match self.execute(request, transport).await {
            Ok(ok) => Ok(ok),
            Err(err)
                if self.token.is_some()
                    && transport == TokenTransport::Header
                    && err.is_header_auth_rejection() =>
            {
                if !self.query_fallback_consented {
                    warn!(
                        path = %request.path,
                        status = err.status,
                        code = %err.code,
                        "Token header rejected; query transport needs user consent"
                    );
                    return Err(ApiError::new(
                        err.status,
                        ErrorCode::NeedsQueryFallbackConsent.as_str(),
                        err.message,
                    ));
                }

                info!(path = %request.path, code = %err.code, "Retrying with query token transport");
                let ok = self.execute(request, TokenTransport::Query).await?;
                self.use_query.store(true, Ordering::Relaxed);
                self.switched.store(true, Ordering::Relaxed);
                info!(site = %self.base_url, "Switched to query token transport");
                Ok(ok)
            }
            Err(err) => Err(err),
        }
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        transport: TokenTransport,
    ) -> Result<(u16, serde_json::Value), ApiError> {
        let url = self.endpoint_url(request, transport)?;
        debug!(method = %request.method, path = %request.path, transport = transport.as_str(), "WordPress request");

        let mut builder = self.authorize(self.http.request(request.method.clone(), url), transport);
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::File {
                bytes,
                filename,
                mime,
            } => {
                let part = Part::bytes(bytes.clone())
                    .file_name(filename.clone())
                    .mime_str(mime)
                    .map_err(|e| ApiError::new(0, ErrorCode::InvalidRequest.as_str(), e.to_string()))?;
                builder.multipart(Form::new().part("file", part))
            }
        };

        let response = builder.send().await.map_err(|e| {
            debug!(path = %request.path, error = %e, "WordPress request failed without response");
            ApiError::network("Check your network connection")
        })?;

        let status = response.status().as_u16();
        let success = response.status().is_success();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response body: {e}")))?;

        if !success {
            return Err(ApiError::from_response(status, &body));
        }

        let value = serde_json::from_str(&body).map_err(|e| {
            ApiError::new(
                status,
                ErrorCode::InvalidResponse.as_str(),
                format!("Response is not JSON: {e}"),
            )
        })?;
        Ok((status, value))
    }

    fn endpoint_url(&self, request: &ApiRequest, transport: TokenTransport) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}{}{}", self.base_url, REST_PREFIX, request.path))
            .map_err(|e| {
                ApiError::new(
                    0,
                    ErrorCode::InvalidRequest.as_str(),
                    format!("Invalid site URL '{}': {e}", self.base_url),
                )
            })?;

        let token_param = match (&self.token, transport) {
            (Some(token), TokenTransport::Query) => Some(token.as_str()),
            _ => None,
        };
        if !request.query.is_empty() || token_param.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
            if let Some(token) = token_param {
                pairs.append_pair(TOKEN_QUERY_PARAM, token);
            }
        }
        Ok(url)
    }

    /// Token beats basic auth; without either the request goes out anonymous.
    fn authorize(&self, builder: RequestBuilder, transport: TokenTransport) -> RequestBuilder {
        if let Some(token) = &self.token {
            match transport {
                TokenTransport::Header => builder.header(TOKEN_HEADER, token),
                TokenTransport::Query => builder,
            }
        } else if let (Some(user), Some(password)) = (&self.username, &self.password) {
            builder.basic_auth(user, Some(password))
        } else {
            builder
        }
    }
}

#[derive(Debug, Error)]
enum RedirectRefusal {
    #[error("too many redirects")]
    TooMany,
    #[error("redirect target rejected: {0}")]
    Rejected(#[from] UrlRejection),
}

/// Decide whether an image download may follow a redirect to `target`
/// after `hops` earlier redirects.
fn check_redirect(target: &Url, hops: usize, allow_private: bool) -> Result<(), RedirectRefusal> {
    if hops >= MAX_IMAGE_REDIRECTS {
        return Err(RedirectRefusal::TooMany);
    }
    if !allow_private {
        check_url(target)?;
    }
    Ok(())
}

/// Origin (`scheme://host[:port]`) of a site URL.
#[must_use]
pub fn site_origin(site_url: &str) -> Option<String> {
    let url = Url::parse(site_url.trim()).ok()?;
    match url.origin() {
        origin @ url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
        url::Origin::Opaque(_) => None,
    }
}
