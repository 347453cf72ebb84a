//! Persisted user settings: site credentials, the remembered token
//! transport and publishing defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::wordpress::{site_origin, Credentials, PostStatus, TokenTransport};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything that survives between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredSettings {
    pub wp_url: String,
    pub wp_user: Option<String>,
    pub wp_password: Option<String>,
    pub wp_token: Option<String>,
    pub token_transport: TokenTransport,
    /// Origin the remembered transport was learned on.
    pub token_transport_origin: Option<String>,
    pub query_fallback_consented: bool,
    /// Tags used for the last post, per site URL.
    pub last_used_tags: BTreeMap<String, Vec<String>>,
    pub default_status: PostStatus,
    pub auto_create_terms: bool,
}

impl StoredSettings {
    /// A site URL plus either a token or a user/password pair.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.wp_url.trim().is_empty() && self.credentials().has_secret()
    }

    /// Transport to start with for `origin`. A remembered `Query` transport
    /// only applies to the origin it was learned on.
    #[must_use]
    pub fn transport_for(&self, origin: Option<&str>) -> TokenTransport {
        match (self.token_transport, self.token_transport_origin.as_deref(), origin) {
            (TokenTransport::Query, Some(stored), Some(origin)) if stored == origin => {
                TokenTransport::Query
            }
            _ => TokenTransport::Header,
        }
    }

    /// Tags of the last post published to the configured site.
    #[must_use]
    pub fn remembered_tags(&self) -> &[String] {
        self.last_used_tags
            .get(self.wp_url.trim().trim_end_matches('/'))
            .map_or(&[], Vec::as_slice)
    }

    pub fn remember_query_transport(&mut self, origin: Option<String>) {
        self.token_transport = TokenTransport::Query;
        self.token_transport_origin = origin;
    }

    #[must_use]
    pub fn credentials(&self) -> Credentials {
        let origin = site_origin(&self.wp_url);
        Credentials::new(
            &self.wp_url,
            self.wp_user.as_deref(),
            self.wp_password.as_deref(),
            self.wp_token.as_deref(),
        )
        .with_transport(self.transport_for(origin.as_deref()))
        .with_query_fallback_consent(self.query_fallback_consented)
    }
}

/// Storage backend for [`StoredSettings`].
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<StoredSettings, StoreError>;

    async fn save(&self, settings: &StoredSettings) -> Result<(), StoreError>;
}

/// Settings kept in a JSON file. A missing file reads as defaults; saves
/// write a sibling temp file and rename it over the target.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load(&self) -> Result<StoredSettings, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No settings file yet, using defaults");
                return Ok(StoredSettings::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        if raw.trim().is_empty() {
            return Ok(StoredSettings::default());
        }
        serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, settings: &StoredSettings) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(settings)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

/// In-process store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: RwLock<StoredSettings>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(settings: StoredSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub async fn snapshot(&self) -> StoredSettings {
        self.settings.read().await.clone()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> Result<StoredSettings, StoreError> {
        Ok(self.snapshot().await)
    }

    async fn save(&self, settings: &StoredSettings) -> Result<(), StoreError> {
        *self.settings.write().await = settings.clone();
        Ok(())
    }
}
