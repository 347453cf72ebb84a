use tracing::{debug, info, warn};

use super::client::{ApiRequest, WordPressClient};
use super::error::ApiError;
use super::types::{Term, TermKind};
use crate::constants::TERM_SEARCH_PAGE_SIZE;

impl WordPressClient {
    /// Find a term whose name equals `name`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the search request fails.
    pub async fn find_term(&self, kind: TermKind, name: &str) -> Result<Option<Term>, ApiError> {
        let request = ApiRequest::get(kind.endpoint())
            .with_query("search", name)
            .with_query("per_page", TERM_SEARCH_PAGE_SIZE.to_string());
        let candidates: Vec<Term> = self.request(request).await?;

        let wanted = name.to_lowercase();
        Ok(candidates
            .into_iter()
            .find(|term| term.name.to_lowercase() == wanted))
    }

    /// Create a term with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the create request fails.
    pub async fn create_term(&self, kind: TermKind, name: &str) -> Result<Term, ApiError> {
        let request = ApiRequest::post_json(kind.endpoint(), serde_json::json!({ "name": name }));
        let term: Term = self.request(request).await?;
        info!(kind = %kind, name = %term.name, id = term.id, "Created term");
        Ok(term)
    }

    /// Resolve term names to ids, in input order.
    ///
    /// Best effort: a name that cannot be resolved (lookup error, or absent
    /// with `create_if_missing` off) is skipped and never fails the batch.
    pub async fn resolve_term_ids(
        &self,
        kind: TermKind,
        names: &[String],
        create_if_missing: bool,
    ) -> Vec<u64> {
        let mut ids = Vec::with_capacity(names.len());

        for name in names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }

            match self.resolve_one(kind, name, create_if_missing).await {
                Ok(Some(id)) => ids.push(id),
                Ok(None) => {
                    debug!(kind = %kind, name = %name, "Term not found and creation disabled");
                }
                Err(e) => {
                    warn!(kind = %kind, name = %name, error = %e, "Failed to resolve term, skipping");
                }
            }
        }

        ids
    }

    async fn resolve_one(
        &self,
        kind: TermKind,
        name: &str,
        create_if_missing: bool,
    ) -> Result<Option<u64>, ApiError> {
        if let Some(term) = self.find_term(kind, name).await? {
            return Ok(Some(term.id));
        }
        if !create_if_missing {
            return Ok(None);
        }
        Ok(Some(self.create_term(kind, name).await?.id))
    }
}
