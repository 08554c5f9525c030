//! Source Directory: the subscribed sources and their unread metadata.
//!
//! The cached set is only ever replaced wholesale by a `/sources/meta`
//! response. Mutations (create, remove) go to the backend and are followed by
//! a refresh, never by a local patch, so `unread_count` is always the server's
//! last computed value.

use super::error::{CreateError, FetchError};
use super::types::{Source, SourceDraft};
use crate::gateway::{Gateway, GatewayError};
use chrono::{DateTime, Utc};
use std::sync::Arc;

const META_PATH: &str = "/sources/meta";
const SOURCES_PATH: &str = "/sources";

/// Cached source set plus the time it was last replaced.
#[derive(Debug, Clone, Default)]
pub struct SourceDirectory {
    sources: Arc<Vec<Source>>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl SourceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cached set. No network call.
    pub fn list(&self) -> &[Source] {
        &self.sources
    }

    /// The cached set as a shareable snapshot.
    pub fn shared(&self) -> Arc<Vec<Source>> {
        Arc::clone(&self.sources)
    }

    pub fn get(&self, id: i64) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Sum of `unread_count` over the cached set, computed on every call.
    pub fn total_unread(&self) -> u64 {
        self.sources.iter().map(|s| s.unread_count).sum()
    }

    /// Replace the cached set with a fresh server response.
    pub fn replace(&mut self, sources: Vec<Source>) {
        tracing::debug!(
            previous = self.sources.len(),
            count = sources.len(),
            "Source directory replaced"
        );
        self.sources = Arc::new(sources);
        self.refreshed_at = Some(Utc::now());
    }

    /// Fetch the full metadata collection and replace the cache with it.
    ///
    /// On failure the previous set is kept.
    pub async fn refresh(&mut self, gateway: &Gateway) -> Result<&[Source], FetchError> {
        let sources = fetch_sources(gateway).await?;
        self.replace(sources);
        Ok(self.list())
    }
}

/// `GET /sources/meta`.
pub async fn fetch_sources(gateway: &Gateway) -> Result<Vec<Source>, FetchError> {
    let sources: Vec<Source> = gateway.get(META_PATH).await?;
    tracing::debug!(count = sources.len(), "Fetched source metadata");
    Ok(sources)
}

/// `POST /sources`.
///
/// Any 2xx answer means the subscription exists. The returned record is
/// informational (callers refresh the directory instead of inserting it), so
/// a body that does not decode yields `None` rather than an error.
pub async fn create_source(
    gateway: &Gateway,
    draft: &SourceDraft,
) -> Result<Option<Source>, CreateError> {
    let bytes = gateway.post_raw(SOURCES_PATH, Some(draft)).await?;
    match serde_json::from_slice::<Source>(&bytes) {
        Ok(source) => {
            tracing::info!(
                source_id = source.id,
                url = %source.url,
                category = %source.category,
                "Subscription created"
            );
            Ok(Some(source))
        }
        Err(e) => {
            tracing::warn!(url = draft.url(), error = %e, "Subscription created, record unreadable");
            Ok(None)
        }
    }
}

/// `DELETE /sources/{id}`. Removing an id the backend no longer has is not an error.
pub async fn remove_source(gateway: &Gateway, id: i64) -> Result<(), GatewayError> {
    match gateway.delete(&format!("{SOURCES_PATH}/{id}")).await {
        Ok(_) => {
            tracing::info!(source_id = id, "Subscription removed");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            tracing::debug!(source_id = id, "Subscription already absent");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
