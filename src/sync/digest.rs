//! Digest View Model: the entries of one selected date, grouped by category.
//!
//! There is no per-date cache. Every date selection starts a fresh load and
//! drops whatever was shown before, so a digest for one day is never shown
//! while another day is selected and loading.

use super::error::FetchError;
use super::types::{CategoryGroup, Digest, IngestReport};
use crate::gateway::{Gateway, GatewayError};
use chrono::NaiveDate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Display state of the digest panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestState {
    /// Nothing requested yet.
    Idle,
    Loading { date: NaiveDate },
    Loaded(Arc<Digest>),
    Failed { date: NaiveDate, error: String },
}

/// Monotonic token source for digest loads.
///
/// A token is taken right before a `/digest` request goes out. A response
/// whose token is lower than the last one handed out has been superseded by
/// a newer load. The counter is shared with operation tasks, which issue
/// reloads after their own request succeeds.
#[derive(Debug, Clone, Default)]
pub struct Generations(Arc<AtomicU64>);

impl Generations {
    pub fn issue(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn latest(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_superseded(&self, generation: u64) -> bool {
        generation < self.latest()
    }
}

/// What happened to a digest response handed to [`DigestView::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The newest load; applied.
    Current,
    /// A newer load was already issued, but the response was applied anyway.
    Stale,
    /// Dropped: superseded (when discarding is on) or for another date.
    Discarded,
}

#[derive(Debug, Clone)]
pub struct DigestView {
    date: NaiveDate,
    state: DigestState,
    generations: Generations,
}

impl DigestView {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            state: DigestState::Idle,
            generations: Generations::default(),
        }
    }

    /// The selected date.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn state(&self) -> &DigestState {
        &self.state
    }

    pub fn generations(&self) -> &Generations {
        &self.generations
    }

    pub fn digest(&self) -> Option<&Arc<Digest>> {
        match &self.state {
            DigestState::Loaded(digest) => Some(digest),
            _ => None,
        }
    }

    /// Category groups in first-appearance order; empty unless loaded.
    pub fn categories(&self) -> &[CategoryGroup] {
        self.digest()
            .map(|d| d.categories.as_slice())
            .unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, DigestState::Loading { .. })
    }

    /// Select `date` and show it as loading. The previous digest is dropped,
    /// even when `date` is the date already shown.
    pub fn begin_load(&mut self, date: NaiveDate) {
        if date != self.date {
            tracing::debug!(from = %self.date, to = %date, "Digest date changed");
        }
        self.date = date;
        self.state = DigestState::Loading { date };
    }

    /// Apply the outcome of a load issued with `generation` for `date`.
    ///
    /// A response for a date other than the selected one is always dropped.
    /// With `discard_stale` off, a superseded response for the selected date
    /// still overwrites the view (whatever completes last wins); it is only
    /// reported as [`Applied::Stale`].
    pub fn apply(
        &mut self,
        date: NaiveDate,
        generation: u64,
        result: Result<Digest, FetchError>,
        discard_stale: bool,
    ) -> Applied {
        if date != self.date {
            tracing::debug!(
                date = %date,
                selected = %self.date,
                generation,
                "Dropping digest response for deselected date"
            );
            return Applied::Discarded;
        }
        let superseded = self.generations.is_superseded(generation);
        if superseded && discard_stale {
            tracing::debug!(
                date = %date,
                generation,
                latest = self.generations.latest(),
                "Discarding superseded digest response"
            );
            return Applied::Discarded;
        }
        if superseded {
            tracing::warn!(
                date = %date,
                generation,
                latest = self.generations.latest(),
                "Applying superseded digest response"
            );
        }

        self.state = match result {
            Ok(digest) => DigestState::Loaded(Arc::new(digest)),
            Err(e) => DigestState::Failed {
                date,
                error: e.to_string(),
            },
        };
        if superseded {
            Applied::Stale
        } else {
            Applied::Current
        }
    }

    /// Load `date` directly, outside the controller.
    pub async fn load(
        &mut self,
        gateway: &Gateway,
        date: NaiveDate,
    ) -> Result<Arc<Digest>, FetchError> {
        self.begin_load(date);
        self.generations.issue();
        match fetch_digest(gateway, date).await {
            Ok(digest) => {
                let digest = Arc::new(digest);
                self.state = DigestState::Loaded(Arc::clone(&digest));
                Ok(digest)
            }
            Err(e) => {
                self.state = DigestState::Failed {
                    date,
                    error: e.to_string(),
                };
                Err(e)
            }
        }
    }
}

/// `GET /digest?date=YYYY-MM-DD`.
pub async fn fetch_digest(gateway: &Gateway, date: NaiveDate) -> Result<Digest, FetchError> {
    let digest: Digest = gateway
        .get(&format!("/digest?date={}", date.format("%Y-%m-%d")))
        .await?;
    if digest.date != date {
        return Err(FetchError::WrongDate {
            requested: date,
            received: digest.date,
        });
    }
    tracing::debug!(
        date = %date,
        total = digest.total,
        categories = digest.categories.len(),
        "Fetched digest"
    );
    Ok(digest)
}

/// `POST /entries/{id}/read`.
pub async fn mark_entry_read(gateway: &Gateway, entry_id: i64) -> Result<(), GatewayError> {
    gateway.post_empty(&format!("/entries/{entry_id}/read")).await?;
    tracing::info!(entry_id, "Entry marked read");
    Ok(())
}

/// `POST /ingest`.
///
/// Any 2xx answer is success. An empty or unreadable body counts as nothing
/// inserted.
pub async fn trigger_ingest(gateway: &Gateway) -> Result<IngestReport, GatewayError> {
    let bytes = gateway.post_raw::<()>("/ingest", None).await?;
    let report = if bytes.iter().all(u8::is_ascii_whitespace) {
        IngestReport::default()
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ingestion report unreadable");
            IngestReport::default()
        })
    };
    tracing::info!(inserted = report.inserted, "Ingestion finished");
    Ok(report)
}
