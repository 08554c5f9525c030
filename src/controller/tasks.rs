//! Operation task bodies.
//!
//! Each operation runs as one spawned task. The task performs the mutation
//! request, then the refreshes the mutation calls for, and reports every
//! outcome to the controller as an [`AppEvent`] the moment it is known.

use super::messages;
use crate::app::{AppEvent, OpId, Phase};
use crate::gateway::Gateway;
use crate::sync::digest::{fetch_digest, mark_entry_read, trigger_ingest};
use crate::sync::directory::{create_source, fetch_sources, remove_source};
use crate::sync::{Digest, FetchError, Generations, Source, SourceDraft};
use chrono::NaiveDate;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sends the events of one operation back to the controller.
#[derive(Clone)]
pub(super) struct Reporter {
    op: OpId,
    tx: mpsc::Sender<AppEvent>,
}

impl Reporter {
    pub(super) fn new(op: OpId, tx: mpsc::Sender<AppEvent>) -> Self {
        Self { op, tx }
    }

    async fn send(&self, event: AppEvent) {
        if let Err(e) = self.tx.send(event).await {
            tracing::warn!(op = %self.op, error = %e, "Channel send failed (receiver dropped)");
        }
    }

    async fn phase(&self, phase: Phase) {
        self.send(AppEvent::PhaseChanged { op: self.op, phase }).await;
    }

    async fn surface(&self, message: impl Into<String>) {
        self.send(AppEvent::Surfaced {
            op: self.op,
            message: message.into(),
        })
        .await;
    }

    async fn sources(&self, result: Result<Vec<Source>, FetchError>) {
        self.send(AppEvent::SourcesLoaded {
            op: self.op,
            result,
        })
        .await;
    }

    async fn digest(&self, date: NaiveDate, generation: u64, result: Result<Digest, FetchError>) {
        self.send(AppEvent::DigestLoaded {
            op: self.op,
            date,
            generation,
            result,
        })
        .await;
    }
}

/// Run `future`, converting a panic into its message.
async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Spawn an operation task. `Settled` is always the task's last event, also
/// after a panic.
pub(super) fn spawn<F>(reporter: Reporter, task: &'static str, work: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic_msg) = catch_task_panic(work).await {
            tracing::error!(op = %reporter.op, task, error = %panic_msg, "Task panicked");
            reporter
                .send(AppEvent::TaskPanicked {
                    op: reporter.op,
                    task,
                    error: panic_msg,
                })
                .await;
        }
        reporter.send(AppEvent::Settled { op: reporter.op }).await;
    });
}

// ============================================================================
// Refresh steps
// ============================================================================

async fn load_sources(gateway: &Gateway, reporter: &Reporter) {
    let result = fetch_sources(gateway).await;
    reporter.sources(result).await;
}

async fn load_digest(
    gateway: &Gateway,
    generations: &Generations,
    date: NaiveDate,
    reporter: &Reporter,
) {
    // Taken right before the request so the token orders the GETs.
    let generation = generations.issue();
    let result = fetch_digest(gateway, date).await;
    reporter.digest(date, generation, result).await;
}

/// Refresh both views concurrently. Each result is reported as soon as it
/// arrives; a failure of one does not stop the other.
async fn load_both(
    gateway: &Gateway,
    generations: &Generations,
    date: NaiveDate,
    reporter: &Reporter,
) {
    tokio::join!(
        load_sources(gateway, reporter),
        load_digest(gateway, generations, date, reporter),
    );
}

// ============================================================================
// Operations
// ============================================================================

pub(super) async fn start(
    gateway: Gateway,
    generations: Generations,
    date: NaiveDate,
    reporter: Reporter,
) {
    reporter.phase(Phase::Refreshing).await;
    load_both(&gateway, &generations, date, &reporter).await;
}

pub(super) async fn refresh_sources(gateway: Gateway, reporter: Reporter) {
    reporter.phase(Phase::Refreshing).await;
    load_sources(&gateway, &reporter).await;
}

pub(super) async fn refresh_digest(
    gateway: Gateway,
    generations: Generations,
    date: NaiveDate,
    reporter: Reporter,
) {
    reporter.phase(Phase::Refreshing).await;
    load_digest(&gateway, &generations, date, &reporter).await;
}

pub(super) async fn create(gateway: Gateway, draft: SourceDraft, reporter: Reporter) {
    if let Err(e) = create_source(&gateway, &draft).await {
        tracing::warn!(url = draft.url(), error = %e, "Subscription not created");
        reporter.surface(messages::CREATE_FAILED).await;
        return;
    }
    reporter.phase(Phase::Refreshing).await;
    load_sources(&gateway, &reporter).await;
}

pub(super) async fn remove(gateway: Gateway, source_id: i64, reporter: Reporter) {
    if let Err(e) = remove_source(&gateway, source_id).await {
        tracing::warn!(source_id, error = %e, "Subscription not removed");
        reporter.surface(messages::REMOVE_FAILED).await;
    }
    // The backend may have applied the delete before failing; resync either way.
    reporter.phase(Phase::Refreshing).await;
    load_sources(&gateway, &reporter).await;
}

pub(super) async fn seed(gateway: Gateway, seeds: Arc<[SourceDraft]>, reporter: Reporter) {
    for draft in seeds.iter() {
        match create_source(&gateway, draft).await {
            Ok(source) => {
                tracing::debug!(source_id = ?source.map(|s| s.id), "Seed subscription added")
            }
            Err(e) => tracing::info!(url = draft.url(), error = %e, "Seed subscription skipped"),
        }
    }
    reporter.phase(Phase::Refreshing).await;
    load_sources(&gateway, &reporter).await;
}

pub(super) async fn mark_read(
    gateway: Gateway,
    generations: Generations,
    entry_id: i64,
    date: NaiveDate,
    reporter: Reporter,
) {
    if let Err(e) = mark_entry_read(&gateway, entry_id).await {
        tracing::warn!(entry_id, error = %e, "Entry not marked read");
        reporter.surface(messages::MARK_READ_FAILED).await;
        return;
    }
    reporter.phase(Phase::Refreshing).await;
    load_both(&gateway, &generations, date, &reporter).await;
}

pub(super) async fn ingest(
    gateway: Gateway,
    generations: Generations,
    date: NaiveDate,
    reporter: Reporter,
) {
    match trigger_ingest(&gateway).await {
        Ok(report) => tracing::debug!(inserted = report.inserted, "Ingestion accepted"),
        Err(e) => {
            tracing::warn!(error = %e, "Ingestion failed");
            let message = e.detail().unwrap_or(messages::INGEST_FAILED).to_string();
            reporter.surface(message).await;
            return;
        }
    }
    reporter.phase(Phase::Refreshing).await;
    load_both(&gateway, &generations, date, &reporter).await;
}
