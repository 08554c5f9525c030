//! Reconciliation controller.
//!
//! Owns the [`App`] state and runs every user operation as a background task.
//! After a successful mutation the affected views are refreshed from the
//! server; nothing is patched locally. Failures are mapped to one short
//! user-facing message per operation.
//!
//! Operations are neither queued nor cancelled. Each dispatch returns an
//! [`OpId`] immediately; results arrive as [`AppEvent`]s that are applied in
//! completion order by [`Controller::handle_event`] or [`Controller::settle`].
//!
//! Dispatch methods spawn onto the current Tokio runtime and must be called
//! from within one.

mod events;
mod tasks;

use crate::app::{App, AppEvent, OpId, Operation, Snapshot, ViewMode};
use crate::gateway::Gateway;
use crate::sync::SourceDraft;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::mpsc;

/// User-facing failure messages.
pub mod messages {
    pub const CREATE_FAILED: &str = "cannot add subscription";
    pub const REMOVE_FAILED: &str = "cannot remove subscription";
    pub const MARK_READ_FAILED: &str = "cannot mark entry as read";
    /// Used for ingestion failures without a backend `detail`.
    pub const INGEST_FAILED: &str = "ingestion failed";
    pub const SOURCES_FAILED: &str = "cannot refresh subscriptions";
    pub const DIGEST_FAILED: &str = "cannot fetch digest";
    pub const INTERNAL_ERROR: &str = "internal error";
}

/// Capacity of the task event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Behavior switches for the controller.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Drop digest responses superseded by a newer load of the same date.
    /// Off by default: the last response to complete is shown.
    pub discard_stale_digests: bool,
    /// Subscriptions created by [`Controller::seed_default_sources`].
    pub seeds: Vec<SourceDraft>,
}

pub struct Controller {
    gateway: Gateway,
    app: App,
    discard_stale: bool,
    seeds: Arc<[SourceDraft]>,
    event_tx: mpsc::Sender<AppEvent>,
    event_rx: mpsc::Receiver<AppEvent>,
    next_op: u64,
}

impl Controller {
    /// Create a controller with `date` selected. Nothing is fetched until
    /// [`start`](Self::start) is called.
    pub fn new(gateway: Gateway, options: SyncOptions, date: NaiveDate) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            gateway,
            app: App::new(date),
            discard_stale: options.discard_stale_digests,
            seeds: options.seeds.into(),
            event_tx,
            event_rx,
            next_op: 1,
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn snapshot(&self) -> Snapshot {
        self.app.snapshot()
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.app.view_mode = mode;
    }

    pub fn toggle_view_mode(&mut self) {
        self.app.view_mode = match self.app.view_mode {
            ViewMode::Structured => ViewMode::Raw,
            ViewMode::Raw => ViewMode::Structured,
        };
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Initial load: sources and the selected date's digest, concurrently.
    pub fn start(&mut self) -> OpId {
        let date = self.app.digest.date();
        self.app.digest.begin_load(date);
        let generations = self.app.digest.generations().clone();
        self.dispatch(Operation::Start, |gateway, reporter| {
            tasks::start(gateway, generations, date, reporter)
        })
    }

    pub fn refresh_sources(&mut self) -> OpId {
        self.dispatch(Operation::RefreshSources, tasks::refresh_sources)
    }

    /// Reload the selected date.
    pub fn refresh_digest(&mut self) -> OpId {
        let date = self.app.digest.date();
        self.select_date(date)
    }

    /// Select `date` and load it. The previously shown digest is dropped
    /// right away.
    pub fn select_date(&mut self, date: NaiveDate) -> OpId {
        self.app.digest.begin_load(date);
        let generations = self.app.digest.generations().clone();
        self.dispatch(Operation::LoadDigest(date), |gateway, reporter| {
            tasks::refresh_digest(gateway, generations, date, reporter)
        })
    }

    pub fn create_source(&mut self, draft: SourceDraft) -> OpId {
        self.dispatch(Operation::CreateSource, |gateway, reporter| {
            tasks::create(gateway, draft, reporter)
        })
    }

    pub fn remove_source(&mut self, id: i64) -> OpId {
        self.dispatch(Operation::RemoveSource(id), |gateway, reporter| {
            tasks::remove(gateway, id, reporter)
        })
    }

    /// Subscribe the configured seed list, one request at a time.
    pub fn seed_default_sources(&mut self) -> OpId {
        let seeds = Arc::clone(&self.seeds);
        self.dispatch(Operation::SeedDefaults, |gateway, reporter| {
            tasks::seed(gateway, seeds, reporter)
        })
    }

    /// Mark an entry read, then reload the selected date and the sources.
    pub fn mark_read(&mut self, entry_id: i64) -> OpId {
        let date = self.app.digest.date();
        let generations = self.app.digest.generations().clone();
        self.dispatch(Operation::MarkRead(entry_id), |gateway, reporter| {
            tasks::mark_read(gateway, generations, entry_id, date, reporter)
        })
    }

    /// Trigger backend ingestion, then reload the selected date and the sources.
    pub fn ingest_now(&mut self) -> OpId {
        let date = self.app.digest.date();
        let generations = self.app.digest.generations().clone();
        self.dispatch(Operation::Ingest, |gateway, reporter| {
            tasks::ingest(gateway, generations, date, reporter)
        })
    }

    fn dispatch<F, Fut>(&mut self, operation: Operation, work: F) -> OpId
    where
        F: FnOnce(Gateway, tasks::Reporter) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let op = OpId(self.next_op);
        self.next_op += 1;

        self.app.clear_message();
        self.app.begin(op, operation);
        tracing::debug!(op = %op, operation = operation.name(), "Dispatching operation");

        let reporter = tasks::Reporter::new(op, self.event_tx.clone());
        tasks::spawn(
            reporter.clone(),
            operation.name(),
            work(self.gateway.clone(), reporter),
        );
        op
    }

    // ------------------------------------------------------------------------
    // Event processing
    // ------------------------------------------------------------------------

    pub fn handle_event(&mut self, event: AppEvent) {
        events::handle_app_event(&mut self.app, event, self.discard_stale);
    }

    /// Apply every event that has already arrived, without waiting.
    pub fn poll_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Wait until every dispatched operation has settled.
    pub async fn settle(&mut self) {
        while !self.app.is_settled() {
            // The controller holds a sender, so the channel never closes here.
            let Some(event) = self.event_rx.recv().await else {
                break;
            };
            self.handle_event(event);
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("gateway", &self.gateway)
            .field("app", &self.app)
            .field("discard_stale", &self.discard_stale)
            .field("seeds", &self.seeds.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Phase;
    use crate::sync::DigestState;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn controller(server: &MockServer, options: SyncOptions) -> Controller {
        let gateway = Gateway::new(
            Url::parse(&server.uri()).unwrap(),
            Duration::from_secs(5),
            None,
        )
        .unwrap();
        Controller::new(gateway, options, day(12))
    }

    fn empty_digest(date: &str) -> serde_json::Value {
        serde_json::json!({"date": date, "total": 0, "categories": {}})
    }

    #[tokio::test]
    async fn test_dispatch_clears_message_and_tracks_phase() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sources/meta"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut ctl = controller(&server, SyncOptions::default());
        ctl.refresh_sources();
        ctl.settle().await;
        assert_eq!(ctl.app().message(), Some("cannot refresh subscriptions"));

        Mock::given(method("GET"))
            .and(path("/digest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(empty_digest("2026-02-12")))
            .mount(&server)
            .await;
        let op = ctl.refresh_digest();
        assert_eq!(ctl.app().message(), None);
        assert_eq!(ctl.app().phase(op), Some(Phase::Requesting));
        ctl.settle().await;
        assert!(ctl.app().is_settled());
        assert_eq!(ctl.app().message(), None);
    }

    #[tokio::test]
    async fn test_start_reports_views_independently() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sources/meta"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/digest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(empty_digest("2026-02-12")))
            .mount(&server)
            .await;

        let mut ctl = controller(&server, SyncOptions::default());
        ctl.start();
        ctl.settle().await;

        let snapshot = ctl.snapshot();
        assert_eq!(snapshot.message.as_deref(), Some("cannot refresh subscriptions"));
        assert!(snapshot.has_empty_digest());
    }

    #[tokio::test]
    async fn test_select_date_drops_old_digest_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/digest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(empty_digest("2026-02-12")))
            .mount(&server)
            .await;

        let mut ctl = controller(&server, SyncOptions::default());
        ctl.refresh_digest();
        ctl.settle().await;
        assert!(ctl.snapshot().digest().is_some());

        ctl.select_date(day(13));
        let snapshot = ctl.snapshot();
        assert_eq!(snapshot.selected_date, day(13));
        assert_eq!(snapshot.digest, DigestState::Loading { date: day(13) });
    }

    #[tokio::test]
    async fn test_toggle_view_mode() {
        let server = MockServer::start().await;
        let mut ctl = controller(&server, SyncOptions::default());
        ctl.toggle_view_mode();
        assert_eq!(ctl.snapshot().view_mode, ViewMode::Raw);
        ctl.set_view_mode(ViewMode::Structured);
        assert_eq!(ctl.snapshot().view_mode, ViewMode::Structured);
    }

    #[tokio::test]
    async fn test_poll_events_without_waiting() {
        let server = MockServer::start().await;
        let mut ctl = controller(&server, SyncOptions::default());
        assert_eq!(ctl.poll_events(), 0);
    }
}
