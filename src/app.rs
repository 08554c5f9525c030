use crate::sync::{
    CategoryGroup, Digest, DigestState, DigestView, FetchError, Source, SourceDirectory,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Operations
// ============================================================================

/// Identifies one dispatched operation until it settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpId(pub u64);

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// User-level operations the controller can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Initial load of both views.
    Start,
    RefreshSources,
    LoadDigest(NaiveDate),
    CreateSource,
    RemoveSource(i64),
    SeedDefaults,
    MarkRead(i64),
    Ingest,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::RefreshSources => "refresh_sources",
            Operation::LoadDigest(_) => "load_digest",
            Operation::CreateSource => "create_source",
            Operation::RemoveSource(_) => "remove_source",
            Operation::SeedDefaults => "seed_default_sources",
            Operation::MarkRead(_) => "mark_read",
            Operation::Ingest => "ingest_now",
        }
    }
}

/// Where an in-flight operation is. Settled operations are no longer tracked
/// (they are back to idle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Requesting,
    Refreshing,
    ErrorSurfaced,
}

/// How the presentation layer shows the views. Not part of synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Structured,
    Raw,
}

// ============================================================================
// Events
// ============================================================================

/// Results reported by operation tasks, applied in arrival order.
pub enum AppEvent {
    PhaseChanged {
        op: OpId,
        phase: Phase,
    },
    SourcesLoaded {
        op: OpId,
        result: Result<Vec<Source>, FetchError>,
    },
    /// A digest load finished.
    ///
    /// - `date`: the date that was requested
    /// - `generation`: token taken right before the request went out
    DigestLoaded {
        op: OpId,
        date: NaiveDate,
        generation: u64,
        result: Result<Digest, FetchError>,
    },
    /// The operation failed; `message` is what the user sees.
    Surfaced {
        op: OpId,
        message: String,
    },
    /// The operation and every refresh it triggered have completed.
    Settled {
        op: OpId,
    },
    TaskPanicked {
        op: OpId,
        task: &'static str,
        error: String,
    },
}

// ============================================================================
// App State
// ============================================================================

/// Authoritative in-memory state, owned by the controller.
///
/// Presentation only sees [`Snapshot`]s.
#[derive(Debug)]
pub struct App {
    pub(crate) directory: SourceDirectory,
    pub(crate) digest: DigestView,
    message: Option<String>,
    pending: BTreeMap<OpId, (Operation, Phase)>,
    pub view_mode: ViewMode,
}

impl App {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            directory: SourceDirectory::new(),
            digest: DigestView::new(date),
            message: None,
            pending: BTreeMap::new(),
            view_mode: ViewMode::default(),
        }
    }

    pub fn directory(&self) -> &SourceDirectory {
        &self.directory
    }

    pub fn digest(&self) -> &DigestView {
        &self.digest
    }

    /// The single user-facing error message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn total_unread(&self) -> u64 {
        self.directory.total_unread()
    }

    /// True when no dispatched operation is still in flight.
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn phase(&self, op: OpId) -> Option<Phase> {
        self.pending.get(&op).map(|(_, phase)| *phase)
    }

    pub(crate) fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub(crate) fn clear_message(&mut self) {
        self.message = None;
    }

    pub(crate) fn begin(&mut self, op: OpId, operation: Operation) {
        self.pending.insert(op, (operation, Phase::Requesting));
    }

    pub(crate) fn set_phase(&mut self, op: OpId, phase: Phase) {
        if let Some((_, current)) = self.pending.get_mut(&op) {
            // ErrorSurfaced is terminal for the operation's outcome.
            if *current != Phase::ErrorSurfaced {
                *current = phase;
            }
        }
    }

    pub(crate) fn settle(&mut self, op: OpId) -> Option<(Operation, Phase)> {
        self.pending.remove(&op)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sources: self.directory.shared(),
            total_unread: self.total_unread(),
            selected_date: self.digest.date(),
            digest: self.digest.state().clone(),
            message: self.message.clone(),
            pending: self.pending.values().copied().collect(),
            view_mode: self.view_mode,
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Read-only view of [`App`] handed to presentation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub sources: Arc<Vec<Source>>,
    pub total_unread: u64,
    pub selected_date: NaiveDate,
    pub digest: DigestState,
    pub message: Option<String>,
    pub pending: Vec<(Operation, Phase)>,
    pub view_mode: ViewMode,
}

impl Snapshot {
    pub fn digest(&self) -> Option<&Digest> {
        match &self.digest {
            DigestState::Loaded(digest) => Some(digest),
            _ => None,
        }
    }

    pub fn categories(&self) -> &[CategoryGroup] {
        self.digest()
            .map(|d| d.categories.as_slice())
            .unwrap_or_default()
    }

    /// Loaded successfully but the day has no entries.
    pub fn has_empty_digest(&self) -> bool {
        self.digest().is_some_and(Digest::is_empty)
    }

    pub fn is_busy(&self) -> bool {
        !self.pending.is_empty()
    }
}
