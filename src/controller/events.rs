//! Applying task events to the application state.

use super::messages;
use crate::app::{App, AppEvent, Phase};
use crate::sync::Applied;

/// Apply one event from an operation task.
///
/// Events are applied in arrival order, so whichever response completes last
/// is what the views show (subject to the digest date and generation checks
/// in [`DigestView::apply`](crate::sync::DigestView::apply)).
pub(super) fn handle_app_event(app: &mut App, event: AppEvent, discard_stale: bool) {
    match event {
        AppEvent::PhaseChanged { op, phase } => app.set_phase(op, phase),
        AppEvent::SourcesLoaded { op, result } => match result {
            Ok(sources) => app.directory.replace(sources),
            Err(e) => {
                tracing::warn!(op = %op, kind = ?e.kind(), error = %e, "Source refresh failed");
                app.set_message(messages::SOURCES_FAILED);
                app.set_phase(op, Phase::ErrorSurfaced);
            }
        },
        AppEvent::DigestLoaded {
            op,
            date,
            generation,
            result,
        } => {
            if let Err(e) = &result {
                tracing::warn!(op = %op, date = %date, kind = ?e.kind(), error = %e, "Digest load failed");
            }
            let failed = result.is_err();
            let applied = app.digest.apply(date, generation, result, discard_stale);
            if failed && applied != Applied::Discarded {
                app.set_message(messages::DIGEST_FAILED);
                app.set_phase(op, Phase::ErrorSurfaced);
            }
        }
        AppEvent::Surfaced { op, message } => {
            app.set_message(message);
            app.set_phase(op, Phase::ErrorSurfaced);
        }
        AppEvent::Settled { op } => {
            if let Some((operation, phase)) = app.settle(op) {
                tracing::debug!(
                    op = %op,
                    operation = operation.name(),
                    surfaced = phase == Phase::ErrorSurfaced,
                    "Operation settled"
                );
            }
        }
        AppEvent::TaskPanicked { op, task, error } => {
            tracing::error!(op = %op, task, error = %error, "Operation task panicked");
            app.set_message(messages::INTERNAL_ERROR);
            app.set_phase(op, Phase::ErrorSurfaced);
        }
    }
}
