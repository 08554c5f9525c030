//! Text presentation of controller snapshots.
//!
//! Rendering reads a [`Snapshot`] only; it never touches the controller.
//!
//! # Module Structure
//!
//! - `sources` - subscription list with the unread aggregate
//! - `digest` - category-grouped entries of the selected date
//! - `raw` - JSON dump of the same data

mod digest;
mod raw;
mod sources;

use crate::app::{Snapshot, ViewMode};
use std::io::{self, Write};

/// Default line width when the terminal size is unknown.
pub const DEFAULT_WIDTH: usize = 100;

/// Which panels to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panels {
    Sources,
    Digest,
    Both,
}

/// Render `snapshot` according to its view mode, followed by the
/// user-facing message, if any.
pub fn render<W: Write>(
    out: &mut W,
    snapshot: &Snapshot,
    panels: Panels,
    width: usize,
) -> io::Result<()> {
    match snapshot.view_mode {
        ViewMode::Raw => raw::render(out, snapshot, panels)?,
        ViewMode::Structured => {
            if matches!(panels, Panels::Sources | Panels::Both) {
                sources::render(out, snapshot, width)?;
            }
            if panels == Panels::Both {
                writeln!(out)?;
            }
            if matches!(panels, Panels::Digest | Panels::Both) {
                digest::render(out, snapshot, width)?;
            }
        }
    }
    render_message(out, snapshot)
}

fn render_message<W: Write>(out: &mut W, snapshot: &Snapshot) -> io::Result<()> {
    if let Some(message) = &snapshot.message {
        writeln!(out, "! {message}")?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn rendered(snapshot: &Snapshot, panels: Panels) -> String {
        let mut out = Vec::new();
        render(&mut out, snapshot, panels, DEFAULT_WIDTH).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_message_printed_last() {
        let mut app = loaded_app();
        app.set_message("rate limited");
        let text = rendered(&app.snapshot(), Panels::Both);
        assert!(text.ends_with("! rate limited\n"));
    }

    #[test]
    fn test_panels_selection() {
        let snapshot = loaded_app().snapshot();
        let sources_only = rendered(&snapshot, Panels::Sources);
        assert!(sources_only.contains("Hacker News"));
        assert!(!sources_only.contains("Rust 2026 roadmap"));

        let digest_only = rendered(&snapshot, Panels::Digest);
        assert!(digest_only.contains("Rust 2026 roadmap"));
        assert!(!digest_only.contains("Subscriptions"));
    }

    #[test]
    fn test_raw_mode_is_json() {
        let mut app = loaded_app();
        app.view_mode = ViewMode::Raw;
        let text = rendered(&app.snapshot(), Panels::Both);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["total_unread"], 1);
    }
}
