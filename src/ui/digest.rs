use crate::app::Snapshot;
use crate::sync::{Digest, DigestState};
use crate::util::{strip_control_chars, truncate_to_width};
use std::io::{self, Write};

const SUMMARY_INDENT: &str = "      ";

pub(super) fn render<W: Write>(out: &mut W, snapshot: &Snapshot, width: usize) -> io::Result<()> {
    match &snapshot.digest {
        DigestState::Idle => writeln!(out, "Digest: not loaded"),
        DigestState::Loading { date } => writeln!(out, "Digest {date}: loading..."),
        DigestState::Failed { date, .. } => writeln!(out, "Digest {date}: unavailable"),
        DigestState::Loaded(digest) if digest.is_empty() => {
            writeln!(out, "Digest {}: no digest for this day", digest.date)
        }
        DigestState::Loaded(digest) => render_digest(out, digest, width),
    }
}

fn render_digest<W: Write>(out: &mut W, digest: &Digest, width: usize) -> io::Result<()> {
    writeln!(
        out,
        "Digest {} ({} entries, {} unread)",
        digest.date,
        digest.total,
        digest.unread()
    )?;
    for group in &digest.categories {
        writeln!(out)?;
        writeln!(out, "## {} ({})", strip_control_chars(&group.name), group.entries.len())?;
        for entry in &group.entries {
            let marker = if entry.unread { '*' } else { ' ' };
            let line = format!(
                "{marker} #{} {} [{}] {}",
                entry.id,
                strip_control_chars(&entry.title),
                strip_control_chars(&entry.source_title),
                entry.published_at.format("%H:%M"),
            );
            writeln!(out, "{}", truncate_to_width(&line, width))?;

            let summary = strip_control_chars(entry.summary.trim());
            if !summary.is_empty() {
                let budget = width.saturating_sub(SUMMARY_INDENT.len());
                // Summaries are one line here; the full text is behind the link.
                let first = summary.lines().next().unwrap_or_default();
                writeln!(out, "{SUMMARY_INDENT}{}", truncate_to_width(first, budget))?;
            }
        }
    }
    Ok(())
}
