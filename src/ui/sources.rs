use crate::app::Snapshot;
use crate::util::{strip_control_chars, truncate_to_width};
use std::io::{self, Write};

/// Subscription list, one line per source, in server order.
pub(super) fn render<W: Write>(out: &mut W, snapshot: &Snapshot, width: usize) -> io::Result<()> {
    writeln!(
        out,
        "Subscriptions ({}, {} unread)",
        snapshot.sources.len(),
        snapshot.total_unread
    )?;
    if snapshot.sources.is_empty() {
        writeln!(out, "  (none)")?;
        return Ok(());
    }

    for source in snapshot.sources.iter() {
        let marker = if source.has_unread { '*' } else { ' ' };
        let latest = source
            .latest_entry_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let line = format!(
            "{marker} [{}] {} ({}) {} unread, latest {latest}",
            source.id,
            strip_control_chars(&source.title),
            strip_control_chars(&source.category),
            source.unread_count,
        );
        writeln!(out, "{}", truncate_to_width(&line, width))?;
    }
    Ok(())
}
