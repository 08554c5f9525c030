use super::Panels;
use crate::app::Snapshot;
use crate::sync::{Digest, Source};
use chrono::NaiveDate;
use serde::Serialize;
use std::io::{self, Write};

/// Serialized directly (not through `serde_json::Value`) so the digest's
/// category keys keep server order.
#[derive(Serialize)]
struct RawView<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<&'a [Source]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_unread: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    /// `Some(None)` prints `null` for a digest that is not loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    digest: Option<Option<&'a Digest>>,
}

/// Pretty JSON of the requested panels, as decoded from the backend.
pub(super) fn render<W: Write>(out: &mut W, snapshot: &Snapshot, panels: Panels) -> io::Result<()> {
    let with_sources = matches!(panels, Panels::Sources | Panels::Both);
    let with_digest = matches!(panels, Panels::Digest | Panels::Both);
    let view = RawView {
        sources: with_sources.then(|| snapshot.sources.as_slice()),
        total_unread: with_sources.then_some(snapshot.total_unread),
        date: with_digest.then_some(snapshot.selected_date),
        digest: with_digest.then(|| snapshot.digest()),
    };
    serde_json::to_writer_pretty(&mut *out, &view)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::fixtures::*;
    use pretty_assertions::assert_eq;

    fn rendered(panels: Panels) -> String {
        let mut out = Vec::new();
        render(&mut out, &loaded_app().snapshot(), panels).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_raw_digest_keeps_category_order() {
        let text = rendered(Panels::Digest);
        let first = text.find("\"科技\"").unwrap();
        let second = text.find("\"全球\"").unwrap();
        assert!(first < second);

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["date"], "2026-02-12");
        assert_eq!(value["digest"]["total"], 2);
        assert!(value.get("sources").is_none());
    }

    #[test]
    fn test_raw_sources() {
        let value: serde_json::Value = serde_json::from_str(&rendered(Panels::Sources)).unwrap();
        assert_eq!(value["sources"][0]["has_unread"], true);
        assert_eq!(value["sources"][1]["unread_count"], 0);
        assert!(value.get("digest").is_none());
    }

    #[test]
    fn test_raw_unloaded_digest_is_null() {
        let app = crate::app::App::new(day(12));
        let mut out = Vec::new();
        render(&mut out, &app.snapshot(), Panels::Digest).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(value["digest"].is_null());
        assert!(value.get("digest").is_some());
    }
}
