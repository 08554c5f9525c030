use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Category the backend assigns when a draft leaves it blank.
pub const DEFAULT_CATEGORY: &str = "默认";

// ============================================================================
// Source
// ============================================================================

/// A subscribed feed with its server-computed unread metadata.
///
/// `has_unread` is always derived from `unread_count` when decoding, so the
/// two can never disagree inside the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SourceRecord")]
pub struct Source {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub category: String,
    pub unread_count: u64,
    pub has_unread: bool,
    pub latest_entry_at: Option<DateTime<Utc>>,
}

/// Wire shape of a source. `POST /sources` answers without the metadata
/// fields and `/sources/meta` may send `null` counts, hence the options.
#[derive(Deserialize)]
struct SourceRecord {
    id: i64,
    url: String,
    title: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    unread_count: Option<u64>,
    #[serde(default)]
    has_unread: Option<bool>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    latest_entry_at: Option<DateTime<Utc>>,
}

impl From<SourceRecord> for Source {
    fn from(record: SourceRecord) -> Self {
        let unread_count = record.unread_count.unwrap_or(0);
        let has_unread = unread_count > 0;
        if record.has_unread.is_some_and(|flag| flag != has_unread) {
            tracing::warn!(
                source_id = record.id,
                unread_count,
                "Backend has_unread disagrees with unread_count, using the count"
            );
        }
        Source {
            id: record.id,
            url: record.url,
            title: record.title,
            category: record.category.unwrap_or_default(),
            unread_count,
            has_unread,
            latest_entry_at: record.latest_entry_at,
        }
    }
}

// ============================================================================
// Source Draft
// ============================================================================

/// Why a draft could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("Subscription URL must not be empty")]
    EmptyUrl,
    #[error("Subscription title must not be empty")]
    EmptyTitle,
}

/// Body of a create-source request.
///
/// Only constructible with a non-empty URL and title, so an invalid draft
/// never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDraft {
    url: String,
    title: String,
    category: String,
}

impl SourceDraft {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Result<Self, DraftError> {
        let url = url.into().trim().to_string();
        let title = title.into().trim().to_string();
        if url.is_empty() {
            return Err(DraftError::EmptyUrl);
        }
        if title.is_empty() {
            return Err(DraftError::EmptyTitle);
        }
        Ok(Self {
            url,
            title,
            category: DEFAULT_CATEGORY.to_string(),
        })
    }

    /// Set the category; a blank value keeps the current one.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        let category = category.trim();
        if !category.is_empty() {
            self.category = category.to_string();
        }
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

// ============================================================================
// Entry and Digest
// ============================================================================

/// One ingested item as it appears in a digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub title: String,
    pub link: String,
    #[serde(with = "timestamp")]
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub source_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub summary: String,
    /// Excerpt of the article; the backend sends `""` when there is none.
    #[serde(default, deserialize_with = "non_empty")]
    pub content: Option<String>,
    pub unread: bool,
}

/// Entries of one category, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    pub name: String,
    pub entries: Vec<Entry>,
}

/// The server's category-grouped view of one calendar day.
///
/// Categories keep the order in which they first appear in the response.
/// `total` always equals the number of entries held; a mismatching count
/// from the backend is corrected when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DigestRecord")]
pub struct Digest {
    pub date: NaiveDate,
    pub total: u64,
    #[serde(serialize_with = "serialize_categories")]
    pub categories: Vec<CategoryGroup>,
}

#[derive(Deserialize)]
struct DigestRecord {
    date: NaiveDate,
    #[serde(default)]
    total: u64,
    #[serde(default, deserialize_with = "deserialize_categories")]
    categories: Vec<CategoryGroup>,
}

impl From<DigestRecord> for Digest {
    fn from(record: DigestRecord) -> Self {
        let counted = record
            .categories
            .iter()
            .map(|group| group.entries.len() as u64)
            .sum::<u64>();
        if counted != record.total {
            tracing::warn!(
                date = %record.date,
                reported = record.total,
                counted,
                "Digest total does not match its entries, using the entry count"
            );
        }
        Digest {
            date: record.date,
            total: counted,
            categories: record.categories,
        }
    }
}

impl Digest {
    /// An empty digest for `date`.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total: 0,
            categories: Vec::new(),
        }
    }

    /// True when the day has no entries at all ("no digest" state).
    pub fn is_empty(&self) -> bool {
        self.categories.iter().all(|group| group.entries.is_empty())
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.categories.iter().flat_map(|group| group.entries.iter())
    }

    pub fn entry(&self, id: i64) -> Option<&Entry> {
        self.entries().find(|entry| entry.id == id)
    }

    pub fn unread(&self) -> usize {
        self.entries().filter(|entry| entry.unread).count()
    }
}

/// `POST /ingest` success body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IngestReport {
    #[serde(default)]
    pub inserted: u64,
}

// ============================================================================
// Serde helpers
// ============================================================================

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Read `categories` as an ordered list of groups, keeping key order.
///
/// A repeated key is folded into the group where it first appeared.
fn deserialize_categories<'de, D>(deserializer: D) -> Result<Vec<CategoryGroup>, D::Error>
where
    D: Deserializer<'de>,
{
    struct CategoriesVisitor;

    impl<'de> Visitor<'de> for CategoriesVisitor {
        type Value = Vec<CategoryGroup>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map from category name to a list of entries")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut groups: Vec<CategoryGroup> = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, entries)) = map.next_entry::<String, Vec<Entry>>()? {
                match groups.iter_mut().find(|group| group.name == name) {
                    Some(group) => group.entries.extend(entries),
                    None => groups.push(CategoryGroup { name, entries }),
                }
            }
            Ok(groups)
        }
    }

    deserializer.deserialize_any(CategoriesVisitor)
}

fn serialize_categories<S>(groups: &[CategoryGroup], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(groups.len()))?;
    for group in groups {
        map.serialize_entry(&group.name, &group.entries)?;
    }
    map.end()
}

/// Lenient ISO-8601 timestamps.
///
/// The backend stores timestamps as text and emits them both with an offset
/// (`2026-02-12T10:00:00+00:00`) and without one (`2026-02-12T10:00:00`,
/// `2026-02-12 10:00:00.123456`). Offset-less values are taken as UTC.
pub(crate) mod timestamp {
    use super::*;

    const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.trim().is_empty() => parse(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}"))),
            _ => Ok(None),
        }
    }
}
