//! Cross-source deduplication.
//!
//! Records are the same entity iff their `url` fields are equal. There is no
//! DOI or fuzzy-title matching: two differently-URLed records describing the
//! same work both survive.

use std::collections::HashSet;

use crate::models::CanonicalRecord;

/// Result of a deduplication check.
#[derive(Debug, PartialEq, Eq)]
pub enum DedupResult {
    /// First occurrence of this URL.
    New,
    /// A record with this URL was already seen.
    DuplicateUrl(String),
}

/// Tracks seen URLs across one merge.
#[derive(Debug, Default)]
pub struct UrlDeduplicator {
    seen: HashSet<String>,
}

impl UrlDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with URLs that are already known (e.g. stored records).
    pub fn with_known<'a>(urls: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            seen: urls.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn check(&mut self, record: &CanonicalRecord) -> DedupResult {
        if self.seen.insert(record.url.clone()) {
            DedupResult::New
        } else {
            DedupResult::DuplicateUrl(record.url.clone())
        }
    }
}

/// Drop every record whose `url` was already seen; first occurrence wins and
/// insertion order is otherwise preserved.
pub fn dedup_by_url(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let mut dedup = UrlDeduplicator::new();
    records
        .into_iter()
        .filter(|r| dedup.check(r) == DedupResult::New)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn record(url: &str, title: &str) -> CanonicalRecord {
        CanonicalRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            authors: vec![],
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            doi: None,
            url: url.to_string(),
            language: "en".into(),
            source: SourceKind::OpenAlex,
            abstract_text: String::new(),
            full_text_chunks: vec![],
            files: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn first_occurrence_wins() {
        let first = record("https://doi.org/10.1/a", "First title");
        let second = record("https://doi.org/10.1/a", "Different title");
        let out = dedup_by_url(vec![first.clone(), second]);
        assert_eq!(out, vec![first]);
    }

    #[test]
    fn order_is_preserved() {
        let recs = vec![record("u1", "a"), record("u2", "b"), record("u1", "c"), record("u3", "d")];
        let titles: Vec<_> = dedup_by_url(recs).into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["a", "b", "d"]);
    }

    #[test]
    fn same_doi_different_url_both_survive() {
        let mut a = record("https://doi.org/10.1/x", "a");
        let mut b = record("https://publisher.example/x", "b");
        a.doi = Some("10.1/x".into());
        b.doi = Some("10.1/x".into());
        assert_eq!(dedup_by_url(vec![a, b]).len(), 2);
    }

    #[test]
    fn known_urls_are_duplicates() {
        let mut dedup = UrlDeduplicator::with_known(["u1"]);
        assert_eq!(dedup.check(&record("u1", "a")), DedupResult::DuplicateUrl("u1".into()));
        assert_eq!(dedup.check(&record("u2", "b")), DedupResult::New);
    }
}
