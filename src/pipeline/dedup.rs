//! Deduplication: candidates → ordered, unique [`CleanRecord`]s.
//!
//! A single pass over every candidate of the document, in page order and then
//! line order. Each candidate is normalised, keyed case-insensitively on
//! `(product, manufacturer)`, and kept only if the key is new. The first
//! occurrence wins, so a record's page number is always the first page the
//! product was seen on. Later duplicates are dropped and never modify rows
//! already emitted.

use crate::output::{CandidateRecord, CleanRecord};
use crate::pipeline::normalize::{canonical_manufacturer, clean_field};
use std::collections::HashSet;
use tracing::debug;

/// Identity of a record regardless of casing or page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub product: String,
    pub manufacturer: String,
}

impl DedupKey {
    pub fn of(record: &CleanRecord) -> Self {
        Self {
            product: record.product_name.to_lowercase(),
            manufacturer: record.manufacturer.to_lowercase(),
        }
    }
}

/// Result of one deduplication pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupOutcome {
    /// Unique records in first-occurrence order.
    pub records: Vec<CleanRecord>,
    /// Normalised records that were discarded as duplicates, in input order.
    pub duplicates: Vec<CleanRecord>,
}

/// Owns the seen-key set for the duration of a pass.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<DedupKey>,
    records: Vec<CleanRecord>,
    duplicates: Vec<CleanRecord>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalise one candidate and keep it if its key is new.
    ///
    /// Returns `true` when the record was kept.
    pub fn push(&mut self, candidate: &CandidateRecord) -> bool {
        let record = normalise(candidate);
        if self.seen.insert(DedupKey::of(&record)) {
            self.records.push(record);
            true
        } else {
            debug!(
                "Duplicate skipped: {} / {} (page {})",
                record.product_name, record.manufacturer, record.page_number
            );
            self.duplicates.push(record);
            false
        }
    }

    pub fn extend<'a>(&mut self, candidates: impl IntoIterator<Item = &'a CandidateRecord>) {
        for candidate in candidates {
            self.push(candidate);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn finish(self) -> DedupOutcome {
        DedupOutcome {
            records: self.records,
            duplicates: self.duplicates,
        }
    }
}

/// Deduplicate a complete, page-ordered candidate sequence.
pub fn deduplicate<'a>(candidates: impl IntoIterator<Item = &'a CandidateRecord>) -> DedupOutcome {
    let mut dedup = Deduplicator::new();
    dedup.extend(candidates);
    dedup.finish()
}

fn normalise(candidate: &CandidateRecord) -> CleanRecord {
    CleanRecord {
        product_name: clean_field(&candidate.raw_product),
        manufacturer: canonical_manufacturer(&candidate.raw_manufacturer),
        page_number: candidate.page_num,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::UNSPECIFIED_MANUFACTURER;

    #[test]
    fn first_occurrence_wins_case_insensitively() {
        let candidates = vec![
            CandidateRecord::new("Fan X", "Acme", 1),
            CandidateRecord::new("Fan X", "ACME", 3),
            CandidateRecord::new("Fan Y", "Beta", 2),
        ];
        let outcome = deduplicate(&candidates);
        assert_eq!(
            outcome.records,
            vec![CleanRecord::new("Fan X", "Acme", 1), CleanRecord::new("Fan Y", "Beta", 2)]
        );
        assert_eq!(outcome.duplicates, vec![CleanRecord::new("Fan X", "ACME", 3)]);
    }

    #[test]
    fn keys_compare_after_cleaning_and_resolution() {
        let candidates = vec![
            CandidateRecord::new("\"Fan   12\"", "ABC Division, XYZ Corp", 1),
            CandidateRecord::new("fan 12", "xyz corp", 2),
            CandidateRecord::new("Fan 12", "Other Corp", 2),
        ];
        let outcome = deduplicate(&candidates);
        assert_eq!(
            outcome.records,
            vec![
                CleanRecord::new("Fan 12", "XYZ Corp", 1),
                CleanRecord::new("Fan 12", "Other Corp", 2),
            ]
        );
        assert_eq!(outcome.duplicates.len(), 1);
    }

    #[test]
    fn empty_manufacturer_uses_sentinel() {
        let outcome = deduplicate(&[CandidateRecord::new("Fan 1", "\"\"", 5)]);
        assert_eq!(
            outcome.records,
            vec![CleanRecord::new("Fan 1", UNSPECIFIED_MANUFACTURER, 5)]
        );
    }

    #[test]
    fn sentinel_participates_in_key() {
        let candidates = vec![
            CandidateRecord::new("Fan 1", "\"\"", 1),
            CandidateRecord::new("Fan 1", "unspecified manufacturer", 2),
        ];
        assert_eq!(deduplicate(&candidates).records.len(), 1);
    }

    #[test]
    fn push_reports_whether_kept() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.is_empty());
        assert!(dedup.push(&CandidateRecord::new("Fan 1", "A", 1)));
        assert!(!dedup.push(&CandidateRecord::new("FAN 1", "a", 2)));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn empty_input_gives_empty_outcome() {
        let outcome = deduplicate(&Vec::<CandidateRecord>::new());
        assert_eq!(outcome, DedupOutcome::default());
    }
}
