//! Records, per-page results and run statistics.
//!
//! The record types mirror the two stages of the pipeline: a
//! [`CandidateRecord`] is what the response parser accepted from one line of
//! model output, verbatim; a [`CleanRecord`] is a normalised, deduplicated
//! output row. Everything here is `Serialize` so the CLI can emit `--json`.

use crate::error::{ExtractError, PageError};
use serde::{Deserialize, Serialize};

/// An unvalidated `(product, manufacturer, page)` triple straight from the
/// response parser. Text fields are trimmed but otherwise untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub raw_product: String,
    pub raw_manufacturer: String,
    /// 1-indexed page the line was read from.
    pub page_num: usize,
}

impl CandidateRecord {
    pub fn new(
        raw_product: impl Into<String>,
        raw_manufacturer: impl Into<String>,
        page_num: usize,
    ) -> Self {
        Self {
            raw_product: raw_product.into(),
            raw_manufacturer: raw_manufacturer.into(),
            page_num,
        }
    }
}

/// A normalised output row.
///
/// Field names double as the CSV header: `product_name,manufacturer,page_number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanRecord {
    pub product_name: String,
    /// Never empty; falls back to [`crate::pipeline::normalize::UNSPECIFIED_MANUFACTURER`].
    pub manufacturer: String,
    /// First page on which this product/manufacturer pair was seen.
    pub page_number: usize,
}

impl CleanRecord {
    pub fn new(
        product_name: impl Into<String>,
        manufacturer: impl Into<String>,
        page_number: usize,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            manufacturer: manufacturer.into(),
            page_number,
        }
    }
}

/// Outcome of the extraction request and parse for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Raw text returned by the vision model. Empty when the page failed.
    pub response: String,
    /// Candidates accepted by the response parser, in line order.
    pub candidates: Vec<CandidateRecord>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Attempts beyond the first.
    pub retries: u8,
    /// Set when the page could not be extracted.
    pub error: Option<PageError>,
}

impl PageResult {
    /// A page that failed before or during the extraction request.
    pub fn failed(page_num: usize, error: PageError, duration_ms: u64) -> Self {
        Self {
            page_num,
            response: String::new(),
            candidates: Vec::new(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms,
            retries: 0,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// PDF document information, available without calling a model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Aggregate counters for one extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Selected pages that returned a model response.
    pub processed_pages: usize,
    /// Selected pages whose extraction failed.
    pub failed_pages: usize,
    /// Selected pages that never reached the model (render/encode gaps).
    pub skipped_pages: usize,
    /// Candidates accepted by the parser across all pages.
    pub candidate_count: usize,
    /// Rows in the final dataset.
    pub unique_records: usize,
    /// Candidates discarded as duplicates of an earlier row.
    pub duplicates_discarded: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub llm_duration_ms: u64,
}

/// Everything produced by [`crate::extract`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// The deduplicated dataset, in first-occurrence order.
    pub records: Vec<CleanRecord>,
    /// Per-page outcomes, sorted by page number.
    pub pages: Vec<PageResult>,
    pub metadata: DocumentMetadata,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Treat any failed page as an error.
    ///
    /// By default a run succeeds as long as it could open the document; this
    /// is for callers that prefer all-or-nothing semantics.
    pub fn into_result(self) -> Result<Self, ExtractError> {
        if self.stats.failed_pages == 0 {
            return Ok(self);
        }
        Err(ExtractError::PartialFailure {
            success: self.stats.processed_pages,
            failed: self.stats.failed_pages,
            total: self.pages.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_with(failed: usize, processed: usize) -> ExtractionOutput {
        ExtractionOutput {
            records: vec![],
            pages: (1..=failed + processed)
                .map(|n| PageResult {
                    page_num: n,
                    response: String::new(),
                    candidates: vec![],
                    input_tokens: 0,
                    output_tokens: 0,
                    duration_ms: 0,
                    retries: 0,
                    error: None,
                })
                .collect(),
            metadata: DocumentMetadata::default(),
            stats: ExtractionStats {
                processed_pages: processed,
                failed_pages: failed,
                ..Default::default()
            },
        }
    }

    #[test]
    fn into_result_ok_when_no_failures() {
        assert!(output_with(0, 3).into_result().is_ok());
    }

    #[test]
    fn into_result_reports_partial_failure() {
        let err = output_with(1, 2).into_result().unwrap_err();
        match err {
            ExtractError::PartialFailure {
                success,
                failed,
                total,
            } => {
                assert_eq!((success, failed, total), (2, 1, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failed_page_has_no_candidates() {
        let page = PageResult::failed(
            2,
            PageError::Timeout { page: 2, secs: 60 },
            10,
        );
        assert!(!page.is_ok());
        assert!(page.candidates.is_empty());
        assert!(page.response.is_empty());
    }

    #[test]
    fn clean_record_serialises_with_csv_field_names() {
        let json = serde_json::to_string(&CleanRecord::new("Fan X1", "Acme", 1)).unwrap();
        assert_eq!(
            json,
            r#"{"product_name":"Fan X1","manufacturer":"Acme","page_number":1}"#
        );
    }
}
