//! Eager (full-document) extraction entry points.
//!
//! Every selected page is rendered, sent to the model and parsed; once all
//! pages are back they are put in page order and deduplicated in a single
//! pass. Deduplication never starts before the last page is in, because
//! "first occurrence" is defined in page order.
//!
//! [`extract_with_requester`] runs the same pipeline from already-encoded
//! page images onward against any [`ExtractionRequester`], which is how the
//! integration tests drive it without pdfium or network access.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, PageError};
use crate::output::{DocumentMetadata, ExtractionOutput, ExtractionStats, PageResult};
use crate::pipeline::dedup::{DedupOutcome, Deduplicator};
use crate::pipeline::llm::{ExtractionRequester, VisionRequester};
use crate::pipeline::{encode, input, parse, render, write};
use edgequake_llm::ImageData;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract the deduplicated product list from a PDF file or URL.
///
/// # Returns
/// `Ok(ExtractionOutput)` whenever the document could be opened, even if
/// some pages failed (check `output.stats.failed_pages`, or call
/// [`ExtractionOutput::into_result`]).
///
/// # Errors
/// Fatal errors only: file not found or not a PDF, wrong password, no
/// vision provider configured, empty page selection.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();

    // ── Step 2: Build the requester (fails fast on missing credentials) ──
    let requester = VisionRequester::from_config(config)?;

    // ── Step 3: Metadata and page selection ──────────────────────────────
    let metadata = render::extract_metadata(&pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;
    info!("PDF has {} pages", total_pages);

    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(ExtractError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }
    debug!("Selected {} pages", page_indices.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(page_indices.len());
    }

    // ── Step 4: Rasterise ────────────────────────────────────────────────
    let render_start = Instant::now();
    let rendered = render::render_pages(&pdf_path, config, &page_indices).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", rendered.len(), render_duration_ms);

    // ── Step 5: Encode; encoding failures become failed pages ────────────
    let mut encoded = Vec::with_capacity(rendered.len());
    let mut pages: Vec<PageResult> = Vec::new();
    for (page_num, img) in &rendered {
        match encode::encode_page(*page_num, img) {
            Ok(data) => encoded.push((*page_num, data)),
            Err(e) => {
                report_encode_failure(&e, config, page_indices.len());
                pages.push(PageResult::failed(*page_num, e, 0));
            }
        }
    }
    drop(rendered);

    // ── Step 6: Extraction requests + parsing ────────────────────────────
    let llm_start = Instant::now();
    pages.extend(process_pages(&requester, encoded, config, page_indices.len()).await);
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    // ── Step 7: Order, deduplicate, summarise ────────────────────────────
    let mut output = finish(pages, metadata, page_indices.len(), config);
    output.stats.render_duration_ms = render_duration_ms;
    output.stats.llm_duration_ms = llm_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Extraction complete: {} unique rows from {}/{} pages, {}ms total",
        output.stats.unique_records,
        output.stats.processed_pages,
        page_indices.len(),
        output.stats.total_duration_ms
    );

    Ok(output)
}

/// Run the pipeline from encoded page images onward.
///
/// `pages` holds `(page_number, image)` pairs with 1-based page numbers, in
/// any order. No rendering, no provider resolution: `requester` does the
/// extraction. Metadata in the output only carries the page count.
pub async fn extract_with_requester<R: ExtractionRequester>(
    requester: &R,
    pages: Vec<(usize, ImageData)>,
    config: &ExtractionConfig,
) -> ExtractionOutput {
    let start = Instant::now();
    let selected = pages.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(selected);
    }

    let results = process_pages(requester, pages, config, selected).await;
    let llm_duration_ms = start.elapsed().as_millis() as u64;

    let metadata = DocumentMetadata {
        page_count: selected,
        ..Default::default()
    };
    let mut output = finish(results, metadata, selected, config);
    output.stats.llm_duration_ms = llm_duration_ms;
    output.stats.total_duration_ms = start.elapsed().as_millis() as u64;
    output
}

/// Extract and write the CSV to `output_path`.
///
/// The file is only written once the whole document has been processed.
pub async fn extract_to_csv(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let output = extract(input_str, config).await?;
    write::write_csv(output_path.as_ref(), &output.records).await?;
    Ok(output)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

/// Read PDF metadata without extracting anything.
///
/// Does not require a vision provider or API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, ExtractError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    render::extract_metadata(resolved.path(), None).await
}

/// Extract from PDF bytes held in memory.
///
/// The bytes are written to a managed temp file that is removed on return.
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| ExtractError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| ExtractError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    extract(&path, config).await
}

/// Deduplicate the candidates of `pages` in page order, then line order.
///
/// `pages` may be in any order (e.g. completion order from a stream).
pub fn deduplicate_pages(pages: &[PageResult]) -> DedupOutcome {
    let mut ordered: Vec<&PageResult> = pages.iter().collect();
    ordered.sort_by_key(|p| p.page_num);

    let mut dedup = Deduplicator::new();
    for page in ordered {
        dedup.extend(&page.candidates);
    }
    dedup.finish()
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Request and parse each page, at most `config.concurrency` at a time.
///
/// With the default concurrency of 1 pages go out strictly one after
/// another in the order given. Results come back sorted by page number.
async fn process_pages<R: ExtractionRequester>(
    requester: &R,
    pages: Vec<(usize, ImageData)>,
    config: &ExtractionConfig,
    total_pages: usize,
) -> Vec<PageResult> {
    let mut results: Vec<PageResult> = stream::iter(pages.into_iter().map(|(page_num, image)| {
        process_page(requester, page_num, image, config, total_pages)
    }))
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await;

    results.sort_by_key(|p| p.page_num);
    results
}

/// One extraction request followed by parsing. Never fails: an upstream
/// error is recorded on the returned page.
pub(crate) async fn process_page<R: ExtractionRequester>(
    requester: &R,
    page_num: usize,
    image: ImageData,
    config: &ExtractionConfig,
    total_pages: usize,
) -> PageResult {
    info!("Processing page {}...", page_num);
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page_num, total_pages);
    }

    let start = Instant::now();
    let result = match requester.extract(page_num, image).await {
        Ok(raw) => {
            let candidates = parse::parse_response(&raw.text, page_num, &config.parser_rules);
            PageResult {
                page_num,
                response: raw.text,
                candidates,
                input_tokens: raw.input_tokens,
                output_tokens: raw.output_tokens,
                duration_ms: start.elapsed().as_millis() as u64,
                retries: raw.retries,
                error: None,
            }
        }
        Err(e) => {
            warn!("{}", e);
            PageResult::failed(page_num, e, start.elapsed().as_millis() as u64)
        }
    };

    if let Some(ref cb) = config.progress_callback {
        match &result.error {
            None => cb.on_page_complete(page_num, total_pages, result.candidates.len()),
            Some(e) => cb.on_page_error(page_num, total_pages, &e.to_string()),
        }
    }

    result
}

/// Log a page that could not be encoded and report it to the progress
/// callback as a started-then-failed page, like a failed request.
pub(crate) fn report_encode_failure(
    error: &PageError,
    config: &ExtractionConfig,
    total_pages: usize,
) {
    warn!("{}", error);
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(error.page(), total_pages);
        cb.on_page_error(error.page(), total_pages, &error.to_string());
    }
}

/// Sort pages, deduplicate, and compute stats (durations left at zero).
fn finish(
    mut pages: Vec<PageResult>,
    metadata: DocumentMetadata,
    selected: usize,
    config: &ExtractionConfig,
) -> ExtractionOutput {
    pages.sort_by_key(|p| p.page_num);

    let outcome = deduplicate_pages(&pages);
    if !outcome.duplicates.is_empty() {
        info!("Discarded {} duplicate rows", outcome.duplicates.len());
    }

    let processed = pages.iter().filter(|p| p.is_ok()).count();
    let failed = pages.len() - processed;

    let stats = ExtractionStats {
        total_pages: metadata.page_count,
        processed_pages: processed,
        failed_pages: failed,
        skipped_pages: selected.saturating_sub(pages.len()),
        candidate_count: pages.iter().map(|p| p.candidates.len()).sum(),
        unique_records: outcome.records.len(),
        duplicates_discarded: outcome.duplicates.len(),
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        ..Default::default()
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(selected, processed, stats.unique_records);
    }

    ExtractionOutput {
        records: outcome.records,
        pages,
        metadata,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{CandidateRecord, CleanRecord};
    use crate::progress::ExtractionProgressCallback;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn page(page_num: usize, candidates: &[(&str, &str)]) -> PageResult {
        PageResult {
            page_num,
            response: String::new(),
            candidates: candidates
                .iter()
                .map(|(p, m)| CandidateRecord::new(*p, *m, page_num))
                .collect(),
            input_tokens: 10,
            output_tokens: 5,
            duration_ms: 0,
            retries: 0,
            error: None,
        }
    }

    #[test]
    fn deduplicate_pages_uses_page_order_not_slice_order() {
        let pages = vec![
            page(3, &[("Fan X", "ACME")]),
            page(1, &[("Fan X", "Acme")]),
            page(2, &[("Fan Y", "Beta")]),
        ];
        let outcome = deduplicate_pages(&pages);
        assert_eq!(
            outcome.records,
            vec![CleanRecord::new("Fan X", "Acme", 1), CleanRecord::new("Fan Y", "Beta", 2)]
        );
    }

    #[test]
    fn finish_counts_pages_and_rows() {
        let mut failed = page(2, &[]);
        failed.error = Some(crate::error::PageError::Timeout { page: 2, secs: 60 });
        let pages = vec![page(1, &[("Fan 1", "A"), ("fan 1", "a")]), failed];
        let metadata = DocumentMetadata {
            page_count: 5,
            ..Default::default()
        };

        let out = finish(pages, metadata, 3, &ExtractionConfig::default());

        assert_eq!(out.stats.total_pages, 5);
        assert_eq!(out.stats.processed_pages, 1);
        assert_eq!(out.stats.failed_pages, 1);
        assert_eq!(out.stats.skipped_pages, 1);
        assert_eq!(out.stats.candidate_count, 2);
        assert_eq!(out.stats.unique_records, 1);
        assert_eq!(out.stats.duplicates_discarded, 1);
        assert_eq!(out.stats.total_input_tokens, 20);
        assert_eq!(out.pages[1].page_num, 2);
    }

    #[derive(Default)]
    struct ErrorCounter {
        starts: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ExtractionProgressCallback for ErrorCounter {
        fn on_page_start(&self, _page_num: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, page_num: usize, _total: usize, error: &str) {
            assert_eq!(page_num, 3);
            assert!(error.contains("encoding failed"));
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn encode_failure_is_reported_to_progress() {
        let cb = Arc::new(ErrorCounter::default());
        let config = ExtractionConfig::builder()
            .progress_callback(cb.clone())
            .build()
            .unwrap();
        let err = PageError::EncodeFailed {
            page: 3,
            detail: "bad pixels".into(),
        };

        report_encode_failure(&err, &config, 5);

        assert_eq!(cb.starts.load(Ordering::SeqCst), 1);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
    }
}
