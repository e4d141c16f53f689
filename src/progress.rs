//! Progress-callback trait for per-page extraction events.
//!
//! Inject an `Arc<dyn ExtractionProgressCallback>` through
//! [`crate::config::ExtractionConfigBuilder::progress_callback`]. The CLI
//! uses it to drive its progress bar; library callers can forward the events
//! anywhere. With `concurrency > 1` the page events may arrive from several
//! tasks at once and out of page order.

use std::sync::Arc;

/// Called by the pipeline as it works through the document.
///
/// All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Once, after page selection, before any request is sent.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// A page returned a response; `candidates` is how many lines the parser
    /// accepted from it.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, candidates: usize) {
        let _ = (page_num, total_pages, candidates);
    }

    /// A page failed and contributes no candidates.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Once, after deduplication.
    fn on_extraction_complete(&self, total_pages: usize, success_count: usize, unique_records: usize) {
        let _ = (total_pages, success_count, unique_records);
    }
}

pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        candidates: AtomicUsize,
        errors: AtomicUsize,
        unique: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, candidates: usize) {
            self.candidates.fetch_add(candidates, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_extraction_complete(&self, _total: usize, _success: usize, unique_records: usize) {
            self.unique.store(unique_records, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 3);
        cb.on_page_error(2, 5, "timeout");
        cb.on_extraction_complete(5, 4, 9);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_page_start(1, 2);
        tracker.on_page_complete(1, 2, 4);
        tracker.on_page_start(2, 2);
        tracker.on_page_error(2, 2, "VLM timeout");
        tracker.on_extraction_complete(2, 1, 3);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.candidates.load(Ordering::SeqCst), 4);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.unique.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_extraction_start(10);
        cb.on_page_complete(1, 10, 0);
    }
}
