//! # submittal2csv
//!
//! Turn construction product submittal PDFs into a deduplicated CSV of
//! `product_name, manufacturer, page_number` rows using a vision model.
//!
//! Submittal packages are scanned cut sheets, data sheets and cover pages
//! from many vendors. Their text layer is unreliable or missing, so each page
//! is rasterised and a vision model is asked to list the products it shows.
//! The model's answer is noisy; the parser, normaliser and deduplicator turn
//! it into one clean row per distinct product.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Render    rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Encode    PNG → base64 ImageData
//!  ├─ 4. Request   one vision-model call per page (sequential by default)
//!  ├─ 5. Parse     "Product, Manufacturer" lines → candidates, noise rejected
//!  ├─ 6. Dedup     normalise fields, keep first occurrence in page order
//!  └─ 7. Write     product_name,manufacturer,page_number CSV
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use submittal2csv::{extract_to_csv, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ExtractionConfig::default();
//!     let output = extract_to_csv("submittal.pdf", "output/submittal.csv", &config).await?;
//!     eprintln!(
//!         "{} unique rows from {} pages",
//!         output.stats.unique_records, output.stats.processed_pages
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `submittal2csv` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ```toml
//! submittal2csv = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, PageSelection, DEFAULT_MODEL};
pub use error::{ExtractError, PageError};
pub use extract::{
    deduplicate_pages, extract, extract_from_bytes, extract_sync, extract_to_csv,
    extract_with_requester, inspect,
};
pub use output::{
    CandidateRecord, CleanRecord, DocumentMetadata, ExtractionOutput, ExtractionStats, PageResult,
};
pub use pipeline::dedup::{deduplicate, DedupOutcome, Deduplicator};
pub use pipeline::llm::{ExtractionRequester, RawResponse, VisionRequester};
pub use pipeline::normalize::{clean_field, resolve_manufacturer, UNSPECIFIED_MANUFACTURER};
pub use pipeline::parse::{parse_response, ParserRules, RejectionRule};
pub use pipeline::write::{csv_output_path, write_csv};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{extract_stream, extract_stream_from_bytes, PageStream};
