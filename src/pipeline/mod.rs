//! Pipeline stages for submittal extraction.
//!
//! Each submodule implements one transformation step and is testable on its
//! own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ parse ──▶ dedup ──▶ write
//! (path/URL) (pdfium)  (base64)  (VLM)   (lines)   (rows)    (CSV)
//!                                          │
//!                                      normalize
//! ```
//!
//! 1. [`input`]: canonicalise the user-supplied path or URL to a local file
//! 2. [`render`]: rasterise selected pages in `spawn_blocking`
//! 3. [`encode`]: PNG-encode and base64-wrap each page image
//! 4. [`llm`]: the extraction request; the only stage with network I/O
//! 5. [`parse`]: noisy model text → candidate records
//! 6. [`normalize`] / [`dedup`]: clean fields, resolve manufacturer, drop
//!    repeats across the whole document
//! 7. [`write`]: fixed-header CSV output

pub mod dedup;
pub mod encode;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod parse;
pub mod render;
pub mod write;
