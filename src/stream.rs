//! Streaming extraction API: emit parsed pages as they complete.
//!
//! Unlike the eager [`crate::extract::extract`], which returns only once
//! every page is done and the records are deduplicated, [`extract_stream`]
//! yields one [`PageResult`] per page (with its candidates already parsed)
//! as soon as the model answers. With `concurrency > 1` pages may arrive out
//! of order.
//!
//! Streamed pages are *not* deduplicated. Collect them and pass the slice to
//! [`crate::extract::deduplicate_pages`] to get the same rows the eager API
//! produces.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, PageError};
use crate::extract::{process_page, report_encode_failure};
use crate::output::PageResult;
use crate::pipeline::llm::VisionRequester;
use crate::pipeline::{encode, input, render};
use edgequake_llm::ImageData;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageResult, PageError>> + Send>>;

/// Extract from a PDF, streaming pages as they are ready.
///
/// # Returns
/// - `Ok(PageStream)`: a stream of `Result<PageResult, PageError>`; a page
///   that failed to encode or whose request failed arrives as `Err`
/// - `Err(ExtractError)`: fatal error (file not found, not a PDF, no
///   provider configured, etc.)
pub async fn extract_stream(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<PageStream, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming extraction: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();

    let requester = Arc::new(VisionRequester::from_config(config)?);

    let metadata = render::extract_metadata(&pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;

    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(ExtractError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }
    let selected = page_indices.len();

    // Pages are rendered and encoded up front so the stream does not borrow
    // the (possibly temporary) PDF file.
    let rendered = render::render_pages(&pdf_path, config, &page_indices).await?;
    let encoded: Vec<(usize, Result<ImageData, PageError>)> = rendered
        .iter()
        .map(|(page_num, img)| (*page_num, encode::encode_page(*page_num, img)))
        .collect();
    drop(rendered);

    let concurrency = config.concurrency.max(1);
    let config_clone = config.clone();

    let s = stream::iter(encoded.into_iter().map(move |(page_num, encoded)| {
        let requester = Arc::clone(&requester);
        let cfg = config_clone.clone();
        async move {
            let image = match encoded {
                Ok(image) => image,
                Err(e) => {
                    report_encode_failure(&e, &cfg, selected);
                    return Err(e);
                }
            };
            let mut result = process_page(&*requester, page_num, image, &cfg, selected).await;
            match result.error.take() {
                None => Ok(result),
                Some(err) => Err(err),
            }
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}

/// Streaming equivalent of [`crate::extract::extract_from_bytes`].
///
/// The temp file is only needed until the pages are rendered, which happens
/// before this function returns.
pub async fn extract_stream_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<PageStream, ExtractError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| ExtractError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| ExtractError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    let stream = extract_stream(&path, config).await?;
    drop(tmp);
    Ok(stream)
}
