//! CSV output: serialise [`CleanRecord`]s with a fixed header.
//!
//! Dialect: UTF-8, comma-delimited, quotes only where a field needs them,
//! CRLF record terminator. The header is written even for an empty dataset
//! so downstream tools always see the three columns.

use crate::error::ExtractError;
use crate::output::CleanRecord;
use crate::pipeline::input::is_url;
use std::path::{Path, PathBuf};
use tracing::info;

/// Column names, in order.
pub const CSV_HEADER: [&str; 3] = ["product_name", "manufacturer", "page_number"];

/// Serialise records (header first) into any writer.
pub fn write_records<W: std::io::Write>(out: W, records: &[CleanRecord]) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::CRLF)
        .from_writer(out);

    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Serialise records into an in-memory buffer.
pub fn to_csv_bytes(records: &[CleanRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut buf = Vec::new();
    write_records(&mut buf, records)?;
    Ok(buf)
}

/// Write records to `path`, creating parent directories as needed.
///
/// Uses atomic write (temp file + rename) so a crash never leaves a
/// half-written CSV behind.
pub async fn write_csv(path: &Path, records: &[CleanRecord]) -> Result<(), ExtractError> {
    let bytes = to_csv_bytes(records).map_err(|e| ExtractError::CsvWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let write_failed = |e| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, &bytes).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)?;

    info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

/// `<output_dir>/<input base name>.csv`.
///
/// For URLs the last path segment is used; inputs without a usable name fall
/// back to `extracted.csv`.
pub fn csv_output_path(input: &str, output_dir: &Path) -> PathBuf {
    let stem = if is_url(input) {
        reqwest::Url::parse(input)
            .ok()
            .and_then(|url| {
                url.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .and_then(|last| file_stem(Path::new(&last)))
    } else {
        file_stem(Path::new(input))
    };

    let stem = stem.unwrap_or_else(|| "extracted".to_string());
    output_dir.join(format!("{stem}.csv"))
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}
