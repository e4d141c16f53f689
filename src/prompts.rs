//! Instruction prompt for the extraction request.
//!
//! The response parser expects exactly the format requested here: one
//! `Product Name, Manufacturer Name` pair per line, no header. Changing the
//! requested format means changing [`crate::pipeline::parse`] as well.

/// Default prompt sent alongside each page image.
///
/// Used when [`crate::config::ExtractionConfig::prompt`] is `None`.
pub const DEFAULT_EXTRACTION_PROMPT: &str = "You are a document parser for a construction product submittal PDF.
Extract a list of distinct product entries from this page.
Format: Product Name, Manufacturer Name (CSV, no header). Only include actual products.
Each product must include a model number if present, and a clear descriptive name.
The manufacturer should be inferred from the page layout or branding, not just who submitted the document.
Avoid listing features or internal specs as separate products.
Example: DX08QGP Roof & Wall Exhaust Fan,PennBarry";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::parse::{parse_response, ParserRules};

    #[test]
    fn prompt_example_line_survives_the_parser() {
        let example = DEFAULT_EXTRACTION_PROMPT
            .lines()
            .find_map(|l| l.strip_prefix("Example: "))
            .expect("prompt carries an example line");
        let parsed = parse_response(example, 1, &ParserRules::default());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].raw_manufacturer, "PennBarry");
    }
}
