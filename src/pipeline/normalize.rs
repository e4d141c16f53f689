//! Field normalisation for candidate records.
//!
//! Two small, pure functions:
//!
//! - [`clean_field`] strips quoting artefacts and collapses whitespace.
//! - [`resolve_manufacturer`] picks the canonical manufacturer out of a
//!   comma-joined value. Vision models often answer `Division, Parent Company`
//!   and the last segment is the actual manufacturer.

/// Substituted when no manufacturer can be resolved.
pub const UNSPECIFIED_MANUFACTURER: &str = "Unspecified Manufacturer";

/// Straight and curly single/double quotes.
const QUOTE_CHARS: &[char] = &['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// Normalise a raw text field.
///
/// Trims, strips leading/trailing runs of quote characters, removes any quote
/// characters left inside, collapses every whitespace run (newlines and tabs
/// included) to a single space. Idempotent.
pub fn clean_field(raw: &str) -> String {
    let stripped = raw.trim().trim_matches(QUOTE_CHARS);
    let unquoted: String = stripped.chars().filter(|c| !QUOTE_CHARS.contains(c)).collect();
    unquoted.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Return the last non-empty comma-separated segment of a cleaned
/// manufacturer field, or `None` if there is none.
pub fn resolve_manufacturer(cleaned: &str) -> Option<&str> {
    cleaned
        .split(',')
        .map(str::trim)
        .rfind(|segment| !segment.is_empty())
}

/// Clean and resolve a raw manufacturer, falling back to
/// [`UNSPECIFIED_MANUFACTURER`].
pub fn canonical_manufacturer(raw: &str) -> String {
    let cleaned = clean_field(raw);
    resolve_manufacturer(&cleaned)
        .unwrap_or(UNSPECIFIED_MANUFACTURER)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_collapses_whitespace() {
        assert_eq!(clean_field("  Roof   Exhaust\tFan\n 12 "), "Roof Exhaust Fan 12");
    }

    #[test]
    fn strips_surrounding_quotes() {
        assert_eq!(clean_field("\"Fan 12\""), "Fan 12");
        assert_eq!(clean_field("\u{201C}Fan 12\u{201D}"), "Fan 12");
        assert_eq!(clean_field("''\u{2018}Fan 12\u{2019}"), "Fan 12");
    }

    #[test]
    fn removes_embedded_quotes() {
        assert_eq!(clean_field("12\" Duct \u{201C}Round\u{201D}"), "12 Duct Round");
        assert_eq!(clean_field("Lowe's 4"), "Lowes 4");
    }

    #[test]
    fn quote_then_space_is_fully_trimmed() {
        assert_eq!(clean_field("\u{201C} Fan 12 \u{201D}"), "Fan 12");
    }

    #[test]
    fn clean_is_idempotent() {
        let samples = [
            "",
            "   ",
            "\"\"",
            "  \"Fan\u{00A0}12\" ",
            "\u{201C} Fan 12\u{201D}",
            "a\n\n\tb  'c' \"d\"",
            "Greenheck Fan Corp.",
            "' '  x ' '",
        ];
        for s in samples {
            let once = clean_field(s);
            assert_eq!(clean_field(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn resolves_last_segment() {
        assert_eq!(resolve_manufacturer("ABC Division, XYZ Corp"), Some("XYZ Corp"));
        assert_eq!(resolve_manufacturer("PennBarry"), Some("PennBarry"));
    }

    #[test]
    fn resolve_skips_empty_segments() {
        assert_eq!(resolve_manufacturer("Acme, "), Some("Acme"));
        assert_eq!(resolve_manufacturer(" , ,"), None);
        assert_eq!(resolve_manufacturer(""), None);
    }

    #[test]
    fn canonical_manufacturer_falls_back_to_sentinel() {
        assert_eq!(canonical_manufacturer("\"\""), UNSPECIFIED_MANUFACTURER);
        assert_eq!(canonical_manufacturer("\"Loren Cook, Inc\""), "Inc");
        assert_eq!(canonical_manufacturer(" Ruskin Division,  Air Balance "), "Air Balance");
    }
}
