//! Response parsing: model text → [`CandidateRecord`]s.
//!
//! The model is asked for one `Product Name, Manufacturer` pair per line, but
//! what comes back is free text: refusals ("The image provided does not
//! contain…"), section headers, drawing labels such as `EF-1`, sheet
//! references. Each line is run through a fixed sequence of checks and either
//! becomes a candidate or is dropped. Dropping is never an error.
//!
//! ## Line algorithm
//!
//! 1. Skip empty lines and lines without a comma.
//! 2. Skip lines rejected by a line-level rule (boilerplate phrases).
//! 3. Split on the **first** comma; both trimmed halves must be non-empty.
//!    Everything after the first comma is the manufacturer, commas included.
//! 4. Skip when a product-level rule rejects the left half (drawing codes,
//!    digit-free names).
//! 5. Emit `(product, manufacturer, page)`.
//!
//! The heuristics live in [`ParserRules`] as named [`RejectionRule`]s so they
//! can be extended without touching the loop above.

use crate::output::CandidateRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Phrases the model uses when a page has nothing to extract.
pub const DEFAULT_BOILERPLATE_PHRASES: &[&str] = &[
    "there are no specific product entries",
    "the image provided does not contain",
    "cover page",
    "submittal data",
    "detailed information",
];

/// Stray drawing labels and sheet references emitted in place of products.
/// Matched against the whole product field, case-insensitively.
pub const DEFAULT_CODE_PATTERNS: &[&str] = &[r"[A-Z]{2}-\d", r"EF-\d", r"Product Data.*"];

/// Every character that ends a line in model output, bare `\r` included.
const LINE_BREAKS: &[char] = &[
    '\n', '\r', '\u{0B}', '\u{0C}', '\u{1C}', '\u{1D}', '\u{1E}', '\u{85}', '\u{2028}', '\u{2029}',
];

static RE_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());

static DEFAULT_RULES: Lazy<ParserRules> = Lazy::new(|| {
    ParserRules::new(vec![
        RejectionRule::boilerplate(DEFAULT_BOILERPLATE_PHRASES.iter().copied()),
        RejectionRule::code_patterns(DEFAULT_CODE_PATTERNS.iter().copied()).unwrap(),
        RejectionRule::RequiresDigitInProduct,
    ])
});

// ── Rules ────────────────────────────────────────────────────────────────────

/// A full-string, case-insensitive pattern over the product field.
#[derive(Debug, Clone)]
pub struct CodePattern {
    source: String,
    regex: Regex,
}

impl CodePattern {
    /// Compile `pattern` so that it must match the entire product field.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("(?i)^(?:{pattern})$"))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as supplied, without anchors or flags.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, product: &str) -> bool {
        self.regex.is_match(product)
    }
}

/// One named noise-filtering heuristic.
#[derive(Debug, Clone)]
pub enum RejectionRule {
    /// Drop the whole line when it contains any phrase (case-insensitive).
    /// Phrases are stored lowercased.
    RejectsByBoilerplatePhrase { phrases: Vec<String> },
    /// Drop the line when the product field fully matches any pattern.
    RejectsByCodePattern { patterns: Vec<CodePattern> },
    /// Drop the line when the product field carries no digit; real products
    /// always have a model or catalog number.
    RequiresDigitInProduct,
}

impl RejectionRule {
    pub fn boilerplate<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        RejectionRule::RejectsByBoilerplatePhrase {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn code_patterns<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| CodePattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RejectionRule::RejectsByCodePattern { patterns })
    }

    /// Stable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            RejectionRule::RejectsByBoilerplatePhrase { .. } => "boilerplate-phrase",
            RejectionRule::RejectsByCodePattern { .. } => "code-pattern",
            RejectionRule::RequiresDigitInProduct => "requires-digit",
        }
    }

    /// Line-level check. `lowered` is the full line, lowercased.
    fn rejects_line(&self, lowered: &str) -> bool {
        match self {
            RejectionRule::RejectsByBoilerplatePhrase { phrases } => {
                phrases.iter().any(|p| lowered.contains(p.as_str()))
            }
            _ => false,
        }
    }

    /// Product-level check on the trimmed left half of the line.
    fn rejects_product(&self, product: &str) -> bool {
        match self {
            RejectionRule::RejectsByCodePattern { patterns } => {
                patterns.iter().any(|p| p.is_match(product))
            }
            RejectionRule::RequiresDigitInProduct => !RE_DIGIT.is_match(product),
            RejectionRule::RejectsByBoilerplatePhrase { .. } => false,
        }
    }
}

/// The ordered set of rules applied by [`parse_response`].
#[derive(Debug, Clone)]
pub struct ParserRules {
    rules: Vec<RejectionRule>,
}

impl Default for ParserRules {
    /// Boilerplate phrases, drawing-code patterns, digit requirement.
    fn default() -> Self {
        DEFAULT_RULES.clone()
    }
}

impl ParserRules {
    pub fn new(rules: Vec<RejectionRule>) -> Self {
        Self { rules }
    }

    /// No heuristics: every well-formed `product, manufacturer` line is kept.
    pub fn none() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule after the existing ones.
    pub fn with_rule(mut self, rule: RejectionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[RejectionRule] {
        &self.rules
    }

    fn line_rejection(&self, line: &str) -> Option<&RejectionRule> {
        let lowered = line.to_lowercase();
        self.rules.iter().find(|r| r.rejects_line(&lowered))
    }

    fn product_rejection(&self, product: &str) -> Option<&RejectionRule> {
        self.rules.iter().find(|r| r.rejects_product(product))
    }
}

// ── Parser ───────────────────────────────────────────────────────────────────

/// Parse one page's model response into candidates, in line order.
///
/// Pure: the same text, page and rules always give the same output. An empty
/// response gives an empty vector.
pub fn parse_response(response: &str, page_num: usize, rules: &ParserRules) -> Vec<CandidateRecord> {
    let mut candidates = Vec::new();

    for line in response.split(LINE_BREAKS) {
        if line.is_empty() || !line.contains(',') {
            continue;
        }

        if let Some(rule) = rules.line_rejection(line) {
            debug!("Page {}: [{}] skipped {:?}", page_num, rule.name(), line);
            continue;
        }

        let Some((product, manufacturer)) = split_first_comma(line) else {
            debug!("Page {}: malformed line {:?}", page_num, line);
            continue;
        };

        if let Some(rule) = rules.product_rejection(product) {
            debug!("Page {}: [{}] rejected product {:?}", page_num, rule.name(), product);
            continue;
        }

        candidates.push(CandidateRecord::new(product, manufacturer, page_num));
    }

    debug!("Page {}: {} candidates", page_num, candidates.len());
    candidates
}

/// Split on the first comma; `None` unless both trimmed halves are non-empty.
fn split_first_comma(line: &str) -> Option<(&str, &str)> {
    let (left, right) = line.split_once(',')?;
    let (left, right) = (left.trim(), right.trim());
    if left.is_empty() || right.is_empty() {
        None
    } else {
        Some((left, right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str, page: usize) -> Vec<CandidateRecord> {
        parse_response(text, page, &ParserRules::default())
    }

    #[test]
    fn keeps_product_with_model_number() {
        let out = parse("DX08QGP Roof & Wall Exhaust Fan,PennBarry", 1);
        assert_eq!(
            out,
            vec![CandidateRecord::new(
                "DX08QGP Roof & Wall Exhaust Fan",
                "PennBarry",
                1
            )]
        );
    }

    #[test]
    fn lines_without_comma_are_skipped() {
        assert!(parse("DX08QGP Roof Exhaust Fan PennBarry", 1).is_empty());
        assert!(parse("\n\n   \n", 1).is_empty());
        assert!(parse("", 1).is_empty());
    }

    #[test]
    fn boilerplate_phrases_skip_whole_line() {
        let text = "There are no specific product entries on this page, sorry 123\n\
                    THE IMAGE PROVIDED DOES NOT CONTAIN products, 42\n\
                    Cover Page 1, N/A\n\
                    Submittal Data Sheet 7, Acme\n\
                    Model 5 detailed information, Acme";
        assert!(parse(text, 2).is_empty());
    }

    #[test]
    fn boilerplate_can_sit_in_manufacturer_half() {
        assert!(parse("Fan 12, see cover page", 1).is_empty());
    }

    #[test]
    fn splits_on_first_comma_only() {
        let out = parse("Fan 12, ABC Division, XYZ Corp", 3);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].raw_product, "Fan 12");
        assert_eq!(out[0].raw_manufacturer, "ABC Division, XYZ Corp");
        assert_eq!(out[0].page_num, 3);
    }

    #[test]
    fn empty_halves_are_skipped() {
        assert!(parse("Fan 12,", 1).is_empty());
        assert!(parse("Fan 12,   ", 1).is_empty());
        assert!(parse(", Acme 2", 1).is_empty());
    }

    #[test]
    fn drawing_codes_are_rejected() {
        assert!(parse("EF-1,Generic", 1).is_empty());
        assert!(parse("ab-3, Acme", 1).is_empty());
        assert!(parse("Product Data Sheet 4, Acme", 1).is_empty());
        assert!(parse("product data 2021, Acme", 1).is_empty());
    }

    #[test]
    fn code_patterns_are_full_matches() {
        // Two digits or a trailing description escape the "AB-1" pattern.
        assert_eq!(parse("EF-12,Generic", 1).len(), 1);
        assert_eq!(parse("EF-1 Exhaust Fan,Greenheck", 1).len(), 1);
        assert_eq!(parse("ABC-1,Acme", 1).len(), 1);
    }

    #[test]
    fn products_without_digits_are_rejected() {
        assert!(parse("Roof Curb Accessories,Acme", 1).is_empty());
        assert_eq!(parse("Roof Curb RC-24,Acme", 1).len(), 1);
    }

    #[test]
    fn keeps_line_order() {
        let text = "Fan 2,B\nFan 1,A\nFan 3,C";
        let products: Vec<_> = parse(text, 1)
            .into_iter()
            .map(|c| c.raw_product)
            .collect();
        assert_eq!(products, vec!["Fan 2", "Fan 1", "Fan 3"]);
    }

    #[test]
    fn handles_crlf_line_endings() {
        let out = parse("Fan 1,A\r\nFan 2,B\r\n", 1);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].raw_manufacturer, "B");
    }

    #[test]
    fn handles_bare_cr_line_endings() {
        let out = parse("Fan 1,Acme\rFan 2,Beta", 1);
        assert_eq!(
            out,
            vec![
                CandidateRecord::new("Fan 1", "Acme", 1),
                CandidateRecord::new("Fan 2", "Beta", 1),
            ]
        );
    }

    #[test]
    fn handles_unicode_line_separators() {
        let out = parse("Fan 1,Acme\u{2028}Fan 2,Beta\u{0C}Fan 3,Gamma", 1);
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].raw_product, "Fan 3");
    }

    #[test]
    fn mixed_page_from_model_output() {
        let text = "DX08QGP Roof & Wall Exhaust Fan,PennBarry\nEF-1,Generic\nCover Page, N/A";
        let out = parse(text, 4);
        assert_eq!(
            out,
            vec![CandidateRecord::new(
                "DX08QGP Roof & Wall Exhaust Fan",
                "PennBarry",
                4
            )]
        );
    }

    #[test]
    fn no_rules_keeps_every_well_formed_line() {
        let out = parse_response("Roof Curb Accessories,Acme\nEF-1,Generic", 1, &ParserRules::none());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn custom_rules_extend_defaults() {
        let rules = ParserRules::default()
            .with_rule(RejectionRule::boilerplate(["not legible"]))
            .with_rule(RejectionRule::code_patterns([r"SHEET \d+"]).unwrap());
        let text = "Page 3 is NOT LEGIBLE, 1\nSheet 12, Acme\nFan 7, Acme";
        let out = parse_response(text, 1, &rules);
        assert_eq!(out, vec![CandidateRecord::new("Fan 7", "Acme", 1)]);
    }

    #[test]
    fn default_rule_names() {
        let names: Vec<_> = ParserRules::default()
            .rules()
            .iter()
            .map(RejectionRule::name)
            .collect();
        assert_eq!(names, vec!["boilerplate-phrase", "code-pattern", "requires-digit"]);
    }

    #[test]
    fn invalid_code_pattern_is_an_error() {
        assert!(CodePattern::new("(unclosed").is_err());
        assert_eq!(CodePattern::new("EF-\\d").unwrap().as_str(), "EF-\\d");
    }
}
