//! Configuration types for submittal extraction.
//!
//! Every knob of a run lives in [`ExtractionConfig`], built via
//! [`ExtractionConfigBuilder`]. The vision provider is part of the config too
//! (either pre-built or resolved from a name plus environment credentials),
//! so nothing in the pipeline reaches for process-global client state and a
//! test can swap in its own requester.

use crate::error::ExtractError;
use crate::pipeline::parse::ParserRules;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for one extraction run.
///
/// # Example
/// ```rust
/// use submittal2csv::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(150)
///     .concurrency(4)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI. Range: 72–400. Default: 150.
    ///
    /// Submittal sheets carry small model numbers in tables and title
    /// blocks; 150 DPI keeps those legible while the PNG stays well under
    /// provider upload limits.
    pub dpi: u32,

    /// Cap on either edge of a rendered page, in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Concurrent extraction requests. Default: 1 (strictly sequential).
    ///
    /// Results are always re-ordered by page before deduplication, so the
    /// output does not depend on this value.
    pub concurrency: usize,

    /// Model identifier, e.g. "gpt-4.1-mini". Falls back to [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "gemini", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Output tokens per page. Default: 1024.
    ///
    /// One line per product; even a dense equipment schedule rarely needs
    /// more than a few hundred tokens.
    pub max_tokens: usize,

    /// Retries per page on a failed request. Default: 0 (one attempt).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Instruction prompt override. Default: [`crate::prompts::DEFAULT_EXTRACTION_PROMPT`].
    pub prompt: Option<String>,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Noise-filtering rules for the response parser.
    pub parser_rules: ParserRules,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-request timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Receives per-page events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_rendered_pixels: 2000,
            concurrency: 1,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 1024,
            max_retries: 0,
            retry_backoff_ms: 500,
            password: None,
            prompt: None,
            pages: PageSelection::default(),
            parser_rules: ParserRules::default(),
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("pages", &self.pages)
            .field("parser_rules", &self.parser_rules.rules().len())
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured model, or [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn parser_rules(mut self, rules: ParserRules) -> Self {
        self.config.parser_rules = rules;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(ExtractError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_retries > u8::MAX as u32 {
            return Err(ExtractError::InvalidConfig(format!(
                "max_retries must be ≤ {}, got {}",
                u8::MAX,
                c.max_retries
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if matches!(c.prompt.as_deref(), Some(p) if p.trim().is_empty()) {
            return Err(ExtractError::InvalidConfig("Prompt must not be empty".into()));
        }
        Ok(self.config)
    }
}

/// Which pages of the PDF to process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand into sorted, deduplicated 0-indexed page numbers, clipped to
    /// the document.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let in_doc = |p: &usize| (1..=total_pages).contains(p);
        let mut indices: Vec<usize> = match self {
            Self::All => (0..total_pages).collect(),
            Self::Single(p) => Some(*p).filter(in_doc).map(|p| p - 1).into_iter().collect(),
            Self::Range(start, end) => ((*start).max(1)..=(*end).min(total_pages))
                .map(|p| p - 1)
                .collect(),
            Self::Set(pages) => pages.iter().filter(|p| in_doc(*p)).map(|p| p - 1).collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Parses `all`, `5`, `3-15` or `1,3,5,7` (1-indexed).
impl FromStr for PageSelection {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let page = |p: &str| -> Result<usize, ExtractError> {
            match p.trim().parse::<usize>() {
                Ok(0) => Err(ExtractError::InvalidConfig(
                    "Pages are 1-indexed, minimum is 1".into(),
                )),
                Ok(n) => Ok(n),
                Err(_) => Err(ExtractError::InvalidConfig(format!(
                    "Invalid page number: '{}'",
                    p.trim()
                ))),
            }
        };

        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (page(start)?, page(end)?);
            if start > end {
                return Err(ExtractError::InvalidConfig(format!(
                    "Invalid page range '{start}-{end}': start must be <= end"
                )));
            }
            return Ok(Self::Range(start, end));
        }

        if s.contains(',') {
            return s.split(',').map(page).collect::<Result<_, _>>().map(Self::Set);
        }

        page(s).map(Self::Single)
    }
}
