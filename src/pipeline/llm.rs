//! Extraction requests: one page image in, raw model text out.
//!
//! [`ExtractionRequester`] is the seam between the pipeline and the vision
//! model. [`VisionRequester`] implements it over an `edgequake-llm` provider;
//! tests implement it with scripted responses.
//!
//! A failed request never escapes as a fatal error. It comes back as a
//! [`PageError`], the page is recorded as failed, and it contributes zero
//! candidates while every other page carries on.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, PageError};
use crate::prompts::DEFAULT_EXTRACTION_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Text returned by the model for one page, plus usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Attempts beyond the first.
    pub retries: u8,
}

impl RawResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Sends one page image to a vision model.
pub trait ExtractionRequester: Send + Sync {
    fn extract(
        &self,
        page_num: usize,
        image: ImageData,
    ) -> impl Future<Output = Result<RawResponse, PageError>> + Send;
}

/// [`ExtractionRequester`] backed by an `edgequake-llm` provider.
///
/// ## Retry Strategy
///
/// With `max_retries > 0`, failed or timed-out calls are retried with
/// exponential backoff (`retry_backoff_ms * 2^(attempt-1)`). The default is a
/// single attempt per page.
pub struct VisionRequester {
    provider: Arc<dyn LLMProvider>,
    prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
}

impl VisionRequester {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            prompt: config
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTRACTION_PROMPT.to_string()),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Resolve the provider from `config` (see [`resolve_provider`]).
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }
}

impl ExtractionRequester for VisionRequester {
    async fn extract(&self, page_num: usize, image: ImageData) -> Result<RawResponse, PageError> {
        // Single user turn: the page image plus the instruction text.
        let messages = vec![ChatMessage::user_with_images(
            self.prompt.as_str(),
            vec![image],
        )];

        let mut last_err: Option<PageError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_delay(self.retry_backoff_ms, attempt);
                warn!(
                    "Page {}: retry {}/{} after {}ms",
                    page_num, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(self.api_timeout, self.provider.chat(&messages, Some(&self.options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Page {}: {} input tokens, {} output tokens",
                        page_num, response.prompt_tokens, response.completion_tokens
                    );
                    return Ok(RawResponse {
                        text: response.content,
                        input_tokens: response.prompt_tokens as usize,
                        output_tokens: response.completion_tokens as usize,
                        retries: retry_count(attempt),
                    });
                }
                Ok(Err(e)) => {
                    warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, e);
                    last_err = Some(PageError::LlmFailed {
                        page: page_num,
                        retries: retry_count(self.max_retries),
                        detail: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(
                        "Page {}: attempt {} timed out after {}s",
                        page_num,
                        attempt + 1,
                        self.api_timeout.as_secs()
                    );
                    last_err = Some(PageError::Timeout {
                        page: page_num,
                        secs: self.api_timeout.as_secs(),
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| PageError::LlmFailed {
            page: page_num,
            retries: retry_count(self.max_retries),
            detail: "Unknown error".to_string(),
        }))
    }
}

/// Retry counts are reported as `u8`; larger configured values saturate.
fn retry_count(n: u32) -> u8 {
    u8::try_from(n).unwrap_or(u8::MAX)
}

fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Delay before retry `attempt` (1-based).
fn backoff_delay(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16))
}

// ── Provider resolution ──────────────────────────────────────────────────────

/// Resolve the vision provider, most specific first:
///
/// 1. `config.provider`: used as-is (tests, custom middleware).
/// 2. `config.provider_name` + model: built by [`ProviderFactory`], which
///    reads the matching API key from the environment.
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. `OPENAI_API_KEY` present → OpenAI with the configured model.
/// 5. [`ProviderFactory::from_env`] auto-detection.
///
/// A missing credential is reported here, once, as
/// [`ExtractError::ProviderNotConfigured`], before any page is rendered.
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|key| !key.is_empty()) {
        return create_vision_provider("openai", config.model_or_default());
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from the environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&ExtractionConfig::default());
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(1024));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(500, 1), 500);
        assert_eq!(backoff_delay(500, 2), 1000);
        assert_eq!(backoff_delay(500, 3), 2000);
        assert_eq!(backoff_delay(u64::MAX, 40), u64::MAX);
    }

    #[test]
    fn retry_count_saturates() {
        assert_eq!(retry_count(0), 0);
        assert_eq!(retry_count(3), 3);
        assert_eq!(retry_count(255), 255);
        assert_eq!(retry_count(256), u8::MAX);
        assert_eq!(retry_count(1000), u8::MAX);
    }

    #[test]
    fn raw_response_from_text() {
        let r = RawResponse::text("Fan 1, Acme");
        assert_eq!(r.text, "Fan 1, Acme");
        assert_eq!(r.retries, 0);
    }
}
