//! VLM interaction: send every page of the document in one request.
//!
//! All pages go into a single user message, in page order, because the
//! barcode and the reference number may sit on different pages of one logical
//! document. Prompt wording lives in [`crate::prompts`].
//!
//! The model is reached through the [`VisionModel`] trait. [`ProviderModel`]
//! adapts any `edgequake_llm` provider; tests substitute their own.
//!
//! ## Retries
//!
//! A single attempt by default. When `max_retries` is raised, failed attempts
//! back off exponentially (`retry_backoff_ms * 2^attempt`).

use crate::config::AnalyzerConfig;
use crate::error::AnalyzeError;
use crate::pipeline::encode::EncodedPage;
use crate::prompts::{DEFAULT_SYSTEM_PROMPT, PROMPT_VERSION, USER_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Everything the model needs for one extraction.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Pages in document order.
    pub pages: Vec<EncodedPage>,
    pub max_tokens: usize,
    pub temperature: f32,
}

/// The model's answer.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// A multimodal chat model.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(&self, request: &ExtractionRequest) -> Result<ModelReply, AnalyzeError>;
}

/// [`VisionModel`] backed by an `edgequake_llm` provider.
#[derive(Clone)]
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl VisionModel for ProviderModel {
    /// Message layout: system prompt, then one user message carrying the text
    /// instruction and every page image at `detail: "high"` so fine print
    /// such as barcode digits survives the provider's downscaling.
    async fn complete(&self, request: &ExtractionRequest) -> Result<ModelReply, AnalyzeError> {
        let images: Vec<ImageData> = request
            .pages
            .iter()
            .map(|p| ImageData::new(p.data.clone(), p.media_type).with_detail("high"))
            .collect();

        let messages = vec![
            ChatMessage::system(request.system_prompt.as_str()),
            ChatMessage::user_with_images(request.user_prompt.as_str(), images),
        ];

        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| AnalyzeError::LlmApiError {
                message: e.to_string(),
            })?;

        Ok(ModelReply {
            content: response.content,
            prompt_tokens: response.prompt_tokens as usize,
            completion_tokens: response.completion_tokens as usize,
        })
    }
}

/// Build the request for `pages` from the configured prompts and limits.
pub fn build_request(pages: Vec<EncodedPage>, config: &AnalyzerConfig) -> ExtractionRequest {
    ExtractionRequest {
        system_prompt: config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        user_prompt: USER_PROMPT.to_string(),
        pages,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    }
}

/// Delay before retry number `attempt` (1-based), saturating instead of
/// overflowing for large retry counts.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Ask the model about all pages and return its raw text answer.
pub async fn extract(
    model: &dyn VisionModel,
    pages: Vec<EncodedPage>,
    config: &AnalyzerConfig,
) -> Result<String, AnalyzeError> {
    if pages.is_empty() {
        return Err(AnalyzeError::NoPagesToSend);
    }

    let request = build_request(pages, config);
    let timeout = Duration::from_secs(config.api_timeout_secs);
    info!(
        "Sending {} pages to model {} (prompt v{})",
        request.pages.len(),
        config.model_or_default(),
        PROMPT_VERSION
    );

    let start = Instant::now();
    let mut last_err = AnalyzeError::EmptyModelAnswer;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "Model call retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let outcome = match tokio::time::timeout(timeout, model.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(AnalyzeError::ApiTimeout {
                secs: config.api_timeout_secs,
            }),
        };

        match outcome {
            Ok(reply) if !reply.content.trim().is_empty() => {
                debug!(
                    "{} input tokens, {} output tokens, {:?}",
                    reply.prompt_tokens,
                    reply.completion_tokens,
                    start.elapsed()
                );
                return Ok(reply.content);
            }
            Ok(_) => {
                warn!("Attempt {} returned an empty answer", attempt + 1);
                last_err = AnalyzeError::EmptyModelAnswer;
            }
            Err(e) => {
                warn!("Attempt {} failed: {}", attempt + 1, e);
                last_err = e;
            }
        }
    }

    Err(last_err)
}
