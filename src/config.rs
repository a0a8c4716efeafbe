//! Configuration for the extraction pipeline.
//!
//! Every knob lives in [`AnalyzerConfig`], built once at process start via
//! [`AnalyzerConfigBuilder`] and handed to [`crate::analyze::Analyzer`]. Nothing
//! is read from the environment after that point; the binary maps its flags
//! and environment variables onto the builder.

use crate::error::AnalyzeError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for a document analysis.
///
/// # Example
/// ```rust
/// use edgequake_pdfscan::AnalyzerConfig;
///
/// let config = AnalyzerConfig::builder()
///     .model("gpt-4o")
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 16384);
/// ```
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// LLM model identifier, e.g. "gpt-4o". If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None, the provider is picked from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the model. Default: 0.1.
    pub temperature: f32,

    /// Output-token ceiling for the model answer. Default: 16384.
    ///
    /// Large enough that the JSON answer is never truncated; an answer cut
    /// short still parses through the regex fallback.
    pub max_tokens: usize,

    /// Retry attempts on a failed model call. Default: 0 (single attempt).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses the built-in one.
    pub system_prompt: Option<String>,

    /// Longest rendered page edge in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Directory holding the transient PDF copy and page images.
    /// Default: `<system temp>/pdfscan`.
    pub temp_dir: PathBuf,

    /// Explicit libpdfium location (file or directory). If None, binds the
    /// library next to the executable or the system one.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Largest accepted document body in bytes. Default: 50 MiB.
    pub max_download_bytes: u64,

    /// Download timeout in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Rasterisation timeout in seconds. Default: 120.
    pub render_timeout_secs: u64,

    /// Per model call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 16384,
            max_retries: 0,
            retry_backoff_ms: 500,
            system_prompt: None,
            max_rendered_pixels: 2000,
            temp_dir: std::env::temp_dir().join("pdfscan"),
            pdfium_lib_path: None,
            max_download_bytes: 50 * 1024 * 1024,
            download_timeout_secs: 120,
            render_timeout_secs: 120,
            api_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("temp_dir", &self.temp_dir)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("max_download_bytes", &self.max_download_bytes)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl AnalyzerConfig {
    /// Create a new builder for `AnalyzerConfig`.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model identifier that will be requested.
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
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

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = dir.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn max_download_bytes(mut self, n: u64) -> Self {
        self.config.max_download_bytes = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, AnalyzeError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(AnalyzeError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.download_timeout_secs == 0 || c.render_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(AnalyzeError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_download_bytes == 0 {
            return Err(AnalyzeError::InvalidConfig(
                "max_download_bytes must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = AnalyzerConfig::default();
        assert_eq!(c.max_tokens, 16384);
        assert_eq!(c.max_retries, 0);
        assert_eq!(c.model_or_default(), "gpt-4o");
        assert!(c.temp_dir.ends_with("pdfscan"));
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = AnalyzerConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = AnalyzerConfig::builder().api_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, AnalyzeError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_tokens() {
        assert!(AnalyzerConfig::builder().max_tokens(0).build().is_err());
    }

    #[test]
    fn debug_hides_provider() {
        let c = AnalyzerConfig::builder().model("gpt-4.1-mini").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("gpt-4.1-mini"));
    }
}
