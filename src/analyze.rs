//! Pipeline orchestration: URL in, [`ExtractedFields`] out.
//!
//! [`Analyzer`] runs the stages strictly in sequence:
//!
//! ```text
//! Idle → Fetching → Rasterizing → Extracting → Parsing → Cleaning → Done
//! ```
//!
//! A failing stage jumps straight to `Cleaning`. Cleanup is not repeated per
//! branch: the [`ArtifactJanitor`] is created before the first stage, every
//! page image is registered with it, and it is finished exactly once after
//! the stages return, whatever they returned.

use crate::config::AnalyzerConfig;
use crate::error::AnalyzeError;
use crate::output::{ExtractedFields, PipelineResult, PipelineRun, Stage};
use crate::pipeline::cleanup::ArtifactJanitor;
use crate::pipeline::input::{self, DocumentFetcher, HttpFetcher};
use crate::pipeline::llm::{self, ProviderModel, VisionModel};
use crate::pipeline::render::{self, PdfiumBackend, RasterBackend, RequestId};
use crate::pipeline::{encode, parse};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, Instrument};

/// Analyse the document at `url` with a one-off [`Analyzer`] built from
/// `config`.
///
/// Long-running services should build one `Analyzer` at start-up and share it
/// instead; this resolves the provider on every call.
pub async fn analyze_document(url: &str, config: &AnalyzerConfig) -> PipelineResult {
    let analyzer = Analyzer::from_config(config.clone())?;
    analyzer.analyze_document(url).await
}

/// The extraction pipeline and its collaborators.
///
/// Holds no per-request state; share it behind an `Arc` between requests.
#[derive(Clone)]
pub struct Analyzer {
    config: AnalyzerConfig,
    fetcher: Arc<dyn DocumentFetcher>,
    backend: Arc<dyn RasterBackend>,
    model: Arc<dyn VisionModel>,
}

impl Analyzer {
    /// Production wiring: HTTP fetcher, pdfium backend, provider from config.
    pub fn from_config(config: AnalyzerConfig) -> Result<Self, AnalyzeError> {
        let provider = resolve_provider(&config)?;
        let fetcher = HttpFetcher::from_config(&config)?;
        let backend = PdfiumBackend::from_config(&config);
        Ok(Self::new(
            config,
            Arc::new(fetcher),
            Arc::new(backend),
            Arc::new(ProviderModel::new(provider)),
        ))
    }

    pub fn new(
        config: AnalyzerConfig,
        fetcher: Arc<dyn DocumentFetcher>,
        backend: Arc<dyn RasterBackend>,
        model: Arc<dyn VisionModel>,
    ) -> Self {
        Self {
            config,
            fetcher,
            backend,
            model,
        }
    }

    /// Run the pipeline and return only its result.
    pub async fn analyze_document(&self, url: &str) -> PipelineResult {
        self.run(url).await.result
    }

    /// Run the pipeline and report the result, failing stage and cleanup.
    pub async fn run(&self, url: &str) -> PipelineRun {
        let request_id = RequestId::new();
        let span = info_span!("analyze", request = %request_id);
        self.run_inner(url, request_id).instrument(span).await
    }

    async fn run_inner(&self, url: &str, request_id: RequestId) -> PipelineRun {
        let start = Instant::now();
        info!("Starting analysis: {}", url);

        let mut janitor = ArtifactJanitor::new(request_id.clone());
        let mut stage = Stage::Idle;

        let result = self
            .execute(url, &request_id, &mut janitor, &mut stage)
            .await;
        let failed_stage = result.is_err().then_some(stage);

        transition(&mut stage, Stage::Cleaning);
        let cleanup = janitor.finish();
        transition(&mut stage, Stage::Done);

        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(fields) => info!(
                "Analysis complete in {}ms (barcode: {}, reference: {}, {} page images removed)",
                duration_ms,
                fields.barcode.is_some(),
                fields.reference_number.is_some(),
                cleanup.removed
            ),
            Err(e) => error!(
                "Analysis failed while {} [{}]: {} ({} page images removed)",
                failed_stage.unwrap_or(Stage::Idle),
                e.kind(),
                e,
                cleanup.removed
            ),
        }

        PipelineRun {
            result,
            failed_stage,
            cleanup,
            duration_ms,
        }
    }

    async fn execute(
        &self,
        url: &str,
        request_id: &RequestId,
        janitor: &mut ArtifactJanitor,
        stage: &mut Stage,
    ) -> Result<ExtractedFields, AnalyzeError> {
        transition(stage, Stage::Fetching);
        let url = input::validate_url(url)?;
        let document = self.fetcher.fetch(&url).await?;

        transition(stage, Stage::Rasterizing);
        let artifacts = render::rasterize(
            Arc::clone(&self.backend),
            document,
            request_id,
            &self.config,
            janitor,
        )
        .await?;

        transition(stage, Stage::Extracting);
        let pages = encode::encode_all(&artifacts).await?;
        let answer = llm::extract(self.model.as_ref(), pages, &self.config).await?;

        transition(stage, Stage::Parsing);
        parse::parse_answer(&answer)
    }
}

fn transition(stage: &mut Stage, next: Stage) {
    debug!("{} → {}", stage, next);
    *stage = next;
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, AnalyzeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalyzeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. a pre-built provider in `config.provider`;
/// 2. `config.provider_name` with the configured model;
/// 3. OpenAI when `OPENAI_API_KEY` is set;
/// 4. whatever [`ProviderFactory::from_env`] detects.
pub fn resolve_provider(config: &AnalyzerConfig) -> Result<Arc<dyn LLMProvider>, AnalyzeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model_or_default();

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalyzeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
