//! Test doubles shared by the integration tests.
//!
//! * [`UrlFetcher`] serves `%PDF-<n>` for `https://docs.test/<n>.pdf`, so the
//!   page count travels with the URL.
//! * [`PngBackend`] reads that count back from the transient PDF copy and
//!   writes page `i` as a PNG that is `i` pixels wide.
//! * [`RecordingModel`] decodes every image it is sent, records the widths
//!   (i.e. the page order it saw) and answers with a caller-supplied closure.
#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_pdfscan::pipeline::render::artifact_file_name;
use edgequake_pdfscan::{
    AnalyzeError, Analyzer, AnalyzerConfig, DocumentFetcher, ExtractionRequest, ModelReply,
    RasterBackend, SourceDocument, VisionModel,
};
use image::{ImageFormat, Rgba, RgbaImage};
use reqwest::Url;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

pub fn doc_url(pages: usize) -> String {
    format!("https://docs.test/{pages}.pdf")
}

// ── Fetcher ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct UrlFetcher {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl UrlFetcher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentFetcher for UrlFetcher {
    async fn fetch(&self, url: &Url) -> Result<SourceDocument, AnalyzeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AnalyzeError::DownloadFailed {
                url: url.to_string(),
                reason: "connection reset".into(),
            });
        }
        let pages = url
            .path()
            .trim_start_matches('/')
            .trim_end_matches(".pdf")
            .to_string();
        Ok(SourceDocument {
            url: url.clone(),
            bytes: format!("%PDF-{pages}").into_bytes(),
        })
    }
}

// ── Rasterizer ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct PngBackend {
    /// Fail when about to write this page (1-based).
    pub fail_at: Option<usize>,
    /// Write garbage instead of PNG data.
    pub corrupt: bool,
}

pub fn page_count(input: &Path) -> usize {
    let text = std::fs::read_to_string(input).expect("transient PDF copy must exist");
    text.trim_start_matches("%PDF-").parse().expect("page count")
}

impl RasterBackend for PngBackend {
    fn render(&self, input: &Path, out_dir: &Path, prefix: &str) -> Result<usize, AnalyzeError> {
        let pages = page_count(input);
        for i in 1..=pages {
            if self.fail_at == Some(i) {
                return Err(AnalyzeError::RasterisationFailed {
                    page: i,
                    detail: "injected failure".into(),
                });
            }
            let path = out_dir.join(artifact_file_name(prefix, i));
            if self.corrupt {
                std::fs::write(&path, b"not a png").unwrap();
            } else {
                RgbaImage::from_pixel(i as u32, 1, Rgba([0, 0, 0, 255]))
                    .save_with_format(&path, ImageFormat::Png)
                    .unwrap();
            }
        }
        Ok(pages)
    }
}

/// A [`PngBackend`] that sleeps before rendering.
pub struct LateBackend {
    pub delay: std::time::Duration,
    pub inner: PngBackend,
}

impl LateBackend {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: std::time::Duration::from_millis(delay_ms),
            inner: PngBackend::default(),
        }
    }
}

impl RasterBackend for LateBackend {
    fn render(&self, input: &Path, out_dir: &Path, prefix: &str) -> Result<usize, AnalyzeError> {
        std::thread::sleep(self.delay);
        self.inner.render(input, out_dir, prefix)
    }
}

// ── Model ────────────────────────────────────────────────────────────────

type Answer = dyn Fn(&[u32]) -> Result<String, String> + Send + Sync;

pub struct RecordingModel {
    answer: Box<Answer>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<Vec<u32>>>,
}

impl RecordingModel {
    pub fn new(answer: impl Fn(&[u32]) -> Result<String, String> + Send + Sync + 'static) -> Self {
        Self {
            answer: Box::new(answer),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_seen(&self) -> Vec<u32> {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl VisionModel for RecordingModel {
    async fn complete(&self, request: &ExtractionRequest) -> Result<ModelReply, AnalyzeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let widths: Vec<u32> = request
            .pages
            .iter()
            .map(|p| {
                assert_eq!(p.media_type, "image/png");
                let bytes = STANDARD.decode(&p.data).expect("base64");
                image::load_from_memory(&bytes).expect("png").width()
            })
            .collect();
        self.seen.lock().unwrap().push(widths.clone());

        match (self.answer)(&widths) {
            Ok(content) => Ok(ModelReply {
                content,
                prompt_tokens: 100,
                completion_tokens: 10,
            }),
            Err(message) => Err(AnalyzeError::LlmApiError { message }),
        }
    }
}

// ── Wiring ───────────────────────────────────────────────────────────────

pub fn analyzer(
    temp_dir: &Path,
    fetcher: Arc<dyn DocumentFetcher>,
    backend: Arc<dyn RasterBackend>,
    model: Arc<dyn VisionModel>,
) -> Analyzer {
    let config = AnalyzerConfig::builder()
        .temp_dir(temp_dir)
        .api_timeout_secs(5)
        .render_timeout_secs(5)
        .build()
        .unwrap();
    Analyzer::new(config, fetcher, backend, model)
}

/// Files left in `dir`.
pub fn leftovers(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}
