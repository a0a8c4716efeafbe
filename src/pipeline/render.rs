//! PDF rasterisation: document bytes → one PNG file per page.
//!
//! The contract with the rendering backend is file-system mediated. The
//! source bytes are written to a temporary copy, the [`RasterBackend`] writes
//! `page_<request-id>_<index>.png` files next to it, and this module discovers
//! them again by listing the directory for the request's prefix. Several
//! requests share the same directory, so the prefix must be unique per request:
//! [`RequestId`] combines a process-wide counter with a random UUID.
//!
//! The page index parsed back from each file name is the sort key. Directory
//! listing order is not stable across platforms, so it is never relied on.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and CPU-heavy rendering.
//! The backend runs on tokio's blocking pool so async workers stay free.

use crate::config::AnalyzerConfig;
use crate::error::AnalyzeError;
use crate::pipeline::cleanup::ArtifactJanitor;
use crate::pipeline::input::SourceDocument;
use pdfium_render::prelude::*;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-unique identifier of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        let seq = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("{seq}-{}", Uuid::new_v4().simple()))
    }

    /// File-name prefix shared by every page image of this request.
    pub fn artifact_prefix(&self) -> String {
        format!("page_{}_", self.0)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raster format of every page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
}

impl RasterFormat {
    pub fn extension(self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            RasterFormat::Png => "image/png",
        }
    }
}

/// One rendered page on disk. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageArtifact {
    pub index: usize,
    pub path: PathBuf,
    pub format: RasterFormat,
}

/// File name of page `index` (1-based) for the given prefix.
///
/// Backends must name their output with this function.
pub fn artifact_file_name(prefix: &str, index: usize) -> String {
    format!("{prefix}{index:05}.{}", RasterFormat::Png.extension())
}

/// Recover the page index from a file name produced by [`artifact_file_name`].
pub fn parse_artifact_index(prefix: &str, file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix(prefix)?
        .strip_suffix(".png")?
        .parse()
        .ok()
}

/// External rasterisation capability.
///
/// Renders every page of the PDF at `input` into `out_dir`, naming page `i`
/// `artifact_file_name(prefix, i)`, and returns the page count. Called on a
/// blocking thread.
pub trait RasterBackend: Send + Sync {
    fn render(&self, input: &Path, out_dir: &Path, prefix: &str) -> Result<usize, AnalyzeError>;
}

/// Rasterise `document` into page artifacts, registering every produced file
/// with `janitor`.
///
/// Files are registered before any check on them, so a backend that fails
/// halfway still has its partial output cleaned up. If the render outlives
/// `render_timeout_secs`, or this future is dropped before the files are
/// registered, an [`InFlightRender`] guard sweeps the request's prefix once the
/// blocking render has settled.
pub async fn rasterize(
    backend: Arc<dyn RasterBackend>,
    document: SourceDocument,
    request_id: &RequestId,
    config: &AnalyzerConfig,
    janitor: &mut ArtifactJanitor,
) -> Result<Vec<PageArtifact>, AnalyzeError> {
    if !document.bytes.starts_with(b"%PDF") {
        let magic = document.bytes.iter().take(4).copied().collect();
        return Err(AnalyzeError::NotAPdf { magic });
    }

    let out_dir = config.temp_dir.clone();
    let prefix = request_id.artifact_prefix();

    let task_dir = out_dir.clone();
    let task_prefix = prefix.clone();
    let task_id = request_id.clone();
    let task_backend = Arc::clone(&backend);
    let bytes = document.bytes;
    // The transient copy lives inside the closure, so it is removed exactly
    // when the render settles.
    let handle = tokio::task::spawn_blocking(move || {
        std::fs::create_dir_all(&task_dir)
            .map_err(|e| AnalyzeError::Internal(format!("Failed to create temp dir: {e}")))?;
        let input = write_source_copy(&bytes, &task_dir, &task_id)?;
        drop(bytes);
        task_backend.render(input.path(), &task_dir, &task_prefix)
    });
    let mut render = InFlightRender::new(handle, out_dir.clone(), prefix.clone());

    let secs = config.render_timeout_secs;
    let Some(outcome) = render.wait(Duration::from_secs(secs)).await else {
        warn!("Rasterisation timed out after {}s; cleanup deferred", secs);
        return Err(AnalyzeError::RasterTimeout { secs });
    };

    // A render that could not even create the directory reports that error,
    // not the failed listing.
    let artifacts = match discover_artifacts(&out_dir, &prefix).await {
        Ok(found) => found,
        Err(e) => {
            outcome?;
            return Err(e);
        }
    };
    for artifact in &artifacts {
        janitor.track(artifact.clone());
    }
    render.disarm();

    let reported = outcome?;
    if artifacts.is_empty() {
        return Err(AnalyzeError::NoPages);
    }
    if artifacts.len() != reported || !is_contiguous(&artifacts) {
        return Err(AnalyzeError::PageCountMismatch {
            reported,
            found: artifacts.len(),
        });
    }

    info!("Rasterised {} pages", artifacts.len());
    Ok(artifacts)
}

/// A blocking render whose output is not yet owned by the janitor.
///
/// Dropped while armed, it spawns a task that waits for the render to finish
/// and then deletes every file carrying the request's prefix.
struct InFlightRender {
    handle: Option<JoinHandle<Result<usize, AnalyzeError>>>,
    dir: PathBuf,
    prefix: String,
    armed: bool,
}

impl InFlightRender {
    fn new(handle: JoinHandle<Result<usize, AnalyzeError>>, dir: PathBuf, prefix: String) -> Self {
        Self {
            handle: Some(handle),
            dir,
            prefix,
            armed: true,
        }
    }

    /// Wait up to `limit` for the render. `None` on timeout; the task keeps
    /// running and stays owned by the guard.
    async fn wait(&mut self, limit: Duration) -> Option<Result<usize, AnalyzeError>> {
        let handle = self.handle.as_mut()?;
        let joined = tokio::time::timeout(limit, handle).await.ok()?;
        self.handle = None;
        Some(
            joined
                .map_err(|e| AnalyzeError::Internal(format!("Render task panicked: {e}")))
                .and_then(|r| r),
        )
    }

    /// The janitor has taken over every file; nothing left to sweep.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightRender {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let handle = self.handle.take();
        let dir = std::mem::take(&mut self.dir);
        let prefix = std::mem::take(&mut self.prefix);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Some(handle) = handle {
                        let _ = handle.await;
                    }
                    let swept = sweep_prefix(&dir, &prefix).await;
                    debug!("Swept {} page images of an abandoned render", swept);
                });
            }
            Err(_) => warn!(
                "No runtime to sweep abandoned page images '{}*' in {}",
                prefix,
                dir.display()
            ),
        }
    }
}

fn write_source_copy(
    bytes: &[u8],
    dir: &Path,
    request_id: &RequestId,
) -> Result<tempfile::NamedTempFile, AnalyzeError> {
    let mut file = tempfile::Builder::new()
        .prefix(&format!("source_{request_id}_"))
        .suffix(".pdf")
        .tempfile_in(dir)
        .map_err(|e| AnalyzeError::Internal(format!("tempfile: {e}")))?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|e| AnalyzeError::Internal(format!("tempfile write: {e}")))?;
    Ok(file)
}

/// List the page images of one request, sorted by page index.
///
/// Files that carry the prefix but no parsable index are still returned (with
/// index 0, sorted first) so they get cleaned up; the caller's contiguity check
/// rejects them.
async fn discover_artifacts(dir: &Path, prefix: &str) -> Result<Vec<PageArtifact>, AnalyzeError> {
    let list_err =
        |e: std::io::Error| AnalyzeError::Internal(format!("Failed to list temp dir: {e}"));
    let mut entries = tokio::fs::read_dir(dir).await.map_err(list_err)?;

    let mut artifacts = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(prefix) {
            continue;
        }
        let index = parse_artifact_index(prefix, name).unwrap_or_else(|| {
            warn!("Unexpected file with request prefix: {}", name);
            0
        });
        artifacts.push(PageArtifact {
            index,
            path: entry.path(),
            format: RasterFormat::Png,
        });
    }

    artifacts.sort_by_key(|a| a.index);
    Ok(artifacts)
}

fn is_contiguous(artifacts: &[PageArtifact]) -> bool {
    artifacts.iter().enumerate().all(|(i, a)| a.index == i + 1)
}

/// Delete every file in `dir` starting with `prefix`. Returns how many went.
async fn sweep_prefix(dir: &Path, prefix: &str) -> usize {
    let Ok(found) = discover_artifacts(dir, prefix).await else {
        return 0;
    };
    let mut removed = 0;
    for artifact in &found {
        if tokio::fs::remove_file(&artifact.path).await.is_ok() {
            removed += 1;
        }
    }
    removed
}

// ── pdfium backend ───────────────────────────────────────────────────────

/// Renders pages with pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
    max_rendered_pixels: u32,
}

impl PdfiumBackend {
    pub fn new(library_path: Option<PathBuf>, max_rendered_pixels: u32) -> Self {
        Self {
            library_path,
            max_rendered_pixels,
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(config.pdfium_lib_path.clone(), config.max_rendered_pixels)
    }

    /// Bind libpdfium: explicit path (file or directory) first, then the
    /// working directory, then the system library.
    fn bind(&self) -> Result<Pdfium, AnalyzeError> {
        let bindings = match &self.library_path {
            Some(path) if path.is_file() => Pdfium::bind_to_library(path),
            Some(dir) => {
                Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| AnalyzeError::PdfiumBindingFailed(format!("{:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

impl RasterBackend for PdfiumBackend {
    fn render(&self, input: &Path, out_dir: &Path, prefix: &str) -> Result<usize, AnalyzeError> {
        let pdfium = self.bind()?;

        let document = pdfium.load_pdf_from_file(input, None).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                AnalyzeError::PasswordRequired
            } else {
                AnalyzeError::CorruptPdf { detail: err_str }
            }
        })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let render_config = PdfRenderConfig::new()
            .set_target_width(self.max_rendered_pixels as i32)
            .set_maximum_height(self.max_rendered_pixels as i32);

        for (i, page) in pages.iter().enumerate() {
            let page_num = i + 1;
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                AnalyzeError::RasterisationFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            let path = out_dir.join(artifact_file_name(prefix, page_num));
            image
                .save_with_format(&path, image::ImageFormat::Png)
                .map_err(|e| AnalyzeError::RasterisationFailed {
                    page: page_num,
                    detail: format!("PNG write failed: {e}"),
                })?;

            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );
        }

        Ok(total_pages)
    }
}
