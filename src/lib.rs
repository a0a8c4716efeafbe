//! # edgequake-pdfscan
//!
//! Extract a barcode value and a reference number from PDF documents using
//! Vision Language Models (VLMs).
//!
//! Invoices, shipping labels and official letters print their identifiers in
//! every imaginable layout. Instead of template matching, this crate
//! rasterises each page into a PNG and asks a VLM to read the two fields,
//! then recovers them from the answer even when the model does not reply
//! with clean JSON.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Fetch   validate the URL, download the PDF bytes
//!  ├─ 2. Render  one PNG per page via pdfium (spawn_blocking, temp files)
//!  ├─ 3. Encode  PNG → base64 image payload
//!  ├─ 4. VLM     a single call with every page, in page order
//!  ├─ 5. Parse   fenced JSON → bare JSON → text scan
//!  └─ 6. Clean   delete every page image, on every outcome
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfscan::{analyze_document, AnalyzerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = AnalyzerConfig::default();
//!     let fields = analyze_document("https://example.com/invoice.pdf", &config).await?;
//!     println!("barcode: {:?}", fields.barcode);
//!     println!("reference: {:?}", fields.reference_number);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfscan` HTTP server binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze_document, resolve_provider, Analyzer};
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder};
pub use error::{AnalyzeError, ErrorKind};
pub use output::{CleanupReport, ExtractedFields, PipelineResult, PipelineRun, Stage};
pub use pipeline::input::{DocumentFetcher, HttpFetcher, SourceDocument};
pub use pipeline::llm::{ExtractionRequest, ModelReply, ProviderModel, VisionModel};
pub use pipeline::render::{PageArtifact, PdfiumBackend, RasterBackend, RequestId};
