//! Error types for the edgequake-pdfscan library.
//!
//! Every stage of the pipeline fails with an [`AnalyzeError`]. The variants are
//! grouped into classes by [`ErrorKind`] so the HTTP layer (and any other
//! caller) can map a failure to a status without matching every variant:
//!
//! | Kind            | Meaning                                         |
//! |-----------------|-------------------------------------------------|
//! | `Validation`    | the caller sent a missing or malformed URL      |
//! | `Fetch`         | the remote document could not be retrieved      |
//! | `Rasterization` | the document is unreadable or produced no pages |
//! | `Encoding`      | a rendered page image could not be read back    |
//! | `Extraction`    | the model call failed or answered nothing       |
//! | `Internal`      | configuration or runtime faults                 |
//!
//! A model answer that simply lacks the barcode or reference number is not an
//! error: it yields [`crate::output::ExtractedFields`] with `None` fields.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the extraction pipeline.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The request carried no URL, or an empty one.
    #[error("URL parameter is required")]
    MissingUrl,

    /// The URL could not be parsed.
    #[error("Invalid URL format '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    /// The URL parsed but does not use HTTP or HTTPS.
    #[error("Unsupported URL scheme '{scheme}' in '{url}': only http and https are allowed")]
    UnsupportedScheme { url: String, scheme: String },

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// Network-level failure while downloading the document.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The remote server answered with a non-success status.
    #[error("Download of '{url}' returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// The document body is larger than the configured ceiling.
    #[error("Document at '{url}' exceeds the {limit} byte download limit")]
    DocumentTooLarge { url: String, limit: u64 },

    // ── Rasterization errors ──────────────────────────────────────────────
    /// The downloaded bytes are not a PDF.
    #[error("Downloaded document is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// The PDF is encrypted; passwords are not accepted by this service.
    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The document converted to zero page images.
    #[error("PDF could not be converted to images: no pages were produced")]
    NoPages,

    /// The rasterizer reported a different number of pages than it wrote.
    #[error("Rasterizer reported {reported} pages but {found} page images were found")]
    PageCountMismatch { reported: usize, found: usize },

    /// Rendering exceeded the configured timeout.
    #[error("Rasterisation timed out after {secs}s")]
    RasterTimeout { secs: u64 },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install libpdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Encoding errors ───────────────────────────────────────────────────
    /// A page image could not be read back from disk.
    #[error("Page {page} image '{path}' is unreadable: {source}")]
    ArtifactUnreadable {
        page: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A page image exists but is not a usable PNG.
    #[error("Page {page} image '{path}' is corrupt: {detail}")]
    CorruptArtifact {
        page: usize,
        path: PathBuf,
        detail: String,
    },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The extractor was called without any page.
    #[error("No page images to send to the model")]
    NoPagesToSend,

    /// The LLM API returned an error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The LLM call exceeded the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// The model answered with an empty body.
    #[error("LLM returned an empty answer")]
    EmptyModelAnswer,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure class of an [`AnalyzeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Fetch,
    Rasterization,
    Encoding,
    Extraction,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Fetch => "fetch",
            ErrorKind::Rasterization => "rasterization",
            ErrorKind::Encoding => "encoding",
            ErrorKind::Extraction => "extraction",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl AnalyzeError {
    /// The failure class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        use AnalyzeError::*;
        match self {
            MissingUrl | InvalidUrl { .. } | UnsupportedScheme { .. } => ErrorKind::Validation,
            DownloadFailed { .. }
            | DownloadTimeout { .. }
            | HttpStatus { .. }
            | DocumentTooLarge { .. } => ErrorKind::Fetch,
            NotAPdf { .. }
            | CorruptPdf { .. }
            | PasswordRequired
            | RasterisationFailed { .. }
            | NoPages
            | PageCountMismatch { .. }
            | RasterTimeout { .. }
            | PdfiumBindingFailed(_) => ErrorKind::Rasterization,
            ArtifactUnreadable { .. } | CorruptArtifact { .. } => ErrorKind::Encoding,
            ProviderNotConfigured { .. }
            | NoPagesToSend
            | LlmApiError { .. }
            | ApiTimeout { .. }
            | EmptyModelAnswer => ErrorKind::Extraction,
            InvalidConfig(_) | Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failures_are_distinguishable() {
        let network = AnalyzeError::DownloadFailed {
            url: "https://example.com/a.pdf".into(),
            reason: "connection refused".into(),
        };
        let status = AnalyzeError::HttpStatus {
            url: "https://example.com/a.pdf".into(),
            status: 404,
        };
        let timeout = AnalyzeError::DownloadTimeout {
            url: "https://example.com/a.pdf".into(),
            secs: 5,
        };

        assert!(network.to_string().contains("connection refused"));
        assert!(status.to_string().contains("HTTP 404"));
        assert!(timeout.to_string().contains("timed out after 5s"));
        for e in [&network, &status, &timeout] {
            assert_eq!(e.kind(), ErrorKind::Fetch);
        }
    }

    #[test]
    fn validation_kind() {
        assert_eq!(AnalyzeError::MissingUrl.kind(), ErrorKind::Validation);
        let e = AnalyzeError::InvalidUrl {
            input: "nope".into(),
            reason: "relative URL without a base".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Validation);
        assert!(e.to_string().contains("nope"));
    }

    #[test]
    fn no_pages_is_rasterization() {
        assert_eq!(AnalyzeError::NoPages.kind(), ErrorKind::Rasterization);
    }

    #[test]
    fn empty_answer_is_extraction() {
        assert_eq!(AnalyzeError::EmptyModelAnswer.kind(), ErrorKind::Extraction);
    }

    #[test]
    fn kind_display() {
        assert_eq!(ErrorKind::Rasterization.to_string(), "rasterization");
        assert_eq!(ErrorKind::Fetch.to_string(), "fetch");
    }
}
