//! Image encoding: page PNG on disk → base64 payload for the VLM request.
//!
//! VLM APIs accept images as base64 data embedded in the JSON request body.
//! The file is read back from disk (not kept in memory from rendering) so the
//! bytes sent are exactly the artifact the janitor will later delete. A file
//! that vanished or is not a PNG is an error, never an empty payload.

use crate::error::AnalyzeError;
use crate::pipeline::render::PageArtifact;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// A page ready to be embedded in the model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPage {
    /// 1-based page index of the source artifact.
    pub index: usize,
    /// Base64 (standard alphabet, padded) image bytes.
    pub data: String,
    pub media_type: &'static str,
}

/// Read and base64-encode one page image.
pub async fn encode_artifact(artifact: &PageArtifact) -> Result<EncodedPage, AnalyzeError> {
    let bytes = tokio::fs::read(&artifact.path)
        .await
        .map_err(|source| AnalyzeError::ArtifactUnreadable {
            page: artifact.index,
            path: artifact.path.clone(),
            source,
        })?;

    if bytes.is_empty() {
        return Err(AnalyzeError::CorruptArtifact {
            page: artifact.index,
            path: artifact.path.clone(),
            detail: "file is empty".into(),
        });
    }
    if !bytes.starts_with(PNG_SIGNATURE) {
        return Err(AnalyzeError::CorruptArtifact {
            page: artifact.index,
            path: artifact.path.clone(),
            detail: "missing PNG signature".into(),
        });
    }

    let data = STANDARD.encode(&bytes);
    debug!("Encoded page {} → {} bytes base64", artifact.index, data.len());

    Ok(EncodedPage {
        index: artifact.index,
        data,
        media_type: artifact.format.media_type(),
    })
}

/// Encode every artifact, preserving order. Stops at the first failure.
pub async fn encode_all(artifacts: &[PageArtifact]) -> Result<Vec<EncodedPage>, AnalyzeError> {
    let mut pages = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        pages.push(encode_artifact(artifact).await?);
    }
    Ok(pages)
}
