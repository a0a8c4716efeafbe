//! Result types produced by the pipeline.

use crate::error::AnalyzeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two fields recovered from a document.
///
/// Both are independently optional: a document without a reference number
/// is a valid, successful outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub barcode: Option<String>,
    #[serde(rename = "referenceNumber")]
    pub reference_number: Option<String>,
}

impl ExtractedFields {
    /// True when neither field was found.
    pub fn is_empty(&self) -> bool {
        self.barcode.is_none() && self.reference_number.is_none()
    }
}

/// Outcome of one `analyze_document` call.
pub type PipelineResult = Result<ExtractedFields, AnalyzeError>;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Rasterizing,
    Extracting,
    Parsing,
    Cleaning,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Fetching => "fetching",
            Stage::Rasterizing => "rasterizing",
            Stage::Extracting => "extracting",
            Stage::Parsing => "parsing",
            Stage::Cleaning => "cleaning",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// What the artifact janitor did for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Artifacts handed to the janitor.
    pub attempted: usize,
    /// Files actually deleted.
    pub removed: usize,
    /// Files that were already gone.
    pub already_missing: usize,
    /// Files whose removal failed for another reason.
    pub failed: usize,
}

/// A finished pipeline run: the result plus how it got there.
#[derive(Debug)]
pub struct PipelineRun {
    pub result: PipelineResult,
    /// The stage that failed, if any.
    pub failed_stage: Option<Stage>,
    pub cleanup: CleanupReport,
    pub duration_ms: u64,
}
