//! Guaranteed removal of page images.
//!
//! [`ArtifactJanitor`] is a scope guard owned by the orchestrator for the whole
//! life of a request. The rasterizer registers every page file with it as soon
//! as the file is discovered. The orchestrator calls [`ArtifactJanitor::finish`]
//! once, after the last stage, whatever the outcome; if the guard is dropped
//! without `finish` (a panic unwinding through the pipeline) `Drop` performs
//! the same sweep. Either way each file is removed at most once.

use crate::output::CleanupReport;
use crate::pipeline::render::{PageArtifact, RequestId};
use std::io::ErrorKind;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct ArtifactJanitor {
    request_id: RequestId,
    artifacts: Vec<PageArtifact>,
    swept: bool,
}

impl ArtifactJanitor {
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            artifacts: Vec::new(),
            swept: false,
        }
    }

    /// Take responsibility for removing `artifact`.
    pub fn track(&mut self, artifact: PageArtifact) {
        self.artifacts.push(artifact);
    }

    /// Number of artifacts registered so far.
    pub fn tracked(&self) -> usize {
        self.artifacts.len()
    }

    /// Remove every tracked artifact and report what happened.
    pub fn finish(mut self) -> CleanupReport {
        self.sweep()
    }

    fn sweep(&mut self) -> CleanupReport {
        if self.swept {
            return CleanupReport::default();
        }
        self.swept = true;

        let mut report = CleanupReport {
            attempted: self.artifacts.len(),
            ..Default::default()
        };

        for artifact in self.artifacts.drain(..) {
            match std::fs::remove_file(&artifact.path) {
                Ok(()) => report.removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => report.already_missing += 1,
                Err(e) => {
                    warn!(
                        "Request {}: failed to remove page {} image '{}': {}",
                        self.request_id,
                        artifact.index,
                        artifact.path.display(),
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        debug!(
            "Request {}: cleanup removed {}/{} page images",
            self.request_id, report.removed, report.attempted
        );
        report
    }
}

impl Drop for ArtifactJanitor {
    fn drop(&mut self) {
        if !self.swept {
            self.sweep();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::RasterFormat;
    use std::path::Path;

    fn artifact(dir: &Path, index: usize) -> PageArtifact {
        let path = dir.join(format!("page_test_{index:05}.png"));
        std::fs::write(&path, b"png").unwrap();
        PageArtifact {
            index,
            path,
            format: RasterFormat::Png,
        }
    }

    #[test]
    fn finish_removes_everything_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mut janitor = ArtifactJanitor::new(RequestId::new());
        let a = artifact(tmp.path(), 1);
        let b = artifact(tmp.path(), 2);
        janitor.track(a.clone());
        janitor.track(b.clone());

        let report = janitor.finish();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.removed, 2);
        assert!(!a.path.exists());
        assert!(!b.path.exists());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut janitor = ArtifactJanitor::new(RequestId::new());
        let a = artifact(tmp.path(), 1);
        std::fs::remove_file(&a.path).unwrap();
        janitor.track(a);

        let report = janitor.finish();
        assert_eq!(report.attempted, 1);
        assert_eq!(report.removed, 0);
        assert_eq!(report.already_missing, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn drop_cleans_up_without_finish() {
        let tmp = tempfile::tempdir().unwrap();
        let a = artifact(tmp.path(), 1);
        {
            let mut janitor = ArtifactJanitor::new(RequestId::new());
            janitor.track(a.clone());
        }
        assert!(!a.path.exists());
    }

    #[test]
    fn empty_janitor_reports_nothing() {
        let report = ArtifactJanitor::new(RequestId::new()).finish();
        assert_eq!(report, CleanupReport::default());
    }
}
