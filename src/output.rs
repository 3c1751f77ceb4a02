//! Result types produced by a scan.

use crate::error::ImageError;
use crate::pipeline::classify::Verdict;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of one extracted image: what the backend said, and how long it took.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReport {
    /// 1-indexed position in extraction order.
    pub index: usize,
    /// Where the image was written.
    pub path: PathBuf,
    /// File name component of `path`, e.g. `page_1_img_2.jpeg`.
    pub file_name: String,
    /// Wall-clock time from encoding to the final answer, retries included.
    pub elapsed_ms: u64,
    /// Verbatim backend answer; empty on failure.
    pub text: String,
    /// Classification of `text`.
    pub verdict: Verdict,
    /// Retries spent on transient failures.
    pub retries: u32,
    /// Set when the image failed.
    pub error: Option<ImageError>,
}

impl ImageReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate counters for a scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub images_found: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Answers classified as [`Verdict::Table`].
    pub tables_found: usize,
    /// Answers classified as [`Verdict::NoTable`].
    pub no_table: usize,
    pub extraction_ms: u64,
    pub detection_ms: u64,
    pub total_ms: u64,
}

impl ScanStats {
    pub(crate) fn tally(reports: &[ImageReport]) -> Self {
        let mut stats = ScanStats {
            images_found: reports.len(),
            ..Default::default()
        };
        for r in reports {
            if r.succeeded() {
                stats.succeeded += 1;
            } else {
                stats.failed += 1;
            }
            match r.verdict {
                Verdict::Table => stats.tables_found += 1,
                Verdict::NoTable => stats.no_table += 1,
                Verdict::Unrecognised | Verdict::Empty => {}
            }
        }
        stats
    }
}

/// Everything a scan produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutput {
    pub pdf_path: PathBuf,
    pub output_dir: PathBuf,
    /// Materializer output, in `(page, image)` order.
    pub images: Vec<PathBuf>,
    /// Why extraction produced no images, if it failed.
    pub extraction_error: Option<String>,
    /// One report per entry of `images`, same order.
    pub reports: Vec<ImageReport>,
    pub stats: ScanStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(verdict: Verdict, failed: bool) -> ImageReport {
        ImageReport {
            index: 1,
            path: PathBuf::from("x.png"),
            file_name: "x.png".into(),
            elapsed_ms: 0,
            text: String::new(),
            verdict,
            retries: 0,
            error: failed.then(|| ImageError::DetectFailed {
                file: "x.png".into(),
                retries: 0,
                detail: "down".into(),
            }),
        }
    }

    #[test]
    fn tally_counts_verdicts_and_failures() {
        let stats = ScanStats::tally(&[
            report(Verdict::Table, false),
            report(Verdict::NoTable, false),
            report(Verdict::Unrecognised, false),
            report(Verdict::Empty, true),
        ]);
        assert_eq!(stats.images_found, 4);
        assert_eq!(stats.succeeded, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.tables_found, 1);
        assert_eq!(stats.no_table, 1);
    }

    #[test]
    fn report_serialises_verdict_lowercase() {
        let json = serde_json::to_string(&report(Verdict::NoTable, false)).unwrap();
        assert!(json.contains("\"verdict\":\"no_table\""), "got: {json}");
    }
}
