//! One detection step: encode an extracted image, ask the backend, time it.
//!
//! ## Retry Strategy
//!
//! With the default `max_retries = 0` every image costs exactly one request
//! and a failure becomes an empty answer immediately. When retries are
//! enabled, only transient failures (timeouts, transport errors, 429, 5xx)
//! are retried, with exponential backoff `retry_backoff_ms * 2^(attempt-1)`.
//! A 4xx or an unsupported image type fails on the first attempt.

use crate::backend::DetectionBackend;
use crate::config::ScanConfig;
use crate::error::ImageError;
use crate::output::ImageReport;
use crate::pipeline::classify::{classify, Verdict};
use crate::pipeline::encode::encode_image;
use std::path::Path;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Run one image through the backend.
///
/// Always returns an `ImageReport`; a failure is recorded in
/// `report.error` with an empty `text`, never propagated.
pub async fn detect_image(
    backend: &dyn DetectionBackend,
    index: usize,
    path: &Path,
    instruction: &str,
    config: &ScanConfig,
) -> ImageReport {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let start = Instant::now();

    let failed = |error: ImageError, retries: u32, start: Instant| ImageReport {
        index,
        path: path.to_path_buf(),
        file_name: file_name.clone(),
        elapsed_ms: start.elapsed().as_millis() as u64,
        text: String::new(),
        verdict: Verdict::Empty,
        retries,
        error: Some(error),
    };

    let image = match encode_image(path).await {
        Ok(image) => image,
        Err(e) => {
            warn!("{}: cannot read image: {}", file_name, e);
            return failed(
                ImageError::EncodeFailed {
                    file: file_name.clone(),
                    detail: e.to_string(),
                },
                0,
                start,
            );
        }
    };

    let mut attempt: u32 = 0;
    loop {
        match backend.try_detect(&image, instruction).await {
            Ok(text) => {
                let elapsed = start.elapsed();
                let verdict = classify(&text);
                debug!(
                    "{}: {:?} in {:?} ({} chars)",
                    file_name,
                    verdict,
                    elapsed,
                    text.len()
                );
                return ImageReport {
                    index,
                    path: path.to_path_buf(),
                    file_name: file_name.clone(),
                    elapsed_ms: elapsed.as_millis() as u64,
                    text,
                    verdict,
                    retries: attempt,
                    error: None,
                };
            }
            Err(e) => {
                warn!(
                    "{}: {} request {} failed: {}",
                    file_name,
                    backend.name(),
                    attempt + 1,
                    e
                );
                if attempt >= config.max_retries || !e.is_transient() {
                    return failed(
                        ImageError::DetectFailed {
                            file: file_name.clone(),
                            retries: attempt,
                            detail: e.to_string(),
                        },
                        attempt,
                        start,
                    );
                }
                attempt += 1;
                let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    file_name, attempt, config.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }
        }
    }
}
