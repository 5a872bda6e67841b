// lib.rs
//
// pyjamaz: a budget-aware, perceptually-guarded image optimizer for
// JPEG/PNG/WebP/AVIF.
//
// Public surface: `optimize_image_from_buffer` drives the full pipeline
// (decode -> candidate generation -> perceptual scoring -> selection ->
// optional cache store) over an in-memory buffer. `optimize_image` is the
// file-path convenience wrapper. A cache handle is optional and threaded
// through explicitly — this library never installs global state.

pub mod cache;
pub mod candidates;
pub mod codecs;
pub mod detect;
pub mod error;
pub mod format;
pub mod metric;
pub mod orchestrator;
pub mod search;
pub mod selector;

pub use cache::{Cache, CacheConfig};
pub use candidates::EncodedCandidate;
pub use error::OptimizerError;
pub use format::{ImageBuffer, ImageFormat};
pub use metric::MetricKind;
pub use orchestrator::{optimize_image_from_buffer, OptimizationJob, OptimizationResult};

use std::path::Path;

/// File-path convenience wrapper around [`optimize_image_from_buffer`].
pub fn optimize_image(path: &Path, job: &OptimizationJob, cache: Option<&Cache>) -> Result<OptimizationResult, OptimizerError> {
    let bytes = std::fs::read(path).map_err(|source| OptimizerError::FileReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    optimize_image_from_buffer(&bytes, job, cache)
}

/// Open (or create) a cache directory. Pairs with [`Cache::deinit`], a plain
/// drop with no background flush thread.
pub fn cache_init(config: CacheConfig) -> Result<Cache, OptimizerError> {
    Cache::init(config)
}

pub fn cache_deinit(cache: Cache) {
    cache.deinit();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_png() -> Vec<u8> {
        let buffer = ImageBuffer::new(8, 8, 3, vec![120u8; 8 * 8 * 3]).unwrap();
        codecs::png::encode(&buffer, 6).unwrap()
    }

    #[test]
    fn optimize_image_from_buffer_round_trips_a_png() {
        let png = sample_png();
        let job = OptimizationJob::new().with_formats(vec![ImageFormat::Png]);
        let result = optimize_image_from_buffer(&png, &job, None).unwrap();
        assert!(result.success);
        assert!(result.selected.is_some());
    }

    #[test]
    fn optimize_image_reads_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.png");
        std::fs::write(&path, sample_png()).unwrap();

        let job = OptimizationJob::new().with_formats(vec![ImageFormat::Png]);
        let result = optimize_image(&path, &job, None).unwrap();
        assert!(result.success);
    }

    #[test]
    fn optimize_image_reports_file_read_failure() {
        let job = OptimizationJob::new();
        let err = optimize_image(Path::new("/nonexistent/pyjamaz-test-input.png"), &job, None).unwrap_err();
        assert!(matches!(err, OptimizerError::FileReadFailed { .. }));
    }
}
