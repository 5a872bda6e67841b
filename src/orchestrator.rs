// src/orchestrator.rs
//
// Orchestrator (C9): glues the candidate engine, selector, metric, and cache
// into the end-to-end eight-step procedure in SPEC_FULL.md §4.8.
//
// Grounded on `other_examples/.../hmziqrs-ruxlog-backend__image_optimizer.rs`
// and `.../rustpress__image_optimizer.rs` for the request/result-struct shape
// and naming; the step sequencing itself has no teacher or pack precedent
// (lazy-image has no candidate/selection/cache pipeline) and is written
// directly from SPEC_FULL.md §4.8.

use crate::cache::meta::CacheMetadata;
use crate::cache::{key as cache_key, Cache};
use crate::candidates::{self, EncodedCandidate};
use crate::codecs;
use crate::detect;
use crate::error::OptimizerError;
use crate::format::ImageFormat;
use crate::metric::{self, MetricKind};
use crate::selector;
use std::time::Instant;

/// Input files above this size fail fast with `FileTooLarge`, before any
/// decode or candidate work begins.
pub const MAX_INPUT_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct OptimizationJob {
    pub max_bytes: Option<u64>,
    pub max_diff: Option<f64>,
    pub metric: MetricKind,
    pub formats: Vec<ImageFormat>,
    pub concurrency: usize,
    pub parallel: bool,
}

impl Default for OptimizationJob {
    fn default() -> Self {
        Self {
            max_bytes: None,
            max_diff: None,
            metric: MetricKind::None,
            formats: vec![ImageFormat::Avif, ImageFormat::WebP, ImageFormat::Jpeg, ImageFormat::Png],
            concurrency: 4,
            parallel: true,
        }
    }
}

impl OptimizationJob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    pub fn with_max_diff(mut self, max_diff: f64) -> Self {
        self.max_diff = Some(max_diff);
        self
    }

    pub fn with_metric(mut self, metric: MetricKind) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_formats(mut self, formats: Vec<ImageFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, 16);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct OptimizationResult {
    pub selected: Option<EncodedCandidate>,
    pub all_candidates: Vec<EncodedCandidate>,
    pub decode_ns: u64,
    pub encode_ns: u64,
    pub total_ns: u64,
    pub warnings: Vec<String>,
    pub success: bool,
}

/// Run the full pipeline over an in-memory input buffer. The cache, if given,
/// is probed first and populated last; absence of a cache simply skips those
/// steps.
pub fn optimize_image_from_buffer(input_bytes: &[u8], job: &OptimizationJob, cache: Option<&Cache>) -> Result<OptimizationResult, OptimizerError> {
    let total_started = Instant::now();

    if input_bytes.len() as u64 > MAX_INPUT_BYTES {
        return Err(OptimizerError::FileTooLarge {
            size: input_bytes.len() as u64,
            limit: MAX_INPUT_BYTES,
        });
    }

    // Step 1: cache probe.
    if let Some(cache) = cache {
        for &format in &job.formats {
            let key = cache_key::compute_key(input_bytes, job.max_bytes, job.max_diff, job.metric, format);
            if let Some(hit) = cache.get(&key, format) {
                let candidate = EncodedCandidate {
                    format,
                    bytes: hit.bytes,
                    file_size: hit.metadata.file_size,
                    quality: hit.metadata.quality,
                    diff_score: hit.metadata.diff_score,
                    passed_constraints: hit.metadata.passed_constraints,
                    encode_duration_ns: 0,
                };
                return Ok(OptimizationResult {
                    success: hit.metadata.passed_constraints,
                    selected: Some(candidate),
                    all_candidates: Vec::new(),
                    decode_ns: 0,
                    encode_ns: 0,
                    total_ns: total_started.elapsed().as_nanos() as u64,
                    warnings: Vec::new(),
                });
            }
        }
    }

    // Step 2: decode.
    let decode_started = Instant::now();
    let detected_format = detect::detect_format(input_bytes);
    let buffer = codecs::decode(detected_format, input_bytes)?;
    let decode_ns = decode_started.elapsed().as_nanos() as u64;

    // Steps 3-5: candidates, baseline, scoring.
    let encode_started = Instant::now();
    let (mut all_candidates, mut warnings) = candidates::generate_candidates(
        &job.formats,
        &buffer,
        job.max_bytes,
        job.parallel,
        job.concurrency,
    );

    // Step 4: append the original as a baseline candidate.
    all_candidates.push(selector::baseline_candidate(input_bytes, detected_format, job.max_bytes));

    // Step 5: perceptual scoring.
    for candidate in &mut all_candidates {
        match codecs::decode(candidate.format, &candidate.bytes) {
            Ok(candidate_buffer) => match metric::score(job.metric, &buffer, &candidate_buffer) {
                Ok(score) => candidate.diff_score = score,
                Err(e) => {
                    tracing::warn!(format = candidate.format.label(), error = %e, "metric scoring failed, assuming identical");
                    candidate.diff_score = 0.0;
                    warnings.push(format!("{}: metric scoring failed: {e}", candidate.format.label()));
                }
            },
            Err(e) => {
                tracing::warn!(format = candidate.format.label(), error = %e, "candidate re-decode failed, assuming identical");
                candidate.diff_score = 0.0;
                warnings.push(format!("{}: candidate re-decode failed: {e}", candidate.format.label()));
            }
        }
    }
    let encode_ns = encode_started.elapsed().as_nanos() as u64;

    // Step 6: select.
    let selected = selector::select(&all_candidates, job.max_bytes, job.max_diff);

    // Step 7: cache store.
    if let (Some(cache), Some(candidate)) = (cache, &selected) {
        let key = cache_key::compute_key(input_bytes, job.max_bytes, job.max_diff, job.metric, candidate.format);
        let metadata = CacheMetadata {
            format: candidate.format,
            file_size: candidate.file_size,
            quality: candidate.quality,
            diff_score: candidate.diff_score,
            passed_constraints: candidate.passed_constraints,
            timestamp: 0,
            access_count: 0,
        };
        cache.put(&key, candidate.format, &candidate.bytes, metadata);
    }

    let success = selected.is_some();
    Ok(OptimizationResult {
        selected,
        all_candidates,
        decode_ns,
        encode_ns,
        total_ns: total_started.elapsed().as_nanos() as u64,
        warnings,
        success,
    })
}
