// src/candidates.rs
//
// Candidate engine (C6): one EncodedCandidate per requested format, either
// sequentially or over a std::thread::scope worker pool.
//
// Grounded on the teacher's `engine/pool.rs` sizing formula
// (min(formats.len, concurrency)), re-expressed with `std::thread::scope`
// instead of a persistent `rayon::ThreadPool` per SPEC_FULL.md §9's "short-
// lived worker pool with pre-joined threads" decision; panic containment
// follows the teacher's `InternalPanic` precedent in `src/error.rs`.

use crate::detect;
use crate::error::OptimizerError;
use crate::format::{ImageBuffer, ImageFormat};
use crate::search;
use std::time::Instant;

/// Compile-time bound on how many formats a single job may request.
pub const MAX_FORMATS: usize = 10;

#[derive(Debug, Clone)]
pub struct EncodedCandidate {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
    pub file_size: u64,
    pub quality: u8,
    pub diff_score: f64,
    pub passed_constraints: bool,
    pub encode_duration_ns: u64,
}

impl EncodedCandidate {
    pub fn deep_clone(&self) -> Self {
        Self {
            format: self.format,
            bytes: self.bytes.clone(),
            file_size: self.file_size,
            quality: self.quality,
            diff_score: self.diff_score,
            passed_constraints: self.passed_constraints,
            encode_duration_ns: self.encode_duration_ns,
        }
    }
}

fn encode_one(format: ImageFormat, buffer: &ImageBuffer, max_bytes: Option<u64>) -> Result<EncodedCandidate, String> {
    let started = Instant::now();

    let result = match max_bytes {
        Some(budget) => search::search_quality(format, buffer, budget).map(|outcome| {
            (outcome.bytes, outcome.quality, outcome.passed_constraints)
        }),
        None => {
            let quality = format.default_quality();
            crate::codecs::encode(format, buffer, quality).map(|bytes| (bytes, quality, true))
        }
    };

    match result {
        Ok((bytes, quality, passed_constraints)) => {
            if let Err(e) = detect::verify_format(&bytes, format) {
                return Err(format!("{}: {e}", format.label()));
            }
            let file_size = bytes.len() as u64;
            Ok(EncodedCandidate {
                format,
                bytes,
                file_size,
                quality,
                diff_score: 0.0,
                passed_constraints,
                encode_duration_ns: started.elapsed().as_nanos() as u64,
            })
        }
        Err(e) => Err(format!("{}: {e}", format.label())),
    }
}

/// Generate one candidate per requested format. Returns `(candidates,
/// warnings)`; a failed format contributes only a warning, never aborts the
/// others.
pub fn generate_candidates(
    formats: &[ImageFormat],
    buffer: &ImageBuffer,
    max_bytes: Option<u64>,
    parallel_encoding: bool,
    concurrency: usize,
) -> (Vec<EncodedCandidate>, Vec<String>) {
    debug_assert!(formats.len() <= MAX_FORMATS, "too many requested formats");

    let result = if parallel_encoding && formats.len() > 1 && concurrency > 1 {
        generate_parallel(formats, buffer, max_bytes, concurrency)
    } else {
        generate_sequential(formats, buffer, max_bytes)
    };

    debug_assert!(formats.len() <= MAX_FORMATS, "too many requested formats");
    result
}

fn generate_sequential(
    formats: &[ImageFormat],
    buffer: &ImageBuffer,
    max_bytes: Option<u64>,
) -> (Vec<EncodedCandidate>, Vec<String>) {
    let mut candidates = Vec::with_capacity(formats.len());
    let mut warnings = Vec::new();

    for &format in formats {
        match encode_one(format, buffer, max_bytes) {
            Ok(candidate) => candidates.push(candidate),
            Err(message) => {
                tracing::warn!(format = format.label(), message, "candidate encode failed");
                warnings.push(message);
            }
        }
    }

    (candidates, warnings)
}

/// Workers push their own result into these shared, mutex-protected lists
/// rather than returning a value through `JoinHandle::join` — the one place
/// in this crate a lock is held across more than a trivial critical section,
/// which is why `parking_lot` earns its keep here instead of `std::sync`.
struct SharedOutcomes {
    candidates: parking_lot::Mutex<Vec<EncodedCandidate>>,
    warnings: parking_lot::Mutex<Vec<String>>,
}

/// How many formats each worker handles so that the number of chunks never
/// exceeds `worker_count`.
fn chunk_size_for(formats_len: usize, worker_count: usize) -> usize {
    formats_len.div_ceil(worker_count)
}

fn generate_parallel(
    formats: &[ImageFormat],
    buffer: &ImageBuffer,
    max_bytes: Option<u64>,
    concurrency: usize,
) -> (Vec<EncodedCandidate>, Vec<String>) {
    let worker_count = formats.len().min(concurrency).min(MAX_FORMATS);
    debug_assert!(worker_count > 0, "parallel route entered with zero workers");

    let shared = SharedOutcomes {
        candidates: parking_lot::Mutex::new(Vec::with_capacity(formats.len())),
        warnings: parking_lot::Mutex::new(Vec::new()),
    };

    // Chunk the requested formats into exactly `worker_count` groups instead
    // of spawning one thread per format, so thread count never exceeds
    // min(formats.len, concurrency, MAX_FORMATS) regardless of how many
    // formats were requested.
    let chunk_size = chunk_size_for(formats.len(), worker_count);

    std::thread::scope(|scope| {
        let handles: Vec<_> = formats
            .chunks(chunk_size)
            .map(|chunk| {
                let shared = &shared;
                scope.spawn(move || {
                    for &format in chunk {
                        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                            encode_one(format, buffer, max_bytes)
                        }));
                        match outcome {
                            Ok(Ok(candidate)) => shared.candidates.lock().push(candidate),
                            Ok(Err(message)) => shared.warnings.lock().push(message),
                            Err(_) => {
                                let err = OptimizerError::WorkerPanic {
                                    format: format.label().to_string(),
                                    message: "panicked during encode".to_string(),
                                };
                                shared.warnings.lock().push(err.to_string());
                            }
                        }
                    }
                })
            })
            .collect();

        debug_assert!(handles.len() <= worker_count, "spawned more workers than the computed bound");

        for handle in handles {
            if handle.join().is_err() {
                shared.warnings.lock().push("candidate worker thread join failed".to_string());
            }
        }
    });

    (shared.candidates.into_inner(), shared.warnings.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> ImageBuffer {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                data.push(((x + y) % 256) as u8);
                data.push((x % 256) as u8);
                data.push((y % 256) as u8);
            }
        }
        ImageBuffer::new(width, height, 3, data).unwrap()
    }

    #[test]
    fn sequential_produces_one_candidate_per_format() {
        let buf = gradient(8, 8);
        let formats = [ImageFormat::Jpeg, ImageFormat::Png];
        let (candidates, warnings) = generate_candidates(&formats, &buf, None, false, 1);
        assert_eq!(candidates.len(), 2);
        assert!(warnings.is_empty());
    }

    #[test]
    fn parallel_produces_same_count_as_sequential() {
        let buf = gradient(8, 8);
        let formats = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];
        let (candidates, warnings) = generate_candidates(&formats, &buf, None, true, 4);
        assert_eq!(candidates.len(), 3);
        assert!(warnings.is_empty());
    }

    #[test]
    fn worker_count_never_exceeds_concurrency_or_format_count() {
        // formats.len() = 4, concurrency = 2: must chunk into exactly 2
        // groups, never spawn one worker per format.
        let worker_count = 4usize.min(2).min(MAX_FORMATS);
        assert_eq!(worker_count, 2);
        let chunk_size = chunk_size_for(4, worker_count);
        let chunks = (0..4usize).collect::<Vec<_>>();
        let chunk_count = chunks.chunks(chunk_size).count();
        assert!(chunk_count <= worker_count);
        assert_eq!(chunk_count, 2);
    }

    #[test]
    fn chunk_size_covers_every_format_in_at_most_worker_count_chunks() {
        for formats_len in 1..=MAX_FORMATS {
            for concurrency in 1..=MAX_FORMATS {
                let worker_count = formats_len.min(concurrency).min(MAX_FORMATS);
                let chunk_size = chunk_size_for(formats_len, worker_count);
                let items = (0..formats_len).collect::<Vec<_>>();
                let chunk_count = items.chunks(chunk_size).count();
                assert!(
                    chunk_count <= worker_count,
                    "formats_len={formats_len} concurrency={concurrency} produced {chunk_count} chunks, worker_count={worker_count}"
                );
            }
        }
    }

    #[test]
    fn candidate_file_size_matches_byte_length() {
        let buf = gradient(8, 8);
        let formats = [ImageFormat::Png];
        let (candidates, _) = generate_candidates(&formats, &buf, None, false, 1);
        assert_eq!(candidates[0].file_size, candidates[0].bytes.len() as u64);
    }

    #[test]
    fn deep_clone_allocates_independent_bytes() {
        let buf = gradient(4, 4);
        let formats = [ImageFormat::Png];
        let (candidates, _) = generate_candidates(&formats, &buf, None, false, 1);
        let mut clone = candidates[0].deep_clone();
        clone.bytes[0] ^= 0xFF;
        assert_ne!(clone.bytes[0], candidates[0].bytes[0]);
    }
}
