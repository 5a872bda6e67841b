// src/search.rs
//
// Quality-to-size binary search (C5). Given a decoded buffer and a target
// format, find the highest quality whose encoded size fits a byte budget,
// in at most 7 rounds (SPEC_FULL.md §4.4).
//
// No teacher or pack precedent implements a literal bounded binary search;
// written directly from the round-by-round description, borrowing the
// in-progress-candidate shape from
// `other_examples/.../Blobfolio-refract__refract_core-src-enc-output.rs.rs`.

use crate::codecs;
use crate::error::OptimizerError;
use crate::format::{ImageBuffer, ImageFormat};

/// Hard cap on search rounds: ⌈log₂(100)⌉+1 = 7, generous enough for every
/// format's quality range in this crate.
pub const MAX_ROUNDS: u32 = 7;

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub bytes: Vec<u8>,
    pub quality: u8,
    pub rounds: u32,
    pub passed_constraints: bool,
}

/// Search `format`'s quality range for the highest quality whose encoded size
/// is `<= max_bytes`. Always returns a result (the smallest encode observed)
/// even when nothing fits; `passed_constraints` tells the caller whether to
/// trust it as a budget-satisfying candidate.
pub fn search_quality(format: ImageFormat, buffer: &ImageBuffer, max_bytes: u64) -> Result<SearchOutcome, OptimizerError> {
    let (range_min, range_max) = format.quality_range();

    if range_min == range_max || format.is_single_probe_format() {
        return single_point_search(format, buffer, max_bytes, format.default_quality(), range_max);
    }

    let mut q_min = range_min;
    let mut q_max = range_max;
    let mut best: Option<(Vec<u8>, u8)> = None;
    let mut smallest: Option<(Vec<u8>, u8)> = None;
    let mut rounds = 0u32;

    while q_min <= q_max && rounds < MAX_ROUNDS {
        debug_assert!(q_min <= q_max, "search invariant violated: q_min > q_max");
        let q_mid = q_min + (q_max - q_min) / 2;
        debug_assert!(q_min <= q_mid && q_mid <= q_max, "q_mid out of [q_min, q_max] range");

        rounds += 1;
        let encoded = codecs::encode(format, buffer, q_mid)?;
        let fits = encoded.len() as u64 <= max_bytes;

        if smallest.as_ref().map_or(true, |(bytes, _)| encoded.len() < bytes.len()) {
            smallest = Some((encoded.clone(), q_mid));
        }

        if fits {
            best = Some((encoded, q_mid));
            if q_mid == range_max {
                break;
            }
            q_min = q_mid + 1;
        } else {
            if q_mid == range_min {
                break;
            }
            q_max = q_mid - 1;
        }
    }

    debug_assert!(rounds <= MAX_ROUNDS, "search exceeded its round budget");

    match best {
        Some((bytes, quality)) => Ok(SearchOutcome {
            bytes,
            quality,
            rounds,
            passed_constraints: true,
        }),
        None => {
            let (bytes, quality) = smallest.ok_or_else(|| OptimizerError::encode_failed(format.label(), "search produced no candidates"))?;
            Ok(SearchOutcome {
                bytes,
                quality,
                rounds,
                passed_constraints: false,
            })
        }
    }
}

/// Single-quality-point formats (PNG's compression level trades encode time
/// for size, not perceptual quality, so bisection doesn't apply) still honor
/// the protocol: one probe at `default_quality`, one at the range midpoint.
/// The smaller of the two that fits the budget wins; if neither fits, the
/// smaller of the two is returned unflagged.
fn single_point_search(
    format: ImageFormat,
    buffer: &ImageBuffer,
    max_bytes: u64,
    default_quality: u8,
    range_max: u8,
) -> Result<SearchOutcome, OptimizerError> {
    let midpoint = range_max / 2;

    let default_encoded = codecs::encode(format, buffer, default_quality)?;
    let mut rounds = 1;
    let mut best = (default_encoded, default_quality);

    if midpoint != default_quality {
        let mid_encoded = codecs::encode(format, buffer, midpoint)?;
        rounds += 1;
        if mid_encoded.len() < best.0.len() {
            best = (mid_encoded, midpoint);
        }
    }

    let passed = best.0.len() as u64 <= max_bytes;
    Ok(SearchOutcome {
        bytes: best.0,
        quality: best.1,
        rounds,
        passed_constraints: passed,
    })
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
    fn search_respects_round_budget() {
        let buf = gradient(32, 32);
        let outcome = search_quality(ImageFormat::Jpeg, &buf, 1_000_000).unwrap();
        assert!(outcome.rounds <= MAX_ROUNDS);
    }

    #[test]
    fn search_finds_fit_for_generous_budget() {
        let buf = gradient(16, 16);
        let outcome = search_quality(ImageFormat::Jpeg, &buf, 10_000_000).unwrap();
        assert!(outcome.passed_constraints);
        assert!(outcome.bytes.len() as u64 <= 10_000_000);
    }

    #[test]
    fn search_flags_failure_for_impossible_budget() {
        let buf = gradient(64, 64);
        let outcome = search_quality(ImageFormat::Jpeg, &buf, 1).unwrap();
        assert!(!outcome.passed_constraints);
    }

    #[test]
    fn png_uses_the_two_probe_edge_case() {
        let buf = gradient(8, 8);
        let outcome = search_quality(ImageFormat::Png, &buf, 10_000_000).unwrap();
        assert!(outcome.rounds <= 2);
        assert!(outcome.passed_constraints);
    }
}
