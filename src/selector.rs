// src/selector.rs
//
// Selector (C7): filter candidates by budget/perceptual ceiling, rank by
// size, tie-break by format preference.
//
// No teacher precedent (lazy-image never generates format alternatives to
// choose among); the exhaustive format-preference ordering follows
// `other_examples/.../Blobfolio-refract__refract_core-src-kind-image.rs.rs`'s
// `ImageKind` dispatch style. Selection logic itself is written directly from
// SPEC_FULL.md §4.6.

use crate::candidates::EncodedCandidate;
use crate::format::ImageFormat;

/// Filter, rank, and pick the best candidate. Returns a deep clone of the
/// winner so the caller can keep or discard the original list independently.
pub fn select(candidates: &[EncodedCandidate], max_bytes: Option<u64>, max_diff: Option<f64>) -> Option<EncodedCandidate> {
    let mut survivors: Vec<&EncodedCandidate> = candidates
        .iter()
        .filter(|c| max_bytes.map_or(true, |budget| c.file_size <= budget))
        .filter(|c| max_diff.map_or(true, |ceiling| c.diff_score <= ceiling))
        .collect();

    survivors.sort_by(|a, b| {
        a.file_size
            .cmp(&b.file_size)
            .then_with(|| b.format.preference_rank().cmp(&a.format.preference_rank()))
    });

    survivors.first().map(|c| c.deep_clone())
}

/// Construct the synthetic original-as-baseline candidate appended before
/// selection (SPEC_FULL.md §4.6). `format` is the format detected from the
/// input's magic bytes, not a re-encode target.
pub fn baseline_candidate(original_bytes: &[u8], format: ImageFormat, max_bytes: Option<u64>) -> EncodedCandidate {
    let file_size = original_bytes.len() as u64;
    EncodedCandidate {
        format,
        bytes: original_bytes.to_vec(),
        file_size,
        quality: 100,
        diff_score: 0.0,
        passed_constraints: max_bytes.map_or(true, |budget| file_size <= budget),
        encode_duration_ns: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(format: ImageFormat, file_size: u64, diff_score: f64) -> EncodedCandidate {
        EncodedCandidate {
            format,
            bytes: vec![0u8; file_size as usize],
            file_size,
            quality: 80,
            diff_score,
            passed_constraints: true,
            encode_duration_ns: 0,
        }
    }

    #[test]
    fn selects_smallest_surviving_candidate() {
        let candidates = vec![
            candidate(ImageFormat::Jpeg, 500, 0.1),
            candidate(ImageFormat::WebP, 200, 0.1),
            candidate(ImageFormat::Avif, 300, 0.1),
        ];
        let chosen = select(&candidates, None, None).unwrap();
        assert_eq!(chosen.format, ImageFormat::WebP);
    }

    #[test]
    fn filters_out_candidates_over_budget() {
        let candidates = vec![candidate(ImageFormat::Jpeg, 5000, 0.1), candidate(ImageFormat::Png, 200, 0.1)];
        let chosen = select(&candidates, Some(1000), None).unwrap();
        assert_eq!(chosen.format, ImageFormat::Png);
    }

    #[test]
    fn filters_out_candidates_over_diff_ceiling() {
        let candidates = vec![candidate(ImageFormat::WebP, 100, 0.9), candidate(ImageFormat::Jpeg, 200, 0.05)];
        let chosen = select(&candidates, None, Some(0.2)).unwrap();
        assert_eq!(chosen.format, ImageFormat::Jpeg);
    }

    #[test]
    fn ties_break_by_format_preference() {
        let candidates = vec![candidate(ImageFormat::Jpeg, 100, 0.1), candidate(ImageFormat::Avif, 100, 0.1)];
        let chosen = select(&candidates, None, None).unwrap();
        assert_eq!(chosen.format, ImageFormat::Avif);
    }

    #[test]
    fn empty_survivors_returns_none() {
        let candidates = vec![candidate(ImageFormat::Jpeg, 5000, 0.1)];
        assert!(select(&candidates, Some(10), None).is_none());
    }

    #[test]
    fn baseline_passes_when_under_budget() {
        let baseline = baseline_candidate(&[1, 2, 3], ImageFormat::Png, Some(100));
        assert!(baseline.passed_constraints);
        assert_eq!(baseline.quality, 100);
        assert_eq!(baseline.diff_score, 0.0);
    }

    #[test]
    fn baseline_fails_when_over_budget() {
        let baseline = baseline_candidate(&[1, 2, 3, 4, 5], ImageFormat::Png, Some(2));
        assert!(!baseline.passed_constraints);
    }
}
