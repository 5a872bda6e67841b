// tests/property_based.rs
//
// Quantified invariants from SPEC_FULL.md §8, exercised with proptest over
// the public optimization/cache/search surface.

use proptest::prelude::*;
use pyjamaz::cache::key::compute_key;
use pyjamaz::metric::MetricKind;
use pyjamaz::search::search_quality;
use pyjamaz::selector::select;
use pyjamaz::{EncodedCandidate, ImageBuffer, ImageFormat, OptimizationJob};

fn gradient_buffer(width: u32, height: u32) -> ImageBuffer {
    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            data.push(((x * 7 + y) % 256) as u8);
            data.push(((x + y * 3) % 256) as u8);
            data.push(((x * y) % 256) as u8);
        }
    }
    ImageBuffer::new(width, height, 3, data).unwrap()
}

fn small_dims() -> impl Strategy<Value = (u32, u32)> {
    (4u32..32, 4u32..32)
}

fn any_format() -> impl Strategy<Value = ImageFormat> {
    prop_oneof![
        Just(ImageFormat::Jpeg),
        Just(ImageFormat::Png),
        Just(ImageFormat::WebP),
        Just(ImageFormat::Avif),
    ]
}

fn any_metric() -> impl Strategy<Value = MetricKind> {
    prop_oneof![Just(MetricKind::Dssim), Just(MetricKind::None)]
}

proptest! {
    // Never-larger: the original is always an acceptable fallback candidate,
    // so the final selection is never larger than the input unless every
    // format is individually unable to produce anything at all (excluded
    // here since the fixtures always encode successfully).
    #[test]
    fn never_larger_than_original((w, h) in small_dims(), format in any_format()) {
        let buffer = gradient_buffer(w, h);
        let original = pyjamaz::codecs::encode(ImageFormat::Png, &buffer, 9).unwrap();

        let job = OptimizationJob::new().with_formats(vec![format]);
        let result = pyjamaz::optimize_image_from_buffer(&original, &job, None).unwrap();
        let selected = result.selected.unwrap();

        prop_assert!(selected.file_size <= original.len() as u64 || !selected.passed_constraints);
    }

    // Bounded search: search_quality never exceeds MAX_ROUNDS regardless of
    // the requested budget.
    #[test]
    fn bounded_search_rounds((w, h) in small_dims(), format in any_format(), budget in 1u64..200_000) {
        let buffer = gradient_buffer(w, h);
        let outcome = search_quality(format, &buffer, budget).unwrap();
        prop_assert!(outcome.rounds <= pyjamaz::search::MAX_ROUNDS);
    }

    // Bounded parallelism: candidate generation never spawns more workers
    // than formats requested or than MAX_FORMATS, and always returns exactly
    // one outcome (candidate or warning) per requested format.
    #[test]
    fn bounded_parallelism_outcome_count((w, h) in small_dims(), concurrency in 1usize..8) {
        let buffer = gradient_buffer(w, h);
        let formats = vec![ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP, ImageFormat::Avif];
        let (candidates, warnings) =
            pyjamaz::candidates::generate_candidates(&formats, &buffer, None, true, concurrency);
        prop_assert_eq!(candidates.len() + warnings.len(), formats.len());
    }

    // Deterministic cache key: identical inputs always hash to the same key.
    #[test]
    fn deterministic_cache_key(
        bytes in prop::collection::vec(any::<u8>(), 0..64),
        max_bytes in prop::option::of(1u64..1_000_000),
        max_diff in prop::option::of(0.0f64..1.0),
        metric in any_metric(),
        format in any_format(),
    ) {
        let a = compute_key(&bytes, max_bytes, max_diff, metric, format);
        let b = compute_key(&bytes, max_bytes, max_diff, metric, format);
        prop_assert_eq!(a, b);
    }

    // Metric non-negativity: dssim scores are always >= 0 and finite for any
    // pair of same-sized buffers.
    #[test]
    fn metric_non_negative((w, h) in small_dims()) {
        let a = gradient_buffer(w, h);
        let mut shifted_data = a.data().to_vec();
        for byte in shifted_data.iter_mut() {
            *byte = byte.wrapping_add(37);
        }
        let b = ImageBuffer::new(w, h, 3, shifted_data).unwrap();

        let score = pyjamaz::metric::score(MetricKind::Dssim, &a, &b).unwrap();
        prop_assert!(score >= 0.0);
        prop_assert!(score.is_finite());
    }

    // Format preference: when multiple candidates tie on file size, select()
    // always prefers the format with the higher preference_rank.
    #[test]
    fn format_preference_breaks_size_ties(size in 100u64..10_000) {
        let candidates = vec![
            EncodedCandidate {
                format: ImageFormat::Jpeg,
                bytes: vec![0u8; size as usize],
                file_size: size,
                quality: 80,
                diff_score: 0.0,
                passed_constraints: true,
                encode_duration_ns: 0,
            },
            EncodedCandidate {
                format: ImageFormat::Avif,
                bytes: vec![1u8; size as usize],
                file_size: size,
                quality: 80,
                diff_score: 0.0,
                passed_constraints: true,
                encode_duration_ns: 0,
            },
        ];
        let selected = select(&candidates, None, None).unwrap();
        prop_assert_eq!(selected.format, ImageFormat::Avif);
    }
}

// Ambient-stack test: cache-key derivation is injective over a large sample
// of distinct (bytes, max_bytes, max_diff, metric, format) tuples — no
// collisions across 10,000 structurally varied inputs.
#[test]
fn cache_key_injective_over_many_samples() {
    use std::collections::HashSet;

    let formats = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP, ImageFormat::Avif];
    let metrics = [MetricKind::Dssim, MetricKind::None];

    let mut seen = HashSet::with_capacity(10_000);
    let mut collisions = 0usize;
    let mut total = 0usize;

    for i in 0..2_500u32 {
        let bytes = i.to_le_bytes();
        for &format in &formats {
            for &metric in &metrics {
                let max_bytes = if i % 2 == 0 { Some(i as u64 * 17) } else { None };
                let max_diff = if i % 3 == 0 { Some((i % 10) as f64 / 10.0) } else { None };
                let key = compute_key(&bytes, max_bytes, max_diff, metric, format);
                total += 1;
                if !seen.insert(key) {
                    collisions += 1;
                }
            }
        }
    }

    assert_eq!(total, 2_500 * formats.len() * metrics.len());
    assert_eq!(collisions, 0, "cache key collided across distinct inputs");
}
