// src/cache/key.rs
//
// Content-addressed cache key: Blake3 over the input bytes plus every option
// that affects the output, per SPEC_FULL.md §3's "Cache key" entry.

use crate::format::ImageFormat;
use crate::metric::MetricKind;

pub type CacheKey = [u8; 32];

/// Leading discriminant byte for an optional field: `0` means absent (no
/// value bytes follow), `1` means present (the value's bytes follow). This
/// keeps presence/absence out of the value's own byte space, so no value
/// can be mistaken for "absent" the way a sentinel sharing that space could.
const FIELD_ABSENT: u8 = 0;
const FIELD_PRESENT: u8 = 1;

pub fn compute_key(
    input_bytes: &[u8],
    max_bytes: Option<u64>,
    max_diff: Option<f64>,
    metric: MetricKind,
    format: ImageFormat,
) -> CacheKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(input_bytes);

    match max_bytes {
        Some(v) => {
            hasher.update(&[FIELD_PRESENT]);
            hasher.update(&v.to_le_bytes());
        }
        None => {
            hasher.update(&[FIELD_ABSENT]);
        }
    };
    match max_diff {
        Some(v) => {
            hasher.update(&[FIELD_PRESENT]);
            hasher.update(&v.to_le_bytes());
        }
        None => {
            hasher.update(&[FIELD_ABSENT]);
        }
    };

    hasher.update(metric.label().as_bytes());
    hasher.update(&[0u8]); // field separator so "dssimX" can't collide with "dssim"+"X"
    hasher.update(format.label().as_bytes());

    *hasher.finalize().as_bytes()
}

/// Lowercase hex encoding for filenames. Hand-rolled rather than pulling in a
/// hex crate for one conversion — the same choice the teacher's and the
/// pack's cache code make.
pub fn hex_encode(key: &CacheKey) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(key.len() * 2);
    for byte in key {
        out.push(DIGITS[(byte >> 4) as usize] as char);
        out.push(DIGITS[(byte & 0x0f) as usize] as char);
    }
    out
}
