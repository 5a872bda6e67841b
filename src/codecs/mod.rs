// src/codecs/mod.rs
//
// Uniform encode/decode contract per format (SPEC_FULL.md §4.2). Each
// submodule exposes `encode(&ImageBuffer, quality) -> Result<Vec<u8>, _>` and
// `decode(&[u8]) -> Result<ImageBuffer, _>`; dispatch across formats is an
// exhaustive match in `src/candidates.rs` and `src/selector.rs`, never a
// trait object.

pub mod avif;
pub mod avif_raii;
pub mod jpeg;
pub mod png;
pub mod webp;

use crate::error::OptimizerError;
use crate::format::{ImageBuffer, ImageFormat};

/// Exhaustive encode dispatch used by the search and candidate layers so
/// neither has to match on format more than once.
pub fn encode(format: ImageFormat, buffer: &ImageBuffer, quality: u8) -> Result<Vec<u8>, OptimizerError> {
    match format {
        ImageFormat::Jpeg => jpeg::encode(buffer, quality),
        ImageFormat::Png => png::encode(buffer, quality),
        ImageFormat::WebP => webp::encode(buffer, quality),
        ImageFormat::Avif => avif::encode(buffer, quality),
        ImageFormat::Unknown => Err(OptimizerError::invalid_image("cannot encode an unknown format")),
    }
}

/// Exhaustive decode dispatch. `format` must already have been determined by
/// `crate::detect::detect_format`.
pub fn decode(format: ImageFormat, data: &[u8]) -> Result<ImageBuffer, OptimizerError> {
    match format {
        ImageFormat::Jpeg => jpeg::decode(data),
        ImageFormat::Png => png::decode(data),
        ImageFormat::WebP => webp::decode(data),
        ImageFormat::Avif => avif::decode(data),
        ImageFormat::Unknown => Err(OptimizerError::decode_failed("unknown", "unrecognized image format")),
    }
}

/// mozjpeg and libavif both panic (rather than return a Result) on certain
/// internal failures. Catching the unwind here is the Rust realization of the
/// "record had_error, check after the call returns" pattern from SPEC_FULL
/// §4.2/§9 applied to codecs that use Rust panics as their error channel.
pub(crate) fn catch_codec_panic<T>(
    format: &str,
    f: impl FnOnce() -> Result<T, OptimizerError> + std::panic::UnwindSafe,
) -> Result<T, OptimizerError> {
    match std::panic::catch_unwind(f) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "codec panicked".to_string());
            tracing::warn!(format, message, "codec panicked, treating as encode failure");
            Err(OptimizerError::encode_failed(format, message))
        }
    }
}
