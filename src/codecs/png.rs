// src/codecs/png.rs
//
// PNG encode (image crate + oxipng) / decode (image crate). PNG is always
// lossless; "quality" here is a compression level 0-9 (SPEC_FULL.md §3/§4.2).
// Grounded on the teacher's `engine/encoder.rs::encode_png`.

use crate::codecs::catch_codec_panic;
use crate::error::OptimizerError;
use crate::format::{ImageBuffer, ImageFormat};
use image::{DynamicImage, RgbImage, RgbaImage};
use std::io::Cursor;

/// oxipng's preset scale tops out at 6; compression levels 7-9 map onto the
/// slowest preset rather than erroring, since PNG is lossless at every level.
fn oxipng_preset(quality: u8) -> u8 {
    quality.min(6)
}

pub fn encode(buffer: &ImageBuffer, quality: u8) -> Result<Vec<u8>, OptimizerError> {
    let (min, max) = ImageFormat::Png.quality_range();
    if quality < min || quality > max {
        return Err(OptimizerError::InvalidQuality {
            format: "png".into(),
            quality: quality as i32,
            min: min as i32,
            max: max as i32,
        });
    }

    let width = buffer.width();
    let height = buffer.height();
    if width > ImageFormat::Png.max_dimension() || height > ImageFormat::Png.max_dimension() {
        return Err(OptimizerError::invalid_image(format!(
            "png dimensions {width}x{height} exceed format cap"
        )));
    }

    let dynamic = to_dynamic(buffer)?;

    catch_codec_panic("png", move || {
        let mut raw = Vec::new();
        dynamic
            .write_to(&mut Cursor::new(&mut raw), image::ImageFormat::Png)
            .map_err(|e| OptimizerError::encode_failed("png", format!("png encode failed: {e}")))?;

        let mut options = oxipng::Options::from_preset(oxipng_preset(quality));
        options.strip = oxipng::StripChunks::None;

        oxipng::optimize_from_memory(&raw, &options)
            .map_err(|e| OptimizerError::encode_failed("png", format!("oxipng optimization failed: {e}")))
    })
}

fn to_dynamic(buffer: &ImageBuffer) -> Result<DynamicImage, OptimizerError> {
    let (w, h) = (buffer.width(), buffer.height());
    if buffer.channels() == 3 {
        RgbImage::from_raw(w, h, buffer.data().to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| OptimizerError::invalid_image("failed to build RGB image for png encode"))
    } else {
        RgbaImage::from_raw(w, h, buffer.data().to_vec())
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| OptimizerError::invalid_image("failed to build RGBA image for png encode"))
    }
}

/// Decode PNG bytes, preserving channel count (RGB stays 3ch, RGBA stays 4ch).
pub fn decode(data: &[u8]) -> Result<ImageBuffer, OptimizerError> {
    catch_codec_panic("png", move || {
        let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
            .map_err(|e| OptimizerError::decode_failed("png", format!("decode failed: {e}")))?;

        let max = ImageFormat::Png.max_dimension();
        if img.width() == 0 || img.height() == 0 || img.width() > max || img.height() > max {
            return Err(OptimizerError::invalid_image(format!(
                "png dimensions {}x{} out of bounds",
                img.width(),
                img.height()
            )));
        }

        if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            let (w, h) = (rgba.width(), rgba.height());
            ImageBuffer::new(w, h, 4, rgba.into_raw())
        } else {
            let rgb = img.to_rgb8();
            let (w, h) = (rgb.width(), rgb.height());
            ImageBuffer::new(w, h, 3, rgb.into_raw())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_rgba(width: u32, height: u32) -> ImageBuffer {
        let data = vec![10u8, 20, 30, 255].repeat(width as usize * height as usize);
        ImageBuffer::new(width, height, 4, data).unwrap()
    }

    #[test]
    fn encode_produces_png_signature() {
        let buf = solid_rgba(8, 8);
        let bytes = encode(&buf, 4).unwrap();
        assert_eq!(&bytes[0..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn encode_rejects_out_of_range_quality() {
        let buf = solid_rgba(4, 4);
        let err = encode(&buf, 10).unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidQuality { .. }));
    }

    #[test]
    fn roundtrip_preserves_alpha_channel_count() {
        let buf = solid_rgba(4, 4);
        let encoded = encode(&buf, 6).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.channels(), 4);
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 4);
    }

    #[test]
    fn oxipng_preset_caps_at_six() {
        assert_eq!(oxipng_preset(9), 6);
        assert_eq!(oxipng_preset(3), 3);
    }
}
