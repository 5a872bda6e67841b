// src/codecs/webp.rs
//
// WebP encode/decode via the `webp` crate (libwebp bindings). Decode always
// yields RGBA (SPEC_FULL.md §4.2's channel table); encode preserves RGB or
// RGBA from the source buffer. Grounded on the teacher's
// `engine/encoder.rs::encode_webp`.

use crate::codecs::catch_codec_panic;
use crate::error::OptimizerError;
use crate::format::{ImageBuffer, ImageFormat};
use image::{RgbImage, RgbaImage};

fn filter_strength(quality: u8) -> i32 {
    if quality >= 80 {
        20
    } else if quality >= 60 {
        30
    } else {
        40
    }
}

fn sns_strength(quality: u8) -> i32 {
    if quality >= 85 {
        50
    } else if quality >= 70 {
        70
    } else {
        80
    }
}

pub fn encode(buffer: &ImageBuffer, quality: u8) -> Result<Vec<u8>, OptimizerError> {
    let (min, max) = ImageFormat::WebP.quality_range();
    if quality < min || quality > max {
        return Err(OptimizerError::InvalidQuality {
            format: "webp".into(),
            quality: quality as i32,
            min: min as i32,
            max: max as i32,
        });
    }

    let width = buffer.width();
    let height = buffer.height();
    if width > ImageFormat::WebP.max_dimension() || height > ImageFormat::WebP.max_dimension() {
        return Err(OptimizerError::invalid_image(format!(
            "webp dimensions {width}x{height} exceed format cap"
        )));
    }
    if width == 0 || height == 0 {
        return Err(OptimizerError::invalid_image("webp requires non-zero dimensions"));
    }

    let channels = buffer.channels();
    let data = buffer.data().to_vec();

    catch_codec_panic("webp", move || {
        let mut config = webp::WebPConfig::new()
            .map_err(|_| OptimizerError::encode_failed("webp", "failed to create WebPConfig"))?;

        config.quality = quality as f32;
        config.method = 4;
        config.pass = 1;
        config.preprocessing = 0;
        config.sns_strength = sns_strength(quality);
        config.autofilter = 1;
        config.filter_strength = filter_strength(quality);
        config.filter_sharpness = if quality >= 85 { 2 } else { 0 };
        if Some(quality) == ImageFormat::WebP.lossless_quality() {
            config.lossless = 1;
        }

        let encoded = if channels == 4 {
            let rgba = RgbaImage::from_raw(width, height, data)
                .ok_or_else(|| OptimizerError::invalid_image("failed to build RGBA image for webp encode"))?;
            webp::Encoder::from_rgba(&rgba, width, height)
                .encode_advanced(&config)
                .map_err(|e| OptimizerError::encode_failed("webp", format!("webp encode failed: {e:?}")))?
                .to_vec()
        } else {
            let rgb = RgbImage::from_raw(width, height, data)
                .ok_or_else(|| OptimizerError::invalid_image("failed to build RGB image for webp encode"))?;
            webp::Encoder::from_rgb(&rgb, width, height)
                .encode_advanced(&config)
                .map_err(|e| OptimizerError::encode_failed("webp", format!("webp encode failed: {e:?}")))?
                .to_vec()
        };

        Ok(encoded)
    })
}

/// Decode WebP bytes into an RGBA buffer (WebP decode is always 4-channel).
pub fn decode(data: &[u8]) -> Result<ImageBuffer, OptimizerError> {
    if data.len() < 12 {
        return Err(OptimizerError::invalid_image("webp input shorter than 12 bytes"));
    }

    catch_codec_panic("webp", move || {
        let decoder = webp::Decoder::new(data);
        let webp_image = decoder
            .decode()
            .ok_or_else(|| OptimizerError::decode_failed("webp", "libwebp decode failed"))?;

        let (width, height) = (webp_image.width(), webp_image.height());
        let max = ImageFormat::WebP.max_dimension();
        if width == 0 || height == 0 || width > max || height > max {
            return Err(OptimizerError::invalid_image(format!(
                "webp dimensions {width}x{height} out of bounds"
            )));
        }

        let rgba: RgbaImage = webp_image.to_image().into_rgba8();
        ImageBuffer::new(width, height, 4, rgba.into_raw())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_rgb(width: u32, height: u32) -> ImageBuffer {
        let data = vec![200u8; width as usize * height as usize * 3];
        ImageBuffer::new(width, height, 3, data).unwrap()
    }

    #[test]
    fn encode_produces_riff_webp_container() {
        let buf = solid_rgb(8, 8);
        let bytes = encode(&buf, 75).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn encode_rejects_out_of_range_quality() {
        let buf = solid_rgb(4, 4);
        let err = encode(&buf, 101).unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidQuality { .. }));
    }

    #[test]
    fn roundtrip_decode_is_always_rgba() {
        let buf = solid_rgb(6, 6);
        let encoded = encode(&buf, 90).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.channels(), 4);
    }

    #[test]
    fn quality_100_round_trips_losslessly() {
        let buf = solid_rgb(6, 6);
        let encoded = encode(&buf, 100).unwrap();
        let decoded = decode(&encoded).unwrap();
        for (a, b) in buf.data().chunks_exact(3).zip(decoded.data().chunks_exact(4)) {
            assert_eq!(a, &b[..3]);
        }
    }
}
