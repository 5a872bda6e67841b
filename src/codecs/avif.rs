// src/codecs/avif.rs
//
// AVIF encode/decode via libavif (AOMedia reference implementation, rav1e
// codec backend). Encode is grounded on the teacher's
// `engine/encoder.rs::encode_avif`; decode follows the same RAII-guard shape
// the teacher uses for ICC extraction in `engine/io.rs::extract_icc_from_avif`,
// extended to pull the full decoded image rather than just its ICC profile.

use crate::codecs::avif_raii::{create_rgb_image, SafeAvifEncoder, SafeAvifImage, SafeAvifRwData};
use crate::codecs::catch_codec_panic;
use crate::error::OptimizerError;
use crate::format::{ImageBuffer, ImageFormat};
use libavif_sys::*;
use std::cmp;

/// AVIF speed (0 slowest/best .. 10 fastest/worst), derived from quality per
/// the Open Question decision in SPEC_FULL.md §9 (codec-layer-only, not a job field).
fn speed_for_quality(quality: u8) -> i32 {
    if quality >= 85 {
        6
    } else if quality >= 70 {
        7
    } else if quality >= 50 {
        8
    } else {
        9
    }
}

pub fn encode(buffer: &ImageBuffer, quality: u8) -> Result<Vec<u8>, OptimizerError> {
    let (min, max) = ImageFormat::Avif.quality_range();
    if quality < min || quality > max {
        return Err(OptimizerError::InvalidQuality {
            format: "avif".into(),
            quality: quality as i32,
            min: min as i32,
            max: max as i32,
        });
    }

    let width = buffer.width();
    let height = buffer.height();
    if width > ImageFormat::Avif.max_dimension() || height > ImageFormat::Avif.max_dimension() {
        return Err(OptimizerError::invalid_image(format!(
            "avif dimensions {width}x{height} exceed format cap"
        )));
    }

    let has_alpha = buffer.channels() == 4;
    let rgba = to_rgba(buffer);

    catch_codec_panic("avif", move || {
        let mut avif_image = SafeAvifImage::new(width, height, 8, AVIF_PIXEL_FORMAT_YUV420)?;
        avif_image.set_color_properties(
            AVIF_COLOR_PRIMARIES_BT709 as u16,
            AVIF_TRANSFER_CHARACTERISTICS_SRGB as u16,
            AVIF_MATRIX_COEFFICIENTS_BT709 as u16,
            AVIF_RANGE_FULL,
        );

        let rgb = create_rgb_image(&mut avif_image, rgba.as_ptr(), width, height)?;
        avif_image.allocate_planes(AVIF_PLANES_YUV)?;
        avif_image.rgb_to_yuv(&rgb)?;

        if has_alpha {
            avif_image.allocate_planes(AVIF_PLANES_A)?;
            unsafe {
                let alpha_plane = avif_image.alpha_plane_mut();
                let alpha_row_bytes = avif_image.alpha_row_bytes();
                for y in 0..height as usize {
                    for x in 0..width as usize {
                        let src_idx = (y * width as usize + x) * 4 + 3;
                        let dst_idx = y * alpha_row_bytes + x;
                        *alpha_plane.add(dst_idx) = rgba[src_idx];
                    }
                }
            }
        }

        let mut encoder = SafeAvifEncoder::new()?;
        let cpu_threads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
        let encoder_threads = cmp::max(2, cmp::min(8, cpu_threads)) as i32;
        encoder.configure(quality, quality, speed_for_quality(quality), encoder_threads);

        let mut output = SafeAvifRwData::new();
        encoder.add_image(&mut avif_image, 1, AVIF_ADD_IMAGE_FLAG_SINGLE)?;
        encoder.finish(&mut output)?;

        Ok(output.to_vec())
    })
}

fn to_rgba(buffer: &ImageBuffer) -> Vec<u8> {
    if buffer.channels() == 4 {
        return buffer.data().to_vec();
    }
    let pixels = buffer.width() as usize * buffer.height() as usize;
    let mut rgba = Vec::with_capacity(pixels * 4);
    for px in buffer.data().chunks_exact(3) {
        rgba.extend_from_slice(px);
        rgba.push(255);
    }
    rgba
}

struct DecoderGuard(*mut avifDecoder);

impl Drop for DecoderGuard {
    fn drop(&mut self) {
        unsafe {
            if !self.0.is_null() {
                avifDecoderDestroy(self.0);
            }
        }
    }
}

/// Decode AVIF bytes into an RGBA buffer (AVIF decode is always 4-channel).
pub fn decode(data: &[u8]) -> Result<ImageBuffer, OptimizerError> {
    catch_codec_panic("avif", move || unsafe {
        let decoder = avifDecoderCreate();
        if decoder.is_null() {
            return Err(OptimizerError::decode_failed("avif", "failed to create decoder"));
        }
        let guard = DecoderGuard(decoder);

        let result = avifDecoderSetIOMemory(decoder, data.as_ptr(), data.len());
        if result != AVIF_RESULT_OK {
            return Err(OptimizerError::decode_failed("avif", format!("set IO memory failed: {result:?}")));
        }

        let result = avifDecoderParse(decoder);
        if result != AVIF_RESULT_OK {
            return Err(OptimizerError::invalid_image(format!("avif parse failed: {result:?}")));
        }

        let result = avifDecoderNextImage(decoder);
        if result != AVIF_RESULT_OK {
            return Err(OptimizerError::decode_failed("avif", format!("next image failed: {result:?}")));
        }

        let image = (*decoder).image;
        if image.is_null() {
            return Err(OptimizerError::decode_failed("avif", "decoder produced no image"));
        }

        let width = (*image).width;
        let height = (*image).height;
        let max = ImageFormat::Avif.max_dimension();
        if width == 0 || height == 0 || width > max || height > max {
            return Err(OptimizerError::invalid_image(format!("avif dimensions {width}x{height} out of bounds")));
        }

        let mut rgb: avifRGBImage = std::mem::zeroed();
        avifRGBImageSetDefaults(&mut rgb, image);
        rgb.format = AVIF_RGB_FORMAT_RGBA;
        rgb.depth = 8;

        let row_bytes = width
            .checked_mul(4)
            .ok_or_else(|| OptimizerError::invalid_image("avif row bytes overflow"))?;
        let total = (row_bytes as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| OptimizerError::invalid_image("avif pixel buffer overflow"))?;
        let mut pixels = vec![0u8; total];
        rgb.rowBytes = row_bytes;
        rgb.pixels = pixels.as_mut_ptr();

        let result = avifImageYUVToRGB(image, &mut rgb);
        if result != AVIF_RESULT_OK {
            return Err(OptimizerError::decode_failed("avif", format!("YUV to RGB conversion failed: {result:?}")));
        }

        drop(guard);
        ImageBuffer::new(width, height, 4, pixels)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_rgba(width: u32, height: u32) -> ImageBuffer {
        let data = vec![50u8, 100, 150, 255].repeat(width as usize * height as usize);
        ImageBuffer::new(width, height, 4, data).unwrap()
    }

    #[test]
    fn encode_rejects_out_of_range_quality() {
        let buf = solid_rgba(4, 4);
        let err = encode(&buf, 101).unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidQuality { .. }));
    }

    #[test]
    fn encode_produces_ftyp_box() {
        let buf = solid_rgba(8, 8);
        let bytes = encode(&buf, 60).unwrap();
        assert_eq!(&bytes[4..8], b"ftyp");
    }

    #[test]
    fn roundtrip_decode_is_always_rgba() {
        let buf = solid_rgba(8, 8);
        let encoded = encode(&buf, 70).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.channels(), 4);
        assert_eq!(decoded.width(), 8);
        assert_eq!(decoded.height(), 8);
    }

    #[test]
    fn speed_maps_to_quality_bands() {
        assert_eq!(speed_for_quality(95), 6);
        assert_eq!(speed_for_quality(75), 7);
        assert_eq!(speed_for_quality(55), 8);
        assert_eq!(speed_for_quality(10), 9);
    }
}
