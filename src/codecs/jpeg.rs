// src/codecs/jpeg.rs
//
// JPEG encode (mozjpeg) / decode (mozjpeg, libjpeg-turbo backed). Grounded on
// the teacher's `engine/encoder.rs::encode_jpeg_with_settings` and
// `engine/decoder.rs::decode_jpeg_mozjpeg`.

use crate::codecs::catch_codec_panic;
use crate::error::OptimizerError;
use crate::format::{ImageBuffer, ImageFormat};
use mozjpeg::{ColorSpace, Compress, Decompress, ScanMode};

/// Quality band driving mozjpeg's smoothing/scan settings.
fn smoothing_factor(quality: u8) -> i32 {
    if quality >= 90 {
        0
    } else if quality >= 70 {
        5
    } else if quality >= 60 {
        10
    } else {
        18
    }
}

/// Encode an RGB/RGBA buffer to JPEG. RGBA input has its alpha channel
/// dropped with a warning, per SPEC_FULL.md §4.2's channel table.
pub fn encode(buffer: &ImageBuffer, quality: u8) -> Result<Vec<u8>, OptimizerError> {
    let (min, max) = ImageFormat::Jpeg.quality_range();
    if (quality as i32) < min as i32 || (quality as i32) > max as i32 {
        return Err(OptimizerError::InvalidQuality {
            format: "jpeg".into(),
            quality: quality as i32,
            min: min as i32,
            max: max as i32,
        });
    }

    let width = buffer.width();
    let height = buffer.height();
    if width > ImageFormat::Jpeg.max_dimension() || height > ImageFormat::Jpeg.max_dimension() {
        return Err(OptimizerError::invalid_image(format!(
            "jpeg dimensions {width}x{height} exceed format cap"
        )));
    }

    let rgb = to_rgb(buffer);

    catch_codec_panic("jpeg", move || {
        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(quality as f32);
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        comp.set_optimize_scans(true);
        comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
        comp.set_smoothing_factor(smoothing_factor(quality));

        let estimated_size = (width as usize * height as usize * 3 / 10).max(4096);
        let mut output = Vec::with_capacity(estimated_size);

        let mut writer = comp.start_compress(&mut output).map_err(|e| {
            OptimizerError::encode_failed("jpeg", format!("mozjpeg: failed to start compress: {e:?}"))
        })?;

        let stride = width as usize * 3;
        for row in rgb.chunks(stride) {
            writer
                .write_scanlines(row)
                .map_err(|e| OptimizerError::encode_failed("jpeg", format!("mozjpeg: failed to write scanlines: {e:?}")))?;
        }
        writer
            .finish()
            .map_err(|e| OptimizerError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}")))?;

        Ok(output)
    })
}

fn to_rgb(buffer: &ImageBuffer) -> Vec<u8> {
    if buffer.channels() == 3 {
        return buffer.data().to_vec();
    }
    tracing::warn!("dropping alpha channel for jpeg encode");
    let pixels = buffer.width() as usize * buffer.height() as usize;
    let mut rgb = Vec::with_capacity(pixels * 3);
    for px in buffer.data().chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    rgb
}

/// Decode JPEG bytes into an RGB buffer via mozjpeg.
pub fn decode(data: &[u8]) -> Result<ImageBuffer, OptimizerError> {
    if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
        return Err(OptimizerError::decode_failed("jpeg", "missing JPEG EOI marker"));
    }

    catch_codec_panic("jpeg", move || {
        let decompress = Decompress::new_mem(data)
            .map_err(|e| OptimizerError::decode_failed("jpeg", format!("decompress init failed: {e:?}")))?;
        let mut decompress = decompress
            .rgb()
            .map_err(|e| OptimizerError::decode_failed("jpeg", format!("rgb conversion failed: {e:?}")))?;

        let width = decompress.width() as u32;
        let height = decompress.height() as u32;
        if width == 0 || height == 0 || width > ImageFormat::Jpeg.max_dimension() || height > ImageFormat::Jpeg.max_dimension() {
            return Err(OptimizerError::invalid_image(format!(
                "jpeg dimensions {width}x{height} out of bounds"
            )));
        }

        let pixels: Vec<[u8; 3]> = decompress
            .read_scanlines()
            .map_err(|e| OptimizerError::decode_failed("jpeg", format!("failed to read scanlines: {e:?}")))?;
        let flat: Vec<u8> = pixels.into_iter().flatten().collect();

        ImageBuffer::new(width, height, 3, flat)
    })
}
