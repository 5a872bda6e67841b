// src/codecs/avif_raii.rs
//
// Safe RAII wrappers around libavif FFI handles. Every native handle this
// crate touches is acquired here and released on every exit path via `Drop`
// (SPEC_FULL.md §4.2's "scoped acquisition" requirement) — carried over
// directly from the teacher's `codecs/avif_safe.rs`.

use crate::error::OptimizerError;
use crate::format::ImageFormat;
use libavif_sys::*;
use std::num::NonZeroU32;

/// RAII wrapper for `avifImage`.
pub struct SafeAvifImage {
    ptr: *mut avifImage,
}

impl SafeAvifImage {
    fn validate_dimensions(width: u32, height: u32) -> Result<(NonZeroU32, NonZeroU32), OptimizerError> {
        let w = NonZeroU32::new(width)
            .ok_or_else(|| OptimizerError::encode_failed("avif", "width must be greater than 0"))?;
        let h = NonZeroU32::new(height)
            .ok_or_else(|| OptimizerError::encode_failed("avif", "height must be greater than 0"))?;

        let max = ImageFormat::Avif.max_dimension();
        if width > max || height > max {
            return Err(OptimizerError::encode_failed(
                "avif",
                format!("dimensions {width}x{height} exceed max dimension {max}"),
            ));
        }

        width
            .checked_mul(height)
            .ok_or_else(|| OptimizerError::encode_failed("avif", "pixel count overflow"))?;

        Ok((w, h))
    }

    pub fn new(width: u32, height: u32, depth: u32, pixel_format: avifPixelFormat) -> Result<Self, OptimizerError> {
        Self::validate_dimensions(width, height)?;
        let ptr = unsafe { avifImageCreate(width, height, depth, pixel_format) };
        if ptr.is_null() {
            return Err(OptimizerError::encode_failed("avif", "failed to create AVIF image"));
        }
        Ok(Self { ptr })
    }

    pub fn set_color_properties(&mut self, primaries: u16, transfer: u16, matrix: u16, yuv_range: avifRange) {
        unsafe {
            (*self.ptr).colorPrimaries = primaries;
            (*self.ptr).transferCharacteristics = transfer;
            (*self.ptr).matrixCoefficients = matrix;
            (*self.ptr).yuvRange = yuv_range;
        }
    }

    pub fn set_icc_profile(&mut self, icc: &[u8]) -> Result<(), OptimizerError> {
        let result = unsafe { avifImageSetProfileICC(self.ptr, icc.as_ptr(), icc.len()) };
        if result != AVIF_RESULT_OK {
            return Err(OptimizerError::encode_failed(
                "avif",
                format!("failed to set ICC profile: {result:?}"),
            ));
        }
        Ok(())
    }

    pub fn allocate_planes(&mut self, planes: u32) -> Result<(), OptimizerError> {
        let result = unsafe { avifImageAllocatePlanes(self.ptr, planes) };
        if result != AVIF_RESULT_OK {
            return Err(OptimizerError::encode_failed(
                "avif",
                format!("failed to allocate planes: {result:?}"),
            ));
        }
        Ok(())
    }

    pub fn rgb_to_yuv(&mut self, rgb: &avifRGBImage) -> Result<(), OptimizerError> {
        let result = unsafe { avifImageRGBToYUV(self.ptr, rgb) };
        if result != AVIF_RESULT_OK {
            return Err(OptimizerError::encode_failed(
                "avif",
                format!("failed to convert RGB to YUV: {result:?}"),
            ));
        }
        Ok(())
    }

    /// # Safety
    /// The caller must ensure the alpha plane has been allocated and the
    /// pointer is not used after this image is dropped.
    pub unsafe fn alpha_plane_mut(&mut self) -> *mut u8 {
        (*self.ptr).alphaPlane
    }

    pub fn alpha_row_bytes(&self) -> usize {
        unsafe { (*self.ptr).alphaRowBytes as usize }
    }

    /// # Safety
    /// Must not outlive this wrapper and must not be used concurrently.
    pub unsafe fn as_mut_ptr(&mut self) -> *mut avifImage {
        self.ptr
    }
}

impl Drop for SafeAvifImage {
    fn drop(&mut self) {
        unsafe {
            if !self.ptr.is_null() {
                avifImageDestroy(self.ptr);
            }
        }
    }
}

/// RAII wrapper for `avifEncoder`.
pub struct SafeAvifEncoder {
    ptr: *mut avifEncoder,
}

impl SafeAvifEncoder {
    pub fn new() -> Result<Self, OptimizerError> {
        let ptr = unsafe { avifEncoderCreate() };
        if ptr.is_null() {
            return Err(OptimizerError::encode_failed("avif", "failed to create AVIF encoder"));
        }
        Ok(Self { ptr })
    }

    pub fn configure(&mut self, quality: u8, quality_alpha: u8, speed: i32, max_threads: i32) {
        unsafe {
            (*self.ptr).quality = quality as i32;
            (*self.ptr).qualityAlpha = quality_alpha as i32;
            (*self.ptr).speed = speed;
            (*self.ptr).maxThreads = max_threads;
        }
    }

    pub fn add_image(&mut self, image: &mut SafeAvifImage, duration: u64, add_image_flags: u32) -> Result<(), OptimizerError> {
        let result = unsafe { avifEncoderAddImage(self.ptr, image.as_mut_ptr(), duration, add_image_flags) };
        if result != AVIF_RESULT_OK {
            return Err(OptimizerError::encode_failed(
                "avif",
                format!("failed to add image to encoder: {result:?}"),
            ));
        }
        Ok(())
    }

    pub fn finish(&mut self, output: &mut SafeAvifRwData) -> Result<(), OptimizerError> {
        let result = unsafe { avifEncoderFinish(self.ptr, output.as_mut_ptr()) };
        if result != AVIF_RESULT_OK {
            return Err(OptimizerError::encode_failed("avif", format!("failed to finish encoding: {result:?}")));
        }
        Ok(())
    }
}

impl Drop for SafeAvifEncoder {
    fn drop(&mut self) {
        unsafe {
            if !self.ptr.is_null() {
                avifEncoderDestroy(self.ptr);
            }
        }
    }
}

/// RAII wrapper for `avifRWData`.
pub struct SafeAvifRwData {
    data: avifRWData,
}

impl SafeAvifRwData {
    pub fn new() -> Self {
        Self {
            data: unsafe { std::mem::zeroed() },
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe {
            if self.data.data.is_null() || self.data.size == 0 {
                &[]
            } else {
                std::slice::from_raw_parts(self.data.data, self.data.size)
            }
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    /// # Safety
    /// Must not be used after this wrapper is dropped.
    pub unsafe fn as_mut_ptr(&mut self) -> *mut avifRWData {
        &mut self.data
    }
}

impl Drop for SafeAvifRwData {
    fn drop(&mut self) {
        unsafe {
            avifRWDataFree(&mut self.data);
        }
    }
}

impl Default for SafeAvifRwData {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an `avifRGBImage` view over caller-owned RGBA8 pixels.
pub fn create_rgb_image(image: &mut SafeAvifImage, pixels: *const u8, width: u32, height: u32) -> Result<avifRGBImage, OptimizerError> {
    SafeAvifImage::validate_dimensions(width, height)?;

    let row_bytes: u32 = width
        .checked_mul(4)
        .ok_or_else(|| OptimizerError::encode_failed("avif", "row bytes overflow for RGBA image"))?;

    let total_bytes: usize = (row_bytes as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| OptimizerError::encode_failed("avif", "pixel buffer size overflow for RGBA image"))?;

    if total_bytes == 0 {
        return Err(OptimizerError::encode_failed("avif", "pixel buffer size must be greater than 0"));
    }
    if pixels.is_null() {
        return Err(OptimizerError::encode_failed("avif", "pixel buffer pointer is null"));
    }

    let mut rgb: avifRGBImage = unsafe { std::mem::zeroed() };
    unsafe {
        avifRGBImageSetDefaults(&mut rgb, image.as_mut_ptr());
        rgb.format = AVIF_RGB_FORMAT_RGBA;
        rgb.depth = 8;
        rgb.pixels = pixels as *mut u8;
        rgb.rowBytes = row_bytes;
    }
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_zero_dimensions() {
        let err = SafeAvifImage::new(0, 10, 8, AVIF_PIXEL_FORMAT_YUV420)
            .err()
            .expect("zero width should fail");
        assert!(err.to_string().contains("width must be greater than 0"));
    }

    #[test]
    fn new_rejects_dimension_limits() {
        let over = ImageFormat::Avif.max_dimension() + 1;
        let err = SafeAvifImage::new(over, 10, 8, AVIF_PIXEL_FORMAT_YUV420)
            .err()
            .expect("dimensions beyond limit should fail");
        assert!(err.to_string().contains("exceed max dimension"));
    }

    #[test]
    fn create_rgb_image_sets_row_bytes() {
        let mut img = SafeAvifImage::new(4, 2, 8, AVIF_PIXEL_FORMAT_YUV420).unwrap();
        let pixels: [u8; 32] = [0; 32];
        let rgb = create_rgb_image(&mut img, pixels.as_ptr(), 4, 2).unwrap();
        assert_eq!(rgb.rowBytes, 16);
        assert_eq!(rgb.format, AVIF_RGB_FORMAT_RGBA);
    }
}
