// src/format.rs
//
// Image format tags and the owned pixel buffer they describe.

use crate::error::OptimizerError;

/// Tagged format variant. Dispatch over format is always an exhaustive match,
/// never a trait object (see DESIGN.md's note on C1/C3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Unknown,
}

impl ImageFormat {
    pub fn supports_alpha(self) -> bool {
        matches!(self, ImageFormat::Png | ImageFormat::WebP | ImageFormat::Avif)
    }

    pub fn supports_lossless(self) -> bool {
        matches!(
            self,
            ImageFormat::Png | ImageFormat::WebP | ImageFormat::Avif
        )
    }

    pub fn default_quality(self) -> u8 {
        match self {
            ImageFormat::Jpeg => 85,
            ImageFormat::Png => 6,
            ImageFormat::WebP => 80,
            ImageFormat::Avif => 60,
            ImageFormat::Unknown => 0,
        }
    }

    /// Inclusive quality range. PNG's "quality" is a compression level 0-9.
    pub fn quality_range(self) -> (u8, u8) {
        match self {
            ImageFormat::Jpeg => (1, 100),
            ImageFormat::Png => (0, 9),
            ImageFormat::WebP => (0, 100),
            ImageFormat::Avif => (0, 100),
            ImageFormat::Unknown => (0, 0),
        }
    }

    pub fn max_dimension(self) -> u32 {
        match self {
            ImageFormat::Jpeg | ImageFormat::Png => 65535,
            ImageFormat::WebP => 16383,
            ImageFormat::Avif => 65536,
            ImageFormat::Unknown => 0,
        }
    }

    /// Quality value at which this format's encoder is lossless.
    pub fn lossless_quality(self) -> Option<u8> {
        match self {
            ImageFormat::WebP | ImageFormat::Avif => Some(100),
            ImageFormat::Png => None, // PNG is always lossless regardless of level
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::WebP => "webp",
            ImageFormat::Avif => "avif",
            ImageFormat::Unknown => "bin",
        }
    }

    /// Tie-break ordering used by the selector: avif > webp > jpeg > png > unknown.
    /// Higher is preferred.
    pub fn preference_rank(self) -> u8 {
        match self {
            ImageFormat::Avif => 4,
            ImageFormat::WebP => 3,
            ImageFormat::Jpeg => 2,
            ImageFormat::Png => 1,
            ImageFormat::Unknown => 0,
        }
    }

    /// True for formats whose quality axis is a lossless compression-effort
    /// level rather than a perceptual-quality knob, so the C5 search only
    /// probes `default_quality` and the range midpoint instead of bisecting.
    pub fn is_single_probe_format(self) -> bool {
        matches!(self, ImageFormat::Png)
    }

    pub fn label(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::WebP => "webp",
            ImageFormat::Avif => "avif",
            ImageFormat::Unknown => "unknown",
        }
    }

    /// Inverse of `label`; used by cache metadata deserialization. Unknown
    /// or unrecognized text yields `ImageFormat::Unknown` rather than an error
    /// — the metadata parser treats any unknown field value as a miss upstream.
    pub fn from_label(label: &str) -> ImageFormat {
        match label {
            "jpeg" => ImageFormat::Jpeg,
            "png" => ImageFormat::Png,
            "webp" => ImageFormat::WebP,
            "avif" => ImageFormat::Avif,
            _ => ImageFormat::Unknown,
        }
    }
}

/// Owned RGB/RGBA pixel plane, row-major, 8-bit.
///
/// Created by a decoder, never mutated afterward, dropped when the owning
/// scope exits. Ownership is exclusive; workers borrow it immutably.
#[derive(Clone, Debug)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl ImageBuffer {
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, OptimizerError> {
        if width == 0 || height == 0 {
            return Err(OptimizerError::invalid_image("zero-sized image buffer"));
        }
        if channels != 3 && channels != 4 {
            return Err(OptimizerError::invalid_image(format!(
                "unsupported channel count {channels}"
            )));
        }
        let stride = width as usize * channels as usize;
        let expected = stride * height as usize;
        if data.len() != expected {
            return Err(OptimizerError::invalid_image(format!(
                "buffer length {} does not match stride*height {}",
                data.len(),
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let stride = self.stride();
        let start = stride * y as usize;
        self.data.get(start..start + stride)
    }

    /// Always allocates a fresh `Vec<u8>` — no `Arc`-sharing across the clone
    /// boundary, matching the data model's exclusive-ownership invariant.
    pub fn deep_clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: self.data.clone(),
        }
    }
}
