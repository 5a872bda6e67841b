// src/metric.rs
//
// Perceptual metric layer (C4). Pluggable structural-dissimilarity scoring of
// a candidate against the decoded original (SPEC_FULL.md §4.3).
//
// No teacher precedent exists for this component (the teacher never scores
// its own output); grounded on `dssim-core`, the crate other pack repos
// (see DESIGN.md) reach for to fill exactly this role.

use crate::error::OptimizerError;
use crate::format::ImageBuffer;
use dssim_core::{Dssim, DssimImage, RGBAPLU};
use imgref::ImgVec;
use rgb::RGBA;

/// Decompression-bomb ceiling for the metric layer specifically (separate
/// from the codec layer's per-format dimension caps).
pub const MAX_METRIC_PIXELS: u64 = 500_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    Dssim,
    /// Reserved: recognized but unimplemented, per the Open Question decision
    /// in SPEC_FULL.md §9.
    Ssimulacra2,
    None,
}

impl MetricKind {
    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Dssim => "dssim",
            MetricKind::Ssimulacra2 => "ssimulacra2",
            MetricKind::None => "none",
        }
    }
}

/// Score `candidate` against `original`. Pure and deterministic: no shared
/// mutable state, no RNG, no wall-clock read inside the scoring path itself.
pub fn score(kind: MetricKind, original: &ImageBuffer, candidate: &ImageBuffer) -> Result<f64, OptimizerError> {
    match kind {
        MetricKind::None => Ok(0.0),
        MetricKind::Ssimulacra2 => Err(OptimizerError::UnsupportedMetric {
            metric: kind.label().into(),
        }),
        MetricKind::Dssim => dssim_score(original, candidate),
    }
}

fn dssim_score(a: &ImageBuffer, b: &ImageBuffer) -> Result<f64, OptimizerError> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(OptimizerError::DimensionMismatch {
            width_a: a.width(),
            height_a: a.height(),
            width_b: b.width(),
            height_b: b.height(),
        });
    }

    let pixels = a.pixel_count();
    if pixels > MAX_METRIC_PIXELS {
        return Err(OptimizerError::invalid_image(format!(
            "pixel count {pixels} exceeds metric ceiling {MAX_METRIC_PIXELS}"
        )));
    }

    let attr = Dssim::new();
    let img_a = to_dssim_image(&attr, a)?;
    let img_b = to_dssim_image(&attr, b)?;

    let (score, _maps) = attr.compare(&img_a, &img_b);
    let score: f64 = score.into();

    if !score.is_finite() || score < 0.0 {
        return Err(OptimizerError::invalid_image("dssim produced a non-finite or negative score"));
    }
    Ok(score)
}

/// Normalizes 8-bit channels to the [0,1] f32 range `dssim-core` expects,
/// following the pack's own manual RGBA-to-`RGBAPLU` conversion (no
/// from-integer helper is assumed to exist on the crate's public API).
fn to_dssim_image(attr: &Dssim, buffer: &ImageBuffer) -> Result<DssimImage<f32>, OptimizerError> {
    let width = buffer.width() as usize;
    let height = buffer.height() as usize;
    const MAX: f32 = u8::MAX as f32;

    let pixels: Vec<RGBAPLU> = if buffer.channels() == 4 {
        buffer
            .data()
            .chunks_exact(4)
            .map(|p| RGBA::new(p[0] as f32 / MAX, p[1] as f32 / MAX, p[2] as f32 / MAX, p[3] as f32 / MAX))
            .collect()
    } else {
        buffer
            .data()
            .chunks_exact(3)
            .map(|p| RGBA::new(p[0] as f32 / MAX, p[1] as f32 / MAX, p[2] as f32 / MAX, 1.0))
            .collect()
    };

    let img = ImgVec::new(pixels, width, height);
    attr.create_image(&img)
        .ok_or_else(|| OptimizerError::invalid_image("dssim image creation failed"))
}
