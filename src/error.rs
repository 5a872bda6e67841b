// src/error.rs
//
// Structured error types for the optimizer core.

use std::path::PathBuf;

/// Every failure mode the optimizer core can produce.
///
/// Variants map to the exit-code taxonomy via [`OptimizerError::exit_class`].
/// Not every variant fails a job outright — see the propagation table in
/// SPEC_FULL.md §7; some are recorded as warnings and the job continues.
#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    #[error("invalid image: {reason}")]
    InvalidImage { reason: String },

    #[error("decode failed for {format}: {reason}")]
    DecodeFailed { format: String, reason: String },

    #[error("encode failed for {format}: {reason}")]
    EncodeFailed { format: String, reason: String },

    #[error("invalid quality {quality} for {format} (expected {min}..={max})")]
    InvalidQuality {
        format: String,
        quality: i32,
        min: i32,
        max: i32,
    },

    #[error("input file too large: {size} bytes exceeds {limit} byte ceiling")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("dimension mismatch: {width_a}x{height_a} vs {width_b}x{height_b}")]
    DimensionMismatch {
        width_a: u32,
        height_a: u32,
        width_b: u32,
        height_b: u32,
    },

    #[error("unsupported metric: {metric}")]
    UnsupportedMetric { metric: String },

    #[error("cache error: {reason}")]
    Cache { reason: String },

    #[error("worker panicked while encoding {format}: {message}")]
    WorkerPanic { format: String, message: String },

    #[error("failed to read {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OptimizerError {
    /// Exit-code class from SPEC_FULL.md §6/§7, exhaustively matched so a new
    /// variant cannot silently fall through to `1`.
    pub fn exit_class(&self) -> u8 {
        match self {
            OptimizerError::InvalidImage { .. } => 12,
            OptimizerError::DecodeFailed { .. } => 12,
            OptimizerError::FileTooLarge { .. } => 12,
            OptimizerError::FileReadFailed { .. } => 12,
            OptimizerError::EncodeFailed { .. } => 13,
            OptimizerError::UnsupportedMetric { .. } => 14,
            OptimizerError::InvalidQuality { .. }
            | OptimizerError::DimensionMismatch { .. }
            | OptimizerError::Cache { .. }
            | OptimizerError::WorkerPanic { .. } => 1,
        }
    }

    pub fn invalid_image(reason: impl Into<String>) -> Self {
        OptimizerError::InvalidImage {
            reason: reason.into(),
        }
    }

    pub fn decode_failed(format: impl Into<String>, reason: impl Into<String>) -> Self {
        OptimizerError::DecodeFailed {
            format: format.into(),
            reason: reason.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, reason: impl Into<String>) -> Self {
        OptimizerError::EncodeFailed {
            format: format.into(),
            reason: reason.into(),
        }
    }

    pub fn cache(reason: impl Into<String>) -> Self {
        OptimizerError::Cache {
            reason: reason.into(),
        }
    }
}
