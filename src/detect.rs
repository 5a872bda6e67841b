// src/detect.rs
//
// Magic-number format classifier and the defense-in-depth re-verification
// every encoded candidate is put through before it is returned.
//
// Grounded on the teacher's `engine/io.rs` magic-byte chain (`is_avif_data`,
// the JPEG/PNG/RIFF checks ahead of ICC extraction).

use crate::error::OptimizerError;
use crate::format::ImageFormat;

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

/// Classifies raw bytes by magic number. Inputs shorter than 12 bytes always
/// classify as `Unknown` (SPEC_FULL §4.1).
pub fn detect_format(data: &[u8]) -> ImageFormat {
    if data.len() < 12 {
        return ImageFormat::Unknown;
    }
    if data[..3] == JPEG_MAGIC {
        return ImageFormat::Jpeg;
    }
    if data[..4] == PNG_MAGIC {
        return ImageFormat::Png;
    }
    if &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return ImageFormat::WebP;
    }
    if is_avif(data) {
        return ImageFormat::Avif;
    }
    ImageFormat::Unknown
}

/// AVIF: an ISOBMFF `ftyp` box at offset 4 whose major brand (or one of its
/// compatible brands) is `avif`/`avis`.
fn is_avif(data: &[u8]) -> bool {
    if data.len() < 16 || &data[4..8] != b"ftyp" {
        return false;
    }
    if &data[8..12] == b"avif" || &data[8..12] == b"avis" {
        return true;
    }
    // Compatible brands list starts at offset 16, 4 bytes each.
    let mut offset = 16;
    while offset + 4 <= data.len() {
        if &data[offset..offset + 4] == b"avif" || &data[offset..offset + 4] == b"avis" {
            return true;
        }
        offset += 4;
    }
    false
}

/// Re-verifies that `bytes` actually begins with `claimed`'s magic prefix.
/// Used as defense in depth on every freshly encoded candidate; a mismatch is
/// an `EncodeFailed`, never silently accepted (SPEC_FULL §4.1).
pub fn verify_format(bytes: &[u8], claimed: ImageFormat) -> Result<(), OptimizerError> {
    let detected = detect_format(bytes);
    if detected != claimed {
        return Err(OptimizerError::encode_failed(
            claimed.label(),
            format!(
                "magic verification failed: expected {}, detected {}",
                claimed.label(),
                detected.label()
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let mut v = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        v.extend_from_slice(&[0u8; 8]);
        v
    }

    #[test]
    fn detects_jpeg() {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(&[0u8; 12]);
        assert_eq!(detect_format(&data), ImageFormat::Jpeg);
    }

    #[test]
    fn detects_png() {
        assert_eq!(detect_format(&png_bytes()), ImageFormat::Png);
    }

    #[test]
    fn detects_webp() {
        let mut data = b"RIFF".to_vec();
        data.extend_from_slice(&[0u8; 4]);
        data.extend_from_slice(b"WEBP");
        assert_eq!(detect_format(&data), ImageFormat::WebP);
    }

    #[test]
    fn detects_avif_major_brand() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(b"ftyp");
        data.extend_from_slice(b"avif");
        data.extend_from_slice(&[0u8; 8]);
        assert_eq!(detect_format(&data), ImageFormat::Avif);
    }

    #[test]
    fn detects_avif_compatible_brand() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(b"ftyp");
        data.extend_from_slice(b"mif1"); // major brand not avif
        data.extend_from_slice(b"\0\0\0\0"); // minor version
        data.extend_from_slice(b"avif"); // compatible brand
        assert_eq!(detect_format(&data), ImageFormat::Avif);
    }

    #[test]
    fn short_input_is_unknown() {
        assert_eq!(detect_format(&[0xFF, 0xD8, 0xFF]), ImageFormat::Unknown);
    }

    #[test]
    fn verify_rejects_mismatch() {
        let png = png_bytes();
        assert!(verify_format(&png, ImageFormat::Png).is_ok());
        assert!(verify_format(&png, ImageFormat::Jpeg).is_err());
    }
}
