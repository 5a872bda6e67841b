// src/cache/meta.rs
//
// Cache metadata: a compact `key=value` newline-delimited format. The parser
// walks a fixed, known field set with bounded per-line length and checked
// numeric parsing — no JSON crate, since a generic JSON parser would build a
// `Value` tree this format never needs (SPEC_FULL.md §4.7).

use crate::format::ImageFormat;

/// Defends against pathological files; no legitimate metadata line is close
/// to this long.
const MAX_LINE_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheMetadata {
    pub format: ImageFormat,
    pub file_size: u64,
    pub quality: u8,
    pub diff_score: f64,
    pub passed_constraints: bool,
    pub timestamp: u64,
    pub access_count: u64,
}

impl CacheMetadata {
    pub fn serialize(&self) -> String {
        format!(
            "format={}\nfile_size={}\nquality={}\ndiff_score={}\npassed_constraints={}\ntimestamp={}\naccess_count={}\n",
            self.format.label(),
            self.file_size,
            self.quality,
            self.diff_score,
            self.passed_constraints,
            self.timestamp,
            self.access_count,
        )
    }

    /// Bounded parse: any malformed or truncated field is a miss, never a
    /// panic or unbounded allocation. Unknown keys are ignored.
    pub fn parse(data: &str) -> Option<CacheMetadata> {
        let mut format = None;
        let mut file_size = None;
        let mut quality = None;
        let mut diff_score = None;
        let mut passed_constraints = None;
        let mut timestamp = None;
        let mut access_count = None;

        for line in data.lines() {
            if line.len() > MAX_LINE_LEN {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            match key {
                "format" => format = Some(ImageFormat::from_label(value)),
                "file_size" => file_size = value.parse::<u64>().ok(),
                "quality" => quality = value.parse::<u8>().ok(),
                "diff_score" => diff_score = value.parse::<f64>().ok(),
                "passed_constraints" => passed_constraints = value.parse::<bool>().ok(),
                "timestamp" => timestamp = value.parse::<u64>().ok(),
                "access_count" => access_count = value.parse::<u64>().ok(),
                _ => {}
            }

            if format.is_some()
                && file_size.is_some()
                && quality.is_some()
                && diff_score.is_some()
                && passed_constraints.is_some()
                && timestamp.is_some()
                && access_count.is_some()
            {
                break;
            }
        }

        Some(CacheMetadata {
            format: format?,
            file_size: file_size?,
            quality: quality?,
            diff_score: diff_score?,
            passed_constraints: passed_constraints?,
            timestamp: timestamp?,
            access_count: access_count?,
        })
    }
}
