use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Files above this size switch to chunked parsing and sampled statistics.
pub const LARGE_FILE_THRESHOLD_BYTES: u64 = 100 * 1024 * 1024;

// ---------------------------------------------------------------------------
// ProcessingOptions – knobs shared by every stage of the pipeline
// ---------------------------------------------------------------------------

/// Tunables for parsing, analysis and projection.
///
/// Every field has a default, so a partial JSON object (or `{}`) is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    /// Inputs larger than this are parsed in chunks and analysed from a sample.
    pub large_file_threshold_bytes: u64,
    /// Rows per chunk in streaming mode.
    pub chunk_rows: usize,
    /// Prefix size used to test a candidate encoding before a full decode.
    pub encoding_prefix_bytes: usize,
    /// Row cap for sampled analysis.
    pub analysis_sample_rows: usize,
    /// Above this many position rows the distance is estimated with a stride.
    pub distance_stride_threshold_rows: usize,
    /// Number of steps the strided distance estimate aims for.
    pub distance_target_steps: usize,
    /// Target upper bound on projected points when no rate is given.
    pub max_points: usize,
    /// Row rate assumed when the table carries no time base.
    pub assumed_rate_hz: f64,
    /// Visual exaggeration applied to altitude in the scene frame.
    pub altitude_scale: f64,
    /// Consecutive-point distance under which a sample counts as static.
    pub static_epsilon: f64,
    /// Rows included in `raw_preview` / `cleaned_preview`.
    pub preview_rows: usize,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            large_file_threshold_bytes: LARGE_FILE_THRESHOLD_BYTES,
            chunk_rows: 50_000,
            encoding_prefix_bytes: 256 * 1024,
            analysis_sample_rows: 50_000,
            distance_stride_threshold_rows: 100_000,
            distance_target_steps: 10_000,
            max_points: 1_000,
            assumed_rate_hz: 10.0,
            altitude_scale: 1.8,
            static_epsilon: 0.01,
            preview_rows: 5,
        }
    }
}

impl ProcessingOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether an input of `size_bytes` takes the chunked path.
    pub fn is_large(&self, size_bytes: u64) -> bool {
        size_bytes > self.large_file_threshold_bytes
    }
}
