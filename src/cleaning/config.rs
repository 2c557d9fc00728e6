use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-operation toggles and parameters for [`crate::cleaning::clean`].
///
/// Every operation is disabled unless its object says `"enabled": true`;
/// missing keys fall back to the defaults below and unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub file_size_filtering: FileSizeFiltering,
    pub header_management: HeaderManagement,
    pub static_flight_detection: StaticFlightDetection,
    pub trim_static_start: TrimStaticStart,
    pub remove_static_samples: RemoveStaticSamples,
    pub remove_quaternion_columns: RemoveQuaternionColumns,
    pub anomaly_detection: AnomalyDetection,
    pub file_resequencing: FileResequencing,
}

impl CleaningConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Default parameters with every operation switched on.
    pub fn all_enabled() -> Self {
        let mut config = CleaningConfig::default();
        config.file_size_filtering.enabled = true;
        config.header_management.enabled = true;
        config.static_flight_detection.enabled = true;
        config.trim_static_start.enabled = true;
        config.remove_static_samples.enabled = true;
        config.remove_quaternion_columns.enabled = true;
        config.anomaly_detection.enabled = true;
        config.file_resequencing.enabled = true;
        config
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSizeFiltering {
    pub enabled: bool,
    pub min_size_mb: f64,
}

impl Default for FileSizeFiltering {
    fn default() -> Self {
        Self {
            enabled: false,
            min_size_mb: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderManagement {
    pub enabled: bool,
    /// Canonical header, matched to existing columns by position.
    pub standard_headers: Vec<String>,
}

pub const STANDARD_HEADERS: [&str; 27] = [
    "sec",
    "nanosec",
    "frame_id",
    "position_n",
    "position_e",
    "position_d",
    "va",
    "alpha",
    "beta",
    "phi",
    "theta",
    "psi",
    "chi",
    "u",
    "v",
    "w",
    "p",
    "q",
    "r",
    "vg",
    "wn",
    "we",
    "chi_deg",
    "psi_deg",
    "initial_lat",
    "initial_long",
    "initial_alt",
];

impl Default for HeaderManagement {
    fn default() -> Self {
        Self {
            enabled: false,
            standard_headers: STANDARD_HEADERS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFlightDetection {
    pub enabled: bool,
    /// Tracks shorter than this (total distance) are dropped entirely.
    pub distance_threshold: f64,
}

impl Default for StaticFlightDetection {
    fn default() -> Self {
        Self {
            enabled: false,
            distance_threshold: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimStaticStart {
    pub enabled: bool,
    pub window_size: usize,
    /// Accepted for compatibility with existing configs; the window test
    /// only looks at position spread.
    pub speed_threshold: f64,
    pub position_threshold: f64,
}

impl Default for TrimStaticStart {
    fn default() -> Self {
        Self {
            enabled: false,
            window_size: 50,
            speed_threshold: 0.5,
            position_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoveStaticSamples {
    pub enabled: bool,
    /// Rows at or below this speed are dropped.
    pub speed_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoveQuaternionColumns {
    pub enabled: bool,
    pub columns: Vec<String>,
}

impl Default for RemoveQuaternionColumns {
    fn default() -> Self {
        Self {
            enabled: false,
            columns: ["Quat_1", "Quat_2", "Quat_3", "Quat_4", "quat_valid"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

pub const METRIC_AVERAGE_SPEED: &str = "average_speed";
pub const METRIC_TOTAL_DISTANCE: &str = "total_distance";
pub const METRIC_ALTITUDE_CHANGE: &str = "altitude_change";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyDetection {
    pub enabled: bool,
    /// Reserved for cross-file comparison; single-file checks use the fixed
    /// limits below.
    pub std_threshold: f64,
    /// Which metrics to check: `average_speed`, `total_distance`,
    /// `altitude_change`. Unknown names are ignored.
    pub metrics: Vec<String>,
    /// Flag anomalies without dropping rows.
    pub flag_only: bool,
    pub max_average_speed: f64,
    pub max_altitude_change: f64,
    /// `total_distance` is only checked when a limit is configured.
    pub max_total_distance: Option<f64>,
}

impl Default for AnomalyDetection {
    fn default() -> Self {
        Self {
            enabled: false,
            std_threshold: 2.0,
            metrics: [METRIC_AVERAGE_SPEED, METRIC_TOTAL_DISTANCE, METRIC_ALTITUDE_CHANGE]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            flag_only: true,
            max_average_speed: 100.0,
            max_altitude_change: 5000.0,
            max_total_distance: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileResequencing {
    pub enabled: bool,
    /// Pattern with a `{number}` placeholder, applied by the batch caller.
    pub base_filename: String,
}

impl Default for FileResequencing {
    fn default() -> Self {
        Self {
            enabled: false,
            base_filename: "test {number}.csv".to_string(),
        }
    }
}
