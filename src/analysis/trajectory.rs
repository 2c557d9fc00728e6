use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use super::columns::{ColumnRoleMapping, Role};
use super::stats::{column_stats, normalize_zero, ColumnStats};
use crate::config::ProcessingOptions;
use crate::data::filter::position_rows;
use crate::data::model::{parse_number, CellValue, Table};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Where an input came from, for labelling results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceInfo {
    pub filename: String,
    pub size_bytes: u64,
}

impl SourceInfo {
    pub fn new(filename: impl Into<String>, size_bytes: u64) -> Self {
        SourceInfo {
            filename: filename.into(),
            size_bytes,
        }
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MB
    }
}

// ---------------------------------------------------------------------------
// Time base
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    /// ROS2 `sec` + `nanosec` pair.
    SecNanosec,
    /// A plain `time` / `timestamp` / `t` column.
    TimeColumn,
    /// Row index divided by an assumed rate.
    RowIndex,
}

/// Per-row absolute time in seconds, if the table carries a time base.
pub fn time_values(
    table: &Table,
    mapping: &ColumnRoleMapping,
) -> Option<(TimeSource, Vec<Option<f64>>)> {
    let sec = mapping.get(Role::Sec).and_then(|c| table.column(c));
    let nanosec = mapping.get(Role::Nanosec).and_then(|c| table.column(c));
    if let (Some(sec), Some(nanosec)) = (sec, nanosec) {
        let values = sec
            .values
            .iter()
            .zip(&nanosec.values)
            .map(|(s, ns)| Some(parse_number(s)? + parse_number(ns)? / 1e9))
            .collect();
        return Some((TimeSource::SecNanosec, values));
    }

    let column = table
        .columns()
        .iter()
        .find(|c| matches!(c.name.trim().to_lowercase().as_str(), "time" | "timestamp" | "t"))?;
    if !column.is_numeric() {
        warn!("Time column '{}' is not numeric, ignoring it", column.name);
        return None;
    }
    debug!("Found time column: {}", column.name);
    Some((TimeSource::TimeColumn, column.numbers()))
}

// ---------------------------------------------------------------------------
// Trajectory metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedBasis {
    /// Distance per second of recorded time.
    PerSecond,
    /// Distance per position sample (no time base available).
    PerSample,
}

/// Read-only snapshot of whole-trajectory figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryMetrics {
    /// Sum of consecutive 3D distances (scaled estimate when strided).
    pub total_distance: f64,
    pub distance_is_estimate: bool,
    pub distance_stride: usize,
    /// Rows with all three position cells numeric.
    pub position_rows: usize,
    pub avg_speed: f64,
    pub speed_basis: SpeedBasis,
    pub static_samples: usize,
    pub static_percentage: f64,
    pub min_altitude: f64,
    pub max_altitude: f64,
    pub altitude_change: f64,
    /// `[min_altitude, max_altitude]`, altitude being `-position_d`.
    pub altitude_range: [f64; 2],
    pub duration: f64,
    pub sampling_rate: f64,
    pub time_source: Option<TimeSource>,
}

/// Metrics, or the reason they could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrajectoryOutcome {
    Metrics(TrajectoryMetrics),
    Error { error: String },
}

impl TrajectoryOutcome {
    pub fn metrics(&self) -> Option<&TrajectoryMetrics> {
        match self {
            TrajectoryOutcome::Metrics(m) => Some(m),
            TrajectoryOutcome::Error { .. } => None,
        }
    }
}

pub fn trajectory_metrics(
    table: &Table,
    mapping: Option<&ColumnRoleMapping>,
    opts: &ProcessingOptions,
) -> std::result::Result<TrajectoryMetrics, String> {
    let mapping = mapping
        .filter(|m| m.check_against(table).is_ok())
        .ok_or_else(|| "Position data columns not found in file".to_string())?;

    let rows = position_rows(table, mapping.positions());
    if rows.len() < 2 {
        return Err("Not enough position data points to calculate trajectory metrics".to_string());
    }

    let steps = rows.len() - 1;
    let stride = if rows.len() > opts.distance_stride_threshold_rows {
        (steps / opts.distance_target_steps.max(1)).max(1)
    } else {
        1
    };

    let mut sampled_distance = 0.0;
    let mut sampled_steps = 0usize;
    let mut sampled_static = 0usize;
    for i in (1..rows.len()).step_by(stride) {
        let d = rows[i - 1].distance_to(&rows[i]);
        sampled_distance += d;
        sampled_steps += 1;
        if d < opts.static_epsilon {
            sampled_static += 1;
        }
    }
    let total_distance = sampled_distance * stride as f64;
    let static_samples = (sampled_static * stride).min(steps);
    let static_percentage = sampled_static as f64 / sampled_steps as f64 * 100.0;
    if stride > 1 {
        debug!("Distance estimated over every {stride}th step ({sampled_steps} steps)");
    }

    let (min_d, max_d) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
        (lo.min(r.ned[2]), hi.max(r.ned[2]))
    });
    let min_altitude = normalize_zero(-max_d);
    let max_altitude = normalize_zero(-min_d);

    let (time_source, duration) = match time_values(table, mapping) {
        Some((source, values)) => {
            let present: Vec<f64> = values.into_iter().flatten().collect();
            let lo = present.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let duration = if present.is_empty() { 0.0 } else { hi - lo };
            (Some(source), duration)
        }
        None => (None, 0.0),
    };
    let sampling_rate = if duration > 0.0 {
        table.row_count() as f64 / duration
    } else {
        0.0
    };
    let (avg_speed, speed_basis) = if duration > 0.0 {
        (total_distance / duration, SpeedBasis::PerSecond)
    } else {
        (total_distance / rows.len() as f64, SpeedBasis::PerSample)
    };

    Ok(TrajectoryMetrics {
        total_distance,
        distance_is_estimate: stride > 1,
        distance_stride: stride,
        position_rows: rows.len(),
        avg_speed,
        speed_basis,
        static_samples,
        static_percentage,
        min_altitude,
        max_altitude,
        altitude_change: max_altitude - min_altitude,
        altitude_range: [min_altitude, max_altitude],
        duration,
        sampling_rate,
        time_source,
    })
}

// ---------------------------------------------------------------------------
// Full analysis payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    String,
    /// Every cell missing.
    Empty,
}

/// Everything the analyzer reports about one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryStatsResult {
    pub filename: String,
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub column_types: BTreeMap<String, ColumnType>,
    pub file_size_bytes: u64,
    pub file_size_mb: f64,
    pub missing_values: usize,
    pub missing_percentage: f64,
    pub numeric_stats: BTreeMap<String, ColumnStats>,
    pub trajectory_metrics: TrajectoryOutcome,
    pub column_mapping: Option<ColumnRoleMapping>,
    /// Figures come from a leading sample, not the whole input.
    pub is_sample_analysis: bool,
    pub timestamp: DateTime<Utc>,
    pub raw_preview: Vec<BTreeMap<String, CellValue>>,
}

impl TrajectoryStatsResult {
    pub fn metrics(&self) -> Option<&TrajectoryMetrics> {
        self.trajectory_metrics.metrics()
    }
}

/// Compute table and trajectory statistics.
///
/// Never fails: a missing mapping or unusable position data is reported in
/// `trajectory_metrics` while the remaining figures are still filled in.
pub fn analyze(
    table: &Table,
    mapping: Option<&ColumnRoleMapping>,
    sample_only: bool,
    source: &SourceInfo,
    opts: &ProcessingOptions,
) -> TrajectoryStatsResult {
    let sampled;
    let table = if sample_only && table.row_count() > opts.analysis_sample_rows {
        sampled = table.head(opts.analysis_sample_rows);
        &sampled
    } else {
        table
    };
    let is_sample_analysis = sample_only || table.is_truncated();
    info!(
        "Analyzing {} ({} rows, {} columns{})",
        source.filename,
        table.row_count(),
        table.column_count(),
        if is_sample_analysis { ", sampled" } else { "" }
    );

    let mut column_types = BTreeMap::new();
    let mut numeric_stats = BTreeMap::new();
    for col in table.columns() {
        let kind = if col.is_numeric() {
            if let Some(stats) = column_stats(&col.present_numbers()) {
                numeric_stats.insert(col.name.clone(), stats);
            }
            ColumnType::Numeric
        } else if col.missing_count() == col.values.len() {
            ColumnType::Empty
        } else {
            ColumnType::String
        };
        column_types.insert(col.name.clone(), kind);
    }

    let cells = table.row_count() * table.column_count();
    let missing_values = table.missing_count();
    let missing_percentage = if cells > 0 {
        missing_values as f64 / cells as f64 * 100.0
    } else {
        0.0
    };

    let trajectory_metrics = match trajectory_metrics(table, mapping, opts) {
        Ok(metrics) => TrajectoryOutcome::Metrics(metrics),
        Err(error) => {
            warn!("{}: {error}", source.filename);
            TrajectoryOutcome::Error { error }
        }
    };

    TrajectoryStatsResult {
        filename: source.filename.clone(),
        row_count: table.row_count(),
        column_count: table.column_count(),
        columns: table.column_names(),
        column_types,
        file_size_bytes: source.size_bytes,
        file_size_mb: source.size_mb(),
        missing_values,
        missing_percentage,
        numeric_stats,
        trajectory_metrics,
        column_mapping: mapping.cloned(),
        is_sample_analysis,
        timestamp: Utc::now(),
        raw_preview: table.preview(opts.preview_rows),
    }
}
