//! Rule-based cleaning of a trajectory table.
//!
//! Operations run in a fixed order, each on the output of the previous one:
//!
//! ```text
//!  file_size_filtering ─┐ (short-circuits when the file is too small)
//!  header_management    │
//!  static_flight_detection
//!  trim_static_start
//!  remove_static_samples
//!  remove_quaternion_columns
//!  anomaly_detection
//!  file_resequencing ───┘
//! ```
//!
//! A failing operation is recorded with `action: error` and the table passes
//! through it unchanged.

pub mod config;
pub mod report;

use std::collections::BTreeMap;

use log::{info, warn};

use crate::analysis::columns::{resolve_columns, ColumnRoleMapping};
use crate::analysis::trajectory::{TrajectoryMetrics, TrajectoryStatsResult};
use crate::config::ProcessingOptions;
use crate::data::filter::{distance, filtered_indices, position_cells};
use crate::data::loader::write_csv;
use crate::data::model::{Column, Table};
use crate::error::{Result, TrajectoryError};

pub use config::CleaningConfig;
use config::{
    AnomalyDetection, FileResequencing, FileSizeFiltering, HeaderManagement,
    RemoveQuaternionColumns, RemoveStaticSamples, StaticFlightDetection, TrimStaticStart,
    METRIC_ALTITUDE_CHANGE, METRIC_AVERAGE_SPEED, METRIC_TOTAL_DISTANCE,
};
pub use report::{Action, CleanedStats, CleaningReport, Operation, OperationEntry, OriginalStats};
use report::{Anomaly, OperationDetails};

/// What one operation decided.
struct Outcome {
    action: Action,
    /// Replacement table; `None` leaves the current one in place.
    table: Option<Table>,
    reason: Option<String>,
    details: Option<OperationDetails>,
}

impl Outcome {
    fn new(action: Action) -> Self {
        Outcome {
            action,
            table: None,
            reason: None,
            details: None,
        }
    }

    fn with_table(mut self, table: Table) -> Self {
        self.table = Some(table);
        self
    }

    fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    fn with_details(mut self, details: OperationDetails) -> Self {
        self.details = Some(details);
        self
    }
}

fn operation_error(operation: Operation, err: impl std::fmt::Display) -> TrajectoryError {
    TrajectoryError::CleaningOperation {
        operation: operation.name().to_string(),
        message: err.to_string(),
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn metrics_or_reason(
    stats: &TrajectoryStatsResult,
) -> std::result::Result<&TrajectoryMetrics, String> {
    stats
        .metrics()
        .ok_or_else(|| "Trajectory metrics are not available for this file".to_string())
}

fn resolve_for(operation: Operation, table: &Table) -> Result<ColumnRoleMapping> {
    resolve_columns(table).map_err(|e| operation_error(operation, e))
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

fn file_size_filtering(stats: &TrajectoryStatsResult, cfg: &FileSizeFiltering) -> Outcome {
    if stats.file_size_mb < cfg.min_size_mb {
        Outcome::new(Action::Skipped).because(format!(
            "File size {:.2} MB is below threshold {} MB",
            stats.file_size_mb, cfg.min_size_mb
        ))
    } else {
        Outcome::new(Action::Kept)
    }
}

fn header_management(table: &Table, cfg: &HeaderManagement) -> Result<Outcome> {
    let headers_before = table.column_names();
    let renamed: BTreeMap<String, String> = headers_before
        .iter()
        .zip(&cfg.standard_headers)
        .filter(|(current, standard)| current != standard)
        .map(|(current, standard)| (current.clone(), standard.clone()))
        .collect();

    let mut out = table.with_renamed(&renamed);
    let present = out.column_names();
    let missing: Vec<String> = cfg
        .standard_headers
        .iter()
        .filter(|h| !present.contains(h))
        .cloned()
        .collect();
    if renamed.is_empty() && missing.is_empty() {
        return Ok(Outcome::new(Action::NoChange));
    }
    for header in &missing {
        out = out
            .with_column(Column::missing(header.clone(), out.row_count()))
            .map_err(|e| operation_error(Operation::HeaderManagement, e))?;
    }

    let details = OperationDetails::Headers {
        headers_before,
        headers_after: out.column_names(),
        missing_headers_added: missing,
        renamed_headers: renamed,
    };
    Ok(Outcome::new(Action::Applied).with_table(out).with_details(details))
}

fn static_flight_detection(stats: &TrajectoryStatsResult, cfg: &StaticFlightDetection) -> Outcome {
    let metrics = match metrics_or_reason(stats) {
        Ok(m) => m,
        Err(reason) => return Outcome::new(Action::Skipped).because(reason),
    };
    let details = OperationDetails::Distance {
        total_distance: metrics.total_distance,
        distance_threshold: cfg.distance_threshold,
    };
    if metrics.total_distance < cfg.distance_threshold {
        Outcome::new(Action::Removed)
            .with_table(Table::empty())
            .because(format!(
                "Total distance {:.2}m is below threshold {}m",
                metrics.total_distance, cfg.distance_threshold
            ))
            .with_details(details)
    } else {
        Outcome::new(Action::Kept).with_details(details)
    }
}

/// 3D length of the per-axis value ranges over `window`; missing rows ignored.
fn window_spread(window: &[Option<[f64; 3]>]) -> f64 {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for p in window.iter().flatten() {
        for axis in 0..3 {
            lo[axis] = lo[axis].min(p[axis]);
            hi[axis] = hi[axis].max(p[axis]);
        }
    }
    if lo[0] > hi[0] {
        return 0.0;
    }
    distance(&lo, &hi)
}

/// First window start whose spread exceeds `threshold`.
///
/// Above `stride_threshold` rows only every half-window start is checked, then
/// the gap before the first hit is scanned row by row.
fn first_moving_window(
    positions: &[Option<[f64; 3]>],
    window: usize,
    threshold: f64,
    stride_threshold: usize,
) -> Option<usize> {
    let starts = positions.len().checked_sub(window)?;
    let moving = |start: usize| window_spread(&positions[start..start + window]) > threshold;

    if positions.len() <= stride_threshold {
        return (0..starts).find(|&i| moving(i));
    }
    let step = (window / 2).max(1);
    let hit = (0..starts).step_by(step).find(|&i| moving(i))?;
    let from = hit.saturating_sub(step - 1);
    (from..=hit).find(|&i| moving(i))
}

fn trim_static_start(
    table: &Table,
    cfg: &TrimStaticStart,
    opts: &ProcessingOptions,
) -> Result<Outcome> {
    let mapping = resolve_for(Operation::TrimStaticStart, table)?;
    let positions = position_cells(table, mapping.positions());
    let window = cfg.window_size.max(1);

    let start = first_moving_window(
        &positions,
        window,
        cfg.position_threshold,
        opts.distance_stride_threshold_rows,
    );
    match start {
        Some(start) if start > 0 => {
            let trimmed = table.skip_rows(start);
            let details = OperationDetails::Trim {
                rows_removed: start,
                percentage_removed: percentage(start, table.row_count()),
                start_index: start,
            };
            Ok(Outcome::new(Action::Applied).with_table(trimmed).with_details(details))
        }
        _ => Ok(Outcome::new(Action::NoChange)),
    }
}

/// Row indices to keep when no velocity column exists: each row must have
/// moved more than `threshold` from the last kept row. The first row is always
/// kept.
fn moving_rows(positions: &[Option<[f64; 3]>], threshold: f64) -> Vec<usize> {
    let mut keep = Vec::with_capacity(positions.len());
    let mut reference: Option<[f64; 3]> = None;
    for (row, p) in positions.iter().enumerate() {
        let moved = match (reference, p) {
            _ if row == 0 => true,
            (Some(r), Some(p)) => distance(&r, p) > threshold,
            (None, Some(_)) => true,
            (_, None) => false,
        };
        if moved {
            keep.push(row);
            if p.is_some() {
                reference = *p;
            }
        }
    }
    keep
}

fn remove_static_samples(table: &Table, cfg: &RemoveStaticSamples) -> Result<Outcome> {
    let threshold = cfg.speed_threshold;
    let velocity = table
        .columns()
        .iter()
        .find(|c| c.name.trim().eq_ignore_ascii_case("velocity"));

    let (keep, source) = match velocity {
        Some(col) => (
            filtered_indices(table, &col.name, |v| v.is_some_and(|v| v > threshold)),
            "column",
        ),
        None => {
            let mapping = resolve_for(Operation::RemoveStaticSamples, table)?;
            let positions = position_cells(table, mapping.positions());
            (moving_rows(&positions, threshold), "position_delta")
        }
    };

    let rows_removed = table.row_count() - keep.len();
    let details = OperationDetails::StaticSamples {
        rows_removed,
        percentage_removed: percentage(rows_removed, table.row_count()),
        threshold,
        velocity_source: source.to_string(),
    };
    if rows_removed == 0 {
        return Ok(Outcome::new(Action::NoChange).with_details(details));
    }
    Ok(Outcome::new(Action::Applied)
        .with_table(table.select_rows(&keep))
        .with_details(details))
}

fn remove_named_columns(table: &Table, cfg: &RemoveQuaternionColumns) -> Outcome {
    let present: Vec<String> = cfg.columns.iter().filter(|c| table.contains(c)).cloned().collect();
    if present.is_empty() {
        return Outcome::new(Action::NoChange);
    }
    let out = table.without_columns(&present);
    let details = OperationDetails::Columns {
        count: present.len(),
        columns_removed: present,
    };
    Outcome::new(Action::Applied).with_table(out).with_details(details)
}

fn anomaly_detection(stats: &TrajectoryStatsResult, cfg: &AnomalyDetection) -> Outcome {
    let metrics = match metrics_or_reason(stats) {
        Ok(m) => m,
        Err(reason) => return Outcome::new(Action::Skipped).because(reason),
    };

    let mut anomalies = Vec::new();
    for name in &cfg.metrics {
        let (value, threshold, reason) = match name.as_str() {
            METRIC_AVERAGE_SPEED => (
                metrics.avg_speed,
                cfg.max_average_speed,
                "Average speed is unusually high",
            ),
            METRIC_ALTITUDE_CHANGE => (
                metrics.altitude_change,
                cfg.max_altitude_change,
                "Altitude change is unusually large",
            ),
            METRIC_TOTAL_DISTANCE => match cfg.max_total_distance {
                Some(limit) => (metrics.total_distance, limit, "Total distance is unusually long"),
                None => continue,
            },
            other => {
                warn!("Ignoring unknown anomaly metric '{other}'");
                continue;
            }
        };
        if value > threshold {
            anomalies.push(Anomaly {
                metric: name.clone(),
                value,
                threshold,
                reason: reason.to_string(),
            });
        }
    }

    if anomalies.is_empty() {
        return Outcome::new(Action::NoChange);
    }
    let details = OperationDetails::Anomalies { anomalies };
    if cfg.flag_only {
        Outcome::new(Action::Flagged).with_details(details)
    } else {
        Outcome::new(Action::Removed)
            .with_table(Table::empty())
            .with_details(details)
    }
}

fn file_resequencing(stats: &TrajectoryStatsResult, cfg: &FileResequencing) -> Outcome {
    Outcome::new(Action::Applied).with_details(OperationDetails::Resequencing {
        original_filename: stats.filename.clone(),
        base_filename: cfg.base_filename.clone(),
        note: "Filename would be updated in batch process".to_string(),
    })
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

struct Cleaner {
    table: Table,
    entries: Vec<OperationEntry>,
}

impl Cleaner {
    /// Record `outcome` (or the error) for `operation` and advance the table.
    fn record(&mut self, operation: Operation, outcome: Result<Outcome>) {
        let (rows_before, columns_before) = (self.table.row_count(), self.table.column_count());
        let outcome = outcome.unwrap_or_else(|e| {
            warn!("{e}");
            Outcome::new(Action::Error).because(e.to_string())
        });
        if let Some(table) = outcome.table {
            self.table = table;
        }
        info!(
            "{}: {:?} ({} -> {} rows)",
            operation.name(),
            outcome.action,
            rows_before,
            self.table.row_count()
        );
        self.entries.push(OperationEntry {
            operation,
            action: outcome.action,
            rows_before,
            rows_after: self.table.row_count(),
            columns_before,
            columns_after: self.table.column_count(),
            reason: outcome.reason,
            details: outcome.details,
        });
    }

    /// Like `record`, but operations that need rows are skipped on an empty table.
    fn record_on_rows(
        &mut self,
        operation: Operation,
        run: impl FnOnce(&Table) -> Result<Outcome>,
    ) {
        let outcome = if self.table.is_empty() {
            Ok(Outcome::new(Action::Skipped).because("Table is empty"))
        } else {
            run(&self.table)
        };
        self.record(operation, outcome);
    }

    fn finish(
        self,
        stats: &TrajectoryStatsResult,
        opts: &ProcessingOptions,
    ) -> (Table, CleaningReport) {
        let original = OriginalStats {
            row_count: stats.row_count,
            file_size_bytes: stats.file_size_bytes,
            file_size_mb: stats.file_size_mb,
        };
        let (cleaned_stats, cleaned_content) = if self.table.is_empty() {
            (CleanedStats::emptied(&original), None)
        } else {
            match write_csv(&self.table) {
                Ok(csv) => {
                    let stats = CleanedStats::measure(&original, self.table.row_count(), csv.len());
                    (stats, Some(csv))
                }
                Err(e) => {
                    warn!("Could not serialize cleaned table: {e}");
                    let mut stats = CleanedStats::measure(&original, self.table.row_count(), 0);
                    stats.note = Some(format!("Could not serialize cleaned table: {e}"));
                    (stats, None)
                }
            }
        };

        let report = CleaningReport {
            filename: stats.filename.clone(),
            original_stats: original,
            operations_applied: self
                .entries
                .iter()
                .filter(|e| e.action.is_effective())
                .map(|e| e.operation)
                .collect(),
            cleaned_preview: self.table.preview(opts.preview_rows),
            entries: self.entries,
            cleaned_stats,
            cleaned_content,
        };
        (self.table, report)
    }
}

/// Apply every enabled operation of `config` to `table`.
///
/// `stats` is the analysis of the uncleaned input; it supplies the file size,
/// the original row count and the trajectory metrics that whole-file decisions
/// are based on.
pub fn clean(
    table: &Table,
    stats: &TrajectoryStatsResult,
    config: &CleaningConfig,
    opts: &ProcessingOptions,
) -> (Table, CleaningReport) {
    let mut cleaner = Cleaner {
        table: table.clone(),
        entries: Vec::new(),
    };

    if config.file_size_filtering.enabled {
        let outcome = file_size_filtering(stats, &config.file_size_filtering);
        let short_circuit = outcome.action == Action::Skipped;
        cleaner.record(Operation::FileSizeFiltering, Ok(outcome));
        if short_circuit {
            return cleaner.finish(stats, opts);
        }
    }
    if config.header_management.enabled {
        let outcome = header_management(&cleaner.table, &config.header_management);
        cleaner.record(Operation::HeaderManagement, outcome);
    }
    if config.static_flight_detection.enabled {
        let outcome = static_flight_detection(stats, &config.static_flight_detection);
        cleaner.record(Operation::StaticFlightDetection, Ok(outcome));
    }
    if config.trim_static_start.enabled {
        cleaner.record_on_rows(Operation::TrimStaticStart, |t| {
            trim_static_start(t, &config.trim_static_start, opts)
        });
    }
    if config.remove_static_samples.enabled {
        cleaner.record_on_rows(Operation::RemoveStaticSamples, |t| {
            remove_static_samples(t, &config.remove_static_samples)
        });
    }
    if config.remove_quaternion_columns.enabled {
        cleaner.record_on_rows(Operation::RemoveQuaternionColumns, |t| {
            Ok(remove_named_columns(t, &config.remove_quaternion_columns))
        });
    }
    if config.anomaly_detection.enabled {
        cleaner.record_on_rows(Operation::AnomalyDetection, |_| {
            Ok(anomaly_detection(stats, &config.anomaly_detection))
        });
    }
    if config.file_resequencing.enabled {
        let outcome = file_resequencing(stats, &config.file_resequencing);
        cleaner.record(Operation::FileResequencing, Ok(outcome));
    }

    cleaner.finish(stats, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::trajectory::{analyze, SourceInfo};
    use crate::data::loader::parse_from_text;

    fn prepare(text: &str) -> (Table, TrajectoryStatsResult) {
        let table = parse_from_text(text).unwrap();
        let mapping = resolve_columns(&table).ok();
        let stats = analyze(
            &table,
            mapping.as_ref(),
            false,
            &SourceInfo::new("flight.csv", text.len() as u64),
            &ProcessingOptions::default(),
        );
        (table, stats)
    }

    fn line_track(rows: usize, static_prefix: usize) -> String {
        let mut text = String::from("position_n,position_e,position_d\n");
        for i in 0..rows {
            let n = i.saturating_sub(static_prefix) as f64;
            text.push_str(&format!("{n},0,-5\n"));
        }
        text
    }

    fn run(text: &str, config: &CleaningConfig) -> (Table, CleaningReport) {
        let (table, stats) = prepare(text);
        clean(&table, &stats, config, &ProcessingOptions::default())
    }

    #[test]
    fn disabled_config_changes_nothing() {
        let text = line_track(20, 0);
        let (out, report) = run(&text, &CleaningConfig::default());
        assert_eq!(out.row_count(), 20);
        assert!(report.entries.is_empty());
        assert!(report.cleaned_content.is_some());
        assert_eq!(report.cleaned_stats.row_reduction, 0);
    }

    #[test]
    fn small_files_short_circuit() {
        let mut config = CleaningConfig::all_enabled();
        config.file_size_filtering.min_size_mb = 1.0;
        let (out, report) = run(&line_track(20, 5), &config);
        assert_eq!(out.row_count(), 20);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].action, Action::Skipped);
        assert!(report.entries[0].reason.as_deref().unwrap().contains("below threshold"));
    }

    #[test]
    fn header_management_renames_by_position_and_adds_missing() {
        let mut config = CleaningConfig::default();
        config.header_management.enabled = true;
        config.header_management.standard_headers =
            vec!["position_n".into(), "position_e".into(), "position_d".into(), "sec".into()];
        let (out, report) = run("a,b,c\n1,2,3\n", &config);
        assert_eq!(out.column_names(), vec!["position_n", "position_e", "position_d", "sec"]);
        assert_eq!(out.cell(0, "sec"), Some(""));
        let entry = report.entry(Operation::HeaderManagement).unwrap();
        assert_eq!(entry.action, Action::Applied);
        assert_eq!(entry.columns_after, 4);
    }

    #[test]
    fn short_flights_are_removed() {
        let mut config = CleaningConfig::default();
        config.static_flight_detection.enabled = true;
        config.remove_quaternion_columns.enabled = true;
        let (out, report) = run("north,east,down\n0,0,0\n3,4,0\n3,4,0\n", &config);
        assert!(out.is_empty());
        let entry = report.entry(Operation::StaticFlightDetection).unwrap();
        assert_eq!(entry.action, Action::Removed);
        assert_eq!(
            report.entry(Operation::RemoveQuaternionColumns).unwrap().action,
            Action::Skipped
        );
        assert_eq!(report.cleaned_stats.row_reduction_percentage, 100.0);
        assert!(report.cleaned_stats.note.is_some());
        assert!(report.cleaned_content.is_none());
    }

    #[test]
    fn long_flights_are_kept() {
        let mut config = CleaningConfig::default();
        config.static_flight_detection.enabled = true;
        let (out, report) = run(&line_track(30, 0), &config);
        assert_eq!(out.row_count(), 30);
        assert_eq!(report.entries[0].action, Action::Kept);
    }

    #[test]
    fn static_start_is_trimmed() {
        let mut config = CleaningConfig::default();
        config.trim_static_start.enabled = true;
        config.trim_static_start.window_size = 5;
        // rows 0..=10 sit still, row 11 onwards moves one unit per row
        let (out, report) = run(&line_track(40, 10), &config);
        let entry = report.entry(Operation::TrimStaticStart).unwrap();
        assert_eq!(entry.action, Action::Applied);
        // the first window reaching row 11 starts at row 7
        assert_eq!(out.row_count(), 33);
        assert_eq!(out.cell(0, "position_n"), Some("0"));
    }

    #[test]
    fn strided_scan_finds_the_same_start() {
        let positions: Vec<Option<[f64; 3]>> = (0..400)
            .map(|i: usize| Some([i.saturating_sub(122) as f64, 0.0, 0.0]))
            .collect();
        let exact = first_moving_window(&positions, 10, 0.5, usize::MAX);
        let strided = first_moving_window(&positions, 10, 0.5, 0);
        assert_eq!(exact, Some(114));
        assert_eq!(strided, exact);
    }

    #[test]
    fn trim_without_positions_is_an_error_entry() {
        let mut config = CleaningConfig::default();
        config.trim_static_start.enabled = true;
        let (out, report) = run("label\na\nb\n", &config);
        assert_eq!(out.row_count(), 2);
        let entry = report.entry(Operation::TrimStaticStart).unwrap();
        assert_eq!(entry.action, Action::Error);
        assert!(entry.reason.as_deref().unwrap().contains("trim_static_start"));
    }

    #[test]
    fn static_samples_use_the_velocity_column() {
        let mut config = CleaningConfig::default();
        config.remove_static_samples.enabled = true;
        let (out, _) = run("n,e,d,velocity\n0,0,0,0\n1,0,0,2\n2,0,0,NA\n3,0,0,1\n", &config);
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.cell(0, "n"), Some("1"));
    }

    #[test]
    fn static_samples_from_position_deltas() {
        let mut config = CleaningConfig::default();
        config.remove_static_samples.enabled = true;
        let (out, report) = run("north,east,down\n0,0,0\n3,4,0\n3,4,0\n6,8,0\n", &config);
        assert_eq!(out.row_count(), 3);
        assert!(!out.column_names().contains(&"calculated_velocity".to_string()));
        match &report.entries[0].details {
            Some(OperationDetails::StaticSamples { rows_removed, velocity_source, .. }) => {
                assert_eq!(*rows_removed, 1);
                assert_eq!(velocity_source, "position_delta");
            }
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn named_columns_are_dropped_when_present() {
        let mut config = CleaningConfig::default();
        config.remove_quaternion_columns.enabled = true;
        let (out, report) = run("n,e,d,Quat_1,quat_valid\n0,0,0,1,1\n1,1,1,1,1\n", &config);
        assert_eq!(out.column_names(), vec!["n", "e", "d"]);
        assert_eq!(report.operations_applied, vec![Operation::RemoveQuaternionColumns]);
    }

    #[test]
    fn anomalies_are_flagged_or_removed() {
        let text = "n,e,d\n0,0,0\n0,0,-6000\n";
        let mut config = CleaningConfig::default();
        config.anomaly_detection.enabled = true;
        let (out, report) = run(text, &config);
        assert_eq!(out.row_count(), 2);
        let entry = report.entry(Operation::AnomalyDetection).unwrap();
        assert_eq!(entry.action, Action::Flagged);
        match &entry.details {
            Some(OperationDetails::Anomalies { anomalies }) => {
                let metrics: Vec<&str> = anomalies.iter().map(|a| a.metric.as_str()).collect();
                assert_eq!(metrics, vec!["average_speed", "altitude_change"]);
            }
            other => panic!("unexpected details {other:?}"),
        }

        config.anomaly_detection.flag_only = false;
        let (out, report) = run(text, &config);
        assert!(out.is_empty());
        assert_eq!(report.entry(Operation::AnomalyDetection).unwrap().action, Action::Removed);
    }

    #[test]
    fn resequencing_only_records_intent() {
        let mut config = CleaningConfig::default();
        config.file_resequencing.enabled = true;
        let (out, report) = run(&line_track(5, 0), &config);
        assert_eq!(out.row_count(), 5);
        match &report.entries[0].details {
            Some(OperationDetails::Resequencing { original_filename, .. }) => {
                assert_eq!(original_filename, "flight.csv")
            }
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn entries_follow_the_fixed_order() {
        let mut config = CleaningConfig::all_enabled();
        config.file_size_filtering.min_size_mb = 0.0;
        let (_, report) = run(&line_track(80, 20), &config);
        let order: Vec<Operation> = report.entries.iter().map(|e| e.operation).collect();
        assert_eq!(
            order,
            vec![
                Operation::FileSizeFiltering,
                Operation::HeaderManagement,
                Operation::StaticFlightDetection,
                Operation::TrimStaticStart,
                Operation::RemoveStaticSamples,
                Operation::RemoveQuaternionColumns,
                Operation::AnomalyDetection,
                Operation::FileResequencing,
            ]
        );
    }
}
