use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::model::CellValue;

/// The cleaning operations, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    FileSizeFiltering,
    HeaderManagement,
    StaticFlightDetection,
    TrimStaticStart,
    RemoveStaticSamples,
    RemoveQuaternionColumns,
    AnomalyDetection,
    FileResequencing,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::FileSizeFiltering => "file_size_filtering",
            Operation::HeaderManagement => "header_management",
            Operation::StaticFlightDetection => "static_flight_detection",
            Operation::TrimStaticStart => "trim_static_start",
            Operation::RemoveStaticSamples => "remove_static_samples",
            Operation::RemoveQuaternionColumns => "remove_quaternion_columns",
            Operation::AnomalyDetection => "anomaly_detection",
            Operation::FileResequencing => "file_resequencing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// The table (or the caller's batch plan) was changed.
    Applied,
    /// The operation did not run, see `reason`.
    Skipped,
    Kept,
    Removed,
    Flagged,
    NoChange,
    /// The operation failed; the table passed through unmodified.
    Error,
}

impl Action {
    /// Whether the operation left a mark worth listing in `operations_applied`.
    pub fn is_effective(&self) -> bool {
        matches!(self, Action::Applied | Action::Removed | Action::Flagged)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub reason: String,
}

/// Operation-specific figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationDetails {
    Headers {
        headers_before: Vec<String>,
        headers_after: Vec<String>,
        missing_headers_added: Vec<String>,
        renamed_headers: BTreeMap<String, String>,
    },
    Distance {
        total_distance: f64,
        distance_threshold: f64,
    },
    Trim {
        rows_removed: usize,
        percentage_removed: f64,
        start_index: usize,
    },
    StaticSamples {
        rows_removed: usize,
        percentage_removed: f64,
        threshold: f64,
        velocity_source: String,
    },
    Columns {
        columns_removed: Vec<String>,
        count: usize,
    },
    Anomalies {
        anomalies: Vec<Anomaly>,
    },
    Resequencing {
        original_filename: String,
        base_filename: String,
        note: String,
    },
}

/// One report line per enabled operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationEntry {
    pub operation: Operation,
    pub action: Action,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<OperationDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginalStats {
    pub row_count: usize,
    pub file_size_bytes: u64,
    pub file_size_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedStats {
    pub row_count: usize,
    pub row_reduction: usize,
    pub row_reduction_percentage: f64,
    pub file_size_mb: f64,
    pub file_size_reduction_mb: f64,
    pub file_size_reduction_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

pub const EMPTY_RESULT_NOTE: &str = "File removed or empty after cleaning";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

impl CleanedStats {
    /// Reductions relative to `original`, given the cleaned CSV size.
    pub fn measure(original: &OriginalStats, rows_after: usize, cleaned_bytes: usize) -> Self {
        let row_reduction = original.row_count.saturating_sub(rows_after);
        let row_reduction_percentage = if original.row_count > 0 {
            row_reduction as f64 / original.row_count as f64 * 100.0
        } else {
            0.0
        };
        let file_size_mb = cleaned_bytes as f64 / BYTES_PER_MB;
        let file_size_reduction_percentage = if original.file_size_bytes > 0 {
            let before = original.file_size_bytes as f64;
            (before - cleaned_bytes as f64) / before * 100.0
        } else {
            0.0
        };
        CleanedStats {
            row_count: rows_after,
            row_reduction,
            row_reduction_percentage,
            file_size_mb,
            file_size_reduction_mb: original.file_size_mb - file_size_mb,
            file_size_reduction_percentage,
            note: None,
        }
    }

    /// Everything removed: reported as a full reduction.
    pub fn emptied(original: &OriginalStats) -> Self {
        CleanedStats {
            row_count: 0,
            row_reduction: original.row_count,
            row_reduction_percentage: 100.0,
            file_size_mb: 0.0,
            file_size_reduction_mb: original.file_size_mb,
            file_size_reduction_percentage: 100.0,
            note: Some(EMPTY_RESULT_NOTE.to_string()),
        }
    }
}

/// The structured outcome of one `clean` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningReport {
    pub filename: String,
    pub original_stats: OriginalStats,
    /// Names of operations that changed or flagged something, in run order.
    pub operations_applied: Vec<Operation>,
    pub entries: Vec<OperationEntry>,
    pub cleaned_stats: CleanedStats,
    pub cleaned_preview: Vec<BTreeMap<String, CellValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaned_content: Option<String>,
}

impl CleaningReport {
    pub fn entry(&self, operation: Operation) -> Option<&OperationEntry> {
        self.entries.iter().find(|e| e.operation == operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn original() -> OriginalStats {
        OriginalStats {
            row_count: 200,
            file_size_bytes: 2_000,
            file_size_mb: 2_000.0 / BYTES_PER_MB,
        }
    }

    #[test]
    fn reductions_are_relative_to_the_original() {
        let stats = CleanedStats::measure(&original(), 150, 1_500);
        assert_eq!(stats.row_reduction, 50);
        assert!((stats.row_reduction_percentage - 25.0).abs() < 1e-9);
        assert!((stats.file_size_reduction_percentage - 25.0).abs() < 1e-9);
        assert!(stats.note.is_none());
    }

    #[test]
    fn empty_result_is_a_full_reduction() {
        let stats = CleanedStats::emptied(&original());
        assert_eq!(stats.row_count, 0);
        assert_eq!(stats.row_reduction_percentage, 100.0);
        assert_eq!(stats.note.as_deref(), Some(EMPTY_RESULT_NOTE));
    }

    #[test]
    fn operation_names_match_config_keys() {
        let json = serde_json::to_string(&Operation::TrimStaticStart).unwrap();
        assert_eq!(json, format!("\"{}\"", Operation::TrimStaticStart.name()));
    }
}
