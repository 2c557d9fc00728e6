use trajview::analysis::trajectory::SourceInfo;
use trajview::cleaning::{Action, Operation};
use trajview::{
    analyze, clean, parse_from_text, resolve_columns, CleaningConfig, ProcessingOptions, Table,
    TrajectoryStatsResult,
};

fn stats_for(table: &Table, size: u64) -> TrajectoryStatsResult {
    let mapping = resolve_columns(table).ok();
    analyze(
        table,
        mapping.as_ref(),
        false,
        &SourceInfo::new("flight 7.csv", size),
        &ProcessingOptions::default(),
    )
}

/// 30 still rows, then a walk north where every position is logged twice.
fn hovering_then_walking() -> String {
    let mut text = String::from("n,e,d,Quat_1\n");
    for i in 0..200usize {
        let n = i.saturating_sub(30) / 2;
        text.push_str(&format!("{n},0,-5,0.5\n"));
    }
    text
}

fn converging_config() -> CleaningConfig {
    let mut config = CleaningConfig::all_enabled();
    config.file_size_filtering.enabled = false;
    config.header_management.standard_headers =
        vec!["position_n".into(), "position_e".into(), "position_d".into()];
    config.trim_static_start.window_size = 5;
    config
}

#[test]
fn short_track_is_dropped_by_static_flight_detection() {
    let text = "north,east,down\n0,0,0\n3,4,0\n3,4,0\n";
    let table = parse_from_text(text).unwrap();
    let stats = stats_for(&table, text.len() as u64);

    let mut config = CleaningConfig::default();
    config.static_flight_detection.enabled = true;
    config.static_flight_detection.distance_threshold = 10.0;
    let (out, report) = clean(&table, &stats, &config, &ProcessingOptions::default());

    assert!(out.is_empty());
    let entry = report.entry(Operation::StaticFlightDetection).unwrap();
    assert_eq!(entry.action, Action::Removed);
    assert_eq!(entry.rows_before, 3);
    assert_eq!(report.cleaned_stats.row_reduction_percentage, 100.0);
}

#[test]
fn full_pass_trims_dedupes_and_drops_columns() {
    let text = hovering_then_walking();
    let table = parse_from_text(&text).unwrap();
    let stats = stats_for(&table, text.len() as u64);
    let (out, report) = clean(&table, &stats, &converging_config(), &ProcessingOptions::default());

    assert_eq!(out.column_names(), vec!["position_n", "position_e", "position_d"]);
    // trimmed to start at row 28, then one row per distinct position 0..=84
    assert_eq!(out.row_count(), 85);
    assert_eq!(out.cell(0, "position_n"), Some("0"));
    assert_eq!(out.cell(84, "position_n"), Some("84"));
    assert_eq!(
        report.operations_applied,
        vec![
            Operation::HeaderManagement,
            Operation::TrimStaticStart,
            Operation::RemoveStaticSamples,
            Operation::RemoveQuaternionColumns,
            Operation::FileResequencing,
        ]
    );
    assert_eq!(report.entry(Operation::StaticFlightDetection).unwrap().action, Action::Kept);
    let csv = report.cleaned_content.as_deref().unwrap();
    assert!(csv.starts_with("position_n,position_e,position_d\n"));
    assert_eq!(report.cleaned_stats.row_count, 85);
    assert_eq!(report.cleaned_stats.row_reduction, 115);
}

#[test]
fn cleaning_is_idempotent() {
    let text = hovering_then_walking();
    let table = parse_from_text(&text).unwrap();
    let config = converging_config();
    let opts = ProcessingOptions::default();

    let (once, _) = clean(&table, &stats_for(&table, text.len() as u64), &config, &opts);
    let (twice, report) = clean(&once, &stats_for(&once, text.len() as u64), &config, &opts);

    assert_eq!(once, twice);
    for entry in &report.entries {
        assert_eq!(entry.rows_before, entry.rows_after, "{:?}", entry.operation);
        assert_eq!(entry.columns_before, entry.columns_after, "{:?}", entry.operation);
    }
}

#[test]
fn report_serializes_with_operation_names() {
    let text = hovering_then_walking();
    let table = parse_from_text(&text).unwrap();
    let stats = stats_for(&table, text.len() as u64);
    let (_, report) = clean(&table, &stats, &converging_config(), &ProcessingOptions::default());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["filename"], "flight 7.csv");
    assert_eq!(json["entries"][0]["operation"], "header_management");
    assert_eq!(json["entries"][0]["action"], "applied");
    assert_eq!(json["entries"][0]["details"]["renamed_headers"]["n"], "position_n");
    assert_eq!(json["operations_applied"][1], "trim_static_start");
}
