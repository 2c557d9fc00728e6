//! Bounded-size point series for 3D display.
//!
//! Rows are sampled with a fixed stride (`sampling_factor`), so the output
//! stays near `max_points` whatever the input size. Positions are reported in
//! the native NED frame. [`ProjectionMetadata::altitude_scale`] carries the
//! display exaggeration, and [`VisualizationPoint::to_scene`] applies it to
//! give the right-handed display frame.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use serde::Serialize;

use crate::analysis::columns::{ColumnRoleMapping, Role};
use crate::analysis::stats::normalize_zero;
use crate::analysis::trajectory::{time_values, TimeSource};
use crate::config::ProcessingOptions;
use crate::data::filter::{distance, position_cells};
use crate::data::model::{is_missing, parse_number, Column, Table};
use crate::error::Result;

pub const ORIENTATION_FIELDS: [&str; 8] =
    ["phi", "theta", "psi", "chi", "alpha", "beta", "chi_deg", "psi_deg"];
pub const VELOCITY_FIELDS: [&str; 10] = ["u", "v", "w", "va", "vg", "wn", "we", "p", "q", "r"];
const DELTA_FIELDS: [&str; 3] = ["delta_position_n", "delta_position_e", "delta_position_d"];
const RESERVED_KEYS: [&str; 4] = ["position_n", "position_e", "position_d", "time"];

/// An extra per-point value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizationPoint {
    pub position_n: f64,
    pub position_e: f64,
    pub position_d: f64,
    /// Seconds since the first timed row. Rows without a time of their own
    /// repeat the last known one.
    pub time: f64,
    /// Orientation, velocity, attack annotations and numeric passthrough
    /// columns, keyed by name.
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl VisualizationPoint {
    /// Display frame: `x = north`, `y = east`, `z = -down * scale`.
    pub fn to_scene(&self, altitude_scale: f64) -> [f64; 3] {
        [self.position_n, self.position_e, normalize_zero(-self.position_d * altitude_scale)]
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionMetadata {
    pub points_count: usize,
    pub original_count: usize,
    pub altitude_range: [f64; 2],
    /// Unscaled distance along the emitted points.
    pub distance: f64,
    pub duration: f64,
    pub sampling_factor: usize,
    /// Display exaggeration of altitude; divide it back out of scene `z`
    /// before measuring anything.
    pub altitude_scale: f64,
    pub time_source: TimeSource,
    /// Sampled rows dropped for non-numeric position cells.
    pub skipped_rows: usize,
}

/// Stride between emitted rows: an explicit rate wins, otherwise enough to
/// keep the output around `max_points`.
pub fn sampling_factor(row_count: usize, rate: Option<usize>, max_points: usize) -> usize {
    match rate {
        Some(rate) if rate > 0 => rate,
        _ => (row_count / max_points.max(1)).max(1),
    }
}

// ---------------------------------------------------------------------------
// Field extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldKind {
    Number,
    /// `true`/`false` text becomes a boolean, anything else a number or text.
    Flag,
    Label,
}

struct FieldSource<'t> {
    key: String,
    column: &'t Column,
    kind: FieldKind,
}

impl FieldSource<'_> {
    fn value(&self, row: usize) -> Option<FieldValue> {
        let raw = self.column.values.get(row)?.trim();
        match self.kind {
            FieldKind::Number => parse_number(raw).map(FieldValue::Number),
            FieldKind::Flag => match raw.to_ascii_lowercase().as_str() {
                "true" => Some(FieldValue::Flag(true)),
                "false" => Some(FieldValue::Flag(false)),
                _ if is_missing(raw) => None,
                _ => Some(
                    parse_number(raw)
                        .map_or_else(|| FieldValue::Text(raw.to_string()), FieldValue::Number),
                ),
            },
            FieldKind::Label => (!is_missing(raw)).then(|| FieldValue::Text(raw.to_string())),
        }
    }
}

fn is_time_column(name: &str) -> bool {
    matches!(name.trim().to_lowercase().as_str(), "time" | "timestamp" | "t")
}

/// Which columns feed which point fields, in priority order.
fn field_sources<'t>(table: &'t Table, mapping: &ColumnRoleMapping) -> Vec<FieldSource<'t>> {
    let mut consumed: BTreeSet<String> =
        mapping.positions().iter().map(|c| c.to_string()).collect();
    consumed.extend(
        [Role::Sec, Role::Nanosec]
            .into_iter()
            .filter_map(|r| mapping.get(r))
            .map(str::to_string),
    );
    consumed.extend(
        table
            .columns()
            .iter()
            .filter(|c| is_time_column(&c.name))
            .map(|c| c.name.clone()),
    );

    let mut keys: BTreeSet<String> = RESERVED_KEYS.iter().map(|k| k.to_string()).collect();
    let mut sources = Vec::new();
    let mut add = |key: &str, column: &'t Column, kind: FieldKind| {
        if consumed.contains(&column.name) || !keys.insert(key.to_string()) {
            return;
        }
        consumed.insert(column.name.clone());
        sources.push(FieldSource {
            key: key.to_string(),
            column,
            kind,
        });
    };

    for role in [Role::Phi, Role::Theta, Role::Psi, Role::U, Role::V, Role::W] {
        if let Some(column) = mapping.get(role).and_then(|c| table.column(c)) {
            add(role.name(), column, FieldKind::Number);
        }
    }
    for name in ORIENTATION_FIELDS.iter().chain(&VELOCITY_FIELDS).chain(&DELTA_FIELDS) {
        if let Some(column) = table.column(name) {
            add(*name, column, FieldKind::Number);
        }
    }
    if let Some(column) = table.column("is_attacked") {
        add("is_attacked", column, FieldKind::Flag);
    }
    if let Some(column) = table.column("attack_type") {
        add("attack_type", column, FieldKind::Label);
    }
    for column in table.columns() {
        add(column.name.as_str(), column, FieldKind::Number);
    }
    sources
}

// ---------------------------------------------------------------------------
// Projector
// ---------------------------------------------------------------------------

/// Incremental projector: feed it one table or a sequence of chunks sharing
/// the same columns, then call [`Projector::finish`].
#[derive(Debug)]
pub struct Projector {
    mapping: ColumnRoleMapping,
    sampling_factor: usize,
    assumed_rate_hz: f64,
    altitude_scale: f64,
    rows_seen: usize,
    time_source: Option<TimeSource>,
    first_time: Option<f64>,
    last_time: Option<f64>,
    time_span: Option<(f64, f64)>,
    down_span: Option<(f64, f64)>,
    previous: Option<[f64; 3]>,
    distance: f64,
    skipped_rows: usize,
    points: Vec<VisualizationPoint>,
}

fn widen(span: Option<(f64, f64)>, v: f64) -> Option<(f64, f64)> {
    Some(span.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
}

impl Projector {
    pub fn new(
        mapping: ColumnRoleMapping,
        sampling_factor: usize,
        opts: &ProcessingOptions,
    ) -> Self {
        Projector {
            mapping,
            sampling_factor: sampling_factor.max(1),
            assumed_rate_hz: opts.assumed_rate_hz,
            altitude_scale: opts.altitude_scale,
            rows_seen: 0,
            time_source: None,
            first_time: None,
            last_time: None,
            time_span: None,
            down_span: None,
            previous: None,
            distance: 0.0,
            skipped_rows: 0,
            points: Vec::new(),
        }
    }

    /// Cumulative distance of the points emitted so far.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Project the next block of rows.
    pub fn push_table(&mut self, table: &Table) -> Result<()> {
        self.mapping.check_against(table)?;
        let positions = position_cells(table, self.mapping.positions());
        let times = time_values(table, &self.mapping).map(|(source, values)| {
            self.time_source.get_or_insert(source);
            values
        });
        if self.rows_seen == 0 && times.is_none() {
            debug!("No time columns found, using row index at {} Hz", self.assumed_rate_hz);
            self.time_source = Some(TimeSource::RowIndex);
        }
        if let Some(values) = &times {
            for t in values.iter().flatten() {
                self.first_time.get_or_insert(*t);
                self.time_span = widen(self.time_span, *t);
            }
        }
        let sources = field_sources(table, &self.mapping);

        for (i, ned) in positions.iter().enumerate() {
            let row = self.rows_seen + i;
            if let Some(p) = ned {
                self.down_span = widen(self.down_span, p[2]);
            }
            if let Some(t) = times.as_ref().and_then(|values| values[i]) {
                self.last_time = Some(t);
            }
            if row % self.sampling_factor != 0 {
                continue;
            }
            let Some(p) = ned else {
                self.skipped_rows += 1;
                continue;
            };

            let time = match (&times, self.last_time, self.first_time) {
                (None, _, _) => row as f64 / self.assumed_rate_hz,
                (Some(_), Some(t), Some(first)) => normalize_zero(t - first),
                // timed series, nothing timed yet: sits at the origin
                (Some(_), _, _) => 0.0,
            };
            if let Some(previous) = &self.previous {
                self.distance += distance(previous, p);
            }
            self.previous = Some(*p);

            self.points.push(VisualizationPoint {
                position_n: p[0],
                position_e: p[1],
                position_d: p[2],
                time,
                fields: sources
                    .iter()
                    .filter_map(|s| s.value(i).map(|v| (s.key.clone(), v)))
                    .collect(),
            });
        }
        self.rows_seen += table.row_count();
        Ok(())
    }

    pub fn finish(self) -> (Vec<VisualizationPoint>, ProjectionMetadata) {
        let altitude_range = self
            .down_span
            .map_or([0.0, 0.0], |(lo, hi)| [normalize_zero(-hi), normalize_zero(-lo)]);
        let duration = self.time_span.map_or(0.0, |(lo, hi)| hi - lo);
        info!(
            "Projected {} of {} rows (sampling factor {}, {} skipped)",
            self.points.len(),
            self.rows_seen,
            self.sampling_factor,
            self.skipped_rows
        );
        let metadata = ProjectionMetadata {
            points_count: self.points.len(),
            original_count: self.rows_seen,
            altitude_range,
            distance: self.distance,
            duration,
            sampling_factor: self.sampling_factor,
            altitude_scale: self.altitude_scale,
            time_source: self.time_source.unwrap_or(TimeSource::RowIndex),
            skipped_rows: self.skipped_rows,
        };
        (self.points, metadata)
    }
}

/// Project a whole in-memory table.
pub fn project_points(
    table: &Table,
    mapping: &ColumnRoleMapping,
    rate: Option<usize>,
    opts: &ProcessingOptions,
) -> Result<(Vec<VisualizationPoint>, ProjectionMetadata)> {
    let factor = sampling_factor(table.row_count(), rate, opts.max_points);
    let mut projector = Projector::new(mapping.clone(), factor, opts);
    projector.push_table(table)?;
    Ok(projector.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::columns::resolve_columns;
    use crate::data::loader::parse_from_text;

    fn project(text: &str, rate: Option<usize>) -> (Vec<VisualizationPoint>, ProjectionMetadata) {
        let table = parse_from_text(text).unwrap();
        let mapping = resolve_columns(&table).unwrap();
        project_points(&table, &mapping, rate, &ProcessingOptions::default()).unwrap()
    }

    #[test]
    fn sampling_factor_bounds_output() {
        assert_eq!(sampling_factor(10, None, 1000), 1);
        assert_eq!(sampling_factor(10_000, None, 1000), 10);
        assert_eq!(sampling_factor(10_000_000, None, 1000), 10_000);
        assert_eq!(sampling_factor(10_000, Some(3), 1000), 3);
        assert_eq!(sampling_factor(10_000, Some(0), 1000), 10);
    }

    #[test]
    fn ros_time_is_normalized() {
        let (points, meta) = project(
            "position_n,position_e,position_d,sec,nanosec\n0,0,-1,100,500000000\n3,4,-1,101,0\n",
            None,
        );
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].time, 0.0);
        assert!((points[1].time - 0.5).abs() < 1e-9);
        assert_eq!(meta.time_source, TimeSource::SecNanosec);
        assert!((meta.duration - 0.5).abs() < 1e-9);
        assert!(points[0].field("sec").is_none());
    }

    #[test]
    fn index_time_assumes_ten_hertz() {
        let (points, meta) = project("n,e,d\n0,0,0\n1,0,0\n2,0,0\n", None);
        assert!((points[2].time - 0.2).abs() < 1e-12);
        assert_eq!(meta.time_source, TimeSource::RowIndex);
        assert_eq!(meta.duration, 0.0);
    }

    #[test]
    fn distance_is_unscaled() {
        let (points, meta) = project("n,e,d\n0,0,0\n0,0,-2\n", None);
        assert!((meta.distance - 2.0).abs() < 1e-12);
        assert_eq!(meta.altitude_range, [0.0, 2.0]);
        assert_eq!(meta.altitude_scale, 1.8);
        let scene = points[1].to_scene(meta.altitude_scale);
        assert!((scene[2] - 3.6).abs() < 1e-12);
    }

    #[test]
    fn configured_altitude_scale_is_reported() {
        let table = parse_from_text("n,e,d
0,0,-1
").unwrap();
        let mapping = resolve_columns(&table).unwrap();
        let opts = ProcessingOptions {
            altitude_scale: 1.0,
            ..ProcessingOptions::default()
        };
        let (points, meta) = project_points(&table, &mapping, None, &opts).unwrap();
        assert_eq!(meta.altitude_scale, 1.0);
        assert_eq!(points[0].to_scene(meta.altitude_scale), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn untimed_rows_repeat_the_last_time() {
        let (points, meta) = project(
            "n,e,d,sec,nanosec
0,0,0,NA,0
1,0,0,10,0
2,0,0,NA,0
3,0,0,12,0
",
            None,
        );
        let times: Vec<f64> = points.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![0.0, 0.0, 0.0, 2.0]);
        assert_eq!(meta.time_source, TimeSource::SecNanosec);
        assert_eq!(meta.duration, 2.0);
    }

    #[test]
    fn explicit_rate_takes_every_nth_row() {
        let mut text = String::from("n,e,d\n");
        for i in 0..10 {
            text.push_str(&format!("{i},0,0\n"));
        }
        let (points, meta) = project(&text, Some(4));
        let norths: Vec<f64> = points.iter().map(|p| p.position_n).collect();
        assert_eq!(norths, vec![0.0, 4.0, 8.0]);
        assert_eq!(meta.sampling_factor, 4);
        assert_eq!(meta.original_count, 10);
        assert!((meta.distance - 8.0).abs() < 1e-12);
    }

    #[test]
    fn extra_fields_are_dropped_per_field() {
        let (points, meta) = project(
            "n,e,d,phi,airspeed,is_attacked,attack_type,note\n\
             0,0,0,0.1,12.5,TRUE,spoof,x\n\
             1,1,1,bad,13,false,,y\n\
             2,2,x,0.3,14,false,,z\n",
            None,
        );
        assert_eq!(points.len(), 2);
        assert_eq!(meta.skipped_rows, 1);
        assert_eq!(points[0].field("phi"), Some(&FieldValue::Number(0.1)));
        assert_eq!(points[0].field("is_attacked"), Some(&FieldValue::Flag(true)));
        assert_eq!(points[0].field("attack_type"), Some(&FieldValue::Text("spoof".into())));
        assert!(points[0].field("note").is_none());
        assert!(points[1].field("phi").is_none());
        assert_eq!(points[1].field("airspeed").and_then(FieldValue::as_f64), Some(13.0));
    }

    #[test]
    fn chunks_continue_row_numbering() {
        let table = parse_from_text("n,e,d\n0,0,0\n1,0,0\n2,0,0\n3,0,0\n4,0,0\n").unwrap();
        let mapping = resolve_columns(&table).unwrap();
        let mut projector = Projector::new(mapping, 2, &ProcessingOptions::default());
        projector.push_table(&table.head(3)).unwrap();
        projector.push_table(&table.skip_rows(3)).unwrap();
        let (points, meta) = projector.finish();
        let norths: Vec<f64> = points.iter().map(|p| p.position_n).collect();
        assert_eq!(norths, vec![0.0, 2.0, 4.0]);
        assert_eq!(meta.original_count, 5);
        assert!((points[2].time - 0.4).abs() < 1e-12);
    }

    #[test]
    fn points_serialize_flat() {
        let (points, _) = project("n,e,d,va\n1,2,3,4\n", None);
        let json = serde_json::to_value(&points[0]).unwrap();
        assert_eq!(json["position_n"], 1.0);
        assert_eq!(json["va"], 4.0);
        assert_eq!(json["time"], 0.0);
    }
}
