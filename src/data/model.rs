use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::error::{Result, TrajectoryError};

/// Tokens read as missing, mirroring the default NA set of common dataframe
/// readers.
const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-nan", "-NaN", "null", "NULL", "None", "#N/A",
];

pub fn is_missing(raw: &str) -> bool {
    MISSING_TOKENS.contains(&raw.trim())
}

/// Parse a cell as a finite number; missing or non-numeric cells give `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if is_missing(s) {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// CellValue – a single typed cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value, guessed from the raw text on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl CellValue {
    pub fn guess(raw: &str) -> CellValue {
        let s = raw.trim();
        if is_missing(s) {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Some(f) = parse_number(s) {
            return CellValue::Float(f);
        }
        match s.to_ascii_lowercase().as_str() {
            "true" => CellValue::Bool(true),
            "false" => CellValue::Bool(false),
            _ => CellValue::String(s.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Column – one named column of raw cells
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// Raw cell text; typing happens lazily.
    pub values: Vec<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Column {
            name: name.into(),
            values,
        }
    }

    /// A column of `len` missing cells.
    pub fn missing(name: impl Into<String>, len: usize) -> Self {
        Column::new(name, vec![String::new(); len])
    }

    pub fn numbers(&self) -> Vec<Option<f64>> {
        self.values.iter().map(|v| parse_number(v)).collect()
    }

    /// Non-missing numeric values in row order.
    pub fn present_numbers(&self) -> Vec<f64> {
        self.values.iter().filter_map(|v| parse_number(v)).collect()
    }

    /// At least one value, and every non-missing value is a number.
    pub fn is_numeric(&self) -> bool {
        let mut seen = false;
        for v in &self.values {
            if is_missing(v) {
                continue;
            }
            if parse_number(v).is_none() {
                return false;
            }
            seen = true;
        }
        seen
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| is_missing(v)).count()
    }
}

// ---------------------------------------------------------------------------
// Table – ordered, equally long columns
// ---------------------------------------------------------------------------

/// Column-oriented table. Column order is file order and names are unique.
///
/// Every transformation returns a new `Table`; the original is never touched,
/// which keeps before/after comparisons in cleaning reports unambiguous.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
    has_header: bool,
    /// True when this is the leading chunk of a larger source.
    truncated: bool,
}

impl Table {
    pub fn new(columns: Vec<Column>, has_header: bool) -> Result<Self> {
        let row_count = columns.first().map_or(0, |c| c.values.len());
        if let Some(bad) = columns.iter().find(|c| c.values.len() != row_count) {
            return Err(TrajectoryError::Parse(format!(
                "column '{}' has {} rows, expected {row_count}",
                bad.name,
                bad.values.len()
            )));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.name.as_str())) {
            return Err(TrajectoryError::Parse(format!("duplicate column name '{}'", dup.name)));
        }
        Ok(Table {
            columns,
            row_count,
            has_header,
            truncated: false,
        })
    }

    /// No columns, no rows.
    pub fn empty() -> Self {
        Table::default()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn has_header(&self) -> bool {
        self.has_header
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    /// Empty along either axis.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0 || self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&str> {
        self.column(name)
            .and_then(|c| c.values.get(row))
            .map(String::as_str)
    }

    pub fn missing_count(&self) -> usize {
        self.columns.iter().map(Column::missing_count).sum()
    }

    /// Rows at `indices`, in the order given.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                Column::new(
                    c.name.clone(),
                    indices.iter().filter_map(|&i| c.values.get(i).cloned()).collect(),
                )
            })
            .collect();
        self.rebuilt(columns)
    }

    /// Rows `start..` (clamped).
    pub fn skip_rows(&self, start: usize) -> Table {
        let start = start.min(self.row_count);
        let indices: Vec<usize> = (start..self.row_count).collect();
        self.select_rows(&indices)
    }

    pub fn head(&self, n: usize) -> Table {
        let indices: Vec<usize> = (0..n.min(self.row_count)).collect();
        self.select_rows(&indices)
    }

    /// Drop the named columns; absent names are ignored.
    pub fn without_columns(&self, names: &[String]) -> Table {
        let columns = self
            .columns
            .iter()
            .filter(|c| !names.contains(&c.name))
            .cloned()
            .collect();
        self.rebuilt(columns)
    }

    /// Append a column; fails on a length mismatch or a name clash.
    pub fn with_column(&self, column: Column) -> Result<Table> {
        let mut columns = self.columns.clone();
        columns.push(column);
        let rebuilt = Table::new(columns, self.has_header)?;
        Ok(rebuilt.with_truncated(self.truncated))
    }

    /// Rename columns per `mapping` (old → new). Clashing results are made
    /// unique with `.1`, `.2` suffixes.
    pub fn with_renamed(&self, mapping: &BTreeMap<String, String>) -> Table {
        let names = dedupe_names(
            self.columns
                .iter()
                .map(|c| mapping.get(&c.name).cloned().unwrap_or_else(|| c.name.clone()))
                .collect(),
        );
        let columns = self
            .columns
            .iter()
            .zip(names)
            .map(|(c, name)| Column::new(name, c.values.clone()))
            .collect();
        self.rebuilt(columns)
    }

    /// First `n` rows as name → typed value records.
    pub fn preview(&self, n: usize) -> Vec<BTreeMap<String, CellValue>> {
        (0..n.min(self.row_count))
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), CellValue::guess(&c.values[row])))
                    .collect()
            })
            .collect()
    }

    fn rebuilt(&self, columns: Vec<Column>) -> Table {
        let row_count = columns.first().map_or(0, |c: &Column| c.values.len());
        Table {
            columns,
            row_count,
            has_header: self.has_header,
            truncated: self.truncated,
        }
    }
}

/// Make names unique the way dataframe readers do: later duplicates get
/// `.1`, `.2`, ... and empty names become `Unnamed: i`.
pub fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut taken: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::with_capacity(names.len());
    for (i, raw) in names.into_iter().enumerate() {
        let base = if raw.trim().is_empty() {
            format!("Unnamed: {i}")
        } else {
            raw
        };
        let mut name = base.clone();
        let mut n = 1;
        while taken.contains(&name) {
            name = format!("{base}.{n}");
            n += 1;
        }
        taken.insert(name.clone());
        out.push(name);
    }
    out
}
