use std::io::Read;
use std::path::Path;

use log::{debug, info, warn};

use super::encoding::Encoding;
use super::model::{dedupe_names, Column, Table};
use crate::error::{Result, TrajectoryError};

/// File extensions accepted as delimited text. Extension-less names are
/// accepted too.
/// All of them are read as comma-separated.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "txt", "data", "dat", "log"];

/// Reject names whose extension is clearly not delimited text.
pub fn check_extension(filename: &str) -> Result<()> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext {
        None => Ok(()),
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        Some(other) => Err(TrajectoryError::Parse(format!(
            "unsupported file extension .{other} (expected one of: {})",
            SUPPORTED_EXTENSIONS.join(", ")
        ))),
    }
}

// ---------------------------------------------------------------------------
// Header detection
// ---------------------------------------------------------------------------

/// A field counts as numeric when, after dropping `-`, `.`, `e` and `+`,
/// only ASCII digits remain.
fn is_numeric_token(field: &str) -> bool {
    let stripped: String = field
        .chars()
        .filter(|c| !matches!(c, '-' | '.' | 'e' | '+'))
        .collect();
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}

/// A first record is a header unless every non-empty field is numeric.
///
/// A numeric-looking header such as `"1","2","3"` is read as data; that
/// ambiguity is inherent to the rule.
pub fn is_header_record<S: AsRef<str>>(fields: &[S]) -> bool {
    !fields
        .iter()
        .map(|f| f.as_ref().trim().trim_matches('"'))
        .filter(|f| !f.is_empty())
        .all(is_numeric_token)
}

/// Header check on a raw comma-separated line.
pub fn looks_like_header(first_line: &str) -> bool {
    let fields: Vec<&str> = first_line.trim().split(',').collect();
    is_header_record(&fields)
}

// ---------------------------------------------------------------------------
// Shared column accumulation
// ---------------------------------------------------------------------------

/// Accumulates records column-wise under a fixed set of names.
struct ColumnAccumulator {
    names: Vec<String>,
    cells: Vec<Vec<String>>,
}

impl ColumnAccumulator {
    fn new(names: &[String]) -> Self {
        ColumnAccumulator {
            names: names.to_vec(),
            cells: vec![Vec::new(); names.len()],
        }
    }

    fn rows(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    /// Short records are padded with missing cells, long ones are an error.
    fn push(&mut self, fields: Vec<String>, line: u64) -> Result<()> {
        let width = self.names.len();
        if fields.len() > width {
            return Err(TrajectoryError::Parse(format!(
                "line {line}: expected {width} fields, saw {}",
                fields.len()
            )));
        }
        let mut fields = fields.into_iter();
        for column in &mut self.cells {
            column.push(fields.next().unwrap_or_default());
        }
        Ok(())
    }

    fn finish(self, has_header: bool) -> Result<Table> {
        let columns = self
            .names
            .into_iter()
            .zip(self.cells)
            .map(|(name, values)| Column::new(name, values))
            .collect();
        Table::new(columns, has_header)
    }
}

fn synthetic_names(width: usize) -> Vec<String> {
    (0..width).map(|i| format!("col{i}")).collect()
}

fn csv_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All);
    builder
}

/// Work out column names from the first record. Returns the names and, for
/// headerless input, the first record to be kept as data.
fn header_decision(first: Vec<String>) -> (Vec<String>, bool, Option<Vec<String>>) {
    let has_header = is_header_record(&first);
    info!("Detected headers: {has_header}");
    debug!("First record: {first:?}");
    if has_header {
        (dedupe_names(first), true, None)
    } else {
        (synthetic_names(first.len()), false, Some(first))
    }
}

// ---------------------------------------------------------------------------
// Whole-text parsing
// ---------------------------------------------------------------------------

/// Parse an in-memory document into a [`Table`].
pub fn parse_from_text(text: &str) -> Result<Table> {
    let mut reader = csv_builder().from_reader(text.as_bytes());
    let mut records = reader.records();

    let first = match records.next() {
        Some(record) => record?.iter().map(str::to_string).collect::<Vec<_>>(),
        None => return Ok(Table::empty()),
    };
    let (names, has_header, pending) = header_decision(first);
    let mut acc = ColumnAccumulator::new(&names);
    if let Some(row) = pending {
        acc.push(row, 1)?;
    }

    for record in records {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        acc.push(record.iter().map(str::to_string).collect(), line)?;
    }

    info!(
        "Parsed {} rows x {} columns (headers: {has_header})",
        acc.rows(),
        names.len()
    );
    acc.finish(has_header)
}

/// Parse `text`, switching to the chunked reader when `size_hint` exceeds
/// `large_threshold`. In that case only the first chunk is returned and the
/// table is marked truncated if more rows follow.
pub fn parse_table(
    text: &str,
    size_hint: u64,
    large_threshold: u64,
    chunk_rows: usize,
) -> Result<Table> {
    if size_hint <= large_threshold {
        return parse_from_text(text);
    }
    info!(
        "Processing large content of {:.2} MB with chunked approach",
        size_hint as f64 / (1024.0 * 1024.0)
    );
    let mut chunks = parse_from_stream(text.as_bytes(), Encoding::Utf8, chunk_rows, true)?;
    match chunks.next() {
        Some(first) => {
            let more = chunks.has_more();
            Ok(first?.with_truncated(more))
        }
        None => Ok(chunks.empty_table()),
    }
}

// ---------------------------------------------------------------------------
// Streaming parsing
// ---------------------------------------------------------------------------

/// Iterator over fixed-size row chunks of a delimited stream.
///
/// The header decision and column names come from the first record and are
/// reused for every chunk.
///
/// The encoding is chosen before the stream is read, so bytes further in may
/// still be invalid for it. A strict reader fails with
/// [`TrajectoryError::Decode`] on the first such field; otherwise the field
/// gets U+FFFD substitutions and is counted in
/// [`substituted_fields`](TableChunks::substituted_fields).
pub struct TableChunks<R: Read> {
    reader: csv::Reader<R>,
    encoding: Encoding,
    strict: bool,
    substituted: usize,
    names: Vec<String>,
    has_header: bool,
    chunk_rows: usize,
    pending: Option<(Vec<String>, u64)>,
    rows_read: usize,
}

/// Open a stream for chunked parsing. `encoding` must be ASCII-compatible
/// since delimiters are located on raw bytes.
pub fn parse_from_stream<R: Read>(
    reader: R,
    encoding: Encoding,
    chunk_rows: usize,
    strict: bool,
) -> Result<TableChunks<R>> {
    if !encoding.is_ascii_compatible() {
        return Err(TrajectoryError::Parse(format!(
            "streaming parser cannot split {encoding} input; decode it whole instead"
        )));
    }
    let mut chunks = TableChunks {
        reader: csv_builder().from_reader(reader),
        encoding,
        strict,
        substituted: 0,
        names: Vec::new(),
        has_header: false,
        chunk_rows: chunk_rows.max(1),
        pending: None,
        rows_read: 0,
    };

    if let Some((first, _)) = chunks.read_record()? {
        let (names, has_header, pending) = header_decision(first);
        chunks.names = names;
        chunks.has_header = has_header;
        chunks.pending = pending.map(|row| (row, 1));
    }
    if chunks.pending.is_none() {
        chunks.pending = chunks.read_record()?;
    }
    Ok(chunks)
}

impl<R: Read> TableChunks<R> {
    pub fn has_header(&self) -> bool {
        self.has_header
    }

    /// Fields decoded with U+FFFD substitutions so far. Always zero for a
    /// strict reader.
    pub fn substituted_fields(&self) -> usize {
        self.substituted
    }

    /// Bytes consumed from the underlying stream so far.
    pub fn bytes_read(&self) -> u64 {
        self.reader.position().byte()
    }

    /// Whether another chunk will be produced.
    pub fn has_more(&self) -> bool {
        self.pending.is_some()
    }

    /// A zero-row table with this stream's columns.
    pub fn empty_table(&self) -> Table {
        ColumnAccumulator::new(&self.names)
            .finish(self.has_header)
            .unwrap_or_default()
    }

    fn read_record(&mut self) -> Result<Option<(Vec<String>, u64)>> {
        let mut record = csv::ByteRecord::new();
        if !self.reader.read_byte_record(&mut record)? {
            return Ok(None);
        }
        let line = record.position().map_or(0, |p| p.line());
        let mut fields = Vec::with_capacity(record.len());
        for field in record.iter() {
            match self.encoding.decode_field(field) {
                Ok(text) => fields.push(text),
                Err((reason, _)) if self.strict => {
                    return Err(TrajectoryError::Decode {
                        encoding: self.encoding.label().to_string(),
                        message: format!("{reason} in a field on line {line}"),
                    });
                }
                Err((reason, lossy)) => {
                    if self.substituted == 0 {
                        warn!(
                            "Line {line} is not valid {}: {reason}; substituting U+FFFD",
                            self.encoding
                        );
                    }
                    self.substituted += 1;
                    fields.push(lossy);
                }
            }
        }
        Ok(Some((fields, line)))
    }

    fn next_chunk(&mut self) -> Result<Option<Table>> {
        if self.pending.is_none() {
            return Ok(None);
        }
        let mut acc = ColumnAccumulator::new(&self.names);
        while acc.rows() < self.chunk_rows {
            match self.pending.take() {
                Some((fields, line)) => acc.push(fields, line)?,
                None => break,
            }
            self.pending = self.read_record()?;
        }
        self.rows_read += acc.rows();
        debug!("Read chunk of {} rows ({} total)", acc.rows(), self.rows_read);
        acc.finish(self.has_header).map(Some)
    }
}

impl<R: Read> Iterator for TableChunks<R> {
    type Item = Result<Table>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

// ---------------------------------------------------------------------------
// Serialization back to CSV
// ---------------------------------------------------------------------------

/// Serialize a table as CSV text with a header row.
pub fn write_csv(table: &Table) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.columns().iter().map(|c| c.name.as_str()))?;
    for row in 0..table.row_count() {
        writer.write_record(table.columns().iter().map(|c| c.values[row].as_str()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| TrajectoryError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| TrajectoryError::Parse(e.to_string()))
}
