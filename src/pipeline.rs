//! End-to-end entry points.
//!
//! Each function here takes raw input plus a filename and always returns a
//! renderable [`ProcessingResult`]: either the payload or `{error, message}`.
//! Nothing below this boundary is swallowed; nothing above it sees an `Err`.

use std::io::{Cursor, Read};

use log::{error, info, warn};
use serde::Serialize;

use crate::analysis::columns::{resolve_columns, ColumnRoleMapping};
use crate::analysis::trajectory::{analyze, SourceInfo, TrajectoryStatsResult};
use crate::cleaning::{clean, CleaningConfig, CleaningReport};
use crate::config::ProcessingOptions;
use crate::data::encoding::{
    resolve_encoding, resolve_forced, sniff_encoding, Confidence, DecodedText, Encoding,
};
use crate::data::loader::{parse_from_stream, parse_from_text, parse_table, TableChunks};
use crate::data::model::Table;
use crate::error::{Result, TrajectoryError};
use crate::projection::{
    project_points, sampling_factor, Projector, ProjectionMetadata, VisualizationPoint,
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// The structured failure payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingFailure {
    pub error: String,
    pub message: String,
}

impl From<TrajectoryError> for ProcessingFailure {
    fn from(err: TrajectoryError) -> Self {
        ProcessingFailure {
            error: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Either a payload or a failure, serialized without a wrapper.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProcessingResult<T> {
    Ok(T),
    Failed(ProcessingFailure),
}

impl<T> ProcessingResult<T> {
    pub fn ok(&self) -> Option<&T> {
        match self {
            ProcessingResult::Ok(payload) => Some(payload),
            ProcessingResult::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ProcessingFailure> {
        match self {
            ProcessingResult::Ok(_) => None,
            ProcessingResult::Failed(failure) => Some(failure),
        }
    }

    pub fn into_result(self) -> std::result::Result<T, ProcessingFailure> {
        match self {
            ProcessingResult::Ok(payload) => Ok(payload),
            ProcessingResult::Failed(failure) => Err(failure),
        }
    }
}

impl<T> From<Result<T>> for ProcessingResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(payload) => ProcessingResult::Ok(payload),
            Err(err) => {
                error!("Error processing CSV data: {err}");
                ProcessingResult::Failed(err.into())
            }
        }
    }
}

/// Points for display plus what produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionPayload {
    pub data: Vec<VisualizationPoint>,
    pub metadata: ProjectionMetadata,
    pub column_mapping: ColumnRoleMapping,
    pub encoding: Encoding,
    pub encoding_confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisPayload {
    pub encoding: Encoding,
    pub encoding_confidence: Confidence,
    #[serde(flatten)]
    pub stats: TrajectoryStatsResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningPayload {
    pub analysis: AnalysisPayload,
    pub cleaning: CleaningReport,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a whole buffer, honouring a forced codec when given.
pub fn decode(
    bytes: &[u8],
    forced: Option<Encoding>,
    opts: &ProcessingOptions,
) -> Result<DecodedText> {
    match forced {
        Some(encoding) => resolve_forced(bytes, encoding),
        None => Ok(resolve_encoding(bytes, opts.encoding_prefix_bytes)),
    }
}

/// A stream that is either chunk-parsable or had to be decoded whole.
enum OpenedStream<R: Read> {
    Chunks {
        chunks: TableChunks<std::io::Chain<Cursor<Vec<u8>>, R>>,
        encoding: Encoding,
        confidence: Confidence,
    },
    Whole(DecodedText),
}

/// Sniff the codec from a prefix and open a chunked reader over the stream.
/// Codecs that are not ASCII-compatible are decoded whole instead.
///
/// A forced codec is applied strictly: bytes it cannot decode anywhere in the
/// stream are a [`TrajectoryError::Decode`], as on the whole-buffer path.
fn open_stream<R: Read>(
    mut reader: R,
    forced: Option<Encoding>,
    chunk_rows: usize,
    opts: &ProcessingOptions,
) -> Result<OpenedStream<R>> {
    let mut prefix = Vec::with_capacity(opts.encoding_prefix_bytes);
    (&mut reader)
        .take(opts.encoding_prefix_bytes as u64)
        .read_to_end(&mut prefix)?;
    let truncated = prefix.len() >= opts.encoding_prefix_bytes;

    let (encoding, confidence) = match forced {
        Some(encoding) => (encoding, Confidence::High),
        None => sniff_encoding(&prefix, truncated),
    };
    if !encoding.is_ascii_compatible() {
        info!("{encoding} input cannot be streamed, decoding it whole");
        reader.read_to_end(&mut prefix)?;
        return decode(&prefix, forced, opts).map(OpenedStream::Whole);
    }
    if confidence == Confidence::Low {
        warn!("No encoding fits the first {} bytes, reading as {encoding}", prefix.len());
    } else {
        info!("Streaming with {encoding} encoding");
    }
    if prefix.starts_with(UTF8_BOM) {
        prefix.drain(..UTF8_BOM.len());
    }

    let stream = Cursor::new(prefix).chain(reader);
    let chunks = parse_from_stream(stream, encoding, chunk_rows, forced.is_some())?;
    Ok(OpenedStream::Chunks {
        chunks,
        encoding,
        confidence,
    })
}

/// The sniffed confidence, lowered once the reader had to substitute bytes
/// the prefix did not reveal.
fn stream_confidence<R: Read>(sniffed: Confidence, chunks: &TableChunks<R>) -> Confidence {
    match chunks.substituted_fields() {
        0 => sniffed,
        n => {
            warn!("{n} fields held bytes outside the detected encoding");
            Confidence::Low
        }
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Project a chunk stream. The sampling factor is fixed after the first chunk,
/// from `rate` or from the row count estimated off that chunk's density.
fn project_chunks<R: Read>(
    chunks: &mut TableChunks<R>,
    size_bytes: u64,
    rate: Option<usize>,
    opts: &ProcessingOptions,
) -> Result<(Vec<VisualizationPoint>, ProjectionMetadata, ColumnRoleMapping)> {
    let first = match chunks.next() {
        Some(table) => table?,
        None => chunks.empty_table(),
    };
    let mapping = resolve_columns(&first)?;

    let estimated_rows = if chunks.has_more() && first.row_count() > 0 && chunks.bytes_read() > 0 {
        let bytes_per_row = chunks.bytes_read() as f64 / first.row_count() as f64;
        (size_bytes as f64 / bytes_per_row) as usize
    } else {
        first.row_count()
    };
    let factor = sampling_factor(estimated_rows, rate, opts.max_points);
    info!("Estimated {estimated_rows} rows, sampling every {factor}th row");

    let mut projector = Projector::new(mapping.clone(), factor, opts);
    projector.push_table(&first)?;
    drop(first);
    for chunk in chunks.by_ref() {
        projector.push_table(&chunk?)?;
    }
    let (points, metadata) = projector.finish();
    Ok((points, metadata, mapping))
}

fn project_text(
    decoded: DecodedText,
    rate: Option<usize>,
    opts: &ProcessingOptions,
) -> Result<ProjectionPayload> {
    let size = decoded.text.len() as u64;
    let (data, metadata, column_mapping) = if opts.is_large(size) {
        info!(
            "Processing large content of {:.2} MB with chunked approach",
            size as f64 / (1024.0 * 1024.0)
        );
        let mut chunks =
            parse_from_stream(decoded.text.as_bytes(), Encoding::Utf8, opts.chunk_rows, true)?;
        project_chunks(&mut chunks, size, rate, opts)?
    } else {
        let table = parse_from_text(&decoded.text)?;
        let mapping = resolve_columns(&table)?;
        let (points, metadata) = project_points(&table, &mapping, rate, opts)?;
        (points, metadata, mapping)
    };
    Ok(ProjectionPayload {
        data,
        metadata,
        column_mapping,
        encoding: decoded.encoding,
        encoding_confidence: decoded.encoding_confidence,
    })
}

/// Decode, parse, resolve and project an in-memory buffer.
pub fn process_bytes(
    bytes: &[u8],
    filename: &str,
    forced: Option<Encoding>,
    rate: Option<usize>,
    opts: &ProcessingOptions,
) -> ProcessingResult<ProjectionPayload> {
    info!("Processing {filename} ({} bytes)", bytes.len());
    decode(bytes, forced, opts)
        .and_then(|decoded| project_text(decoded, rate, opts))
        .into()
}

/// Like [`process_bytes`], but reads `reader` in chunks so peak memory stays
/// at one chunk plus the emitted points. `size_bytes` is the total input size,
/// used to pick the sampling factor up front.
pub fn process_reader<R: Read>(
    reader: R,
    size_bytes: u64,
    filename: &str,
    forced: Option<Encoding>,
    rate: Option<usize>,
    opts: &ProcessingOptions,
) -> ProcessingResult<ProjectionPayload> {
    info!(
        "Processing {filename} as a stream ({:.2} MB)",
        size_bytes as f64 / (1024.0 * 1024.0)
    );
    let run = || -> Result<ProjectionPayload> {
        match open_stream(reader, forced, opts.chunk_rows, opts)? {
            OpenedStream::Whole(decoded) => project_text(decoded, rate, opts),
            OpenedStream::Chunks {
                mut chunks,
                encoding,
                confidence,
            } => {
                let (data, metadata, column_mapping) =
                    project_chunks(&mut chunks, size_bytes, rate, opts)?;
                Ok(ProjectionPayload {
                    data,
                    metadata,
                    column_mapping,
                    encoding,
                    encoding_confidence: stream_confidence(confidence, &chunks),
                })
            }
        }
    };
    run().into()
}

// ---------------------------------------------------------------------------
// Analysis and cleaning
// ---------------------------------------------------------------------------

fn analyze_table(
    table: &Table,
    sample_only: bool,
    source: &SourceInfo,
    opts: &ProcessingOptions,
) -> TrajectoryStatsResult {
    let mapping = match resolve_columns(table) {
        Ok(mapping) => Some(mapping),
        Err(e) => {
            warn!("{}: {e}", source.filename);
            None
        }
    };
    analyze(table, mapping.as_ref(), sample_only, source, opts)
}

/// Decode and parse a buffer, analysing a leading sample when it is large.
fn sample_bytes(
    bytes: &[u8],
    filename: &str,
    forced: Option<Encoding>,
    opts: &ProcessingOptions,
) -> Result<(Table, AnalysisPayload)> {
    let decoded = decode(bytes, forced, opts)?;
    let size = bytes.len() as u64;
    let table = parse_table(
        &decoded.text,
        size,
        opts.large_file_threshold_bytes,
        opts.analysis_sample_rows,
    )?;
    let source = SourceInfo::new(filename, size);
    let stats = analyze_table(&table, opts.is_large(size), &source, opts);
    Ok((
        table,
        AnalysisPayload {
            encoding: decoded.encoding,
            encoding_confidence: decoded.encoding_confidence,
            stats,
        },
    ))
}

/// Read the leading sample of a stream without loading the rest.
fn sample_reader<R: Read>(
    reader: R,
    size_bytes: u64,
    filename: &str,
    forced: Option<Encoding>,
    opts: &ProcessingOptions,
) -> Result<(Table, AnalysisPayload)> {
    let opened = open_stream(reader, forced, opts.analysis_sample_rows, opts)?;
    let (mut chunks, encoding, confidence) = match opened {
        OpenedStream::Whole(decoded) => {
            let bytes = decoded.text.into_bytes();
            let (table, mut payload) = sample_bytes(&bytes, filename, Some(Encoding::Utf8), opts)?;
            payload.encoding = decoded.encoding;
            payload.encoding_confidence = decoded.encoding_confidence;
            return Ok((table, payload));
        }
        OpenedStream::Chunks {
            chunks,
            encoding,
            confidence,
        } => (chunks, encoding, confidence),
    };
    let table = match chunks.next() {
        Some(table) => table?,
        None => chunks.empty_table(),
    };
    let table = table.with_truncated(chunks.has_more());
    let source = SourceInfo::new(filename, size_bytes);
    let stats = analyze_table(&table, table.is_truncated(), &source, opts);
    Ok((
        table,
        AnalysisPayload {
            encoding,
            encoding_confidence: stream_confidence(confidence, &chunks),
            stats,
        },
    ))
}

/// Statistics for an in-memory buffer.
pub fn analyze_bytes(
    bytes: &[u8],
    filename: &str,
    forced: Option<Encoding>,
    opts: &ProcessingOptions,
) -> ProcessingResult<AnalysisPayload> {
    sample_bytes(bytes, filename, forced, opts)
        .map(|(_, payload)| payload)
        .into()
}

/// Statistics for a stream; only the leading sample is read.
pub fn analyze_reader<R: Read>(
    reader: R,
    size_bytes: u64,
    filename: &str,
    forced: Option<Encoding>,
    opts: &ProcessingOptions,
) -> ProcessingResult<AnalysisPayload> {
    sample_reader(reader, size_bytes, filename, forced, opts)
        .map(|(_, payload)| payload)
        .into()
}

fn clean_sample(
    table: Table,
    analysis: AnalysisPayload,
    config: &CleaningConfig,
    opts: &ProcessingOptions,
) -> CleaningPayload {
    if analysis.stats.is_sample_analysis {
        warn!(
            "{}: cleaning the first {} rows only",
            analysis.stats.filename,
            table.row_count()
        );
    }
    let (_, cleaning) = clean(&table, &analysis.stats, config, opts);
    CleaningPayload { analysis, cleaning }
}

/// Analyse then clean an in-memory buffer.
pub fn clean_bytes(
    bytes: &[u8],
    filename: &str,
    forced: Option<Encoding>,
    config: &CleaningConfig,
    opts: &ProcessingOptions,
) -> ProcessingResult<CleaningPayload> {
    sample_bytes(bytes, filename, forced, opts)
        .map(|(table, analysis)| clean_sample(table, analysis, config, opts))
        .into()
}

/// Analyse then clean the leading sample of a stream.
pub fn clean_reader<R: Read>(
    reader: R,
    size_bytes: u64,
    filename: &str,
    forced: Option<Encoding>,
    config: &CleaningConfig,
    opts: &ProcessingOptions,
) -> ProcessingResult<CleaningPayload> {
    sample_reader(reader, size_bytes, filename, forced, opts)
        .map(|(table, analysis)| clean_sample(table, analysis, config, opts))
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "north,east,down,sec,nanosec\n0,0,0,0,0\n3,4,0,1,0\n3,4,0,2,0\n";

    #[test]
    fn unresolvable_columns_become_a_failure_payload() {
        let opts = ProcessingOptions::default();
        let result = process_bytes(b"name,label\na,b\n", "bad.csv", None, None, &opts);
        let failure = result.failure().expect("failure");
        assert_eq!(failure.error, "Missing required position columns");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("error").is_some());
        assert!(json.get("message").is_some());
    }

    #[test]
    fn forced_encoding_failure_is_reported() {
        let opts = ProcessingOptions::default();
        let forced = Some(Encoding::Utf8);
        let result = process_bytes(b"n,e,d\n\xFF,0,0\n", "x.csv", forced, None, &opts);
        assert_eq!(result.failure().unwrap().error, "Decode error");
    }

    #[test]
    fn reader_and_bytes_agree_on_small_input() {
        let opts = ProcessingOptions::default();
        let size = SCENARIO.len() as u64;
        let from_bytes = process_bytes(SCENARIO.as_bytes(), "s.csv", None, None, &opts)
            .into_result()
            .unwrap();
        let from_reader = process_reader(Cursor::new(SCENARIO), size, "s.csv", None, None, &opts)
            .into_result()
            .unwrap();
        assert_eq!(from_bytes.data, from_reader.data);
        assert_eq!(from_bytes.metadata, from_reader.metadata);
    }

    #[test]
    fn large_inputs_are_streamed_with_bounded_output() {
        let mut text = String::from("n,e,d\n");
        for i in 0..5_000 {
            text.push_str(&format!("{i},0,0\n"));
        }
        let opts = ProcessingOptions {
            large_file_threshold_bytes: 1_000,
            chunk_rows: 700,
            max_points: 100,
            ..ProcessingOptions::default()
        };
        let payload = process_bytes(text.as_bytes(), "big.csv", None, None, &opts)
            .into_result()
            .unwrap();
        assert_eq!(payload.metadata.original_count, 5_000);
        assert!(payload.metadata.sampling_factor >= 40);
        assert!(payload.data.len() <= 130);
        assert_eq!(payload.data[0].position_n, 0.0);
    }

    #[test]
    fn utf16_streams_fall_back_to_whole_decoding() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in SCENARIO.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let size = bytes.len() as u64;
        let opts = ProcessingOptions::default();
        let payload = process_reader(Cursor::new(bytes), size, "w.csv", None, None, &opts)
            .into_result()
            .unwrap();
        assert_eq!(payload.encoding, Encoding::Utf16);
        assert_eq!(payload.data.len(), 3);
    }

    #[test]
    fn large_analysis_is_marked_as_sample() {
        let mut text = String::from("n,e,d\n");
        for i in 0..300 {
            text.push_str(&format!("{i},0,0\n"));
        }
        let opts = ProcessingOptions {
            large_file_threshold_bytes: 100,
            analysis_sample_rows: 50,
            ..ProcessingOptions::default()
        };
        let payload = analyze_bytes(text.as_bytes(), "big.csv", None, &opts).into_result().unwrap();
        assert!(payload.stats.is_sample_analysis);
        assert_eq!(payload.stats.row_count, 50);

        let size = text.len() as u64;
        let streamed = analyze_reader(Cursor::new(text), size, "big.csv", None, &opts)
            .into_result()
            .unwrap();
        assert!(streamed.stats.is_sample_analysis);
        assert_eq!(streamed.stats.row_count, 50);
    }

    #[test]
    fn cleaning_payload_carries_both_reports() {
        let mut config = CleaningConfig::default();
        config.static_flight_detection.enabled = true;
        let opts = ProcessingOptions::default();
        let payload = clean_bytes(SCENARIO.as_bytes(), "s.csv", None, &config, &opts)
            .into_result()
            .unwrap();
        assert_eq!(payload.analysis.stats.row_count, 3);
        assert_eq!(payload.cleaning.cleaned_stats.row_count, 0);
    }
}
