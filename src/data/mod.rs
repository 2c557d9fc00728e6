/// Data layer: decoding, tabular parsing and row selection.
///
/// Architecture:
/// ```text
///  raw bytes (.csv / .txt / ...)
///        │
///        ▼
///   ┌──────────┐
///   │ encoding  │  trial-decode → DecodedText
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  header detection, whole-text or chunked → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  Column / Table / CellValue
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  row predicates, position rows
///   └──────────┘
/// ```

pub mod encoding;
pub mod filter;
pub mod loader;
pub mod model;
