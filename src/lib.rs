//! Flight-trajectory CSV interpretation.
//!
//! ```text
//!  bytes ─▶ data::encoding ─▶ data::loader ─▶ analysis::columns ─┬─▶ analysis
//!                                                                ├─▶ cleaning
//!                                                                └─▶ projection
//! ```
//!
//! [`pipeline`] wires the stages together and is the usual entry point.

pub mod analysis;
pub mod cleaning;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod projection;

pub use analysis::{
    analyze, resolve_columns, ColumnRoleMapping, Role, Strategy, TrajectoryStatsResult,
};
pub use cleaning::{clean, CleaningConfig, CleaningReport};
pub use config::ProcessingOptions;
pub use data::encoding::{resolve_encoding, Confidence, DecodedText, Encoding};
pub use data::loader::{parse_from_stream, parse_from_text, parse_table};
pub use data::model::{Column, Table};
pub use error::{Result, TrajectoryError};
pub use pipeline::{analyze_bytes, process_bytes, process_reader, ProcessingResult};
pub use projection::{project_points, ProjectionMetadata, VisualizationPoint};
