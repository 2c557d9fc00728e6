//! Column semantics and trajectory statistics.
//!
//! `columns` decides which columns are the north/east/down positions (and
//! the optional attitude, velocity and time roles); `trajectory` turns a
//! table plus that mapping into a [`TrajectoryStatsResult`].

pub mod columns;
pub mod stats;
pub mod trajectory;

pub use columns::{resolve_columns, ColumnRoleMapping, Role, Strategy};
pub use trajectory::{
    analyze, SourceInfo, TimeSource, TrajectoryMetrics, TrajectoryOutcome, TrajectoryStatsResult,
};
