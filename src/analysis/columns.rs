//! Column semantics: which columns hold north/east/down position (and the
//! optional attitude, body velocity and timestamp fields).
//!
//! Resolution runs a ladder of strategies from the most explicit signal to
//! the most speculative, and stops at the first rung that fills all three
//! position roles:
//!
//! 1. exact alias match on column names
//! 2. substring alias match
//! 3. ROS2 message layout (timestamp columns + fixed index triples)
//! 4. scientific-notation header artifacts
//! 5. statistical inference (highest-variance numeric columns)
//! 6. positional defaults (`x/col0/0`, ..., then first three numeric columns)

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;

use super::stats::{mean, sample_std};
use crate::data::model::Table;
use crate::error::{Result, TrajectoryError};

// ---------------------------------------------------------------------------
// Roles and strategies
// ---------------------------------------------------------------------------

/// Semantic role a column can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    PositionN,
    PositionE,
    PositionD,
    Phi,
    Theta,
    Psi,
    U,
    V,
    W,
    Sec,
    Nanosec,
    Velocity,
}

impl Role {
    pub const POSITIONS: [Role; 3] = [Role::PositionN, Role::PositionE, Role::PositionD];

    pub const OPTIONAL: [Role; 9] = [
        Role::Phi,
        Role::Theta,
        Role::Psi,
        Role::U,
        Role::V,
        Role::W,
        Role::Sec,
        Role::Nanosec,
        Role::Velocity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Role::PositionN => "position_n",
            Role::PositionE => "position_e",
            Role::PositionD => "position_d",
            Role::Phi => "phi",
            Role::Theta => "theta",
            Role::Psi => "psi",
            Role::U => "u",
            Role::V => "v",
            Role::W => "w",
            Role::Sec => "sec",
            Role::Nanosec => "nanosec",
            Role::Velocity => "velocity",
        }
    }

    /// Lower-case aliases tried for a position role, most specific first.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Role::PositionN => &[
                "position_n", "n", "north", "x", "pos_n", "position_north", "pos_north",
                "position_x", "pos_x", "posx", "nx", "northx", "latitude", "lat", "posn",
                "position n", "px", "col0", "x_pos", "xcord", "xcoord", "pos x", "n_pos",
                "north_pos",
            ],
            Role::PositionE => &[
                "position_e", "e", "east", "y", "pos_e", "position_east", "pos_east",
                "position_y", "pos_y", "posy", "ey", "easty", "longitude", "lon", "long",
                "pose", "position e", "py", "col1", "y_pos", "ycord", "ycoord", "pos y",
                "e_pos", "east_pos",
            ],
            Role::PositionD => &[
                "position_d", "d", "down", "z", "alt", "altitude", "pos_d", "position_down",
                "pos_down", "position_z", "pos_z", "posz", "dz", "downz", "height", "elev",
                "elevation", "depth", "posd", "position d", "pz", "col2", "z_pos", "zcord",
                "zcoord", "pos z", "d_pos", "down_pos", "h", "-alt", "up",
            ],
            _ => &[],
        }
    }

    /// Names accepted by the last-resort positional default.
    fn default_names(&self) -> &'static [&'static str] {
        match self {
            Role::PositionN => &["x", "col0", "0"],
            Role::PositionE => &["y", "col1", "1"],
            Role::PositionD => &["z", "col2", "2"],
            _ => &[],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The rung of the resolution ladder that produced a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ExactName,
    PartialName,
    Ros2Structure,
    ScientificNotation,
    StatisticalInference,
    PositionalDefault,
}

// ---------------------------------------------------------------------------
// ColumnRoleMapping
// ---------------------------------------------------------------------------

/// Role → column name for one table. The three position roles are always
/// present and always name distinct columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnRoleMapping {
    roles: BTreeMap<Role, String>,
    strategy: Strategy,
}

impl ColumnRoleMapping {
    /// Build a mapping from explicit position column names.
    pub fn from_positions(n: &str, e: &str, d: &str, strategy: Strategy) -> Result<Self> {
        if n == e || n == d || e == d {
            return Err(TrajectoryError::UnresolvableColumns {
                found: vec![n.to_string(), e.to_string(), d.to_string()],
                columns: Vec::new(),
            });
        }
        let roles = Role::POSITIONS
            .into_iter()
            .zip([n, e, d])
            .map(|(role, col)| (role, col.to_string()))
            .collect();
        Ok(ColumnRoleMapping { roles, strategy })
    }

    /// Attach an optional role.
    pub fn with_role(mut self, role: Role, column: &str) -> Self {
        self.roles.insert(role, column.to_string());
        self
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.roles.get(&role).map(String::as_str)
    }

    /// North, east and down column names.
    pub fn positions(&self) -> [&str; 3] {
        Role::POSITIONS.map(|role| self.get(role).unwrap_or_default())
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Error out if a mapped column is missing from `table`.
    pub fn check_against(&self, table: &Table) -> Result<()> {
        let missing: Vec<String> = self
            .positions()
            .iter()
            .filter(|name| !table.contains(name))
            .map(|name| name.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TrajectoryError::UnresolvableColumns {
                found: missing,
                columns: table.column_names(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Per-column profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct NumericProfile {
    min: f64,
    max: f64,
    mean: f64,
    std: f64,
}

#[derive(Debug, Clone)]
struct ColumnProfile {
    name: String,
    lower: String,
    numeric: Option<NumericProfile>,
}

impl ColumnProfile {
    fn within(&self, bound: f64) -> bool {
        self.numeric
            .as_ref()
            .is_some_and(|p| -bound < p.min && p.min < bound && -bound < p.max && p.max < bound)
    }
}

fn profile(table: &Table) -> Vec<ColumnProfile> {
    table
        .columns()
        .iter()
        .map(|col| {
            let numeric = if col.is_numeric() {
                let values = col.present_numbers();
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Some(NumericProfile {
                    min,
                    max,
                    mean: mean(&values).unwrap_or(0.0),
                    std: sample_std(&values).unwrap_or(0.0),
                })
            } else {
                None
            };
            ColumnProfile {
                name: col.name.clone(),
                lower: col.name.trim().to_lowercase(),
                numeric,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Column indices for north, east, down; `None` where still unresolved.
type Partial = [Option<usize>; 3];

/// Bound on position magnitudes for the ROS2 structural check.
const ROS2_POSITION_BOUND: f64 = 100_000.0;
/// Bound on position magnitudes for statistical inference.
const STATISTICAL_POSITION_BOUND: f64 = 1_000_000.0;
/// Index triples tried for ROS2 layouts, in priority order.
const ROS2_CANDIDATE_TRIPLES: [[usize; 3]; 3] = [[3, 4, 5], [5, 6, 7], [0, 1, 2]];

struct Resolver {
    profiles: Vec<ColumnProfile>,
}

impl Resolver {
    fn new(table: &Table) -> Self {
        Resolver {
            profiles: profile(table),
        }
    }

    fn is_numeric(&self, idx: usize) -> bool {
        self.profiles[idx].numeric.is_some()
    }

    fn numeric_indices(&self) -> Vec<usize> {
        (0..self.profiles.len()).filter(|&i| self.is_numeric(i)).collect()
    }

    fn is_time_column(&self, idx: usize) -> bool {
        matches!(self.profiles[idx].lower.as_str(), "sec" | "nanosec")
    }

    fn unclaimed(partial: &Partial, idx: usize) -> bool {
        !partial.contains(&Some(idx))
    }

    /// Strategy 1: case-insensitive equality with an alias.
    fn exact_names(&self, partial: &mut Partial) {
        for (slot, role) in Role::POSITIONS.iter().enumerate() {
            if partial[slot].is_some() {
                continue;
            }
            partial[slot] = role.aliases().iter().find_map(|alias| {
                (0..self.profiles.len())
                    .find(|&i| Self::unclaimed(partial, i) && self.profiles[i].lower == *alias)
            });
        }
    }

    /// Strategy 2: either name contains the other.
    ///
    /// Narrower than a plain two-way substring test. Single-letter aliases are
    /// skipped, and only numeric, non-timestamp columns with at least one
    /// letter in their name qualify. Otherwise `n` or `0` would match inside
    /// almost anything, and a text column such as `lat_source` could claim a
    /// position role.
    fn partial_names(&self, partial: &mut Partial) {
        for (slot, role) in Role::POSITIONS.iter().enumerate() {
            if partial[slot].is_some() {
                continue;
            }
            partial[slot] = role
                .aliases()
                .iter()
                .filter(|alias| alias.len() > 1)
                .find_map(|alias| {
                    (0..self.profiles.len()).find(|&i| {
                        let lower = &self.profiles[i].lower;
                        Self::unclaimed(partial, i)
                            && self.is_numeric(i)
                            && !self.is_time_column(i)
                            && lower.chars().any(char::is_alphabetic)
                            && (lower.contains(alias) || alias.contains(lower.as_str()))
                    })
                });
        }
    }

    fn has_ros2_timestamps(&self) -> bool {
        let named = self
            .profiles
            .iter()
            .any(|p| p.lower == "sec" || p.lower == "nanosec");
        let epoch_header = self.profiles.first().is_some_and(|p| {
            p.lower.len() >= 10 && p.lower.chars().all(|c| c.is_ascii_digit())
        });
        named || epoch_header
    }

    /// Strategy 3: ROS2 message exports put positions at fixed offsets after
    /// the timestamp fields.
    fn ros2_structure(&self) -> Option<[usize; 3]> {
        if !self.has_ros2_timestamps() || self.profiles.len() < 6 {
            return None;
        }
        debug!("ROS2 timestamp structure detected, probing fixed index triples");
        ROS2_CANDIDATE_TRIPLES.into_iter().find(|triple| {
            triple.iter().all(|&i| {
                i < self.profiles.len() && self.profiles[i].within(ROS2_POSITION_BOUND)
            })
        })
    }

    /// Strategy 4: some exporters write the first data row as the header,
    /// leaving names like `8.586749e-05`. Classify by value shape.
    fn scientific_notation(&self) -> Option<[usize; 3]> {
        let scientific: Vec<usize> = (0..self.profiles.len())
            .filter(|&i| {
                let name = &self.profiles[i].name;
                name.contains("e-") || name.contains("e+")
            })
            .collect();
        if scientific.len() < 3 {
            return None;
        }
        debug!("Found {} scientific-notation column names", scientific.len());

        let (mut north, mut east, mut down) = (None, None, None);
        for i in self.numeric_indices() {
            let Some(p) = &self.profiles[i].numeric else {
                continue;
            };
            if self.profiles[i].name.contains("e-") {
                east = east.or(Some(i));
            } else if -10.0 < p.mean && p.mean < -0.01 {
                down = down.or(Some(i));
            } else if 0.001 < p.mean && p.mean < 10.0 && p.min > -1.0 {
                north = north.or(Some(i));
            }
        }
        match (north, east, down) {
            (Some(n), Some(e), Some(d)) => Some([n, e, d]),
            _ => {
                debug!("Value-shape classification inconclusive, using column order");
                Some([scientific[0], scientific[1], scientific[2]])
            }
        }
    }

    /// Strategy 5: the three most variable numeric columns within a sane
    /// magnitude, highest standard deviation first.
    fn statistical(&self) -> Option<[usize; 3]> {
        let mut candidates: Vec<(usize, f64)> = self
            .numeric_indices()
            .into_iter()
            .filter_map(|i| {
                let p = self.profiles[i].numeric.as_ref()?;
                (p.std > 0.0 && self.profiles[i].within(STATISTICAL_POSITION_BOUND))
                    .then_some((i, p.std))
            })
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        match candidates.as_slice() {
            [a, b, c, ..] => Some([a.0, b.0, c.0]),
            _ => None,
        }
    }

    /// Strategy 6: literal x/y/z-style names completing the name matches,
    /// then the first three numeric columns.
    fn positional_default(&self, mut partial: Partial) -> Option<[usize; 3]> {
        for (slot, role) in Role::POSITIONS.iter().enumerate() {
            if partial[slot].is_some() {
                continue;
            }
            partial[slot] = (0..self.profiles.len()).find(|&i| {
                Self::unclaimed(&partial, i)
                    && role.default_names().contains(&self.profiles[i].lower.as_str())
            });
        }
        if let [Some(n), Some(e), Some(d)] = partial {
            return Some([n, e, d]);
        }
        match self.numeric_indices().as_slice() {
            [a, b, c, ..] => Some([*a, *b, *c]),
            _ => None,
        }
    }

    fn optional_roles(&self, claimed: &[usize; 3]) -> Vec<(Role, usize)> {
        let mut taken: Vec<usize> = claimed.to_vec();
        let mut found = Vec::new();
        for role in Role::OPTIONAL {
            let hit = (0..self.profiles.len())
                .find(|i| !taken.contains(i) && self.profiles[*i].lower == role.name());
            if let Some(i) = hit {
                taken.push(i);
                found.push((role, i));
            }
        }
        found
    }

    fn resolve(&self) -> std::result::Result<([usize; 3], Strategy), Partial> {
        let mut partial: Partial = [None; 3];

        self.exact_names(&mut partial);
        if let [Some(n), Some(e), Some(d)] = partial {
            return Ok(([n, e, d], Strategy::ExactName));
        }
        self.partial_names(&mut partial);
        if let [Some(n), Some(e), Some(d)] = partial {
            return Ok(([n, e, d], Strategy::PartialName));
        }
        if let Some(triple) = self.ros2_structure() {
            return Ok((triple, Strategy::Ros2Structure));
        }
        if let Some(triple) = self.scientific_notation() {
            return Ok((triple, Strategy::ScientificNotation));
        }
        if let Some(triple) = self.statistical() {
            return Ok((triple, Strategy::StatisticalInference));
        }
        if let Some(triple) = self.positional_default(partial) {
            return Ok((triple, Strategy::PositionalDefault));
        }
        Err(partial)
    }
}

/// Map `table`'s columns onto semantic roles.
///
/// Fails with [`TrajectoryError::UnresolvableColumns`] only when no strategy
/// can name three distinct position columns, which in practice means fewer
/// than three usable numeric columns.
pub fn resolve_columns(table: &Table) -> Result<ColumnRoleMapping> {
    let resolver = Resolver::new(table);
    let name = |i: usize| resolver.profiles[i].name.as_str();

    match resolver.resolve() {
        Ok((triple @ [n, e, d], strategy)) => {
            info!(
                "Resolved position columns via {strategy:?}: n={}, e={}, d={}",
                name(n),
                name(e),
                name(d)
            );
            let mut mapping =
                ColumnRoleMapping::from_positions(name(n), name(e), name(d), strategy)?;
            for (role, i) in resolver.optional_roles(&triple) {
                debug!("Optional role {role} -> {}", name(i));
                mapping = mapping.with_role(role, name(i));
            }
            Ok(mapping)
        }
        Err(partial) => {
            let found: Vec<String> = partial
                .iter()
                .flatten()
                .map(|&i| name(i).to_string())
                .collect();
            warn!("Could not detect all position columns. Found only: {found:?}");
            Err(TrajectoryError::UnresolvableColumns {
                found,
                columns: table.column_names(),
            })
        }
    }
}
