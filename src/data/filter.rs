use super::model::Table;

// ---------------------------------------------------------------------------
// Row predicates over a Table
// ---------------------------------------------------------------------------

/// A point in the table's NED position columns, tagged with its row index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRow {
    pub row: usize,
    pub ned: [f64; 3],
}

impl PositionRow {
    pub fn distance_to(&self, other: &PositionRow) -> f64 {
        distance(&self.ned, &other.ned)
    }
}

pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dn = b[0] - a[0];
    let de = b[1] - a[1];
    let dd = b[2] - a[2];
    (dn * dn + de * de + dd * dd).sqrt()
}

/// Return indices of rows whose numeric value in `column` passes `keep`.
///
/// A row passes when:
/// * the column is absent → every row passes (no constraint)
/// * the cell is missing or non-numeric → `keep(None)` decides
/// * otherwise → `keep(Some(value))` decides
pub fn filtered_indices<F>(table: &Table, column: &str, keep: F) -> Vec<usize>
where
    F: Fn(Option<f64>) -> bool,
{
    match table.column(column) {
        Some(col) => col
            .numbers()
            .into_iter()
            .enumerate()
            .filter(|(_, v)| keep(*v))
            .map(|(i, _)| i)
            .collect(),
        None => (0..table.row_count()).collect(),
    }
}

/// Per-row `[n, e, d]`, `None` where any of the three cells is not numeric.
/// Absent columns yield no rows.
pub fn position_cells(table: &Table, columns: [&str; 3]) -> Vec<Option<[f64; 3]>> {
    let [Some(n), Some(e), Some(d)] = columns.map(|name| table.column(name)) else {
        return Vec::new();
    };
    let (n, e, d) = (n.numbers(), e.numbers(), d.numbers());
    (0..table.row_count())
        .map(|row| match (n[row], e[row], d[row]) {
            (Some(pn), Some(pe), Some(pd)) => Some([pn, pe, pd]),
            _ => None,
        })
        .collect()
}

/// Rows where all three position columns hold numbers, in table order.
pub fn position_rows(table: &Table, columns: [&str; 3]) -> Vec<PositionRow> {
    position_cells(table, columns)
        .into_iter()
        .enumerate()
        .filter_map(|(row, ned)| ned.map(|ned| PositionRow { row, ned }))
        .collect()
}
