use serde::Serialize;

/// Summary statistics of one numeric column (missing cells excluded).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; `None` with fewer than two values.
    pub std: Option<f64>,
    /// Values outside the Tukey fences `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]`.
    pub outliers: usize,
    pub outlier_percentage: f64,
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample (n-1) standard deviation; `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Linear-interpolation quantile of an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn column_stats(values: &[f64]) -> Option<ColumnStats> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let min = *sorted.first()?;
    let max = *sorted.last()?;
    let q1 = quantile(&sorted, 0.25)?;
    let q3 = quantile(&sorted, 0.75)?;
    let iqr = q3 - q1;
    let (lower, upper) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
    let outliers = sorted.iter().filter(|&&v| v < lower || v > upper).count();

    Some(ColumnStats {
        count: sorted.len(),
        min,
        max,
        mean: mean(&sorted)?,
        median: quantile(&sorted, 0.5)?,
        std: sample_std(&sorted),
        outliers,
        outlier_percentage: outliers as f64 / sorted.len() as f64 * 100.0,
    })
}

/// Signed zero is noise in reports; fold `-0.0` into `0.0`.
pub fn normalize_zero(v: f64) -> f64 {
    v + 0.0
}
