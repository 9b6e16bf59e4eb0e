//! Per-feature z-score scaling.
//!
//! ```text
//! scaled = (x - mean) / std
//! ```
//!
//! Statistics are fitted column by column on `(n_sample, features)` rows,
//! ignoring NaN. Columns are independent, so they are fitted in parallel
//! with rayon. Constant (or empty) columns get `std = 1` and are only
//! centred.

use crate::error::{BatchError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;

/// Mean and population standard deviation of the finite values in `column`.
pub(crate) fn column_stats(column: ArrayView1<'_, f32>) -> (f64, f64, usize) {
    let (mut n, mut mean, mut m2) = (0usize, 0.0f64, 0.0f64);
    // Welford
    for &v in column.iter().filter(|v| !v.is_nan()) {
        n += 1;
        let x = v as f64;
        let delta = x - mean;
        mean += delta / n as f64;
        m2 += delta * (x - mean);
    }
    let std = if n > 0 { (m2 / n as f64).sqrt() } else { 0.0 };
    (mean, std, n)
}

/// Fitted per-feature standard scaler.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f32>,
    std: Array1<f32>,
}

impl StandardScaler {
    /// Fit on `(n_sample, features)` rows.
    pub fn fit(data: &Array2<f32>) -> Self {
        let stats: Vec<(f64, f64, usize)> = (0..data.ncols())
            .into_par_iter()
            .map(|j| column_stats(data.column(j)))
            .collect();
        let mean = stats.iter().map(|&(m, _, _)| m as f32).collect();
        let std = stats
            .iter()
            .map(|&(_, s, _)| if s > f64::EPSILON { s as f32 } else { 1.0 })
            .collect();
        Self { mean, std }
    }

    /// Build from known statistics.
    pub fn from_stats(mean: Array1<f32>, std: Array1<f32>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(BatchError::Model(format!(
                "{} means but {} standard deviations",
                mean.len(),
                std.len()
            )));
        }
        if std.iter().any(|&s| s <= 0.0 || !s.is_finite()) {
            return Err(BatchError::Model(
                "standard deviations must be positive and finite".to_string(),
            ));
        }
        Ok(Self { mean, std })
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Fitted means.
    pub fn mean(&self) -> &Array1<f32> {
        &self.mean
    }

    /// Fitted standard deviations.
    pub fn std(&self) -> &Array1<f32> {
        &self.std
    }

    fn check(&self, data: &Array2<f32>) -> Result<()> {
        if data.ncols() != self.n_features() {
            return Err(BatchError::Model(format!(
                "scaler fitted on {} features applied to {}",
                self.n_features(),
                data.ncols()
            )));
        }
        Ok(())
    }

    /// Scale rows.
    pub fn transform(&self, mut data: Array2<f32>) -> Result<Array2<f32>> {
        self.check(&data)?;
        for mut row in data.axis_iter_mut(Axis(0)) {
            row -= &self.mean;
            row /= &self.std;
        }
        Ok(data)
    }

    /// Undo [`StandardScaler::transform`].
    pub fn inverse_transform(&self, mut data: Array2<f32>) -> Result<Array2<f32>> {
        self.check(&data)?;
        for mut row in data.axis_iter_mut(Axis(0)) {
            row *= &self.std;
            row += &self.mean;
        }
        Ok(data)
    }
}
