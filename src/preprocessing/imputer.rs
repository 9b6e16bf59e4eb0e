//! Mean imputation of missing values.

use super::scaler::column_stats;
use crate::error::{BatchError, Result};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;

/// Replaces NaN with the fitted column mean.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanImputer {
    fill: Array1<f32>,
}

impl MeanImputer {
    /// Fit on `(n_sample, features)` rows. Columns with no finite value
    /// are filled with 0.
    pub fn fit(data: &Array2<f32>) -> Self {
        let fill: Vec<f32> = (0..data.ncols())
            .into_par_iter()
            .map(|j| match column_stats(data.column(j)) {
                (mean, _, n) if n > 0 => mean as f32,
                _ => 0.0,
            })
            .collect();
        Self {
            fill: Array1::from(fill),
        }
    }

    /// Fill values per feature.
    pub fn fill(&self) -> &Array1<f32> {
        &self.fill
    }

    /// Replace NaN in `data`.
    pub fn transform(&self, mut data: Array2<f32>) -> Result<Array2<f32>> {
        if data.ncols() != self.fill.len() {
            return Err(BatchError::Model(format!(
                "imputer fitted on {} features applied to {}",
                self.fill.len(),
                data.ncols()
            )));
        }
        for mut row in data.axis_iter_mut(Axis(0)) {
            row.zip_mut_with(&self.fill, |v, &f| {
                if v.is_nan() {
                    *v = f;
                }
            });
        }
        Ok(data)
    }
}
