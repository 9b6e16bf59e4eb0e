//! A ready-made [`Model`] built from a tensor layout and fitted transforms.
//!
//! Useful wherever no real network is at hand: tools, demos, tests, or as
//! the preprocessing half of an external model.
//!
//! # Example
//!
//! ```ignore
//! // Fit on the flat, unscaled rows of every window.
//! let raw = generator.generate(&[], false)?;
//! let p = raw.predictors.into_single().unwrap().into_dimensionality::<Ix2>()?;
//! let t = raw.targets.into_single().unwrap().into_dimensionality::<Ix2>()?;
//! *generator.model_mut() = ScalingModel::convolutional(false).fit(&p, &t, false)?;
//! ```

use super::{MeanImputer, StandardScaler};
use crate::error::Result;
use crate::model::Model;
use ndarray::Array2;

/// Layout flags plus optional per-feature scalers and imputers.
#[derive(Debug, Clone, Default)]
pub struct ScalingModel {
    convolutional: bool,
    recurrent: bool,
    predictor_scaler: Option<StandardScaler>,
    target_scaler: Option<StandardScaler>,
    imputers: Option<(MeanImputer, MeanImputer)>,
}

impl ScalingModel {
    /// Identity model with the given layout.
    pub fn new(convolutional: bool, recurrent: bool) -> Self {
        Self {
            convolutional,
            recurrent,
            ..Self::default()
        }
    }

    /// Flat, time-collapsed consumer.
    pub fn dense() -> Self {
        Self::new(false, false)
    }

    /// Channel-first consumer, optionally keeping the time axis.
    pub fn convolutional(recurrent: bool) -> Self {
        Self::new(true, recurrent)
    }

    /// Dense consumer keeping the time axis.
    pub fn recurrent() -> Self {
        Self::new(false, true)
    }

    /// Use fitted scalers.
    pub fn with_scalers(mut self, predictors: StandardScaler, targets: StandardScaler) -> Self {
        self.predictor_scaler = Some(predictors);
        self.target_scaler = Some(targets);
        self
    }

    /// Use fitted imputers; the model then reports that it imputes.
    pub fn with_imputers(mut self, predictors: MeanImputer, targets: MeanImputer) -> Self {
        self.imputers = Some((predictors, targets));
        self
    }

    /// Fit scalers on flat `(n_sample, features)` rows.
    ///
    /// With `impute`, mean imputers are fitted too and scalers are fitted on
    /// the imputed rows.
    pub fn fit(
        self,
        predictors: &Array2<f32>,
        targets: &Array2<f32>,
        impute: bool,
    ) -> Result<Self> {
        let mut model = self;
        let (p, t) = if impute {
            let (pi, ti) = (MeanImputer::fit(predictors), MeanImputer::fit(targets));
            let rows = (pi.transform(predictors.clone())?, ti.transform(targets.clone())?);
            model = model.with_imputers(pi, ti);
            rows
        } else {
            (predictors.clone(), targets.clone())
        };
        let (ps, ts) = (StandardScaler::fit(&p), StandardScaler::fit(&t));
        Ok(model.with_scalers(ps, ts))
    }

    /// Predictor scaler, if fitted.
    pub fn predictor_scaler(&self) -> Option<&StandardScaler> {
        self.predictor_scaler.as_ref()
    }

    /// Target scaler, if fitted.
    pub fn target_scaler(&self) -> Option<&StandardScaler> {
        self.target_scaler.as_ref()
    }
}

impl Model for ScalingModel {
    fn is_convolutional(&self) -> bool {
        self.convolutional
    }

    fn is_recurrent(&self) -> bool {
        self.recurrent
    }

    fn impute(&self) -> bool {
        self.imputers.is_some()
    }

    fn scaler_transform(
        &self,
        predictors: Array2<f32>,
        targets: Array2<f32>,
    ) -> Result<(Array2<f32>, Array2<f32>)> {
        let predictors = match &self.predictor_scaler {
            Some(s) => s.transform(predictors)?,
            None => predictors,
        };
        let targets = match &self.target_scaler {
            Some(s) => s.transform(targets)?,
            None => targets,
        };
        Ok((predictors, targets))
    }

    fn imputer_transform(
        &self,
        predictors: Array2<f32>,
        targets: Array2<f32>,
    ) -> Result<(Array2<f32>, Array2<f32>)> {
        match &self.imputers {
            Some((p, t)) => Ok((p.transform(predictors)?, t.transform(targets)?)),
            None => Ok((predictors, targets)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_identity_by_default() {
        let model = ScalingModel::dense();
        assert!(!model.impute());
        let (p, t) = model
            .scaler_transform(array![[1.0, 2.0]], array![[3.0]])
            .unwrap();
        assert_eq!(p, array![[1.0, 2.0]]);
        assert_eq!(t, array![[3.0]]);
    }

    #[test]
    fn test_fit_scales_to_unit_variance() {
        let p = array![[0.0], [2.0]];
        let t = array![[10.0], [30.0]];
        let model = ScalingModel::convolutional(true).fit(&p, &t, false).unwrap();
        assert!(model.is_convolutional() && model.is_recurrent());
        let (ps, ts) = model.scaler_transform(p, t).unwrap();
        assert!((ps[[0, 0]] + 1.0).abs() < 1e-6);
        assert!((ts[[1, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fit_with_imputation() {
        let p = array![[1.0], [f32::NAN], [3.0]];
        let t = array![[0.0], [0.0], [0.0]];
        let model = ScalingModel::recurrent().fit(&p, &t, true).unwrap();
        assert!(model.impute());
        let (pi, _) = model.imputer_transform(p, t).unwrap();
        assert_eq!(pi[[1, 0]], 2.0);
    }
}
