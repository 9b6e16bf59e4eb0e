//! Model collaborator contract.
//!
//! Generators do not know anything about the network they feed; they only
//! need the model's tensor layout and its fitted scaler/imputer. Both
//! transforms operate on flattened `(n_sample, features)` arrays and must
//! preserve shape.

use crate::error::Result;
use ndarray::Array2;
use std::sync::Arc;

/// Capabilities a generator consumes from a model.
pub trait Model {
    /// Whether the model consumes channel-first grids.
    fn is_convolutional(&self) -> bool;

    /// Whether the model keeps an explicit time axis.
    fn is_recurrent(&self) -> bool;

    /// Whether missing values must be imputed before scaling.
    fn impute(&self) -> bool;

    /// Scale predictors and targets jointly.
    fn scaler_transform(
        &self,
        predictors: Array2<f32>,
        targets: Array2<f32>,
    ) -> Result<(Array2<f32>, Array2<f32>)>;

    /// Impute missing predictor and target values jointly.
    fn imputer_transform(
        &self,
        predictors: Array2<f32>,
        targets: Array2<f32>,
    ) -> Result<(Array2<f32>, Array2<f32>)>;
}

macro_rules! forward_model {
    ($($ty:ty),*) => {$(
        impl<M: Model + ?Sized> Model for $ty {
            fn is_convolutional(&self) -> bool {
                (**self).is_convolutional()
            }
            fn is_recurrent(&self) -> bool {
                (**self).is_recurrent()
            }
            fn impute(&self) -> bool {
                (**self).impute()
            }
            fn scaler_transform(
                &self,
                predictors: Array2<f32>,
                targets: Array2<f32>,
            ) -> Result<(Array2<f32>, Array2<f32>)> {
                (**self).scaler_transform(predictors, targets)
            }
            fn imputer_transform(
                &self,
                predictors: Array2<f32>,
                targets: Array2<f32>,
            ) -> Result<(Array2<f32>, Array2<f32>)> {
                (**self).imputer_transform(predictors, targets)
            }
        }
    )*};
}

forward_model!(&M, Box<M>, Arc<M>);

/// Snapshot of a model's layout flags, taken once at generator construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelCapabilities {
    /// Channel-first grid consumption
    pub convolutional: bool,
    /// Explicit time axis
    pub recurrent: bool,
    /// Imputation required before scaling
    pub impute: bool,
}

impl ModelCapabilities {
    /// Read the capability flags of `model`.
    pub fn of<M: Model + ?Sized>(model: &M) -> Self {
        Self {
            convolutional: model.is_convolutional(),
            recurrent: model.is_recurrent(),
            impute: model.impute(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flags;

    impl Model for Flags {
        fn is_convolutional(&self) -> bool {
            true
        }
        fn is_recurrent(&self) -> bool {
            false
        }
        fn impute(&self) -> bool {
            true
        }
        fn scaler_transform(
            &self,
            p: Array2<f32>,
            t: Array2<f32>,
        ) -> Result<(Array2<f32>, Array2<f32>)> {
            Ok((p * 2.0, t * 2.0))
        }
        fn imputer_transform(
            &self,
            p: Array2<f32>,
            t: Array2<f32>,
        ) -> Result<(Array2<f32>, Array2<f32>)> {
            Ok((p, t))
        }
    }

    #[test]
    fn test_capabilities_snapshot() {
        let caps = ModelCapabilities::of(&Flags);
        assert!(caps.convolutional);
        assert!(!caps.recurrent);
        assert!(caps.impute);
    }

    #[test]
    fn test_forwarding_impls() {
        let shared: Arc<dyn Model> = Arc::new(Flags);
        assert!(ModelCapabilities::of(&shared).convolutional);
        let (p, _) = (&Flags)
            .scaler_transform(Array2::ones((1, 2)), Array2::ones((1, 1)))
            .unwrap();
        assert_eq!(p[[0, 1]], 2.0);
    }
}
