//! Model-side preprocessing helpers.
//!
//! - **Scaling**: per-feature z-score ([`StandardScaler`])
//! - **Imputation**: per-feature mean fill ([`MeanImputer`])
//! - **Collaborator**: [`ScalingModel`], a [`Model`](crate::model::Model)
//!   assembled from a layout and the two transforms above
//!
//! All transforms work on flattened `(n_sample, features)` rows, the form in
//! which generators hand data to a model.

pub mod imputer;
pub mod scaler;
pub mod scaling_model;

pub use imputer::MeanImputer;
pub use scaler::StandardScaler;
pub use scaling_model::ScalingModel;
