//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```ignore
//! use weather_batcher::prelude::*;
//!
//! let config = GeneratorConfig::load_toml("batching.toml")?;
//! let mut generator = SeriesGenerator::new(ScalingModel::dense(), dataset, config)?;
//! let batch = generator.get(0)?;
//! ```
//!
//! # What's Included
//!
//! ## Generation
//! - [`SeriesGenerator`] - Windowed batch generator
//! - [`GeneratorBuilder`] - Fluent configuration
//! - [`Batch`] / [`TensorSet`] - Batch output
//!
//! ## Data
//! - [`Dataset`], [`LabeledArray`], [`Selection`], [`Grid`]
//!
//! ## Model
//! - [`Model`] - Collaborator trait
//! - [`ScalingModel`] - Ready-made implementation

// ============================================================================
// Generation
// ============================================================================

pub use crate::builder::GeneratorBuilder;
pub use crate::config::{GeneratorConfig, Insolation, LoadMode, WindowConfig, WindowMode};
pub use crate::generator::SeriesGenerator;
pub use crate::postprocess::{Batch, TensorSet};
pub use crate::windowing::{LoadOutcome, LoadState};

// ============================================================================
// Data
// ============================================================================

pub use crate::dataset::{Dataset, Grid, LabeledArray, Selection, SAMPLE, TIME_STEP, VARLEV};

// ============================================================================
// Model
// ============================================================================

pub use crate::model::Model;
pub use crate::preprocessing::{MeanImputer, ScalingModel, StandardScaler};

// ============================================================================
// Export & Validation
// ============================================================================

pub use crate::export::BatchExporter;
pub use crate::validation::{validate_dataset, ValidationConfig, ValidationResult};

// ============================================================================
// Errors
// ============================================================================

pub use crate::error::{BatchError, Result};
