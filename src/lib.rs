//! Weather Batcher
//!
//! On-the-fly training batches from gridded weather time series.
//!
//! # Overview
//!
//! A generator cuts input/target windows out of a `(sample, ..., lat, lon)`
//! dataset at training time instead of materializing every window up front.
//! Each batch is:
//!
//! 1. windowed by sample offset (optionally with a sequence of later targets)
//! 2. augmented with a top-of-atmosphere insolation channel (optional)
//! 3. cleaned of samples containing NaN
//! 4. imputed and scaled by the model's fitted transforms
//! 5. reshaped for a dense, recurrent or convolutional consumer
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Weather Batcher                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  dataset/       - Labeled arrays, selections, lat/lon grid      │
//! │  config/builder - Generator configuration (TOML/JSON)           │
//! │  windowing/     - Window offsets and memory loading strategies  │
//! │  postprocess    - NaN removal, impute, scale, reshape           │
//! │  generator      - Batch indexing over shuffled epochs           │
//! │  preprocessing/ - Scaler, imputer, ready-made model             │
//! │  export/        - NumPy export for Python                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use weather_batcher::prelude::*;
//!
//! let mut generator = GeneratorBuilder::new()
//!     .batch_size(32)
//!     .time_steps(2, 1)
//!     .shuffle(Some(42))
//!     .build(ScalingModel::convolutional(false), dataset)?;
//!
//! for batch in generator.batches() {
//!     let batch = batch?;
//!     train_step(&batch.predictors, &batch.targets);
//! }
//! generator.on_epoch_end();
//! ```

pub mod builder;
pub mod config;
pub mod dataset;
pub mod epoch;
pub mod error;
pub mod export;
pub mod generator;
pub mod insolation;
pub mod model;
pub mod postprocess;
pub mod prelude;
pub mod preprocessing;
pub mod shapes;
pub mod validation;
pub mod windowing;

// Re-exports - Configuration
pub use builder::GeneratorBuilder;
pub use config::{GeneratorConfig, Insolation, LoadMode, WindowConfig, WindowMode};

// Re-exports - Data
pub use dataset::{Dataset, Grid, LabeledArray, Selection};

// Re-exports - Generation
pub use epoch::{EpochController, EpochState};
pub use generator::{Batches, SeriesGenerator};
pub use postprocess::{Batch, TensorSet};
pub use shapes::ShapeCalculator;
pub use windowing::{LoadOutcome, LoadState};

// Re-exports - Model
pub use model::{Model, ModelCapabilities};
pub use preprocessing::{MeanImputer, ScalingModel, StandardScaler};

// Re-exports - Export & Validation
pub use export::{BatchExporter, ExportMetadata, ExportSummary};
pub use validation::{
    validate_dataset, validate_sample_times, ValidationConfig, ValidationLevel, ValidationResult,
};

// Re-exports - Errors
pub use error::{BatchError, Result};
