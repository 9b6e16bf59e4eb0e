//! Gridded time-series datasets.
//!
//! A [`Dataset`] bundles the arrays a generator reads from:
//!
//! - `predictors` (required): `(sample, [time_step,] [varlev | variable, level,] <spatial...>)`
//! - `targets` (optional): same layout, required by the paired variant
//! - sample timestamps and a lat/lon [`Grid`] (required for insolation)
//!
//! The `sample` dimension must come first. Samples are assumed contiguous
//! and evenly spaced in time; see [`crate::validation::validate_sample_times`].
//!
//! # Example
//!
//! ```
//! use ndarray::{ArrayD, IxDyn};
//! use weather_batcher::dataset::{Dataset, Grid, LabeledArray};
//!
//! let data = ArrayD::<f32>::zeros(IxDyn(&[10, 2, 3, 4]));
//! let predictors = LabeledArray::from_array(data, &["sample", "varlev", "lat", "lon"])
//!     .unwrap()
//!     .with_coord("varlev", ["z/500", "t/850"])
//!     .unwrap();
//! let ds = Dataset::new(predictors)
//!     .unwrap()
//!     .with_grid(Grid::regular(&[10.0, 0.0, -10.0], &[0.0, 90.0, 180.0, 270.0]));
//! assert_eq!(ds.n_samples(), 10);
//! ```

mod labeled;
mod selection;

pub use labeled::{LabeledArray, Storage};
pub use selection::Selection;

use crate::error::{BatchError, Result};
use chrono::NaiveDateTime;
use ndarray::{Array2, ArrayD};

/// Sample (time) dimension name.
pub const SAMPLE: &str = "sample";
/// Pre-encoded input history dimension name.
pub const TIME_STEP: &str = "time_step";
/// Variable dimension name.
pub const VARIABLE: &str = "variable";
/// Vertical level dimension name.
pub const LEVEL: &str = "level";
/// Combined variable/level dimension name.
pub const VARLEV: &str = "varlev";

/// Latitude/longitude of every spatial cell, in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    lat: ArrayD<f64>,
    lon: ArrayD<f64>,
}

impl Grid {
    /// Create a grid from per-cell latitude and longitude arrays.
    pub fn new(lat: ArrayD<f64>, lon: ArrayD<f64>) -> Result<Self> {
        if lat.shape() != lon.shape() {
            return Err(BatchError::Config(format!(
                "lat shape {:?} does not match lon shape {:?}",
                lat.shape(),
                lon.shape()
            )));
        }
        Ok(Self { lat, lon })
    }

    /// Build a regular 2-D `(lat, lon)` mesh from 1-D coordinates.
    pub fn regular(lat: &[f64], lon: &[f64]) -> Self {
        let lat2 = Array2::from_shape_fn((lat.len(), lon.len()), |(i, _)| lat[i]);
        let lon2 = Array2::from_shape_fn((lat.len(), lon.len()), |(_, j)| lon[j]);
        Self {
            lat: lat2.into_dyn(),
            lon: lon2.into_dyn(),
        }
    }

    /// Spatial shape of the grid.
    pub fn shape(&self) -> &[usize] {
        self.lat.shape()
    }

    /// Per-cell latitude.
    pub fn lat(&self) -> &ArrayD<f64> {
        &self.lat
    }

    /// Per-cell longitude.
    pub fn lon(&self) -> &ArrayD<f64> {
        &self.lon
    }
}

/// Predictor (and optional target) arrays with their time and grid metadata.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Predictor array; `sample` is the first dimension.
    pub predictors: LabeledArray,
    /// Optional target array; `sample` is the first dimension.
    pub targets: Option<LabeledArray>,
    sample_times: Option<Vec<NaiveDateTime>>,
    grid: Option<Grid>,
}

impl Dataset {
    /// Create a dataset from a predictor array.
    pub fn new(predictors: LabeledArray) -> Result<Self> {
        check_sample_first("predictors", &predictors)?;
        Ok(Self {
            predictors,
            targets: None,
            sample_times: None,
            grid: None,
        })
    }

    /// Attach a target array with the same number of samples.
    pub fn with_targets(mut self, targets: LabeledArray) -> Result<Self> {
        check_sample_first("targets", &targets)?;
        let (n_pred, n_targ) = (self.n_samples(), targets.len_of(SAMPLE)?);
        if n_pred != n_targ {
            return Err(BatchError::Config(format!(
                "targets have {n_targ} samples but predictors have {n_pred}"
            )));
        }
        self.targets = Some(targets);
        Ok(self)
    }

    /// Attach one timestamp per sample.
    pub fn with_sample_times(mut self, times: Vec<NaiveDateTime>) -> Result<Self> {
        if times.len() != self.n_samples() {
            return Err(BatchError::Config(format!(
                "{} sample times given for {} samples",
                times.len(),
                self.n_samples()
            )));
        }
        self.sample_times = Some(times);
        Ok(self)
    }

    /// Attach the lat/lon grid.
    pub fn with_grid(mut self, grid: Grid) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.predictors.shape()[0]
    }

    /// Whether predictors carry a `time_step` dimension.
    pub fn has_time_step(&self) -> bool {
        self.predictors.has_dim(TIME_STEP)
    }

    /// Length of the `time_step` dimension, or 1 when absent.
    pub fn time_steps(&self) -> usize {
        self.predictors.len_of(TIME_STEP).unwrap_or(1)
    }

    /// Sample timestamps, if attached.
    pub fn sample_times(&self) -> Option<&[NaiveDateTime]> {
        self.sample_times.as_deref()
    }

    /// Lat/lon grid, if attached.
    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    /// Materialize predictors and targets into memory.
    pub fn load(&mut self) -> Result<()> {
        self.predictors.load()?;
        if let Some(targets) = self.targets.as_mut() {
            targets.load()?;
        }
        Ok(())
    }

    /// Whether predictors and targets are materialized.
    pub fn is_loaded(&self) -> bool {
        self.predictors.is_loaded() && self.targets.as_ref().map_or(true, |t| t.is_loaded())
    }
}

fn check_sample_first(name: &str, array: &LabeledArray) -> Result<()> {
    match array.dims().first() {
        Some(&SAMPLE) => Ok(()),
        Some(_) => Err(BatchError::Config(format!(
            "'{SAMPLE}' must be the first dimension of {name}, got {:?}",
            array.dims()
        ))),
        None => Err(BatchError::MissingDimension(format!("{name}.{SAMPLE}"))),
    }
}
