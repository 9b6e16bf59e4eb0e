//! Batch generator.
//!
//! [`SeriesGenerator`] ties the pieces together:
//!
//! ```text
//! EpochController ──► WindowEngine ──► PostProcessor ──► Batch
//!   (offsets)          (raw rows)       (clean/scale/reshape)
//! ```
//!
//! One engine serves the three [`WindowMode`]s:
//!
//! | Mode | Source | Windows |
//! |------|--------|---------|
//! | `Series` | last `time_step` of the predictors | configurable, with insolation and sequences |
//! | `Paired` | predictors and targets, sample for sample | none; the `time_step` axis is the time axis |
//! | `Contiguous` | series rebuilt from a `time_step`-encoded array (deprecated) | `T_in = T_out = time_step` count |
//!
//! # Example
//!
//! ```ignore
//! use weather_batcher::prelude::*;
//!
//! let config = GeneratorConfig::new().with_time_steps(2, 1).with_batch_size(32);
//! let mut generator = SeriesGenerator::new(ScalingModel::dense(), dataset, config)?;
//!
//! for epoch in 0..10 {
//!     for batch in generator.batches() {
//!         let batch = batch?;
//!         // train on batch.predictors / batch.targets
//!     }
//!     generator.on_epoch_end();
//! }
//! ```

use crate::config::{GeneratorConfig, Insolation, LoadMode, WindowConfig, WindowMode};
use crate::dataset::{Dataset, LabeledArray, Selection, SAMPLE, TIME_STEP, VARLEV};
use crate::epoch::EpochController;
use crate::error::{BatchError, Result};
use crate::insolation::{insolation, SOLAR_CONSTANT};
use crate::model::{Model, ModelCapabilities};
use crate::postprocess::{Batch, PostProcessor};
use crate::shapes::ShapeCalculator;
use crate::windowing::loading::materialize;
use crate::windowing::{LoadState, Views, WindowEngine};
use ndarray::ArrayD;

/// Windowed batch generator over one dataset.
pub struct SeriesGenerator<M: Model> {
    model: M,
    config: GeneratorConfig,
    dataset: Dataset,
    input_sel: Selection,
    output_sel: Selection,
    views: Views,
    engine: WindowEngine,
    shapes: ShapeCalculator,
    epochs: EpochController,
    insolation: Option<ArrayD<f32>>,
    state: LoadState,
    keep_time_axis: Option<bool>,
}

impl<M: Model> SeriesGenerator<M> {
    /// Create a generator.
    ///
    /// Fails fast on an invalid configuration, missing variables or
    /// dimensions, windows longer than the data, and insolation without
    /// sample times or a matching grid. Loads immediately when
    /// `force_load` is set.
    pub fn new(model: M, dataset: Dataset, config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let mode = config.mode;

        if mode != WindowMode::Series && dataset.targets.is_none() {
            return Err(BatchError::MissingVariable("targets".to_string()));
        }
        if mode == WindowMode::Contiguous {
            log::warn!(
                "the contiguous generator is deprecated and may be removed in the future; \
                 use the series generator instead"
            );
        }

        let (input_src, output_src) = sources(&dataset, mode)?;
        let input_sel = resolve_selection(&config.input_sel, &input_src);
        let output_sel = resolve_selection(&config.output_sel, &output_src);
        let views = Views {
            input: input_src.sel(&input_sel)?,
            output: output_src.sel(&output_sel)?,
            base: input_src,
        };

        if config.load == LoadMode::Minimal && views.base.coord(VARLEV).is_none() {
            return Err(BatchError::Config(format!(
                "minimal loading requires a labeled '{VARLEV}' dimension"
            )));
        }

        let window = effective_window(&config, &dataset);
        let total = views.base.len_of(SAMPLE)?;
        let engine = WindowEngine::new(mode, window, total)?;
        let shapes = shape_calculator(&views, engine.window(), mode, config.insolation)?;

        let insolation = match config.insolation {
            Insolation::Disabled => None,
            sol => Some(precompute_insolation(
                &dataset,
                sol,
                shapes.spatial(),
                engine.insolation_extent().max(total),
            )?),
        };

        let epochs = EpochController::new(
            engine.n_sample(),
            config.batch_size,
            config.shuffle,
            config.seed,
        )?;

        let state = if config.load == LoadMode::Lazy {
            log::warn!("data is not loaded into memory; performance may be very slow");
            LoadState::Degraded
        } else {
            LoadState::Unloaded
        };

        log::info!(
            "{:?} generator: {} samples, {} windows, {} batches of {}",
            mode,
            total,
            engine.n_sample(),
            epochs.len(),
            config.batch_size
        );

        let mut generator = Self {
            model,
            keep_time_axis: None,
            dataset,
            input_sel,
            output_sel,
            views,
            engine,
            shapes,
            epochs,
            insolation,
            state,
            config,
        };
        if generator.config.force_load {
            generator.load()?;
        }
        Ok(generator)
    }

    // ------------------------------------------------------------------
    // Batch access
    // ------------------------------------------------------------------

    /// Number of batches per epoch.
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    /// Whether an epoch has no batches.
    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Number of valid window start offsets.
    pub fn n_sample(&self) -> usize {
        self.engine.n_sample()
    }

    /// Batch `index` of the current epoch; `-1` is the last batch.
    pub fn get(&mut self, index: isize) -> Result<Batch> {
        let samples = self.epochs.batch_indices(index)?.to_vec();
        self.generate(&samples, true)
    }

    /// Build the batch for explicit start offsets; an empty slice means
    /// every offset. Without `scale_and_impute` the rows are returned flat
    /// and unscaled.
    pub fn generate(&mut self, samples: &[usize], scale_and_impute: bool) -> Result<Batch> {
        let samples = self.engine.resolve(samples)?;
        if self.state == LoadState::Unloaded {
            self.load()?;
        }
        let raw = self
            .engine
            .assemble(&samples, &self.views, self.insolation.as_ref())?;
        self.post_processor().process(&self.model, raw, scale_and_impute)
    }

    /// Iterate over the batches of the current epoch in order.
    pub fn batches(&mut self) -> Batches<'_, M> {
        Batches {
            generator: self,
            next: 0,
        }
    }

    /// Signal the end of an epoch: regenerate the sample ordering.
    pub fn on_epoch_end(&mut self) {
        self.epochs.on_epoch_end();
    }

    /// Sample offsets in the order the current epoch visits them.
    pub fn epoch_indices(&self) -> &[usize] {
        self.epochs.indices()
    }

    fn post_processor(&self) -> PostProcessor {
        let caps = ModelCapabilities::of(&self.model);
        let conv = caps.convolutional;
        PostProcessor::new(
            caps,
            self.config.remove_nan,
            self.shapes.predictor_layout(conv, self.keep_time_axis()),
            self.shapes.target_layout(conv, self.keep_time_axis()),
        )
        .with_sequence(
            self.engine.window().sequence.is_some(),
            self.insolation.is_some(),
        )
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Materialize the data according to the configured strategy.
    ///
    /// Idempotent: once loaded (or in lazy mode) this returns the current
    /// state without reading anything.
    pub fn load(&mut self) -> Result<LoadState> {
        if matches!(self.state, LoadState::Loaded(_) | LoadState::Degraded) {
            return Ok(self.state);
        }
        self.state = LoadState::Loading;
        let mode = self.config.mode;
        let (input_sel, output_sel) = (&self.input_sel, &self.output_sel);
        let result = materialize(
            self.config.load,
            &mut self.dataset,
            &mut self.views,
            input_sel,
            output_sel,
            |ds| build_views(ds, mode, input_sel, output_sel),
        );
        match result {
            Ok(outcome) => {
                self.state = LoadState::Loaded(outcome);
                log::info!("data {}", self.state);
                Ok(self.state)
            }
            Err(e) => {
                self.state = LoadState::Unloaded;
                Err(e)
            }
        }
    }

    /// Current loading state.
    pub fn load_state(&self) -> LoadState {
        self.state
    }

    // ------------------------------------------------------------------
    // Shapes
    // ------------------------------------------------------------------

    /// Whether output tensors keep an explicit time axis (defaults to the
    /// model's `is_recurrent`).
    pub fn keep_time_axis(&self) -> bool {
        self.keep_time_axis
            .unwrap_or_else(|| ModelCapabilities::of(&self.model).recurrent)
    }

    /// Override the time-axis layout; shapes reflect the change immediately.
    pub fn set_keep_time_axis(&mut self, keep: bool) {
        self.keep_time_axis = Some(keep);
    }

    /// Shape arithmetic for this generator.
    pub fn shapes(&self) -> &ShapeCalculator {
        &self.shapes
    }

    /// `(T_in, features..., spatial...)`, excluding insolation.
    pub fn shape(&self) -> Vec<usize> {
        self.shapes.shape()
    }

    /// Input scalars per sample, including insolation.
    pub fn n_features(&self) -> usize {
        self.shapes.n_features()
    }

    /// Flattened input shape under the current time-axis flag.
    pub fn dense_shape(&self) -> Vec<usize> {
        self.shapes.dense_shape(self.keep_time_axis())
    }

    /// Channel-first input shape under the current time-axis flag.
    pub fn convolution_shape(&self) -> Vec<usize> {
        self.shapes.convolution_shape(self.keep_time_axis())
    }

    /// Channel-first input shape with the time axis collapsed.
    pub fn shape_2d(&self) -> Vec<usize> {
        self.shapes.shape_2d()
    }

    /// `(T_in, 1, spatial...)` when insolation is enabled.
    pub fn insolation_shape(&self) -> Option<Vec<usize>> {
        self.shapes.insolation_shape()
    }

    /// `(T_out, features..., spatial...)`.
    pub fn output_shape(&self) -> Vec<usize> {
        self.shapes.output_shape()
    }

    /// Output scalars per sample.
    pub fn output_n_features(&self) -> usize {
        self.shapes.output_n_features()
    }

    /// Flattened output shape under the current time-axis flag.
    pub fn output_dense_shape(&self) -> Vec<usize> {
        self.shapes.output_dense_shape(self.keep_time_axis())
    }

    /// Channel-first output shape under the current time-axis flag.
    pub fn output_convolution_shape(&self) -> Vec<usize> {
        self.shapes.output_convolution_shape(self.keep_time_axis())
    }

    /// Channel-first output shape with the time axis collapsed.
    pub fn output_shape_2d(&self) -> Vec<usize> {
        self.shapes.output_shape_2d()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Configuration the generator was built with.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Effective window geometry (contiguous mode derives its own).
    pub fn window(&self) -> &WindowConfig {
        self.engine.window()
    }

    /// Model collaborator.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Model collaborator, e.g. to install fitted scalers.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Predictor view windows are read from.
    pub fn input_view(&self) -> &LabeledArray {
        &self.views.input
    }

    /// Target view windows are read from.
    pub fn output_view(&self) -> &LabeledArray {
        &self.views.output
    }

    /// Precomputed insolation, `(samples, spatial...)`.
    pub fn insolation(&self) -> Option<&ArrayD<f32>> {
        self.insolation.as_ref()
    }
}

/// One epoch of batches, in order.
pub struct Batches<'a, M: Model> {
    generator: &'a mut SeriesGenerator<M>,
    next: usize,
}

impl<M: Model> Iterator for Batches<'_, M> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.generator.len() {
            return None;
        }
        let index = self.next as isize;
        self.next += 1;
        Some(self.generator.get(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.generator.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

// ============================================================================
// Construction helpers
// ============================================================================

/// Arrays the input and output selections are taken from.
fn sources(dataset: &Dataset, mode: WindowMode) -> Result<(LabeledArray, LabeledArray)> {
    match mode {
        WindowMode::Series => {
            let da = if dataset.has_time_step() {
                dataset.predictors.isel_point(TIME_STEP, -1)?
            } else {
                dataset.predictors.clone()
            };
            Ok((da.clone(), da))
        }
        WindowMode::Paired => {
            let targets = dataset
                .targets
                .clone()
                .ok_or_else(|| BatchError::MissingVariable("targets".to_string()))?;
            Ok((dataset.predictors.clone(), targets))
        }
        WindowMode::Contiguous => {
            let series = contiguous_series(dataset)?;
            Ok((series.clone(), series))
        }
    }
}

/// One continuous series from a `time_step`-encoded dataset: the first time
/// step of every sample, the last time step of the trailing samples, then
/// the trailing target time steps.
fn contiguous_series(dataset: &Dataset) -> Result<LabeledArray> {
    let targets = dataset
        .targets
        .as_ref()
        .ok_or_else(|| BatchError::MissingVariable("targets".to_string()))?;
    let n = dataset.n_samples();
    let t = dataset.time_steps();
    if n < t {
        return Err(BatchError::Config(format!(
            "{n} samples are fewer than {t} time steps"
        )));
    }

    let predictors = &dataset.predictors;
    let mut parts = Vec::with_capacity(3);
    if dataset.has_time_step() {
        parts.push(predictors.isel_point(TIME_STEP, 0)?);
        parts.push(
            predictors
                .isel_range(SAMPLE, n + 1 - t..n)?
                .isel_point(TIME_STEP, -1)?,
        );
    } else {
        parts.push(predictors.clone());
    }
    let tail = targets.isel_range(SAMPLE, n - t..n)?;
    parts.push(if tail.has_dim(TIME_STEP) {
        tail.isel_point(TIME_STEP, -1)?
    } else {
        tail
    });
    LabeledArray::concat(parts, SAMPLE)
}

fn resolve_selection(configured: &Selection, source: &LabeledArray) -> Selection {
    if configured.is_empty() {
        Selection::all_of(source)
    } else {
        configured.clone()
    }
}

fn build_views(
    dataset: &Dataset,
    mode: WindowMode,
    input_sel: &Selection,
    output_sel: &Selection,
) -> Result<Views> {
    let (input_src, output_src) = sources(dataset, mode)?;
    Ok(Views {
        input: input_src.sel(input_sel)?,
        output: output_src.sel(output_sel)?,
        base: input_src,
    })
}

fn effective_window(config: &GeneratorConfig, dataset: &Dataset) -> WindowConfig {
    match config.mode {
        WindowMode::Series | WindowMode::Paired => config.window.clone(),
        WindowMode::Contiguous => {
            let t = dataset.time_steps();
            WindowConfig {
                rank: config.window.rank,
                input_time_steps: t,
                output_time_steps: t,
                interval: 1,
                sequence: None,
            }
        }
    }
}

/// Split a paired-mode view into its time-step count and per-step dims.
fn paired_dims(view: &LabeledArray) -> Result<(usize, Vec<usize>)> {
    let shape = view.shape();
    match view.axis_of(TIME_STEP) {
        None => Ok((1, shape[1..].to_vec())),
        Some(1) => Ok((shape[1], shape[2..].to_vec())),
        Some(axis) => Err(BatchError::Config(format!(
            "'{TIME_STEP}' must directly follow '{SAMPLE}', found at axis {axis}"
        ))),
    }
}

fn shape_calculator(
    views: &Views,
    window: &WindowConfig,
    mode: WindowMode,
    insolation: Insolation,
) -> Result<ShapeCalculator> {
    let ((t_in, in_dims), (t_out, out_dims)) = match mode {
        WindowMode::Paired => (paired_dims(&views.input)?, paired_dims(&views.output)?),
        WindowMode::Series | WindowMode::Contiguous => (
            (window.input_time_steps, views.input.shape()[1..].to_vec()),
            (window.output_time_steps, views.output.shape()[1..].to_vec()),
        ),
    };
    ShapeCalculator::new(
        window.rank,
        t_in,
        t_out,
        in_dims,
        out_dims,
        insolation.is_enabled(),
    )
}

/// Insolation for `extent` samples. Sample times are extended past the end
/// of the dataset at the last sample spacing when later sequence steps need
/// them.
fn precompute_insolation(
    dataset: &Dataset,
    mode: Insolation,
    spatial: &[usize],
    extent: usize,
) -> Result<ArrayD<f32>> {
    let times = dataset
        .sample_times()
        .ok_or_else(|| BatchError::config("insolation requires sample times"))?;
    let grid = dataset
        .grid()
        .ok_or_else(|| BatchError::config("insolation requires a lat/lon grid"))?;
    if grid.shape() != spatial {
        return Err(BatchError::Config(format!(
            "grid shape {:?} does not match spatial dimensions {:?}",
            grid.shape(),
            spatial
        )));
    }

    let mut times = times.to_vec();
    if extent > times.len() {
        let (prev, last) = match times.as_slice() {
            [.., prev, last] => (*prev, *last),
            _ => {
                return Err(BatchError::config(
                    "at least two sample times are needed to extend insolation",
                ))
            }
        };
        let step = last - prev;
        let missing = extent - times.len();
        times.extend((1..=missing as i32).map(|i| last + step * i));
    }
    insolation(&times, grid, mode.is_daily(), SOLAR_CONSTANT)
}
