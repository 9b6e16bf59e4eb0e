//! Fluent builder for generator configuration.
//!
//! # Quick Start
//!
//! ```ignore
//! use weather_batcher::GeneratorBuilder;
//!
//! let mut generator = GeneratorBuilder::new()
//!     .batch_size(64)
//!     .time_steps(2, 1)
//!     .build(model, dataset)?;
//! ```
//!
//! # Variants
//!
//! | Constructor | Mode | Defaults |
//! |-------------|------|----------|
//! | `new()` | `Series` | required loading, NaN removal |
//! | `paired()` | `Paired` | required loading |
//! | `contiguous()` | `Contiguous` (deprecated) | required loading |
//!
//! # Common Configurations
//!
//! ## Multi-horizon forecasting with insolation
//!
//! ```ignore
//! let generator = GeneratorBuilder::new()
//!     .time_steps(2, 2)
//!     .sequence(4)
//!     .insolation(Insolation::Daily)
//!     .load(LoadMode::Minimal)
//!     .build(model, dataset)?;
//! ```

use crate::config::{GeneratorConfig, Insolation, LoadMode, WindowMode};
use crate::dataset::{Dataset, Selection};
use crate::error::Result;
use crate::generator::SeriesGenerator;
use crate::model::Model;

/// Fluent builder over [`GeneratorConfig`].
#[derive(Debug, Clone, Default)]
pub struct GeneratorBuilder {
    config: GeneratorConfig,
}

impl GeneratorBuilder {
    /// Series generator with default settings:
    /// - batch size 32, no shuffling, NaN removal
    /// - one input and one output time step, interval 1, rank 2
    /// - required loading on the first batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Paired generator (predictors and targets matched by sample).
    pub fn paired() -> Self {
        Self::from_config(GeneratorConfig::paired(GeneratorConfig::default().batch_size))
    }

    /// Deprecated contiguous generator.
    pub fn contiguous() -> Self {
        Self::from_config(GeneratorConfig::contiguous(
            GeneratorConfig::default().batch_size,
            true,
        ))
    }

    /// Start from an existing configuration.
    pub fn from_config(config: GeneratorConfig) -> Self {
        Self { config }
    }

    // =========================================================================
    // Batching
    // =========================================================================

    /// Samples per batch.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Shuffle every epoch, optionally reproducibly.
    pub fn shuffle(mut self, seed: Option<u64>) -> Self {
        self.config.shuffle = true;
        self.config.seed = seed;
        self
    }

    /// Keep samples containing NaN.
    pub fn keep_nan(mut self) -> Self {
        self.config.remove_nan = false;
        self
    }

    // =========================================================================
    // Windows
    // =========================================================================

    /// Input and output window lengths.
    pub fn time_steps(mut self, input: usize, output: usize) -> Self {
        self.config.window.input_time_steps = input;
        self.config.window.output_time_steps = output;
        self
    }

    /// Gap between the end of the input and the start of the output.
    pub fn interval(mut self, interval: usize) -> Self {
        self.config.window.interval = interval;
        self
    }

    /// Number of successive output windows.
    pub fn sequence(mut self, sequence: usize) -> Self {
        self.config.window.sequence = Some(sequence);
        self
    }

    /// Number of spatial dimensions.
    pub fn rank(mut self, rank: usize) -> Self {
        self.config.window.rank = rank;
        self
    }

    // =========================================================================
    // Data
    // =========================================================================

    /// Predictor selection.
    pub fn input_sel(mut self, selection: Selection) -> Self {
        self.config.input_sel = selection;
        self
    }

    /// Target selection.
    pub fn output_sel(mut self, selection: Selection) -> Self {
        self.config.output_sel = selection;
        self
    }

    /// Insolation channel.
    pub fn insolation(mut self, insolation: Insolation) -> Self {
        self.config.insolation = insolation;
        self
    }

    /// Memory loading strategy.
    pub fn load(mut self, load: LoadMode) -> Self {
        self.config.load = load;
        self
    }

    /// Load at construction.
    pub fn force_load(mut self) -> Self {
        self.config.force_load = true;
        self
    }

    // =========================================================================
    // Build
    // =========================================================================

    /// Validate and return the configuration.
    pub fn build_config(self) -> Result<GeneratorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build a generator over `dataset`.
    pub fn build<M: Model>(self, model: M, dataset: Dataset) -> Result<SeriesGenerator<M>> {
        SeriesGenerator::new(model, dataset, self.build_config()?)
    }

    /// Summary of the current configuration.
    pub fn summary(&self) -> String {
        let c = &self.config;
        let w = &c.window;
        let mode = match c.mode {
            WindowMode::Series => "Series",
            WindowMode::Paired => "Paired",
            WindowMode::Contiguous => "Contiguous (deprecated)",
        };
        format!(
            "GeneratorBuilder Summary:\n\
             - Mode: {}\n\
             - Batch: {} (shuffle: {}, remove NaN: {})\n\
             - Window: {} in, {} out, interval {}, sequence {}\n\
             - Rank: {}\n\
             - Insolation: {:?}\n\
             - Loading: {}{}",
            mode,
            c.batch_size,
            c.shuffle,
            c.remove_nan,
            w.input_time_steps,
            w.output_time_steps,
            w.interval,
            w.sequence.map_or_else(|| "none".to_string(), |s| s.to_string()),
            w.rank,
            c.insolation,
            c.load,
            if c.force_load { " (forced)" } else { "" },
        )
    }
}
