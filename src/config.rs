//! Generator configuration management.
//!
//! This module provides the configuration for every generator variant, with
//! serialization support so that a training run's batching can be reproduced
//! exactly.
//!
//! # Features
//!
//! - **Unified Configuration**: one struct for all three generator variants
//! - **Closed enumerations**: loading strategy and insolation mode are enums,
//!   parsed from their string spellings with [`std::str::FromStr`]
//! - **Serialization**: save/load configurations to TOML or JSON
//! - **Validation**: configurations are checked before a generator is built
//!
//! # Example
//!
//! ```ignore
//! use weather_batcher::config::{GeneratorConfig, Insolation, LoadMode};
//!
//! let config = GeneratorConfig::default()
//!     .with_time_steps(2, 1)
//!     .with_insolation(Insolation::Daily)
//!     .with_load(LoadMode::Minimal);
//!
//! config.save_toml("batching.toml")?;
//! let loaded = GeneratorConfig::load_toml("batching.toml")?;
//! ```

use crate::dataset::Selection;
use crate::error::{BatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// How windows are cut from the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// Sliding input/output windows over one continuous series (full-featured).
    #[default]
    Series,

    /// Predictors and targets are separate arrays matched sample-for-sample.
    Paired,

    /// Deprecated: a continuous series rebuilt from a `time_step`-encoded
    /// array, with input and output windows as long as the `time_step` axis.
    Contiguous,
}

/// Memory loading strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Never materialize; every batch reads from the backing storage.
    Lazy,

    /// Materialize the entire dataset.
    Full,

    /// Materialize the input and output selections separately.
    #[default]
    Required,

    /// Materialize one deduplicated copy shared by input and output.
    Minimal,
}

impl LoadMode {
    /// Whether any eager materialization happens.
    pub fn is_eager(&self) -> bool {
        !matches!(self, LoadMode::Lazy)
    }
}

impl From<bool> for LoadMode {
    fn from(load: bool) -> Self {
        if load {
            LoadMode::Required
        } else {
            LoadMode::Lazy
        }
    }
}

impl FromStr for LoadMode {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(LoadMode::Full),
            "required" | "true" => Ok(LoadMode::Required),
            "minimal" => Ok(LoadMode::Minimal),
            "" | "false" | "none" | "lazy" | "0" => Ok(LoadMode::Lazy),
            other => Err(BatchError::Config(format!(
                "'load' must be one of 'full', 'required', or 'minimal', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadMode::Lazy => "lazy",
            LoadMode::Full => "full",
            LoadMode::Required => "required",
            LoadMode::Minimal => "minimal",
        };
        f.write_str(name)
    }
}

/// Solar insolation input channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Insolation {
    /// No insolation channel.
    #[default]
    Disabled,

    /// Instantaneous insolation at each sample time.
    Hourly,

    /// Daily maximum insolation, without the diurnal cycle.
    Daily,
}

impl Insolation {
    /// Whether a channel is added.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Insolation::Disabled)
    }

    /// Whether the daily maximum is used.
    pub fn is_daily(&self) -> bool {
        matches!(self, Insolation::Daily)
    }
}

impl From<bool> for Insolation {
    fn from(enabled: bool) -> Self {
        if enabled {
            Insolation::Hourly
        } else {
            Insolation::Disabled
        }
    }
}

impl FromStr for Insolation {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" | "true" | "yes" | "y" | "t" | "1" => Ok(Insolation::Hourly),
            "daily" => Ok(Insolation::Daily),
            "false" | "no" | "n" | "f" | "0" | "disabled" => Ok(Insolation::Disabled),
            other => Err(BatchError::Config(format!(
                "'add_insolation' must be a boolean, 'hourly' or 'daily', got '{other}'"
            ))),
        }
    }
}

/// Window geometry along the sample axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Number of spatial dimensions (e.g. 2 for lat/lon grids)
    pub rank: usize,

    /// Consecutive samples stacked into one input window
    pub input_time_steps: usize,

    /// Consecutive samples stacked into one output window
    pub output_time_steps: usize,

    /// Offset between the end of the input window and the start of the
    /// output window; 1 means the output starts right after the input
    pub interval: usize,

    /// Number of successive output windows (sequence mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<usize>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            rank: 2,
            input_time_steps: 1,
            output_time_steps: 1,
            interval: 1,
            sequence: None,
        }
    }
}

impl WindowConfig {
    /// Validate the window geometry.
    pub fn validate(&self) -> Result<()> {
        if self.rank == 0 {
            return Err(BatchError::config("rank must be positive"));
        }
        if self.input_time_steps == 0 {
            return Err(BatchError::config("input_time_steps must be positive"));
        }
        if self.output_time_steps == 0 {
            return Err(BatchError::config("output_time_steps must be positive"));
        }
        if self.interval == 0 {
            return Err(BatchError::config("interval must be positive"));
        }
        if self.sequence == Some(0) {
            return Err(BatchError::config("sequence must be positive when given"));
        }
        Ok(())
    }

    /// Number of output windows (1 outside sequence mode).
    pub fn n_outputs(&self) -> usize {
        self.sequence.unwrap_or(1)
    }

    /// Number of valid window start offsets in a series of `total` samples,
    /// or `None` when the formula goes negative.
    pub fn n_sample(&self, total: usize) -> Option<usize> {
        let used = self.input_time_steps + self.output_time_steps * self.n_outputs() + self.interval;
        (total + 2).checked_sub(used)
    }
}

/// Unified generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Window cutting mode
    #[serde(default)]
    pub mode: WindowMode,

    /// Samples per batch
    pub batch_size: usize,

    /// Shuffle sample order every epoch
    pub shuffle: bool,

    /// Seed for reproducible shuffling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Drop samples containing NaN
    pub remove_nan: bool,

    /// Insolation channel
    #[serde(default)]
    pub insolation: Insolation,

    /// Memory loading strategy
    #[serde(default)]
    pub load: LoadMode,

    /// Load at construction instead of on the first batch
    #[serde(default)]
    pub force_load: bool,

    /// Window geometry
    pub window: WindowConfig,

    /// Input variable selection (default: everything)
    #[serde(default, skip_serializing_if = "Selection::is_empty")]
    pub input_sel: Selection,

    /// Output variable selection (default: everything)
    #[serde(default, skip_serializing_if = "Selection::is_empty")]
    pub output_sel: Selection,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mode: WindowMode::Series,
            batch_size: 32,
            shuffle: false,
            seed: None,
            remove_nan: true,
            window: WindowConfig::default(),
            input_sel: Selection::default(),
            output_sel: Selection::default(),
            insolation: Insolation::Disabled,
            load: LoadMode::Required,
            force_load: false,
        }
    }
}

impl GeneratorConfig {
    /// Create a series configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for predictors and targets matched by sample.
    pub fn paired(batch_size: usize) -> Self {
        Self {
            mode: WindowMode::Paired,
            batch_size,
            ..Self::default()
        }
    }

    /// Configuration for the deprecated contiguous variant.
    pub fn contiguous(batch_size: usize, load: bool) -> Self {
        Self {
            mode: WindowMode::Contiguous,
            batch_size,
            load: LoadMode::from(load),
            force_load: load,
            ..Self::default()
        }
    }

    /// Set samples per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable shuffling, optionally seeded.
    pub fn with_shuffle(mut self, shuffle: bool, seed: Option<u64>) -> Self {
        self.shuffle = shuffle;
        self.seed = seed;
        self
    }

    /// Enable or disable NaN removal.
    pub fn with_remove_nan(mut self, remove_nan: bool) -> Self {
        self.remove_nan = remove_nan;
        self
    }

    /// Set input and output window lengths.
    pub fn with_time_steps(mut self, input: usize, output: usize) -> Self {
        self.window.input_time_steps = input;
        self.window.output_time_steps = output;
        self
    }

    /// Set the input/output gap.
    pub fn with_interval(mut self, interval: usize) -> Self {
        self.window.interval = interval;
        self
    }

    /// Enable sequence mode.
    pub fn with_sequence(mut self, sequence: usize) -> Self {
        self.window.sequence = Some(sequence);
        self
    }

    /// Set the number of spatial dimensions.
    pub fn with_rank(mut self, rank: usize) -> Self {
        self.window.rank = rank;
        self
    }

    /// Set input and output selections.
    pub fn with_selections(mut self, input_sel: Selection, output_sel: Selection) -> Self {
        self.input_sel = input_sel;
        self.output_sel = output_sel;
        self
    }

    /// Set the insolation channel.
    pub fn with_insolation(mut self, insolation: Insolation) -> Self {
        self.insolation = insolation;
        self
    }

    /// Set the loading strategy.
    pub fn with_load(mut self, load: LoadMode) -> Self {
        self.load = load;
        self
    }

    /// Load at construction.
    pub fn with_force_load(mut self, force_load: bool) -> Self {
        self.force_load = force_load;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(BatchError::config("batch_size must be positive"));
        }
        self.window.validate()?;

        if self.mode != WindowMode::Series {
            if self.insolation.is_enabled() {
                return Err(BatchError::Config(format!(
                    "insolation is only available in series mode, not {:?}",
                    self.mode
                )));
            }
            if self.window.sequence.is_some() {
                return Err(BatchError::Config(format!(
                    "sequence is only available in series mode, not {:?}",
                    self.mode
                )));
            }
            if self.window.interval != 1 {
                return Err(BatchError::Config(format!(
                    "{:?} mode requires interval = 1",
                    self.mode
                )));
            }
            if self.load == LoadMode::Minimal {
                return Err(BatchError::Config(format!(
                    "minimal loading is only available in series mode, not {:?}",
                    self.mode
                )));
            }
        }
        Ok(())
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    /// Load and validate configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: GeneratorConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate configuration from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: GeneratorConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_is_valid() {
        assert!(GeneratorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_parameters() {
        assert!(GeneratorConfig::new().with_batch_size(0).validate().is_err());
        assert!(GeneratorConfig::new().with_time_steps(0, 1).validate().is_err());
        assert!(GeneratorConfig::new().with_time_steps(1, 0).validate().is_err());
        assert!(GeneratorConfig::new().with_interval(0).validate().is_err());
        assert!(GeneratorConfig::new().with_sequence(0).validate().is_err());
        assert!(GeneratorConfig::new().with_rank(0).validate().is_err());
    }

    #[test]
    fn test_restricted_modes() {
        let paired = GeneratorConfig::paired(16);
        assert!(paired.validate().is_ok());
        assert_eq!(paired.load, LoadMode::Required);
        assert!(paired
            .clone()
            .with_insolation(Insolation::Hourly)
            .validate()
            .is_err());
        assert!(paired.clone().with_sequence(2).validate().is_err());
        assert!(paired.clone().with_interval(2).validate().is_err());
        assert!(GeneratorConfig::contiguous(16, true)
            .with_load(LoadMode::Minimal)
            .validate()
            .is_err());
    }

    #[test]
    fn test_n_sample_formula() {
        let window = WindowConfig {
            rank: 2,
            input_time_steps: 2,
            output_time_steps: 1,
            interval: 1,
            sequence: None,
        };
        assert_eq!(window.n_sample(100), Some(98));

        let seq = WindowConfig {
            sequence: Some(3),
            ..window.clone()
        };
        assert_eq!(seq.n_sample(100), Some(96));
        assert_eq!(window.n_sample(1), None);
    }

    #[test]
    fn test_load_mode_parsing() {
        assert_eq!("full".parse::<LoadMode>().unwrap(), LoadMode::Full);
        assert_eq!("Minimal".parse::<LoadMode>().unwrap(), LoadMode::Minimal);
        assert_eq!("true".parse::<LoadMode>().unwrap(), LoadMode::Required);
        assert_eq!("".parse::<LoadMode>().unwrap(), LoadMode::Lazy);
        assert!("everything".parse::<LoadMode>().is_err());
        assert_eq!(LoadMode::from(false), LoadMode::Lazy);
    }

    #[test]
    fn test_insolation_parsing() {
        assert_eq!("daily".parse::<Insolation>().unwrap(), Insolation::Daily);
        assert_eq!("hourly".parse::<Insolation>().unwrap(), Insolation::Hourly);
        assert_eq!("True".parse::<Insolation>().unwrap(), Insolation::Hourly);
        assert_eq!("no".parse::<Insolation>().unwrap(), Insolation::Disabled);
        assert!("weekly".parse::<Insolation>().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = GeneratorConfig::new()
            .with_time_steps(2, 2)
            .with_sequence(3)
            .with_insolation(Insolation::Daily)
            .with_selections(
                Selection::new().with("varlev", ["z/500", "t/850"]),
                Selection::new().with("varlev", ["z/500"]),
            );
        config.save_toml(&path).unwrap();
        let loaded = GeneratorConfig::load_toml(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_json_load_validates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = GeneratorConfig::new().with_batch_size(0);
        config.save_json(&path).unwrap();
        assert!(GeneratorConfig::load_json(&path).is_err());
    }
}
