//! Dataset validation.
//!
//! Windowing is offset arithmetic along the sample axis, so it silently
//! produces wrong windows when samples are not contiguous and evenly
//! spaced. These checks catch that, and a few other data problems, before
//! training starts.
//!
//! # Validation Categories
//!
//! 1. **Sample times**: strictly increasing, constant spacing
//! 2. **Missing data**: fraction of NaN predictors (NaN rows are dropped per batch)
//! 3. **Grid**: lat/lon grid shape agrees with the trailing spatial dimensions
//!
//! # Usage
//!
//! ```ignore
//! use weather_batcher::validation::validate_dataset;
//!
//! let result = validate_dataset(&dataset, &ValidationConfig::default())?;
//! if result.has_errors() {
//!     eprintln!("{result}");
//! }
//! ```

use crate::dataset::Dataset;
use crate::error::Result;
use chrono::NaiveDateTime;
use std::fmt;

/// Validation result for a single check.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    /// Check passed
    Valid,
    /// Suspicious but usable
    Warning(String),
    /// Windows built from this data would be wrong
    Error(String),
}

impl ValidationLevel {
    /// Whether the check passed.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationLevel::Valid)
    }

    /// Whether this is a warning.
    pub fn is_warning(&self) -> bool {
        matches!(self, ValidationLevel::Warning(_))
    }

    /// Whether this is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, ValidationLevel::Error(_))
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationLevel::Valid => write!(f, "Valid"),
            ValidationLevel::Warning(msg) => write!(f, "Warning: {msg}"),
            ValidationLevel::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Named check results.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    results: Vec<(String, ValidationLevel)>,
}

impl ValidationResult {
    /// Empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a check.
    pub fn add(&mut self, check: &str, level: ValidationLevel) {
        self.results.push((check.to_string(), level));
    }

    /// Append another result's checks.
    pub fn extend(&mut self, other: ValidationResult) {
        self.results.extend(other.results);
    }

    /// Whether every check passed.
    pub fn is_valid(&self) -> bool {
        self.results.iter().all(|(_, level)| level.is_valid())
    }

    /// Whether any check failed.
    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|(_, level)| level.is_error())
    }

    /// Whether any check warned.
    pub fn has_warnings(&self) -> bool {
        self.results.iter().any(|(_, level)| level.is_warning())
    }

    /// `check: message` for every warning.
    pub fn warnings(&self) -> Vec<String> {
        self.messages(ValidationLevel::is_warning)
    }

    /// `check: message` for every error.
    pub fn errors(&self) -> Vec<String> {
        self.messages(ValidationLevel::is_error)
    }

    fn messages(&self, keep: fn(&ValidationLevel) -> bool) -> Vec<String> {
        self.results
            .iter()
            .filter(|(_, level)| keep(level))
            .map(|(name, level)| match level {
                ValidationLevel::Warning(msg) | ValidationLevel::Error(msg) => format!("{name}: {msg}"),
                ValidationLevel::Valid => name.clone(),
            })
            .collect()
    }

    /// All results.
    pub fn all_results(&self) -> &[(String, ValidationLevel)] {
        &self.results
    }

    /// Number of checks.
    pub fn check_count(&self) -> usize {
        self.results.len()
    }

    /// Number of passed checks.
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|(_, l)| l.is_valid()).count()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Validation: {}/{} checks passed",
            self.passed_count(),
            self.check_count()
        )?;
        for (name, level) in &self.results {
            if !level.is_valid() {
                writeln!(f, "  - {name}: {level}")?;
            }
        }
        Ok(())
    }
}

/// Thresholds for [`validate_dataset`].
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// NaN fraction of predictors above which a warning is raised
    pub max_nan_fraction: f64,

    /// Number of spatial dimensions checked against the grid
    pub rank: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_nan_fraction: 0.05,
            rank: 2,
        }
    }
}

/// Check that sample times are strictly increasing and evenly spaced.
pub fn validate_sample_times(times: &[NaiveDateTime]) -> ValidationResult {
    let mut result = ValidationResult::new();

    if times.len() < 2 {
        result.add(
            "sample_times",
            ValidationLevel::Warning(format!("only {} sample time(s) to validate", times.len())),
        );
        return result;
    }

    match times.windows(2).position(|w| w[1] <= w[0]) {
        Some(i) => result.add(
            "sample_ordering",
            ValidationLevel::Error(format!(
                "sample {} ({}) does not follow sample {} ({})",
                i + 1,
                times[i + 1],
                i,
                times[i]
            )),
        ),
        None => result.add("sample_ordering", ValidationLevel::Valid),
    }

    let step = times[1] - times[0];
    match times.windows(2).position(|w| w[1] - w[0] != step) {
        Some(i) => result.add(
            "sample_spacing",
            ValidationLevel::Error(format!(
                "spacing between samples {i} and {} is {}, expected {}",
                i + 1,
                times[i + 1] - times[i],
                step
            )),
        ),
        None => result.add("sample_spacing", ValidationLevel::Valid),
    }

    result
}

/// Validate sample times, missing data and grid agreement.
///
/// Reads the predictor values once (from storage if not loaded).
pub fn validate_dataset(dataset: &Dataset, config: &ValidationConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    match dataset.sample_times() {
        Some(times) => result.extend(validate_sample_times(times)),
        None => result.add(
            "sample_times",
            ValidationLevel::Warning("no sample times; spacing cannot be checked".to_string()),
        ),
    }

    let values = dataset.predictors.values()?;
    let nan = values.iter().filter(|v| v.is_nan()).count();
    let fraction = if values.is_empty() {
        0.0
    } else {
        nan as f64 / values.len() as f64
    };
    if fraction == 1.0 {
        result.add(
            "predictor_nan",
            ValidationLevel::Error("predictors are entirely NaN".to_string()),
        );
    } else if fraction > config.max_nan_fraction {
        result.add(
            "predictor_nan",
            ValidationLevel::Warning(format!(
                "{:.1}% of predictor values are NaN",
                fraction * 100.0
            )),
        );
    } else {
        result.add("predictor_nan", ValidationLevel::Valid);
    }

    if let Some(grid) = dataset.grid() {
        let shape = dataset.predictors.shape();
        let spatial = &shape[shape.len().saturating_sub(config.rank)..];
        if grid.shape() == spatial {
            result.add("grid_shape", ValidationLevel::Valid);
        } else {
            result.add(
                "grid_shape",
                ValidationLevel::Error(format!(
                    "grid shape {:?} does not match spatial dimensions {:?}",
                    grid.shape(),
                    spatial
                )),
            );
        }
    }

    Ok(result)
}
