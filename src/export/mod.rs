//! Batch export to NumPy.
//!
//! Writes one epoch of batches to `.npy` files so they can be consumed
//! from Python without re-running the generator.
//!
//! # Layout
//!
//! ```text
//! <output_dir>/
//!   batch_00000_predictors.npy      single predictor tensor
//!   batch_00000_targets_0.npy       one file per tensor when the batch
//!   batch_00000_targets_1.npy       carries a sequence
//!   ...
//!   metadata.json
//! ```
//!
//! # Example
//!
//! ```ignore
//! use weather_batcher::export::BatchExporter;
//!
//! let summary = BatchExporter::new("out/train").export_epoch(&mut generator)?;
//! println!("{} batches, {} samples", summary.n_batches, summary.n_samples);
//! ```

use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::generator::SeriesGenerator;
use crate::model::Model;
use crate::postprocess::{Batch, TensorSet};
use ndarray_npy::write_npy;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Metadata written next to the exported batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Number of batch files written
    pub n_batches: usize,

    /// Samples across all batches, after NaN removal
    pub n_samples: usize,

    /// Valid window start offsets
    pub n_sample: usize,

    /// Shapes of the first batch's predictor tensors
    pub predictor_shapes: Vec<Vec<usize>>,

    /// Shapes of the first batch's target tensors
    pub target_shapes: Vec<Vec<usize>>,

    /// Whether batches went through imputation, scaling and reshaping
    pub scaled: bool,

    /// Generator configuration
    pub config: GeneratorConfig,

    /// Export timestamp (RFC 3339)
    pub export_timestamp: String,
}

/// What an export wrote.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Number of batches
    pub n_batches: usize,

    /// Samples across all batches
    pub n_samples: usize,

    /// Every `.npy` file written, in order
    pub files: Vec<PathBuf>,

    /// Metadata file
    pub metadata_path: PathBuf,
}

/// NumPy exporter for generator batches.
#[derive(Debug, Clone)]
pub struct BatchExporter {
    output_dir: PathBuf,
    scale_and_impute: bool,
}

impl BatchExporter {
    /// Exporter writing scaled, model-shaped batches into `output_dir`.
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            scale_and_impute: true,
        }
    }

    /// Export flat, unscaled rows instead.
    pub fn unscaled(mut self) -> Self {
        self.scale_and_impute = false;
        self
    }

    /// Output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every batch of the current epoch, in order, plus `metadata.json`.
    pub fn export_epoch<M: Model>(&self, generator: &mut SeriesGenerator<M>) -> Result<ExportSummary> {
        fs::create_dir_all(&self.output_dir)?;

        let batches: Vec<Vec<usize>> = generator
            .epoch_indices()
            .chunks(generator.config().batch_size)
            .map(<[usize]>::to_vec)
            .collect();
        let n_batches = batches.len();
        let mut files = Vec::new();
        let mut n_samples = 0;
        let mut shapes = (Vec::new(), Vec::new());

        for (index, samples) in batches.iter().enumerate() {
            let batch = generator.generate(samples, self.scale_and_impute)?;
            if index == 0 {
                shapes = (shapes_of(&batch.predictors), shapes_of(&batch.targets));
            }
            n_samples += batch.len();
            files.extend(self.export_batch(index, &batch)?);
            log::debug!("exported batch {index} ({} samples)", batch.len());
        }

        let metadata_path = self.export_metadata(&ExportMetadata {
            n_batches,
            n_samples,
            n_sample: generator.n_sample(),
            predictor_shapes: shapes.0,
            target_shapes: shapes.1,
            scaled: self.scale_and_impute,
            config: generator.config().clone(),
            export_timestamp: chrono::Utc::now().to_rfc3339(),
        })?;

        log::info!(
            "exported {n_batches} batches ({n_samples} samples) to {}",
            self.output_dir.display()
        );

        Ok(ExportSummary {
            n_batches,
            n_samples,
            files,
            metadata_path,
        })
    }

    /// Write one batch as `batch_{index:05}_predictors[_k].npy` and
    /// `batch_{index:05}_targets[_k].npy`.
    pub fn export_batch(&self, index: usize, batch: &Batch) -> Result<Vec<PathBuf>> {
        let mut files = self.write_tensors(&format!("batch_{index:05}_predictors"), &batch.predictors)?;
        files.extend(self.write_tensors(&format!("batch_{index:05}_targets"), &batch.targets)?);
        Ok(files)
    }

    fn write_tensors(&self, stem: &str, set: &TensorSet) -> Result<Vec<PathBuf>> {
        let named: Vec<(String, _)> = match set {
            TensorSet::Single(t) => vec![(format!("{stem}.npy"), t)],
            TensorSet::Sequence(ts) => ts
                .iter()
                .enumerate()
                .map(|(k, t)| (format!("{stem}_{k}.npy"), t))
                .collect(),
        };
        let mut paths = Vec::with_capacity(named.len());
        for (name, tensor) in named {
            let path = self.output_dir.join(name);
            write_npy(&path, tensor)?;
            paths.push(path);
        }
        Ok(paths)
    }

    fn export_metadata(&self, metadata: &ExportMetadata) -> Result<PathBuf> {
        let path = self.output_dir.join("metadata.json");
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(file, metadata)?;
        Ok(path)
    }
}

fn shapes_of(set: &TensorSet) -> Vec<Vec<usize>> {
    set.tensors().iter().map(|t| t.shape().to_vec()).collect()
}
