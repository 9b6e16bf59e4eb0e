//! Post-processing pipeline: NaN removal, imputation, scaling, reshape.
//!
//! Steps run in a fixed order and each is optional:
//!
//! 1. drop every row with a NaN in the predictors, any target block or any
//!    extra insolation block (`remove_nan`)
//! 2. impute, if the model asks for it (`scale_and_impute`)
//! 3. scale (`scale_and_impute`)
//! 4. reshape rows to the model's layout (`scale_and_impute`)
//!
//! Without `scale_and_impute` the caller receives flat, unscaled rows.

use crate::error::Result;
use crate::model::{Model, ModelCapabilities};
use crate::windowing::{reshape, RawWindows};
use ndarray::{Array2, ArrayD, Axis};

/// Predictor or target tensors of one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorSet {
    /// A single tensor
    Single(ArrayD<f32>),
    /// One tensor per sequence step (targets), or the predictors followed
    /// by the insolation of later sequence steps
    Sequence(Vec<ArrayD<f32>>),
}

impl TensorSet {
    /// All tensors, in order.
    pub fn tensors(&self) -> Vec<&ArrayD<f32>> {
        match self {
            TensorSet::Single(t) => vec![t],
            TensorSet::Sequence(ts) => ts.iter().collect(),
        }
    }

    /// The first (primary) tensor.
    pub fn primary(&self) -> Option<&ArrayD<f32>> {
        match self {
            TensorSet::Single(t) => Some(t),
            TensorSet::Sequence(ts) => ts.first(),
        }
    }

    /// Number of samples (leading axis of the primary tensor).
    pub fn n_samples(&self) -> usize {
        self.primary().map_or(0, |t| t.len_of(Axis(0)))
    }

    /// Number of tensors.
    pub fn len(&self) -> usize {
        match self {
            TensorSet::Single(_) => 1,
            TensorSet::Sequence(ts) => ts.len(),
        }
    }

    /// Whether there are no tensors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unwrap a single tensor.
    pub fn into_single(self) -> Option<ArrayD<f32>> {
        match self {
            TensorSet::Single(t) => Some(t),
            TensorSet::Sequence(_) => None,
        }
    }

    /// Convert into a list of tensors.
    pub fn into_vec(self) -> Vec<ArrayD<f32>> {
        match self {
            TensorSet::Single(t) => vec![t],
            TensorSet::Sequence(ts) => ts,
        }
    }
}

/// One `(predictors, targets)` batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Model inputs
    pub predictors: TensorSet,
    /// Model targets
    pub targets: TensorSet,
}

impl Batch {
    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.predictors.n_samples()
    }

    /// Whether the batch has no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drop rows where either array contains a NaN.
pub fn delete_nan_samples(
    predictors: Array2<f32>,
    targets: Array2<f32>,
) -> (Array2<f32>, Array2<f32>) {
    let rows = rows_without_nan(&[&predictors, &targets]);
    (
        predictors.select(Axis(0), &rows),
        targets.select(Axis(0), &rows),
    )
}

/// Indices of rows with no NaN in any of `arrays` (which share row count).
fn rows_without_nan(arrays: &[&Array2<f32>]) -> Vec<usize> {
    let n = arrays.first().map_or(0, |a| a.nrows());
    (0..n)
        .filter(|&i| arrays.iter().all(|a| a.row(i).iter().all(|v| !v.is_nan())))
        .collect()
}

/// Fixed-order post-processing for one generator.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    caps: ModelCapabilities,
    remove_nan: bool,
    predictor_layout: Vec<usize>,
    target_layout: Vec<usize>,
    sequence: bool,
    insolation: bool,
}

impl PostProcessor {
    /// Create a pipeline.
    ///
    /// Layouts are per-sample shapes (see
    /// [`ShapeCalculator::predictor_layout`](crate::shapes::ShapeCalculator::predictor_layout)).
    pub fn new(
        caps: ModelCapabilities,
        remove_nan: bool,
        predictor_layout: Vec<usize>,
        target_layout: Vec<usize>,
    ) -> Self {
        Self {
            caps,
            remove_nan,
            predictor_layout,
            target_layout,
            sequence: false,
            insolation: false,
        }
    }

    /// Return targets (and, with insolation, predictors) as sequences.
    pub fn with_sequence(mut self, sequence: bool, insolation: bool) -> Self {
        self.sequence = sequence;
        self.insolation = insolation;
        self
    }

    /// Run the pipeline on raw windows.
    pub fn process<M: Model + ?Sized>(
        &self,
        model: &M,
        raw: RawWindows,
        scale_and_impute: bool,
    ) -> Result<Batch> {
        let raw = if self.remove_nan {
            let before = raw.len();
            let kept = self.rows_to_keep(&raw);
            if kept.len() < before {
                log::debug!("dropped {} of {before} samples containing NaN", before - kept.len());
            }
            raw.retain_rows(&kept)
        } else {
            raw
        };

        let RawWindows {
            predictors,
            targets,
            extra_insolation,
        } = raw;
        let rows = predictors.nrows();

        let (predictors, targets) = if scale_and_impute {
            let (predictors, targets) = self.transform(model, predictors, targets)?;
            let predictors = self.shape_rows(predictors, &self.predictor_layout)?;
            let targets = targets
                .into_iter()
                .map(|t| self.shape_rows(t, &self.target_layout))
                .collect::<Result<Vec<_>>>()?;
            (predictors, targets)
        } else {
            (
                predictors.into_dyn(),
                targets.into_iter().map(Array2::into_dyn).collect(),
            )
        };

        let predictors = if self.sequence && self.insolation {
            let mut all = Vec::with_capacity(1 + extra_insolation.len());
            all.push(predictors);
            all.extend(extra_insolation);
            TensorSet::Sequence(all)
        } else {
            TensorSet::Single(predictors)
        };
        let targets = if self.sequence {
            TensorSet::Sequence(targets)
        } else {
            TensorSet::Single(targets.into_iter().next().unwrap_or_else(|| {
                ArrayD::zeros(ndarray::IxDyn(&[rows, 0]))
            }))
        };

        Ok(Batch {
            predictors,
            targets,
        })
    }

    fn rows_to_keep(&self, raw: &RawWindows) -> Vec<usize> {
        let mut arrays: Vec<&Array2<f32>> = vec![&raw.predictors];
        arrays.extend(raw.targets.iter());
        let mut rows = rows_without_nan(&arrays);
        if !raw.extra_insolation.is_empty() {
            rows.retain(|&i| {
                raw.extra_insolation
                    .iter()
                    .all(|b| b.index_axis(Axis(0), i).iter().all(|v| !v.is_nan()))
            });
        }
        rows
    }

    /// Impute then scale. Predictors are transformed once, together with the
    /// first target; later targets are transformed against the same
    /// untransformed predictors.
    fn transform<M: Model + ?Sized>(
        &self,
        model: &M,
        predictors: Array2<f32>,
        targets: Vec<Array2<f32>>,
    ) -> Result<(Array2<f32>, Vec<Array2<f32>>)> {
        let one = |p: Array2<f32>, t: Array2<f32>| -> Result<(Array2<f32>, Array2<f32>)> {
            let (p, t) = if self.caps.impute {
                model.imputer_transform(p, t)?
            } else {
                (p, t)
            };
            model.scaler_transform(p, t)
        };

        let mut targets = targets.into_iter();
        let Some(first) = targets.next() else {
            return Ok((predictors, Vec::new()));
        };
        let mut out = Vec::with_capacity(targets.len() + 1);
        let rest: Vec<_> = targets.collect();
        let scaled = if rest.is_empty() {
            let (p, t) = one(predictors, first)?;
            out.push(t);
            p
        } else {
            let (p, t) = one(predictors.clone(), first)?;
            out.push(t);
            for target in rest {
                let (_, t) = one(predictors.clone(), target)?;
                out.push(t);
            }
            p
        };
        Ok((scaled, out))
    }

    fn shape_rows(&self, rows: Array2<f32>, layout: &[usize]) -> Result<ArrayD<f32>> {
        let mut shape = vec![rows.nrows()];
        shape.extend_from_slice(layout);
        reshape(rows.into_dyn(), &shape)
    }
}
