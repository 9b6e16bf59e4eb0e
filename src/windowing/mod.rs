//! Windowing engine.
//!
//! Turns a set of sample start offsets into raw (unscaled, flattened)
//! predictor and target rows. For an offset `s`:
//!
//! | Block | Samples |
//! |-------|---------|
//! | predictors | `s + n` for `n in 0..T_in` |
//! | insolation block `j` | `s + T_in * j + n` for `n in 0..T_in` |
//! | target window `j` | `s + T_in + interval - 1 + T_out * j + n` for `n in 0..T_out` |
//!
//! `j` ranges over the sequence steps (just `0` outside sequence mode).
//! The first insolation block is merged into the predictors as one extra
//! channel per input time step; later blocks are returned separately.
//!
//! In paired mode there is no windowing: offset `s` reads sample `s` of the
//! predictor and target arrays directly.

pub mod loading;

pub use loading::{LoadOutcome, LoadState, Views};

use crate::config::{WindowConfig, WindowMode};
use crate::dataset::{LabeledArray, SAMPLE};
use crate::error::{BatchError, Result};
use ndarray::{Array2, ArrayD, Axis, Ix2, IxDyn};

/// Raw rows for one request, before NaN removal, scaling and reshaping.
#[derive(Debug, Clone)]
pub struct RawWindows {
    /// `(k, n_features)` predictor rows, insolation included
    pub predictors: Array2<f32>,
    /// One `(k, output_n_features)` block per target window
    pub targets: Vec<Array2<f32>>,
    /// Insolation blocks of sequence steps `1..`, each `(k, T_in, 1, spatial...)`
    pub extra_insolation: Vec<ArrayD<f32>>,
}

impl RawWindows {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.predictors.nrows()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.predictors.nrows() == 0
    }

    /// Keep only `rows`, in order, across every block.
    pub fn retain_rows(self, rows: &[usize]) -> Self {
        Self {
            predictors: self.predictors.select(Axis(0), rows),
            targets: self
                .targets
                .iter()
                .map(|t| t.select(Axis(0), rows))
                .collect(),
            extra_insolation: self
                .extra_insolation
                .iter()
                .map(|b| b.select(Axis(0), rows))
                .collect(),
        }
    }
}

/// Offset arithmetic and window assembly for one generator.
#[derive(Debug, Clone)]
pub struct WindowEngine {
    mode: WindowMode,
    window: WindowConfig,
    n_sample: usize,
}

impl WindowEngine {
    /// Create an engine for a source with `total` samples.
    ///
    /// Fails when the windows do not fit in the source.
    pub fn new(mode: WindowMode, window: WindowConfig, total: usize) -> Result<Self> {
        window.validate()?;
        let n_sample = match mode {
            WindowMode::Paired => total,
            WindowMode::Series | WindowMode::Contiguous => {
                window.n_sample(total).ok_or_else(|| {
                    BatchError::Config(format!(
                        "windows of {} input and {}x{} output steps with interval {} \
                         do not fit in {total} samples",
                        window.input_time_steps,
                        window.n_outputs(),
                        window.output_time_steps,
                        window.interval
                    ))
                })?
            }
        };
        Ok(Self {
            mode,
            window,
            n_sample,
        })
    }

    /// Number of valid start offsets.
    pub fn n_sample(&self) -> usize {
        self.n_sample
    }

    /// Effective window geometry.
    pub fn window(&self) -> &WindowConfig {
        &self.window
    }

    /// Number of insolation samples needed to serve every offset.
    pub fn insolation_extent(&self) -> usize {
        match self.n_sample {
            0 => 0,
            n => n - 1 + self.window.input_time_steps * self.window.n_outputs(),
        }
    }

    /// Expand an empty request to all offsets and bounds-check the rest.
    pub fn resolve(&self, samples: &[usize]) -> Result<Vec<usize>> {
        if samples.is_empty() {
            return Ok((0..self.n_sample).collect());
        }
        if let Some(&sample) = samples.iter().find(|&&s| s >= self.n_sample) {
            return Err(BatchError::SampleOutOfRange {
                sample,
                n_sample: self.n_sample,
            });
        }
        Ok(samples.to_vec())
    }

    /// Assemble raw windows for already-resolved offsets.
    pub fn assemble(
        &self,
        samples: &[usize],
        views: &Views,
        insolation: Option<&ArrayD<f32>>,
    ) -> Result<RawWindows> {
        let k = samples.len();
        if self.mode == WindowMode::Paired {
            return Ok(RawWindows {
                predictors: flatten_rows(views.input.gather(SAMPLE, samples)?, k)?,
                targets: vec![flatten_rows(views.output.gather(SAMPLE, samples)?, k)?],
                extra_insolation: Vec::new(),
            });
        }

        let w = &self.window;
        let predictors = window_of(&views.input, samples, 0, w.input_time_steps)?;

        let (predictors, extra_insolation) = match insolation {
            Some(sol) => {
                let mut blocks = (0..w.n_outputs())
                    .map(|j| insolation_block(sol, samples, w.input_time_steps * j, w.input_time_steps))
                    .collect::<Result<Vec<_>>>()?;
                let first = blocks.remove(0);
                (merge_channel(predictors, &first, w.rank)?, blocks)
            }
            None => (predictors, Vec::new()),
        };

        let targets = (0..w.n_outputs())
            .map(|j| {
                let start = w.input_time_steps + w.interval - 1 + w.output_time_steps * j;
                flatten_rows(window_of(&views.output, samples, start, w.output_time_steps)?, k)
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "assembled {k} windows: predictors {:?}, {} target block(s)",
            predictors.shape(),
            targets.len()
        );

        Ok(RawWindows {
            predictors: flatten_rows(predictors, k)?,
            targets,
            extra_insolation,
        })
    }
}

/// `(k, steps, obs...)` with element `[i, n]` read from sample `samples[i] + start + n`.
fn window_of(
    view: &LabeledArray,
    samples: &[usize],
    start: usize,
    steps: usize,
) -> Result<ArrayD<f32>> {
    let positions: Vec<usize> = samples
        .iter()
        .flat_map(|&s| (0..steps).map(move |n| s + start + n))
        .collect();
    let gathered = view.gather(SAMPLE, &positions)?;
    let mut shape = vec![samples.len(), steps];
    shape.extend_from_slice(&gathered.shape()[1..]);
    reshape(gathered, &shape)
}

/// `(k, steps, 1, spatial...)` insolation block.
fn insolation_block(
    sol: &ArrayD<f32>,
    samples: &[usize],
    start: usize,
    steps: usize,
) -> Result<ArrayD<f32>> {
    let positions: Vec<usize> = samples
        .iter()
        .flat_map(|&s| (0..steps).map(move |n| s + start + n))
        .collect();
    if let Some(&bad) = positions.iter().find(|&&p| p >= sol.len_of(Axis(0))) {
        return Err(BatchError::SampleOutOfRange {
            sample: bad,
            n_sample: sol.len_of(Axis(0)),
        });
    }
    let gathered = sol.select(Axis(0), &positions);
    let mut shape = vec![samples.len(), steps, 1];
    shape.extend_from_slice(&gathered.shape()[1..]);
    reshape(gathered, &shape)
}

/// Append the insolation block as the last channel of every time step.
fn merge_channel(predictors: ArrayD<f32>, block: &ArrayD<f32>, rank: usize) -> Result<ArrayD<f32>> {
    let shape = predictors.shape().to_vec();
    let spatial = &shape[shape.len() - rank..];
    let channels: usize = shape[2..shape.len() - rank].iter().product();
    let mut conv = vec![shape[0], shape[1], channels];
    conv.extend_from_slice(spatial);
    let predictors = reshape(predictors, &conv)?;
    Ok(ndarray::concatenate(Axis(2), &[predictors.view(), block.view()])?)
}

fn flatten_rows(array: ArrayD<f32>, rows: usize) -> Result<Array2<f32>> {
    let cols = if rows == 0 {
        array.shape()[1..].iter().product()
    } else {
        array.len() / rows
    };
    Ok(reshape(array, &[rows, cols])?.into_dimensionality::<Ix2>()?)
}

/// Row-major reshape, copying only when the input is not in standard layout.
pub(crate) fn reshape(array: ArrayD<f32>, shape: &[usize]) -> Result<ArrayD<f32>> {
    let array = if array.is_standard_layout() {
        array
    } else {
        array.as_standard_layout().into_owned()
    };
    Ok(array.into_shape_with_order(IxDyn(shape))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{LabeledArray, Selection};
    use ndarray::Array;

    /// (sample=10, varlev=2, lat=2, lon=3), value = 1000*s + 100*v + 10*y + x
    fn series() -> LabeledArray {
        let data = Array::from_shape_fn(IxDyn(&[10, 2, 2, 3]), |i| {
            (1000 * i[0] + 100 * i[1] + 10 * i[2] + i[3]) as f32
        });
        LabeledArray::from_array(data, &["sample", "varlev", "lat", "lon"])
            .unwrap()
            .with_coord("varlev", ["z", "t"])
            .unwrap()
    }

    fn views(output: &[&str]) -> Views {
        let base = series();
        let input = base.clone();
        let output = base
            .sel(&Selection::new().with("varlev", output.iter().copied()))
            .unwrap();
        Views {
            base,
            input,
            output,
        }
    }

    fn window(t_in: usize, t_out: usize, interval: usize, sequence: Option<usize>) -> WindowConfig {
        WindowConfig {
            rank: 2,
            input_time_steps: t_in,
            output_time_steps: t_out,
            interval,
            sequence,
        }
    }

    #[test]
    fn test_n_sample() {
        let e = WindowEngine::new(WindowMode::Series, window(2, 1, 1, None), 100).unwrap();
        assert_eq!(e.n_sample(), 98);
        let e = WindowEngine::new(WindowMode::Series, window(2, 1, 1, Some(3)), 100).unwrap();
        assert_eq!(e.n_sample(), 96);
        let e = WindowEngine::new(WindowMode::Paired, window(2, 1, 1, None), 100).unwrap();
        assert_eq!(e.n_sample(), 100);
    }

    #[test]
    fn test_window_too_long() {
        let err = WindowEngine::new(WindowMode::Series, window(8, 4, 1, None), 10).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_resolve() {
        let e = WindowEngine::new(WindowMode::Series, window(2, 1, 1, None), 10).unwrap();
        assert_eq!(e.resolve(&[]).unwrap(), (0..8).collect::<Vec<_>>());
        assert!(matches!(
            e.resolve(&[3, 8]),
            Err(BatchError::SampleOutOfRange { sample: 8, n_sample: 8 })
        ));
    }

    #[test]
    fn test_predictor_and_target_offsets() {
        let e = WindowEngine::new(WindowMode::Series, window(2, 1, 2, None), 10).unwrap();
        let raw = e.assemble(&[0, 3], &views(&["t"]), None).unwrap();
        assert_eq!(raw.predictors.shape(), &[2, 24]);
        // predictors: samples s, s+1
        assert_eq!(raw.predictors[[1, 0]], 3000.0);
        assert_eq!(raw.predictors[[1, 12]], 4000.0);
        // target: sample s + 2 + 2 - 1, varlev t only
        assert_eq!(raw.targets.len(), 1);
        assert_eq!(raw.targets[0].shape(), &[2, 6]);
        assert_eq!(raw.targets[0][[0, 0]], 3100.0);
        assert_eq!(raw.targets[0][[1, 5]], 6112.0);
    }

    #[test]
    fn test_sequence_targets_advance() {
        let e = WindowEngine::new(WindowMode::Series, window(2, 1, 1, Some(3)), 10).unwrap();
        let raw = e.assemble(&[1], &views(&["z"]), None).unwrap();
        let starts: Vec<f32> = raw.targets.iter().map(|t| t[[0, 0]]).collect();
        assert_eq!(starts, vec![3000.0, 4000.0, 5000.0]);
        assert!(raw.extra_insolation.is_empty());
    }

    #[test]
    fn test_insolation_merged_per_time_step() {
        let sol = Array::from_shape_fn(IxDyn(&[10, 2, 3]), |i| -(i[0] as f32) - 0.5);
        let e = WindowEngine::new(WindowMode::Series, window(2, 1, 1, None), 10).unwrap();
        let raw = e.assemble(&[4], &views(&["z"]), Some(&sol)).unwrap();
        // (T=2, C=2+1, 2x3) flattened
        assert_eq!(raw.predictors.shape(), &[1, 36]);
        let p = reshape(raw.predictors.into_dyn(), &[1, 2, 3, 2, 3]).unwrap();
        assert_eq!(p[[0, 0, 0, 0, 0]], 4000.0);
        assert_eq!(p[[0, 0, 2, 0, 0]], -4.5);
        assert_eq!(p[[0, 1, 1, 1, 2]], 5112.0);
        assert_eq!(p[[0, 1, 2, 1, 2]], -5.5);
    }

    #[test]
    fn test_sequence_insolation_blocks() {
        let sol = Array::from_shape_fn(IxDyn(&[12, 2, 3]), |i| i[0] as f32);
        let e = WindowEngine::new(WindowMode::Series, window(2, 1, 1, Some(2)), 10).unwrap();
        assert_eq!(e.insolation_extent(), e.n_sample() - 1 + 4);
        let raw = e.assemble(&[0, 1], &views(&["z"]), Some(&sol)).unwrap();
        assert_eq!(raw.extra_insolation.len(), 1);
        let block = &raw.extra_insolation[0];
        assert_eq!(block.shape(), &[2, 2, 1, 2, 3]);
        assert_eq!(block[[0, 0, 0, 0, 0]], 2.0);
        assert_eq!(block[[1, 1, 0, 0, 0]], 4.0);
    }

    #[test]
    fn test_paired_reads_directly() {
        let e = WindowEngine::new(WindowMode::Paired, window(1, 1, 1, None), 10).unwrap();
        let raw = e.assemble(&[7, 2], &views(&["t"]), None).unwrap();
        assert_eq!(raw.predictors.shape(), &[2, 12]);
        assert_eq!(raw.predictors[[0, 0]], 7000.0);
        assert_eq!(raw.targets[0][[1, 0]], 2100.0);
    }

    #[test]
    fn test_retain_rows() {
        let e = WindowEngine::new(WindowMode::Series, window(1, 1, 1, None), 10).unwrap();
        let raw = e.assemble(&[0, 1, 2], &views(&["z"]), None).unwrap();
        let kept = raw.retain_rows(&[2, 0]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.predictors[[0, 0]], 2000.0);
        assert_eq!(kept.targets[0][[1, 0]], 1000.0);
    }
}
