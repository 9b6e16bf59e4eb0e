//! Tensor shapes for dense, recurrent and convolutional consumers.
//!
//! All shapes are per sample (the leading batch axis is not included) and
//! are pure functions of the calculator's fields plus an explicit
//! `keep_time_axis` flag.
//!
//! # Shapes
//!
//! With `T` input time steps, per-observation dims `(F..., S...)` where the
//! last `rank` dims `S` are spatial, and `I = 1` if insolation is enabled:
//!
//! | Shape | Time axis kept | Time axis collapsed |
//! |-------|----------------|---------------------|
//! | `shape` | `(T, F..., S...)` | same |
//! | `dense_shape` | `(T, n_features / T)` | `(n_features,)` |
//! | `convolution_shape` | `(T, prod(F) + I, S...)` | `(T * prod(F) + T * I, S...)` |
//! | `insolation_shape` | `(T, 1, S...)` | same |
//!
//! `n_features = T * prod(F) * prod(S) + T * prod(S) * I`. Output shapes use
//! the output time steps and dims and never include insolation.

use crate::error::{BatchError, Result};

/// Shape arithmetic for one generator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeCalculator {
    rank: usize,
    input_time_steps: usize,
    output_time_steps: usize,
    input_dims: Vec<usize>,
    output_dims: Vec<usize>,
    insolation: bool,
}

impl ShapeCalculator {
    /// Create a calculator.
    ///
    /// `input_dims`/`output_dims` are the per-observation dimensions (no
    /// sample or time-step axis); their last `rank` entries are spatial.
    pub fn new(
        rank: usize,
        input_time_steps: usize,
        output_time_steps: usize,
        input_dims: Vec<usize>,
        output_dims: Vec<usize>,
        insolation: bool,
    ) -> Result<Self> {
        if rank == 0 {
            return Err(BatchError::config("rank must be positive"));
        }
        if input_time_steps == 0 || output_time_steps == 0 {
            return Err(BatchError::config("time steps must be positive"));
        }
        for (name, dims) in [("input", &input_dims), ("output", &output_dims)] {
            if dims.len() < rank {
                return Err(BatchError::Config(format!(
                    "{name} observations have {} dimensions, fewer than rank {rank}",
                    dims.len()
                )));
            }
        }
        if input_dims[input_dims.len() - rank..] != output_dims[output_dims.len() - rank..] {
            return Err(BatchError::Config(format!(
                "input spatial dims {:?} differ from output spatial dims {:?}",
                &input_dims[input_dims.len() - rank..],
                &output_dims[output_dims.len() - rank..]
            )));
        }
        Ok(Self {
            rank,
            input_time_steps,
            output_time_steps,
            input_dims,
            output_dims,
            insolation,
        })
    }

    fn ins(&self) -> usize {
        usize::from(self.insolation)
    }

    /// Spatial dimensions.
    pub fn spatial(&self) -> &[usize] {
        &self.input_dims[self.input_dims.len() - self.rank..]
    }

    fn spatial_size(&self) -> usize {
        self.spatial().iter().product()
    }

    /// Whether an insolation channel is added to the inputs.
    pub fn has_insolation(&self) -> bool {
        self.insolation
    }

    /// Number of input time steps.
    pub fn input_time_steps(&self) -> usize {
        self.input_time_steps
    }

    /// Number of output time steps.
    pub fn output_time_steps(&self) -> usize {
        self.output_time_steps
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// `(T, features..., spatial...)`; excludes insolation.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = vec![self.input_time_steps];
        shape.extend_from_slice(&self.input_dims);
        shape
    }

    /// Number of input scalars per sample, including insolation.
    pub fn n_features(&self) -> usize {
        self.shape().iter().product::<usize>()
            + self.spatial_size() * self.input_time_steps * self.ins()
    }

    /// Flattened input shape.
    pub fn dense_shape(&self, keep_time_axis: bool) -> Vec<usize> {
        dense(self.input_time_steps, self.n_features(), keep_time_axis)
    }

    /// Channel-first input shape; includes insolation.
    pub fn convolution_shape(&self, keep_time_axis: bool) -> Vec<usize> {
        let features = &self.input_dims[..self.input_dims.len() - self.rank];
        let channels: usize = features.iter().product();
        let mut shape = if keep_time_axis {
            vec![self.input_time_steps, channels + self.ins()]
        } else {
            vec![self.input_time_steps * channels + self.input_time_steps * self.ins()]
        };
        shape.extend_from_slice(self.spatial());
        shape
    }

    /// Channel-first input shape with the time axis collapsed.
    pub fn shape_2d(&self) -> Vec<usize> {
        self.convolution_shape(false)
    }

    /// `(T, 1, spatial...)` when insolation is enabled.
    pub fn insolation_shape(&self) -> Option<Vec<usize>> {
        self.insolation.then(|| {
            let mut shape = vec![self.input_time_steps, 1];
            shape.extend_from_slice(self.spatial());
            shape
        })
    }

    // ------------------------------------------------------------------
    // Outputs
    // ------------------------------------------------------------------

    /// `(T_out, features..., spatial...)`.
    pub fn output_shape(&self) -> Vec<usize> {
        let mut shape = vec![self.output_time_steps];
        shape.extend_from_slice(&self.output_dims);
        shape
    }

    /// Number of output scalars per sample.
    pub fn output_n_features(&self) -> usize {
        self.output_shape().iter().product()
    }

    /// Flattened output shape.
    pub fn output_dense_shape(&self, keep_time_axis: bool) -> Vec<usize> {
        dense(self.output_time_steps, self.output_n_features(), keep_time_axis)
    }

    /// Channel-first output shape.
    pub fn output_convolution_shape(&self, keep_time_axis: bool) -> Vec<usize> {
        let features = &self.output_dims[..self.output_dims.len() - self.rank];
        let channels: usize = features.iter().product();
        let mut shape = if keep_time_axis {
            vec![self.output_time_steps, channels]
        } else {
            vec![self.output_time_steps * channels]
        };
        shape.extend_from_slice(self.spatial());
        shape
    }

    /// Channel-first output shape with the time axis collapsed.
    pub fn output_shape_2d(&self) -> Vec<usize> {
        self.output_convolution_shape(false)
    }

    /// Per-sample predictor shape a model with the given layout receives.
    pub fn predictor_layout(&self, convolutional: bool, keep_time_axis: bool) -> Vec<usize> {
        if convolutional {
            self.convolution_shape(keep_time_axis)
        } else if keep_time_axis {
            self.dense_shape(true)
        } else {
            vec![self.n_features()]
        }
    }

    /// Per-sample target shape a model with the given layout receives.
    pub fn target_layout(&self, convolutional: bool, keep_time_axis: bool) -> Vec<usize> {
        if convolutional {
            self.output_convolution_shape(keep_time_axis)
        } else if keep_time_axis {
            self.output_dense_shape(true)
        } else {
            vec![self.output_n_features()]
        }
    }
}

fn dense(time_steps: usize, n_features: usize, keep_time_axis: bool) -> Vec<usize> {
    if keep_time_axis {
        vec![time_steps, n_features / time_steps]
    } else {
        vec![n_features]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2 input steps, 3 varlevs on a 4x5 grid, 1 output step with 2 varlevs.
    fn calc(insolation: bool) -> ShapeCalculator {
        ShapeCalculator::new(2, 2, 1, vec![3, 4, 5], vec![2, 4, 5], insolation).unwrap()
    }

    #[test]
    fn test_shape_and_features() {
        let c = calc(false);
        assert_eq!(c.shape(), vec![2, 3, 4, 5]);
        assert_eq!(c.n_features(), 120);
        assert_eq!(calc(true).n_features(), 120 + 2 * 20);
    }

    #[test]
    fn test_dense_shape() {
        assert_eq!(calc(false).dense_shape(false), vec![120]);
        assert_eq!(calc(false).dense_shape(true), vec![2, 60]);
        assert_eq!(calc(true).dense_shape(true), vec![2, 80]);
    }

    #[test]
    fn test_convolution_shape() {
        assert_eq!(calc(false).convolution_shape(true), vec![2, 3, 4, 5]);
        assert_eq!(calc(false).convolution_shape(false), vec![6, 4, 5]);
        assert_eq!(calc(true).convolution_shape(true), vec![2, 4, 4, 5]);
        assert_eq!(calc(true).convolution_shape(false), vec![8, 4, 5]);
    }

    #[test]
    fn test_insolation_adds_one_channel_per_step() {
        let without = calc(false).convolution_shape(true);
        let with = calc(true).convolution_shape(true);
        assert_eq!(with[1], without[1] + 1);
    }

    #[test]
    fn test_shape_2d_is_pure() {
        let c = calc(true);
        let before = c.convolution_shape(true);
        assert_eq!(c.shape_2d(), vec![8, 4, 5]);
        assert_eq!(c.convolution_shape(true), before);
    }

    #[test]
    fn test_output_shapes_ignore_insolation() {
        let c = calc(true);
        assert_eq!(c.output_shape(), vec![1, 2, 4, 5]);
        assert_eq!(c.output_n_features(), 40);
        assert_eq!(c.output_dense_shape(true), vec![1, 40]);
        assert_eq!(c.output_convolution_shape(true), vec![1, 2, 4, 5]);
        assert_eq!(c.output_shape_2d(), vec![2, 4, 5]);
    }

    #[test]
    fn test_insolation_shape() {
        assert_eq!(calc(false).insolation_shape(), None);
        assert_eq!(calc(true).insolation_shape(), Some(vec![2, 1, 4, 5]));
    }

    #[test]
    fn test_layouts() {
        let c = calc(false);
        assert_eq!(c.predictor_layout(false, false), vec![120]);
        assert_eq!(c.predictor_layout(false, true), vec![2, 60]);
        assert_eq!(c.predictor_layout(true, false), vec![6, 4, 5]);
        assert_eq!(c.target_layout(true, true), vec![1, 2, 4, 5]);
    }

    #[test]
    fn test_rejects_bad_rank() {
        assert!(ShapeCalculator::new(0, 1, 1, vec![4], vec![4], false).is_err());
        assert!(ShapeCalculator::new(3, 1, 1, vec![4, 5], vec![4, 5], false).is_err());
    }

    #[test]
    fn test_rejects_spatial_mismatch() {
        assert!(ShapeCalculator::new(2, 1, 1, vec![3, 4, 5], vec![3, 4, 6], false).is_err());
    }
}
