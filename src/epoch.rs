//! Epoch controller: per-epoch sample ordering and batch slicing.
//!
//! The ordering is the identity `0..n_sample` or, with shuffling, a uniform
//! permutation of it. It is regenerated on construction and at every epoch
//! boundary; batch `i` is the slice `[i * batch_size, (i + 1) * batch_size)`
//! of the current ordering, so the last batch may be short.
//!
//! With a seed, the permutation of epoch `e` is drawn from
//! `StdRng::seed_from_u64(seed + e)` and is therefore reproducible across
//! runs. Without a seed the generator is seeded from OS entropy.

use crate::error::{BatchError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochState {
    /// Ordering fixed for the current epoch.
    Ready,
    /// Ordering being regenerated at an epoch boundary.
    Reshuffling,
}

/// Sample ordering for one generator.
#[derive(Debug, Clone)]
pub struct EpochController {
    n_sample: usize,
    batch_size: usize,
    shuffle: bool,
    seed: Option<u64>,
    epoch: u64,
    state: EpochState,
    indices: Vec<usize>,
}

impl EpochController {
    /// Create a controller and derive the first epoch's ordering.
    pub fn new(n_sample: usize, batch_size: usize, shuffle: bool, seed: Option<u64>) -> Result<Self> {
        if batch_size == 0 {
            return Err(BatchError::config("batch_size must be positive"));
        }
        let mut controller = Self {
            n_sample,
            batch_size,
            shuffle,
            seed,
            epoch: 0,
            state: EpochState::Reshuffling,
            indices: Vec::new(),
        };
        controller.reorder();
        Ok(controller)
    }

    fn reorder(&mut self) {
        self.state = EpochState::Reshuffling;
        self.indices = (0..self.n_sample).collect();
        if self.shuffle {
            let mut rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(self.epoch)),
                None => StdRng::from_entropy(),
            };
            self.indices.shuffle(&mut rng);
        }
        log::debug!(
            "epoch {}: ordered {} samples (shuffle={})",
            self.epoch,
            self.n_sample,
            self.shuffle
        );
        self.state = EpochState::Ready;
    }

    /// Advance to the next epoch and regenerate the ordering.
    pub fn on_epoch_end(&mut self) {
        self.epoch += 1;
        self.reorder();
    }

    /// Number of batches per epoch: `ceil(n_sample / batch_size)`.
    pub fn len(&self) -> usize {
        self.n_sample.div_ceil(self.batch_size)
    }

    /// Whether an epoch has no batches.
    pub fn is_empty(&self) -> bool {
        self.n_sample == 0
    }

    /// Sample offsets of batch `index`.
    ///
    /// A negative index counts from the end once (`-1` is the last batch);
    /// `index >= len()` or `index < -len()` is out of range.
    pub fn batch_indices(&self, index: isize) -> Result<&[usize]> {
        let len = self.len();
        let normalized = if index < 0 {
            index + len as isize
        } else {
            index
        };
        if normalized < 0 || normalized as usize >= len {
            return Err(BatchError::IndexOutOfRange { index, len });
        }
        let start = normalized as usize * self.batch_size;
        let end = (start + self.batch_size).min(self.n_sample);
        Ok(&self.indices[start..end])
    }

    /// Current ordering of all sample offsets.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of valid sample offsets.
    pub fn n_sample(&self) -> usize {
        self.n_sample
    }

    /// Samples per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Zero-based epoch counter.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current state.
    pub fn state(&self) -> EpochState {
        self.state
    }
}
