//! Labeled multi-dimensional arrays with lazy selection.
//!
//! A [`LabeledArray`] is a *view* over a backing [`Storage`]: every base
//! axis carries an indexer (`All`, `Take` or `Point`), and selections only
//! compose indexers. Nothing is copied until [`LabeledArray::load`],
//! [`LabeledArray::values`] or [`LabeledArray::gather`] is called.
//!
//! # Storage
//!
//! | Storage | Read cost |
//! |---------|-----------|
//! | `Memory` | none (shared `Arc`) |
//! | `Npy` | full file read per access |
//! | `Concat` | parts materialized and concatenated per access |
//!
//! Lazy arrays are correct but slow; [`LabeledArray::load`] replaces the
//! storage with an in-memory copy of the current view.

use crate::error::{BatchError, Result};
use ndarray::{ArrayD, Axis};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::selection::Selection;

/// Backing store of a labeled array.
#[derive(Debug, Clone)]
pub enum Storage {
    /// Materialized data shared between views.
    Memory(Arc<ArrayD<f32>>),

    /// `.npy` file read on every access.
    Npy(Arc<PathBuf>),

    /// Lazy concatenation of other arrays along a base axis.
    Concat {
        /// Arrays to concatenate (all with identical view dims)
        parts: Arc<Vec<LabeledArray>>,
        /// Base axis of the concatenation
        axis: usize,
    },
}

impl Storage {
    fn fetch(&self) -> Result<Arc<ArrayD<f32>>> {
        match self {
            Storage::Memory(array) => Ok(Arc::clone(array)),
            Storage::Npy(path) => {
                let array: ArrayD<f32> = ndarray_npy::read_npy(path.as_path())?;
                Ok(Arc::new(array))
            }
            Storage::Concat { parts, axis } => {
                let values = parts
                    .iter()
                    .map(LabeledArray::values)
                    .collect::<Result<Vec<_>>>()?;
                let views: Vec<_> = values.iter().map(|v| v.view()).collect();
                Ok(Arc::new(ndarray::concatenate(Axis(*axis), &views)?))
            }
        }
    }

    /// Whether reads are served from memory.
    pub fn is_in_memory(&self) -> bool {
        matches!(self, Storage::Memory(_))
    }
}

/// Per-axis index into the base array.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Indexer {
    All,
    Take(Vec<usize>),
    Point(usize),
}

impl Indexer {
    #[inline]
    fn resolve(&self, position: usize) -> usize {
        match self {
            Indexer::All => position,
            Indexer::Take(indices) => indices[position],
            Indexer::Point(index) => *index,
        }
    }

    fn len(&self, base_len: usize) -> Option<usize> {
        match self {
            Indexer::All => Some(base_len),
            Indexer::Take(indices) => Some(indices.len()),
            Indexer::Point(_) => None,
        }
    }
}

/// A lazily-indexed, dimension-named `f32` array.
#[derive(Debug, Clone)]
pub struct LabeledArray {
    base_dims: Vec<String>,
    base_shape: Vec<usize>,
    base_coords: BTreeMap<String, Vec<String>>,
    indexers: Vec<Indexer>,
    storage: Storage,
}

impl LabeledArray {
    /// Wrap an in-memory array, naming its dimensions.
    pub fn from_array(array: ArrayD<f32>, dims: &[&str]) -> Result<Self> {
        let shape = array.shape().to_vec();
        Self::with_storage(Storage::Memory(Arc::new(array)), shape, dims)
    }

    /// Open a `.npy` file lazily.
    ///
    /// The file is read once to validate its shape against `dims`; the data
    /// is then dropped and re-read on demand until [`LabeledArray::load`].
    pub fn open_npy<P: AsRef<Path>>(path: P, dims: &[&str]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let probe: ArrayD<f32> = ndarray_npy::read_npy(&path)?;
        let shape = probe.shape().to_vec();
        drop(probe);
        Self::with_storage(Storage::Npy(Arc::new(path)), shape, dims)
    }

    fn with_storage(storage: Storage, shape: Vec<usize>, dims: &[&str]) -> Result<Self> {
        if dims.len() != shape.len() {
            return Err(BatchError::Config(format!(
                "{} dimension names given for an array of rank {}",
                dims.len(),
                shape.len()
            )));
        }
        for (i, dim) in dims.iter().enumerate() {
            if dims[..i].contains(dim) {
                return Err(BatchError::Config(format!("duplicate dimension '{dim}'")));
            }
        }
        Ok(Self {
            base_dims: dims.iter().map(|d| d.to_string()).collect(),
            indexers: vec![Indexer::All; shape.len()],
            base_shape: shape,
            base_coords: BTreeMap::new(),
            storage,
        })
    }

    /// Attach coordinate labels to an unindexed dimension.
    pub fn with_coord<S: Into<String>>(
        mut self,
        dim: &str,
        labels: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let axis = self.base_axis(dim)?;
        if self.indexers[axis] != Indexer::All {
            return Err(BatchError::Config(format!(
                "coordinates can only be attached to unindexed dimension '{dim}'"
            )));
        }
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.len() != self.base_shape[axis] {
            return Err(BatchError::Config(format!(
                "{} labels given for dimension '{dim}' of length {}",
                labels.len(),
                self.base_shape[axis]
            )));
        }
        self.base_coords.insert(dim.to_string(), labels);
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Dimension names of the view.
    pub fn dims(&self) -> Vec<&str> {
        self.base_dims
            .iter()
            .zip(&self.indexers)
            .filter(|(_, idx)| !matches!(idx, Indexer::Point(_)))
            .map(|(d, _)| d.as_str())
            .collect()
    }

    /// Shape of the view.
    pub fn shape(&self) -> Vec<usize> {
        self.indexers
            .iter()
            .zip(&self.base_shape)
            .filter_map(|(idx, &len)| idx.len(len))
            .collect()
    }

    /// Number of dimensions of the view.
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Whether the view has a dimension called `dim`.
    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims().contains(&dim)
    }

    /// Position of `dim` among the view's dimensions.
    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims().iter().position(|d| *d == dim)
    }

    /// Length of dimension `dim` in the view.
    pub fn len_of(&self, dim: &str) -> Result<usize> {
        let axis = self.base_axis(dim)?;
        self.indexers[axis]
            .len(self.base_shape[axis])
            .ok_or_else(|| BatchError::MissingDimension(dim.to_string()))
    }

    /// Coordinate labels of `dim` in the view, if any were attached.
    pub fn coord(&self, dim: &str) -> Option<Vec<String>> {
        let axis = self.base_axis(dim).ok()?;
        let labels = self.base_coords.get(dim)?;
        match &self.indexers[axis] {
            Indexer::All => Some(labels.clone()),
            Indexer::Take(indices) => Some(indices.iter().map(|&i| labels[i].clone()).collect()),
            Indexer::Point(_) => None,
        }
    }

    /// Whether the view is fully materialized in memory.
    pub fn is_loaded(&self) -> bool {
        self.storage.is_in_memory() && self.indexers.iter().all(|idx| *idx == Indexer::All)
    }

    /// Backing storage.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Whether two arrays share the same in-memory buffer.
    pub fn shares_memory_with(&self, other: &LabeledArray) -> bool {
        match (&self.storage, &other.storage) {
            (Storage::Memory(a), Storage::Memory(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Base axis of a dimension that is still present in the view.
    fn base_axis(&self, dim: &str) -> Result<usize> {
        self.base_dims
            .iter()
            .position(|d| d == dim)
            .filter(|&axis| !matches!(self.indexers[axis], Indexer::Point(_)))
            .ok_or_else(|| BatchError::MissingDimension(dim.to_string()))
    }

    // ------------------------------------------------------------------
    // Selection (lazy)
    // ------------------------------------------------------------------

    /// Label-based selection; each selected dimension keeps the label order
    /// given in `selection`.
    pub fn sel(&self, selection: &Selection) -> Result<Self> {
        let mut out = self.clone();
        for (dim, labels) in selection.iter() {
            let axis = out.base_axis(dim)?;
            let view_labels = out
                .coord(dim)
                .ok_or_else(|| BatchError::MissingDimension(format!("coordinate '{dim}'")))?;
            let indices = labels
                .iter()
                .map(|label| {
                    view_labels
                        .iter()
                        .position(|l| l == label)
                        .map(|p| out.indexers[axis].resolve(p))
                        .ok_or_else(|| BatchError::LabelNotFound {
                            dim: dim.to_string(),
                            label: label.clone(),
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            out.indexers[axis] = Indexer::Take(indices);
        }
        Ok(out)
    }

    /// Integer-range selection along `dim`.
    pub fn isel_range(&self, dim: &str, range: Range<usize>) -> Result<Self> {
        let len = self.len_of(dim)?;
        if range.start > range.end || range.end > len {
            return Err(BatchError::Config(format!(
                "range {}..{} out of bounds for dimension '{dim}' of length {len}",
                range.start, range.end
            )));
        }
        let axis = self.base_axis(dim)?;
        let mut out = self.clone();
        let indices = range.map(|p| self.indexers[axis].resolve(p)).collect();
        out.indexers[axis] = Indexer::Take(indices);
        Ok(out)
    }

    /// Select a single position along `dim`, dropping the dimension.
    /// Negative positions count from the end.
    pub fn isel_point(&self, dim: &str, position: isize) -> Result<Self> {
        let len = self.len_of(dim)?;
        let normalized = if position < 0 {
            len as isize + position
        } else {
            position
        };
        if normalized < 0 || normalized as usize >= len {
            return Err(BatchError::Config(format!(
                "position {position} out of bounds for dimension '{dim}' of length {len}"
            )));
        }
        let axis = self.base_axis(dim)?;
        let mut out = self.clone();
        out.indexers[axis] = Indexer::Point(self.indexers[axis].resolve(normalized as usize));
        Ok(out)
    }

    /// Lazily concatenate arrays along `dim`.
    ///
    /// All parts must share the same view dimensions and agree in length on
    /// every dimension except `dim`. Coordinates are taken from the first part.
    pub fn concat(parts: Vec<LabeledArray>, dim: &str) -> Result<Self> {
        let first = parts
            .first()
            .ok_or_else(|| BatchError::Config("nothing to concatenate".to_string()))?;
        let dims: Vec<String> = first.dims().iter().map(|d| d.to_string()).collect();
        let axis = first
            .axis_of(dim)
            .ok_or_else(|| BatchError::MissingDimension(dim.to_string()))?;
        let mut shape = first.shape();
        for part in &parts[1..] {
            let part_shape = part.shape();
            let same_dims = part.dims().iter().zip(&dims).all(|(a, b)| a == b);
            let same_shape = part_shape
                .iter()
                .zip(&shape)
                .enumerate()
                .all(|(i, (a, b))| i == axis || a == b);
            if !same_dims || part_shape.len() != shape.len() || !same_shape {
                return Err(BatchError::Config(format!(
                    "cannot concatenate arrays of shape {:?} and {:?} along '{dim}'",
                    shape, part_shape
                )));
            }
            shape[axis] += part_shape[axis];
        }

        let mut coords = BTreeMap::new();
        for d in &dims {
            if d == dim {
                continue;
            }
            if let Some(labels) = first.coord(d) {
                coords.insert(d.clone(), labels);
            }
        }

        Ok(Self {
            base_dims: dims,
            indexers: vec![Indexer::All; shape.len()],
            base_shape: shape,
            base_coords: coords,
            storage: Storage::Concat {
                parts: Arc::new(parts),
                axis,
            },
        })
    }

    // ------------------------------------------------------------------
    // Materialization
    // ------------------------------------------------------------------

    /// Materialize the view into memory. No-op if already loaded.
    pub fn load(&mut self) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }
        let values = self.values()?;
        let dims: Vec<String> = self.dims().iter().map(|d| d.to_string()).collect();
        let coords = dims
            .iter()
            .filter_map(|d| self.coord(d).map(|labels| (d.clone(), labels)))
            .collect();
        self.indexers = vec![Indexer::All; dims.len()];
        self.base_shape = values.shape().to_vec();
        self.base_dims = dims;
        self.base_coords = coords;
        self.storage = Storage::Memory(Arc::new(values));
        Ok(())
    }

    /// Read the whole view.
    pub fn values(&self) -> Result<ArrayD<f32>> {
        let base = self.storage.fetch()?;
        Ok(self.apply(&base, None))
    }

    /// Read the view restricted to `positions` along `dim`.
    ///
    /// The result has the view's dimensions, with `dim` of length
    /// `positions.len()` in the requested order.
    pub fn gather(&self, dim: &str, positions: &[usize]) -> Result<ArrayD<f32>> {
        let len = self.len_of(dim)?;
        if let Some(&bad) = positions.iter().find(|&&p| p >= len) {
            return Err(BatchError::Config(format!(
                "position {bad} out of bounds for dimension '{dim}' of length {len}"
            )));
        }
        let axis = self.base_axis(dim)?;
        let base = self.storage.fetch()?;
        Ok(self.apply(&base, Some((axis, positions))))
    }

    fn apply(&self, base: &ArrayD<f32>, along: Option<(usize, &[usize])>) -> ArrayD<f32> {
        let mut out: Option<ArrayD<f32>> = None;
        let mut points = Vec::new();

        for (axis, indexer) in self.indexers.iter().enumerate() {
            let take: Option<Cow<'_, [usize]>> = match (indexer, along) {
                (Indexer::Point(index), _) => {
                    points.push(axis);
                    Some(Cow::Owned(vec![*index]))
                }
                (idx, Some((along_axis, positions))) if along_axis == axis => Some(Cow::Owned(
                    positions.iter().map(|&p| idx.resolve(p)).collect(),
                )),
                (Indexer::All, _) => None,
                (Indexer::Take(indices), _) => Some(Cow::Borrowed(indices.as_slice())),
            };
            if let Some(indices) = take {
                out = Some(match out {
                    Some(current) => current.select(Axis(axis), &indices),
                    None => base.select(Axis(axis), &indices),
                });
            }
        }

        let mut out = out.unwrap_or_else(|| base.clone());
        for &axis in points.iter().rev() {
            out = out.index_axis_move(Axis(axis), 0);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn cube() -> LabeledArray {
        // (sample=4, varlev=3, x=2), value = 100*s + 10*v + x
        let data = Array::from_shape_fn(IxDyn(&[4, 3, 2]), |idx| {
            (100 * idx[0] + 10 * idx[1] + idx[2]) as f32
        });
        LabeledArray::from_array(data, &["sample", "varlev", "x"])
            .unwrap()
            .with_coord("varlev", ["z500", "t850", "tau"])
            .unwrap()
    }

    #[test]
    fn test_dims_and_shape() {
        let a = cube();
        assert_eq!(a.dims(), vec!["sample", "varlev", "x"]);
        assert_eq!(a.shape(), vec![4, 3, 2]);
        assert!(a.is_loaded());
    }

    #[test]
    fn test_rejects_wrong_dim_count() {
        let data = ArrayD::<f32>::zeros(IxDyn(&[2, 2]));
        assert!(LabeledArray::from_array(data, &["sample"]).is_err());
    }

    #[test]
    fn test_sel_preserves_label_order() {
        let a = cube();
        let s = a
            .sel(&Selection::new().with("varlev", ["tau", "z500"]))
            .unwrap();
        assert_eq!(s.shape(), vec![4, 2, 2]);
        assert_eq!(s.coord("varlev").unwrap(), vec!["tau", "z500"]);
        let v = s.values().unwrap();
        assert_eq!(v[[1, 0, 1]], 121.0);
        assert_eq!(v[[1, 1, 1]], 101.0);
        assert!(!s.is_loaded());
    }

    #[test]
    fn test_sel_unknown_label() {
        let a = cube();
        let err = a.sel(&Selection::new().with("varlev", ["q700"])).unwrap_err();
        assert!(matches!(err, BatchError::LabelNotFound { .. }));
    }

    #[test]
    fn test_isel_point_drops_dim() {
        let a = cube();
        let p = a.isel_point("varlev", -1).unwrap();
        assert_eq!(p.dims(), vec!["sample", "x"]);
        let v = p.values().unwrap();
        assert_eq!(v[[3, 1]], 321.0);
    }

    #[test]
    fn test_gather_composes_with_range() {
        let a = cube().isel_range("sample", 1..4).unwrap();
        let g = a.gather("sample", &[2, 0]).unwrap();
        assert_eq!(g.shape(), &[2, 3, 2]);
        assert_eq!(g[[0, 0, 0]], 300.0);
        assert_eq!(g[[1, 2, 1]], 121.0);
    }

    #[test]
    fn test_gather_out_of_bounds() {
        let a = cube();
        assert!(a.gather("sample", &[4]).is_err());
    }

    #[test]
    fn test_load_materializes_view() {
        let mut s = cube()
            .sel(&Selection::new().with("varlev", ["t850"]))
            .unwrap();
        s.load().unwrap();
        assert!(s.is_loaded());
        assert_eq!(s.shape(), vec![4, 1, 2]);
        assert_eq!(s.coord("varlev").unwrap(), vec!["t850"]);
        assert_eq!(s.values().unwrap()[[2, 0, 1]], 211.0);
    }

    #[test]
    fn test_concat_lazy() {
        let a = cube();
        let head = a.isel_range("sample", 0..1).unwrap();
        let tail = a.isel_range("sample", 2..4).unwrap();
        let c = LabeledArray::concat(vec![head, tail], "sample").unwrap();
        assert_eq!(c.shape(), vec![3, 3, 2]);
        assert!(!c.is_loaded());
        let v = c.values().unwrap();
        assert_eq!(v[[0, 0, 0]], 0.0);
        assert_eq!(v[[1, 0, 0]], 200.0);
        assert_eq!(c.coord("varlev").unwrap().len(), 3);
    }

    #[test]
    fn test_concat_shape_mismatch() {
        let a = cube();
        let b = a.sel(&Selection::new().with("varlev", ["z500"])).unwrap();
        assert!(LabeledArray::concat(vec![a, b], "sample").is_err());
    }

    #[test]
    fn test_shared_memory_after_load() {
        let mut a = cube().isel_range("sample", 0..2).unwrap();
        a.load().unwrap();
        let b = a.isel_range("varlev", 0..2).unwrap();
        assert!(a.shares_memory_with(&b));
    }
}
