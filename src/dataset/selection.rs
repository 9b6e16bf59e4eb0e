//! Label-based selections over labeled arrays.

use super::{LabeledArray, LEVEL, VARIABLE, VARLEV};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping of dimension name to the labels to keep, in order.
///
/// An empty selection selects everything.
///
/// ```
/// use weather_batcher::dataset::Selection;
///
/// let sel = Selection::new().with("varlev", ["z/500", "t/850"]);
/// assert_eq!(sel.get("varlev").unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection {
    entries: BTreeMap<String, Vec<String>>,
}

impl Selection {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the labels selected along `dim`.
    pub fn with<S: Into<String>>(mut self, dim: &str, labels: impl IntoIterator<Item = S>) -> Self {
        self.entries
            .insert(dim.to_string(), labels.into_iter().map(Into::into).collect());
        self
    }

    /// Default selection for an array: every `varlev` label if the array has
    /// that coordinate, otherwise every `variable` and `level` label present.
    pub fn all_of(array: &LabeledArray) -> Self {
        if let Some(labels) = array.coord(VARLEV) {
            return Self::new().with(VARLEV, labels);
        }
        let mut sel = Self::new();
        for dim in [VARIABLE, LEVEL] {
            if let Some(labels) = array.coord(dim) {
                sel = sel.with(dim, labels);
            }
        }
        sel
    }

    /// Labels selected along `dim`.
    pub fn get(&self, dim: &str) -> Option<&[String]> {
        self.entries.get(dim).map(Vec::as_slice)
    }

    /// Whether nothing is selected explicitly.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(dimension, labels)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(d, l)| (d.as_str(), l.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn test_all_of_prefers_varlev() {
        let data = ArrayD::<f32>::zeros(IxDyn(&[2, 3]));
        let array = LabeledArray::from_array(data, &["sample", "varlev"])
            .unwrap()
            .with_coord("varlev", ["a", "b", "c"])
            .unwrap();
        let sel = Selection::all_of(&array);
        assert_eq!(sel.get("varlev").unwrap(), &["a", "b", "c"]);
        assert!(sel.get("variable").is_none());
    }

    #[test]
    fn test_all_of_variable_level() {
        let data = ArrayD::<f32>::zeros(IxDyn(&[2, 2, 3]));
        let array = LabeledArray::from_array(data, &["sample", "variable", "level"])
            .unwrap()
            .with_coord("variable", ["z", "t"])
            .unwrap()
            .with_coord("level", ["300", "500", "700"])
            .unwrap();
        let sel = Selection::all_of(&array);
        assert_eq!(sel.get("variable").unwrap().len(), 2);
        assert_eq!(sel.get("level").unwrap().len(), 3);
    }

    #[test]
    fn test_empty_without_coords() {
        let data = ArrayD::<f32>::zeros(IxDyn(&[2, 2]));
        let array = LabeledArray::from_array(data, &["sample", "x"]).unwrap();
        assert!(Selection::all_of(&array).is_empty());
    }
}
