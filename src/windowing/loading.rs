//! Memory loading strategies.
//!
//! Materialization happens at most once per generator, either at
//! construction (`force_load`) or on the first batch request:
//!
//! ```text
//! Unloaded ──► Loading ──► Loaded(outcome)
//!
//! Degraded            (lazy mode: never loaded, every batch reads storage)
//! ```
//!
//! | Mode | Materialized | Outcome |
//! |------|--------------|---------|
//! | `Full` | whole dataset, then both views | `Full` |
//! | `Required` | input and output views separately | `Required` |
//! | `Minimal` | one deduplicated `varlev` view shared by input and output | `Minimal` |
//! | `Minimal` (both sides add variables) | base array, then both views | `MinimalFallback` |

use crate::config::LoadMode;
use crate::dataset::{Dataset, LabeledArray, Selection, VARLEV};
use crate::error::{BatchError, Result};
use std::fmt;

/// How a load completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Entire dataset materialized
    Full,
    /// Input and output views materialized separately
    Required,
    /// One shared buffer serves both views
    Minimal,
    /// Minimal loading was not possible; both views were materialized
    MinimalFallback,
}

/// Lifecycle of a generator's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Not yet materialized
    Unloaded,
    /// Materialization in progress
    Loading,
    /// Materialized; never reloaded
    Loaded(LoadOutcome),
    /// Lazy mode: reads go to the backing storage on every batch
    Degraded,
}

impl LoadState {
    /// Whether batches are served from memory.
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded(_))
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Unloaded => write!(f, "unloaded"),
            LoadState::Loading => write!(f, "loading"),
            LoadState::Loaded(outcome) => write!(f, "loaded ({outcome:?})"),
            LoadState::Degraded => write!(f, "degraded (lazy reads)"),
        }
    }
}

/// The arrays a generator reads windows from.
#[derive(Debug, Clone)]
pub struct Views {
    /// Canonical per-sample array the selections are taken from
    pub base: LabeledArray,
    /// Predictor selection of `base`
    pub input: LabeledArray,
    /// Target selection (of `base`, or of the target array in paired mode)
    pub output: LabeledArray,
}

/// Materialize `views` according to `mode`.
///
/// `rebuild` re-derives the views from a dataset and is used by `Full`
/// loading after the dataset itself has been loaded.
pub(crate) fn materialize(
    mode: LoadMode,
    dataset: &mut Dataset,
    views: &mut Views,
    input_sel: &Selection,
    output_sel: &Selection,
    rebuild: impl FnOnce(&Dataset) -> Result<Views>,
) -> Result<LoadOutcome> {
    match mode {
        LoadMode::Lazy => Err(BatchError::Unsupported(
            "lazy generators are never materialized".to_string(),
        )),
        LoadMode::Full => {
            log::info!("loading the full dataset into memory");
            dataset.load()?;
            *views = rebuild(&*dataset)?;
            views.input.load()?;
            views.output.load()?;
            Ok(LoadOutcome::Full)
        }
        LoadMode::Required => {
            log::info!("loading input and output selections into memory");
            views.input.load()?;
            views.output.load()?;
            Ok(LoadOutcome::Required)
        }
        LoadMode::Minimal => load_minimal(views, input_sel, output_sel),
    }
}

fn load_minimal(
    views: &mut Views,
    input_sel: &Selection,
    output_sel: &Selection,
) -> Result<LoadOutcome> {
    let labels = |view: &LabeledArray| {
        view.coord(VARLEV)
            .ok_or_else(|| BatchError::MissingDimension(format!("coordinate '{VARLEV}'")))
    };
    let input_labels = labels(&views.input)?;
    let output_labels = labels(&views.output)?;

    let union: Vec<String> = input_labels
        .iter()
        .filter(|l| output_labels.contains(l))
        .cloned()
        .collect();
    let added_in: Vec<String> = input_labels
        .iter()
        .filter(|l| !output_labels.contains(l))
        .cloned()
        .collect();
    let added_out: Vec<String> = output_labels
        .iter()
        .filter(|l| !input_labels.contains(l))
        .cloned()
        .collect();

    let other_dims_agree = input_sel
        .iter()
        .filter(|(dim, _)| *dim != VARLEV)
        .eq(output_sel.iter().filter(|(dim, _)| *dim != VARLEV));

    if (!added_in.is_empty() && !added_out.is_empty()) || !other_dims_agree {
        log::warn!(
            "minimal loading is not possible with these selections (input adds {:?}, output adds {:?}); \
             loading both selections instead, which uses more memory",
            added_in,
            added_out
        );
        views.base.load()?;
        views.input = select_loaded(&views.base, input_sel)?;
        views.output = select_loaded(&views.base, output_sel)?;
        return Ok(LoadOutcome::MinimalFallback);
    }

    let n_in = union.len() + added_in.len();
    let n_out = union.len() + added_out.len();
    let mut combined_sel = Selection::new();
    for (dim, labels) in input_sel.iter().filter(|(dim, _)| *dim != VARLEV) {
        combined_sel = combined_sel.with(dim, labels.iter().cloned());
    }
    let combined_labels = union.into_iter().chain(added_in).chain(added_out);
    combined_sel = combined_sel.with(VARLEV, combined_labels);

    log::info!(
        "loading {} deduplicated variables into memory",
        combined_sel.get(VARLEV).map_or(0, <[String]>::len)
    );
    let mut combined = views.base.sel(&combined_sel)?;
    combined.load()?;
    views.input = combined.isel_range(VARLEV, 0..n_in)?;
    views.output = combined.isel_range(VARLEV, 0..n_out)?;
    Ok(LoadOutcome::Minimal)
}

fn select_loaded(base: &LabeledArray, selection: &Selection) -> Result<LabeledArray> {
    let mut view = base.sel(selection)?;
    view.load()?;
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn dataset() -> Dataset {
        let data = Array::from_shape_fn(IxDyn(&[6, 4, 2]), |i| (100 * i[0] + 10 * i[1] + i[2]) as f32);
        let predictors = LabeledArray::from_array(data, &["sample", "varlev", "x"])
            .unwrap()
            .with_coord("varlev", ["a", "b", "c", "d"])
            .unwrap();
        Dataset::new(predictors).unwrap()
    }

    fn views_for(ds: &Dataset, input: &Selection, output: &Selection) -> Views {
        let base = ds.predictors.clone();
        Views {
            input: base.sel(input).unwrap(),
            output: base.sel(output).unwrap(),
            base,
        }
    }

    fn sel(labels: &[&str]) -> Selection {
        Selection::new().with("varlev", labels.iter().copied())
    }

    fn run(mode: LoadMode, input: &[&str], output: &[&str]) -> (Views, LoadOutcome) {
        let mut ds = dataset();
        let (input, output) = (sel(input), sel(output));
        let mut views = views_for(&ds, &input, &output);
        let outcome = materialize(mode, &mut ds, &mut views, &input, &output, |d| {
            Ok(views_for(d, &input, &output))
        })
        .unwrap();
        (views, outcome)
    }

    #[test]
    fn test_required_loads_separately() {
        let (views, outcome) = run(LoadMode::Required, &["a", "b"], &["b"]);
        assert_eq!(outcome, LoadOutcome::Required);
        assert!(views.input.is_loaded() && views.output.is_loaded());
        assert!(!views.input.shares_memory_with(&views.output));
    }

    #[test]
    fn test_full_loads_dataset() {
        let (views, outcome) = run(LoadMode::Full, &["c"], &["d"]);
        assert_eq!(outcome, LoadOutcome::Full);
        assert!(views.base.is_loaded());
        assert_eq!(views.output.values().unwrap()[[5, 0, 1]], 531.0);
    }

    #[test]
    fn test_minimal_shares_one_buffer() {
        let (views, outcome) = run(LoadMode::Minimal, &["b", "a", "c"], &["a", "b"]);
        assert_eq!(outcome, LoadOutcome::Minimal);
        assert!(views.input.shares_memory_with(&views.output));
        assert_eq!(views.input.coord("varlev").unwrap(), vec!["b", "a", "c"]);
        // output keeps the input's ordering of the shared labels
        assert_eq!(views.output.coord("varlev").unwrap(), vec!["b", "a"]);
        assert_eq!(views.output.values().unwrap()[[2, 0, 0]], 210.0);
    }

    #[test]
    fn test_minimal_output_superset() {
        let (views, outcome) = run(LoadMode::Minimal, &["a"], &["a", "d"]);
        assert_eq!(outcome, LoadOutcome::Minimal);
        assert_eq!(views.input.coord("varlev").unwrap(), vec!["a"]);
        assert_eq!(views.output.coord("varlev").unwrap(), vec!["a", "d"]);
        assert!(views.input.shares_memory_with(&views.output));
    }

    #[test]
    fn test_minimal_falls_back_on_partial_overlap() {
        let (views, outcome) = run(LoadMode::Minimal, &["a", "b"], &["b", "c"]);
        assert_eq!(outcome, LoadOutcome::MinimalFallback);
        assert!(views.input.is_loaded() && views.output.is_loaded());
        assert_eq!(views.output.coord("varlev").unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_lazy_is_never_materialized() {
        let mut ds = dataset();
        let all = Selection::all_of(&ds.predictors);
        let mut views = views_for(&ds, &all, &all);
        let err = materialize(LoadMode::Lazy, &mut ds, &mut views, &all, &all, |_| unreachable!());
        assert!(err.is_err());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LoadState::Loaded(LoadOutcome::Minimal).to_string(), "loaded (Minimal)");
        assert!(!LoadState::Degraded.is_loaded());
    }
}
