//! Loading strategy tests over `.npy`-backed arrays.
//!
//! Every strategy must produce identical batches; they differ only in what
//! is held in memory afterwards.

use ndarray::{Array, ArrayD, IxDyn};
use ndarray_npy::write_npy;
use std::path::Path;
use tempfile::TempDir;
use weather_batcher::prelude::*;

const LABELS: [&str; 4] = ["z500", "t850", "u250", "v250"];

/// `(sample=24, varlev=4, lat=2, lon=3)`; value = 10 * sample + varlev
fn write_predictors(dir: &Path) -> std::path::PathBuf {
    let data: ArrayD<f32> =
        Array::from_shape_fn(IxDyn(&[24, 4, 2, 3]), |i| (10 * i[0] + i[1]) as f32);
    let path = dir.join("predictors.npy");
    write_npy(&path, &data).unwrap();
    path
}

fn npy_dataset(dir: &Path) -> Dataset {
    let predictors = LabeledArray::open_npy(write_predictors(dir), &["sample", "varlev", "lat", "lon"])
        .unwrap()
        .with_coord(VARLEV, LABELS)
        .unwrap();
    Dataset::new(predictors).unwrap()
}

fn selections(input: &[&str], output: &[&str]) -> GeneratorConfig {
    GeneratorConfig::new()
        .with_time_steps(2, 1)
        .with_batch_size(6)
        .with_selections(
            Selection::new().with(VARLEV, input.iter().copied()),
            Selection::new().with(VARLEV, output.iter().copied()),
        )
}

fn all_batches(g: &mut SeriesGenerator<ScalingModel>) -> Vec<Batch> {
    g.batches().collect::<Result<Vec<_>>>().unwrap()
}

#[test]
fn test_npy_array_is_lazy_until_loaded() {
    let dir = TempDir::new().unwrap();
    let mut ds = npy_dataset(dir.path());
    assert!(!ds.predictors.is_loaded());
    assert_eq!(ds.predictors.shape(), vec![24, 4, 2, 3]);

    let z = ds
        .predictors
        .sel(&Selection::new().with(VARLEV, ["u250"]))
        .unwrap();
    let values = z.gather(SAMPLE, &[3, 7]).unwrap();
    assert_eq!(values.shape(), &[2, 1, 2, 3]);
    assert_eq!(values[[1, 0, 1, 2]], 72.0);

    ds.load().unwrap();
    assert!(ds.is_loaded());
}

#[test]
fn test_all_strategies_agree() {
    let dir = TempDir::new().unwrap();
    let (input, output) = (["z500", "t850", "u250"], ["z500", "t850"]);

    let mut reference = None;
    for load in [LoadMode::Lazy, LoadMode::Required, LoadMode::Full, LoadMode::Minimal] {
        let config = selections(&input, &output).with_load(load);
        let mut g = SeriesGenerator::new(ScalingModel::dense(), npy_dataset(dir.path()), config).unwrap();
        let batches = all_batches(&mut g);
        match &reference {
            None => reference = Some(batches),
            Some(expected) => assert_eq!(&batches, expected, "{load}"),
        }
    }
}

#[test]
fn test_required_loads_on_first_batch() {
    let dir = TempDir::new().unwrap();
    let mut g = SeriesGenerator::new(
        ScalingModel::dense(),
        npy_dataset(dir.path()),
        selections(&["z500"], &["t850"]),
    )
    .unwrap();
    assert_eq!(g.load_state(), LoadState::Unloaded);
    assert!(!g.input_view().is_loaded());

    g.get(0).unwrap();
    assert_eq!(g.load_state(), LoadState::Loaded(LoadOutcome::Required));
    assert!(g.input_view().is_loaded() && g.output_view().is_loaded());
    assert!(!g.input_view().shares_memory_with(g.output_view()));

    // loading is idempotent
    assert_eq!(g.load().unwrap(), LoadState::Loaded(LoadOutcome::Required));
}

#[test]
fn test_minimal_shares_memory_when_output_is_subset() {
    let dir = TempDir::new().unwrap();
    let config = selections(&["z500", "t850", "u250"], &["u250", "z500"])
        .with_load(LoadMode::Minimal)
        .with_force_load(true);
    let mut g = SeriesGenerator::new(ScalingModel::dense(), npy_dataset(dir.path()), config).unwrap();
    assert_eq!(g.load_state(), LoadState::Loaded(LoadOutcome::Minimal));
    assert!(g.input_view().shares_memory_with(g.output_view()));

    // targets keep the input's relative order of the shared variables
    let batch = g.generate(&[0], true).unwrap();
    let t = batch.targets.primary().unwrap();
    assert_eq!(t.shape(), &[1, 12]);
    assert_eq!(t[[0, 0]], 20.0);
    assert_eq!(t[[0, 6]], 22.0);
}

#[test]
fn test_minimal_falls_back_on_partial_overlap() {
    let dir = TempDir::new().unwrap();
    let config = selections(&["z500", "t850"], &["t850", "v250"])
        .with_load(LoadMode::Minimal)
        .with_force_load(true);
    let mut g = SeriesGenerator::new(ScalingModel::dense(), npy_dataset(dir.path()), config).unwrap();
    assert_eq!(g.load_state(), LoadState::Loaded(LoadOutcome::MinimalFallback));

    let batch = g.generate(&[1], true).unwrap();
    let t = batch.targets.primary().unwrap();
    assert_eq!(t[[0, 0]], 31.0);
    assert_eq!(t[[0, 6]], 33.0);
}

#[test]
fn test_minimal_requires_varlev_labels() {
    let data = ArrayD::<f32>::zeros(IxDyn(&[10, 2, 2]));
    let predictors = LabeledArray::from_array(data, &["sample", "lat", "lon"]).unwrap();
    let err = SeriesGenerator::new(
        ScalingModel::dense(),
        Dataset::new(predictors).unwrap(),
        GeneratorConfig::new().with_load(LoadMode::Minimal),
    )
    .err()
    .unwrap();
    assert!(err.is_config());
}

#[test]
fn test_lazy_never_loads() {
    let dir = TempDir::new().unwrap();
    let config = selections(&["z500"], &["z500"]).with_load(LoadMode::Lazy);
    let mut g = SeriesGenerator::new(ScalingModel::dense(), npy_dataset(dir.path()), config).unwrap();
    assert_eq!(g.load_state(), LoadState::Degraded);
    all_batches(&mut g);
    assert_eq!(g.load().unwrap(), LoadState::Degraded);
    assert!(!g.input_view().is_loaded());
}

#[test]
fn test_full_loads_dataset() {
    let dir = TempDir::new().unwrap();
    let config = selections(&["v250"], &["z500"])
        .with_load(LoadMode::Full)
        .with_force_load(true);
    let g = SeriesGenerator::new(ScalingModel::dense(), npy_dataset(dir.path()), config).unwrap();
    assert_eq!(g.load_state(), LoadState::Loaded(LoadOutcome::Full));
    assert!(g.input_view().is_loaded());
}
