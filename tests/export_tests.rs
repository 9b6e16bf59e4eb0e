//! Tests for batch export and dataset validation.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use ndarray::{Array, ArrayD, IxDyn};
use ndarray_npy::ReadNpyExt;
use std::fs::File;
use tempfile::TempDir;
use weather_batcher::prelude::*;
use weather_batcher::ExportMetadata;

fn times(n: usize, gap_at: Option<usize>) -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(2020, 6, 21)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n as i64)
        .map(|i| {
            let extra = match gap_at {
                Some(g) if i as usize >= g => 3,
                _ => 0,
            };
            start + Duration::hours(3 * i + extra)
        })
        .collect()
}

fn dataset(n: usize) -> Dataset {
    let data = Array::from_shape_fn(IxDyn(&[n, 1, 2, 3]), |i| i[0] as f32);
    let predictors = LabeledArray::from_array(data, &["sample", "varlev", "lat", "lon"])
        .unwrap()
        .with_coord(VARLEV, ["z500"])
        .unwrap();
    Dataset::new(predictors)
        .unwrap()
        .with_sample_times(times(n, None))
        .unwrap()
        .with_grid(Grid::regular(&[60.0, -60.0], &[0.0, 120.0, 240.0]))
}

fn read(path: std::path::PathBuf) -> ArrayD<f32> {
    ArrayD::<f32>::read_npy(File::open(path).unwrap()).unwrap()
}

#[test]
fn test_export_shuffled_epoch_covers_all_windows() {
    let dir = TempDir::new().unwrap();
    let mut g = GeneratorBuilder::new()
        .batch_size(7)
        .shuffle(Some(5))
        .build(ScalingModel::dense(), dataset(30))
        .unwrap();
    let summary = BatchExporter::new(dir.path()).export_epoch(&mut g).unwrap();
    assert_eq!(summary.n_batches, g.len());
    assert_eq!(summary.n_samples, g.n_sample());

    let mut starts = Vec::new();
    for i in 0..summary.n_batches {
        let p = read(dir.path().join(format!("batch_{i:05}_predictors.npy")));
        starts.extend(p.outer_iter().map(|row| row[[0]] as usize));
    }
    starts.sort_unstable();
    assert_eq!(starts, (0..g.n_sample()).collect::<Vec<_>>());
}

#[test]
fn test_export_sequence_with_insolation() {
    let dir = TempDir::new().unwrap();
    let mut g = GeneratorBuilder::new()
        .batch_size(10)
        .time_steps(1, 1)
        .sequence(3)
        .insolation(Insolation::Hourly)
        .build(ScalingModel::convolutional(false), dataset(20))
        .unwrap();
    let summary = BatchExporter::new(dir.path()).export_epoch(&mut g).unwrap();

    let file = File::open(&summary.metadata_path).unwrap();
    let metadata: ExportMetadata = serde_json::from_reader(file).unwrap();
    assert_eq!(
        metadata.predictor_shapes,
        vec![vec![10, 2, 2, 3], vec![10, 1, 1, 2, 3], vec![10, 1, 1, 2, 3]]
    );
    assert_eq!(metadata.target_shapes.len(), 3);
    assert_eq!(metadata.config.insolation, Insolation::Hourly);

    assert!(dir.path().join("batch_00000_predictors_2.npy").exists());
    assert!(dir.path().join("batch_00000_targets_2.npy").exists());
}

#[test]
fn test_validation_accepts_regular_dataset() {
    let result = validate_dataset(&dataset(12), &ValidationConfig::default()).unwrap();
    assert!(result.is_valid(), "{result}");
}

#[test]
fn test_validation_flags_time_gap() {
    let ds = dataset(12).with_sample_times(times(12, Some(6))).unwrap();
    let result = validate_dataset(&ds, &ValidationConfig::default()).unwrap();
    assert!(result.has_errors());
    assert!(result.errors().iter().any(|e| e.contains("spacing")));
}
