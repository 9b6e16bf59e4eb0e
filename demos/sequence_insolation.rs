//! Sequence targets with an insolation channel.
//!
//! Shows the tensors a multi-step forecast model receives: predictors with
//! insolation merged as an extra channel, the insolation of every later
//! sequence step, and one target tensor per step.
//!
//! Usage:
//! ```bash
//! cargo run --example sequence_insolation
//! ```

use chrono::{NaiveDate, TimeDelta};
use ndarray::{Array, Axis, IxDyn};
use weather_batcher::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    println!("☀️  Sequence + Insolation Example\n");
    println!("{}", "=".repeat(70));

    let (n, lat, lon) = (120, 9, 18);
    let data = Array::from_shape_fn(IxDyn(&[n, 1, lat, lon]), |i| (i[0] % 4) as f32);
    let predictors = LabeledArray::from_array(data, &["sample", "varlev", "lat", "lon"])?
        .with_coord(VARLEV, ["z500"])?;

    let start = NaiveDate::from_ymd_opt(2021, 6, 21)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| BatchError::generic("invalid start date"))?;
    let step = TimeDelta::hours(6);
    let times = (0..n as i32).map(|i| start + step * i).collect();
    let lats: Vec<f64> = (0..lat).map(|i| 80.0 - 20.0 * i as f64).collect();
    let lons: Vec<f64> = (0..lon).map(|i| 20.0 * i as f64).collect();
    let dataset = Dataset::new(predictors)?
        .with_sample_times(times)?
        .with_grid(Grid::regular(&lats, &lons));

    let report = validate_dataset(&dataset, &ValidationConfig::default())?;
    println!("\n{report}");

    let mut generator = GeneratorBuilder::new()
        .batch_size(16)
        .time_steps(2, 2)
        .sequence(3)
        .insolation(Insolation::Hourly)
        .build(ScalingModel::convolutional(true), dataset)?;

    println!("  Windows:           {}", generator.n_sample());
    println!("  Convolution shape: {:?}", generator.convolution_shape());
    println!("  Insolation shape:  {:?}", generator.insolation_shape());

    let batch = generator.get(0)?;
    println!("\n  Predictors:");
    for (k, tensor) in batch.predictors.tensors().iter().enumerate() {
        println!("    [{k}] {:?}", tensor.shape());
    }
    println!("  Targets:");
    for (k, tensor) in batch.targets.tensors().iter().enumerate() {
        println!("    [{k}] {:?}", tensor.shape());
    }

    // Mean insolation of the first window's first time step, per latitude row.
    if let Some(p) = batch.predictors.primary() {
        let sol = p.index_axis(Axis(0), 0).index_axis(Axis(0), 0).index_axis(Axis(0), 1).to_owned();
        println!("\n  Insolation by latitude (sample 0, step 0):");
        for (row, lat_deg) in sol.outer_iter().zip(&lats) {
            let mean = row.mean().unwrap_or(0.0);
            println!("    {lat_deg:>6.1}°  {mean:.3}");
        }
    }

    println!("\n✅ Done");
    Ok(())
}
