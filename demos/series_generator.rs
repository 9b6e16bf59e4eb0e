//! Series generator walkthrough.
//!
//! Builds a small synthetic dataset, fits a scaling model on it and runs
//! two epochs of shuffled batches.
//!
//! Usage:
//! ```bash
//! RUST_LOG=info cargo run --example series_generator
//! ```

use ndarray::{Array, Ix2, IxDyn};
use weather_batcher::prelude::*;

fn synthetic_dataset(n: usize) -> Result<Dataset> {
    // Two variables on an 8x16 grid with a daily cycle and some missing values.
    let data = Array::from_shape_fn(IxDyn(&[n, 2, 8, 16]), |i| {
        let phase = (i[0] % 4) as f32 * std::f32::consts::FRAC_PI_2;
        let value = 280.0 + 10.0 * phase.sin() + i[2] as f32 - 5.0 * i[1] as f32;
        if i[0] % 37 == 5 && i[3] == 0 {
            f32::NAN
        } else {
            value
        }
    });
    let predictors = LabeledArray::from_array(data, &["sample", "varlev", "lat", "lon"])?
        .with_coord(VARLEV, ["t2m", "t850"])?;
    Dataset::new(predictors)
}

fn main() -> Result<()> {
    env_logger::init();

    println!("🌍 Series Generator Example\n");
    println!("{}", "=".repeat(70));

    // =========================================================================
    // 1. Configure
    // =========================================================================
    let builder = GeneratorBuilder::new()
        .batch_size(64)
        .time_steps(2, 1)
        .shuffle(Some(7))
        .load(LoadMode::Minimal);
    println!("\n{}\n", builder.summary());

    let mut generator = builder.build(ScalingModel::convolutional(false), synthetic_dataset(400)?)?;
    println!("  Windows:            {}", generator.n_sample());
    println!("  Batches per epoch:  {}", generator.len());
    println!("  Convolution shape:  {:?}", generator.convolution_shape());
    println!("  Output shape:       {:?}", generator.output_convolution_shape());

    // =========================================================================
    // 2. Fit the model's scalers on flat, unscaled rows
    // =========================================================================
    let raw = generator.generate(&[], false)?;
    let to_rows = |set: TensorSet| -> Result<ndarray::Array2<f32>> {
        let tensor = set
            .into_single()
            .ok_or_else(|| BatchError::generic("expected a single tensor"))?;
        Ok(tensor.into_dimensionality::<Ix2>()?)
    };
    let (p, t) = (to_rows(raw.predictors)?, to_rows(raw.targets)?);
    println!("\n  Fitting on {} rows ({} dropped with NaN)", p.nrows(), generator.n_sample() - p.nrows());
    *generator.model_mut() = ScalingModel::convolutional(false).fit(&p, &t, true)?;
    println!("  Load state:         {}", generator.load_state());

    // =========================================================================
    // 3. Train
    // =========================================================================
    for epoch in 0..2 {
        let mut samples = 0;
        for batch in generator.batches() {
            let batch = batch?;
            samples += batch.len();
        }
        println!("\n  Epoch {epoch}: {samples} samples");
        generator.on_epoch_end();
    }

    println!("\n✅ Done");
    Ok(())
}
