//! Batch Export Tool
//!
//! Cuts one epoch of training batches out of a `.npy` predictor array and
//! writes them as `.npy` files for Python training loops.
//!
//! # Output Format
//!
//! - **Predictors**: `batch_{i:05}_predictors[_k].npy`
//! - **Targets**: `batch_{i:05}_targets[_k].npy` (one file per sequence step)
//! - **Metadata**: `metadata.json` (shapes, counts, generator configuration)
//!
//! Scalers are fitted on the whole dataset before export.
//!
//! # Usage
//!
//! ```bash
//! # Generate a sample generator config
//! cargo run --release --bin export_batches -- --generate-config batching.toml
//!
//! # Export
//! cargo run --release --bin export_batches -- \
//!     --config batching.toml \
//!     --data era5.npy --dims sample,varlev,lat,lon --varlev z500,t850 \
//!     --start 2019-01-01T00:00:00 --step-hours 6 \
//!     --layout conv --output exports/train
//! ```
//!
//! Set `RUST_LOG=info` for progress output.

use chrono::{NaiveDateTime, TimeDelta};
use ndarray::Ix2;
use std::process::exit;
use weather_batcher::prelude::*;

/// Parsed command line.
#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    data: Option<String>,
    dims: Vec<String>,
    varlev: Vec<String>,
    start: Option<String>,
    step_hours: i64,
    layout: String,
    output: Option<String>,
}

fn main() {
    env_logger::init();

    let argv: Vec<String> = std::env::args().collect();
    let program = argv.first().cloned().unwrap_or_else(|| "export_batches".to_string());

    match argv.get(1).map(String::as_str) {
        Some("--generate-config") => match argv.get(2) {
            Some(path) => generate_sample_config(path),
            None => {
                eprintln!("Error: --generate-config requires a path argument");
                exit(1);
            }
        },
        Some("--help") | Some("-h") => print_usage(&program),
        Some(_) => match parse_args(&argv[1..]) {
            Ok(args) => {
                if let Err(e) = run(&args) {
                    eprintln!("❌ Export failed: {e}");
                    exit(1);
                }
            }
            Err(msg) => {
                eprintln!("Error: {msg}");
                print_usage(&program);
                exit(1);
            }
        },
        None => {
            print_usage(&program);
            exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!(
        r#"
Batch Export Tool

Usage:
    {program} --config <path.toml> --data <predictors.npy> --dims <d1,d2,...> --output <dir> [options]
    {program} --generate-config <path.toml>
    {program} --help

Options:
    --varlev <a,b,...>     Labels of the varlev dimension (required for selections)
    --start <datetime>     Timestamp of the first sample (YYYY-MM-DDTHH:MM:SS)
    --step-hours <n>       Hours between samples (default 1)
    --layout <name>        dense | recurrent | conv | conv-recurrent (default dense)
"#
    );
}

fn parse_args(argv: &[String]) -> std::result::Result<Args, String> {
    let mut args = Args {
        step_hours: 1,
        layout: "dense".to_string(),
        ..Args::default()
    };
    let mut it = argv.iter();
    while let Some(flag) = it.next() {
        let mut value = || {
            it.next()
                .cloned()
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match flag.as_str() {
            "--config" => args.config = Some(value()?),
            "--data" => args.data = Some(value()?),
            "--dims" => args.dims = split(&value()?),
            "--varlev" => args.varlev = split(&value()?),
            "--start" => args.start = Some(value()?),
            "--step-hours" => {
                args.step_hours = value()?
                    .parse()
                    .map_err(|e| format!("invalid --step-hours: {e}"))?
            }
            "--layout" => args.layout = value()?,
            "--output" => args.output = Some(value()?),
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    if args.data.is_none() || args.output.is_none() || args.dims.is_empty() {
        return Err("--data, --dims and --output are required".to_string());
    }
    Ok(args)
}

fn split(list: &str) -> Vec<String> {
    list.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

/// Write a sample configuration file.
fn generate_sample_config(path: &str) {
    let config = GeneratorConfig::new()
        .with_batch_size(64)
        .with_time_steps(2, 1)
        .with_shuffle(true, Some(42))
        .with_insolation(Insolation::Daily)
        .with_load(LoadMode::Minimal);
    match config.save_toml(path) {
        Ok(()) => println!("✅ Generated sample config: {path}"),
        Err(e) => {
            eprintln!("Error generating config: {e}");
            exit(1);
        }
    }
}

fn model_for(layout: &str) -> Result<ScalingModel> {
    match layout {
        "dense" => Ok(ScalingModel::dense()),
        "recurrent" => Ok(ScalingModel::recurrent()),
        "conv" => Ok(ScalingModel::convolutional(false)),
        "conv-recurrent" => Ok(ScalingModel::convolutional(true)),
        other => Err(BatchError::config(format!("unknown layout '{other}'"))),
    }
}

fn load_dataset(args: &Args) -> Result<Dataset> {
    let path = args.data.as_deref().unwrap_or_default();
    let dims: Vec<&str> = args.dims.iter().map(String::as_str).collect();
    let mut predictors = LabeledArray::open_npy(path, &dims)?;
    if !args.varlev.is_empty() {
        predictors = predictors.with_coord(VARLEV, args.varlev.iter().cloned())?;
    }
    let mut dataset = Dataset::new(predictors)?;

    if let Some(start) = &args.start {
        let start = NaiveDateTime::parse_from_str(start, "%Y-%m-%dT%H:%M:%S")
            .map_err(|e| BatchError::config(format!("invalid --start '{start}': {e}")))?;
        let step = TimeDelta::hours(args.step_hours);
        let times = (0..dataset.n_samples() as i32).map(|i| start + step * i).collect();
        dataset = dataset.with_sample_times(times)?;
    }
    Ok(dataset)
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => GeneratorConfig::load_toml(path)?,
        None => GeneratorConfig::default(),
    };

    let dataset = load_dataset(args)?;
    let report = validate_dataset(&dataset, &ValidationConfig::default())?;
    print!("{report}");
    if report.has_errors() {
        return Err(BatchError::config("dataset failed validation"));
    }

    let mut generator = SeriesGenerator::new(model_for(&args.layout)?, dataset, config)?;
    println!("Generator: {} samples in {} batches", generator.n_sample(), generator.len());

    // Fit scalers on every window, unscaled.
    let raw = generator.generate(&[], false)?;
    let flat = |set: &TensorSet| -> Result<ndarray::Array2<f32>> {
        let primary = set
            .primary()
            .ok_or_else(|| BatchError::generic("empty batch"))?;
        Ok(primary.clone().into_dimensionality::<Ix2>()?)
    };
    let (p, t) = (flat(&raw.predictors)?, flat(&raw.targets)?);
    let fitted = model_for(&args.layout)?.fit(&p, &t, false)?;
    *generator.model_mut() = fitted;

    let output = args.output.as_deref().unwrap_or_default();
    let summary = BatchExporter::new(output).export_epoch(&mut generator)?;
    println!(
        "✅ Exported {} batches ({} samples) to {output}",
        summary.n_batches, summary.n_samples
    );
    Ok(())
}
