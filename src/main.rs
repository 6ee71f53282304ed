//! `lamaerase` CLI - Remove objects from an image using a binary mask.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lamaerase::{Predictor, ResizeLimit, SetupOptions};

/// Remove objects from an image with `LaMa` inpainting.
#[derive(Parser, Debug)]
#[command(name = "lamaerase")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input image to remove objects from.
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Binary mask (white = remove, black = keep).
    #[arg(value_name = "MASK")]
    mask: PathBuf,

    /// Resize limit for the HD strategy. Larger images are downscaled to this size.
    #[arg(
        long,
        default_value_t = ResizeLimit::DEFAULT,
        value_parser = clap::value_parser!(u32).range(i64::from(ResizeLimit::MIN)..=i64::from(ResizeLimit::MAX)),
        value_name = "INT"
    )]
    resize_limit: u32,

    /// Also copy the result to this path.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// ONNX model file to use instead of the cached download.
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,

    /// Run on the CPU even if an accelerator is available.
    #[arg(long)]
    cpu: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lamaerase={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    let options = SetupOptions {
        model_path: args.model.clone(),
        force_cpu: args.cpu,
    };

    let mut predictor = Predictor::setup(&options).context("Failed to load model")?;

    let result = predictor
        .predict(&args.image, &args.mask, args.resize_limit)
        .context("Failed to remove objects")?;

    if let Some(output) = &args.output {
        std::fs::copy(&result, output)
            .with_context(|| format!("Failed to copy result to {}", output.display()))?;
    }

    println!("{}", result.display());

    Ok(())
}
