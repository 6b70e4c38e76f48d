use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use personbox::{BatchRunner, FailurePolicy, InferenceSettings, YoloDetector, load_config};

#[derive(Parser)]
#[command(name = "personbox")]
#[command(about = "Draw boxes around people in a folder of images")]
struct Cli {
    /// Folder with the images to annotate
    #[arg(short, long, value_name = "DIR", default_value = "input")]
    input: PathBuf,

    /// Folder for the annotated images
    #[arg(short, long, value_name = "DIR", default_value = "output")]
    output: PathBuf,

    /// Detection model in .rten format
    #[arg(short, long, value_name = "FILE", default_value = "models/yolov8n.rten")]
    model: PathBuf,

    /// Drawing and inference settings
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Override inference.device
    #[arg(long)]
    device: Option<String>,

    /// Override inference.imgsz
    #[arg(long)]
    imgsz: Option<u32>,

    /// Override inference.conf
    #[arg(long)]
    conf: Option<f32>,

    /// Stop at the first image that fails instead of skipping it
    #[arg(long)]
    fail_fast: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args.config);
    let defaults = InferenceSettings::resolve(&config);
    let settings = InferenceSettings {
        device: args.device.unwrap_or(defaults.device),
        image_size: args.imgsz.unwrap_or(defaults.image_size),
        confidence: args.conf.unwrap_or(defaults.confidence),
    };

    if !args.input.is_dir() {
        anyhow::bail!("Input folder not found: {}", args.input.display());
    }

    if args.verbose {
        println!("Loading model: {}", args.model.display());
    }
    let detector = YoloDetector::load(&args.model)?;

    let policy = if args.fail_fast {
        FailurePolicy::Abort
    } else {
        FailurePolicy::SkipAndContinue
    };

    let summary = BatchRunner::new(&detector, &config)
        .with_settings(settings)
        .with_policy(policy)
        .run(&args.input, &args.output)?;

    if !summary.is_empty() {
        println!(
            "\nDone: {} saved, {} skipped",
            summary.saved.len(),
            summary.skipped.len()
        );
    }

    Ok(())
}
