#![recursion_limit = "256"]

use adain::{StyleTransferConfig, load_model, save_model};
use anyhow::Context;
use burn::backend::NdArray;
use burn::backend::ndarray::NdArrayDevice;
use clap::Parser;
use std::path::PathBuf;

/// Convert a PyTorch AdaIN checkpoint into a burn record.
#[derive(Parser)]
#[command(author, version)]
struct Args {
    /// PyTorch state dict with `enc.<idx>` and `dec.<idx>` keys.
    input: PathBuf,
    /// Output path, `.mpk` is appended.
    output: PathBuf,
    /// Channels of the encoded features.
    #[arg(long, default_value = "512")]
    feature_channels: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .target(env_logger::Target::Stdout)
        .init();

    let args = Args::parse();
    let config = StyleTransferConfig::new().with_feature_channels(args.feature_channels);

    println!("Converting PyTorch model to Burn format...");
    let device = NdArrayDevice::Cpu;
    let model = load_model::<NdArray>(&args.input, &config, &device)
        .with_context(|| format!("Failed to read {:?}", args.input))?;
    let written = save_model(model, &args.output).context("Failed to convert model")?;
    println!("Conversion completed successfully! Wrote {}", written.display());
    Ok(())
}
