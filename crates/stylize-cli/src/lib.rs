#![recursion_limit = "256"]

use anyhow::Context;
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::wgpu::WgpuDevice;
use burn::backend::{NdArray, Wgpu};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;
use stylize_dataset::{
    config::{ComputeDevice, StylizeArgs},
    message::StylizeMessage,
    process,
};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Stylize a blender dataset with a pretrained AdaIN network"
)]
pub struct Cli {
    #[clap(flatten)]
    pub stylize: StylizeArgs,
}

/// Terminal progress for a run.
pub struct ProgressUi {
    sp: MultiProgress,
    main_spinner: ProgressBar,
    split_progress: Option<ProgressBar>,
}

impl ProgressUi {
    pub fn new() -> Self {
        let sp = MultiProgress::new();
        let main_spinner = sp.add(
            ProgressBar::new_spinner().with_style(
                ProgressStyle::with_template("{spinner:.blue} {msg}")
                    .expect("Invalid indicatif config")
                    .tick_strings(&["🎨 ", "🖌️ ", "🖼️ ", "🖌️ "]),
            ),
        );
        main_spinner.enable_steady_tick(Duration::from_millis(120));
        main_spinner.set_message("Loading model...");

        if cfg!(debug_assertions) {
            let _ =
                sp.println("ℹ️  running in debug mode, compile with --release for best performance");
        }

        Self {
            sp,
            main_spinner,
            split_progress: None,
        }
    }

    pub fn handle(&mut self, msg: StylizeMessage) {
        match msg {
            StylizeMessage::ModelLoaded => {
                log::info!("Model loaded.");
                self.main_spinner.set_message("Encoding style...");
            }
            StylizeMessage::StyleEncoded { descriptor_len } => {
                log::info!("Encoded style, descriptor of {descriptor_len} values.");
                self.main_spinner.set_message("Style encoded");
            }
            StylizeMessage::SplitStarted { split, frames } => {
                log::info!("Stylizing {frames} frames of split {split}");
                self.main_spinner
                    .set_message(format!("Stylizing split {split}"));

                let bar = ProgressBar::new(frames as u64)
                    .with_style(
                        ProgressStyle::with_template(
                            "[{elapsed}] {bar:40.cyan/blue} {pos:>5}/{len:5} {msg} ({per_sec}, {eta} remaining)",
                        )
                        .expect("Invalid indicatif config")
                        .progress_chars("◍○○"),
                    )
                    .with_message(split);
                self.split_progress = Some(self.sp.add(bar));
            }
            StylizeMessage::FrameDone { index, .. } => {
                if let Some(bar) = &self.split_progress {
                    bar.set_position(index as u64 + 1);
                }
            }
            StylizeMessage::SplitDone { split } => {
                if let Some(bar) = self.split_progress.take() {
                    bar.finish();
                }
                let _ = self.sp.println(format!("✅ Finished split {split}"));
            }
            StylizeMessage::Done { frames, elapsed } => {
                let elapsed = Duration::from_secs(elapsed.as_secs());
                self.main_spinner.finish_with_message("Done");
                let _ = self.sp.println(format!(
                    "Stylized {frames} frames in {}",
                    humantime::format_duration(elapsed)
                ));
                log::info!(
                    "Done! Stylized {frames} frames in {}.",
                    humantime::format_duration(elapsed)
                );
            }
        }
    }

    pub fn fail(&self) {
        // Don't print the error here. It'll bubble up and be printed as output.
        self.main_spinner.abandon();
        let _ = self.sp.println("❌ Encountered an error");
    }
}

impl Default for ProgressUi {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs on the backend matching the requested device. Returns the number of frames written.
pub fn run_on_device(args: &StylizeArgs, ui: &mut ProgressUi) -> anyhow::Result<usize> {
    log::info!("Using device {}", args.device);

    let res = match args.device {
        ComputeDevice::Cpu => {
            process::run::<NdArray>(args, &NdArrayDevice::Cpu, |msg| ui.handle(msg))
        }
        ComputeDevice::Gpu { index } => {
            let device = index.map_or(WgpuDevice::DefaultDevice, WgpuDevice::DiscreteGpu);
            process::run::<Wgpu>(args, &device, |msg| ui.handle(msg))
        }
    };

    if res.is_err() {
        ui.fail();
    }
    res.with_context(|| format!("Failed to stylize {:?}", args.blender_dir))
}
