use clap::Args;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where to run the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    Cpu,
    /// A wgpu adapter. `None` picks the default adapter, `Some(i)` the i-th discrete gpu.
    Gpu { index: Option<usize> },
}

impl FromStr for ComputeDevice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let (name, index) = match s.split_once(':') {
            Some((name, index)) => {
                let index = index
                    .parse::<usize>()
                    .map_err(|_e| format!("Invalid device index in '{s}'"))?;
                (name, Some(index))
            }
            None => (s.as_str(), None),
        };

        match (name, index) {
            ("cpu", None) => Ok(Self::Cpu),
            ("cpu", Some(_)) => Err(format!("Device '{s}' doesn't take an index")),
            ("gpu" | "wgpu" | "cuda" | "metal" | "vulkan", index) => Ok(Self::Gpu { index }),
            _ => Err(format!(
                "Unknown device '{s}', expected cpu, gpu, wgpu or cuda (optionally with :N)"
            )),
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu { index: None } => write!(f, "gpu"),
            Self::Gpu { index: Some(index) } => write!(f, "gpu:{index}"),
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct StylizeArgs {
    /// Destination root of the stylized dataset.
    #[arg(long = "out_dir", help_heading = "Paths")]
    pub out_dir: PathBuf,
    /// Allow writing into directories left over from a previous run.
    #[arg(long, help_heading = "Paths", default_value = "false")]
    pub overwrite: bool,
    /// Blender dataset root, containing transforms_{train,val,test}.json.
    #[arg(long = "blender_dir", help_heading = "Paths")]
    pub blender_dir: PathBuf,
    /// Style reference image.
    #[arg(long = "style_img", help_heading = "Paths")]
    pub style_img: PathBuf,
    /// Pretrained style transfer weights (.pth, .pt, .mpk or .bin).
    #[arg(long, help_heading = "Paths")]
    pub model: PathBuf,

    /// Style strength, passed as is to the network.
    #[arg(
        long,
        help_heading = "Style options",
        default_value = "1",
        allow_hyphen_values = true
    )]
    pub alpha: f32,
    /// Keep the alpha channel of the source frames in the output.
    #[arg(long, help_heading = "Style options", default_value = "false")]
    pub bkgd: bool,
    /// The style image is resized and center cropped to this square size.
    #[arg(long = "style_size", help_heading = "Style options", default_value = "800")]
    pub style_size: u32,

    /// Compute device: cpu, gpu, wgpu, cuda or cuda:N.
    #[arg(long, help_heading = "Model options", default_value = "cpu")]
    pub device: ComputeDevice,
    /// Channels of the encoded features of the model.
    #[arg(long = "feature_channels", help_heading = "Model options", default_value = "512")]
    pub feature_channels: usize,

    /// Dataset splits to stylize, in order.
    #[arg(
        long,
        help_heading = "Dataset options",
        value_delimiter = ',',
        default_values = ["train", "val", "test"]
    )]
    pub splits: Vec<String>,
}
