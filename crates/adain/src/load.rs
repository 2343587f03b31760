use crate::{StyleTransfer, StyleTransferConfig};
use burn::module::Module;
use burn::record::{
    BinFileRecorder, FullPrecisionSettings, NamedMpkFileRecorder, Recorder, RecorderError,
};
use burn::tensor::backend::Backend;
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file {0:?} does not exist.")]
    NotFound(PathBuf),

    #[error("Unsupported model format {0:?}: expected .pth, .pt, .mpk or .bin")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to decode model weights: {0}")]
    Record(#[from] RecorderError),
}

// Sequential indices of the convs in a PyTorch AdaIN checkpoint.
// PyTorch Idx | Burn Block Idx | Burn Conv Idx in Block
const ENCODER_KEYS: [(usize, usize, usize); 9] = [
    (2, 0, 0),
    (5, 0, 1),
    (9, 1, 0),
    (12, 1, 1),
    (16, 2, 0),
    (19, 2, 1),
    (22, 2, 2),
    (25, 2, 3),
    (29, 3, 0),
];

const DECODER_KEYS: [(usize, usize, usize); 8] = [
    (1, 0, 0),
    (5, 1, 0),
    (8, 1, 1),
    (11, 1, 2),
    (14, 1, 3),
    (18, 2, 0),
    (21, 2, 1),
    (25, 3, 0),
];
const DECODER_OUTPUT_KEY: usize = 28;

const ENCODER_PREFIX: &str = "(?:enc|encoder|vgg)";
const DECODER_PREFIX: &str = "(?:dec|decoder)";

fn remap(prefix: &str, pt_idx: usize, target: &str) -> (String, String) {
    (
        format!(r"^{prefix}\.{pt_idx}\.(weight|bias)$"),
        format!("{target}.$1"),
    )
}

/// `(pattern, replacement)` pairs from sequential PyTorch keys to burn module paths.
pub fn pytorch_key_remaps() -> Vec<(String, String)> {
    let mut remaps = vec![remap(ENCODER_PREFIX, 0, "enc.projection")];
    remaps.extend(ENCODER_KEYS.iter().map(|(pt_idx, block, conv)| {
        remap(
            ENCODER_PREFIX,
            *pt_idx,
            &format!("enc.blocks.{block}.convs.{conv}.conv"),
        )
    }));
    remaps.extend(DECODER_KEYS.iter().map(|(pt_idx, block, conv)| {
        remap(
            DECODER_PREFIX,
            *pt_idx,
            &format!("dec.blocks.{block}.convs.{conv}.conv"),
        )
    }));
    remaps.push(remap(DECODER_PREFIX, DECODER_OUTPUT_KEY, "dec.output"));
    remaps
}

/// Load args mapping a PyTorch state dict with `enc.<idx>` / `dec.<idx>`
/// sequential keys onto the burn module layout.
pub fn pytorch_load_args(path: &Path) -> LoadArgs {
    pytorch_key_remaps()
        .iter()
        .fold(LoadArgs::new(path.to_path_buf()), |args, (pattern, replacement)| {
            args.with_key_remap(pattern, replacement)
        })
}

/// Load a pretrained style transfer network.
///
/// The recorder is picked from the file extension: `.pth`/`.pt` are read as
/// PyTorch state dicts, `.mpk` and `.bin` as burn records.
pub fn load_model<B: Backend>(
    path: &Path,
    config: &StyleTransferConfig,
    device: &B::Device,
) -> Result<StyleTransfer<B>, ModelError> {
    if !path.is_file() {
        return Err(ModelError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);

    log::info!("Loading style transfer model from {path:?}");
    let model = config.init::<B>(device);

    let record: <StyleTransfer<B> as Module<B>>::Record = match extension.as_deref() {
        Some("pth" | "pt") => PyTorchFileRecorder::<FullPrecisionSettings>::default()
            .load(pytorch_load_args(path), device)?,
        Some("mpk") => {
            NamedMpkFileRecorder::<FullPrecisionSettings>::new().load(path.to_path_buf(), device)?
        }
        Some("bin") => {
            BinFileRecorder::<FullPrecisionSettings>::new().load(path.to_path_buf(), device)?
        }
        _ => return Err(ModelError::UnsupportedFormat(path.to_path_buf())),
    };

    Ok(model.load_record(record))
}

/// Save the network as a named mpk record. Returns the written path.
pub fn save_model<B: Backend>(
    model: StyleTransfer<B>,
    path: &Path,
) -> Result<PathBuf, ModelError> {
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let path = path.with_extension("mpk");
    model.save_file(path.clone(), &recorder)?;
    Ok(path)
}
