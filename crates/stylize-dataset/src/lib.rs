#![recursion_limit = "256"]

pub mod config;
pub mod message;
pub mod npy;
pub mod process;
pub mod split;
pub mod transforms;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StylizeError {
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error decoding JSON file {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Error reading or writing image {path:?}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Output {0:?} already exists, pass --overwrite to reuse it.")]
    OutputExists(PathBuf),

    #[error("Image {path:?} is {width}x{height}, needs at least 16 pixels per side.")]
    ImageTooSmall {
        path: PathBuf,
        width: u32,
        height: u32,
    },

    #[error("Failed to load style transfer model.")]
    Model(#[from] adain::ModelError),

    #[error("Unexpected tensor data: {0}")]
    Tensor(String),
}
