use std::path::PathBuf;
use std::time::Duration;

pub enum StylizeMessage {
    /// Output directory is ready and the network is loaded.
    ModelLoaded,
    /// The style image was encoded, and its preview and descriptor saved.
    StyleEncoded { descriptor_len: usize },
    /// Metadata of a split was copied, its frames are about to be stylized.
    SplitStarted { split: String, frames: usize },
    /// A single frame was written.
    FrameDone {
        split: String,
        index: usize,
        path: PathBuf,
    },
    SplitDone { split: String },
    /// All splits are done.
    Done { frames: usize, elapsed: Duration },
}
