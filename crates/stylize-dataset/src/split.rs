use crate::StylizeError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FrameRecord {
    /// Path relative to the dataset root, usually without extension (`./train/r_0`).
    pub file_path: String,
}

// Only the fields needed to find the frames. Everything else (poses, fov) is
// carried along untouched in the raw json.
#[derive(Deserialize)]
struct SplitFrames {
    frames: Vec<FrameRecord>,
}

/// A `transforms_<split>.json` file.
#[derive(Clone, Debug)]
pub struct SplitMeta {
    pub raw: serde_json::Value,
    pub frames: Vec<FrameRecord>,
}

pub fn transforms_file_name(split: &str) -> String {
    format!("transforms_{split}.json")
}

/// Image of a frame. Frames are always png's, `file_path` is used as the stem
/// even when it contains dots.
pub fn frame_image_path(root: &Path, frame: &FrameRecord) -> PathBuf {
    root.join(format!("{}.png", frame.file_path))
}

/// Create a directory (and its parents), refusing to reuse an existing one unless
/// `overwrite` is set.
pub fn create_output_dir(path: &Path, overwrite: bool) -> Result<(), StylizeError> {
    if path.exists() {
        if !overwrite {
            return Err(StylizeError::OutputExists(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(StylizeError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "exists and is not a directory",
                ),
            });
        }
        log::warn!("Reusing existing directory {path:?}");
        return Ok(());
    }

    std::fs::create_dir_all(path).map_err(|source| StylizeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_split_meta(blender_dir: &Path, split: &str) -> Result<SplitMeta, StylizeError> {
    let path = blender_dir.join(transforms_file_name(split));
    let json = std::fs::read_to_string(&path).map_err(|source| StylizeError::Io {
        path: path.clone(),
        source,
    })?;

    let raw: serde_json::Value =
        serde_json::from_str(&json).map_err(|source| StylizeError::Json { path: path.clone(), source })?;
    let frames = SplitFrames::deserialize(&raw)
        .map_err(|source| StylizeError::Json { path, source })?
        .frames;

    Ok(SplitMeta { raw, frames })
}

/// Prepares the output of one split: creates `out_dir/<split>` and copies over
/// the split's metadata. Returns the frames to stylize.
pub fn materialize_split(
    blender_dir: &Path,
    out_dir: &Path,
    split: &str,
    overwrite: bool,
) -> Result<SplitMeta, StylizeError> {
    create_output_dir(&out_dir.join(split), overwrite)?;

    let meta = read_split_meta(blender_dir, split)?;

    let out_path = out_dir.join(transforms_file_name(split));
    let json = serde_json::to_string_pretty(&meta.raw).map_err(|source| StylizeError::Json {
        path: out_path.clone(),
        source,
    })?;
    std::fs::write(&out_path, json).map_err(|source| StylizeError::Io {
        path: out_path,
        source,
    })?;

    log::info!("Split {split}: {} frames", meta.frames.len());
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: &str = r#"{
        "camera_angle_x": 0.6911112070083618,
        "frames": [
            {
                "file_path": "./train/r_0",
                "rotation": 0.012566370614359171,
                "transform_matrix": [[-0.99, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 4.0], [0.0, 0.0, 0.0, 1.0]]
            },
            { "file_path": "./train/r_1.jpg" }
        ]
    }"#;

    #[test]
    fn frame_paths_append_png() {
        let root = Path::new("/data/lego");
        let frame = FrameRecord {
            file_path: "./train/r_0".to_owned(),
        };
        assert_eq!(
            frame_image_path(root, &frame),
            Path::new("/data/lego/./train/r_0.png")
        );

        let frame = FrameRecord {
            file_path: "test/r_2.jpg".to_owned(),
        };
        assert_eq!(
            frame_image_path(root, &frame),
            Path::new("/data/lego/test/r_2.jpg.png")
        );
    }

    #[test]
    fn dotted_frame_names_keep_their_stem() {
        let frame = FrameRecord {
            file_path: "./train/frame.0001".to_owned(),
        };
        assert_eq!(
            frame_image_path(Path::new("/data"), &frame),
            Path::new("/data/./train/frame.0001.png")
        );
    }

    #[test]
    fn materialize_copies_metadata() {
        let src = tempfile::tempdir().expect("Failed to create temp dir");
        let out = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(src.path().join("transforms_train.json"), META).expect("Failed to write");

        let meta = materialize_split(src.path(), out.path(), "train", false)
            .expect("Failed to materialize");
        assert_eq!(meta.frames.len(), 2);
        assert_eq!(meta.frames[1].file_path, "./train/r_1.jpg");
        assert!(out.path().join("train").is_dir());

        let copied = std::fs::read_to_string(out.path().join("transforms_train.json"))
            .expect("Metadata not copied");
        let copied: serde_json::Value = serde_json::from_str(&copied).expect("Invalid json");
        let original: serde_json::Value = serde_json::from_str(META).expect("Invalid json");
        assert_eq!(copied, original);
    }

    #[test]
    fn existing_split_dir_needs_overwrite() {
        let src = tempfile::tempdir().expect("Failed to create temp dir");
        let out = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(src.path().join("transforms_val.json"), META).expect("Failed to write");
        std::fs::create_dir(out.path().join("val")).expect("Failed to create dir");

        let res = materialize_split(src.path(), out.path(), "val", false);
        assert!(matches!(res, Err(StylizeError::OutputExists(_))));
        // Nothing was written.
        assert!(!out.path().join("transforms_val.json").exists());

        materialize_split(src.path(), out.path(), "val", true).expect("Overwrite should succeed");
        assert!(out.path().join("transforms_val.json").exists());
    }

    #[test]
    fn missing_metadata_is_an_error() {
        let src = tempfile::tempdir().expect("Failed to create temp dir");
        let out = tempfile::tempdir().expect("Failed to create temp dir");
        let res = materialize_split(src.path(), out.path(), "test", false);
        assert!(matches!(res, Err(StylizeError::Io { .. })));
    }

    #[test]
    fn metadata_without_frames_is_malformed() {
        let src = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(src.path().join("transforms_train.json"), r#"{"camera_angle_x": 0.5}"#)
            .expect("Failed to write");
        let res = read_split_meta(src.path(), "train");
        assert!(matches!(res, Err(StylizeError::Json { .. })));
    }
}
