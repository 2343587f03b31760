use crate::{
    StylizeError,
    config::StylizeArgs,
    message::StylizeMessage,
    npy::save_npy,
    split::{create_output_dir, frame_image_path, materialize_split},
    transforms::{alpha_mask, content_to_tensor, denorm, style_to_tensor, tensor_to_image},
};
use adain::{StyleTransfer, StyleTransferConfig, load_model};
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};
use burn::tensor::{Tensor, backend::Backend};
use image::DynamicImage;
use std::path::Path;
use std::time::Instant;

/// Smallest edge the encoder can take: three 2x poolings still leave room for
/// reflection padding.
pub const MIN_IMAGE_SIZE: u32 = 16;

pub const STYLE_PREVIEW_NAME: &str = "style.jpg";
pub const STYLE_DESCRIPTOR_NAME: &str = "style.npy";

/// The encoded style image, shared by every frame.
pub struct StyleContext<B: Backend> {
    /// Normalized `[1, 3, size, size]` style image.
    pub style: Tensor<B, 4>,
    /// Flattened per-channel means followed by stds of the encoded style.
    pub descriptor: Vec<f32>,
}

fn open_image(path: &Path) -> Result<DynamicImage, StylizeError> {
    image::open(path).map_err(|source| StylizeError::Image {
        path: path.to_path_buf(),
        source,
    })
}

fn save_image(img: &DynamicImage, path: &Path) -> Result<(), StylizeError> {
    img.save(path).map_err(|source| StylizeError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads and encodes the style image, writing a preview and its descriptor to `out_dir`.
pub fn init_style<B: Backend>(
    args: &StylizeArgs,
    model: &StyleTransfer<B>,
    device: &B::Device,
) -> Result<StyleContext<B>, StylizeError> {
    if args.style_size < MIN_IMAGE_SIZE {
        return Err(StylizeError::ImageTooSmall {
            path: args.style_img.clone(),
            width: args.style_size,
            height: args.style_size,
        });
    }

    log::info!("Loading style image {:?}", args.style_img);
    let style_img = open_image(&args.style_img)?;
    let style = style_to_tensor::<B>(&style_img, args.style_size, device);

    let preview = tensor_to_image(denorm(style.clone().squeeze::<3>(0)))?;
    save_image(&preview, &args.out_dir.join(STYLE_PREVIEW_NAME))?;

    let feat = model.encode(style.clone());
    let descriptor = model
        .adain()
        .descriptor(feat)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| StylizeError::Tensor(format!("{e:?}")))?;

    let descriptor_path = args.out_dir.join(STYLE_DESCRIPTOR_NAME);
    save_npy(&descriptor_path, &descriptor).map_err(|source| StylizeError::Io {
        path: descriptor_path,
        source,
    })?;

    Ok(StyleContext { style, descriptor })
}

/// Stylizes a single frame from `src` to `dst`.
///
/// The output always has the resolution of the source. With `keep_alpha` the
/// source's alpha channel is attached unchanged, otherwise the output is RGB.
pub fn transfer_frame<B: Backend>(
    model: &StyleTransfer<B>,
    style: &StyleContext<B>,
    src: &Path,
    dst: &Path,
    alpha: f32,
    keep_alpha: bool,
    device: &B::Device,
) -> Result<(), StylizeError> {
    let img = open_image(src)?;
    if img.width() < MIN_IMAGE_SIZE || img.height() < MIN_IMAGE_SIZE {
        return Err(StylizeError::ImageTooSmall {
            path: src.to_path_buf(),
            width: img.width(),
            height: img.height(),
        });
    }

    let content = content_to_tensor::<B>(&img, device);
    let [_, _, h, w] = content.dims();

    let stylized = model.forward(content, style.style.clone(), alpha);

    // The decoder works in multiples of 8 pixels, rounded up by the encoder's pooling.
    let [_, _, out_h, out_w] = stylized.dims();
    let stylized = if (out_h, out_w) == (h, w) {
        stylized
    } else {
        interpolate(
            stylized,
            [h, w],
            InterpolateOptions::new(InterpolateMode::Bilinear),
        )
    };

    let mut out = denorm(stylized.squeeze::<3>(0));
    if keep_alpha {
        out = Tensor::cat(vec![out, alpha_mask::<B>(&img, device)], 0);
    }

    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent).map_err(|source| StylizeError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    save_image(&tensor_to_image(out)?, dst)
}

/// Copies a split's metadata and stylizes all its frames. Returns the number of frames.
pub fn stylize_split<B: Backend>(
    args: &StylizeArgs,
    model: &StyleTransfer<B>,
    style: &StyleContext<B>,
    split: &str,
    device: &B::Device,
    on_message: &mut impl FnMut(StylizeMessage),
) -> Result<usize, StylizeError> {
    let meta = materialize_split(&args.blender_dir, &args.out_dir, split, args.overwrite)?;
    on_message(StylizeMessage::SplitStarted {
        split: split.to_owned(),
        frames: meta.frames.len(),
    });

    for (index, frame) in meta.frames.iter().enumerate() {
        let src = frame_image_path(&args.blender_dir, frame);
        let dst = frame_image_path(&args.out_dir, frame);
        log::debug!("Stylizing {src:?} -> {dst:?}");

        transfer_frame(model, style, &src, &dst, args.alpha, args.bkgd, device)?;

        on_message(StylizeMessage::FrameDone {
            split: split.to_owned(),
            index,
            path: dst,
        });
    }

    on_message(StylizeMessage::SplitDone {
        split: split.to_owned(),
    });
    Ok(meta.frames.len())
}

/// Encodes the style and stylizes every split with an already loaded model.
///
/// `out_dir` must exist. Returns the total number of frames written.
pub fn stylize_dataset<B: Backend>(
    args: &StylizeArgs,
    model: &StyleTransfer<B>,
    device: &B::Device,
    mut on_message: impl FnMut(StylizeMessage),
) -> Result<usize, StylizeError> {
    let start = Instant::now();

    let style = init_style(args, model, device)?;
    on_message(StylizeMessage::StyleEncoded {
        descriptor_len: style.descriptor.len(),
    });

    let mut frames = 0;
    for split in &args.splits {
        let _span = tracing::trace_span!("Stylize split", split = split.as_str()).entered();
        frames += stylize_split(args, model, &style, split, device, &mut on_message)?;
    }

    on_message(StylizeMessage::Done {
        frames,
        elapsed: start.elapsed(),
    });
    Ok(frames)
}

/// Full run: prepares `out_dir`, loads the model and stylizes the dataset.
///
/// Inference doesn't track gradients as long as `B` isn't an autodiff backend.
pub fn run<B: Backend>(
    args: &StylizeArgs,
    device: &B::Device,
    mut on_message: impl FnMut(StylizeMessage),
) -> Result<usize, StylizeError> {
    create_output_dir(&args.out_dir, args.overwrite)?;

    let config = StyleTransferConfig::new().with_feature_channels(args.feature_channels);
    let model = load_model::<B>(&args.model, &config, device)?;
    on_message(StylizeMessage::ModelLoaded);

    stylize_dataset(args, &model, device, on_message)
}
