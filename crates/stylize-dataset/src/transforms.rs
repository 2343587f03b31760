use crate::StylizeError;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};
use burn::tensor::{Tensor, TensorData, backend::Backend};
use image::{DynamicImage, RgbImage, RgbaImage};

// ImageNet statistics the network was trained with.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

fn channel_stats<B: Backend>(values: [f32; 3], device: &B::Device) -> Tensor<B, 3> {
    Tensor::<B, 1>::from_floats(values, device).reshape([3, 1, 1])
}

/// CHW tensor of the RGB channels in 0-1. Any alpha channel is dropped, not composited.
pub fn rgb_to_tensor<B: Backend>(img: &DynamicImage, device: &B::Device) -> Tensor<B, 3> {
    let rgb = img.to_rgb32f();
    let (w, h) = rgb.dimensions();
    let data = TensorData::new(rgb.into_raw(), [h as usize, w as usize, 3]);
    Tensor::<B, 3>::from_data(data, device).permute([2, 0, 1])
}

/// The 4th channel of the raw image as a `[1, H, W]` tensor in 0-1.
///
/// Images without alpha give an opaque mask.
pub fn alpha_mask<B: Backend>(img: &DynamicImage, device: &B::Device) -> Tensor<B, 3> {
    let rgba = img.to_rgba32f();
    let (w, h) = rgba.dimensions();
    let alpha: Vec<f32> = rgba.pixels().map(|p| p.0[3]).collect();
    Tensor::from_data(TensorData::new(alpha, [1, h as usize, w as usize]), device)
}

pub fn normalize<B: Backend>(img: Tensor<B, 3>) -> Tensor<B, 3> {
    let device = img.device();
    (img - channel_stats(IMAGENET_MEAN, &device)) / channel_stats(IMAGENET_STD, &device)
}

/// Inverse of [`normalize`], back to displayable 0-1 range (not clamped).
pub fn denorm<B: Backend>(img: Tensor<B, 3>) -> Tensor<B, 3> {
    let device = img.device();
    img * channel_stats(IMAGENET_STD, &device) + channel_stats(IMAGENET_MEAN, &device)
}

/// Content frames are only normalized, keeping their native resolution.
///
/// Returns a `[1, 3, H, W]` batch.
pub fn content_to_tensor<B: Backend>(img: &DynamicImage, device: &B::Device) -> Tensor<B, 4> {
    normalize(rgb_to_tensor(img, device)).unsqueeze::<4>()
}

/// Size the shorter edge is resized to, keeping aspect ratio.
///
/// The longer edge is truncated like torchvision does.
pub fn resized_dims(width: u32, height: u32, shorter: u32) -> (u32, u32) {
    if width <= height {
        let long = (u64::from(shorter) * u64::from(height) / u64::from(width)) as u32;
        (shorter, long)
    } else {
        let long = (u64::from(shorter) * u64::from(width) / u64::from(height)) as u32;
        (long, shorter)
    }
}

/// Offset of a centered `size` window along an edge of `len` pixels.
///
/// Halves round to even, like torchvision's `CenterCrop`.
pub fn center_crop_offset(len: u32, size: u32) -> u32 {
    (f64::from(len.saturating_sub(size)) / 2.0).round_ties_even() as u32
}

/// Style images are resized so the shorter edge is `size` (bilinear, without antialiasing),
/// center cropped to `size x size` and normalized.
///
/// Returns a `[1, 3, size, size]` batch.
pub fn style_to_tensor<B: Backend>(
    img: &DynamicImage,
    size: u32,
    device: &B::Device,
) -> Tensor<B, 4> {
    let (new_w, new_h) = resized_dims(img.width(), img.height(), size);
    let tensor = rgb_to_tensor(img, device).unsqueeze::<4>();
    let resized = interpolate(
        tensor,
        [new_h as usize, new_w as usize],
        InterpolateOptions::new(InterpolateMode::Bilinear),
    );

    let top = center_crop_offset(new_h, size) as usize;
    let left = center_crop_offset(new_w, size) as usize;
    let size = size as usize;
    let cropped = resized.slice([0..1, 0..3, top..top + size, left..left + size]);

    normalize(cropped.squeeze::<3>(0)).unsqueeze::<4>()
}

/// Quantize a CHW tensor in 0-1 to an 8-bit image.
///
/// Values are rounded and clamped the same way `torchvision.utils.save_image` does.
/// 3 channels give an RGB image, 4 channels an RGBA image.
pub fn tensor_to_image<B: Backend>(img: Tensor<B, 3>) -> Result<DynamicImage, StylizeError> {
    let [c, h, w] = img.dims();
    let quantized = (img * 255.0 + 0.5).clamp(0.0, 255.0).permute([1, 2, 0]);
    let values = quantized
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| StylizeError::Tensor(format!("{e:?}")))?;
    let bytes: Vec<u8> = values.into_iter().map(|v| v as u8).collect();

    let (w, h) = (w as u32, h as u32);
    let image = match c {
        3 => RgbImage::from_raw(w, h, bytes).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(w, h, bytes).map(DynamicImage::ImageRgba8),
        _ => None,
    };
    image.ok_or_else(|| StylizeError::Tensor(format!("Can't save a {c}x{h}x{w} tensor as image")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use burn::backend::NdArray;
    use image::Rgba;

    type TestBackend = NdArray;

    fn gradient_rgba(w: u32, h: u32) -> DynamicImage {
        let img = RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 10) as u8, (y * 10) as u8, 128, (x + y * w) as u8])
        });
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn resized_dims_match_torchvision() {
        assert_eq!(resized_dims(1000, 500, 800), (1600, 800));
        assert_eq!(resized_dims(500, 1000, 800), (800, 1600));
        assert_eq!(resized_dims(640, 427, 800), (1199, 800));
        assert_eq!(resized_dims(800, 800, 800), (800, 800));
    }

    #[test]
    fn crop_offset_rounds_half_to_even() {
        assert_eq!(center_crop_offset(800, 800), 0);
        assert_eq!(center_crop_offset(801, 800), 0);
        assert_eq!(center_crop_offset(803, 800), 2);
        assert_eq!(center_crop_offset(1201, 800), 200);
        assert_eq!(center_crop_offset(1203, 800), 202);
        assert_eq!(center_crop_offset(1199, 800), 200);
    }

    #[test]
    fn content_keeps_resolution() {
        let device = Default::default();
        let tensor = content_to_tensor::<TestBackend>(&gradient_rgba(7, 5), &device);
        assert_eq!(tensor.dims(), [1, 3, 5, 7]);
    }

    #[test]
    fn normalize_then_denorm_is_identity() {
        let device = Default::default();
        let img = rgb_to_tensor::<TestBackend>(&gradient_rgba(4, 3), &device);
        let back = denorm(normalize(img.clone()));
        let diff = (img - back).abs().max().into_scalar();
        assert!(diff < 1e-6, "Roundtrip differs by {diff}");
    }

    #[test]
    fn normalize_uses_imagenet_stats() {
        let device = Default::default();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, image::Rgb([255, 0, 51])));
        let values = normalize(rgb_to_tensor::<TestBackend>(&img, &device))
            .into_data()
            .to_vec::<f32>()
            .expect("Wrong type");
        assert_approx_eq!(values[0], (1.0 - 0.485) / 0.229, 1e-5);
        assert_approx_eq!(values[1], -0.456 / 0.224, 1e-5);
        assert_approx_eq!(values[2], (0.2 - 0.406) / 0.225, 1e-5);
    }

    #[test]
    fn style_is_square() {
        let device = Default::default();
        let tensor = style_to_tensor::<TestBackend>(&gradient_rgba(30, 20), 16, &device);
        assert_eq!(tensor.dims(), [1, 3, 16, 16]);
    }

    #[test]
    fn alpha_survives_quantization() {
        let device = Default::default();
        let src = gradient_rgba(8, 6);
        let rgb = rgb_to_tensor::<TestBackend>(&src, &device);
        let alpha = alpha_mask::<TestBackend>(&src, &device);
        assert_eq!(alpha.dims(), [1, 6, 8]);

        let out = tensor_to_image(Tensor::cat(vec![rgb, alpha], 0)).expect("Failed to quantize");
        assert_eq!(out.as_rgba8(), src.as_rgba8());
    }

    #[test]
    fn quantization_rounds_and_clamps() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![-0.5f32, 0.5, 2.0], [3, 1, 1]),
            &device,
        );
        let img = tensor_to_image(tensor).expect("Failed to quantize");
        let rgb = img.as_rgb8().expect("Should be rgb");
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 128, 255]);
    }

    #[test]
    fn rejects_odd_channel_counts() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 3>::zeros([2, 4, 4], &device);
        assert!(tensor_to_image(tensor).is_err());
    }
}
