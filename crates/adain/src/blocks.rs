use burn::nn::Initializer;
use burn::nn::PaddingConfig2d;
use burn::nn::Relu;
use burn::nn::conv::Conv2d;
use burn::nn::conv::Conv2dConfig;
use burn::tensor::Device;
use burn::{
    module::Module,
    tensor::{Tensor, backend::Backend},
};
use std::f64::consts::SQRT_2;

/// Pads the two spatial dimensions of an NCHW tensor by one pixel, mirroring
/// the values next to the border (the border itself isn't repeated).
///
/// Needs at least 2 pixels along each spatial dimension.
pub fn reflection_pad1<B: Backend>(input: Tensor<B, 4>) -> Tensor<B, 4> {
    let [n, c, h, w] = input.dims();

    let left = input.clone().slice([0..n, 0..c, 0..h, 1..2]);
    let right = input.clone().slice([0..n, 0..c, 0..h, w - 2..w - 1]);
    let padded = Tensor::cat(vec![left, input, right], 3);

    let w = w + 2;
    let top = padded.clone().slice([0..n, 0..c, 1..2, 0..w]);
    let bottom = padded.clone().slice([0..n, 0..c, h - 2..h - 1, 0..w]);
    Tensor::cat(vec![top, padded, bottom], 2)
}

/// Repeats the last row and column of an NCHW tensor when the spatial size is
/// odd. A 2x2 max pool over the result matches a ceil mode pool over the input.
pub fn pad_to_even<B: Backend>(input: Tensor<B, 4>) -> Tensor<B, 4> {
    let [n, c, h, w] = input.dims();

    let mut padded = input;
    if h % 2 == 1 {
        let last = padded.clone().slice([0..n, 0..c, h - 1..h, 0..w]);
        padded = Tensor::cat(vec![padded, last], 2);
    }
    let h = h + h % 2;
    if w % 2 == 1 {
        let last = padded.clone().slice([0..n, 0..c, 0..h, w - 1..w]);
        padded = Tensor::cat(vec![padded, last], 3);
    }
    padded
}

pub(crate) fn conv3x3_config(in_channels: usize, out_channels: usize) -> Conv2dConfig {
    // Padding is applied by hand (reflection) before the conv.
    Conv2dConfig::new([in_channels, out_channels], [3, 3])
        .with_padding(PaddingConfig2d::Valid)
        .with_initializer(Initializer::KaimingNormal {
            gain: SQRT_2,
            fan_out_only: true,
        })
}

/// A reflection padded 3x3 conv followed by a ReLU.
#[derive(Module, Debug)]
pub struct ConvRelu<B: Backend> {
    conv: Conv2d<B>,
    relu: Relu,
}

impl<B: Backend> ConvRelu<B> {
    pub(crate) fn new(in_channels: usize, out_channels: usize, device: &Device<B>) -> Self {
        Self {
            conv: conv3x3_config(in_channels, out_channels).init(device),
            relu: Relu::new(),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(reflection_pad1(input));
        self.relu.forward(out)
    }
}

/// A run of convs sharing a resolution.
#[derive(Module, Debug)]
pub struct VggBlock<B: Backend> {
    convs: Vec<ConvRelu<B>>,
}

impl<B: Backend> VggBlock<B> {
    /// Builds a block going through `channels[0] -> channels[1] -> ... -> channels[n]`.
    pub(crate) fn new(channels: &[usize], device: &Device<B>) -> Self {
        let convs = channels
            .windows(2)
            .map(|pair| ConvRelu::new(pair[0], pair[1], device))
            .collect();
        Self { convs }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut cur = input;
        for conv in &self.convs {
            cur = conv.forward(cur);
        }
        cur
    }

    pub fn num_convs(&self) -> usize {
        self.convs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    #[test]
    fn reflection_pad_mirrors_borders() {
        let device = Default::default();
        // 1x1x2x3 image:
        // 1 2 3
        // 4 5 6
        let input = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], [1, 1, 2, 3]),
            &device,
        );
        let padded = reflection_pad1(input);
        assert_eq!(padded.dims(), [1, 1, 4, 5]);

        let values = padded.into_data().to_vec::<f32>().expect("Wrong type");
        #[rustfmt::skip]
        let expected = vec![
            5.0, 4.0, 5.0, 6.0, 5.0,
            2.0, 1.0, 2.0, 3.0, 2.0,
            5.0, 4.0, 5.0, 6.0, 5.0,
            2.0, 1.0, 2.0, 3.0, 2.0,
        ];
        assert_eq!(values, expected);
    }

    #[test]
    fn odd_sizes_repeat_the_last_row_and_column() {
        let device = Default::default();
        // 1 2 3
        // 4 5 6
        // 7 8 9
        let input = Tensor::<TestBackend, 4>::from_data(
            TensorData::new((1..=9).map(|v| v as f32).collect::<Vec<_>>(), [1, 1, 3, 3]),
            &device,
        );
        let padded = pad_to_even(input);
        assert_eq!(padded.dims(), [1, 1, 4, 4]);

        let values = padded.into_data().to_vec::<f32>().expect("Wrong type");
        #[rustfmt::skip]
        let expected = vec![
            1.0, 2.0, 3.0, 3.0,
            4.0, 5.0, 6.0, 6.0,
            7.0, 8.0, 9.0, 9.0,
            7.0, 8.0, 9.0, 9.0,
        ];
        assert_eq!(values, expected);

        let even = Tensor::<TestBackend, 4>::zeros([1, 2, 4, 6], &device);
        assert_eq!(pad_to_even(even).dims(), [1, 2, 4, 6]);
    }

    #[test]
    fn block_keeps_resolution() {
        let device = Default::default();
        let block = VggBlock::<TestBackend>::new(&[3, 8, 4], &device);
        assert_eq!(block.num_convs(), 2);

        let out = block.forward(Tensor::random(
            [2, 3, 6, 5],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        ));
        assert_eq!(out.dims(), [2, 4, 6, 5]);
        // Ends in a ReLU.
        assert!(out.min().into_scalar() >= 0.0);
    }
}
