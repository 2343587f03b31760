#![recursion_limit = "256"]

mod adain;
mod blocks;
mod load;

pub use adain::AdaIn;
pub use blocks::{ConvRelu, VggBlock, pad_to_even, reflection_pad1};
pub use load::{ModelError, load_model, pytorch_key_remaps, pytorch_load_args, save_model};

use blocks::conv3x3_config;
use burn::nn::conv::Conv2d;
use burn::nn::conv::Conv2dConfig;
use burn::nn::pool::MaxPool2d;
use burn::nn::pool::MaxPool2dConfig;
use burn::tensor::Device;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};
use burn::{
    config::Config,
    module::Module,
    tensor::{Tensor, backend::Backend},
};

/// VGG19 trunk up to `relu4_1`.
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    /// 1x1 conv applied before the first block.
    projection: Conv2d<B>,
    blocks: Vec<VggBlock<B>>,
    /// Pools in ceil mode, odd sizes are rounded up.
    max_pool: MaxPool2d,
}

impl<B: Backend> Encoder<B> {
    pub fn forward(&self, img: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut fold = self.projection.forward(img);
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                fold = self.max_pool.forward(pad_to_even(fold));
            }
            fold = block.forward(fold);
        }
        fold
    }
}

/// Mirror of the encoder, upsampling back to image resolution.
#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    blocks: Vec<VggBlock<B>>,
    /// Final conv to RGB, without activation.
    output: Conv2d<B>,
}

fn upsample2x<B: Backend>(input: Tensor<B, 4>) -> Tensor<B, 4> {
    let [_, _, h, w] = input.dims();
    interpolate(
        input,
        [h * 2, w * 2],
        InterpolateOptions::new(InterpolateMode::Nearest),
    )
}

impl<B: Backend> Decoder<B> {
    pub fn forward(&self, feat: Tensor<B, 4>) -> Tensor<B, 4> {
        let last = self.blocks.len() - 1;
        let mut fold = feat;
        for (i, block) in self.blocks.iter().enumerate() {
            fold = block.forward(fold);
            if i < last {
                fold = upsample2x(fold);
            }
        }
        self.output.forward(reflection_pad1(fold))
    }
}

#[derive(Module, Debug)]
pub struct StyleTransfer<B: Backend> {
    pub enc: Encoder<B>,
    pub dec: Decoder<B>,
}

impl<B: Backend> StyleTransfer<B> {
    /// Encoded features of normalized NCHW images.
    pub fn encode(&self, img: Tensor<B, 4>) -> Tensor<B, 4> {
        self.enc.forward(img)
    }

    pub fn adain(&self) -> AdaIn {
        AdaIn::default()
    }

    /// Stylizes `content` with the statistics of `style`.
    ///
    /// `alpha` blends between the AdaIN target (1.0) and the plain content
    /// features (0.0). It isn't clamped, values outside 0-1 extrapolate.
    pub fn forward(&self, content: Tensor<B, 4>, style: Tensor<B, 4>, alpha: f32) -> Tensor<B, 4> {
        self.forward_hidden(content, style, alpha).0
    }

    /// Like [`Self::forward`], but also returns the blended features fed to the decoder.
    pub fn forward_hidden(
        &self,
        content: Tensor<B, 4>,
        style: Tensor<B, 4>,
        alpha: f32,
    ) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let _span = tracing::trace_span!("Style transfer forward").entered();

        let content_feat = self.encode(content);
        let style_feat = self.encode(style);
        let target = self.adain().transfer(content_feat.clone(), style_feat);
        let target = target * alpha + content_feat * (1.0 - alpha);
        (self.dec.forward(target.clone()), target)
    }
}

#[derive(Config, Debug)]
pub struct StyleTransferConfig {
    /// Channels of the first encoder block. Later blocks double this.
    #[config(default = 64)]
    pub base_channels: usize,
    /// Channels of the encoded features (`relu4_1`).
    #[config(default = 512)]
    pub feature_channels: usize,
}

impl StyleTransferConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> StyleTransfer<B> {
        let b1 = self.base_channels;
        let b2 = b1 * 2;
        let b3 = b1 * 4;
        let feat = self.feature_channels;

        let enc = Encoder {
            projection: Conv2dConfig::new([3, 3], [1, 1]).init(device),
            blocks: vec![
                VggBlock::new(&[3, b1, b1], device),
                VggBlock::new(&[b1, b2, b2], device),
                VggBlock::new(&[b2, b3, b3, b3, b3], device),
                VggBlock::new(&[b3, feat], device),
            ],
            max_pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        };

        let dec = Decoder {
            blocks: vec![
                VggBlock::new(&[feat, b3], device),
                VggBlock::new(&[b3, b3, b3, b3, b2], device),
                VggBlock::new(&[b2, b2, b1], device),
                VggBlock::new(&[b1, b1], device),
            ],
            output: conv3x3_config(b1, 3).init(device),
        };

        StyleTransfer { enc, dec }
    }
}
