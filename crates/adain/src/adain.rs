use burn::tensor::{Tensor, backend::Backend};

/// Adaptive instance normalization.
///
/// Re-normalizes content features so their per-channel statistics match the
/// statistics of the style features.
#[derive(Debug, Clone, Copy)]
pub struct AdaIn {
    /// Added to the variance before taking the square root.
    pub eps: f32,
}

impl Default for AdaIn {
    fn default() -> Self {
        Self { eps: 1e-5 }
    }
}

impl AdaIn {
    /// Per-channel spatial mean and standard deviation of NCHW features.
    ///
    /// Both are returned as `[N, C, 1, 1]` so they broadcast against the features.
    /// The variance is the unbiased estimate.
    pub fn mean_std<B: Backend>(&self, feat: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let [n, c, h, w] = feat.dims();
        let flat = feat.reshape([n, c, h * w]);

        let var = flat.clone().var(2);
        let mean = flat.mean_dim(2);

        let std = (var + self.eps).sqrt();
        (mean.reshape([n, c, 1, 1]), std.reshape([n, c, 1, 1]))
    }

    /// Flattened `[means..., stds...]` of the features, the style's signature.
    pub fn descriptor<B: Backend>(&self, feat: Tensor<B, 4>) -> Tensor<B, 1> {
        let (means, stds) = self.mean_std(feat);
        Tensor::cat(vec![means.flatten::<1>(0, 3), stds.flatten::<1>(0, 3)], 0)
    }

    pub fn transfer<B: Backend>(
        &self,
        content_feat: Tensor<B, 4>,
        style_feat: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let (c_mean, c_std) = self.mean_std(content_feat.clone());
        let (s_mean, s_std) = self.mean_std(style_feat);

        let normalized = (content_feat - c_mean) / c_std;
        normalized * s_std + s_mean
    }
}
