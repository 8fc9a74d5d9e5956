//! # `EfficientNet` (V1) feature extractor.
//!
//! Compound-scaled MBConv tower. Follows the torchvision layer layout,
//! so torchvision checkpoints can be ingested by key remapping alone.

use crate::layers::activation::ActivationConfig;
use crate::layers::blocks::conv_norm::{ConvNormAct, ConvNormActConfig, ConvNormMeta};
use crate::models::efficientnet::mbconv::{MbConv, MbConvConfig};
use crate::models::mobilenet::make_divisible;
use crate::utility::trainable::set_trainable;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::Conv2dConfig;
use burn::prelude::{Backend, Tensor};

/// Base (B0) stage settings: (expand ratio, kernel, stride, channels, repeats).
const STAGE_SETTINGS: [(usize, usize, usize, usize, usize); 7] = [
    (1, 3, 1, 16, 1),
    (6, 3, 2, 24, 2),
    (6, 5, 2, 40, 2),
    (6, 3, 2, 80, 3),
    (6, 5, 1, 112, 3),
    (6, 5, 2, 192, 4),
    (6, 3, 1, 320, 1),
];

/// Base (B0) stem width.
const STEM_CHANNELS: usize = 32;

/// [`EfficientNet`] Config.
#[derive(Config, Debug)]
pub struct EfficientNetConfig {
    /// Width multiplier for channel counts.
    #[config(default = 1.0)]
    pub width: f64,

    /// Depth multiplier for per-stage repeats.
    #[config(default = 1.0)]
    pub depth: f64,

    /// Max per-sample drop rate for residual branches.
    ///
    /// Scaled linearly over the block index, reaching this value at
    /// the last block.
    #[config(default = 0.2)]
    pub drop_path_prob: f64,
}

impl EfficientNetConfig {
    /// The B3 compound scaling (width 1.2, depth 1.4).
    pub fn b3() -> Self {
        Self::new().with_width(1.2).with_depth(1.4)
    }

    /// Scale a base channel count by the width multiplier.
    pub fn adjust_channels(&self, channels: usize) -> usize {
        make_divisible(channels as f64 * self.width, 8)
    }

    /// Scale a base repeat count by the depth multiplier.
    pub fn adjust_depth(&self, repeats: usize) -> usize {
        (repeats as f64 * self.depth).ceil() as usize
    }

    /// Number of stem output channels.
    pub fn input_channels(&self) -> usize {
        self.adjust_channels(STEM_CHANNELS)
    }

    /// Number of output feature channels.
    ///
    /// Four times the last stage width.
    pub fn feature_channels(&self) -> usize {
        4 * self.adjust_channels(STAGE_SETTINGS[STAGE_SETTINGS.len() - 1].3)
    }

    /// Scaled per-stage block counts.
    pub fn stage_repeats(&self) -> Vec<usize> {
        STAGE_SETTINGS
            .iter()
            .map(|&(_, _, _, _, repeats)| self.adjust_depth(repeats))
            .collect()
    }

    /// Build the per-block [`MbConvConfig`]s, flattened across stages.
    pub fn block_configs(&self) -> Vec<MbConvConfig> {
        let total: usize = self.stage_repeats().iter().sum();

        let mut configs = Vec::new();
        let mut in_channels = self.input_channels();
        for &(expand_ratio, kernel_size, stride, channels, repeats) in &STAGE_SETTINGS {
            let out_channels = self.adjust_channels(channels);
            for i in 0..self.adjust_depth(repeats) {
                let stride = if i == 0 { stride } else { 1 };
                let drop_path_prob =
                    self.drop_path_prob * configs.len() as f64 / total as f64;

                configs.push(
                    MbConvConfig::new(
                        in_channels,
                        out_channels,
                        kernel_size,
                        stride,
                        expand_ratio,
                    )
                    .with_drop_path_prob(drop_path_prob),
                );
                in_channels = out_channels;
            }
        }

        configs
    }

    /// Initialize an [`EfficientNet`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> EfficientNet<B> {
        let stem = ConvNormActConfig::new(
            Conv2dConfig::new([3, self.input_channels()], [3, 3])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false),
        )
        .with_act(ActivationConfig::Silu)
        .init(device);

        let block_configs = self.block_configs();
        let head_in_channels = block_configs[block_configs.len() - 1].out_channels;

        let blocks = block_configs.iter().map(|c| c.init(device)).collect();

        let head = ConvNormActConfig::new(
            Conv2dConfig::new([head_in_channels, self.feature_channels()], [1, 1])
                .with_bias(false),
        )
        .with_act(ActivationConfig::Silu)
        .init(device);

        EfficientNet { stem, blocks, head }
    }
}

/// `EfficientNet` (V1) feature extractor.
///
/// A 3x3 stride-2 stem, the MBConv tower, and a 1x1 conv head lifting
/// to the feature width. The classification top is not part of this
/// module.
#[derive(Module, Debug)]
pub struct EfficientNet<B: Backend> {
    /// Input stem; 3x3 stride 2.
    pub stem: ConvNormAct<B>,

    /// MBConv blocks.
    pub blocks: Vec<MbConv<B>>,

    /// Output head; 1x1 conv to the feature width.
    pub head: ConvNormAct<B>,
}

impl<B: Backend> EfficientNet<B> {
    /// Number of output feature channels.
    pub fn feature_channels(&self) -> usize {
        self.head.out_channels()
    }

    /// The number of sequential layers in the freeze policy.
    ///
    /// Counts the stem, each MBConv block, and the head.
    pub fn num_layers(&self) -> usize {
        2 + self.blocks.len()
    }

    /// Freeze all but the trailing `tail` layers.
    ///
    /// Layers are counted in forward order: the stem, each block, then
    /// the head. `tail` is clamped to the layer count. Frozen layers
    /// have `require_grad` cleared on every parameter; the trailing
    /// layers have it set.
    pub fn with_trainable_tail(
        self,
        tail: usize,
    ) -> Self {
        let num_layers = self.num_layers();
        let boundary = num_layers - tail.min(num_layers);

        Self {
            stem: set_trainable(self.stem, boundary == 0),
            blocks: self
                .blocks
                .into_iter()
                .enumerate()
                .map(|(i, block)| set_trainable(block, i + 1 >= boundary))
                .collect(),
            head: set_trainable(self.head, tail >= 1),
        }
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, 3, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// Feature maps ``[batch, feature_channels, in_height / 32,
    /// in_width / 32]`` (ceil division per stride-2 stage).
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch"],
            &[("in_channels", self.stem.in_channels())]
        );

        let mut x = self.stem.forward(input);
        for block in &self.blocks {
            x = block.forward(x);
        }
        let x = self.head.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "feature_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("feature_channels", self.feature_channels())
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utility::trainable::{is_frozen, is_trainable};
    use bimm_contracts::assert_shape_contract;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;
    type AutodiffBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_efficientnet_base_config() {
        let config = EfficientNetConfig::new();
        assert_eq!(config.width, 1.0);
        assert_eq!(config.depth, 1.0);
        assert_eq!(config.input_channels(), 32);
        assert_eq!(config.feature_channels(), 1280);
        assert_eq!(config.stage_repeats(), [1, 2, 2, 3, 3, 4, 1]);
        assert_eq!(config.block_configs().len(), 16);
    }

    #[test]
    fn test_efficientnet_b3_config() {
        let config = EfficientNetConfig::b3();
        assert_eq!(config.input_channels(), 40);
        assert_eq!(config.feature_channels(), 1536);
        assert_eq!(config.stage_repeats(), [2, 3, 3, 5, 5, 6, 2]);

        let block_configs = config.block_configs();
        assert_eq!(block_configs.len(), 26);

        let channels: Vec<usize> = block_configs.iter().map(|c| c.out_channels).collect();
        assert_eq!(
            channels,
            [
                24, 24, //
                32, 32, 32, //
                48, 48, 48, //
                96, 96, 96, 96, 96, //
                136, 136, 136, 136, 136, //
                232, 232, 232, 232, 232, 232, //
                384, 384,
            ]
        );

        // The first stage (two blocks under depth scaling) runs
        // unexpanded off the stem.
        assert_eq!(block_configs[0].in_channels, 40);
        assert_eq!(block_configs[0].expand_ratio, 1);
        assert_eq!(block_configs[1].expand_ratio, 1);
        assert!(block_configs[2..].iter().all(|c| c.expand_ratio == 6));

        // Stage kernels and strides survive scaling untouched.
        let kernels: Vec<usize> = [0, 2, 5, 8, 13, 18, 24]
            .iter()
            .map(|&i| block_configs[i].kernel_size)
            .collect();
        assert_eq!(kernels, [3, 3, 5, 3, 5, 5, 3]);

        let strides: Vec<usize> = [0, 2, 5, 8, 13, 18, 24]
            .iter()
            .map(|&i| block_configs[i].stride)
            .collect();
        assert_eq!(strides, [1, 2, 2, 2, 1, 2, 1]);
        assert!(block_configs[1].stride == 1 && block_configs[3].stride == 1);

        // Drop-path ramps linearly from zero towards the configured max.
        assert_eq!(block_configs[0].drop_path_prob, 0.0);
        let last = block_configs[25].drop_path_prob;
        assert!((last - 0.2 * 25.0 / 26.0).abs() < 1e-9);
        assert!(
            block_configs
                .windows(2)
                .all(|w| w[0].drop_path_prob < w[1].drop_path_prob)
        );
    }

    #[test]
    fn test_efficientnet_forward() {
        let device = Default::default();

        let model: EfficientNet<TestBackend> = EfficientNetConfig::b3().init(&device);

        assert_eq!(model.num_layers(), 28);
        assert_eq!(model.feature_channels(), 1536);

        let input = Tensor::random([1, 3, 150, 150], Distribution::Default, &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "feature_channels", "out_height", "out_width"],
            &output,
            &[
                ("batch", 1),
                ("feature_channels", 1536),
                ("out_height", 5),
                ("out_width", 5)
            ],
        );
    }

    #[test]
    fn test_trainable_tail() {
        let device = Default::default();

        let model: EfficientNet<AutodiffBackend> = EfficientNetConfig::b3().init(&device);
        assert!(is_trainable(&model));

        // Default policy: the trailing 10 of 28 layers stay trainable.
        let model = model.with_trainable_tail(10);
        assert!(is_frozen(&model.stem));
        for block in &model.blocks[..17] {
            assert!(is_frozen(block));
        }
        for block in &model.blocks[17..] {
            assert!(is_trainable(block));
        }
        assert!(is_trainable(&model.head));

        // Zero tail freezes everything.
        let model = model.with_trainable_tail(0);
        assert!(is_frozen(&model));
    }
}
