//! # `MobileNetV2` feature extractor.
//!
//! Follows the torchvision layer layout, so torchvision checkpoints can
//! be ingested by key remapping alone.

use crate::layers::activation::ActivationConfig;
use crate::layers::blocks::conv_norm::{ConvNormAct, ConvNormActConfig, ConvNormMeta};
use crate::models::mobilenet::inverted_residual::{InvertedResidual, InvertedResidualConfig};
use crate::utility::trainable::set_trainable;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::Conv2dConfig;
use burn::prelude::{Backend, Tensor};

/// Inverted residual settings: (expand ratio, channels, repeats, stride).
const BLOCK_SETTINGS: [(usize, usize, usize, usize); 7] = [
    (1, 16, 1, 1),
    (6, 24, 2, 2),
    (6, 32, 3, 2),
    (6, 64, 4, 2),
    (6, 96, 3, 1),
    (6, 160, 3, 2),
    (6, 320, 1, 1),
];

/// Round a scaled channel count to the nearest multiple of `divisor`,
/// never dropping more than 10% of the value.
pub fn make_divisible(
    value: f64,
    divisor: usize,
) -> usize {
    let rounded = usize::max(
        divisor,
        ((value + divisor as f64 / 2.0) as usize / divisor) * divisor,
    );
    if (rounded as f64) < 0.9 * value {
        rounded + divisor
    } else {
        rounded
    }
}

/// [`MobileNetV2`] Config.
#[derive(Config, Debug)]
pub struct MobileNetV2Config {
    /// Width multiplier for channel counts.
    #[config(default = 1.0)]
    pub alpha: f64,

    /// Channel rounding divisor.
    #[config(default = 8)]
    pub round_nearest: usize,
}

impl MobileNetV2Config {
    /// Number of stem output channels.
    pub fn input_channels(&self) -> usize {
        make_divisible(32.0 * self.alpha, self.round_nearest)
    }

    /// Number of output feature channels.
    pub fn feature_channels(&self) -> usize {
        make_divisible(1280.0 * f64::max(1.0, self.alpha), self.round_nearest)
    }

    /// Build the per-block [`InvertedResidualConfig`]s.
    pub fn block_configs(&self) -> Vec<InvertedResidualConfig> {
        let mut configs = Vec::new();

        let mut in_channels = self.input_channels();
        for &(expand_ratio, channels, repeats, stride) in &BLOCK_SETTINGS {
            let out_channels = make_divisible(channels as f64 * self.alpha, self.round_nearest);
            for i in 0..repeats {
                let stride = if i == 0 { stride } else { 1 };
                configs.push(InvertedResidualConfig::new(
                    in_channels,
                    out_channels,
                    stride,
                    expand_ratio,
                ));
                in_channels = out_channels;
            }
        }

        configs
    }

    /// Initialize a [`MobileNetV2`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> MobileNetV2<B> {
        let stem = ConvNormActConfig::new(
            Conv2dConfig::new([3, self.input_channels()], [3, 3])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_bias(false),
        )
        .with_act(ActivationConfig::Relu6)
        .init(device);

        let block_configs = self.block_configs();
        let head_in_channels = block_configs[block_configs.len() - 1].out_channels;

        let blocks = block_configs.iter().map(|c| c.init(device)).collect();

        let head = ConvNormActConfig::new(
            Conv2dConfig::new([head_in_channels, self.feature_channels()], [1, 1])
                .with_bias(false),
        )
        .with_act(ActivationConfig::Relu6)
        .init(device);

        MobileNetV2 { stem, blocks, head }
    }
}

/// `MobileNetV2` feature extractor.
///
/// A 3x3 stride-2 stem, the inverted residual tower, and a 1x1 conv
/// head lifting to the feature width. The classification top is not
/// part of this module.
#[derive(Module, Debug)]
pub struct MobileNetV2<B: Backend> {
    /// Input stem; 3x3 stride 2.
    pub stem: ConvNormAct<B>,

    /// Inverted residual blocks.
    pub blocks: Vec<InvertedResidual<B>>,

    /// Output head; 1x1 conv to the feature width.
    pub head: ConvNormAct<B>,
}

impl<B: Backend> MobileNetV2<B> {
    /// Number of output feature channels.
    pub fn feature_channels(&self) -> usize {
        self.head.out_channels()
    }

    /// The number of sequential layers in the freeze policy.
    ///
    /// Counts the stem, each inverted residual block, and the head.
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
