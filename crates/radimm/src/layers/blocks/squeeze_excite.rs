//! # `SqueezeExcite` - squeeze-and-excitation channel attention.
//!
//! See: [Squeeze-and-Excitation Networks](https://arxiv.org/abs/1709.01507)
//!
//! The block pools the spatial dims to ``1x1``, runs the pooled vector
//! through a two layer bottleneck, and re-scales the input channels by
//! the resulting sigmoid gate.

use crate::layers::activation::{Activation, ActivationConfig};
use bimm_contracts::assert_shape_contract;
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::sigmoid;

/// Common meta API for [`SqueezeExciteConfig`] and [`SqueezeExcite`].
pub trait SqueezeExciteMeta {
    /// Number of input (and output) channels.
    fn channels(&self) -> usize;

    /// Number of bottleneck channels.
    fn squeeze_channels(&self) -> usize;
}

/// [`SqueezeExcite`] Config.
///
/// Implements [`SqueezeExciteMeta`].
#[derive(Config, Debug)]
pub struct SqueezeExciteConfig {
    /// Number of input (and output) channels.
    pub channels: usize,

    /// Number of bottleneck channels.
    pub squeeze_channels: usize,

    /// Bottleneck activation config.
    #[config(default = "ActivationConfig::Silu")]
    pub act: ActivationConfig,
}

impl SqueezeExciteMeta for SqueezeExciteConfig {
    fn channels(&self) -> usize {
        self.channels
    }

    fn squeeze_channels(&self) -> usize {
        self.squeeze_channels
    }
}

impl SqueezeExciteConfig {
    /// Initialize a [`SqueezeExcite`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> SqueezeExcite<B> {
        SqueezeExcite {
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),

            fc1: Conv2dConfig::new([self.channels, self.squeeze_channels], [1, 1]).init(device),

            act: Ignored(self.act.init()),

            fc2: Conv2dConfig::new([self.squeeze_channels, self.channels], [1, 1]).init(device),
        }
    }
}

/// Squeeze-and-excitation block.
///
/// Implements [`SqueezeExciteMeta`].
#[derive(Module, Debug)]
pub struct SqueezeExcite<B: Backend> {
    /// Global average pool.
    pub avgpool: AdaptiveAvgPool2d,

    /// Squeeze 1x1 conv.
    pub fc1: Conv2d<B>,

    /// Bottleneck activation.
    pub act: Ignored<Activation>,

    /// Excite 1x1 conv.
    pub fc2: Conv2d<B>,
}

impl<B: Backend> SqueezeExciteMeta for SqueezeExcite<B> {
    fn channels(&self) -> usize {
        self.fc1.weight.shape().dims[1]
    }

    fn squeeze_channels(&self) -> usize {
        self.fc1.weight.shape().dims[0]
    }
}

impl<B: Backend> SqueezeExcite<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// The input re-scaled per channel; same shape as the input.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        assert_shape_contract!(
            ["batch", "channels", "height", "width"],
            &input,
            &[("channels", self.channels())]
        );

        let scale = self.avgpool.forward(input.clone());
        let scale = self.fc1.forward(scale);
        let scale = self.act.forward(scale);
        let scale = self.fc2.forward(scale);
        let scale = sigmoid(scale);

        input * scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_squeeze_excite_config() {
        let config = SqueezeExciteConfig::new(96, 4);

        assert_eq!(config.channels(), 96);
        assert_eq!(config.squeeze_channels(), 4);
        assert!(matches!(config.act, ActivationConfig::Silu));
    }

    #[test]
    fn test_squeeze_excite_forward() {
        let device = Default::default();

        let layer: SqueezeExcite<TestBackend> =
            SqueezeExciteConfig::new(16, 4).init(&device);

        assert_eq!(layer.channels(), 16);
        assert_eq!(layer.squeeze_channels(), 4);

        let input =
            Tensor::random([2, 16, 7, 7], Distribution::Uniform(0.0, 1.0), &device);
        let output = layer.forward(input.clone());

        assert_shape_contract!(
            ["batch", "channels", "height", "width"],
            &output,
            &[("batch", 2), ("channels", 16), ("height", 7), ("width", 7)],
        );

        // The gate is a per-channel scalar in (0, 1); each output position
        // must be the matching input scaled by its channel gate.
        let gate = {
            let scale = layer.avgpool.forward(input.clone());
            let scale = layer.fc1.forward(scale);
            let scale = layer.act.forward(scale);
            let scale = layer.fc2.forward(scale);
            sigmoid(scale)
        };
        let expected = input * gate;
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
