//! # `InvertedResidual` - `MobileNetV2` bottleneck block.
//!
//! An expand 1x1 conv (omitted when the expansion ratio is 1), a 3x3
//! depthwise conv, and a linear 1x1 projection. When the block keeps
//! the resolution and channel count, the input is added back.

use crate::layers::activation::ActivationConfig;
use crate::layers::blocks::conv_norm::{
    ConvNorm, ConvNormAct, ConvNormActConfig, ConvNormConfig, ConvNormMeta,
};
use burn::config::Config;
use burn::module::Module;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::Conv2dConfig;
use burn::prelude::{Backend, Tensor};

/// [`InvertedResidual`] Config.
#[derive(Config, Debug)]
pub struct InvertedResidualConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,

    /// Stride of the depthwise conv.
    pub stride: usize,

    /// Channel expansion ratio.
    pub expand_ratio: usize,
}

impl InvertedResidualConfig {
    /// Number of expanded (depthwise) channels.
    pub fn hidden_channels(&self) -> usize {
        self.in_channels * self.expand_ratio
    }

    /// Whether the block carries a residual connection.
    pub fn has_residual(&self) -> bool {
        self.stride == 1 && self.in_channels == self.out_channels
    }

    /// Initialize an [`InvertedResidual`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> InvertedResidual<B> {
        let hidden = self.hidden_channels();

        let expand = (self.expand_ratio != 1).then(|| {
            ConvNormActConfig::new(
                Conv2dConfig::new([self.in_channels, hidden], [1, 1]).with_bias(false),
            )
            .with_act(ActivationConfig::Relu6)
            .init(device)
        });

        let depthwise = ConvNormActConfig::new(
            Conv2dConfig::new([hidden, hidden], [3, 3])
                .with_stride([self.stride, self.stride])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_groups(hidden)
                .with_bias(false),
        )
        .with_act(ActivationConfig::Relu6)
        .init(device);

        let project = ConvNormConfig::new(
            Conv2dConfig::new([hidden, self.out_channels], [1, 1]).with_bias(false),
        )
        .init(device);

        InvertedResidual {
            expand,
            depthwise,
            project,
        }
    }
}

/// `MobileNetV2` inverted residual block.
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    /// Optional 1x1 channel expansion; absent when the expansion ratio is 1.
    pub expand: Option<ConvNormAct<B>>,

    /// 3x3 depthwise (grouped) conv.
    pub depthwise: ConvNormAct<B>,

    /// Linear 1x1 projection.
    pub project: ConvNorm<B>,
}

impl<B: Backend> InvertedResidual<B> {
    /// Number of input channels.
    pub fn in_channels(&self) -> usize {
        match &self.expand {
            Some(layer) => layer.in_channels(),
            None => self.depthwise.in_channels(),
        }
    }

    /// Number of output channels.
    pub fn out_channels(&self) -> usize {
        self.project.out_channels()
    }

    /// Whether the block carries a residual connection.
    pub fn has_residual(&self) -> bool {
        self.depthwise.stride() == [1, 1] && self.in_channels() == self.out_channels()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, in_height / stride, in_width / stride]``.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let identity = input.clone();

        let x = match &self.expand {
            Some(layer) => layer.forward(input),
            None => input,
        };
        let x = self.depthwise.forward(x);
        let x = self.project.forward(x);

        if self.has_residual() {
            x + identity
        } else {
            x
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_inverted_residual_config() {
        let config = InvertedResidualConfig::new(16, 24, 2, 6);
        assert_eq!(config.hidden_channels(), 96);
        assert!(!config.has_residual());

        let config = InvertedResidualConfig::new(32, 32, 1, 6);
        assert!(config.has_residual());

        // Stride 1 alone is not enough.
        let config = InvertedResidualConfig::new(16, 24, 1, 6);
        assert!(!config.has_residual());
    }

    #[test]
    fn test_expand_block_forward() {
        let device = Default::default();

        let block: InvertedResidual<TestBackend> =
            InvertedResidualConfig::new(16, 24, 2, 6).init(&device);

        assert!(block.expand.is_some());
        assert_eq!(block.in_channels(), 16);
        assert_eq!(block.out_channels(), 24);
        assert!(!block.has_residual());

        let input = Tensor::random([2, 16, 10, 10], Distribution::Default, &device);
        let output = block.forward(input);

        assert_shape_contract!(
            ["batch", "channels", "height", "width"],
            &output,
            &[("batch", 2), ("channels", 24), ("height", 5), ("width", 5)],
        );
    }

    #[test]
    fn test_no_expand_block_forward() {
        let device = Default::default();

        let block: InvertedResidual<TestBackend> =
            InvertedResidualConfig::new(32, 16, 1, 1).init(&device);

        assert!(block.expand.is_none());
        assert_eq!(block.in_channels(), 32);
        assert_eq!(block.out_channels(), 16);

        let input = Tensor::random([1, 32, 8, 8], Distribution::Default, &device);
        let output = block.forward(input);

        assert_eq!(output.dims(), [1, 16, 8, 8]);
    }

    #[test]
    fn test_residual_block_forward() {
        let device = Default::default();

        let block: InvertedResidual<TestBackend> =
            InvertedResidualConfig::new(32, 32, 1, 6).init(&device);

        assert!(block.has_residual());

        let input = Tensor::random([1, 32, 8, 8], Distribution::Default, &device);
        let output = block.forward(input.clone());

        assert_eq!(output.dims(), [1, 32, 8, 8]);

        // The residual path preserves the input contribution.
        let branch = {
            let x = block.expand.as_ref().unwrap().forward(input.clone());
            let x = block.depthwise.forward(x);
            block.project.forward(x)
        };
        output
            .to_data()
            .assert_eq(&(branch + input).to_data(), true);
    }
}
