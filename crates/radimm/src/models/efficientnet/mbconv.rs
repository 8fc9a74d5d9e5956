//! # `MbConv` - `EfficientNet` mobile inverted bottleneck block.
//!
//! An expand 1x1 conv (omitted when the expanded width equals the input
//! width), a depthwise conv, squeeze-and-excitation, and a linear 1x1
//! projection. When the block keeps the resolution and channel count,
//! the input is added back through a drop-path gate.

use crate::layers::activation::ActivationConfig;
use crate::layers::blocks::conv_norm::{
    ConvNorm, ConvNormAct, ConvNormActConfig, ConvNormConfig, ConvNormMeta,
};
use crate::layers::blocks::squeeze_excite::{SqueezeExcite, SqueezeExciteConfig};
use crate::layers::drop::drop_path::{DropPath, DropPathConfig};
use crate::models::mobilenet::make_divisible;
use burn::config::Config;
use burn::module::Module;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::Conv2dConfig;
use burn::prelude::{Backend, Tensor};

/// [`MbConv`] Config.
#[derive(Config, Debug)]
pub struct MbConvConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,

    /// Kernel size of the depthwise conv.
    pub kernel_size: usize,

    /// Stride of the depthwise conv.
    pub stride: usize,

    /// Channel expansion ratio.
    pub expand_ratio: usize,

    /// Per-sample drop rate for the residual branch.
    #[config(default = 0.0)]
    pub drop_path_prob: f64,
}

impl MbConvConfig {
    /// Number of expanded (depthwise) channels.
    pub fn hidden_channels(&self) -> usize {
        make_divisible((self.in_channels * self.expand_ratio) as f64, 8)
    }

    /// Number of squeeze-and-excitation bottleneck channels.
    ///
    /// A quarter of the block input width, never less than 1.
    pub fn squeeze_channels(&self) -> usize {
        usize::max(1, self.in_channels / 4)
    }

    /// Whether the block carries a residual connection.
    pub fn has_residual(&self) -> bool {
        self.stride == 1 && self.in_channels == self.out_channels
    }

    /// Initialize an [`MbConv`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> MbConv<B> {
        let hidden = self.hidden_channels();
        let padding = (self.kernel_size - 1) / 2;

        let expand = (hidden != self.in_channels).then(|| {
            ConvNormActConfig::new(
                Conv2dConfig::new([self.in_channels, hidden], [1, 1]).with_bias(false),
            )
            .with_act(ActivationConfig::Silu)
            .init(device)
        });

        let depthwise = ConvNormActConfig::new(
            Conv2dConfig::new([hidden, hidden], [self.kernel_size, self.kernel_size])
                .with_stride([self.stride, self.stride])
                .with_padding(PaddingConfig2d::Explicit(padding, padding))
                .with_groups(hidden)
                .with_bias(false),
        )
        .with_act(ActivationConfig::Silu)
        .init(device);

        let se = SqueezeExciteConfig::new(hidden, self.squeeze_channels()).init(device);

        let project = ConvNormConfig::new(
            Conv2dConfig::new([hidden, self.out_channels], [1, 1]).with_bias(false),
        )
        .init(device);

        let drop_path = DropPathConfig::new()
            .with_drop_prob(self.drop_path_prob)
            .init();

        MbConv {
            expand,
            depthwise,
            se,
            project,
            drop_path,
        }
    }
}

/// `EfficientNet` mobile inverted bottleneck block.
#[derive(Module, Debug)]
pub struct MbConv<B: Backend> {
    /// Optional 1x1 channel expansion; absent when no expansion is needed.
    pub expand: Option<ConvNormAct<B>>,

    /// Depthwise (grouped) conv.
    pub depthwise: ConvNormAct<B>,

    /// Squeeze-and-excitation gate over the expanded channels.
    pub se: SqueezeExcite<B>,

    /// Linear 1x1 projection.
    pub project: ConvNorm<B>,

    /// Per-sample residual branch dropout.
    pub drop_path: DropPath,
}

impl<B: Backend> MbConv<B> {
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
        let x = self.se.forward(x);
        let x = self.project.forward(x);

        if self.has_residual() {
            self.drop_path.forward(x) + identity
        } else {
            x
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::blocks::squeeze_excite::SqueezeExciteMeta;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_mbconv_config() {
        let config = MbConvConfig::new(24, 40, 5, 2, 6);
        assert_eq!(config.hidden_channels(), 144);
        assert_eq!(config.squeeze_channels(), 6);
        assert!(!config.has_residual());

        let config = MbConvConfig::new(40, 24, 3, 1, 1);
        assert_eq!(config.hidden_channels(), 40);
        assert_eq!(config.squeeze_channels(), 10);
        assert!(!config.has_residual());

        let config = MbConvConfig::new(96, 96, 5, 1, 6).with_drop_path_prob(0.1);
        assert!(config.has_residual());
        assert_eq!(config.drop_path_prob, 0.1);

        // A narrow block never squeezes below one channel.
        let config = MbConvConfig::new(2, 2, 3, 1, 6);
        assert_eq!(config.squeeze_channels(), 1);
    }

    #[test]
    fn test_expand_block_forward() {
        let device = Default::default();

        let block: MbConv<TestBackend> = MbConvConfig::new(16, 24, 3, 2, 6).init(&device);

        assert!(block.expand.is_some());
        assert_eq!(block.in_channels(), 16);
        assert_eq!(block.out_channels(), 24);
        assert_eq!(block.se.squeeze_channels(), 4);
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
    fn test_wide_kernel_block_forward() {
        let device = Default::default();

        let block: MbConv<TestBackend> = MbConvConfig::new(24, 40, 5, 2, 6).init(&device);

        let input = Tensor::random([1, 24, 10, 10], Distribution::Default, &device);
        let output = block.forward(input);

        assert_eq!(output.dims(), [1, 40, 5, 5]);
    }

    #[test]
    fn test_no_expand_block_forward() {
        let device = Default::default();

        let block: MbConv<TestBackend> = MbConvConfig::new(32, 16, 3, 1, 1).init(&device);

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

        let block: MbConv<TestBackend> = MbConvConfig::new(32, 32, 3, 1, 6)
            .with_drop_path_prob(0.5)
            .init(&device);

        assert!(block.has_residual());

        let input = Tensor::random([1, 32, 8, 8], Distribution::Default, &device);
        let output = block.forward(input.clone());

        assert_eq!(output.dims(), [1, 32, 8, 8]);

        // Drop-path is inert outside of training, so the residual path
        // preserves the input contribution exactly.
        let branch = {
            let x = block.expand.as_ref().unwrap().forward(input.clone());
            let x = block.depthwise.forward(x);
            let x = block.se.forward(x);
            block.project.forward(x)
        };
        output
            .to_data()
            .assert_eq(&(branch + input).to_data(), true);
    }
}
