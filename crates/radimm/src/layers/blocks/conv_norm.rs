//! # `ConvNorm` / `ConvNormAct` - conv/norm(/activation) blocks.

use crate::layers::activation::{Activation, ActivationConfig};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig};
use burn::prelude::{Backend, Tensor};

/// Common meta API for conv/norm blocks and their configs.
pub trait ConvNormMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of groups.
    fn groups(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Get the stride.
    fn stride(&self) -> [usize; 2];
}

/// [`ConvNorm`] Config.
///
/// Implements [`ConvNormMeta`].
#[derive(Config, Debug)]
pub struct ConvNormConfig {
    /// The [`Conv2d`] config.
    pub conv: Conv2dConfig,

    /// Batch norm epsilon.
    #[config(default = 1e-5)]
    pub epsilon: f64,
}

impl From<Conv2dConfig> for ConvNormConfig {
    fn from(conv: Conv2dConfig) -> Self {
        ConvNormConfig::new(conv)
    }
}

impl ConvNormMeta for ConvNormConfig {
    fn in_channels(&self) -> usize {
        self.conv.channels[0]
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.channels[1]
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl ConvNormConfig {
    /// Initialize a [`ConvNorm`].
    ///
    /// The norm layer features are matched to the conv output channels.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ConvNorm<B> {
        ConvNorm {
            conv: self.conv.init(device),

            norm: BatchNormConfig::new(self.conv.channels[1])
                .with_epsilon(self.epsilon)
                .init(device),
        }
    }
}

/// Grouped [`Conv2d`] and [`BatchNorm`] layer.
///
/// Implements [`ConvNormMeta`].
#[derive(Module, Debug)]
pub struct ConvNorm<B: Backend> {
    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Internal Norm Layer.
    pub norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvNormMeta for ConvNorm<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.groups()
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl<B: Backend> ConvNorm<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.conv.forward(input);

        self.norm.forward(x)
    }
}

/// [`ConvNormAct`] Config.
///
/// Implements [`ConvNormMeta`].
#[derive(Config, Debug)]
pub struct ConvNormActConfig {
    /// The [`Conv2d`] config.
    pub conv: Conv2dConfig,

    /// Batch norm epsilon.
    #[config(default = 1e-5)]
    pub epsilon: f64,

    /// The [`Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,
}

impl From<Conv2dConfig> for ConvNormActConfig {
    fn from(conv: Conv2dConfig) -> Self {
        ConvNormActConfig::new(conv)
    }
}

impl ConvNormMeta for ConvNormActConfig {
    fn in_channels(&self) -> usize {
        self.conv.channels[0]
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.channels[1]
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl ConvNormActConfig {
    /// Initialize a [`ConvNormAct`].
    ///
    /// The norm layer features are matched to the conv output channels.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ConvNormAct<B> {
        ConvNormAct {
            conv: self.conv.init(device),

            norm: BatchNormConfig::new(self.conv.channels[1])
                .with_epsilon(self.epsilon)
                .init(device),

            act: Ignored(self.act.init()),
        }
    }
}

/// Sequenced conv/norm/activation block.
///
/// Implements [`ConvNormMeta`].
#[derive(Module, Debug)]
pub struct ConvNormAct<B: Backend> {
    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Internal Norm Layer.
    pub norm: BatchNorm<B, 2>,

    /// Activation layer.
    pub act: Ignored<Activation>,
}

impl<B: Backend> ConvNormMeta for ConvNormAct<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.groups()
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl<B: Backend> ConvNormAct<B> {
    /// Forward Pass.
    ///
    /// Applies the conv, norm, and activation layers in sequence.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``; the output
    /// resolution follows the conv stride and padding.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch"],
            &[("in_channels", self.in_channels())]
        );

        let x = self.conv.forward(input);
        let x = self.norm.forward(x);
        let x = self.act.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[("batch", batch), ("out_channels", self.out_channels())]
        );

        x
    }
}
