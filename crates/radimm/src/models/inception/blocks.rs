//! # Inception mixed blocks.
//!
//! The five parallel-branch block families of the Inception V3 graph.
//! Branch names follow the torchvision graph, so checkpoint keys map
//! onto the module tree without per-branch renames.

use crate::layers::blocks::conv_norm::{ConvNormAct, ConvNormActConfig, ConvNormMeta};
use burn::config::Config;
use burn::module::Module;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::Conv2dConfig;
use burn::nn::pool::{AvgPool2d, AvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::prelude::{Backend, Tensor};

/// Build a conv + batch norm + relu unit.
///
/// Batch norm runs with the graph's 1e-3 epsilon.
pub(super) fn basic_conv<B: Backend>(
    device: &B::Device,
    channels: [usize; 2],
    kernel_size: [usize; 2],
    stride: [usize; 2],
    padding: [usize; 2],
) -> ConvNormAct<B> {
    ConvNormActConfig::new(
        Conv2dConfig::new(channels, kernel_size)
            .with_stride(stride)
            .with_padding(PaddingConfig2d::Explicit(padding[0], padding[1]))
            .with_bias(false),
    )
    .with_epsilon(1e-3)
    .init(device)
}

/// A 3x3 stride-1 padded average pool, as used by the pooling branches.
fn branch_avg_pool() -> AvgPool2d {
    AvgPool2dConfig::new([3, 3])
        .with_strides([1, 1])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .init()
}

/// A 3x3 stride-2 max pool, as used by the grid-reduction blocks.
fn reduction_max_pool() -> MaxPool2d {
    MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init()
}

/// [`InceptionA`] Config.
#[derive(Config, Debug)]
pub struct InceptionAConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels on the pooling branch.
    pub pool_channels: usize,
}

impl InceptionAConfig {
    /// Initialize an [`InceptionA`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> InceptionA<B> {
        let cin = self.in_channels;
        InceptionA {
            branch1x1: basic_conv(device, [cin, 64], [1, 1], [1, 1], [0, 0]),

            branch5x5_1: basic_conv(device, [cin, 48], [1, 1], [1, 1], [0, 0]),
            branch5x5_2: basic_conv(device, [48, 64], [5, 5], [1, 1], [2, 2]),

            branch3x3dbl_1: basic_conv(device, [cin, 64], [1, 1], [1, 1], [0, 0]),
            branch3x3dbl_2: basic_conv(device, [64, 96], [3, 3], [1, 1], [1, 1]),
            branch3x3dbl_3: basic_conv(device, [96, 96], [3, 3], [1, 1], [1, 1]),

            pool: branch_avg_pool(),
            branch_pool: basic_conv(device, [cin, self.pool_channels], [1, 1], [1, 1], [0, 0]),
        }
    }
}

/// Inception-A block: 1x1, 5x5, double-3x3, and pooled 1x1 branches.
///
/// Preserves the grid; widens the channels to ``224 + pool_channels``.
#[derive(Module, Debug)]
pub struct InceptionA<B: Backend> {
    /// 1x1 branch.
    pub branch1x1: ConvNormAct<B>,

    /// 5x5 branch reduction.
    pub branch5x5_1: ConvNormAct<B>,
    /// 5x5 branch conv.
    pub branch5x5_2: ConvNormAct<B>,

    /// Double-3x3 branch reduction.
    pub branch3x3dbl_1: ConvNormAct<B>,
    /// Double-3x3 branch first conv.
    pub branch3x3dbl_2: ConvNormAct<B>,
    /// Double-3x3 branch second conv.
    pub branch3x3dbl_3: ConvNormAct<B>,

    /// Pooling branch average pool.
    pub pool: AvgPool2d,
    /// Pooling branch projection.
    pub branch_pool: ConvNormAct<B>,
}

impl<B: Backend> InceptionA<B> {
    /// Number of input channels.
    pub fn in_channels(&self) -> usize {
        self.branch1x1.in_channels()
    }

    /// Number of concatenated output channels.
    pub fn out_channels(&self) -> usize {
        self.branch1x1.out_channels()
            + self.branch5x5_2.out_channels()
            + self.branch3x3dbl_3.out_channels()
            + self.branch_pool.out_channels()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, height, width]``.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let branch1x1 = self.branch1x1.forward(input.clone());

        let branch5x5 = self.branch5x5_1.forward(input.clone());
        let branch5x5 = self.branch5x5_2.forward(branch5x5);

        let branch3x3dbl = self.branch3x3dbl_1.forward(input.clone());
        let branch3x3dbl = self.branch3x3dbl_2.forward(branch3x3dbl);
        let branch3x3dbl = self.branch3x3dbl_3.forward(branch3x3dbl);

        let branch_pool = self.branch_pool.forward(self.pool.forward(input));

        Tensor::cat(vec![branch1x1, branch5x5, branch3x3dbl, branch_pool], 1)
    }
}

/// [`InceptionB`] Config.
#[derive(Config, Debug)]
pub struct InceptionBConfig {
    /// Number of input channels.
    pub in_channels: usize,
}

impl InceptionBConfig {
    /// Initialize an [`InceptionB`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> InceptionB<B> {
        let cin = self.in_channels;
        InceptionB {
            branch3x3: basic_conv(device, [cin, 384], [3, 3], [2, 2], [0, 0]),

            branch3x3dbl_1: basic_conv(device, [cin, 64], [1, 1], [1, 1], [0, 0]),
            branch3x3dbl_2: basic_conv(device, [64, 96], [3, 3], [1, 1], [1, 1]),
            branch3x3dbl_3: basic_conv(device, [96, 96], [3, 3], [2, 2], [0, 0]),

            pool: reduction_max_pool(),
        }
    }
}

/// Inception-B grid reduction: strided 3x3, strided double-3x3, and
/// max-pool branches.
#[derive(Module, Debug)]
pub struct InceptionB<B: Backend> {
    /// Strided 3x3 branch.
    pub branch3x3: ConvNormAct<B>,

    /// Double-3x3 branch reduction.
    pub branch3x3dbl_1: ConvNormAct<B>,
    /// Double-3x3 branch first conv.
    pub branch3x3dbl_2: ConvNormAct<B>,
    /// Double-3x3 branch strided conv.
    pub branch3x3dbl_3: ConvNormAct<B>,

    /// Pooling branch max pool.
    pub pool: MaxPool2d,
}

impl<B: Backend> InceptionB<B> {
    /// Number of input channels.
    pub fn in_channels(&self) -> usize {
        self.branch3x3.in_channels()
    }

    /// Number of concatenated output channels.
    pub fn out_channels(&self) -> usize {
        self.branch3x3.out_channels() + self.branch3x3dbl_3.out_channels() + self.in_channels()
    }

    /// Forward Pass; halves the grid.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let branch3x3 = self.branch3x3.forward(input.clone());

        let branch3x3dbl = self.branch3x3dbl_1.forward(input.clone());
        let branch3x3dbl = self.branch3x3dbl_2.forward(branch3x3dbl);
        let branch3x3dbl = self.branch3x3dbl_3.forward(branch3x3dbl);

        let branch_pool = self.pool.forward(input);

        Tensor::cat(vec![branch3x3, branch3x3dbl, branch_pool], 1)
    }
}

/// [`InceptionC`] Config.
#[derive(Config, Debug)]
pub struct InceptionCConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Bottleneck width of the factorized 7x7 branches.
    pub channels_7x7: usize,
}

impl InceptionCConfig {
    /// Initialize an [`InceptionC`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> InceptionC<B> {
        let cin = self.in_channels;
        let c7 = self.channels_7x7;
        InceptionC {
            branch1x1: basic_conv(device, [cin, 192], [1, 1], [1, 1], [0, 0]),

            branch7x7_1: basic_conv(device, [cin, c7], [1, 1], [1, 1], [0, 0]),
            branch7x7_2: basic_conv(device, [c7, c7], [1, 7], [1, 1], [0, 3]),
            branch7x7_3: basic_conv(device, [c7, 192], [7, 1], [1, 1], [3, 0]),

            branch7x7dbl_1: basic_conv(device, [cin, c7], [1, 1], [1, 1], [0, 0]),
            branch7x7dbl_2: basic_conv(device, [c7, c7], [7, 1], [1, 1], [3, 0]),
            branch7x7dbl_3: basic_conv(device, [c7, c7], [1, 7], [1, 1], [0, 3]),
            branch7x7dbl_4: basic_conv(device, [c7, c7], [7, 1], [1, 1], [3, 0]),
            branch7x7dbl_5: basic_conv(device, [c7, 192], [1, 7], [1, 1], [0, 3]),

            pool: branch_avg_pool(),
            branch_pool: basic_conv(device, [cin, 192], [1, 1], [1, 1], [0, 0]),
        }
    }
}

/// Inception-C block: 1x1, factorized-7x7, double factorized-7x7, and
/// pooled 1x1 branches. Preserves the grid at 768 channels.
#[derive(Module, Debug)]
pub struct InceptionC<B: Backend> {
    /// 1x1 branch.
    pub branch1x1: ConvNormAct<B>,

    /// 7x7 branch reduction.
    pub branch7x7_1: ConvNormAct<B>,
    /// 7x7 branch 1x7 conv.
    pub branch7x7_2: ConvNormAct<B>,
    /// 7x7 branch 7x1 conv.
    pub branch7x7_3: ConvNormAct<B>,

    /// Double-7x7 branch reduction.
    pub branch7x7dbl_1: ConvNormAct<B>,
    /// Double-7x7 branch convs, alternating 7x1 and 1x7.
    pub branch7x7dbl_2: ConvNormAct<B>,
    /// See [`Self::branch7x7dbl_2`].
    pub branch7x7dbl_3: ConvNormAct<B>,
    /// See [`Self::branch7x7dbl_2`].
    pub branch7x7dbl_4: ConvNormAct<B>,
    /// See [`Self::branch7x7dbl_2`].
    pub branch7x7dbl_5: ConvNormAct<B>,

    /// Pooling branch average pool.
    pub pool: AvgPool2d,
    /// Pooling branch projection.
    pub branch_pool: ConvNormAct<B>,
}

impl<B: Backend> InceptionC<B> {
    /// Number of input channels.
    pub fn in_channels(&self) -> usize {
        self.branch1x1.in_channels()
    }

    /// Number of concatenated output channels.
    pub fn out_channels(&self) -> usize {
        self.branch1x1.out_channels()
            + self.branch7x7_3.out_channels()
            + self.branch7x7dbl_5.out_channels()
            + self.branch_pool.out_channels()
    }

    /// Forward Pass; preserves the grid.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let branch1x1 = self.branch1x1.forward(input.clone());

        let branch7x7 = self.branch7x7_1.forward(input.clone());
        let branch7x7 = self.branch7x7_2.forward(branch7x7);
        let branch7x7 = self.branch7x7_3.forward(branch7x7);

        let branch7x7dbl = self.branch7x7dbl_1.forward(input.clone());
        let branch7x7dbl = self.branch7x7dbl_2.forward(branch7x7dbl);
        let branch7x7dbl = self.branch7x7dbl_3.forward(branch7x7dbl);
        let branch7x7dbl = self.branch7x7dbl_4.forward(branch7x7dbl);
        let branch7x7dbl = self.branch7x7dbl_5.forward(branch7x7dbl);

        let branch_pool = self.branch_pool.forward(self.pool.forward(input));

        Tensor::cat(vec![branch1x1, branch7x7, branch7x7dbl, branch_pool], 1)
    }
}

/// [`InceptionD`] Config.
#[derive(Config, Debug)]
pub struct InceptionDConfig {
    /// Number of input channels.
    pub in_channels: usize,
}

impl InceptionDConfig {
    /// Initialize an [`InceptionD`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> InceptionD<B> {
        let cin = self.in_channels;
        InceptionD {
            branch3x3_1: basic_conv(device, [cin, 192], [1, 1], [1, 1], [0, 0]),
            branch3x3_2: basic_conv(device, [192, 320], [3, 3], [2, 2], [0, 0]),

            branch7x7x3_1: basic_conv(device, [cin, 192], [1, 1], [1, 1], [0, 0]),
            branch7x7x3_2: basic_conv(device, [192, 192], [1, 7], [1, 1], [0, 3]),
            branch7x7x3_3: basic_conv(device, [192, 192], [7, 1], [1, 1], [3, 0]),
            branch7x7x3_4: basic_conv(device, [192, 192], [3, 3], [2, 2], [0, 0]),

            pool: reduction_max_pool(),
        }
    }
}

/// Inception-D grid reduction: strided 3x3, factorized 7x7 into a
/// strided 3x3, and max-pool branches.
#[derive(Module, Debug)]
pub struct InceptionD<B: Backend> {
    /// 3x3 branch reduction.
    pub branch3x3_1: ConvNormAct<B>,
    /// 3x3 branch strided conv.
    pub branch3x3_2: ConvNormAct<B>,

    /// 7x7-then-3x3 branch reduction.
    pub branch7x7x3_1: ConvNormAct<B>,
    /// 7x7-then-3x3 branch 1x7 conv.
    pub branch7x7x3_2: ConvNormAct<B>,
    /// 7x7-then-3x3 branch 7x1 conv.
    pub branch7x7x3_3: ConvNormAct<B>,
    /// 7x7-then-3x3 branch strided conv.
    pub branch7x7x3_4: ConvNormAct<B>,

    /// Pooling branch max pool.
    pub pool: MaxPool2d,
}

impl<B: Backend> InceptionD<B> {
    /// Number of input channels.
    pub fn in_channels(&self) -> usize {
        self.branch3x3_1.in_channels()
    }

    /// Number of concatenated output channels.
    pub fn out_channels(&self) -> usize {
        self.branch3x3_2.out_channels() + self.branch7x7x3_4.out_channels() + self.in_channels()
    }

    /// Forward Pass; halves the grid.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let branch3x3 = self.branch3x3_1.forward(input.clone());
        let branch3x3 = self.branch3x3_2.forward(branch3x3);

        let branch7x7x3 = self.branch7x7x3_1.forward(input.clone());
        let branch7x7x3 = self.branch7x7x3_2.forward(branch7x7x3);
        let branch7x7x3 = self.branch7x7x3_3.forward(branch7x7x3);
        let branch7x7x3 = self.branch7x7x3_4.forward(branch7x7x3);

        let branch_pool = self.pool.forward(input);

        Tensor::cat(vec![branch3x3, branch7x7x3, branch_pool], 1)
    }
}

/// [`InceptionE`] Config.
#[derive(Config, Debug)]
pub struct InceptionEConfig {
    /// Number of input channels.
    pub in_channels: usize,
}

impl InceptionEConfig {
    /// Initialize an [`InceptionE`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> InceptionE<B> {
        let cin = self.in_channels;
        InceptionE {
            branch1x1: basic_conv(device, [cin, 320], [1, 1], [1, 1], [0, 0]),

            branch3x3_1: basic_conv(device, [cin, 384], [1, 1], [1, 1], [0, 0]),
            branch3x3_2a: basic_conv(device, [384, 384], [1, 3], [1, 1], [0, 1]),
            branch3x3_2b: basic_conv(device, [384, 384], [3, 1], [1, 1], [1, 0]),

            branch3x3dbl_1: basic_conv(device, [cin, 448], [1, 1], [1, 1], [0, 0]),
            branch3x3dbl_2: basic_conv(device, [448, 384], [3, 3], [1, 1], [1, 1]),
            branch3x3dbl_3a: basic_conv(device, [384, 384], [1, 3], [1, 1], [0, 1]),
            branch3x3dbl_3b: basic_conv(device, [384, 384], [3, 1], [1, 1], [1, 0]),

            pool: branch_avg_pool(),
            branch_pool: basic_conv(device, [cin, 192], [1, 1], [1, 1], [0, 0]),
        }
    }
}

/// Inception-E block: 1x1, forked-3x3, forked double-3x3, and pooled
/// 1x1 branches. Preserves the grid at 2048 channels.
#[derive(Module, Debug)]
pub struct InceptionE<B: Backend> {
    /// 1x1 branch.
    pub branch1x1: ConvNormAct<B>,

    /// Forked 3x3 branch reduction.
    pub branch3x3_1: ConvNormAct<B>,
    /// Forked 3x3 branch 1x3 tine.
    pub branch3x3_2a: ConvNormAct<B>,
    /// Forked 3x3 branch 3x1 tine.
    pub branch3x3_2b: ConvNormAct<B>,

    /// Forked double-3x3 branch reduction.
    pub branch3x3dbl_1: ConvNormAct<B>,
    /// Forked double-3x3 branch 3x3 conv.
    pub branch3x3dbl_2: ConvNormAct<B>,
    /// Forked double-3x3 branch 1x3 tine.
    pub branch3x3dbl_3a: ConvNormAct<B>,
    /// Forked double-3x3 branch 3x1 tine.
    pub branch3x3dbl_3b: ConvNormAct<B>,

    /// Pooling branch average pool.
    pub pool: AvgPool2d,
    /// Pooling branch projection.
    pub branch_pool: ConvNormAct<B>,
}

impl<B: Backend> InceptionE<B> {
    /// Number of input channels.
    pub fn in_channels(&self) -> usize {
        self.branch1x1.in_channels()
    }

    /// Number of concatenated output channels.
    pub fn out_channels(&self) -> usize {
        self.branch1x1.out_channels()
            + self.branch3x3_2a.out_channels()
            + self.branch3x3_2b.out_channels()
            + self.branch3x3dbl_3a.out_channels()
            + self.branch3x3dbl_3b.out_channels()
            + self.branch_pool.out_channels()
    }

    /// Forward Pass; preserves the grid.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let branch1x1 = self.branch1x1.forward(input.clone());

        let branch3x3 = self.branch3x3_1.forward(input.clone());
        let branch3x3 = Tensor::cat(
            vec![
                self.branch3x3_2a.forward(branch3x3.clone()),
                self.branch3x3_2b.forward(branch3x3),
            ],
            1,
        );

        let branch3x3dbl = self.branch3x3dbl_1.forward(input.clone());
        let branch3x3dbl = self.branch3x3dbl_2.forward(branch3x3dbl);
        let branch3x3dbl = Tensor::cat(
            vec![
                self.branch3x3dbl_3a.forward(branch3x3dbl.clone()),
                self.branch3x3dbl_3b.forward(branch3x3dbl),
            ],
            1,
        );

        let branch_pool = self.branch_pool.forward(self.pool.forward(input));

        Tensor::cat(vec![branch1x1, branch3x3, branch3x3dbl, branch_pool], 1)
    }
}
