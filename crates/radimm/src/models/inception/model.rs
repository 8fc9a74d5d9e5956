//! # Inception V3 feature extractor.
//!
//! The stem convs and the eleven mixed blocks of the Inception V3
//! graph, without the classifier or auxiliary head. Follows the
//! torchvision layer layout, so torchvision checkpoints can be
//! ingested by key remapping alone.

use crate::layers::blocks::conv_norm::{ConvNormAct, ConvNormMeta};
use crate::models::inception::blocks::{
    InceptionA, InceptionAConfig, InceptionB, InceptionBConfig, InceptionC, InceptionCConfig,
    InceptionD, InceptionDConfig, InceptionE, InceptionEConfig, basic_conv,
};
use crate::utility::trainable::set_trainable;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::{Backend, Tensor};

/// [`Inception3`] Config.
///
/// The graph is fixed; there are no scaling knobs.
#[derive(Config, Debug)]
pub struct Inception3Config {}

impl Inception3Config {
    /// Number of output feature channels.
    pub fn feature_channels(&self) -> usize {
        2048
    }

    /// Initialize an [`Inception3`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Inception3<B> {
        let reduction_pool = || MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init();

        Inception3 {
            conv1a: basic_conv(device, [3, 32], [3, 3], [2, 2], [0, 0]),
            conv2a: basic_conv(device, [32, 32], [3, 3], [1, 1], [0, 0]),
            conv2b: basic_conv(device, [32, 64], [3, 3], [1, 1], [1, 1]),
            maxpool1: reduction_pool(),

            conv3b: basic_conv(device, [64, 80], [1, 1], [1, 1], [0, 0]),
            conv4a: basic_conv(device, [80, 192], [3, 3], [1, 1], [0, 0]),
            maxpool2: reduction_pool(),

            mixed_5b: InceptionAConfig::new(192, 32).init(device),
            mixed_5c: InceptionAConfig::new(256, 64).init(device),
            mixed_5d: InceptionAConfig::new(288, 64).init(device),

            mixed_6a: InceptionBConfig::new(288).init(device),
            mixed_6b: InceptionCConfig::new(768, 128).init(device),
            mixed_6c: InceptionCConfig::new(768, 160).init(device),
            mixed_6d: InceptionCConfig::new(768, 160).init(device),
            mixed_6e: InceptionCConfig::new(768, 192).init(device),

            mixed_7a: InceptionDConfig::new(768).init(device),
            mixed_7b: InceptionEConfig::new(1280).init(device),
            mixed_7c: InceptionEConfig::new(2048).init(device),
        }
    }
}

/// Inception V3 feature extractor.
///
/// The classification top is not part of this module.
#[derive(Module, Debug)]
pub struct Inception3<B: Backend> {
    /// Stem 3x3 stride-2 conv.
    pub conv1a: ConvNormAct<B>,
    /// Stem 3x3 conv.
    pub conv2a: ConvNormAct<B>,
    /// Stem 3x3 padded conv.
    pub conv2b: ConvNormAct<B>,
    /// Stem 3x3 stride-2 max pool.
    pub maxpool1: MaxPool2d,

    /// Stem 1x1 conv.
    pub conv3b: ConvNormAct<B>,
    /// Stem 3x3 conv.
    pub conv4a: ConvNormAct<B>,
    /// Stem 3x3 stride-2 max pool.
    pub maxpool2: MaxPool2d,

    /// First Inception-A block.
    pub mixed_5b: InceptionA<B>,
    /// Second Inception-A block.
    pub mixed_5c: InceptionA<B>,
    /// Third Inception-A block.
    pub mixed_5d: InceptionA<B>,

    /// Inception-B grid reduction.
    pub mixed_6a: InceptionB<B>,
    /// First Inception-C block.
    pub mixed_6b: InceptionC<B>,
    /// Second Inception-C block.
    pub mixed_6c: InceptionC<B>,
    /// Third Inception-C block.
    pub mixed_6d: InceptionC<B>,
    /// Fourth Inception-C block.
    pub mixed_6e: InceptionC<B>,

    /// Inception-D grid reduction.
    pub mixed_7a: InceptionD<B>,
    /// First Inception-E block.
    pub mixed_7b: InceptionE<B>,
    /// Second Inception-E block.
    pub mixed_7c: InceptionE<B>,
}

impl<B: Backend> Inception3<B> {
    /// Number of output feature channels.
    pub fn feature_channels(&self) -> usize {
        self.mixed_7c.out_channels()
    }

    /// The number of sequential layers in the freeze policy.
    ///
    /// Counts the five stem convs and the eleven mixed blocks; the
    /// parameter-free pools are not counted.
    pub fn num_layers(&self) -> usize {
        16
    }

    /// Freeze all but the trailing `tail` layers.
    ///
    /// Layers are counted in forward order, stem convs first, then the
    /// mixed blocks. `tail` is clamped to the layer count. Frozen
    /// layers have `require_grad` cleared on every parameter; the
    /// trailing layers have it set.
    pub fn with_trainable_tail(
        self,
        tail: usize,
    ) -> Self {
        let num_layers = self.num_layers();
        let boundary = num_layers - tail.min(num_layers);
        let on = |index: usize| index >= boundary;

        Self {
            conv1a: set_trainable(self.conv1a, on(0)),
            conv2a: set_trainable(self.conv2a, on(1)),
            conv2b: set_trainable(self.conv2b, on(2)),
            maxpool1: self.maxpool1,

            conv3b: set_trainable(self.conv3b, on(3)),
            conv4a: set_trainable(self.conv4a, on(4)),
            maxpool2: self.maxpool2,

            mixed_5b: set_trainable(self.mixed_5b, on(5)),
            mixed_5c: set_trainable(self.mixed_5c, on(6)),
            mixed_5d: set_trainable(self.mixed_5d, on(7)),

            mixed_6a: set_trainable(self.mixed_6a, on(8)),
            mixed_6b: set_trainable(self.mixed_6b, on(9)),
            mixed_6c: set_trainable(self.mixed_6c, on(10)),
            mixed_6d: set_trainable(self.mixed_6d, on(11)),
            mixed_6e: set_trainable(self.mixed_6e, on(12)),

            mixed_7a: set_trainable(self.mixed_7a, on(13)),
            mixed_7b: set_trainable(self.mixed_7b, on(14)),
            mixed_7c: set_trainable(self.mixed_7c, on(15)),
        }
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, 3, in_height, in_width]``; the grid must
    ///   be at least 75x75 to survive the stem reductions.
    ///
    /// # Returns
    ///
    /// Feature maps ``[batch, feature_channels, out_height, out_width]``;
    /// roughly a 32x grid reduction with valid-padding shrinkage.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch"],
            &[("in_channels", self.conv1a.in_channels())]
        );

        let x = self.conv1a.forward(input);
        let x = self.conv2a.forward(x);
        let x = self.conv2b.forward(x);
        let x = self.maxpool1.forward(x);

        let x = self.conv3b.forward(x);
        let x = self.conv4a.forward(x);
        let x = self.maxpool2.forward(x);

        let x = self.mixed_5b.forward(x);
        let x = self.mixed_5c.forward(x);
        let x = self.mixed_5d.forward(x);

        let x = self.mixed_6a.forward(x);
        let x = self.mixed_6b.forward(x);
        let x = self.mixed_6c.forward(x);
        let x = self.mixed_6d.forward(x);
        let x = self.mixed_6e.forward(x);

        let x = self.mixed_7a.forward(x);
        let x = self.mixed_7b.forward(x);
        let x = self.mixed_7c.forward(x);

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
