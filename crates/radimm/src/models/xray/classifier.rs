//! # Chest X-ray transfer classifier.
//!
//! A classification head over one of three ImageNet feature
//! extractors. The backbone is frozen apart from a trailing window of
//! layers; the head pools, flattens, optionally drops out, and applies
//! a linear layer with a softmax over the classes.

use crate::cache::weights::PretrainedWeightsDescriptor;
use crate::layers::pool::{Pool2d, Pool2dConfig, PoolKind};
use crate::models::efficientnet::{EfficientNet, EfficientNetConfig, PREFAB_EFFICIENTNET_MAP};
use crate::models::inception::{Inception3, Inception3Config, PREFAB_INCEPTION_V3_MAP};
use crate::models::mobilenet::{MobileNetV2, MobileNetV2Config, PREFAB_MOBILENET_V2_MAP};
use crate::utility::probability::expect_probability;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::softmax;
use std::path::PathBuf;

/// Backbone architecture selector.
#[derive(Config, Debug, PartialEq)]
pub enum XrayArch {
    /// EfficientNet-B3.
    EfficientNetB3,

    /// Inception V3.
    InceptionV3,

    /// MobileNetV2 1.0x.
    MobileNetV2,
}

impl XrayArch {
    /// The head pooling flavor paired with this backbone.
    ///
    /// MobileNetV2 pairs with max pooling; the other backbones pool by
    /// averaging.
    pub fn pool_kind(&self) -> PoolKind {
        match self {
            Self::EfficientNetB3 | Self::InceptionV3 => PoolKind::Average,
            Self::MobileNetV2 => PoolKind::Max,
        }
    }

    /// Number of backbone feature channels.
    pub fn feature_channels(&self) -> usize {
        match self {
            Self::EfficientNetB3 => EfficientNetConfig::b3().feature_channels(),
            Self::InceptionV3 => Inception3Config::new().feature_channels(),
            Self::MobileNetV2 => MobileNetV2Config::new().feature_channels(),
        }
    }

    /// Backbone feature map side length for a square input.
    pub fn feature_map_size(
        &self,
        image_size: usize,
    ) -> usize {
        match self {
            // Five stride-2 stages with "same" padding.
            Self::EfficientNetB3 | Self::MobileNetV2 => {
                (0..5).fold(image_size, |size, _| size.div_ceil(2))
            }

            // The valid-padding stem and reduction blocks.
            Self::InceptionV3 => {
                let reduce = |size: usize| (size - 3) / 2 + 1;

                let size = reduce(image_size); // conv1a
                let size = size - 2; // conv2a
                let size = reduce(size); // maxpool1
                let size = size - 2; // conv4a
                let size = reduce(size); // maxpool2
                let size = reduce(size); // mixed_6a
                reduce(size) // mixed_7a
            }
        }
    }

    /// The ImageNet weights descriptor for this backbone.
    pub fn pretrained_weights(&self) -> PretrainedWeightsDescriptor {
        match self {
            Self::EfficientNetB3 => PREFAB_EFFICIENTNET_MAP
                .expect_lookup_prefab("efficientnet_b3")
                .expect_lookup_pretrained_weights("tv_in1k"),
            Self::InceptionV3 => PREFAB_INCEPTION_V3_MAP
                .expect_lookup_prefab("inception_v3")
                .expect_lookup_pretrained_weights("tv_in1k"),
            Self::MobileNetV2 => PREFAB_MOBILENET_V2_MAP
                .expect_lookup_prefab("mobilenet_v2")
                .expect_lookup_pretrained_weights("tv_in1k"),
        }
    }

    /// Initialize a fully trainable backbone.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> XrayBackbone<B> {
        match self {
            Self::EfficientNetB3 => EfficientNetConfig::b3().init(device).into(),
            Self::InceptionV3 => Inception3Config::new().init(device).into(),
            Self::MobileNetV2 => MobileNetV2Config::new().init(device).into(),
        }
    }
}

/// One of the supported feature extractors.
///
/// Dispatches the shared backbone surface over the concrete model.
#[derive(Module, Debug)]
pub enum XrayBackbone<B: Backend> {
    /// EfficientNet-B3.
    EfficientNetB3(EfficientNet<B>),

    /// Inception V3.
    InceptionV3(Inception3<B>),

    /// MobileNetV2 1.0x.
    MobileNetV2(MobileNetV2<B>),
}

impl<B: Backend> From<EfficientNet<B>> for XrayBackbone<B> {
    fn from(model: EfficientNet<B>) -> Self {
        Self::EfficientNetB3(model)
    }
}

impl<B: Backend> From<Inception3<B>> for XrayBackbone<B> {
    fn from(model: Inception3<B>) -> Self {
        Self::InceptionV3(model)
    }
}

impl<B: Backend> From<MobileNetV2<B>> for XrayBackbone<B> {
    fn from(model: MobileNetV2<B>) -> Self {
        Self::MobileNetV2(model)
    }
}

impl<B: Backend> XrayBackbone<B> {
    /// The architecture selector for this backbone.
    pub fn arch(&self) -> XrayArch {
        match self {
            Self::EfficientNetB3(_) => XrayArch::EfficientNetB3,
            Self::InceptionV3(_) => XrayArch::InceptionV3,
            Self::MobileNetV2(_) => XrayArch::MobileNetV2,
        }
    }

    /// Number of output feature channels.
    pub fn feature_channels(&self) -> usize {
        match self {
            Self::EfficientNetB3(model) => model.feature_channels(),
            Self::InceptionV3(model) => model.feature_channels(),
            Self::MobileNetV2(model) => model.feature_channels(),
        }
    }

    /// The number of sequential layers in the freeze policy.
    pub fn num_layers(&self) -> usize {
        match self {
            Self::EfficientNetB3(model) => model.num_layers(),
            Self::InceptionV3(model) => model.num_layers(),
            Self::MobileNetV2(model) => model.num_layers(),
        }
    }

    /// Freeze all but the trailing `tail` layers.
    ///
    /// `tail` is clamped to the layer count.
    pub fn with_trainable_tail(
        self,
        tail: usize,
    ) -> Self {
        match self {
            Self::EfficientNetB3(model) => Self::EfficientNetB3(model.with_trainable_tail(tail)),
            Self::InceptionV3(model) => Self::InceptionV3(model.with_trainable_tail(tail)),
            Self::MobileNetV2(model) => Self::MobileNetV2(model.with_trainable_tail(tail)),
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
    /// Feature maps ``[batch, feature_channels, out_height, out_width]``.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::EfficientNetB3(model) => model.forward(input),
            Self::InceptionV3(model) => model.forward(input),
            Self::MobileNetV2(model) => model.forward(input),
        }
    }

    /// Load weights from a ``torch`` checkpoint in torchvision layout.
    pub fn load_pytorch_weights(
        self,
        path: PathBuf,
    ) -> anyhow::Result<Self> {
        Ok(match self {
            Self::EfficientNetB3(model) => {
                Self::EfficientNetB3(model.load_pytorch_weights(path)?)
            }
            Self::InceptionV3(model) => Self::InceptionV3(model.load_pytorch_weights(path)?),
            Self::MobileNetV2(model) => Self::MobileNetV2(model.load_pytorch_weights(path)?),
        })
    }
}

/// [`XrayClassifier`] Config.
#[derive(Config, Debug)]
pub struct XrayClassifierConfig {
    /// Backbone architecture.
    pub arch: XrayArch,

    /// Number of output classes.
    #[config(default = 3)]
    pub num_classes: usize,

    /// Number of trailing backbone layers left trainable.
    ///
    /// Clamped to the backbone layer count at init.
    #[config(default = 10)]
    pub trainable_tail: usize,

    /// Optional dropout rate ahead of the linear layer.
    #[config(default = "None")]
    pub dropout: Option<f64>,

    /// Square input image side length.
    #[config(default = 150)]
    pub image_size: usize,
}

impl XrayClassifierConfig {
    /// Number of flattened features entering the linear layer.
    pub fn head_in_features(&self) -> usize {
        let pooled = self.arch.feature_map_size(self.image_size) / 2;

        self.arch.feature_channels() * pooled * pooled
    }

    /// Initialize an [`XrayClassifier`].
    ///
    /// # Panics
    ///
    /// If the dropout rate is outside ``[0, 1)``.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> XrayClassifier<B> {
        let dropout = self
            .dropout
            .map(|prob| DropoutConfig::new(expect_probability(prob)).init());

        XrayClassifier {
            backbone: self.arch.init(device),
            pool: Ignored(Pool2dConfig::new(self.arch.pool_kind(), [2, 2]).init()),
            dropout,
            fc: LinearConfig::new(self.head_in_features(), self.num_classes).init(device),
            trainable_tail: self.trainable_tail,
        }
        .with_trainable_tail(self.trainable_tail)
    }
}

/// Chest X-ray transfer classifier.
///
/// The freeze window applies to the backbone only; the head is always
/// trainable.
#[derive(Module, Debug)]
pub struct XrayClassifier<B: Backend> {
    /// The feature extractor.
    pub backbone: XrayBackbone<B>,

    /// Head 2x2 pool.
    pub pool: Ignored<Pool2d>,

    /// Optional head dropout.
    pub dropout: Option<Dropout>,

    /// Classification layer.
    pub fc: Linear<B>,

    /// Number of trailing backbone layers left trainable.
    pub trainable_tail: usize,
}

impl<B: Backend> XrayClassifier<B> {
    /// Number of output classes.
    pub fn num_classes(&self) -> usize {
        self.fc.weight.shape().dims[1]
    }

    /// Freeze all but the trailing `tail` backbone layers.
    ///
    /// A `tail` beyond the backbone layer count is clamped, with a
    /// warning. The head is unaffected.
    pub fn with_trainable_tail(
        self,
        tail: usize,
    ) -> Self {
        let num_layers = self.backbone.num_layers();
        if tail > num_layers {
            tracing::warn!(
                "trainable tail {tail} exceeds the {num_layers} backbone layers; clamping"
            );
        }
        let tail = usize::min(tail, num_layers);

        Self {
            backbone: self.backbone.with_trainable_tail(tail),
            pool: self.pool,
            dropout: self.dropout,
            fc: self.fc,
            trainable_tail: tail,
        }
    }

    /// Load backbone weights from a ``torch`` checkpoint.
    ///
    /// The freeze window is re-applied to the loaded parameters; the
    /// head is untouched.
    pub fn load_backbone_pytorch_weights(
        self,
        path: PathBuf,
    ) -> anyhow::Result<Self> {
        let Self {
            backbone,
            pool,
            dropout,
            fc,
            trainable_tail,
        } = self;

        let backbone = backbone.load_pytorch_weights(path)?;

        Ok(Self {
            backbone,
            pool,
            dropout,
            fc,
            trainable_tail,
        }
        .with_trainable_tail(trainable_tail))
    }

    /// Forward Pass to class probabilities.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, 3, image_size, image_size]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]``; each row is a probability
    /// distribution over the classes.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        softmax(self.forward_logits(input), 1)
    }

    /// Forward Pass to unnormalized logits.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, 3, image_size, image_size]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]``.
    pub fn forward_logits(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch"],
            &[("in_channels", 3)]
        );

        let x = self.backbone.forward(input);
        let x = self.pool.forward(x);

        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        };
        let x = self.fc.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "num_classes"],
            &x,
            &[("batch", batch), ("num_classes", self.num_classes())]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utility::trainable::{is_frozen, is_trainable};
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;
    type AutodiffBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_arch_meta() {
        assert_eq!(XrayArch::EfficientNetB3.pool_kind(), PoolKind::Average);
        assert_eq!(XrayArch::InceptionV3.pool_kind(), PoolKind::Average);
        assert_eq!(XrayArch::MobileNetV2.pool_kind(), PoolKind::Max);

        assert_eq!(XrayArch::EfficientNetB3.feature_channels(), 1536);
        assert_eq!(XrayArch::InceptionV3.feature_channels(), 2048);
        assert_eq!(XrayArch::MobileNetV2.feature_channels(), 1280);

        assert_eq!(XrayArch::EfficientNetB3.feature_map_size(150), 5);
        assert_eq!(XrayArch::InceptionV3.feature_map_size(150), 3);
        assert_eq!(XrayArch::MobileNetV2.feature_map_size(150), 5);

        let weights = XrayArch::MobileNetV2.pretrained_weights();
        assert!(weights.urls[0].ends_with("mobilenet_v2-b0353104.pth"));
    }

    #[test]
    fn test_classifier_config() {
        let config = XrayClassifierConfig::new(XrayArch::MobileNetV2);
        assert_eq!(config.num_classes, 3);
        assert_eq!(config.trainable_tail, 10);
        assert_eq!(config.dropout, None);
        assert_eq!(config.image_size, 150);
        assert_eq!(config.head_in_features(), 5120);

        assert_eq!(
            XrayClassifierConfig::new(XrayArch::EfficientNetB3).head_in_features(),
            6144
        );
        assert_eq!(
            XrayClassifierConfig::new(XrayArch::InceptionV3).head_in_features(),
            2048
        );
    }

    #[test]
    fn test_mobilenet_classifier_forward() {
        let device = Default::default();

        let model: XrayClassifier<TestBackend> =
            XrayClassifierConfig::new(XrayArch::MobileNetV2).init(&device);

        assert_eq!(model.num_classes(), 3);
        assert_eq!(model.backbone.arch(), XrayArch::MobileNetV2);

        let input = Tensor::random([2, 3, 150, 150], Distribution::Default, &device);
        let logits = model.forward_logits(input.clone());
        assert_eq!(logits.dims(), [2, 3]);

        let probs = model.forward(input);
        assert_eq!(probs.dims(), [2, 3]);

        // Each row is a probability distribution.
        let sums: Vec<f32> = probs.clone().sum_dim(1).into_data().to_vec().unwrap();
        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-5);
        }

        // The probabilities are the softmax of the logits.
        probs.to_data().assert_eq(&softmax(logits, 1).to_data(), true);
    }

    #[test]
    fn test_efficientnet_classifier_forward() {
        let device = Default::default();

        let model: XrayClassifier<TestBackend> =
            XrayClassifierConfig::new(XrayArch::EfficientNetB3).init(&device);

        let input = Tensor::random([1, 3, 150, 150], Distribution::Default, &device);
        let probs = model.forward(input);
        assert_eq!(probs.dims(), [1, 3]);

        let sums: Vec<f32> = probs.sum_dim(1).into_data().to_vec().unwrap();
        assert!((sums[0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_inception_classifier_forward() {
        let device = Default::default();

        let model: XrayClassifier<TestBackend> =
            XrayClassifierConfig::new(XrayArch::InceptionV3).init(&device);

        let input = Tensor::random([1, 3, 150, 150], Distribution::Default, &device);
        let probs = model.forward(input);
        assert_eq!(probs.dims(), [1, 3]);

        let sums: Vec<f32> = probs.sum_dim(1).into_data().to_vec().unwrap();
        assert!((sums[0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_dropout_classifier() {
        let device = Default::default();

        let model: XrayClassifier<TestBackend> =
            XrayClassifierConfig::new(XrayArch::MobileNetV2)
                .with_dropout(Some(0.5))
                .init(&device);

        assert!(model.dropout.is_some());

        // Dropout is inert outside of training; rows still sum to one.
        let input = Tensor::random([1, 3, 150, 150], Distribution::Default, &device);
        let sums: Vec<f32> = model
            .forward(input)
            .sum_dim(1)
            .into_data()
            .to_vec()
            .unwrap();
        assert!((sums[0] - 1.0).abs() < 1e-5);
    }

    #[test]
    #[should_panic(expected = "probability must be in [0, 1)")]
    fn test_invalid_dropout() {
        let device = Default::default();

        let _model: XrayClassifier<TestBackend> =
            XrayClassifierConfig::new(XrayArch::MobileNetV2)
                .with_dropout(Some(1.5))
                .init(&device);
    }

    #[test]
    fn test_freeze_policy() {
        let device = Default::default();

        let model: XrayClassifier<AutodiffBackend> =
            XrayClassifierConfig::new(XrayArch::MobileNetV2).init(&device);

        assert_eq!(model.trainable_tail, 10);

        // The freeze window covers the backbone only; the head is
        // always trainable.
        assert!(is_trainable(&model.fc));

        let XrayBackbone::MobileNetV2(net) = &model.backbone else {
            panic!("wrong backbone variant");
        };
        assert!(is_frozen(&net.stem));
        for block in &net.blocks[..8] {
            assert!(is_frozen(block));
        }
        for block in &net.blocks[8..] {
            assert!(is_trainable(block));
        }
        assert!(is_trainable(&net.head));
    }

    #[test]
    fn test_zero_tail_freezes_backbone_only() {
        let device = Default::default();

        let model: XrayClassifier<AutodiffBackend> =
            XrayClassifierConfig::new(XrayArch::MobileNetV2)
                .with_trainable_tail(0)
                .init(&device);

        assert_eq!(model.trainable_tail, 0);
        assert!(is_frozen(&model.backbone));
        assert!(is_trainable(&model.fc));
    }

    #[test]
    fn test_oversized_tail_clamps() {
        let device = Default::default();

        let model: XrayClassifier<AutodiffBackend> =
            XrayClassifierConfig::new(XrayArch::MobileNetV2)
                .with_trainable_tail(100)
                .init(&device);

        assert_eq!(model.trainable_tail, 19);
        assert!(is_trainable(&model.backbone));
    }

    #[test]
    fn test_instance_independence() {
        let device = Default::default();

        let first: XrayClassifier<AutodiffBackend> =
            XrayClassifierConfig::new(XrayArch::MobileNetV2).init(&device);
        let second: XrayClassifier<AutodiffBackend> =
            XrayClassifierConfig::new(XrayArch::MobileNetV2).init(&device);

        let first = first.with_trainable_tail(0);
        assert!(is_frozen(&first.backbone));

        // Freezing one instance leaves the other untouched.
        assert!(is_trainable(&second.fc));
        let XrayBackbone::MobileNetV2(net) = &second.backbone else {
            panic!("wrong backbone variant");
        };
        assert!(is_trainable(&net.head));
        for block in &net.blocks[8..] {
            assert!(is_trainable(block));
        }
    }
}
