//! # Pretrained `EfficientNet` Models and Configs

use crate::cache::prefabs::{StaticPreFabConfig, StaticPreFabMap};
use crate::cache::weights::{StaticPretrainedWeightsDescriptor, StaticPretrainedWeightsMap};
use crate::models::efficientnet::model::{EfficientNet, EfficientNetConfig, EfficientNetRecord};
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, Recorder};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::path::PathBuf;

/// Pretrained [`EfficientNet`] configs and weights.
pub static PREFAB_EFFICIENTNET_MAP: StaticPreFabMap<EfficientNetConfig> = StaticPreFabMap {
    name: "efficientnet",
    description: "Well-known EfficientNet (V1) configs",

    items: &[&StaticPreFabConfig {
        name: "efficientnet_b3",
        description: "EfficientNet-B3 feature extractor",
        builder: EfficientNetConfig::b3,

        weights: Some(&StaticPretrainedWeightsMap {
            items: &[&StaticPretrainedWeightsDescriptor {
                name: "tv_in1k",
                description: "EfficientNet-B3 pretrained on ImageNet",
                license: Some("apache-2.0"),
                origin: Some("https://github.com/pytorch/vision"),
                urls: &[
                    "https://download.pytorch.org/models/efficientnet_b3_rwightman-b3899882.pth",
                ],
            }],
        }),
    }],
};

/// Key remaps from the torchvision checkpoint layout onto the module tree.
///
/// The torchvision graph nests blocks per stage; blocks with an
/// expansion conv carry one more sublayer than those without. Stage
/// boundaries are recovered from the block shapes; every stage in the
/// V1 tables changes the channel count on entry.
fn key_remaps<B: Backend>(model: &EfficientNet<B>) -> Vec<(String, String)> {
    let mut remaps = vec![
        (r"^features\.0\.0".to_string(), "stem.conv".to_string()),
        (r"^features\.0\.1".to_string(), "stem.norm".to_string()),
    ];

    let mut stage = 0;
    let mut stage_start = 0;
    for (i, block) in model.blocks.iter().enumerate() {
        if block.in_channels() != block.out_channels() {
            stage += 1;
            stage_start = i;
        }
        let b = i - stage_start;

        if block.expand.is_some() {
            remaps.push((
                format!(r"^features\.{stage}\.{b}\.block\.0\.0"),
                format!("blocks.{i}.expand.conv"),
            ));
            remaps.push((
                format!(r"^features\.{stage}\.{b}\.block\.0\.1"),
                format!("blocks.{i}.expand.norm"),
            ));
            remaps.push((
                format!(r"^features\.{stage}\.{b}\.block\.1\.0"),
                format!("blocks.{i}.depthwise.conv"),
            ));
            remaps.push((
                format!(r"^features\.{stage}\.{b}\.block\.1\.1"),
                format!("blocks.{i}.depthwise.norm"),
            ));
            remaps.push((
                format!(r"^features\.{stage}\.{b}\.block\.2"),
                format!("blocks.{i}.se"),
            ));
            remaps.push((
                format!(r"^features\.{stage}\.{b}\.block\.3\.0"),
                format!("blocks.{i}.project.conv"),
            ));
            remaps.push((
                format!(r"^features\.{stage}\.{b}\.block\.3\.1"),
                format!("blocks.{i}.project.norm"),
            ));
        } else {
            remaps.push((
                format!(r"^features\.{stage}\.{b}\.block\.0\.0"),
                format!("blocks.{i}.depthwise.conv"),
            ));
            remaps.push((
                format!(r"^features\.{stage}\.{b}\.block\.0\.1"),
                format!("blocks.{i}.depthwise.norm"),
            ));
            remaps.push((
                format!(r"^features\.{stage}\.{b}\.block\.1"),
                format!("blocks.{i}.se"),
            ));
            remaps.push((
                format!(r"^features\.{stage}\.{b}\.block\.2\.0"),
                format!("blocks.{i}.project.conv"),
            ));
            remaps.push((
                format!(r"^features\.{stage}\.{b}\.block\.2\.1"),
                format!("blocks.{i}.project.norm"),
            ));
        }
    }

    let head_src = stage + 1;
    remaps.push((format!(r"^features\.{head_src}\.0"), "head.conv".to_string()));
    remaps.push((format!(r"^features\.{head_src}\.1"), "head.norm".to_string()));

    remaps
}

impl<B: Backend> EfficientNet<B> {
    /// Load weights from a ``torch`` checkpoint in torchvision layout.
    ///
    /// Classifier keys in the checkpoint are ignored; this module has
    /// no classification top.
    pub fn load_pytorch_weights(
        self,
        path: PathBuf,
    ) -> anyhow::Result<Self> {
        let device = &self.devices()[0];

        let mut load_args = LoadArgs::new(path);
        for (pattern, replacement) in key_remaps(&self) {
            load_args = load_args.with_key_remap(&pattern, &replacement);
        }

        let record: EfficientNetRecord<B> =
            PyTorchFileRecorder::<FullPrecisionSettings>::new().load(load_args, device)?;

        Ok(self.load_record(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_prefab_lookup() {
        let prefab = PREFAB_EFFICIENTNET_MAP.expect_lookup_prefab("efficientnet_b3");
        assert_eq!(prefab.new_config().width, 1.2);
        assert_eq!(prefab.new_config().depth, 1.4);

        let weights = prefab.expect_lookup_pretrained_weights("tv_in1k");
        assert!(weights.urls[0].ends_with("efficientnet_b3_rwightman-b3899882.pth"));

        assert!(PREFAB_EFFICIENTNET_MAP.lookup_prefab("efficientnet_b9").is_none());
    }

    #[test]
    fn test_key_remaps_cover_stage_shapes() {
        let device = Default::default();
        let model: EfficientNet<TestBackend> = EfficientNetConfig::b3().init(&device);

        let remaps = key_remaps(&model);

        // Stage 1 runs unexpanded (2 blocks x 5 remaps); the remaining
        // 24 blocks carry the expansion conv (x 7 remaps).
        assert_eq!(remaps.len(), 2 + 2 * 5 + 24 * 7 + 2);

        assert!(
            remaps
                .iter()
                .any(|(p, r)| p == r"^features\.1\.0\.block\.0\.0"
                    && r == "blocks.0.depthwise.conv")
        );
        assert!(
            remaps
                .iter()
                .any(|(p, r)| p == r"^features\.1\.1\.block\.1" && r == "blocks.1.se")
        );
        assert!(
            remaps
                .iter()
                .any(|(p, r)| p == r"^features\.2\.0\.block\.0\.0"
                    && r == "blocks.2.expand.conv")
        );
        assert!(
            remaps
                .iter()
                .any(|(p, r)| p == r"^features\.2\.0\.block\.2" && r == "blocks.2.se")
        );
        assert!(
            remaps
                .iter()
                .any(|(p, r)| p == r"^features\.7\.1\.block\.3\.1"
                    && r == "blocks.25.project.norm")
        );
        assert!(
            remaps
                .iter()
                .any(|(p, r)| p == r"^features\.8\.0" && r == "head.conv")
        );
    }
}
