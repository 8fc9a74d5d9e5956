//! # Pretrained `MobileNetV2` Models and Configs

use crate::cache::prefabs::{StaticPreFabConfig, StaticPreFabMap};
use crate::cache::weights::{StaticPretrainedWeightsDescriptor, StaticPretrainedWeightsMap};
use crate::models::mobilenet::model::{MobileNetV2, MobileNetV2Config, MobileNetV2Record};
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, Recorder};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::path::PathBuf;

/// Pretrained [`MobileNetV2`] configs and weights.
pub static PREFAB_MOBILENET_V2_MAP: StaticPreFabMap<MobileNetV2Config> = StaticPreFabMap {
    name: "mobilenet_v2",
    description: "Well-known MobileNetV2 configs",

    items: &[&StaticPreFabConfig {
        name: "mobilenet_v2",
        description: "MobileNetV2 1.0x feature extractor",
        builder: MobileNetV2Config::new,

        weights: Some(&StaticPretrainedWeightsMap {
            items: &[&StaticPretrainedWeightsDescriptor {
                name: "tv_in1k",
                description: "MobileNetV2 pretrained on ImageNet",
                license: Some("bsd-3-clause"),
                origin: Some("https://github.com/pytorch/vision"),
                urls: &["https://download.pytorch.org/models/mobilenet_v2-b0353104.pth"],
            }],
        }),
    }],
};

/// Key remaps from the torchvision checkpoint layout onto the module tree.
///
/// The torchvision graph is one flat `features` list; blocks with an
/// expansion conv carry one more sublayer than those without.
fn key_remaps<B: Backend>(model: &MobileNetV2<B>) -> Vec<(String, String)> {
    let mut remaps = vec![
        (r"^features\.0\.0".to_string(), "stem.conv".to_string()),
        (r"^features\.0\.1".to_string(), "stem.norm".to_string()),
    ];

    for (i, block) in model.blocks.iter().enumerate() {
        let src = i + 1;
        if block.expand.is_some() {
            remaps.push((
                format!(r"^features\.{src}\.conv\.0\.0"),
                format!("blocks.{i}.expand.conv"),
            ));
            remaps.push((
                format!(r"^features\.{src}\.conv\.0\.1"),
                format!("blocks.{i}.expand.norm"),
            ));
            remaps.push((
                format!(r"^features\.{src}\.conv\.1\.0"),
                format!("blocks.{i}.depthwise.conv"),
            ));
            remaps.push((
                format!(r"^features\.{src}\.conv\.1\.1"),
                format!("blocks.{i}.depthwise.norm"),
            ));
            remaps.push((
                format!(r"^features\.{src}\.conv\.2"),
                format!("blocks.{i}.project.conv"),
            ));
            remaps.push((
                format!(r"^features\.{src}\.conv\.3"),
                format!("blocks.{i}.project.norm"),
            ));
        } else {
            remaps.push((
                format!(r"^features\.{src}\.conv\.0\.0"),
                format!("blocks.{i}.depthwise.conv"),
            ));
            remaps.push((
                format!(r"^features\.{src}\.conv\.0\.1"),
                format!("blocks.{i}.depthwise.norm"),
            ));
            remaps.push((
                format!(r"^features\.{src}\.conv\.1"),
                format!("blocks.{i}.project.conv"),
            ));
            remaps.push((
                format!(r"^features\.{src}\.conv\.2"),
                format!("blocks.{i}.project.norm"),
            ));
        }
    }

    let head_src = model.blocks.len() + 1;
    remaps.push((format!(r"^features\.{head_src}\.0"), "head.conv".to_string()));
    remaps.push((format!(r"^features\.{head_src}\.1"), "head.norm".to_string()));

    remaps
}

impl<B: Backend> MobileNetV2<B> {
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

        let record: MobileNetV2Record<B> =
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
        let prefab = PREFAB_MOBILENET_V2_MAP.expect_lookup_prefab("mobilenet_v2");
        assert_eq!(prefab.new_config().alpha, 1.0);

        let weights = prefab.expect_lookup_pretrained_weights("tv_in1k");
        assert!(weights.urls[0].ends_with("mobilenet_v2-b0353104.pth"));

        assert!(PREFAB_MOBILENET_V2_MAP.lookup_prefab("mobilenet_v3").is_none());
    }

    #[test]
    fn test_key_remaps_cover_block_shapes() {
        let device = Default::default();
        let model: MobileNetV2<TestBackend> = MobileNetV2Config::new().init(&device);

        let remaps = key_remaps(&model);

        // Block 0 has no expansion conv; the remaining 16 do.
        // 2 stem + 4 + 16 * 6 + 2 head.
        assert_eq!(remaps.len(), 2 + 4 + 16 * 6 + 2);

        assert!(
            remaps
                .iter()
                .any(|(p, r)| p == r"^features\.1\.conv\.0\.0" && r == "blocks.0.depthwise.conv")
        );
        assert!(
            remaps
                .iter()
                .any(|(p, r)| p == r"^features\.2\.conv\.0\.0" && r == "blocks.1.expand.conv")
        );
        assert!(
            remaps
                .iter()
                .any(|(p, r)| p == r"^features\.18\.0" && r == "head.conv")
        );
    }
}
