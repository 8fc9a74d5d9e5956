//! # Pretrained Inception V3 Models and Configs

use crate::cache::prefabs::{StaticPreFabConfig, StaticPreFabMap};
use crate::cache::weights::{StaticPretrainedWeightsDescriptor, StaticPretrainedWeightsMap};
use crate::models::inception::model::{Inception3, Inception3Config, Inception3Record};
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, Recorder};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::path::PathBuf;

/// Pretrained [`Inception3`] configs and weights.
pub static PREFAB_INCEPTION_V3_MAP: StaticPreFabMap<Inception3Config> = StaticPreFabMap {
    name: "inception_v3",
    description: "Well-known Inception V3 configs",

    items: &[&StaticPreFabConfig {
        name: "inception_v3",
        description: "Inception V3 feature extractor",
        builder: Inception3Config::new,

        weights: Some(&StaticPretrainedWeightsMap {
            items: &[&StaticPretrainedWeightsDescriptor {
                name: "tv_in1k",
                description: "Inception V3 pretrained on ImageNet",
                license: Some("apache-2.0"),
                origin: Some("https://github.com/pytorch/vision"),
                urls: &["https://download.pytorch.org/models/inception_v3_google-0cc3c7bd.pth"],
            }],
        }),
    }],
};

/// Key remaps from the torchvision checkpoint layout onto the module tree.
///
/// The stem convs are renamed; the mixed blocks keep their branch names
/// and only lose the leading capital. The conv/norm sublayer rename is
/// shared by every unit.
fn key_remaps() -> Vec<(String, String)> {
    [
        (r"^Conv2d_1a_3x3", "conv1a"),
        (r"^Conv2d_2a_3x3", "conv2a"),
        (r"^Conv2d_2b_3x3", "conv2b"),
        (r"^Conv2d_3b_1x1", "conv3b"),
        (r"^Conv2d_4a_3x3", "conv4a"),
        (r"^Mixed_", "mixed_"),
        (r"\.bn\.", ".norm."),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (pattern.to_string(), replacement.to_string()))
    .collect()
}

impl<B: Backend> Inception3<B> {
    /// Load weights from a ``torch`` checkpoint in torchvision layout.
    ///
    /// Classifier and auxiliary-head keys in the checkpoint are
    /// ignored; this module has neither.
    pub fn load_pytorch_weights(
        self,
        path: PathBuf,
    ) -> anyhow::Result<Self> {
        let device = &self.devices()[0];

        let mut load_args = LoadArgs::new(path);
        for (pattern, replacement) in key_remaps() {
            load_args = load_args.with_key_remap(&pattern, &replacement);
        }

        let record: Inception3Record<B> =
            PyTorchFileRecorder::<FullPrecisionSettings>::new().load(load_args, device)?;

        Ok(self.load_record(record))
    }
}
