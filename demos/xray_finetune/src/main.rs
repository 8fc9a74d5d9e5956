#![recursion_limit = "256"]

extern crate core;
mod data;
mod dataset;
mod training;

use crate::training::train;
use burn::backend::{Autodiff, NdArray};
use clap::{Parser, arg};
use radimm::models::xray::XrayArch;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Backbone architecture: "efficientnet_b3", "inception_v3", or "mobilenet_v2".
    #[arg(long, default_value = "mobilenet_v2")]
    arch: String,

    /// Number of trailing backbone layers left trainable.
    #[arg(long, default_value = "10")]
    trainable_tail: usize,

    /// Dropout rate for the classifier head.
    #[arg(long)]
    dropout: Option<f64>,

    /// Root directory of the dataset, one folder per class.
    #[arg(long)]
    data_root: String,

    /// Directory for the resized image cache.
    #[arg(long, default_value = "/tmp/xray_finetune/resized")]
    resized_root: String,

    /// Directory to save the artifacts.
    #[arg(long, default_value = "/tmp/xray_finetune/artifacts")]
    artifact_dir: String,

    /// Random seed for reproducibility.
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Batch size for processing
    #[arg(short, long, default_value_t = 24)]
    batch_size: usize,

    /// Number of epochs to train the model.
    #[arg(long, default_value = "5")]
    num_epochs: usize,

    /// Learning rate for the optimizer.
    #[arg(long, default_value = "1e-3")]
    learning_rate: f64,

    /// Early stopping patience
    #[arg(long, default_value = "6")]
    patience: usize,
}

/// Parse a backbone architecture name.
pub fn parse_arch(name: &str) -> anyhow::Result<XrayArch> {
    match name {
        "efficientnet_b3" => Ok(XrayArch::EfficientNetB3),
        "inception_v3" => Ok(XrayArch::InceptionV3),
        "mobilenet_v2" => Ok(XrayArch::MobileNetV2),
        _ => anyhow::bail!("unknown arch: {name}"),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    type B = Autodiff<NdArray>;
    let device = Default::default();

    train::<B>(&args, &device)
}
