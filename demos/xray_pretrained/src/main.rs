#![recursion_limit = "256"]

extern crate core;

use burn::backend::NdArray;
use burn::prelude::Backend;
use burn::tensor::{Distribution, Shape, Tensor, TensorData};
use clap::{Parser, arg};
use image::imageops::FilterType;
use radimm::cache::disk::DiskCacheConfig;
use radimm::models::xray::{XrayArch, XrayClassifier, XrayClassifierConfig};

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

    /// Image file to classify; a random batch is used when absent.
    #[arg(long)]
    image: Option<String>,
}

fn parse_arch(name: &str) -> anyhow::Result<XrayArch> {
    match name {
        "efficientnet_b3" => Ok(XrayArch::EfficientNetB3),
        "inception_v3" => Ok(XrayArch::InceptionV3),
        "mobilenet_v2" => Ok(XrayArch::MobileNetV2),
        _ => anyhow::bail!("unknown arch: {name}"),
    }
}

/// Load an image as a normalized `[1, 3, size, size]` batch.
fn load_image<B: Backend>(
    path: &str,
    image_size: usize,
    device: &B::Device,
) -> anyhow::Result<Tensor<B, 4>> {
    let image = image::open(path)?
        .resize_exact(image_size as u32, image_size as u32, FilterType::Triangle)
        .to_rgb8();

    let data = TensorData::new(
        image.into_raw(),
        Shape::new([image_size, image_size, 3]),
    );

    let input: Tensor<B, 4> = Tensor::<B, 3>::from_data(data.convert::<B::FloatElem>(), device)
        .permute([2, 0, 1])
        .unsqueeze()
        / 255;

    // ImageNet channel statistics, matching the torchvision checkpoints.
    let mean = Tensor::<B, 1>::from_floats([0.485, 0.456, 0.406], device).reshape([1, 3, 1, 1]);
    let std = Tensor::<B, 1>::from_floats([0.229, 0.224, 0.225], device).reshape([1, 3, 1, 1]);

    Ok((input - mean) / std)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    type B = NdArray;
    let device = Default::default();

    let arch = parse_arch(&args.arch)?;

    let weights = arch
        .pretrained_weights()
        .fetch_weights(&DiskCacheConfig::default())?;

    let config = XrayClassifierConfig::new(arch)
        .with_trainable_tail(args.trainable_tail)
        .with_dropout(args.dropout);

    let model: XrayClassifier<B> = config
        .init(&device)
        .load_backbone_pytorch_weights(weights)?;

    let input = match &args.image {
        Some(path) => load_image::<B>(path, config.image_size, &device)?,
        None => Tensor::random(
            [1, 3, config.image_size, config.image_size],
            Distribution::Default,
            &device,
        ),
    };

    let probabilities = model.forward(input).into_data().to_vec::<f32>().unwrap();

    println!("{} class probabilities:", args.arch);
    for (class, probability) in probabilities.iter().enumerate() {
        println!("  {class}: {probability:.4}");
    }

    Ok(())
}
