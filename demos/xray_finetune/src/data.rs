//! Batching for single-label X-ray classification.

use crate::dataset::IMAGE_SIZE;
use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::vision::{Annotation, ImageDatasetItem, PixelDepth};
use burn::prelude::{Backend, Int, Shape, Tensor, TensorData};
use burn::tensor::ElementConversion;

/// ImageNet channel statistics.
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Per-channel input normalizer.
#[derive(Clone)]
pub struct Normalizer<B: Backend> {
    pub mean: Tensor<B, 4>,
    pub std: Tensor<B, 4>,
}

impl<B: Backend> Normalizer<B> {
    pub fn new(device: &B::Device) -> Self {
        let mean = Tensor::<B, 1>::from_floats(MEAN, device).reshape([1, 3, 1, 1]);
        let std = Tensor::<B, 1>::from_floats(STD, device).reshape([1, 3, 1, 1]);
        Self { mean, std }
    }

    /// Normalize `[batch, 3, height, width]` images.
    pub fn normalize(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        (input - self.mean.clone()) / self.std.clone()
    }

    /// Move the normalizer statistics to the given device.
    pub fn to_device(
        &self,
        device: &B::Device,
    ) -> Self {
        Self {
            mean: self.mean.clone().to_device(device),
            std: self.std.clone().to_device(device),
        }
    }
}

#[derive(Clone)]
pub struct ClassificationBatcher<B: Backend> {
    normalizer: Normalizer<B>,
}

#[derive(Clone, Debug)]
pub struct ClassificationBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> ClassificationBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self {
            normalizer: Normalizer::new(&device),
        }
    }
}

impl<B: Backend> Batcher<B, ImageDatasetItem, ClassificationBatch<B>> for ClassificationBatcher<B> {
    fn batch(
        &self,
        items: Vec<ImageDatasetItem>,
        device: &B::Device,
    ) -> ClassificationBatch<B> {
        fn image_as_vec_u8(item: ImageDatasetItem) -> Vec<u8> {
            item.image
                .into_iter()
                .map(|pixel: PixelDepth| -> u8 { pixel.try_into().unwrap() })
                .collect::<Vec<u8>>()
        }

        let targets = items
            .iter()
            .map(|item| match item.annotation {
                Annotation::Label(label) => Tensor::<B, 1, Int>::from_data(
                    TensorData::from([(label as i64).elem::<B::IntElem>()]),
                    device,
                ),
                _ => panic!("expected single-label annotations"),
            })
            .collect();

        let images = items
            .into_iter()
            .map(|item| {
                TensorData::new(
                    image_as_vec_u8(item),
                    Shape::new([IMAGE_SIZE, IMAGE_SIZE, 3]),
                )
            })
            .map(|data| Tensor::<B, 3>::from_data(data.convert::<B::FloatElem>(), device))
            // [height, width, channels] to [channels, height, width]
            .map(|tensor| tensor.permute([2, 0, 1]))
            // Scale to [0, 1] before the channel statistics.
            .map(|tensor| tensor / 255)
            .collect();

        let images = self
            .normalizer
            .to_device(device)
            .normalize(Tensor::stack(images, 0));
        let targets = Tensor::cat(targets, 0);

        ClassificationBatch { images, targets }
    }
}
