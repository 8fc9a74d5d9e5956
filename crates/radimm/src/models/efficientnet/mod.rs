//! # `EfficientNet` (V1)
//!
//! See: [EfficientNet: Rethinking Model Scaling for Convolutional Neural Networks](https://arxiv.org/abs/1905.11946)

pub mod mbconv;
pub mod model;
pub mod pretrained;

pub use mbconv::{MbConv, MbConvConfig};
pub use model::{EfficientNet, EfficientNetConfig};
pub use pretrained::PREFAB_EFFICIENTNET_MAP;
