//! # `MobileNetV2`
//!
//! See: [MobileNetV2: Inverted Residuals and Linear Bottlenecks](https://arxiv.org/abs/1801.04381)

pub mod inverted_residual;
pub mod model;
pub mod pretrained;

pub use inverted_residual::{InvertedResidual, InvertedResidualConfig};
pub use model::{MobileNetV2, MobileNetV2Config, make_divisible};
pub use pretrained::PREFAB_MOBILENET_V2_MAP;
