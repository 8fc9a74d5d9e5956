//! # Inception V3
//!
//! See: [Rethinking the Inception Architecture for Computer Vision](https://arxiv.org/abs/1512.00567)

pub mod blocks;
pub mod model;
pub mod pretrained;

pub use blocks::{
    InceptionA, InceptionAConfig, InceptionB, InceptionBConfig, InceptionC, InceptionCConfig,
    InceptionD, InceptionDConfig, InceptionE, InceptionEConfig,
};
pub use model::{Inception3, Inception3Config};
pub use pretrained::PREFAB_INCEPTION_V3_MAP;
