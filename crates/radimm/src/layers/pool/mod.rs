//! # Pooling Layers
pub mod pool2d;

pub use pool2d::{Pool2d, Pool2dConfig, PoolKind};
