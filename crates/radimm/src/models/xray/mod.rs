//! # Chest X-ray transfer classifier.

pub mod classifier;

pub use classifier::{XrayArch, XrayBackbone, XrayClassifier, XrayClassifierConfig};
