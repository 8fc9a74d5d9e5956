//! # Misc Utility Functions

pub mod probability;
pub mod trainable;
