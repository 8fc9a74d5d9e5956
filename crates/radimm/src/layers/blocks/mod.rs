//! # Miscellaneous Blocks

pub mod conv_norm;
pub mod squeeze_excite;
