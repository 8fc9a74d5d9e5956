#![warn(missing_docs)]
//!# radimm - Burn Radiology Image Models
//!
//! Transfer-learning classifiers for 3-class chest X-ray images, built on
//! pretrained convolutional backbones.
//!
//! ## Notable Components
//!
//! * [`cache`] - weight loading cache.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::activation`] - activation layer abstraction wrapper.
//!   * [`layers::blocks`] - miscellaneous blocks.
//!     * [`layers::blocks::conv_norm`] - ``Conv2d + BatchNorm2d`` blocks.
//!     * [`layers::blocks::squeeze_excite`] - squeeze-and-excitation gate.
//!   * [`layers::drop`] - dropout layers.
//!     * [`layers::drop::drop_path`] - drop path / stochastic depth.
//!   * [`layers::pool`] - pooling layers.
//! * [`models`] - complete model families.
//!   * [`models::efficientnet`] - `EfficientNet` (V1).
//!   * [`models::inception`] - `InceptionV3`.
//!   * [`models::mobilenet`] - `MobileNetV2`.
//!   * [`models::xray`] - the X-ray backbone classifier.

extern crate core;

pub mod layers;

pub mod cache;
pub mod models;
pub mod utility;
