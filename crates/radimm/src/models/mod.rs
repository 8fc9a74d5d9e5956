//! # Model Families

pub mod efficientnet;
pub mod inception;
pub mod mobilenet;
pub mod xray;
