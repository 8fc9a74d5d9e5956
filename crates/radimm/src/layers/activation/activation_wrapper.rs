//! # Activation Layer Wrapper
//!
//! All activations used by the model families here are stateless, so the
//! wrapper is plain data; host modules hold it behind
//! [`burn::module::Ignored`] and it contributes nothing to their records.
use burn::prelude::{Backend, Config, Tensor};
use burn::tensor::activation::{relu, silu};

/// Rectified linear unit clipped at 6.
///
/// Computes ``min(max(x, 0), 6)``; the saturation bound used by
/// `MobileNet`-family networks.
#[derive(Clone, Debug, Default)]
pub struct Relu6 {}

impl Relu6 {
    /// Create the layer.
    pub fn new() -> Self {
        Self {}
    }

    /// Forward pass.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        input.clamp(0.0, 6.0)
    }
}

/// Sigmoid linear unit, ``x * sigmoid(x)``.
#[derive(Clone, Debug, Default)]
pub struct Silu {}

impl Silu {
    /// Create the layer.
    pub fn new() -> Self {
        Self {}
    }

    /// Forward pass.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        silu(input)
    }
}

/// [`Activation`] Configuration.
#[derive(Config, Debug)]
#[non_exhaustive]
pub enum ActivationConfig {
    /// Plain rectified linear unit.
    Relu,

    /// [`Relu6`] activation layer.
    Relu6,

    /// [`Silu`] activation layer.
    Silu,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self::Relu
    }
}

impl ActivationConfig {
    /// Initialize a wrapped activation layer.
    pub fn init(&self) -> Activation {
        match self {
            ActivationConfig::Relu => Activation::Relu,
            ActivationConfig::Relu6 => Activation::Relu6(Relu6::new()),
            ActivationConfig::Silu => Activation::Silu(Silu::new()),
        }
    }
}

/// Activation Layer Wrapper.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Activation {
    /// Plain rectified linear unit.
    Relu,

    /// [`Relu6`] activation layer.
    Relu6(Relu6),

    /// [`Silu`] activation layer.
    Silu(Silu),
}

impl Activation {
    /// Forward pass.
    #[tracing::instrument]
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Activation::Relu => relu(input),
            Activation::Relu6(layer) => layer.forward(input),
            Activation::Silu(layer) => layer.forward(input),
        }
    }

    /// Build a [`ActivationConfig`] for this module.
    pub fn to_config(&self) -> ActivationConfig {
        match self {
            Activation::Relu => ActivationConfig::Relu,
            Activation::Relu6(_) => ActivationConfig::Relu6,
            Activation::Silu(_) => ActivationConfig::Silu,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn make_input<B: Backend>(device: &B::Device) -> Tensor<B, 2> {
        Tensor::from_data([[-2.0, -0.5, 0.0], [1.0, 4.5, 8.0]], device)
    }

    #[test]
    fn test_relu() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let act = ActivationConfig::Relu.init();
        assert!(matches!(act.to_config(), ActivationConfig::Relu));

        let expected = relu(input.clone());
        act.forward(input)
            .to_data()
            .assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_relu6() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let act = ActivationConfig::Relu6.init();
        assert!(matches!(act.to_config(), ActivationConfig::Relu6));

        let expected =
            Tensor::<TestBackend, 2>::from_data([[0.0, 0.0, 0.0], [1.0, 4.5, 6.0]], &device);
        act.forward(input)
            .to_data()
            .assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_silu() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let act = ActivationConfig::Silu.init();
        assert!(matches!(act.to_config(), ActivationConfig::Silu));

        let expected = silu(input.clone());
        act.forward(input)
            .to_data()
            .assert_eq(&expected.to_data(), true);
    }
}
