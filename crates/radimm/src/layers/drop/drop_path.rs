//! # `DropPath` - per-sample stochastic depth.
//!
//! See: [Deep Networks with Stochastic Depth](https://arxiv.org/abs/1603.09382)

use crate::utility::probability::expect_probability;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};
use burn::tensor::Distribution;

/// [`DropPath`] Config.
#[derive(Config, Debug)]
pub struct DropPathConfig {
    /// The probability of dropping each sample.
    #[config(default = 0.0)]
    pub drop_prob: f64,
}

impl DropPathConfig {
    /// Initialize a [`DropPath`].
    ///
    /// # Panics
    ///
    /// If `drop_prob` is outside ``[0, 1)``.
    pub fn init(&self) -> DropPath {
        DropPath {
            drop_prob: expect_probability(self.drop_prob),
        }
    }
}

/// Zeroes whole samples of a residual branch during training.
///
/// Inactive when the backend has autodiff disabled, or when
/// `drop_prob` is zero. Surviving samples are re-scaled by
/// ``1 / (1 - drop_prob)`` to preserve the expected magnitude.
#[derive(Module, Clone, Debug)]
pub struct DropPath {
    /// The probability of dropping each sample.
    pub drop_prob: f64,
}

impl DropPath {
    /// Forward pass.
    ///
    /// The drop mask is drawn per sample and broadcast over the
    /// remaining dims.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        if !B::ad_enabled() || self.drop_prob == 0.0 {
            return input;
        }

        let prob_keep = 1.0 - self.drop_prob;

        let mut mask_shape = [1; D];
        mask_shape[0] = input.dims()[0];

        let mask = Tensor::<B, D>::random(
            mask_shape,
            Distribution::Bernoulli(prob_keep),
            &input.device(),
        );

        input * mask * (1.0 / prob_keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;
    type AutodiffBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_drop_path_config() {
        let config = DropPathConfig::new();
        assert_eq!(config.drop_prob, 0.0);

        let config = config.with_drop_prob(0.2);
        assert_eq!(config.init().drop_prob, 0.2);
    }

    #[test]
    #[should_panic(expected = "probability must be in [0, 1): 1")]
    fn test_drop_path_rejects_bad_prob() {
        DropPathConfig::new().with_drop_prob(1.0).init();
    }

    #[test]
    fn test_inference_is_identity() {
        let device = Default::default();

        let layer = DropPathConfig::new().with_drop_prob(0.9).init();

        let input = Tensor::<TestBackend, 4>::ones([4, 2, 3, 3], &device);
        let output = layer.forward(input.clone());

        output.to_data().assert_eq(&input.to_data(), true);
    }

    #[test]
    fn test_training_masks_whole_samples() {
        let device = Default::default();

        let layer = DropPathConfig::new().with_drop_prob(0.5).init();

        let input = Tensor::<AutodiffBackend, 4>::ones([16, 2, 3, 3], &device);
        let output = layer.forward(input);

        // Each sample is either fully zero or uniformly re-scaled.
        let per_sample = output.to_data().to_vec::<f32>().unwrap();
        let sample_len = 2 * 3 * 3;
        for chunk in per_sample.chunks(sample_len) {
            let first = chunk[0];
            assert!(first == 0.0 || (first - 2.0).abs() < 1e-6);
            for &v in chunk {
                assert_eq!(v, first);
            }
        }
    }
}
