//! # Pool2d Layer Wrapper
//!
//! [`Pool2d`] selects between average and max pooling at config time.
//!
//! The wrapped layers are parameter-free; hosts hold a [`Pool2d`] behind
//! [`burn::module::Ignored`] and it contributes nothing to their records.

use burn::config::Config;
use burn::nn::PaddingConfig2d;
use burn::nn::pool::{AvgPool2d, AvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::prelude::{Backend, Tensor};

/// Pooling flavor selector.
#[derive(Config, Debug, PartialEq)]
pub enum PoolKind {
    /// Average pooling.
    Average,

    /// Max pooling.
    Max,
}

/// [`Pool2d`] Config.
#[derive(Config, Debug)]
pub struct Pool2dConfig {
    /// The pooling flavor.
    pub kind: PoolKind,

    /// The size of the pooling window.
    pub kernel_size: [usize; 2],

    /// The stride; defaults to the kernel size.
    #[config(default = "None")]
    pub strides: Option<[usize; 2]>,
}

impl Pool2dConfig {
    /// Initialize a [`Pool2d`].
    pub fn init(&self) -> Pool2d {
        let strides = self.strides.unwrap_or(self.kernel_size);

        match self.kind {
            PoolKind::Average => Pool2d::Average(
                AvgPool2dConfig::new(self.kernel_size)
                    .with_strides(strides)
                    .with_padding(PaddingConfig2d::Valid)
                    .init(),
            ),
            PoolKind::Max => Pool2d::Max(
                MaxPool2dConfig::new(self.kernel_size)
                    .with_strides(strides)
                    .with_padding(PaddingConfig2d::Valid)
                    .init(),
            ),
        }
    }
}

/// Pooling Layer Wrapper.
///
/// Dispatches to [`AvgPool2d`] or [`MaxPool2d`].
#[derive(Clone, Debug)]
pub enum Pool2d {
    /// Average pooling layer.
    Average(AvgPool2d),

    /// Max pooling layer.
    Max(MaxPool2d),
}

impl Pool2d {
    /// The [`PoolKind`] of this layer.
    pub fn kind(&self) -> PoolKind {
        match self {
            Pool2d::Average(_) => PoolKind::Average,
            Pool2d::Max(_) => PoolKind::Max,
        }
    }

    /// Forward pass.
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Pool2d::Average(layer) => layer.forward(input),
            Pool2d::Max(layer) => layer.forward(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_pool2d_config() {
        let config = Pool2dConfig::new(PoolKind::Average, [2, 2]);
        assert_eq!(config.kind, PoolKind::Average);
        assert_eq!(config.kernel_size, [2, 2]);
        assert_eq!(config.strides, None);

        let config = config.with_strides(Some([1, 1]));
        assert_eq!(config.strides, Some([1, 1]));
    }

    #[test]
    fn test_avg_pool_forward() {
        let device = Default::default();

        let layer = Pool2dConfig::new(PoolKind::Average, [2, 2]).init();
        assert_eq!(layer.kind(), PoolKind::Average);

        let input = Tensor::<TestBackend, 4>::from_data(
            [[[[1.0, 2.0, 10.0, 20.0], [3.0, 4.0, 30.0, 40.0]]]],
            &device,
        );
        let output = layer.forward(input);

        assert_eq!(output.dims(), [1, 1, 1, 2]);
        output.to_data().assert_eq(
            &Tensor::<TestBackend, 4>::from_data([[[[2.5, 25.0]]]], &device).to_data(),
            true,
        );
    }

    #[test]
    fn test_max_pool_forward() {
        let device = Default::default();

        let layer = Pool2dConfig::new(PoolKind::Max, [2, 2]).init();
        assert_eq!(layer.kind(), PoolKind::Max);

        let input = Tensor::<TestBackend, 4>::from_data(
            [[[[1.0, 2.0, 10.0, 20.0], [3.0, 4.0, 30.0, 40.0]]]],
            &device,
        );
        let output = layer.forward(input);

        assert_eq!(output.dims(), [1, 1, 1, 2]);
        output.to_data().assert_eq(
            &Tensor::<TestBackend, 4>::from_data([[[[4.0, 40.0]]]], &device).to_data(),
            true,
        );
    }

    #[test]
    fn test_odd_input_truncates() {
        let device = Default::default();

        let layer = Pool2dConfig::new(PoolKind::Max, [2, 2]).init();

        // Valid padding drops the trailing row/column of odd inputs.
        let input = Tensor::<TestBackend, 4>::ones([1, 3, 5, 5], &device);
        let output = layer.forward(input);

        assert_eq!(output.dims(), [1, 3, 2, 2]);
    }
}
