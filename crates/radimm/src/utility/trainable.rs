//! # Trainability Helpers
//!
//! Freeze policies toggle `require_grad` on whole submodules. The flag
//! is only observable on autodiff backends; on inner backends these
//! helpers are no-ops, matching the underlying tensor semantics.

use burn::module::{Module, ModuleMapper, ModuleVisitor, ParamId};
use burn::prelude::{Backend, Tensor};

struct RequireGradMapper {
    require_grad: bool,
}

impl<B: Backend> ModuleMapper<B> for RequireGradMapper {
    fn map_float<const D: usize>(
        &mut self,
        _id: ParamId,
        tensor: Tensor<B, D>,
    ) -> Tensor<B, D> {
        tensor.set_require_grad(self.require_grad)
    }
}

/// Set `require_grad` on every float parameter of a module.
pub fn set_trainable<B: Backend, M: Module<B>>(
    module: M,
    trainable: bool,
) -> M {
    module.map(&mut RequireGradMapper {
        require_grad: trainable,
    })
}

#[derive(Default)]
struct GradFlagVisitor {
    any_on: bool,
    any_off: bool,
}

impl<B: Backend> ModuleVisitor<B> for GradFlagVisitor {
    fn visit_float<const D: usize>(
        &mut self,
        _id: ParamId,
        tensor: &Tensor<B, D>,
    ) {
        if tensor.is_require_grad() {
            self.any_on = true;
        } else {
            self.any_off = true;
        }
    }
}

/// Whether every float parameter of a module has `require_grad` set.
///
/// Vacuously true for modules with no float parameters.
pub fn is_trainable<B: Backend, M: Module<B>>(module: &M) -> bool {
    let mut visitor = GradFlagVisitor::default();
    module.visit(&mut visitor);
    !visitor.any_off
}

/// Whether no float parameter of a module has `require_grad` set.
pub fn is_frozen<B: Backend, M: Module<B>>(module: &M) -> bool {
    let mut visitor = GradFlagVisitor::default();
    module.visit(&mut visitor);
    !visitor.any_on
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::LinearConfig;

    type AutodiffBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn test_set_trainable_round_trip() {
        let device = Default::default();

        let layer = LinearConfig::new(4, 2).init::<AutodiffBackend>(&device);
        assert!(is_trainable(&layer));
        assert!(!is_frozen(&layer));

        let layer = set_trainable(layer, false);
        assert!(is_frozen(&layer));
        assert!(!is_trainable(&layer));

        let layer = set_trainable(layer, true);
        assert!(is_trainable(&layer));
    }

    #[test]
    fn test_no_grad_matches_set_trainable() {
        let device = Default::default();

        let layer = LinearConfig::new(4, 2)
            .init::<AutodiffBackend>(&device)
            .no_grad();

        assert!(is_frozen(&layer));
    }
}
