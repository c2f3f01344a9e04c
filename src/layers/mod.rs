pub use crate::layers::activations::{ReluLayer, SigmoidLayer};
pub use crate::layers::batchnorm::BatchNormLayer;
pub use crate::layers::fc::FcLayer;
pub use crate::model::Module;

use crate::error::Result;
use crate::model::{InitView, Param, ParamRole};
use ndarray::prelude::*;

pub mod activations;
pub mod batchnorm;
pub mod fc;

#[derive(Debug, Clone)]
pub enum Layer {
    FC(FcLayer),
    BatchNorm(BatchNormLayer),
    ReLU(ReluLayer),
    Sigmoid(SigmoidLayer),
}

impl Module for Layer {
    fn forward(&mut self, input: ArrayD<f32>) -> Result<ArrayD<f32>> {
        match self {
            Layer::FC(l) => l.forward(input),
            Layer::BatchNorm(l) => l.forward(input),
            Layer::ReLU(l) => l.forward(input),
            Layer::Sigmoid(l) => l.forward(input),
        }
    }

    fn backward(&mut self, dz: ArrayD<f32>) -> Result<ArrayD<f32>> {
        match self {
            Layer::FC(l) => l.backward(dz),
            Layer::BatchNorm(l) => l.backward(dz),
            Layer::ReLU(l) => l.backward(dz),
            Layer::Sigmoid(l) => l.backward(dz),
        }
    }

    fn zero_grad(&mut self) {
        match self {
            Layer::FC(l) => l.zero_grad(),
            Layer::BatchNorm(l) => l.zero_grad(),
            Layer::ReLU(l) => l.zero_grad(),
            Layer::Sigmoid(l) => l.zero_grad(),
        }
    }
}

impl Layer {
    /// Weights and gradients the optimizer should update. Empty for layers without weights.
    pub fn parameters(&mut self) -> Vec<Param<'_>> {
        match self {
            Layer::FC(l) => vec![
                Param {
                    role: ParamRole::Weight,
                    value: l.weights.view_mut().into_dyn(),
                    grad: l.w_grad.as_ref().map(|g| g.view().into_dyn()),
                },
                Param {
                    role: ParamRole::Bias,
                    value: l.bias.view_mut().into_dyn(),
                    grad: l.b_grad.as_ref().map(|g| g.view().into_dyn()),
                },
            ],
            Layer::BatchNorm(l) => vec![
                Param {
                    role: ParamRole::Weight,
                    value: l.gamma.view_mut().into_dyn(),
                    grad: l.gamma_grad.as_ref().map(|g| g.view().into_dyn()),
                },
                Param {
                    role: ParamRole::Bias,
                    value: l.beta.view_mut().into_dyn(),
                    grad: l.beta_grad.as_ref().map(|g| g.view().into_dyn()),
                },
            ],
            _ => Vec::new(), // no weights in activations
        }
    }

    pub fn init_view(&mut self) -> Option<InitView<'_>> {
        match self {
            Layer::FC(l) => Some(InitView::Affine {
                weight: &mut l.weights,
                bias: Some(&mut l.bias),
            }),
            Layer::BatchNorm(l) => Some(InitView::BatchNorm {
                scale: &mut l.gamma,
                shift: &mut l.beta,
            }),
            _ => None,
        }
    }

    pub fn num_parameters(&self) -> usize {
        match self {
            Layer::FC(l) => l.weights.len() + l.bias.len(),
            Layer::BatchNorm(l) => l.gamma.len() + l.beta.len(),
            _ => 0,
        }
    }
}
