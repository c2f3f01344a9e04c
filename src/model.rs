use crate::error::Result;
use crate::layers::Layer;
use ndarray::prelude::*;
use std::collections::HashMap;

pub trait Module {
    fn forward(&mut self, input: ArrayD<f32>) -> Result<ArrayD<f32>>; // Input is (batch_size, features)
    /// Backward pass
    ///
    /// The `backward` function receives a gradient `dz` which corresponds to dLoss/dz,
    /// where z is the current layer output.
    /// The backward should:
    /// - return dLoss/dx = dz/dx * dLoss/dz
    /// - add dLoss/dw = dz/dw * dLoss/dz into the layer's own gradient buffers
    ///
    /// Gradients accumulate across calls until `zero_grad`, so two backward passes
    /// (e.g. one for real samples and one for fake samples) sum their contributions.
    ///
    /// Note:
    /// - the dz/dx Jacobian matrix is not materialized. Each layer directly computes
    /// the matrix-vector product of interest.
    /// - the returned dLoss/dx has the same shape as the layer input.
    fn backward(&mut self, dz: ArrayD<f32>) -> Result<ArrayD<f32>>;
    fn zero_grad(&mut self);
}

/// Role of a parameter tensor inside its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamRole {
    Weight,
    Bias,
}

/// Stable identifier of a parameter: layer index within the network plus role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId {
    pub layer: usize,
    pub role: ParamRole,
}

/// Mutable view of one parameter with its accumulated gradient, if any.
pub struct Param<'a> {
    pub role: ParamRole,
    pub value: ArrayViewMutD<'a, f32>,
    pub grad: Option<ArrayViewD<'a, f32>>,
}

/// The parameters of a layer that weight initialization knows how to fill.
pub enum InitView<'a> {
    Affine {
        weight: &'a mut Array2<f32>,
        bias: Option<&'a mut Array1<f32>>,
    },
    BatchNorm {
        scale: &'a mut Array1<f32>,
        shift: &'a mut Array1<f32>,
    },
}

/// Owned copy of every parameter in a network.
pub type ParamSnapshot = HashMap<ParamId, ArrayD<f32>>;

#[derive(Debug, Clone)]
pub struct Sequential {
    pub layers: Vec<Layer>,
}

impl Module for Sequential {
    fn forward(&mut self, input: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let mut x = input;
        for layer in &mut self.layers {
            x = layer.forward(x)?;
        }
        Ok(x)
    }

    fn backward(&mut self, dz: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let mut x = dz;
        // Iterate layers in reverse order, mutate each as we go
        for layer in self.layers.iter_mut().rev() {
            x = layer.backward(x)?;
        }
        Ok(x)
    }

    fn zero_grad(&mut self) {
        for layer in &mut self.layers {
            layer.zero_grad();
        }
    }
}

impl Sequential {
    pub fn new(layers: Vec<Layer>) -> Sequential {
        Sequential { layers }
    }

    /// All parameters of the network, tagged with their stable ids.
    pub fn parameters(&mut self) -> Vec<(ParamId, Param<'_>)> {
        self.layers
            .iter_mut()
            .enumerate()
            .flat_map(|(layer, l)| {
                l.parameters()
                    .into_iter()
                    .map(move |p| (ParamId { layer, role: p.role }, p))
            })
            .collect()
    }

    pub fn snapshot(&mut self) -> ParamSnapshot {
        self.parameters()
            .into_iter()
            .map(|(id, p)| (id, p.value.to_owned()))
            .collect()
    }

    pub fn grad_snapshot(&mut self) -> ParamSnapshot {
        self.parameters()
            .into_iter()
            .filter_map(|(id, p)| p.grad.map(|g| (id, g.to_owned())))
            .collect()
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(Layer::num_parameters).sum()
    }
}
