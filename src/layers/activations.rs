pub use crate::model::Module;

use crate::error::{GanError, Result};
use ndarray::prelude::*;

#[derive(Debug, Clone, Default)]
pub struct ReluLayer {
    last_input: Option<ArrayD<f32>>,
}

impl ReluLayer {
    pub fn new() -> ReluLayer {
        ReluLayer { last_input: None }
    }
}

impl Module for ReluLayer {
    fn forward(&mut self, input: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let out = input.mapv(|x| x.max(0.0));
        self.last_input = Some(input);
        Ok(out)
    }

    fn backward(&mut self, dz: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let last_input = self.last_input.take().ok_or(GanError::MissingForward("relu"))?;
        if last_input.shape() != dz.shape() {
            return Err(GanError::shape("relu gradient", last_input.shape(), dz.shape()));
        }
        Ok(last_input.mapv(|x| if x > 0.0 { 1.0 } else { 0.0 }) * dz)
    }

    fn zero_grad(&mut self) {
        self.last_input = None;
    }
}

/// Logistic squashing to (0, 1).
#[derive(Debug, Clone, Default)]
pub struct SigmoidLayer {
    last_output: Option<ArrayD<f32>>,
}

impl SigmoidLayer {
    pub fn new() -> SigmoidLayer {
        SigmoidLayer { last_output: None }
    }
}

pub fn sigmoid(x: f32) -> f32 {
    // split on sign so exp never overflows
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

impl Module for SigmoidLayer {
    fn forward(&mut self, input: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let out = input.mapv(sigmoid);
        self.last_output = Some(out.clone());
        Ok(out)
    }

    fn backward(&mut self, dz: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let out = self
            .last_output
            .take()
            .ok_or(GanError::MissingForward("sigmoid"))?;
        if out.shape() != dz.shape() {
            return Err(GanError::shape("sigmoid gradient", out.shape(), dz.shape()));
        }
        Ok(out.mapv(|y| y * (1.0 - y)) * dz)
    }

    fn zero_grad(&mut self) {
        self.last_output = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn relu_masks_negative_gradients() {
        let mut relu = ReluLayer::new();
        let out = relu.forward(array![[-1.0, 0.0, 2.0]].into_dyn()).unwrap();
        assert_eq!(out, array![[0.0f32, 0.0, 2.0]].into_dyn());
        let dx = relu.backward(array![[5.0, 5.0, 5.0]].into_dyn()).unwrap();
        assert_eq!(dx, array![[0.0f32, 0.0, 5.0]].into_dyn());
    }

    #[test]
    fn sigmoid_is_bounded_and_stable() {
        assert_abs_diff_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-1000.0) >= 0.0 && sigmoid(-1000.0).is_finite());
        assert!(sigmoid(1000.0) <= 1.0);

        let mut layer = SigmoidLayer::new();
        layer.forward(array![[0.0]].into_dyn()).unwrap();
        let dx = layer.backward(array![[1.0]].into_dyn()).unwrap();
        assert_abs_diff_eq!(dx[[0, 0]], 0.25);
    }
}
