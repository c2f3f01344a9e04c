pub use crate::model::Module;

use crate::error::{GanError, Result};
use ndarray::prelude::*;

#[derive(Debug, Clone)]
///  z = a_prev.W + b
pub struct FcLayer {
    input_size: usize,
    output_size: usize,
    //
    pub weights: Array2<f32>, // (input_size, output_size)
    pub bias: Array1<f32>,    //  (output_size)
    // for backprop
    last_input: Option<Array2<f32>>, // (batch_size, input_size), this is the prev layer activation
    //
    pub w_grad: Option<Array2<f32>>, // (input_size, output_size)
    pub b_grad: Option<Array1<f32>>, // (output_size)
}

impl FcLayer {
    /// Zero-filled layer. Weights are set by `init::initialize`.
    pub fn new(input_size: usize, output_size: usize) -> FcLayer {
        FcLayer {
            input_size,
            output_size,
            weights: Array2::zeros((input_size, output_size)),
            bias: Array1::zeros(output_size),
            //
            last_input: None,
            //
            w_grad: None,
            b_grad: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }
}

impl Module for FcLayer {
    fn forward(&mut self, input: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let input = input
            .into_dimensionality::<Ix2>()
            .map_err(|e| GanError::InvalidInput(format!("FC layer input should be 2D: {e}")))?;
        if input.ncols() != self.input_size {
            return Err(GanError::shape(
                "fully connected input",
                &[input.nrows(), self.input_size],
                input.shape(),
            ));
        }

        // (batch_size, input_size) X (input_size, output_size) = (batch_size, output_size)
        let out = input.dot(&self.weights) + &self.bias;
        // store input for backprop computations
        self.last_input = Some(input);
        Ok(out.into_dyn())
    }

    fn backward(&mut self, dz: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let dz = dz
            .into_dimensionality::<Ix2>()
            .map_err(|e| GanError::InvalidInput(format!("FC layer gradient should be 2D: {e}")))?;

        let last_input = self
            .last_input
            .take()
            .ok_or(GanError::MissingForward("fully connected"))?;
        if dz.dim() != (last_input.nrows(), self.output_size) {
            return Err(GanError::shape(
                "fully connected gradient",
                &[last_input.nrows(), self.output_size],
                dz.shape(),
            ));
        }

        // dz is already the gradient of a batch-mean loss, no extra averaging here.
        // w: (batch_size, input_size)^T X (batch_size, output_size) = (input_size, output_size)
        let w_grad = last_input.t().dot(&dz);
        // b: (batch_size, output_size) summed over batch-axis = (output_size)
        let b_grad = dz.sum_axis(Axis(0));
        self.w_grad = Some(match self.w_grad.take() {
            Some(acc) => acc + &w_grad,
            None => w_grad,
        });
        self.b_grad = Some(match self.b_grad.take() {
            Some(acc) => acc + &b_grad,
            None => b_grad,
        });

        //  What needs to be passed on to the 'previous' layer in the network
        //  (batch_size, output_size) X (input_size, output_size)^T
        let new_dz = dz.dot(&self.weights.t()); // (batch_size, input_size)
        Ok(new_dz.into_dyn())
    }

    fn zero_grad(&mut self) {
        self.last_input = None;
        self.w_grad = None;
        self.b_grad = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn layer() -> FcLayer {
        let mut fc = FcLayer::new(2, 3);
        fc.weights = array![[1.0, 0.0, -1.0], [0.5, 2.0, 1.0]];
        fc.bias = array![0.1, 0.2, 0.3];
        fc
    }

    #[test]
    fn forward_is_affine() {
        let mut fc = layer();
        let out = fc.forward(array![[1.0, 2.0]].into_dyn()).unwrap();
        let expected = array![[2.1f32, 4.2, 1.3]].into_dyn();
        assert_abs_diff_eq!(out, expected, epsilon = 1e-6);
    }

    #[test]
    fn gradients_accumulate_until_zeroed() {
        let mut fc = layer();
        let x = array![[1.0, 2.0]].into_dyn();
        let dz = array![[1.0, 1.0, 1.0]].into_dyn();

        fc.forward(x.clone()).unwrap();
        let dx = fc.backward(dz.clone()).unwrap();
        assert_abs_diff_eq!(dx, array![[0.0f32, 3.5]].into_dyn(), epsilon = 1e-6);
        assert_abs_diff_eq!(fc.b_grad.clone().unwrap(), array![1.0f32, 1.0, 1.0], epsilon = 1e-6);

        fc.forward(x).unwrap();
        fc.backward(dz).unwrap();
        assert_abs_diff_eq!(fc.b_grad.clone().unwrap(), array![2.0f32, 2.0, 2.0], epsilon = 1e-6);
        assert_abs_diff_eq!(
            fc.w_grad.clone().unwrap(),
            array![[2.0f32, 2.0, 2.0], [4.0, 4.0, 4.0]],
            epsilon = 1e-6
        );

        fc.zero_grad();
        assert!(fc.w_grad.is_none() && fc.b_grad.is_none());
    }

    #[test]
    fn rejects_wrong_width_and_missing_forward() {
        let mut fc = layer();
        let err = fc.forward(array![[1.0, 2.0, 3.0]].into_dyn()).unwrap_err();
        assert!(matches!(err, GanError::ShapeMismatch { .. }));

        let err = fc.backward(array![[1.0, 1.0, 1.0]].into_dyn()).unwrap_err();
        assert!(matches!(err, GanError::MissingForward(_)));
    }
}
