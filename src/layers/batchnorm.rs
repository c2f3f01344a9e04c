pub use crate::model::Module;

use crate::error::{GanError, Result};
use ndarray::prelude::*;

/// Batch normalization over the batch axis of a (batch_size, features) input.
///
/// Always normalizes with the statistics of the current batch (biased variance),
/// then applies the learned per-feature scale `gamma` and shift `beta`.
#[derive(Debug, Clone)]
pub struct BatchNormLayer {
    features: usize,
    epsilon: f32,
    //
    pub gamma: Array1<f32>, // (features)
    pub beta: Array1<f32>,  // (features)
    // for backprop
    last_normalized: Option<Array2<f32>>, // (batch_size, features)
    last_inv_std: Option<Array1<f32>>,    // (features)
    //
    pub gamma_grad: Option<Array1<f32>>,
    pub beta_grad: Option<Array1<f32>>,
}

impl BatchNormLayer {
    pub fn new(features: usize, epsilon: f32) -> BatchNormLayer {
        BatchNormLayer {
            features,
            epsilon,
            gamma: Array1::ones(features),
            beta: Array1::zeros(features),
            last_normalized: None,
            last_inv_std: None,
            gamma_grad: None,
            beta_grad: None,
        }
    }

    pub fn features(&self) -> usize {
        self.features
    }
}

impl Module for BatchNormLayer {
    fn forward(&mut self, input: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let input = input.into_dimensionality::<Ix2>().map_err(|e| {
            GanError::InvalidInput(format!("BatchNorm layer input should be 2D: {e}"))
        })?;
        let (batch_size, features) = input.dim();
        if features != self.features {
            return Err(GanError::shape(
                "batch norm input",
                &[batch_size, self.features],
                input.shape(),
            ));
        }
        if batch_size < 2 {
            return Err(GanError::InvalidInput(format!(
                "batch norm needs more than 1 value per feature, got batch of {batch_size}"
            )));
        }

        let mean = input
            .mean_axis(Axis(0))
            .ok_or_else(|| GanError::InvalidInput("empty batch".to_string()))?;
        let centered = &input - &mean;
        let var = centered.mapv(|x| x * x).sum_axis(Axis(0)) / batch_size as f32;
        let inv_std = var.mapv(|v| 1.0 / (v + self.epsilon).sqrt());

        let normalized = centered * &inv_std;
        let out = &normalized * &self.gamma + &self.beta;

        self.last_normalized = Some(normalized);
        self.last_inv_std = Some(inv_std);
        Ok(out.into_dyn())
    }

    fn backward(&mut self, dz: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let dz = dz.into_dimensionality::<Ix2>().map_err(|e| {
            GanError::InvalidInput(format!("BatchNorm layer gradient should be 2D: {e}"))
        })?;
        let x_hat = self
            .last_normalized
            .take()
            .ok_or(GanError::MissingForward("batch norm"))?;
        let inv_std = self
            .last_inv_std
            .take()
            .ok_or(GanError::MissingForward("batch norm"))?;
        if dz.dim() != x_hat.dim() {
            return Err(GanError::shape("batch norm gradient", x_hat.shape(), dz.shape()));
        }

        let n = dz.nrows() as f32;
        let dbeta = dz.sum_axis(Axis(0));
        let dgamma = (&dz * &x_hat).sum_axis(Axis(0));

        // dx = gamma * inv_std / N * (N * dy - sum(dy) - x_hat * sum(dy * x_hat))
        let scale = &self.gamma * &inv_std / n;
        let dx = (&dz * n - &dbeta - &x_hat * &dgamma) * &scale;

        self.gamma_grad = Some(match self.gamma_grad.take() {
            Some(acc) => acc + &dgamma,
            None => dgamma,
        });
        self.beta_grad = Some(match self.beta_grad.take() {
            Some(acc) => acc + &dbeta,
            None => dbeta,
        });

        Ok(dx.into_dyn())
    }

    fn zero_grad(&mut self) {
        self.last_normalized = None;
        self.last_inv_std = None;
        self.gamma_grad = None;
        self.beta_grad = None;
    }
}
