use crate::config::GanConfig;
use crate::error::{GanError, Result};
use crate::model::{ParamId, Sequential};

use ndarray::prelude::*;
use std::collections::HashMap;

pub trait Optimizer {
    /// Run one optimization step.
    /// Note:
    /// - Assumes forward+backward pass have been done.
    /// - Parameters without an accumulated gradient are left untouched.
    /// - May mutate the optimizer internal state (e.g. momentum).
    fn step(&mut self, nn: &mut Sequential) -> Result<()>;
}

/// First and second moment running estimates for one parameter.
#[derive(Clone, Debug)]
pub struct AdamState {
    pub m: ArrayD<f32>,
    pub v: ArrayD<f32>,
}

/// Adam with bias correction. One instance per network: its state is keyed by
/// `ParamId`, which is only unique within a single network.
#[derive(Debug)]
pub struct Adam {
    pub t: i32,
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    pub states: HashMap<ParamId, AdamState>,
}

impl Adam {
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            t: 0,
            learning_rate,
            beta1,
            beta2,
            epsilon,
            states: HashMap::new(),
        }
    }

    pub fn from_config(config: &GanConfig) -> Self {
        Adam::new(
            config.learning_rate,
            config.beta1,
            config.beta2,
            config.adam_epsilon,
        )
    }
}

impl Optimizer for Adam {
    fn step(&mut self, nn: &mut Sequential) -> Result<()> {
        self.t += 1;
        let t_f32 = self.t as f32;

        for (id, param) in nn.parameters() {
            let Some(grad) = param.grad else {
                continue;
            };
            if grad.shape() != param.value.shape() {
                return Err(GanError::shape(
                    "adam gradient",
                    param.value.shape(),
                    grad.shape(),
                ));
            }

            // Initialize state if first time
            let state = self.states.entry(id).or_insert_with(|| AdamState {
                m: ArrayD::zeros(grad.raw_dim()),
                v: ArrayD::zeros(grad.raw_dim()),
            });

            let mut value = param.value;
            update_param(
                &mut value,
                &grad,
                state,
                self.learning_rate,
                self.beta1,
                self.beta2,
                self.epsilon,
                t_f32,
            );
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn update_param(
    param: &mut ArrayViewMutD<f32>,
    grad: &ArrayViewD<f32>,
    state: &mut AdamState,
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    t: f32,
) {
    let AdamState { m, v } = state;

    // m = beta1 * m + (1 - beta1) * grad
    m.zip_mut_with(grad, |m_val, g_val| {
        *m_val = beta1 * *m_val + (1.0 - beta1) * g_val;
    });

    // v = beta2 * v + (1 - beta2) * grad^2
    v.zip_mut_with(grad, |v_val, g_val| {
        *v_val = beta2 * *v_val + (1.0 - beta2) * g_val.powi(2);
    });

    // Bias correction
    let m_corr = 1.0 - beta1.powf(t);
    let v_corr = 1.0 - beta2.powf(t);

    // Update weight: w = w - lr * (m / m_corr) / (sqrt(v / v_corr) + eps)
    azip!((p in param, mv in &*m, vv in &*v) {
        let m_hat = mv / m_corr;
        let v_hat = vv / v_corr;
        *p -= lr * m_hat / (v_hat.sqrt() + eps);
    });
}
