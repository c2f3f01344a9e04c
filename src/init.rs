use crate::error::{GanError, Result};
use crate::model::{InitView, Sequential};
use ndarray::prelude::*;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand::Rng;

/// Initialize every parametric layer of `nn`:
/// - affine weights ~ N(0, std), biases = 0
/// - batch-norm scale ~ N(1, std), shift = 0
pub fn initialize<R: Rng + ?Sized>(nn: &mut Sequential, std: f32, rng: &mut R) -> Result<()> {
    let weight_dist = Normal::new(0.0, std)
        .map_err(|e| GanError::InvalidConfig(format!("init_std {std}: {e}")))?;
    let scale_dist = Normal::new(1.0, std)
        .map_err(|e| GanError::InvalidConfig(format!("init_std {std}: {e}")))?;

    for layer in &mut nn.layers {
        match layer.init_view() {
            Some(InitView::Affine { weight, bias }) => {
                *weight = Array2::random_using(weight.dim(), weight_dist, rng);
                if let Some(bias) = bias {
                    bias.fill(0.0);
                }
            }
            Some(InitView::BatchNorm { scale, shift }) => {
                *scale = Array1::random_using(scale.len(), scale_dist, rng);
                shift.fill(0.0);
            }
            None => (),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{BatchNormLayer, FcLayer, Layer, ReluLayer};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn applies_documented_distributions() {
        let mut nn = Sequential::new(vec![
            Layer::FC(FcLayer::new(200, 100)),
            Layer::BatchNorm(BatchNormLayer::new(100, 1e-5)),
            Layer::ReLU(ReluLayer::new()),
        ]);
        if let Layer::FC(fc) = &mut nn.layers[0] {
            fc.bias.fill(3.0);
        }
        let mut rng = StdRng::seed_from_u64(0);
        initialize(&mut nn, 0.02, &mut rng).unwrap();

        match &nn.layers[0] {
            Layer::FC(fc) => {
                let n = fc.weights.len() as f32;
                let mean = fc.weights.sum() / n;
                let std = (fc.weights.mapv(|w| (w - mean).powi(2)).sum() / n).sqrt();
                assert!(mean.abs() < 1e-3, "mean {mean}");
                assert!((std - 0.02).abs() < 2e-3, "std {std}");
                assert!(fc.bias.iter().all(|&b| b == 0.0));
            }
            _ => unreachable!(),
        }
        match &nn.layers[1] {
            Layer::BatchNorm(bn) => {
                let mean = bn.gamma.sum() / bn.gamma.len() as f32;
                assert!((mean - 1.0).abs() < 0.01, "gamma mean {mean}");
                assert!(bn.beta.iter().all(|&b| b == 0.0));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn invalid_std_is_reported() {
        let mut nn = Sequential::new(vec![Layer::FC(FcLayer::new(2, 2))]);
        let mut rng = StdRng::seed_from_u64(0);
        let err = initialize(&mut nn, f32::NAN, &mut rng).unwrap_err();
        assert!(matches!(err, GanError::InvalidConfig(_)));
    }
}
