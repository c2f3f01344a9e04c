use crate::error::{GanError, Result};
use ndarray::prelude::*;
use ndarray::Zip;

/// Lower bound on the log terms, so a saturated prediction costs 100 instead of infinity.
const LOG_CLAMP: f32 = -100.0;
/// Lower bound on p * (1 - p) in the gradient denominator.
const GRAD_EPSILON: f32 = 1e-12;

/// `ln(x)` floored at `LOG_CLAMP`. NaN stays NaN so divergence is still detected.
fn clamped_ln(x: f32) -> f32 {
    let l = x.ln();
    if l < LOG_CLAMP {
        LOG_CLAMP
    } else {
        l
    }
}

pub type LossFunction = fn(pred: &Array1<f32>, target: &Array1<f32>) -> Result<(f32, Array1<f32>)>;

/// Binary cross-entropy averaged over the batch.
///
/// `loss = -mean(y * ln(p) + (1 - y) * ln(1 - p))`
///
/// Returns the loss and dLoss/dPred (already divided by the batch size).
pub fn binary_cross_entropy(pred: &Array1<f32>, target: &Array1<f32>) -> Result<(f32, Array1<f32>)> {
    if pred.len() != target.len() || pred.is_empty() {
        return Err(GanError::shape("binary cross-entropy", target.shape(), pred.shape()));
    }
    let n = pred.len() as f32;

    let loss = -Zip::from(pred)
        .and(target)
        .fold(0.0, |acc, &p, &y| {
            acc + y * clamped_ln(p) + (1.0 - y) * clamped_ln(1.0 - p)
        })
        / n;

    let grad = Zip::from(pred)
        .and(target)
        .map_collect(|&p, &y| (p - y) / (p * (1.0 - p)).max(GRAD_EPSILON) / n);

    Ok((loss, grad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn known_value() {
        let (loss, grad) =
            binary_cross_entropy(&array![0.5, 0.5], &array![1.0, 0.0]).unwrap();
        assert_abs_diff_eq!(loss, std::f32::consts::LN_2, epsilon = 1e-6);
        assert_abs_diff_eq!(grad, array![-1.0f32, 1.0], epsilon = 1e-6);
    }

    #[test]
    fn saturated_predictions_stay_finite() {
        let (loss, grad) = binary_cross_entropy(&array![0.0, 1.0], &array![1.0, 0.0]).unwrap();
        assert_abs_diff_eq!(loss, 100.0, epsilon = 1e-3);
        assert!(grad.iter().all(|g| g.is_finite()));
    }

    #[test]
    fn nan_prediction_gives_nan_loss() {
        let (loss, _) = binary_cross_entropy(&array![f32::NAN], &array![1.0]).unwrap();
        assert!(loss.is_nan());
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let err = binary_cross_entropy(&array![0.5], &array![1.0, 0.0]).unwrap_err();
        assert!(matches!(err, GanError::ShapeMismatch { .. }));
    }

    proptest! {
        #[test]
        fn loss_is_non_negative(p in 1e-6f32..(1.0 - 1e-6), label in 0u8..2) {
            let y = label as f32;
            let (loss, _) = binary_cross_entropy(&array![p], &array![y]).unwrap();
            prop_assert!(loss >= 0.0);
        }

        #[test]
        fn loss_shrinks_toward_true_label(p in 0.05f32..0.9) {
            let (far, _) = binary_cross_entropy(&array![p], &array![1.0]).unwrap();
            let (near, _) = binary_cross_entropy(&array![p + 0.09], &array![1.0]).unwrap();
            prop_assert!(near < far);
        }
    }

    #[test]
    fn loss_grows_toward_wrong_extreme() {
        let losses: Vec<f32> = [0.9, 0.99, 0.999, 0.9999]
            .iter()
            .map(|&p| binary_cross_entropy(&array![p], &array![0.0]).unwrap().0)
            .collect();
        assert!(losses.windows(2).all(|w| w[1] > w[0] + 1.0));
        assert!(binary_cross_entropy(&array![1e-6], &array![1.0]).unwrap().0 > 13.0);
    }
}
