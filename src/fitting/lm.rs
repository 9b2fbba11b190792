//! Levenberg-Marquardt least squares for small parameter counts.

use nalgebra::{DMatrix, DVector};

use super::FitError;

/// A model y = f(x; p) with analytic partial derivatives.
pub trait Model {
    fn num_params(&self) -> usize;

    /// Evaluate the model at `x`, writing df/dp into `grad`.
    fn eval(&self, p: &[f64], x: f64, grad: &mut [f64]) -> f64;
}

#[derive(Debug, Clone, Copy)]
pub struct LmConfig {
    /// Relative reduction of the sum of squares that counts as converged.
    pub ftol: f64,
    /// Relative step size that counts as converged.
    pub xtol: f64,
    /// Model evaluations (over the whole data set) before giving up; 0 means
    /// 200 * (number of parameters + 1).
    pub max_evaluations: usize,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            max_evaluations: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: Vec<f64>,
    /// Sum of squared residuals at `params`.
    pub cost: f64,
    pub evaluations: usize,
}

const LAMBDA_START: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e32;
const DIAG_FLOOR: f64 = 1e-30;

/// Residuals (y - f) and the model Jacobian at `p`.
fn evaluate<M: Model>(
    model: &M,
    x: &[f64],
    y: &[f64],
    p: &DVector<f64>,
) -> (DVector<f64>, DMatrix<f64>) {
    let n = p.len();
    let mut residuals = DVector::zeros(x.len());
    let mut jacobian = DMatrix::zeros(x.len(), n);
    let mut grad = vec![0.0; n];
    for (i, (&xi, &yi)) in x.iter().zip(y).enumerate() {
        let f = model.eval(p.as_slice(), xi, &mut grad);
        residuals[i] = yi - f;
        for (k, g) in grad.iter().enumerate() {
            jacobian[(i, k)] = *g;
        }
    }
    (residuals, jacobian)
}

pub fn levenberg_marquardt<M: Model>(
    model: &M,
    x: &[f64],
    y: &[f64],
    p0: &[f64],
    config: &LmConfig,
) -> Result<LmSolution, FitError> {
    let n = model.num_params();
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    if p0.len() != n {
        return Err(FitError::LengthMismatch { x: p0.len(), y: n });
    }
    if x.len() < n {
        return Err(FitError::TooFewSamples {
            needed: n,
            got: x.len(),
        });
    }
    let max_evaluations = if config.max_evaluations == 0 {
        200 * (n + 1)
    } else {
        config.max_evaluations
    };

    let mut p = DVector::from_column_slice(p0);
    let (mut r, mut j) = evaluate(model, x, y, &p);
    let mut cost = r.norm_squared();
    let mut evaluations = 1;
    if !cost.is_finite() {
        return Err(FitError::NonFinite("initial residuals"));
    }

    let mut lambda = LAMBDA_START;
    let small_step = |step: &DVector<f64>, p: &DVector<f64>| {
        step.norm() <= config.xtol * (p.norm() + config.xtol)
    };

    loop {
        if cost == 0.0 {
            break;
        }

        let jt = j.transpose();
        let a = &jt * &j;
        let g = &jt * &r;

        // Try steps with increasing damping until one lowers the cost.
        let accepted = loop {
            if evaluations >= max_evaluations {
                return Err(FitError::NotConverged(evaluations));
            }
            if lambda > LAMBDA_MAX {
                // No downhill step exists at any damping: a minimum.
                break None;
            }

            let mut damped = a.clone();
            for k in 0..n {
                damped[(k, k)] += lambda * a[(k, k)].max(DIAG_FLOOR);
            }
            let step = match damped.cholesky() {
                Some(chol) => chol.solve(&g),
                None => {
                    lambda *= 10.0;
                    continue;
                }
            };

            let p_new = &p + &step;
            let (r_new, j_new) = evaluate(model, x, y, &p_new);
            evaluations += 1;
            let cost_new = r_new.norm_squared();

            if cost_new.is_finite() && cost_new <= cost {
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                break Some((step, p_new, r_new, j_new, cost_new));
            }

            lambda *= 10.0;
            if small_step(&step, &p) {
                break None;
            }
        };

        let Some((step, p_new, r_new, j_new, cost_new)) = accepted else {
            break;
        };
        let reduction = (cost - cost_new) / cost;
        p = p_new;
        r = r_new;
        j = j_new;
        cost = cost_new;

        if reduction <= config.ftol || small_step(&step, &p) {
            break;
        }
    }

    if p.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite("parameters"));
    }
    log::debug!(
        "Levenberg-Marquardt finished after {} evaluations (cost {:e})",
        evaluations,
        cost
    );

    Ok(LmSolution {
        params: p.as_slice().to_vec(),
        cost,
        evaluations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// y = a * exp(b * x)
    struct Exponential;

    impl Model for Exponential {
        fn num_params(&self) -> usize {
            2
        }

        fn eval(&self, p: &[f64], x: f64, grad: &mut [f64]) -> f64 {
            let e = (p[1] * x).exp();
            grad[0] = e;
            grad[1] = p[0] * x * e;
            p[0] * e
        }
    }

    #[test]
    fn fits_an_exponential() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|x| 3.0 * (-1.5 * x).exp()).collect();
        let sol = levenberg_marquardt(&Exponential, &x, &y, &[1.0, 0.0], &LmConfig::default())
            .unwrap();
        assert_abs_diff_eq!(sol.params[0], 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(sol.params[1], -1.5, epsilon = 1e-6);
        assert!(sol.cost < 1e-12);
    }

    #[test]
    fn too_few_samples() {
        let err = levenberg_marquardt(&Exponential, &[1.0], &[2.0], &[1.0, 0.0], &LmConfig::default())
            .unwrap_err();
        assert_eq!(err, FitError::TooFewSamples { needed: 2, got: 1 });
    }

    #[test]
    fn mismatched_lengths() {
        let err = levenberg_marquardt(
            &Exponential,
            &[1.0, 2.0],
            &[2.0],
            &[1.0, 0.0],
            &LmConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FitError::LengthMismatch { .. }));
    }

    #[test]
    fn non_finite_input() {
        let err = levenberg_marquardt(
            &Exponential,
            &[0.0, 1.0, 2.0],
            &[1.0, f64::NAN, 2.0],
            &[1.0, 0.0],
            &LmConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, FitError::NonFinite("initial residuals"));
    }

    #[test]
    fn evaluation_budget() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|x| 3.0 * (-1.5 * x).exp()).collect();
        let config = LmConfig {
            max_evaluations: 2,
            ..Default::default()
        };
        let err = levenberg_marquardt(&Exponential, &x, &y, &[1.0, 0.0], &config).unwrap_err();
        assert_eq!(err, FitError::NotConverged(2));
    }
}
