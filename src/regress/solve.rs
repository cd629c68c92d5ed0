//! Non-negative least squares for the CPI model.
//!
//! Two solve strategies share one Lawson–Hanson NNLS core:
//! - primary: direct constrained solve with a free intercept (the intercept
//!   enters the NNLS system as a column split into positive and negative
//!   parts, so only the predictor coefficients are constrained);
//! - fallback: center predictors and target on their training means, solve
//!   NNLS on the centered system, and recover the intercept algebraically.
//!
//! The caller chooses the fallback only on a typed failure from the primary
//! attempt; coefficients are non-negative on either path.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("empty training set")]
    EmptyTrainingSet,

    #[error("non-negative least squares did not converge within {0} passes")]
    IterationLimit(usize),

    #[error("least-squares subproblem is singular: {0}")]
    Singular(String),

    #[error("degenerate step in non-negative least squares")]
    Degenerate,
}

/// A fitted linear model with non-negative coefficients.
#[derive(Debug, Clone)]
pub struct Fit {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl Fit {
    /// Predict `intercept + X·coefficients` for each row of `x`.
    pub fn predict(&self, x: &DMatrix<f64>) -> DVector<f64> {
        let b = DVector::from_column_slice(&self.coefficients);
        (x * b).add_scalar(self.intercept)
    }
}

/// Which solve strategy produced the fit.
#[derive(Debug)]
pub enum FitOutcome {
    Primary(Fit),
    Fallback(Fit),
}

impl FitOutcome {
    pub fn fit(&self) -> &Fit {
        match self {
            FitOutcome::Primary(f) | FitOutcome::Fallback(f) => f,
        }
    }

    pub fn solver_name(&self) -> &'static str {
        match self {
            FitOutcome::Primary(_) => "primary",
            FitOutcome::Fallback(_) => "fallback",
        }
    }
}

/// Direct constrained solve: coefficients >= 0, intercept unconstrained.
pub fn fit_primary(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<Fit, SolveError> {
    let n = x.nrows();
    let p = x.ncols();
    if n == 0 {
        return Err(SolveError::EmptyTrainingSet);
    }

    // Augment with the intercept split into +1/-1 columns so the NNLS
    // constraint leaves the intercept free.
    let mut a = DMatrix::zeros(n, p + 2);
    a.view_mut((0, 0), (n, p)).copy_from(x);
    for r in 0..n {
        a[(r, p)] = 1.0;
        a[(r, p + 1)] = -1.0;
    }

    let z = nnls(&a, y)?;
    Ok(Fit {
        coefficients: (0..p).map(|i| z[i]).collect(),
        intercept: z[p] - z[p + 1],
    })
}

/// Centered solve: NNLS on mean-centered data, intercept recovered as
/// `mean(y) - mean(X)·b`.
pub fn fit_fallback(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<Fit, SolveError> {
    let n = x.nrows();
    let p = x.ncols();
    if n == 0 {
        return Err(SolveError::EmptyTrainingSet);
    }

    let y_mean = y.mean();
    let yc = y.add_scalar(-y_mean);

    let mut col_means = vec![0.0; p];
    let mut xc = x.clone();
    for c in 0..p {
        let mean = x.column(c).mean();
        col_means[c] = mean;
        for r in 0..n {
            xc[(r, c)] -= mean;
        }
    }

    let b = nnls(&xc, &yc)?;
    let intercept = y_mean
        - col_means
            .iter()
            .zip(b.iter())
            .map(|(m, bi)| m * bi)
            .sum::<f64>();

    Ok(Fit {
        coefficients: b.iter().copied().collect(),
        intercept,
    })
}

/// Lawson–Hanson active-set NNLS: minimize ||Ax - b|| subject to x >= 0.
fn nnls(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, SolveError> {
    let n = a.ncols();
    if n == 0 || a.nrows() == 0 {
        return Ok(DVector::zeros(n));
    }
    let mut x = DVector::zeros(n);
    let mut passive = vec![false; n];
    let at = a.transpose();

    // Gradient entries start at A'b, so threshold relative to that scale;
    // coordinate retirement is near-machine-precision relative to x itself,
    // as coefficient magnitudes can be many orders below the data.
    let grad_tol = 1e-10 * (&at * b).amax().max(1.0);
    let max_passes = 3 * n.max(1);
    let mut passes = 0;

    loop {
        // Gradient of the objective at x; optimal when no inactive
        // coordinate wants to grow.
        let w = &at * (b - a * &x);
        let mut best: Option<usize> = None;
        for i in 0..n {
            if !passive[i] && w[i] > grad_tol {
                match best {
                    Some(j) if w[j] >= w[i] => {}
                    _ => best = Some(i),
                }
            }
        }
        let Some(j) = best else {
            return Ok(x);
        };
        passive[j] = true;

        loop {
            passes += 1;
            if passes > max_passes {
                return Err(SolveError::IterationLimit(max_passes));
            }

            let z = solve_passive(a, b, &passive)?;

            let feasible = (0..n).all(|i| !passive[i] || z[i] > 0.0);
            if feasible {
                x = z;
                break;
            }

            // Step toward z only as far as feasibility allows, then retire
            // the coordinates that hit zero.
            let mut alpha = f64::INFINITY;
            for i in 0..n {
                if passive[i] && z[i] <= 0.0 {
                    let denom = x[i] - z[i];
                    if denom > 0.0 {
                        alpha = alpha.min(x[i] / denom);
                    }
                }
            }
            if !alpha.is_finite() {
                return Err(SolveError::Degenerate);
            }

            x = &x + (&z - &x) * alpha;
            let retire_tol = 1e-12 * (1.0 + x.amax());
            for i in 0..n {
                if passive[i] && x[i] <= retire_tol {
                    passive[i] = false;
                    x[i] = 0.0;
                }
            }
        }
    }
}

/// Unconstrained least squares restricted to the passive columns; active
/// coordinates stay zero in the returned vector.
fn solve_passive(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    passive: &[bool],
) -> Result<DVector<f64>, SolveError> {
    let idx: Vec<usize> = (0..a.ncols()).filter(|&i| passive[i]).collect();
    if idx.is_empty() {
        return Ok(DVector::zeros(a.ncols()));
    }

    let sub = a.select_columns(idx.iter());
    let svd = sub.svd(true, true);
    let sol = svd
        .solve(b, 1.0e-12)
        .map_err(|e| SolveError::Singular(e.to_string()))?;

    let mut z = DVector::zeros(a.ncols());
    for (k, &i) in idx.iter().enumerate() {
        z[i] = sol[k];
    }
    Ok(z)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-8, "{} !~ {}", a, b);
    }

    #[test]
    fn nnls_clamps_negative_components() {
        // Identity system: the unconstrained answer is b itself, so the
        // negative component must clamp to zero.
        let a = DMatrix::identity(2, 2);
        let b = DVector::from_column_slice(&[3.0, -1.0]);
        let x = nnls(&a, &b).unwrap();
        assert_close(x[0], 3.0);
        assert_close(x[1], 0.0);
    }

    #[test]
    fn constant_target_with_zero_features_recovers_intercept() {
        let x = DMatrix::zeros(5, 3);
        let y = DVector::from_element(5, 2.0);
        let fit = fit_primary(&x, &y).unwrap();
        assert_close(fit.intercept, 2.0);
        for c in &fit.coefficients {
            assert_close(*c, 0.0);
        }
    }

    #[test]
    fn negatively_correlated_predictor_gets_zero_coefficient() {
        let x = DMatrix::from_column_slice(4, 1, &[1.0, 2.0, 3.0, 4.0]);
        let y = DVector::from_column_slice(&[4.0, 3.0, 2.0, 1.0]);

        let fit = fit_primary(&x, &y).unwrap();
        assert!(fit.coefficients[0] >= 0.0);
        assert_close(fit.coefficients[0], 0.0);
        // With the slope clamped, the best intercept is the target mean.
        assert_close(fit.intercept, 2.5);

        let fb = fit_fallback(&x, &y).unwrap();
        assert!(fb.coefficients[0] >= 0.0);
    }

    #[test]
    fn primary_and_fallback_agree_on_a_well_posed_problem() {
        let x = DMatrix::from_column_slice(4, 1, &[1.0, 2.0, 3.0, 4.0]);
        let y = DVector::from_fn(4, |r, _| 2.0 + 3.0 * (r as f64 + 1.0));

        let primary = fit_primary(&x, &y).unwrap();
        let fallback = fit_fallback(&x, &y).unwrap();

        assert_close(primary.coefficients[0], 3.0);
        assert_close(primary.intercept, 2.0);
        assert_close(fallback.coefficients[0], 3.0);
        assert_close(fallback.intercept, 2.0);
    }

    #[test]
    fn coefficients_are_nonnegative_for_mixed_signs() {
        // Two predictors pulling in opposite directions.
        let x = DMatrix::from_columns(&[
            DVector::from_column_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            DVector::from_column_slice(&[5.0, 4.0, 3.0, 2.0, 1.0]),
        ]);
        let y = DVector::from_column_slice(&[1.5, 2.0, 3.1, 3.9, 5.2]);

        for fit in [fit_primary(&x, &y).unwrap(), fit_fallback(&x, &y).unwrap()] {
            for c in &fit.coefficients {
                assert!(*c >= 0.0, "coefficient {} is negative", c);
            }
        }
    }

    #[test]
    fn empty_training_set_is_a_typed_error() {
        let x = DMatrix::zeros(0, 2);
        let y = DVector::zeros(0);
        assert!(matches!(
            fit_primary(&x, &y),
            Err(SolveError::EmptyTrainingSet)
        ));
        assert!(matches!(
            fit_fallback(&x, &y),
            Err(SolveError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn predict_applies_intercept_and_coefficients() {
        let fit = Fit {
            coefficients: vec![2.0, 0.5],
            intercept: 1.0,
        };
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let y = fit.predict(&x);
        assert_close(y[0], 1.0 + 2.0 + 1.0);
        assert_close(y[1], 1.0 + 6.0 + 2.0);
    }
}
