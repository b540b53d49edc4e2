use crate::core::error::AnalysisError;
use crate::core::linalg::ensure_square;
use nalgebra::DMatrix;
use tracing::{debug, instrument};

fn check_operator_pair(a: &DMatrix<f64>, q: &DMatrix<f64>) -> Result<usize, AnalysisError> {
    let n = ensure_square(a, "iter_vars")?;
    if q.shape() != (n, n) {
        return Err(AnalysisError::mismatch(
            "iter_vars",
            format!("Q of shape {n}x{n}"),
            format!("{}x{}", q.nrows(), q.ncols()),
        ));
    }
    Ok(n)
}

#[inline]
fn lyapunov_step(a: &DMatrix<f64>, q: &DMatrix<f64>, v: &DMatrix<f64>) -> DMatrix<f64> {
    q + a * v * a.transpose()
}

/// Covariance after `n` steps of `V <- Q + A V A^T`, starting from the identity.
///
/// Stability of `A` is not checked in advance; an iterate that overflows is
/// reported as [`AnalysisError::NumericalInstability`].
#[instrument(level = "debug", skip(a, q), fields(dim = a.nrows()))]
pub fn iter_vars(a: &DMatrix<f64>, q: &DMatrix<f64>, n: usize) -> Result<DMatrix<f64>, AnalysisError> {
    let dim = check_operator_pair(a, q)?;
    let mut v = DMatrix::identity(dim, dim);
    for step in 0..n {
        v = lyapunov_step(a, q, &v);
        if !v.iter().all(|x| x.is_finite()) {
            return Err(AnalysisError::NumericalInstability {
                context: "iter_vars",
                reason: format!("covariance diverged at step {}", step + 1),
            });
        }
    }
    Ok(v)
}

/// Fixed point of `V = Q + A V A^T` reached by forward iteration from the
/// identity. Requires the spectral radius of `A` to be below one.
#[instrument(level = "debug", skip(a, q), fields(dim = a.nrows()))]
pub fn stationary_covariance(
    a: &DMatrix<f64>,
    q: &DMatrix<f64>,
    tolerance: f64,
    max_iterations: usize,
) -> Result<DMatrix<f64>, AnalysisError> {
    let dim = check_operator_pair(a, q)?;
    let mut v = DMatrix::identity(dim, dim);
    for step in 1..=max_iterations {
        let next = lyapunov_step(a, q, &v);
        let change = (&next - &v).amax();
        if !change.is_finite() {
            return Err(AnalysisError::NumericalInstability {
                context: "stationary_covariance",
                reason: format!("covariance diverged at step {step}"),
            });
        }
        v = next;
        if change < tolerance {
            debug!("Lyapunov recursion settled after {} steps.", step);
            return Ok(v);
        }
    }
    Err(AnalysisError::NumericalInstability {
        context: "stationary_covariance",
        reason: format!("no fixed point within {max_iterations} steps"),
    })
}
