//! Sparse generalized eigensolver.
//!
//! Maximizes the Rayleigh quotient `x^T A x / x^T B x` with a log penalty
//! `rho * sum(ln(1 + |x_i| / eps)) / ln(1 + 1 / eps)` that approximates the
//! number of non-zero coordinates. Each iteration minorizes the shifted,
//! convex objective `x^T (A + tau B) x` by its tangent and the penalty by a
//! reweighted L1 term, which yields a soft-thresholded power step:
//!
//! ```text
//! c      = B^-1 (A + tau B) x
//! x_i   <- sign(c_i) * max(|c_i| - rho_eps / (2 (|x_i| + eps)), 0)
//! x     <- x / sqrt(x^T B x)
//! ```
//!
//! With `B = I` the step is the exact solution of the minorized problem. Once
//! the iteration stops, the eigenvector is recomputed on the support of the
//! final iterate (variational renormalization). With `rho = 0` there is no
//! support to respect and the pencil is solved on every coordinate, so the
//! result is the leading eigenpair of the full pencil whatever the start.

use crate::core::error::AnalysisError;
use crate::core::linalg::{ensure_finite, ensure_symmetric, generalized_eigh};
use crate::engine::config::SpeighConfig;
use crate::engine::state::Termination;
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use tracing::{debug, instrument, trace, warn};

/// Extra shift, relative to the spectral scale, that keeps `A + tau B`
/// positive definite when the pencil has a single repeated eigenvalue.
const SHIFT_MARGIN: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq)]
pub struct SparseEigenpair {
    pub eigenvalue: f64,
    /// Leading eigenvector of the pencil restricted to the support, `B`-normalized.
    pub eigenvector: DVector<f64>,
    /// Last iterate before renormalization.
    pub final_iterate: DVector<f64>,
    pub iterations: usize,
    pub termination: Termination,
}

impl SparseEigenpair {
    pub fn support(&self) -> Vec<usize> {
        support_of(&self.eigenvector)
    }

    pub fn cardinality(&self) -> usize {
        self.eigenvector.iter().filter(|x| **x != 0.0).count()
    }
}

fn support_of(x: &DVector<f64>) -> Vec<usize> {
    x.iter()
        .enumerate()
        .filter(|(_, v)| **v != 0.0)
        .map(|(i, _)| i)
        .collect()
}

struct Metric<'a> {
    b: Option<&'a DMatrix<f64>>,
    cholesky: Option<Cholesky<f64, Dyn>>,
}

impl<'a> Metric<'a> {
    fn new(b: Option<&'a DMatrix<f64>>) -> Result<Self, AnalysisError> {
        let cholesky = match b {
            Some(b) => Some(Cholesky::new(b.clone()).ok_or_else(|| {
                AnalysisError::InvalidArgument("speigh: B is not positive definite".to_string())
            })?),
            None => None,
        };
        Ok(Self { b, cholesky })
    }

    fn norm(&self, x: &DVector<f64>) -> f64 {
        match self.b {
            Some(b) => x.dot(&(b * x)).max(0.0).sqrt(),
            None => x.norm(),
        }
    }

    fn solve(&self, c: DVector<f64>) -> DVector<f64> {
        match &self.cholesky {
            Some(chol) => chol.solve(&c),
            None => c,
        }
    }
}

/// Leading (sparse) generalized eigenpair of `(A, B)`.
///
/// `b = None` means the identity. `v_init = None` starts from the leading
/// eigenvector of the full pencil. Hitting `max_iterations` is not an error:
/// the result carries [`Termination::MaxIterationsReached`].
#[instrument(skip_all, name = "speigh", fields(n = a.nrows(), rho = config.rho))]
pub fn speigh(
    a: &DMatrix<f64>,
    b: Option<&DMatrix<f64>>,
    v_init: Option<&DVector<f64>>,
    config: &SpeighConfig,
) -> Result<SparseEigenpair, AnalysisError> {
    config
        .validate()
        .map_err(|e| AnalysisError::InvalidArgument(format!("speigh: {e}")))?;
    ensure_finite(a, "speigh")?;
    let n = ensure_symmetric(a, "speigh")?;
    if let Some(b) = b {
        ensure_finite(b, "speigh")?;
        if b.shape() != (n, n) {
            return Err(AnalysisError::mismatch(
                "speigh",
                format!("B of shape {n}x{n}"),
                format!("{}x{}", b.nrows(), b.ncols()),
            ));
        }
        ensure_symmetric(b, "speigh")?;
    }

    let (tau, start) = match (config.tau, v_init) {
        (Some(tau), Some(v)) => (tau, v.clone()),
        (tau, v) => {
            let spectrum = generalized_eigh(a, b)?;
            (
                tau.unwrap_or_else(|| default_shift(spectrum.leading().0, spectrum.smallest())),
                v.cloned().unwrap_or_else(|| spectrum.leading().1),
            )
        }
    };
    if start.len() != n {
        return Err(AnalysisError::mismatch(
            "speigh",
            format!("initial vector of length {n}"),
            start.len(),
        ));
    }
    if !start.iter().all(|x| x.is_finite()) {
        return Err(AnalysisError::InvalidArgument(
            "speigh: initial vector contains NaN or infinite values".to_string(),
        ));
    }

    let metric = Metric::new(b)?;
    let shifted = match b {
        Some(b) => a + b * tau,
        None => a + DMatrix::identity(n, n) * tau,
    };
    let rho_eps = config.rho / (1.0 + 1.0 / config.eps).ln();
    debug!("tau = {:.4e}, rho_eps = {:.4e}", tau, rho_eps);

    let start_norm = metric.norm(&start);
    if start_norm <= 0.0 || !start_norm.is_finite() {
        return Err(AnalysisError::InvalidArgument(
            "speigh: initial vector has zero B-norm".to_string(),
        ));
    }
    let mut x = start / start_norm;
    let mut support = support_of(&x);
    let mut stable_for = 0;
    let mut iterations = 0;
    let mut termination = Termination::MaxIterationsReached;

    while iterations < config.max_iterations {
        iterations += 1;
        let c = metric.solve(&shifted * &x);

        let next = if config.rho > 0.0 {
            DVector::from_fn(n, |i, _| {
                let threshold = 0.5 * rho_eps / (x[i].abs() + config.eps);
                let magnitude = c[i].abs() - threshold;
                if magnitude > 0.0 {
                    c[i].signum() * magnitude
                } else {
                    0.0
                }
            })
        } else {
            c
        };

        let norm = metric.norm(&next);
        if norm <= 0.0 || !norm.is_finite() {
            let reason = if config.rho > 0.0 {
                format!(
                    "iterate vanished at iteration {iterations}; rho = {} removes every coordinate",
                    config.rho
                )
            } else {
                format!("A + tau B maps the iterate to zero at iteration {iterations} (tau = {tau:e})")
            };
            return Err(AnalysisError::NumericalInstability {
                context: "speigh",
                reason,
            });
        }
        let next = next / norm;
        let step = (&next - &x).norm();
        x = next;
        trace!("Iteration {}: step = {:.3e}", iterations, step);

        if step < config.tol {
            termination = Termination::Converged;
            break;
        }
        if config.rho > 0.0 {
            let current = support_of(&x);
            if current == support {
                stable_for += 1;
                if stable_for >= config.max_stable_support {
                    termination = Termination::SupportStabilized;
                    break;
                }
            } else {
                support = current;
                stable_for = 0;
            }
        }
    }

    match termination {
        Termination::MaxIterationsReached => warn!(
            "speigh reached the iteration cap ({}) without converging; result is approximate.",
            config.max_iterations
        ),
        other => debug!("speigh stopped after {} iterations: {}.", iterations, other),
    }

    let support = if config.rho > 0.0 {
        support_of(&x)
    } else {
        (0..n).collect()
    };
    let (eigenvalue, eigenvector) = renormalize(a, b, &x, &support)?;
    Ok(SparseEigenpair {
        eigenvalue,
        eigenvector,
        final_iterate: x,
        iterations,
        termination,
    })
}

/// `max(0, -lambda_min)` plus a margin, so the shifted pencil is positive
/// definite even when `lambda_max == lambda_min`.
fn default_shift(largest: f64, smallest: f64) -> f64 {
    let scale = largest.abs().max(smallest.abs());
    let margin = if scale > 0.0 { SHIFT_MARGIN * scale } else { 1.0 };
    (-smallest).max(0.0) + margin
}

/// Solves the pencil restricted to `support` and embeds the leading
/// eigenvector back into the full space, signed to agree with `x`.
fn renormalize(
    a: &DMatrix<f64>,
    b: Option<&DMatrix<f64>>,
    x: &DVector<f64>,
    support: &[usize],
) -> Result<(f64, DVector<f64>), AnalysisError> {
    let a_sub = a.select_rows(support).select_columns(support);
    let b_sub = b.map(|b| b.select_rows(support).select_columns(support));
    let (eigenvalue, local) = generalized_eigh(&a_sub, b_sub.as_ref())?.leading();

    let mut vector = DVector::zeros(x.len());
    for (k, &i) in support.iter().enumerate() {
        vector[i] = local[k];
    }
    let alignment: f64 = support.iter().map(|&i| vector[i] * x[i]).sum();
    if alignment < 0.0 {
        vector.neg_mut();
    }
    Ok((eigenvalue, vector))
}
