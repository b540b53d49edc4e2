use crate::core::error::AnalysisError;
use crate::core::linalg::{ensure_finite, ensure_square};
use nalgebra::{DMatrix, DVector};

const RAYLEIGH_FLOOR: f64 = 1e-14;

/// Schur complement deflation: `A - (A v)(A v)^T / (v^T A v)`.
///
/// If `v` solves `A v = w B v` with `w != 0`, the result maps `v` to zero and
/// keeps every other `B`-orthogonal eigenpair of the pencil.
pub fn scdeflate(a: &DMatrix<f64>, v: &DVector<f64>) -> Result<DMatrix<f64>, AnalysisError> {
    let n = ensure_square(a, "scdeflate")?;
    if v.len() != n {
        return Err(AnalysisError::mismatch(
            "scdeflate",
            format!("vector of length {n}"),
            v.len(),
        ));
    }
    ensure_finite(a, "scdeflate")?;
    if !v.iter().all(|x| x.is_finite()) {
        return Err(AnalysisError::InvalidArgument(
            "scdeflate: vector contains NaN or infinite values".to_string(),
        ));
    }

    let av = a * v;
    let curvature = v.dot(&av);
    let scale = a.amax().max(1.0) * v.norm_squared();
    if !curvature.is_finite() || curvature.abs() <= RAYLEIGH_FLOOR * scale {
        return Err(AnalysisError::NumericalInstability {
            context: "scdeflate",
            reason: format!("v^T A v = {curvature:e} is too close to zero to deflate"),
        });
    }

    Ok(a - (&av * av.transpose()) / curvature)
}
