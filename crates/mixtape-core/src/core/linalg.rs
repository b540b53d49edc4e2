use super::error::AnalysisError;
use nalgebra::{Cholesky, DMatrix, DVector, SymmetricEigen};
use std::cmp::Ordering;

const SYMMETRY_TOLERANCE: f64 = 1e-8;

/// Eigenpairs of a symmetric pencil `(A, B)`, sorted by descending eigenvalue.
///
/// Column `i` of `eigenvectors` belongs to `eigenvalues[i]` and is normalized
/// so that `v^T B v = 1`.
#[derive(Debug, Clone)]
pub struct GeneralizedEigen {
    pub eigenvalues: DVector<f64>,
    pub eigenvectors: DMatrix<f64>,
}

impl GeneralizedEigen {
    pub fn leading(&self) -> (f64, DVector<f64>) {
        (self.eigenvalues[0], self.eigenvectors.column(0).into_owned())
    }

    pub fn smallest(&self) -> f64 {
        self.eigenvalues[self.eigenvalues.len() - 1]
    }
}

pub fn ensure_square(m: &DMatrix<f64>, context: &'static str) -> Result<usize, AnalysisError> {
    if !m.is_square() {
        return Err(AnalysisError::mismatch(
            context,
            "a square matrix",
            format!("{}x{}", m.nrows(), m.ncols()),
        ));
    }
    if m.nrows() == 0 {
        return Err(AnalysisError::InvalidArgument(format!(
            "{context}: matrix must not be empty"
        )));
    }
    Ok(m.nrows())
}

pub fn ensure_symmetric(m: &DMatrix<f64>, context: &'static str) -> Result<usize, AnalysisError> {
    let n = ensure_square(m, context)?;
    let scale = m.amax().max(1.0);
    for i in 0..n {
        for j in (i + 1)..n {
            if (m[(i, j)] - m[(j, i)]).abs() > SYMMETRY_TOLERANCE * scale {
                return Err(AnalysisError::InvalidArgument(format!(
                    "{context}: matrix is not symmetric at ({i}, {j})"
                )));
            }
        }
    }
    Ok(n)
}

pub fn ensure_finite(m: &DMatrix<f64>, context: &'static str) -> Result<(), AnalysisError> {
    if m.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(AnalysisError::InvalidArgument(format!(
            "{context}: input contains NaN or infinite values"
        )))
    }
}

#[inline]
pub fn row_distance(a: &DMatrix<f64>, i: usize, b: &DMatrix<f64>, j: usize) -> f64 {
    (0..a.ncols())
        .map(|d| {
            let diff = a[(i, d)] - b[(j, d)];
            diff * diff
        })
        .sum::<f64>()
        .sqrt()
}

pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

/// Solves `A v = w B v` for symmetric `A` and symmetric positive-definite `B`
/// (identity when `None`) by Cholesky reduction to a standard problem.
pub fn generalized_eigh(
    a: &DMatrix<f64>,
    b: Option<&DMatrix<f64>>,
) -> Result<GeneralizedEigen, AnalysisError> {
    ensure_finite(a, "generalized_eigh")?;
    let n = ensure_symmetric(a, "generalized_eigh")?;

    let (reduced, factor) = match b {
        None => (symmetrize(a), None),
        Some(b) => {
            if b.shape() != a.shape() {
                return Err(AnalysisError::mismatch(
                    "generalized_eigh",
                    format!("B of shape {n}x{n}"),
                    format!("{}x{}", b.nrows(), b.ncols()),
                ));
            }
            ensure_finite(b, "generalized_eigh")?;
            ensure_symmetric(b, "generalized_eigh")?;
            let l = Cholesky::new(b.clone())
                .ok_or_else(|| {
                    AnalysisError::InvalidArgument(
                        "generalized_eigh: B is not positive definite".to_string(),
                    )
                })?
                .l();
            let left = l.solve_lower_triangular(a).ok_or_else(singular_factor)?;
            let both = l
                .solve_lower_triangular(&left.transpose())
                .ok_or_else(singular_factor)?;
            (symmetrize(&both), Some(l))
        }
    };

    let eigen = SymmetricEigen::new(reduced);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        eigen.eigenvalues[j]
            .partial_cmp(&eigen.eigenvalues[i])
            .unwrap_or(Ordering::Equal)
    });

    let eigenvalues = DVector::from_iterator(n, order.iter().map(|&i| eigen.eigenvalues[i]));
    let mut eigenvectors = eigen.eigenvectors.select_columns(&order);
    if let Some(l) = factor {
        eigenvectors = l
            .transpose()
            .solve_upper_triangular(&eigenvectors)
            .ok_or_else(singular_factor)?;
    }

    Ok(GeneralizedEigen {
        eigenvalues,
        eigenvectors,
    })
}

fn singular_factor() -> AnalysisError {
    AnalysisError::NumericalInstability {
        context: "generalized_eigh",
        reason: "Cholesky factor of B is singular".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn pencil() -> (DMatrix<f64>, DMatrix<f64>) {
        let a = DMatrix::from_row_slice(
            3,
            3,
            &[2.0, -1.0, 0.5, -1.0, 0.0, 0.3, 0.5, 0.3, -1.5],
        );
        let b = DMatrix::from_row_slice(3, 3, &[2.0, 0.2, 0.0, 0.2, 1.5, 0.1, 0.0, 0.1, 1.0]);
        (a, b)
    }

    #[test]
    fn generalized_eigh_satisfies_the_pencil_equation() {
        let (a, b) = pencil();
        let eig = generalized_eigh(&a, Some(&b)).unwrap();

        for i in 0..3 {
            let v = eig.eigenvectors.column(i).into_owned();
            let residual = &a * &v - (&b * &v) * eig.eigenvalues[i];
            assert!(residual.norm() < TOLERANCE);
            assert!((v.dot(&(&b * &v)) - 1.0).abs() < TOLERANCE);
        }
    }

    #[test]
    fn generalized_eigh_sorts_descending() {
        let (a, b) = pencil();
        let eig = generalized_eigh(&a, Some(&b)).unwrap();
        assert!(eig.eigenvalues[0] >= eig.eigenvalues[1]);
        assert!(eig.eigenvalues[1] >= eig.eigenvalues[2]);
        assert_eq!(eig.smallest(), eig.eigenvalues[2]);
    }

    #[test]
    fn generalized_eigh_without_b_matches_diagonal_spectrum() {
        let a = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 3.0, -2.0]));
        let eig = generalized_eigh(&a, None).unwrap();
        assert_eq!(eig.eigenvalues.as_slice(), &[3.0, 1.0, -2.0]);
        let (w, v) = eig.leading();
        assert_eq!(w, 3.0);
        assert!((v[1].abs() - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn non_positive_definite_b_is_rejected() {
        let (a, _) = pencil();
        let b = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, -1.0, 1.0]));
        assert!(matches!(
            generalized_eigh(&a, Some(&b)),
            Err(AnalysisError::InvalidArgument(_))
        ));
    }

    #[test]
    fn non_finite_pencil_is_rejected() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, f64::NAN, f64::NAN, 2.0]);
        assert!(matches!(
            generalized_eigh(&a, None),
            Err(AnalysisError::InvalidArgument(_))
        ));

        let a = DMatrix::<f64>::identity(2, 2);
        let b = DMatrix::from_row_slice(2, 2, &[f64::INFINITY, 0.0, 0.0, 1.0]);
        assert!(matches!(
            generalized_eigh(&a, Some(&b)),
            Err(AnalysisError::InvalidArgument(_))
        ));
    }

    #[test]
    fn asymmetric_matrix_is_rejected() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 1.0]);
        assert!(ensure_symmetric(&a, "test").is_err());
    }

    #[test]
    fn non_square_matrix_reports_dimension_mismatch() {
        let a = DMatrix::<f64>::zeros(2, 3);
        assert!(matches!(
            ensure_square(&a, "test"),
            Err(AnalysisError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn row_distance_is_euclidean() {
        let a = DMatrix::from_row_slice(1, 2, &[0.0, 0.0]);
        let b = DMatrix::from_row_slice(2, 2, &[9.0, 9.0, 3.0, 4.0]);
        assert!((row_distance(&a, 0, &b, 1) - 5.0).abs() < TOLERANCE);
    }
}
