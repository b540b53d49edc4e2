use crate::core::error::AnalysisError;
use crate::core::linalg::ensure_finite;
use nalgebra::{DMatrix, DVector};
use tracing::instrument;

/// Per-state Gaussian parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Wells {
    /// K x D, one mean per row.
    pub means: DMatrix<f64>,
    /// K matrices of size D x D.
    pub covariances: Vec<DMatrix<f64>>,
    /// Total responsibility of each state.
    pub weights: Vec<f64>,
}

impl Wells {
    pub fn n_states(&self) -> usize {
        self.means.nrows()
    }

    pub fn mean(&self, k: usize) -> DVector<f64> {
        self.means.row(k).transpose()
    }
}

/// Weighted mean and covariance of the observations for every state.
///
/// Fails with [`AnalysisError::DegenerateCluster`] when a state carries no weight.
#[instrument(level = "debug", skip_all, fields(rows = observations.nrows(), states = responsibilities.ncols()))]
pub fn empirical_wells(
    observations: &DMatrix<f64>,
    responsibilities: &DMatrix<f64>,
) -> Result<Wells, AnalysisError> {
    let (t_len, dim) = observations.shape();
    let k = responsibilities.ncols();
    if responsibilities.nrows() != t_len {
        return Err(AnalysisError::mismatch(
            "empirical_wells",
            format!("{t_len} responsibility rows"),
            responsibilities.nrows(),
        ));
    }
    if k == 0 {
        return Err(AnalysisError::InvalidArgument(
            "empirical_wells: responsibility matrix has no states".to_string(),
        ));
    }
    ensure_finite(observations, "empirical_wells")?;
    if let Some(w) = responsibilities.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(AnalysisError::InvalidArgument(format!(
            "empirical_wells: responsibilities must be finite and non-negative, found {w}"
        )));
    }

    let mut means = DMatrix::zeros(k, dim);
    let mut covariances = Vec::with_capacity(k);
    let mut weights = Vec::with_capacity(k);

    for state in 0..k {
        let column = responsibilities.column(state);
        let total = column.sum();
        if total <= 0.0 {
            return Err(AnalysisError::DegenerateCluster { cluster: state });
        }

        let mut mean = DVector::zeros(dim);
        for t in 0..t_len {
            if column[t] > 0.0 {
                mean += observations.row(t).transpose() * column[t];
            }
        }
        mean /= total;

        let mut covariance = DMatrix::zeros(dim, dim);
        for t in 0..t_len {
            if column[t] > 0.0 {
                let centered = observations.row(t).transpose() - &mean;
                covariance += &centered * centered.transpose() * column[t];
            }
        }
        covariance /= total;

        means.set_row(state, &mean.transpose());
        covariances.push(covariance);
        weights.push(total);
    }

    Ok(Wells {
        means,
        covariances,
        weights,
    })
}

/// Hard T x K responsibility matrix with a single 1 per row.
pub fn one_hot_responsibilities(
    assignments: &[usize],
    k: usize,
) -> Result<DMatrix<f64>, AnalysisError> {
    let mut weights = DMatrix::zeros(assignments.len(), k);
    for (t, &state) in assignments.iter().enumerate() {
        if state >= k {
            return Err(AnalysisError::InvalidArgument(format!(
                "one_hot_responsibilities: state {state} at frame {t} is out of range for {k} states"
            )));
        }
        weights[(t, state)] = 1.0;
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, StandardNormal};

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn hard_assignment_gives_group_mean_and_biased_covariance() {
        let ys = DMatrix::from_row_slice(4, 1, &[1.0, 3.0, 10.0, 14.0]);
        let w = one_hot_responsibilities(&[0, 0, 1, 1], 2).unwrap();
        let wells = empirical_wells(&ys, &w).unwrap();

        assert!((wells.means[(0, 0)] - 2.0).abs() < TOLERANCE);
        assert!((wells.means[(1, 0)] - 12.0).abs() < TOLERANCE);
        assert!((wells.covariances[0][(0, 0)] - 1.0).abs() < TOLERANCE);
        assert!((wells.covariances[1][(0, 0)] - 4.0).abs() < TOLERANCE);
        assert_eq!(wells.weights, vec![2.0, 2.0]);
    }

    #[test]
    fn soft_weights_scale_contributions() {
        let ys = DMatrix::from_row_slice(2, 1, &[0.0, 4.0]);
        let w = DMatrix::from_row_slice(2, 1, &[3.0, 1.0]);
        let wells = empirical_wells(&ys, &w).unwrap();
        assert!((wells.means[(0, 0)] - 1.0).abs() < TOLERANCE);
        // (3 * 1 + 1 * 9) / 4
        assert!((wells.covariances[0][(0, 0)] - 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn recovers_generative_gaussian_mixture() {
        let mut rng = StdRng::seed_from_u64(5);
        let true_means = [[0.0, 0.0], [6.0, -3.0]];
        // Cholesky factors of the generative covariances.
        let factors = [
            DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.5, 0.5]),
            DMatrix::from_row_slice(2, 2, &[0.7, 0.0, -0.2, 1.2]),
        ];
        let per_state = 20_000;

        let mut data = Vec::with_capacity(2 * per_state * 2);
        let mut labels = Vec::with_capacity(2 * per_state);
        for state in 0..2 {
            for _ in 0..per_state {
                let z = DVector::from_fn(2, |_, _| StandardNormal.sample(&mut rng));
                let y = &factors[state] * z;
                data.push(true_means[state][0] + y[0]);
                data.push(true_means[state][1] + y[1]);
                labels.push(state);
            }
        }
        let ys = DMatrix::from_row_slice(labels.len(), 2, &data);
        let w = one_hot_responsibilities(&labels, 2).unwrap();
        let wells = empirical_wells(&ys, &w).unwrap();

        for state in 0..2 {
            let true_cov = &factors[state] * factors[state].transpose();
            for d in 0..2 {
                assert!((wells.means[(state, d)] - true_means[state][d]).abs() < 0.05);
            }
            assert!((&wells.covariances[state] - &true_cov).amax() < 0.06);
        }
    }

    #[test]
    fn covariances_are_symmetric() {
        let ys = DMatrix::from_row_slice(3, 2, &[0.0, 1.0, 2.0, -1.0, 4.0, 0.5]);
        let w = DMatrix::from_element(3, 1, 1.0);
        let wells = empirical_wells(&ys, &w).unwrap();
        let c = &wells.covariances[0];
        assert!((c[(0, 1)] - c[(1, 0)]).abs() < TOLERANCE);
        assert_eq!(wells.mean(0).len(), 2);
    }

    #[test]
    fn zero_weight_cluster_is_degenerate() {
        let ys = DMatrix::from_row_slice(3, 1, &[0.0, 1.0, 2.0]);
        let w = one_hot_responsibilities(&[0, 0, 2], 3).unwrap();
        assert_eq!(
            empirical_wells(&ys, &w),
            Err(AnalysisError::DegenerateCluster { cluster: 1 })
        );
    }

    #[test]
    fn mismatched_rows_are_rejected() {
        let ys = DMatrix::from_row_slice(3, 1, &[0.0, 1.0, 2.0]);
        let w = DMatrix::from_element(2, 1, 1.0);
        assert!(matches!(
            empirical_wells(&ys, &w),
            Err(AnalysisError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn negative_weights_are_rejected() {
        let ys = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let w = DMatrix::from_row_slice(2, 1, &[1.0, -0.5]);
        assert!(matches!(
            empirical_wells(&ys, &w),
            Err(AnalysisError::InvalidArgument(_))
        ));
    }

    #[test]
    fn one_hot_rejects_out_of_range_state() {
        assert!(one_hot_responsibilities(&[0, 4], 2).is_err());
    }
}
