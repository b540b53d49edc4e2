use crate::core::error::AnalysisError;
use nalgebra::DMatrix;
use tracing::{instrument, trace};

/// Row-stochastic transition matrix at lag 1 with add-one smoothing.
pub fn transition_counts(assignments: &[usize], k: usize) -> Result<DMatrix<f64>, AnalysisError> {
    transition_counts_at_lag(assignments, k, 1)
}

/// Like [`transition_counts`], but counts pairs `(a[t - lag], a[t])`.
pub fn transition_counts_at_lag(
    assignments: &[usize],
    k: usize,
    lag: usize,
) -> Result<DMatrix<f64>, AnalysisError> {
    transition_counts_multi(&[assignments], k, lag)
}

/// Accumulates transition counts over independent trajectories. Pairs never
/// straddle two trajectories.
#[instrument(level = "debug", skip_all, fields(trajectories = trajectories.len(), k = k, lag = lag))]
pub fn transition_counts_multi<T: AsRef<[usize]>>(
    trajectories: &[T],
    k: usize,
    lag: usize,
) -> Result<DMatrix<f64>, AnalysisError> {
    if k == 0 {
        return Err(AnalysisError::InvalidArgument(
            "transition_counts: number of states must be at least 1".to_string(),
        ));
    }
    if lag == 0 {
        return Err(AnalysisError::InvalidArgument(
            "transition_counts: lag must be at least 1".to_string(),
        ));
    }

    let mut counts = DMatrix::from_element(k, k, 1.0);
    for (index, trajectory) in trajectories.iter().enumerate() {
        let states = trajectory.as_ref();
        if let Some(&bad) = states.iter().find(|&&s| s >= k) {
            return Err(AnalysisError::InvalidArgument(format!(
                "transition_counts: state {bad} in trajectory {index} is out of range for {k} states"
            )));
        }
        for (&from, &to) in states.iter().zip(states.iter().skip(lag)) {
            counts[(from, to)] += 1.0;
        }
        trace!(
            "Trajectory {} contributed {} transitions.",
            index,
            states.len().saturating_sub(lag)
        );
    }

    for mut row in counts.row_iter_mut() {
        let total = row.sum();
        row /= total;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn assert_row_stochastic(m: &DMatrix<f64>) {
        for row in m.row_iter() {
            assert!((row.sum() - 1.0).abs() < TOLERANCE);
            assert!(row.iter().all(|&p| p > 0.0));
        }
    }

    #[test]
    fn counts_are_laplace_smoothed_and_normalized() {
        let assignments = [0, 0, 1, 1, 0];
        let m = transition_counts(&assignments, 2).unwrap();

        // counts: [[1+1, 1+1], [1+1, 1+1]] -> all 0.5
        assert!((m[(0, 0)] - 0.5).abs() < TOLERANCE);
        assert!((m[(0, 1)] - 0.5).abs() < TOLERANCE);
        assert!((m[(1, 0)] - 0.5).abs() < TOLERANCE);
        assert!((m[(1, 1)] - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn asymmetric_sequence_gives_expected_probabilities() {
        let assignments = [0, 1, 2, 0, 1, 2, 0];
        let m = transition_counts(&assignments, 3).unwrap();

        // Row 0: counts [1, 3, 1] -> [0.2, 0.6, 0.2]
        assert!((m[(0, 1)] - 0.6).abs() < TOLERANCE);
        assert!((m[(0, 0)] - 0.2).abs() < TOLERANCE);
        // Row 2: counts [3, 1, 1]
        assert!((m[(2, 0)] - 0.6).abs() < TOLERANCE);
        assert_row_stochastic(&m);
    }

    #[test]
    fn rows_are_stochastic_for_any_sequence() {
        for k in 1..6 {
            let assignments: Vec<usize> = (0..97).map(|t| (t * 7 + t / 3) % k).collect();
            let m = transition_counts(&assignments, k).unwrap();
            assert_eq!(m.shape(), (k, k));
            assert_row_stochastic(&m);
        }
    }

    #[test]
    fn empty_and_single_frame_sequences_are_uniform() {
        for assignments in [vec![], vec![1]] {
            let m = transition_counts(&assignments, 3).unwrap();
            for p in m.iter() {
                assert!((p - 1.0 / 3.0).abs() < TOLERANCE);
            }
        }
    }

    #[test]
    fn lag_skips_intermediate_frames() {
        let assignments = [0, 1, 0, 1, 0];
        let m = transition_counts_at_lag(&assignments, 2, 2).unwrap();
        // lag-2 pairs: (0,0), (1,1), (0,0) -> row 0 counts [3, 1], row 1 [1, 2]
        assert!((m[(0, 0)] - 0.75).abs() < TOLERANCE);
        assert!((m[(1, 1)] - 2.0 / 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn trajectories_are_not_joined() {
        let trajectories = [vec![0, 0, 0], vec![1, 1, 1]];
        let m = transition_counts_multi(&trajectories, 2, 1).unwrap();
        // No 0 -> 1 transition exists within a trajectory.
        assert!((m[(0, 1)] - 1.0 / 4.0).abs() < TOLERANCE);
        assert!((m[(1, 0)] - 1.0 / 4.0).abs() < TOLERANCE);

        let joined = transition_counts(&[0, 0, 0, 1, 1, 1], 2).unwrap();
        assert!(joined[(0, 1)] > m[(0, 1)]);
    }

    #[test]
    fn out_of_range_state_is_rejected() {
        assert!(matches!(
            transition_counts(&[0, 2], 2),
            Err(AnalysisError::InvalidArgument(_))
        ));
    }

    #[test]
    fn zero_states_and_zero_lag_are_rejected() {
        assert!(transition_counts(&[], 0).is_err());
        assert!(transition_counts_at_lag(&[0, 0], 1, 0).is_err());
    }
}
