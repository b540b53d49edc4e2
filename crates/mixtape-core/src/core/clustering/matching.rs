use crate::core::error::AnalysisError;
use crate::core::linalg::row_distance;
use nalgebra::DMatrix;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeansMatch {
    /// `matching[i]` is the cluster of the second model nearest to reference cluster `i`.
    pub matching: Vec<usize>,
    pub new_assignments: Vec<usize>,
}

impl MeansMatch {
    /// True when no two reference clusters claimed the same target.
    pub fn is_permutation(&self) -> bool {
        let mut seen = vec![false; self.matching.len()];
        for &j in &self.matching {
            if seen[j] {
                return false;
            }
            seen[j] = true;
        }
        true
    }

    /// Fraction of frames whose relabeled state equals `reference`.
    pub fn agreement(&self, reference: &[usize]) -> f64 {
        if reference.is_empty() {
            return 1.0;
        }
        let same = self
            .new_assignments
            .iter()
            .zip(reference)
            .filter(|(a, b)| a == b)
            .count();
        same as f64 / reference.len() as f64
    }
}

/// Pairs each reference centroid with its nearest centroid in `means` and
/// relabels `assignments` through that pairing.
///
/// Each reference cluster is matched independently, so two reference clusters
/// can claim the same target; see [`MeansMatch::is_permutation`].
pub fn means_match(
    base_means: &DMatrix<f64>,
    means: &DMatrix<f64>,
    assignments: &[usize],
) -> Result<MeansMatch, AnalysisError> {
    if base_means.shape() != means.shape() {
        return Err(AnalysisError::mismatch(
            "means_match",
            format!("{}x{}", base_means.nrows(), base_means.ncols()),
            format!("{}x{}", means.nrows(), means.ncols()),
        ));
    }
    let k = means.nrows();
    if k == 0 {
        return Err(AnalysisError::InvalidArgument(
            "means_match: centroid sets are empty".to_string(),
        ));
    }
    if let Some(&bad) = assignments.iter().find(|&&a| a >= k) {
        return Err(AnalysisError::InvalidArgument(format!(
            "means_match: assignment {bad} is out of range for {k} clusters"
        )));
    }

    let matching: Vec<usize> = (0..k)
        .map(|i| {
            let mut closest = 0;
            let mut closest_dist = f64::INFINITY;
            for j in 0..k {
                let dist = row_distance(base_means, i, means, j);
                if dist < closest_dist {
                    closest = j;
                    closest_dist = dist;
                }
            }
            closest
        })
        .collect();
    debug!("Cluster matching: {:?}", matching);

    let new_assignments = assignments.iter().map(|&a| matching[a]).collect();

    Ok(MeansMatch {
        matching,
        new_assignments,
    })
}
