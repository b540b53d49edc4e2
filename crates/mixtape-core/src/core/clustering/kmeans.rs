use crate::core::error::AnalysisError;
use crate::core::linalg::{ensure_finite, row_distance};
use crate::engine::config::{KMeansConfig, KMeansInit};
use nalgebra::DMatrix;
use rand::Rng;
use tracing::{debug, instrument, trace, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub means: DMatrix<f64>,
    pub assignments: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
    /// Clusters that had no members after the last update; their mean is zero.
    pub empty_clusters: Vec<usize>,
}

impl KMeansFit {
    pub fn n_clusters(&self) -> usize {
        self.means.nrows()
    }

    /// Within-cluster sum of squared distances.
    pub fn inertia(&self, observations: &DMatrix<f64>) -> f64 {
        self.assignments
            .iter()
            .enumerate()
            .map(|(t, &k)| row_distance(observations, t, &self.means, k).powi(2))
            .sum()
    }

    pub fn populations(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_clusters()];
        for &k in &self.assignments {
            counts[k] += 1;
        }
        counts
    }
}

/// Lloyd's algorithm from a single initialization.
///
/// Returns normally when the iteration cap is hit; check [`KMeansFit::converged`].
#[instrument(skip_all, name = "kmeans", fields(k = k, rows = observations.nrows()))]
pub fn kmeans(
    observations: &DMatrix<f64>,
    k: usize,
    config: &KMeansConfig,
    rng: &mut impl Rng,
) -> Result<KMeansFit, AnalysisError> {
    config
        .validate()
        .map_err(|e| AnalysisError::InvalidArgument(format!("kmeans: {e}")))?;
    let (t_len, dim) = observations.shape();
    if k == 0 {
        return Err(AnalysisError::InvalidArgument(
            "kmeans: number of clusters must be at least 1".to_string(),
        ));
    }
    if t_len == 0 || dim == 0 {
        return Err(AnalysisError::InvalidArgument(format!(
            "kmeans: observation matrix is empty ({t_len}x{dim})"
        )));
    }
    ensure_finite(observations, "kmeans")?;

    let mut means = initial_means(observations, k, &config.init, rng)?;
    let mut assignments = vec![0usize; t_len];
    let mut counts = vec![0usize; k];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iterations {
        assign_nearest(observations, &means, &mut assignments);

        let old_means = means.clone();
        means.fill(0.0);
        counts.fill(0);
        for (t, &cluster) in assignments.iter().enumerate() {
            counts[cluster] += 1;
            for d in 0..dim {
                means[(cluster, d)] += observations[(t, d)];
            }
        }

        let mut delta = 0.0;
        for cluster in 0..k {
            if counts[cluster] > 0 {
                let n = counts[cluster] as f64;
                for d in 0..dim {
                    means[(cluster, d)] /= n;
                }
            }
            delta += row_distance(&means, cluster, &old_means, cluster);
        }
        iterations += 1;
        trace!("Iteration {}: delta = {:.3e}", iterations, delta);

        if delta < config.tolerance {
            converged = true;
            break;
        }
    }

    let empty_clusters: Vec<usize> = (0..k).filter(|&c| counts[c] == 0).collect();
    if !empty_clusters.is_empty() {
        warn!(
            "k-means left {} cluster(s) without members: {:?}. Their means are zero.",
            empty_clusters.len(),
            empty_clusters
        );
    }
    if converged {
        debug!("k-means converged after {} iterations.", iterations);
    } else {
        warn!(
            "k-means did not converge within {} iterations; returning the last iterate.",
            config.max_iterations
        );
    }

    Ok(KMeansFit {
        means,
        assignments,
        iterations,
        converged,
        empty_clusters,
    })
}

/// Assigns each observation to its nearest mean.
pub fn predict(
    means: &DMatrix<f64>,
    observations: &DMatrix<f64>,
) -> Result<Vec<usize>, AnalysisError> {
    if means.nrows() == 0 {
        return Err(AnalysisError::InvalidArgument(
            "predict: no cluster means supplied".to_string(),
        ));
    }
    if means.ncols() != observations.ncols() {
        return Err(AnalysisError::mismatch(
            "predict",
            format!("{} feature columns", means.ncols()),
            observations.ncols(),
        ));
    }
    let mut assignments = vec![0usize; observations.nrows()];
    assign_nearest(observations, means, &mut assignments);
    Ok(assignments)
}

fn initial_means(
    observations: &DMatrix<f64>,
    k: usize,
    init: &KMeansInit,
    rng: &mut impl Rng,
) -> Result<DMatrix<f64>, AnalysisError> {
    match init {
        KMeansInit::Random => {
            let rows: Vec<usize> = (0..k)
                .map(|_| rng.gen_range(0..observations.nrows()))
                .collect();
            debug!("Initial means drawn from observations {:?}", rows);
            Ok(observations.select_rows(&rows))
        }
        KMeansInit::Means(means) => {
            if means.shape() != (k, observations.ncols()) {
                return Err(AnalysisError::mismatch(
                    "kmeans initial means",
                    format!("{}x{}", k, observations.ncols()),
                    format!("{}x{}", means.nrows(), means.ncols()),
                ));
            }
            ensure_finite(means, "kmeans initial means")?;
            Ok(means.clone())
        }
    }
}

fn assign_nearest(observations: &DMatrix<f64>, means: &DMatrix<f64>, assignments: &mut [usize]) {
    for (t, slot) in assignments.iter_mut().enumerate() {
        let mut best = f64::INFINITY;
        for cluster in 0..means.nrows() {
            let dist = row_distance(observations, t, means, cluster);
            if dist < best {
                best = dist;
                *slot = cluster;
            }
        }
    }
}
