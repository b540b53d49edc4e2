use crate::core::clustering::kmeans::{self, KMeansFit};
use crate::core::clustering::matching::means_match;
use crate::core::error::AnalysisError;
use crate::core::estimation::transitions::transition_counts_at_lag;
use crate::core::estimation::wells::{Wells, empirical_wells, one_hot_responsibilities};
use crate::engine::config::MsmConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use nalgebra::DMatrix;
use rand::Rng;
use tracing::{debug, info, instrument, warn};

/// A discrete-state kinetic model fitted to one trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkovStateModel {
    /// K x D cluster centers, one state per row.
    pub means: DMatrix<f64>,
    pub assignments: Vec<usize>,
    /// Row-stochastic K x K matrix at `lag`.
    pub transition_matrix: DMatrix<f64>,
    pub wells: Wells,
    pub lag: usize,
    pub inertia: f64,
    pub converged: bool,
    /// Fraction of frames each replicate fit labels like the reference, after matching.
    pub replicate_agreement: Vec<f64>,
}

impl MarkovStateModel {
    pub fn n_states(&self) -> usize {
        self.means.nrows()
    }

    pub fn populations(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_states()];
        for &k in &self.assignments {
            counts[k] += 1;
        }
        counts
    }

    /// Assigns new observations to the nearest state.
    pub fn predict(&self, observations: &DMatrix<f64>) -> Result<Vec<usize>, AnalysisError> {
        kmeans::predict(&self.means, observations)
    }
}

#[instrument(skip_all, name = "msm_workflow", fields(states = config.n_states, lag = config.lag))]
pub fn run(
    observations: &DMatrix<f64>,
    config: &MsmConfig,
    rng: &mut impl Rng,
    reporter: &ProgressReporter,
) -> Result<MarkovStateModel, EngineError> {
    config.kmeans.validate()?;
    if observations.nrows() < config.n_states {
        return Err(AnalysisError::InvalidArgument(format!(
            "cannot fit {} states to {} observations",
            config.n_states,
            observations.nrows()
        ))
        .into());
    }

    // === Phase 1: State decomposition ===
    let reference = fit_states(observations, config, rng, reporter)?;

    // === Phase 2: Label stability across replicates ===
    let replicate_agreement = if config.n_replicates > 0 {
        compare_replicates(observations, &reference, config, rng, reporter)?
    } else {
        Vec::new()
    };

    // === Phase 3: Kinetics and wells ===
    reporter.report(Progress::PhaseStart { name: "Estimation" });
    let transition_matrix =
        transition_counts_at_lag(&reference.assignments, config.n_states, config.lag)?;
    let responsibilities = one_hot_responsibilities(&reference.assignments, config.n_states)?;
    let wells = empirical_wells(observations, &responsibilities)?;
    reporter.report(Progress::PhaseFinish);

    let inertia = reference.inertia(observations);
    info!(
        inertia = inertia,
        converged = reference.converged,
        "Markov state model estimated."
    );

    Ok(MarkovStateModel {
        means: reference.means,
        assignments: reference.assignments,
        transition_matrix,
        wells,
        lag: config.lag,
        inertia,
        converged: reference.converged,
        replicate_agreement,
    })
}

fn fit_states(
    observations: &DMatrix<f64>,
    config: &MsmConfig,
    rng: &mut impl Rng,
    reporter: &ProgressReporter,
) -> Result<KMeansFit, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Clustering" });
    info!(
        "Fitting {} states with {} restart(s).",
        config.n_states, config.n_restarts
    );

    let fits = reporter.task(config.n_restarts, |_| {
        kmeans::kmeans(observations, config.n_states, &config.kmeans, rng)
    })?;
    let best = fits
        .into_iter()
        .map(|fit| (fit.inertia(observations), fit))
        .enumerate()
        .min_by(|(_, (a, _)), (_, (b, _))| a.total_cmp(b))
        .map(|(restart, (inertia, fit))| {
            debug!("Restart {} has the lowest inertia ({:.6e}).", restart, inertia);
            fit
        })
        .ok_or_else(|| EngineError::PhaseFailed {
            phase: "Clustering",
            reason: "no k-means restart was run".to_string(),
        })?;

    if !best.converged {
        warn!("The selected k-means fit did not converge.");
    }
    reporter.report(Progress::PhaseFinish);
    Ok(best)
}

fn compare_replicates(
    observations: &DMatrix<f64>,
    reference: &KMeansFit,
    config: &MsmConfig,
    rng: &mut impl Rng,
    reporter: &ProgressReporter,
) -> Result<Vec<f64>, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Replicates" });

    let agreement = reporter.task(config.n_replicates, |i| {
        let fit = kmeans::kmeans(observations, config.n_states, &config.kmeans, rng)?;
        let matched = means_match(&reference.means, &fit.means, &fit.assignments)?;
        if !matched.is_permutation() {
            debug!("Replicate {} matched two states onto one.", i);
        }
        Ok::<_, AnalysisError>(matched.agreement(&reference.assignments))
    })?;

    let worst = agreement.iter().copied().fold(f64::INFINITY, f64::min);
    info!(
        replicates = agreement.len(),
        worst_agreement = worst,
        "Replicate fits compared."
    );
    reporter.report(Progress::Message(format!(
        "Lowest replicate agreement: {:.3}",
        worst
    )));
    reporter.report(Progress::PhaseFinish);
    Ok(agreement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{KMeansConfigBuilder, KMeansInit, MsmConfigBuilder};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::{Arc, Mutex};

    const CENTERS: [[f64; 2]; 3] = [[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]];

    /// 90 frames dwelling 10 frames at a time in states 0, 1, 2, 0, ...
    fn sticky_trajectory(seed: u64) -> (DMatrix<f64>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let labels: Vec<usize> = (0..90).map(|t| (t / 10) % 3).collect();
        let mut data = Vec::with_capacity(2 * labels.len());
        for &label in &labels {
            data.push(CENTERS[label][0] + rng.gen_range(-0.5..0.5));
            data.push(CENTERS[label][1] + rng.gen_range(-0.5..0.5));
        }
        (DMatrix::from_row_slice(labels.len(), 2, &data), labels)
    }

    fn seeded_config(n_replicates: usize) -> MsmConfig {
        let init = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 9.0, 1.0, 1.0, 9.0]);
        MsmConfigBuilder::new()
            .n_states(3)
            .n_replicates(n_replicates)
            .kmeans(
                KMeansConfigBuilder::new()
                    .init(KMeansInit::Means(init))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn recovers_states_and_kinetics_of_sticky_trajectory() {
        let (ys, truth) = sticky_trajectory(1);
        let model = run(
            &ys,
            &seeded_config(2),
            &mut StdRng::seed_from_u64(0),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(model.assignments, truth);
        assert_eq!(model.populations(), vec![30, 30, 30]);
        assert!(model.converged);

        // Row 0: 27 self transitions and 3 exits to state 1, plus one pseudo-count each.
        let p = &model.transition_matrix;
        assert!((p[(0, 0)] - 28.0 / 33.0).abs() < 1e-12);
        assert!((p[(0, 1)] - 4.0 / 33.0).abs() < 1e-12);
        // The trajectory ends in state 2, so it leaves state 2 only twice.
        assert!((p[(2, 0)] - 3.0 / 32.0).abs() < 1e-12);

        for (k, center) in CENTERS.iter().enumerate() {
            assert!((model.wells.means[(k, 0)] - center[0]).abs() < 0.5);
            assert!((model.wells.means[(k, 1)] - center[1]).abs() < 0.5);
        }
        assert_eq!(model.replicate_agreement, vec![1.0, 1.0]);
    }

    #[test]
    fn lag_is_applied_to_transition_counts() {
        let (ys, _) = sticky_trajectory(2);
        let config = MsmConfig {
            lag: 10,
            ..seeded_config(0)
        };
        let model = run(
            &ys,
            &config,
            &mut StdRng::seed_from_u64(0),
            &ProgressReporter::new(),
        )
        .unwrap();

        // At lag 10 every frame lands in the next state of the cycle.
        assert_eq!(model.lag, 10);
        assert!((model.transition_matrix[(0, 1)] - 31.0 / 33.0).abs() < 1e-12);
        assert!(model.replicate_agreement.is_empty());
    }

    #[test]
    fn reports_phases_in_order() {
        let (ys, _) = sticky_trajectory(3);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |p| {
            if let Progress::PhaseStart { name } = p {
                sink.lock().unwrap().push(name);
            }
        }));

        run(&ys, &seeded_config(1), &mut StdRng::seed_from_u64(0), &reporter).unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec!["Clustering", "Replicates", "Estimation"]
        );
    }

    #[test]
    fn same_seed_gives_identical_models() {
        let (ys, _) = sticky_trajectory(4);
        let config = MsmConfigBuilder::new()
            .n_states(3)
            .n_restarts(10)
            .build()
            .unwrap();

        let a = run(&ys, &config, &mut StdRng::seed_from_u64(21), &ProgressReporter::new()).unwrap();
        let b = run(&ys, &config, &mut StdRng::seed_from_u64(21), &ProgressReporter::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn best_restart_has_lowest_inertia() {
        let (ys, _) = sticky_trajectory(5);
        let config = MsmConfigBuilder::new()
            .n_states(3)
            .n_restarts(20)
            .build()
            .unwrap();
        let model = run(&ys, &config, &mut StdRng::seed_from_u64(3), &ProgressReporter::new()).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let fit = kmeans::kmeans(&ys, 3, &config.kmeans, &mut rng).unwrap();
            assert!(model.inertia <= fit.inertia(&ys));
        }
    }

    #[test]
    fn empty_state_is_surfaced_as_degenerate_cluster() {
        let ys = DMatrix::from_row_slice(4, 1, &[1.0, 1.1, 0.9, 1.0]);
        let config = MsmConfigBuilder::new()
            .n_states(2)
            .kmeans(
                KMeansConfigBuilder::new()
                    .init(KMeansInit::Means(DMatrix::from_row_slice(2, 1, &[1.0, 100.0])))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        let result = run(&ys, &config, &mut StdRng::seed_from_u64(0), &ProgressReporter::new());
        assert!(matches!(
            result,
            Err(EngineError::Analysis {
                source: AnalysisError::DegenerateCluster { cluster: 1 }
            })
        ));
    }

    #[test]
    fn fewer_observations_than_states_is_rejected() {
        let ys = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let config = MsmConfigBuilder::new().n_states(3).build().unwrap();
        let result = run(&ys, &config, &mut StdRng::seed_from_u64(0), &ProgressReporter::new());
        assert!(matches!(result, Err(EngineError::Analysis { .. })));
    }

    #[test]
    fn model_predicts_nearest_state() {
        let (ys, _) = sticky_trajectory(6);
        let model = run(
            &ys,
            &seeded_config(0),
            &mut StdRng::seed_from_u64(0),
            &ProgressReporter::new(),
        )
        .unwrap();
        let frames = DMatrix::from_row_slice(3, 2, &[0.2, 9.5, 9.8, -0.3, -0.1, 0.4]);
        assert_eq!(model.predict(&frames).unwrap(), vec![2, 1, 0]);
    }
}
