use crate::core::decomposition::deflation::scdeflate;
use crate::core::decomposition::speigh::{SparseEigenpair, speigh};
use crate::core::error::AnalysisError;
use crate::core::linalg::{ensure_square, generalized_eigh};
use crate::engine::config::ComponentsConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use nalgebra::{DMatrix, DVector};
use tracing::{info, instrument, warn};

/// Sparse generalized eigenpairs in extraction order.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSet {
    pub components: Vec<SparseEigenpair>,
}

impl ComponentSet {
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn eigenvalues(&self) -> Vec<f64> {
        self.components.iter().map(|c| c.eigenvalue).collect()
    }

    /// N x K matrix with one eigenvector per column.
    pub fn eigenvectors(&self) -> DMatrix<f64> {
        let n = self.components.first().map_or(0, |c| c.eigenvector.len());
        DMatrix::from_fn(n, self.len(), |i, k| self.components[k].eigenvector[i])
    }

    pub fn all_converged(&self) -> bool {
        self.components.iter().all(|c| c.termination.is_converged())
    }
}

/// Extracts `n_components` eigenpairs of `(A, B)` one at a time, deflating
/// `A` by each vector before solving for the next.
///
/// Schur deflation leaves an extracted vector with eigenvalue zero, which
/// would outrank the negative part of an indefinite spectrum. Each extracted
/// vector is therefore also moved to a level below the smallest eigenvalue of
/// the input pencil, so the next solve sees only the remaining directions.
#[instrument(skip_all, name = "components_workflow", fields(n = a.nrows(), components = config.n_components))]
pub fn run(
    a: &DMatrix<f64>,
    b: Option<&DMatrix<f64>>,
    config: &ComponentsConfig,
    reporter: &ProgressReporter,
) -> Result<ComponentSet, EngineError> {
    config.speigh.validate()?;
    let n = ensure_square(a, "components")?;
    if config.n_components > n {
        return Err(AnalysisError::InvalidArgument(format!(
            "cannot extract {} components from a {n}x{n} matrix",
            config.n_components
        ))
        .into());
    }

    reporter.report(Progress::PhaseStart {
        name: "Sparse Components",
    });
    info!(
        "Extracting {} component(s) with rho = {}.",
        config.n_components, config.speigh.rho
    );

    let floor = {
        let spectrum = generalized_eigh(a, b)?;
        let (largest, smallest) = (spectrum.leading().0, spectrum.smallest());
        smallest - (largest - smallest).max(largest.abs()).max(1.0)
    };

    let mut current = a.clone();
    let components = reporter.task(config.n_components, |k| {
        let pair = speigh(&current, b, None, &config.speigh)?;
        info!(
            component = k,
            eigenvalue = pair.eigenvalue,
            cardinality = pair.cardinality(),
            iterations = pair.iterations,
            "Component extracted ({}).",
            pair.termination
        );
        if k + 1 < config.n_components {
            current = scdeflate(&current, &pair.eigenvector)?;
            sink(&mut current, b, &pair.eigenvector, floor);
        }
        Ok::<_, AnalysisError>(pair)
    })?;

    let set = ComponentSet { components };
    if !set.all_converged() {
        warn!("At least one component stopped at the iteration cap.");
    }
    reporter.report(Progress::PhaseFinish);
    Ok(set)
}

/// Adds `level * (B v)(B v)^T / (v^T B v)`. Applied after Schur deflation,
/// where `A v = 0`, this makes `v` an eigenvector with eigenvalue `level` and
/// leaves every `B`-orthogonal direction untouched.
fn sink(current: &mut DMatrix<f64>, b: Option<&DMatrix<f64>>, v: &DVector<f64>, level: f64) {
    let bv = match b {
        Some(b) => b * v,
        None => v.clone(),
    };
    let curvature = v.dot(&bv);
    *current += (&bv * bv.transpose()) * (level / curvature);
}
