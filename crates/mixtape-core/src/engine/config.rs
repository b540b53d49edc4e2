use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("must be a finite positive number, got {value}")))
    }
}

fn require_nonzero(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(invalid(name, "must be at least 1"))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum KMeansInit {
    /// K observations drawn uniformly with replacement.
    #[default]
    Random,
    /// Caller-supplied K x D starting means.
    Means(DMatrix<f64>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct KMeansConfig {
    #[serde(skip)]
    pub init: KMeansInit,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            init: KMeansInit::Random,
            tolerance: 1e-5,
            max_iterations: 300,
        }
    }
}

impl KMeansConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("tolerance", self.tolerance)?;
        require_nonzero("max_iterations", self.max_iterations)
    }
}

#[derive(Default)]
pub struct KMeansConfigBuilder {
    init: Option<KMeansInit>,
    tolerance: Option<f64>,
    max_iterations: Option<usize>,
}

impl KMeansConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(mut self, init: KMeansInit) -> Self {
        self.init = Some(init);
        self
    }
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    pub fn build(self) -> Result<KMeansConfig, ConfigError> {
        let defaults = KMeansConfig::default();
        let config = KMeansConfig {
            init: self.init.unwrap_or(defaults.init),
            tolerance: self.tolerance.unwrap_or(defaults.tolerance),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parameters of the sparse generalized eigensolver.
///
/// `rho = 0` solves the unconstrained problem. `tol` bounds the step between
/// iterates, `max_stable_support` stops a sparse run once its support has not
/// changed for that many iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SpeighConfig {
    pub rho: f64,
    pub eps: f64,
    pub tol: f64,
    pub tau: Option<f64>,
    pub max_iterations: usize,
    pub max_stable_support: usize,
}

impl Default for SpeighConfig {
    fn default() -> Self {
        Self {
            rho: 0.0,
            eps: 1e-6,
            tol: 1e-8,
            tau: None,
            max_iterations: 10_000,
            max_stable_support: 100,
        }
    }
}

impl SpeighConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rho.is_finite() || self.rho < 0.0 {
            return Err(invalid("rho", format!("must be non-negative, got {}", self.rho)));
        }
        require_positive("eps", self.eps)?;
        require_positive("tol", self.tol)?;
        if let Some(tau) = self.tau {
            if !tau.is_finite() || tau < 0.0 {
                return Err(invalid("tau", format!("must be non-negative, got {tau}")));
            }
        }
        require_nonzero("max_iterations", self.max_iterations)?;
        require_nonzero("max_stable_support", self.max_stable_support)
    }
}

#[derive(Default)]
pub struct SpeighConfigBuilder {
    rho: Option<f64>,
    eps: Option<f64>,
    tol: Option<f64>,
    tau: Option<f64>,
    max_iterations: Option<usize>,
    max_stable_support: Option<usize>,
}

impl SpeighConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rho(mut self, rho: f64) -> Self {
        self.rho = Some(rho);
        self
    }
    pub fn eps(mut self, eps: f64) -> Self {
        self.eps = Some(eps);
        self
    }
    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = Some(tol);
        self
    }
    pub fn tau(mut self, tau: f64) -> Self {
        self.tau = Some(tau);
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn max_stable_support(mut self, iterations: usize) -> Self {
        self.max_stable_support = Some(iterations);
        self
    }

    pub fn build(self) -> Result<SpeighConfig, ConfigError> {
        let defaults = SpeighConfig::default();
        let config = SpeighConfig {
            rho: self.rho.unwrap_or(defaults.rho),
            eps: self.eps.unwrap_or(defaults.eps),
            tol: self.tol.unwrap_or(defaults.tol),
            tau: self.tau.or(defaults.tau),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            max_stable_support: self
                .max_stable_support
                .unwrap_or(defaults.max_stable_support),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MsmConfig {
    pub n_states: usize,
    pub lag: usize,
    pub n_restarts: usize,
    pub n_replicates: usize,
    pub kmeans: KMeansConfig,
}

#[derive(Default)]
pub struct MsmConfigBuilder {
    n_states: Option<usize>,
    lag: Option<usize>,
    n_restarts: Option<usize>,
    n_replicates: Option<usize>,
    kmeans: Option<KMeansConfig>,
}

impl MsmConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_states(mut self, n: usize) -> Self {
        self.n_states = Some(n);
        self
    }
    pub fn lag(mut self, lag: usize) -> Self {
        self.lag = Some(lag);
        self
    }
    pub fn n_restarts(mut self, n: usize) -> Self {
        self.n_restarts = Some(n);
        self
    }
    pub fn n_replicates(mut self, n: usize) -> Self {
        self.n_replicates = Some(n);
        self
    }
    pub fn kmeans(mut self, config: KMeansConfig) -> Self {
        self.kmeans = Some(config);
        self
    }

    pub fn build(self) -> Result<MsmConfig, ConfigError> {
        let n_states = self
            .n_states
            .ok_or(ConfigError::MissingParameter("n_states"))?;
        require_nonzero("n_states", n_states)?;

        let lag = self.lag.unwrap_or(1);
        require_nonzero("lag", lag)?;

        let n_restarts = self.n_restarts.unwrap_or(1);
        require_nonzero("n_restarts", n_restarts)?;

        let kmeans = self.kmeans.unwrap_or_default();
        kmeans.validate()?;

        Ok(MsmConfig {
            n_states,
            lag,
            n_restarts,
            n_replicates: self.n_replicates.unwrap_or(0),
            kmeans,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentsConfig {
    pub n_components: usize,
    pub speigh: SpeighConfig,
}

#[derive(Default)]
pub struct ComponentsConfigBuilder {
    n_components: Option<usize>,
    speigh: Option<SpeighConfig>,
}

impl ComponentsConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_components(mut self, n: usize) -> Self {
        self.n_components = Some(n);
        self
    }
    pub fn speigh(mut self, config: SpeighConfig) -> Self {
        self.speigh = Some(config);
        self
    }

    pub fn build(self) -> Result<ComponentsConfig, ConfigError> {
        let n_components = self
            .n_components
            .ok_or(ConfigError::MissingParameter("n_components"))?;
        require_nonzero("n_components", n_components)?;

        let speigh = self.speigh.unwrap_or_default();
        speigh.validate()?;

        Ok(ComponentsConfig {
            n_components,
            speigh,
        })
    }
}
