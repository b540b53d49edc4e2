use crate::cli::{ComponentsArgs, MsmArgs};
use crate::error::{CliError, Result};
use crate::utils::parser;
use mixtape::engine::config as core_config;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialMsmConfig {
    states: Option<usize>,
    lag: Option<usize>,
    restarts: Option<usize>,
    replicates: Option<usize>,
    seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialComponentsConfig {
    count: Option<usize>,
}

/// Contents of a `mixtape.toml` file. Every section is optional; solver
/// sections fall back to the library defaults field by field.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    msm: Option<PartialMsmConfig>,
    components: Option<PartialComponentsConfig>,
    kmeans: Option<core_config::KMeansConfig>,
    speigh: Option<core_config::SpeighConfig>,
}

/// A fully resolved `msm` invocation.
#[derive(Debug)]
pub struct MsmSettings {
    pub config: core_config::MsmConfig,
    pub seed: Option<u64>,
}

impl PartialConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads `path` when given, otherwise starts from an empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn merge_msm(mut self, args: &MsmArgs) -> Result<MsmSettings> {
        self.apply_set_values(&args.set_values)?;
        let msm = self.msm.take().unwrap_or_default();

        let n_states = args.states.or(msm.states).ok_or_else(|| {
            CliError::Config(
                "A value for 'msm.states' is required either in the config file or via --states."
                    .to_string(),
            )
        })?;

        let mut builder = core_config::MsmConfigBuilder::new()
            .n_states(n_states)
            .kmeans(self.kmeans.take().unwrap_or_default());
        if let Some(lag) = args.lag.or(msm.lag) {
            builder = builder.lag(lag);
        }
        if let Some(restarts) = args.restarts.or(msm.restarts) {
            builder = builder.n_restarts(restarts);
        }
        if let Some(replicates) = args.replicates.or(msm.replicates) {
            builder = builder.n_replicates(replicates);
        }

        let config = builder
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(MsmSettings {
            config,
            seed: args.seed.or(msm.seed),
        })
    }

    pub fn merge_components(mut self, args: &ComponentsArgs) -> Result<core_config::ComponentsConfig> {
        self.apply_set_values(&args.set_values)?;
        let components = self.components.take().unwrap_or_default();

        let n_components = args.components.or(components.count).ok_or_else(|| {
            CliError::Config(
                "A value for 'components.count' is required either in the config file or via --components."
                    .to_string(),
            )
        })?;

        let mut speigh = self.speigh.take().unwrap_or_default();
        if let Some(rho) = args.rho {
            speigh.rho = rho;
        }

        core_config::ComponentsConfigBuilder::new()
            .n_components(n_components)
            .speigh(speigh)
            .build()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) = parser::parse_key_value(kv_pair)?;
            match key {
                "msm.states" => {
                    self.msm().states = Some(parser::parse_value(key, value, "integer")?);
                }
                "msm.lag" => {
                    self.msm().lag = Some(parser::parse_value(key, value, "integer")?);
                }
                "msm.restarts" => {
                    self.msm().restarts = Some(parser::parse_value(key, value, "integer")?);
                }
                "msm.replicates" => {
                    self.msm().replicates = Some(parser::parse_value(key, value, "integer")?);
                }
                "msm.seed" => {
                    self.msm().seed = Some(parser::parse_value(key, value, "integer")?);
                }
                "components.count" => {
                    self.components
                        .get_or_insert_with(Default::default)
                        .count = Some(parser::parse_value(key, value, "integer")?);
                }
                "kmeans.tolerance" => {
                    self.kmeans().tolerance = parser::parse_value(key, value, "float")?;
                }
                "kmeans.max-iterations" => {
                    self.kmeans().max_iterations = parser::parse_value(key, value, "integer")?;
                }
                "speigh.rho" => {
                    self.speigh().rho = parser::parse_value(key, value, "float")?;
                }
                "speigh.eps" => {
                    self.speigh().eps = parser::parse_value(key, value, "float")?;
                }
                "speigh.tol" => {
                    self.speigh().tol = parser::parse_value(key, value, "float")?;
                }
                "speigh.tau" => {
                    self.speigh().tau = Some(parser::parse_value(key, value, "float")?);
                }
                "speigh.max-iterations" => {
                    self.speigh().max_iterations = parser::parse_value(key, value, "integer")?;
                }
                "speigh.max-stable-support" => {
                    self.speigh().max_stable_support =
                        parser::parse_value(key, value, "integer")?;
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    fn msm(&mut self) -> &mut PartialMsmConfig {
        self.msm.get_or_insert_with(Default::default)
    }

    fn kmeans(&mut self) -> &mut core_config::KMeansConfig {
        self.kmeans.get_or_insert_with(Default::default)
    }

    fn speigh(&mut self) -> &mut core_config::SpeighConfig {
        self.speigh.get_or_insert_with(Default::default)
    }
}
