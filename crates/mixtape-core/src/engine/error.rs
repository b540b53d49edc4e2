use super::config::ConfigError;
use crate::core::error::AnalysisError;
use crate::core::sampling::SamplingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Analysis failed: {source}")]
    Analysis {
        #[from]
        source: AnalysisError,
    },

    #[error("Sampling failed: {source}")]
    Sampling {
        #[from]
        source: SamplingError,
    },

    #[error("Workflow phase '{phase}' failed: {reason}")]
    PhaseFailed { phase: &'static str, reason: String },
}
