use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: String,
        found: String,
    },

    #[error("Cluster {cluster} received zero total weight")]
    DegenerateCluster { cluster: usize },

    #[error("Numerical instability in {context}: {reason}")]
    NumericalInstability {
        context: &'static str,
        reason: String,
    },
}

impl AnalysisError {
    pub(crate) fn mismatch(
        context: &'static str,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        Self::DimensionMismatch {
            context,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
