use serde::Serialize;
use std::fmt;

/// Why an iterative solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    Converged,
    SupportStabilized,
    MaxIterationsReached,
}

impl Termination {
    pub fn is_converged(self) -> bool {
        !matches!(self, Termination::MaxIterationsReached)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Termination::Converged => "converged",
            Termination::SupportStabilized => "support stabilized",
            Termination::MaxIterationsReached => "iteration cap reached",
        };
        f.write_str(label)
    }
}
