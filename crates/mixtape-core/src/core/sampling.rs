use rand::Rng;
use thiserror::Error;
use tracing::instrument;

const NORMALIZATION_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplingError {
    #[error("Probability vector is empty, cannot perform sampling")]
    EmptyProbabilities,
    #[error("Invalid probability {value} at index {index}. Probabilities must be finite and non-negative")]
    InvalidProbability { index: usize, value: f64 },
    #[error("Probabilities sum to {0}, expected 1")]
    NotNormalized(f64),
    #[error("Sample shape contains a zero-length axis: {0:?}")]
    EmptyAxis(Vec<usize>),
}

/// Indices drawn from a categorical distribution, flattened in row-major
/// order. An empty `shape` denotes a single scalar draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalDraws {
    pub shape: Vec<usize>,
    pub indices: Vec<usize>,
}

impl CategoricalDraws {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn scalar(&self) -> Option<usize> {
        if self.shape.is_empty() {
            self.indices.first().copied()
        } else {
            None
        }
    }
}

/// Draws categorical indices: each draw is the number of cumulative
/// probabilities strictly below a uniform variate in `[0, 1)`.
#[instrument(level = "trace", skip_all, fields(categories = pvals.len(), shape = ?shape))]
pub fn categorical(
    pvals: &[f64],
    shape: &[usize],
    rng: &mut impl Rng,
) -> Result<CategoricalDraws, SamplingError> {
    if pvals.is_empty() {
        return Err(SamplingError::EmptyProbabilities);
    }
    if let Some((index, &value)) = pvals
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p < 0.0)
    {
        return Err(SamplingError::InvalidProbability { index, value });
    }
    if shape.contains(&0) {
        return Err(SamplingError::EmptyAxis(shape.to_vec()));
    }

    let cumulative: Vec<f64> = pvals
        .iter()
        .scan(0.0, |acc, &p| {
            *acc += p;
            Some(*acc)
        })
        .collect();

    let total = cumulative[cumulative.len() - 1];
    if (total - 1.0).abs() > NORMALIZATION_TOLERANCE {
        return Err(SamplingError::NotNormalized(total));
    }

    let count: usize = shape.iter().product();
    let last = pvals.len() - 1;
    let indices = (0..count)
        .map(|_| {
            let u: f64 = rng.gen_range(0.0..1.0);
            cumulative.partition_point(|&c| c < u).min(last)
        })
        .collect();

    Ok(CategoricalDraws {
        shape: shape.to_vec(),
        indices,
    })
}
