//! # Core Module
//!
//! Pure numerical routines. Nothing here keeps state between calls; all
//! randomness enters through an explicit `rand::Rng` argument.
//!
//! - **Sampling** ([`sampling`]) - Categorical draws from a probability vector
//! - **Clustering** ([`clustering`]) - Lloyd's k-means and centroid matching
//! - **Estimation** ([`estimation`]) - Transition matrices, empirical wells, covariance propagation
//! - **Decomposition** ([`decomposition`]) - Sparse generalized eigensolver and deflation
//! - **Linear algebra** ([`linalg`]) - Validation helpers and the dense generalized eigensolver

pub mod clustering;
pub mod decomposition;
pub mod error;
pub mod estimation;
pub mod linalg;
pub mod sampling;
