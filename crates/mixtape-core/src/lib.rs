//! # Mixtape Core Library
//!
//! Numerical building blocks for analysing molecular-dynamics trajectories:
//! k-means state decomposition, Markov state model estimation, empirical
//! Gaussian wells, covariance propagation and sparse generalized
//! eigendecomposition with deflation.
//!
//! ## Architecture
//!
//! - **[`core`]: Stateless math.** Every routine takes its inputs (and, when
//!   stochastic, an explicit random generator) and returns new values.
//!
//! - **[`engine`]: Shared plumbing.** Configuration structs and builders,
//!   layered error types, progress reporting and solver termination status.
//!
//! - **[`workflows`]: End-to-end procedures.** Combine the `core` routines
//!   into a fitted Markov state model or a set of sparse components.

pub mod core;
pub mod engine;
pub mod workflows;
