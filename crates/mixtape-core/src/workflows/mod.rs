//! # Workflows Module
//!
//! Top-level entry points. Each workflow validates its configuration, reports
//! phases through a [`ProgressReporter`](crate::engine::progress::ProgressReporter)
//! and returns a plain result struct.
//!
//! - **Markov State Model** ([`msm`]) - Cluster a trajectory, estimate its transition matrix and wells
//! - **Sparse Components** ([`components`]) - Extract successive sparse generalized eigenpairs

pub mod components;
pub mod msm;
