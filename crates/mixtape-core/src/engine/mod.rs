//! # Engine Module
//!
//! Plumbing shared by the numerical core and the workflows.
//!
//! - **Configuration** ([`config`]) - Solver parameters with defaults, validation and builders
//! - **Error Handling** ([`error`]) - Workflow-level error type wrapping the core errors
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Termination** ([`state`]) - Why an iterative solver stopped

pub mod config;
pub mod error;
pub mod progress;
pub mod state;
