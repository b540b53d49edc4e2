use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Mixtape Developers",
    version,
    about = "Mixtape CLI - Markov state models and sparse generalized eigendecompositions for molecular-dynamics features.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cluster a feature trajectory into states and estimate a Markov state model.
    Msm(MsmArgs),
    /// Extract sparse generalized eigenpairs of a symmetric matrix pencil (A, B).
    Components(ComponentsArgs),
}

/// Arguments for the `msm` subcommand.
#[derive(Args, Debug)]
pub struct MsmArgs {
    /// Headerless CSV of features, one frame per row.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of states. Overrides `msm.states` from the config file.
    #[arg(short = 'k', long, value_name = "INT")]
    pub states: Option<usize>,

    /// Lag time in frames. Overrides `msm.lag`.
    #[arg(short, long, value_name = "INT")]
    pub lag: Option<usize>,

    /// Number of k-means restarts; the fit with the lowest inertia is kept.
    #[arg(long, value_name = "INT")]
    pub restarts: Option<usize>,

    /// Number of extra k-means fits used to measure label stability.
    #[arg(long, value_name = "INT")]
    pub replicates: Option<usize>,

    /// Seed for the random generator. Runs are not reproducible without one.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Write the transition matrix to this CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S kmeans.max-iterations=500
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `components` subcommand.
#[derive(Args, Debug)]
pub struct ComponentsArgs {
    /// Headerless CSV holding the symmetric matrix A.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub a: PathBuf,

    /// Headerless CSV holding the positive definite matrix B. Identity if omitted.
    #[arg(short, long, value_name = "PATH")]
    pub b: Option<PathBuf>,

    /// Optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of components to extract. Overrides `components.count`.
    #[arg(short = 'n', long, value_name = "INT")]
    pub components: Option<usize>,

    /// Sparsity penalty. Overrides `speigh.rho`.
    #[arg(short, long, value_name = "FLOAT")]
    pub rho: Option<f64>,

    /// Write the eigenvectors (one per column) to this CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S speigh.tol=1e-10
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
