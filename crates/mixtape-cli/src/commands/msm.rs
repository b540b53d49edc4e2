use crate::cli::MsmArgs;
use crate::config::PartialConfig;
use crate::data;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use mixtape::engine::progress::ProgressReporter;
use mixtape::workflows::msm::{self, MarkovStateModel};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

pub fn run(args: MsmArgs) -> Result<()> {
    let partial_config = PartialConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let settings = partial_config.merge_msm(&args)?;

    info!("Loading features from {:?}", &args.input);
    let observations = data::read_matrix(&args.input)?;
    println!(
        "Loaded {} frames with {} feature(s).",
        observations.nrows(),
        observations.ncols()
    );

    let mut rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => {
            warn!("No seed given; results will not be reproducible.");
            StdRng::from_entropy()
        }
    };

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the Markov state model workflow...");
    let model = msm::run(&observations, &settings.config, &mut rng, &reporter)?;

    print_model(&model);
    if let Some(path) = &args.output {
        data::write_matrix(path, &model.transition_matrix)?;
        println!("Transition matrix written to: {}", path.display());
    }
    Ok(())
}

fn print_model(model: &MarkovStateModel) {
    println!();
    println!(
        "Markov state model: {} states, lag {}, inertia {:.6e}{}",
        model.n_states(),
        model.lag,
        model.inertia,
        if model.converged {
            ""
        } else {
            " (k-means did not converge)"
        }
    );

    println!("\nTransition matrix:");
    for row in model.transition_matrix.row_iter() {
        let cells: Vec<String> = row.iter().map(|p| format!("{:.4}", p)).collect();
        println!("  {}", cells.join("  "));
    }

    println!("\nStates:");
    for (k, population) in model.populations().iter().enumerate() {
        let mean: Vec<String> = model
            .means
            .row(k)
            .iter()
            .map(|x| format!("{:.4}", x))
            .collect();
        println!("  {:>3}  {:>8} frames  mean [{}]", k, population, mean.join(", "));
    }

    if !model.replicate_agreement.is_empty() {
        let cells: Vec<String> = model
            .replicate_agreement
            .iter()
            .map(|a| format!("{:.3}", a))
            .collect();
        println!("\nReplicate agreement: {}", cells.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;

    #[test]
    fn writes_row_stochastic_transition_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("traj.csv");
        let output = dir.path().join("tmat.csv");
        let frames: Vec<String> = (0..40)
            .map(|t| if (t / 5) % 2 == 0 { "0.0,0.1" } else { "8.0,7.9" })
            .map(str::to_string)
            .collect();
        fs::write(&input, frames.join("\n")).unwrap();

        let cli = Cli::parse_from([
            "mixtape",
            "msm",
            "-i",
            input.to_str().unwrap(),
            "-k",
            "2",
            "--restarts",
            "5",
            "--seed",
            "3",
            "-o",
            output.to_str().unwrap(),
        ]);
        let Commands::Msm(args) = cli.command else {
            panic!("Expected 'msm' subcommand");
        };
        run(args).unwrap();

        let tmat = data::read_matrix(&output).unwrap();
        assert_eq!(tmat.shape(), (2, 2));
        for row in tmat.row_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn missing_input_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("absent.csv");
        let cli = Cli::parse_from(["mixtape", "msm", "-i", input.to_str().unwrap(), "-k", "2"]);
        let Commands::Msm(args) = cli.command else {
            panic!("Expected 'msm' subcommand");
        };
        assert!(run(args).is_err());
    }
}
