use crate::cli::ComponentsArgs;
use crate::config::PartialConfig;
use crate::data;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use mixtape::engine::progress::ProgressReporter;
use mixtape::workflows::components::{self, ComponentSet};
use tracing::info;

pub fn run(args: ComponentsArgs) -> Result<()> {
    let partial_config = PartialConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_components(&args)?;

    info!("Loading A from {:?}", &args.a);
    let a = data::read_matrix(&args.a)?;
    let b = match &args.b {
        Some(path) => {
            info!("Loading B from {:?}", path);
            Some(data::read_matrix(path)?)
        }
        None => None,
    };

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the sparse components workflow...");
    let set = components::run(&a, b.as_ref(), &config, &reporter)?;

    print_components(&set);
    if let Some(path) = &args.output {
        data::write_matrix(path, &set.eigenvectors())?;
        println!("Eigenvectors written to: {}", path.display());
    }
    Ok(())
}

fn print_components(set: &ComponentSet) {
    println!();
    for (k, component) in set.components.iter().enumerate() {
        println!(
            "Component {}: eigenvalue {:.8}, {} non-zero of {}, {} iteration(s), {}",
            k,
            component.eigenvalue,
            component.cardinality(),
            component.eigenvector.len(),
            component.iterations,
            component.termination
        );
        let cells: Vec<String> = component
            .eigenvector
            .iter()
            .map(|x| format!("{:.6}", x))
            .collect();
        println!("  [{}]", cells.join(", "));
    }
}
