//! Spec command - concretize specs together and print the graph.

use anyhow::{anyhow, Result};
use clap::Args;

use kiln_core::graph::TraversalOrder;
use kiln_core::spec::DepTypes;
use kiln_core::{Concretizer, KilnError};

use crate::context::{load_config, load_registry, GlobalArgs, RequestArgs};
use crate::output::{print_graph, print_problem, spinner, GraphFormat};

#[derive(Args, Debug)]
pub struct SpecArgs {
    /// Specs to concretize, e.g. "hdf5@1.14 +mpi ^zlib@1.3"
    #[arg(required = true, value_name = "SPEC")]
    pub specs: Vec<String>,

    /// Print the graph as JSON
    #[arg(long)]
    pub json: bool,

    /// Show short DAG hashes
    #[arg(short = 'l', long)]
    pub hashes: bool,

    /// Print a flat list in this order (topo, dfs, bfs) instead of a tree
    #[arg(long, value_name = "ORDER")]
    pub order: Option<TraversalOrder>,

    /// Dependency types to follow when printing
    #[arg(long, value_name = "TYPES", default_value = "all", value_parser = parse_deptypes)]
    pub deptypes: DepTypes,

    #[command(flatten)]
    pub request: RequestArgs,

    /// Do not show a progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

pub fn parse_deptypes(input: &str) -> Result<DepTypes, String> {
    let types = DepTypes::parse(input)?;
    if types.is_empty() {
        return Err("at least one dependency type is needed".to_string());
    }
    Ok(types)
}

pub fn execute(global: &GlobalArgs, args: SpecArgs) -> Result<i32> {
    let config = load_config(global)?;
    let registry = load_registry(&config)?;
    let request = args.request.build(&args.specs)?;
    let concretizer = Concretizer::from_config(&registry, &config)?;

    let progress = spinner("Concretizing...", args.no_progress || args.json);
    let result = concretizer.concretize(&request);
    progress.finish_and_clear();

    match result {
        Ok(graph) => {
            let format = GraphFormat {
                json: args.json,
                hashes: args.hashes,
                order: args.order,
                deptypes: args.deptypes,
            };
            print_graph(&graph, &format)?;
            Ok(0)
        }
        Err(KilnError::Unsatisfiable { problem }) => {
            print_problem(&problem);
            Ok(1)
        }
        Err(e) => Err(anyhow!(e).context(format!("Failed to concretize {}", args.specs.join(" ")))),
    }
}
