//! Solve command - concretize several specs, together or independently.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::sync::Arc;
use std::time::Instant;

use kiln_core::graph::{ConcreteGraph, TraversalOrder};
use kiln_core::solver::{Policy, Request, SolverOptions};
use kiln_core::spec::DepTypes;
use kiln_core::{Concretizer, KilnError, Registry};

use crate::context::{load_config, load_registry, GlobalArgs, RequestArgs};
use crate::output::{print_graph, print_problem, render_results_json, spinner, GraphFormat};
use crate::spec::parse_deptypes;

#[derive(Args, Debug)]
pub struct SolveArgs {
    /// Specs to concretize
    #[arg(required = true, value_name = "SPEC")]
    pub specs: Vec<String>,

    /// Concretize every spec on its own, in parallel
    #[arg(long)]
    pub separately: bool,

    /// Print graphs as JSON
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

/// Concretize each request on a blocking worker, keeping input order
async fn concretize_all(
    registry: Arc<Registry>,
    policy: Policy,
    options: SolverOptions,
    requests: Vec<Request>,
) -> Result<Vec<Result<ConcreteGraph, KilnError>>> {
    let mut handles = Vec::with_capacity(requests.len());
    for request in requests {
        let registry = Arc::clone(&registry);
        let policy = policy.clone();
        let options = options.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            Concretizer::new(registry.as_ref())
                .with_policy(policy)
                .with_options(options)
                .concretize(&request)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.context("Concretization task failed")?);
    }
    Ok(results)
}

pub async fn execute(global: &GlobalArgs, args: SolveArgs) -> Result<i32> {
    let config = load_config(global)?;
    let registry = Arc::new(load_registry(&config)?);

    let requests: Vec<Request> = if args.separately {
        args.specs
            .iter()
            .map(|spec| args.request.build(std::slice::from_ref(spec)))
            .collect::<Result<_>>()?
    } else {
        vec![args.request.build(&args.specs)?]
    };

    let progress = spinner(
        &format!("Concretizing {} request(s)...", requests.len()),
        args.no_progress || args.json,
    );
    let start = Instant::now();
    let results =
        concretize_all(registry, config.policy()?, config.solver_options(), requests).await;
    progress.finish_and_clear();
    let results = results?;

    let format = GraphFormat {
        json: args.json,
        hashes: args.hashes,
        order: args.order,
        deptypes: args.deptypes,
    };
    let labels: Vec<String> = if args.separately {
        args.specs.clone()
    } else {
        vec![args.specs.join(" ")]
    };

    let results: Vec<(String, Result<ConcreteGraph, KilnError>)> =
        labels.into_iter().zip(results).collect();
    let failed = results.iter().filter(|(_, result)| result.is_err()).count();

    if args.json {
        println!("{}", render_results_json(&results)?);
    } else {
        for (label, result) in &results {
            println!("{} {}", style("==>").green().bold(), style(label).bold());
            match result {
                Ok(graph) => print_graph(graph, &format)?,
                Err(KilnError::Unsatisfiable { problem }) => print_problem(problem),
                Err(e) => eprintln!("{} {}", style("Error:").red().bold(), e),
            }
        }
    }

    log::info!("Solved {} request(s) in {:?}", results.len(), start.elapsed());
    Ok(if failed > 0 { 1 } else { 0 })
}
