mod config;
mod context;
mod info;
mod list;
mod output;
mod solve;
mod spec;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

use context::GlobalArgs;

#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(about = "Concretize package build specs into dependency graphs")]
#[command(version)]
struct Args {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Concretize specs together into one graph
    Spec(spec::SpecArgs),

    /// Concretize specs, optionally each on its own
    Solve(solve::SolveArgs),

    /// Show a package recipe
    Info(info::InfoArgs),

    /// List packages in the configured repositories
    List(list::ListArgs),

    /// Show the effective configuration and where each value came from
    Config(config::ConfigArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run() -> Result<i32> {
    let args = Args::parse();
    init_logging(args.global.verbose);

    match args.command {
        Commands::Spec(spec_args) => spec::execute(&args.global, spec_args),
        Commands::Solve(solve_args) => {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| anyhow::anyhow!("Failed to create async runtime: {}", e))?;
            rt.block_on(solve::execute(&args.global, solve_args))
        }
        Commands::Info(info_args) => info::execute(&args.global, info_args),
        Commands::List(list_args) => list::execute(&args.global, list_args),
        Commands::Config(config_args) => config::execute(&args.global, config_args),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}
