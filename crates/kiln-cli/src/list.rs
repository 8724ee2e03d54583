//! List command - list packages in the configured repositories.

use anyhow::Result;
use clap::Args;
use console::style;

use kiln_core::recipe::RecipeRepository;

use crate::context::{load_config, load_registry, GlobalArgs};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list packages whose name contains this text
    pub filter: Option<String>,

    /// Print names only
    #[arg(short = 'N', long)]
    pub name_only: bool,
}

pub fn execute(global: &GlobalArgs, args: ListArgs) -> Result<i32> {
    let config = load_config(global)?;
    let registry = load_registry(&config)?;

    let names: Vec<&str> = registry
        .package_names()
        .into_iter()
        .filter(|name| args.filter.as_deref().map_or(true, |f| name.contains(f)))
        .collect();

    if names.is_empty() {
        println!("{} No packages found", style("Info:").cyan());
        return Ok(0);
    }

    let width = names.iter().map(|n| n.len()).max().unwrap_or(0);
    for name in names {
        if args.name_only {
            println!("{}", name);
            continue;
        }
        let versions = registry
            .list_versions(name)?
            .iter()
            .filter(|v| !v.deprecated)
            .map(|v| v.version.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!("{:width$}  {}", style(name).green(), versions, width = width);
    }
    Ok(0)
}
