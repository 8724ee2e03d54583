//! Config command - show the effective configuration.

use anyhow::Result;
use clap::Args;
use console::style;

use crate::context::{load_config, GlobalArgs};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show a single key
    pub key: Option<String>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(global: &GlobalArgs, args: ConfigArgs) -> Result<i32> {
    let config = load_config(global)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(0);
    }

    let entries = config.entries();
    let selected: Vec<_> = entries
        .iter()
        .filter(|(key, _, _)| args.key.as_deref().map_or(true, |k| k == *key))
        .collect();
    if selected.is_empty() {
        anyhow::bail!("Unknown configuration key {}", args.key.unwrap_or_default());
    }

    for (key, value, source) in selected {
        println!("{} = {} {}", style(key).bold(), value, style(format!("({})", source)).dim());
    }
    Ok(0)
}
