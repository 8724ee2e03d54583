//! Info command - display a package recipe.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;

use kiln_core::recipe::{Recipe, RecipeRepository, VariantKind};

use crate::context::{load_config, load_registry, GlobalArgs};

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Package name
    pub name: String,

    /// Output format: text or json
    #[arg(short = 'f', long, default_value = "text")]
    pub format: String,
}

#[derive(Serialize)]
struct RecipeSummary<'a> {
    name: &'a str,
    description: Option<&'a str>,
    build_system: Option<&'a str>,
    needs_compiler: bool,
    versions: Vec<VersionSummary>,
    variants: Vec<VariantSummary<'a>>,
    dependencies: Vec<String>,
    conflicts: Vec<String>,
}

#[derive(Serialize)]
struct VersionSummary {
    version: String,
    deprecated: bool,
    preferred: bool,
}

#[derive(Serialize)]
struct VariantSummary<'a> {
    name: &'a str,
    kind: VariantKind,
    values: &'a [String],
    default: Vec<&'a str>,
    description: Option<&'a str>,
}

fn summarize(recipe: &Recipe) -> RecipeSummary<'_> {
    RecipeSummary {
        name: &recipe.name,
        description: recipe.description.as_deref(),
        build_system: recipe.build_system.as_deref(),
        needs_compiler: recipe.needs_compiler,
        versions: recipe
            .versions
            .iter()
            .map(|v| VersionSummary {
                version: v.version.to_string(),
                deprecated: v.deprecated,
                preferred: v.preferred,
            })
            .collect(),
        variants: recipe
            .variants
            .iter()
            .map(|v| VariantSummary {
                name: &v.name,
                kind: v.kind,
                values: v.values(),
                default: v.defaults().iter().map(String::as_str).collect(),
                description: v.description.as_deref(),
            })
            .collect(),
        dependencies: recipe
            .dependencies
            .iter()
            .map(|edge| match &edge.when {
                Some(when) => format!("{} ({}) when {}", edge.spec, edge.deptypes, when),
                None => format!("{} ({})", edge.spec, edge.deptypes),
            })
            .collect(),
        conflicts: recipe.conflicts.iter().map(ToString::to_string).collect(),
    }
}

fn print_text(summary: &RecipeSummary<'_>) {
    println!("{} {}", style("name").bold(), style(summary.name).green());
    if let Some(description) = summary.description {
        println!("{} {}", style("descrip.").bold(), description);
    }
    if let Some(build_system) = summary.build_system {
        println!("{} {}", style("build").bold(), build_system);
    }

    println!();
    println!("{}", style("versions").bold());
    for version in &summary.versions {
        let mut line = format!("  {}", version.version);
        if version.preferred {
            line.push_str(&format!(" {}", style("(preferred)").cyan()));
        }
        if version.deprecated {
            line.push_str(&format!(" {}", style("(deprecated)").yellow()));
        }
        println!("{}", line);
    }

    if !summary.variants.is_empty() {
        println!();
        println!("{}", style("variants").bold());
        for variant in &summary.variants {
            let values = match variant.kind {
                VariantKind::Bool => "true, false".to_string(),
                _ => variant.values.join(", "),
            };
            let multi = if variant.kind == VariantKind::Multi { " (multi)" } else { "" };
            println!(
                "  {} [{}]{} default: {}",
                style(variant.name).green(),
                values,
                multi,
                variant.default.join(",")
            );
            if let Some(description) = variant.description {
                println!("      {}", description);
            }
        }
    }

    let sections = [
        ("dependencies", &summary.dependencies),
        ("conflicts", &summary.conflicts),
    ];
    for (title, lines) in sections {
        if lines.is_empty() {
            continue;
        }
        println!();
        println!("{}", style(title).bold());
        for line in lines {
            println!("  {}", line);
        }
    }
}

pub fn execute(global: &GlobalArgs, args: InfoArgs) -> Result<i32> {
    let config = load_config(global)?;
    let registry = load_registry(&config)?;
    let recipe = registry
        .recipe(&args.name)
        .with_context(|| format!("Package {} not found", args.name))?;
    let summary = summarize(recipe);

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_text(&summary);
    }
    Ok(0)
}
