//! Terminal rendering of graphs, problems and progress.

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

use kiln_core::graph::{ConcreteGraph, GraphDocument, TraversalOrder};
use kiln_core::solver::Problem;
use kiln_core::spec::DepTypes;
use kiln_core::KilnError;

/// How a concrete graph is printed
#[derive(Debug, Clone, Copy)]
pub struct GraphFormat {
    pub json: bool,
    pub hashes: bool,
    /// Flat list in this order instead of a tree
    pub order: Option<TraversalOrder>,
    pub deptypes: DepTypes,
}

pub fn spinner(message: &str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(template);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

pub fn render_graph(graph: &ConcreteGraph, format: &GraphFormat) -> Result<String> {
    if format.json {
        return Ok(serde_json::to_string_pretty(&graph.to_document())?);
    }

    let Some(order) = format.order else {
        return Ok(graph.tree(format.deptypes, format.hashes));
    };

    let mut out = String::new();
    for id in graph.traverse(order, format.deptypes) {
        let node = graph.node(id);
        if format.hashes {
            out.push_str(node.short_hash(7));
            out.push_str("  ");
        }
        out.push_str(&node.to_string());
        out.push('\n');
    }
    Ok(out)
}

pub fn print_graph(graph: &ConcreteGraph, format: &GraphFormat) -> Result<()> {
    let rendered = render_graph(graph, format)?;
    print!("{}", rendered);
    if !rendered.ends_with('\n') {
        println!();
    }
    Ok(())
}

/// One entry of `kiln solve --json`
#[derive(Serialize)]
struct SolveEntry<'a> {
    spec: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    graph: Option<GraphDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Results of several requests as a single JSON array, in request order
pub fn render_results_json(
    results: &[(String, Result<ConcreteGraph, KilnError>)],
) -> Result<String> {
    let entries: Vec<SolveEntry<'_>> = results
        .iter()
        .map(|(spec, result)| match result {
            Ok(graph) => SolveEntry {
                spec,
                graph: Some(graph.to_document()),
                error: None,
            },
            Err(e) => SolveEntry {
                spec,
                graph: None,
                error: Some(e.to_string()),
            },
        })
        .collect();
    Ok(serde_json::to_string_pretty(&entries)?)
}

pub fn print_problem(problem: &Problem) {
    eprintln!("{} Could not concretize the request", style("Error:").red().bold());
    eprintln!("{}", problem);
    if !problem.minimal {
        eprintln!(
            "{} The explanation was not reduced to a minimal set of rules",
            style("Note:").yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::recipe::{Recipe, Registry, VersionDecl};
    use kiln_core::solver::Request;
    use kiln_core::spec::{ArchSpec, CompilerSpec, DependencyEdge, Spec};
    use kiln_core::Concretizer;
    use kiln_version::Version;

    fn graph() -> ConcreteGraph {
        let registry = Registry::builder()
            .compiler(CompilerSpec::parse("gcc@=12.3.0").unwrap())
            .architecture(ArchSpec::parse("linux-ubuntu22.04-x86_64").unwrap())
            .recipe(
                Recipe::new("app")
                    .with_version(VersionDecl::new(Version::parse("1.0").unwrap()))
                    .with_dependency(DependencyEdge::new(Spec::named("zlib"), DepTypes::DEFAULT)),
            )
            .recipe(
                Recipe::new("zlib")
                    .with_version(VersionDecl::new(Version::parse("1.3.1").unwrap())),
            )
            .build()
            .unwrap();
        Concretizer::new(&registry)
            .concretize(&Request::parse(&["app"]).unwrap())
            .unwrap()
    }

    #[test]
    fn test_render_tree_and_order() {
        let graph = graph();
        let tree = GraphFormat {
            json: false,
            hashes: false,
            order: None,
            deptypes: DepTypes::ALL,
        };
        let text = render_graph(&graph, &tree).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("app@=1.0"));
        assert!(lines[1].starts_with("    ^zlib@=1.3.1"));

        let topo = GraphFormat {
            order: Some(TraversalOrder::Topological),
            hashes: true,
            ..tree
        };
        let text = render_graph(&graph, &topo).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("zlib@=1.3.1"));
        assert_eq!(lines[0].find("  zlib"), Some(7));
    }

    #[test]
    fn test_render_json() {
        let format = GraphFormat {
            json: true,
            hashes: false,
            order: None,
            deptypes: DepTypes::ALL,
        };
        let text = render_graph(&graph(), &format).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["nodes"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_render_results_as_one_array() {
        let results = vec![
            ("app".to_string(), Ok(graph())),
            (
                "emacs".to_string(),
                Err(KilnError::UnknownPackage {
                    name: "emacs".to_string(),
                    required_by: None,
                }),
            ),
        ];
        let text = render_results_json(&results).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["spec"], "app");
        assert_eq!(entries[0]["graph"]["nodes"].as_array().map(Vec::len), Some(2));
        assert!(entries[0].get("error").is_none());
        assert_eq!(entries[1]["spec"], "emacs");
        assert!(entries[1]["error"].as_str().unwrap().contains("emacs"));
        assert!(entries[1].get("graph").is_none());
    }
}
