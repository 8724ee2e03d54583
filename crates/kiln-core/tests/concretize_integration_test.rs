/// Integration tests for concretization against the mock recipe repository
///
/// The repository under `repos/builtin.mock` is loaded from disk, so these
/// tests cover recipe parsing, solving, reconciliation and hashing together.

use kiln_core::graph::{ConcreteGraph, GraphDocument, TraversalOrder};
use kiln_core::recipe::load_repositories;
use kiln_core::solver::{Policy, Request};
use kiln_core::spec::{DepTypes, Spec, VariantValue};
use kiln_core::{Concretizer, KilnError, Registry};
use std::collections::BTreeSet;
use std::path::PathBuf;

fn mock_repo() -> Registry {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../repos/builtin.mock");
    load_repositories(&[root]).unwrap()
}

fn concretize(registry: &Registry, specs: &[&str]) -> Result<ConcreteGraph, KilnError> {
    Concretizer::new(registry).concretize(&Request::parse(specs).unwrap())
}

fn version_of(graph: &ConcreteGraph, name: &str) -> String {
    graph.find(name).unwrap().spec.version().unwrap().to_string()
}

#[test]
fn test_ripgrep_graph() {
    let registry = mock_repo();
    let graph = concretize(&registry, &["ripgrep"]).unwrap();

    let names: BTreeSet<&str> = graph.nodes().iter().map(|n| n.name()).collect();
    let expected: BTreeSet<&str> = ["ripgrep", "rust", "openssl", "zlib", "perl", "cmake"]
        .into_iter()
        .collect();
    assert_eq!(names, expected);
    assert_eq!(graph.len(), 6);

    assert_eq!(version_of(&graph, "ripgrep"), "14.1.0");
    assert_eq!(version_of(&graph, "openssl"), "3.1.5");
    assert_eq!(version_of(&graph, "zlib"), "1.3.1");
    assert!(graph.nodes().iter().all(|n| n.spec.is_concrete()));

    let root = graph.find_id("ripgrep").unwrap();
    let constraint = Spec::parse("ripgrep@14 ~pcre2 ^openssl@3.1.5 ^zlib+pic").unwrap();
    assert!(graph.satisfies(root, &constraint));
    assert!(!graph.satisfies(root, &Spec::parse("ripgrep ^openssl@3.3").unwrap()));
}

#[test]
fn test_topological_order_puts_dependencies_first() {
    let registry = mock_repo();
    let graph = concretize(&registry, &["ripgrep +pcre2"]).unwrap();
    assert_eq!(graph.nodes().iter().filter(|n| n.name() == "cmake").count(), 1);

    let order: Vec<_> = graph.traverse(TraversalOrder::Topological, DepTypes::ALL).collect();
    assert_eq!(order.len(), graph.len());
    for edge in graph.edges() {
        let parent = order.iter().position(|&id| id == edge.parent).unwrap();
        let child = order.iter().position(|&id| id == edge.child).unwrap();
        assert!(
            child < parent,
            "{} must come before {}",
            graph.node(edge.child),
            graph.node(edge.parent)
        );
    }

    let mut traversal = graph.traverse(TraversalOrder::DepthFirst, DepTypes::ALL);
    let first: Vec<_> = traversal.by_ref().collect();
    traversal.restart();
    assert_eq!(first, traversal.collect::<Vec<_>>());
    assert_eq!(graph.node(first[0]).name(), "ripgrep");
}

#[test]
fn test_build_dependencies_do_not_change_dependents_hash() {
    let registry = mock_repo();
    let newest = concretize(&registry, &["ripgrep"]).unwrap();
    let older = concretize(&registry, &["ripgrep ^cmake@3.27.9"]).unwrap();

    assert_eq!(version_of(&older, "cmake"), "3.27.9");
    let (rust, older_rust) = (newest.find("rust").unwrap(), older.find("rust").unwrap());
    assert_ne!(rust.dag_hash, older_rust.dag_hash);
    assert_eq!(rust.link_run_hash, older_rust.link_run_hash);
    assert_eq!(newest.find("ripgrep").unwrap().dag_hash, older.find("ripgrep").unwrap().dag_hash);
}

#[test]
fn test_results_are_deterministic() {
    let registry = mock_repo();
    let hashes = |graph: &ConcreteGraph| -> Vec<String> {
        graph.nodes().iter().map(|n| n.dag_hash.clone()).collect()
    };
    let first = concretize(&registry, &["kakoune", "binutils"]).unwrap();
    for _ in 0..3 {
        let again = concretize(&registry, &["kakoune", "binutils"]).unwrap();
        assert_eq!(hashes(&first), hashes(&again));
    }
}

#[test]
fn test_variants_flow_through_dependencies() {
    let registry = mock_repo();
    let graph = concretize(&registry, &["binutils"]).unwrap();

    let libs =
        VariantValue::Multi(["shared".to_string(), "static".to_string()].into_iter().collect());
    assert_eq!(graph.find("binutils").unwrap().spec.variants.get("libs"), Some(&libs));

    let variant = &graph.find("multivalue-variant").unwrap().spec;
    assert_eq!(variant.variants.get("fee"), Some(&VariantValue::Single("baz".to_string())));
    assert_eq!(variant.variants.get("debug"), Some(&VariantValue::Bool(false)));
    assert_eq!(version_of(&graph, "multivalue-variant"), "2.3");

    // Recipe that needs no compiler
    let dependent = graph.find("singlevalue-variant-dependent").unwrap();
    assert!(dependent.spec.compiler.is_none());
}

#[test]
fn test_compiler_conflicts_pick_an_older_version() {
    let registry = mock_repo();
    let graph = concretize(&registry, &["kakoune"]).unwrap();
    assert_eq!(version_of(&graph, "kakoune"), "2023.08.05");

    let graph = concretize(&registry, &["kakoune %gcc@=10.2.1"]).unwrap();
    assert_eq!(version_of(&graph, "kakoune"), "2021.11.08");

    match concretize(&registry, &["kakoune@2023.08.05 %gcc@=10.2.1"]) {
        Err(KilnError::Unsatisfiable { problem }) => {
            assert!(problem.to_string().contains("GCC version must be at least 10.3!"));
            assert!(problem.packages().contains("kakoune"));
        }
        other => panic!("expected an unsatisfiable request, got {:?}", other.map(|g| g.len())),
    }
}

#[test]
fn test_unknown_package() {
    let registry = mock_repo();
    match concretize(&registry, &["emacs"]) {
        Err(KilnError::UnknownPackage { name, .. }) => assert_eq!(name, "emacs"),
        other => panic!("expected an unknown package, got {:?}", other.map(|g| g.len())),
    }
}

#[test]
fn test_deprecated_versions_need_permission() {
    let registry = mock_repo();
    let graph = concretize(&registry, &["ncurses"]).unwrap();
    assert_eq!(version_of(&graph, "ncurses"), "6.5");

    let graph = Concretizer::new(&registry)
        .with_policy(Policy::new().prefer_oldest(true))
        .concretize(&Request::parse(&["ncurses"]).unwrap())
        .unwrap();
    assert_eq!(version_of(&graph, "ncurses"), "6.4");

    let graph = concretize(&registry, &["ncurses@6.1"]).unwrap();
    assert_eq!(version_of(&graph, "ncurses"), "6.1");
}

#[test]
fn test_separate_requests_share_the_registry() {
    let registry = mock_repo();
    let requests: Vec<Request> = ["zlib", "kakoune", "ripgrep", "emacs"]
        .iter()
        .map(|s| Request::parse(&[*s]).unwrap())
        .collect();
    let results = Concretizer::new(&registry).concretize_separately(&requests);

    assert_eq!(results[0].as_ref().unwrap().len(), 1);
    assert!(results[1].as_ref().unwrap().find("ncurses").is_some());
    assert!(results[2].as_ref().unwrap().find("rust").is_some());
    assert!(matches!(results[3], Err(KilnError::UnknownPackage { .. })));
}

#[test]
fn test_split_build_instance() {
    let registry = mock_repo();
    let mut request = Request::parse(&["rust"]).unwrap();
    request.allow_split("cmake");
    let graph = Concretizer::new(&registry).concretize(&request).unwrap();

    let cmake = graph.find_build("cmake").unwrap();
    assert!(cmake.build_instance);
    assert!(graph.find("cmake").is_none());
    assert!(cmake.to_string().ends_with("(build)"));

    // zlib is linked, so it stays a single shared node
    let mut request = Request::parse(&["openssl"]).unwrap();
    request.allow_split("zlib");
    let graph = Concretizer::new(&registry).concretize(&request).unwrap();
    assert!(graph.find("zlib").is_some());
    assert!(graph.find_build("zlib").is_none());
}

#[test]
fn test_document_round_trip() {
    let registry = mock_repo();
    let graph = concretize(&registry, &["openssl"]).unwrap();
    let document = graph.to_document();
    let json = serde_json::to_string_pretty(&document).unwrap();
    let parsed: GraphDocument = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.roots, vec![graph.find("openssl").unwrap().dag_hash.clone()]);
    assert_eq!(parsed.nodes.len(), graph.len());
    let openssl = parsed.nodes.iter().find(|n| n.name == "openssl").unwrap();
    assert!(openssl.dependencies.iter().any(|d| d.name == "perl" && d.deptypes == DepTypes::BUILD));
}
