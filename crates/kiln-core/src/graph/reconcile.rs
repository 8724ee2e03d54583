use std::collections::{BTreeMap, BTreeSet};

use kiln_version::VersionConstraint;

use super::dag::{ConcreteEdge, ConcreteGraph, ConcreteNode, NodeId};
use super::hash::node_hash;
use crate::error::{KilnError, Result};
use crate::recipe::{RecipeRepository, VariantKind};
use crate::solver::{Attribute, Choice, ConstraintSystem, NodeKey, Request, Solution};
use crate::spec::{DepTypes, Spec, VariantValue};

/// Turns a solved assignment into a verified [`ConcreteGraph`]
pub struct Reconciler<'a> {
    repo: &'a dyn RecipeRepository,
    system: &'a ConstraintSystem,
}

impl<'a> Reconciler<'a> {
    pub fn new(repo: &'a dyn RecipeRepository, system: &'a ConstraintSystem) -> Self {
        Self { repo, system }
    }

    pub fn reconcile(&self, solution: &Solution, request: &Request) -> Result<ConcreteGraph> {
        let table = &self.system.table;

        // Nodes, in table order
        let mut ids: BTreeMap<usize, NodeId> = BTreeMap::new();
        let mut keys: Vec<NodeKey> = Vec::new();
        let mut specs: Vec<Spec> = Vec::new();
        let mut names = BTreeSet::new();
        for (index, vars) in table.nodes().iter().enumerate() {
            if !solution.holds(vars.literal) {
                continue;
            }
            if vars.key.is_build() && !request.is_split(&vars.key.name) {
                return Err(KilnError::DuplicateNode {
                    name: vars.key.name.clone(),
                });
            }
            if !names.insert((vars.key.name.clone(), vars.key.instance)) {
                return Err(KilnError::DuplicateNode {
                    name: vars.key.name.clone(),
                });
            }
            ids.insert(index, specs.len());
            specs.push(self.node_spec(index, solution)?);
            keys.push(vars.key.clone());
        }

        // Edges, merging deptypes of parallel recipe edges
        let mut merged: BTreeMap<(NodeId, NodeId), DepTypes> = BTreeMap::new();
        for edge in table.edges() {
            if !solution.holds(edge.literal) {
                continue;
            }
            let (Some(&parent), Some(&child)) = (ids.get(&edge.from), ids.get(&edge.to)) else {
                return Err(KilnError::Verification(format!(
                    "edge {} -> {} joins a node that is not in the graph",
                    table.node(edge.from).key,
                    table.node(edge.to).key
                )));
            };
            let entry = merged.entry((parent, child)).or_insert(DepTypes::NONE);
            *entry = *entry | edge.deptypes;
        }
        let edges: Vec<ConcreteEdge> = merged
            .into_iter()
            .map(|((parent, child), deptypes)| ConcreteEdge {
                parent,
                child,
                deptypes,
            })
            .collect();

        let mut roots = Vec::new();
        for name in request.root_names() {
            let id = keys
                .iter()
                .position(|k| *k == NodeKey::main(name))
                .ok_or_else(|| {
                    KilnError::Verification(format!("requested package {} is missing", name))
                })?;
            if !roots.contains(&id) {
                roots.push(id);
            }
        }

        check_acyclic(&keys, &edges)?;
        let (dag_hashes, link_run_hashes) = compute_hashes(&keys, &specs, &edges)?;

        let nodes = specs
            .into_iter()
            .zip(keys.iter())
            .zip(dag_hashes.into_iter().zip(link_run_hashes))
            .map(|((spec, key), (dag_hash, link_run_hash))| ConcreteNode {
                spec,
                build_instance: key.is_build(),
                dag_hash,
                link_run_hash,
            })
            .collect();
        let graph = ConcreteGraph::new(nodes, edges, roots);

        self.verify(&graph, request)?;
        log::debug!(
            "Reconciled {} nodes and {} edges",
            graph.len(),
            graph.edges().len()
        );
        Ok(graph)
    }

    /// Concrete node-level spec from the values chosen for one node
    fn node_spec(&self, index: usize, solution: &Solution) -> Result<Spec> {
        let vars = self.system.table.node(index);
        let recipe = self.repo.recipe(&vars.key.name)?;
        let mut spec = Spec::named(vars.key.name.clone());
        let mut multi: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();

        for domain in &vars.domains {
            let Some(value) = domain.values.iter().find(|v| solution.holds(v.literal)) else {
                return Err(KilnError::Verification(format!(
                    "{} has no {} chosen",
                    vars.key, domain.attribute
                )));
            };
            match (&domain.attribute, &value.choice) {
                (_, Choice::Version(version)) => {
                    spec.versions = VersionConstraint::exact(version.clone());
                }
                (_, Choice::Compiler(compiler)) => spec.compiler = Some(compiler.clone()),
                (_, Choice::Architecture(arch)) => spec.architecture = Some(arch.clone()),
                (Attribute::Variant(name), Choice::Value(chosen)) => {
                    if let Some(decl) = recipe.variant(name) {
                        spec.variants
                            .insert(name.clone(), decl.to_value(BTreeSet::from([chosen.clone()])));
                    }
                }
                (Attribute::VariantValue { variant, value }, Choice::Selected(selected)) => {
                    let entry = multi.entry(variant.as_str()).or_default();
                    if *selected {
                        entry.insert(value.clone());
                    }
                }
                (attribute, choice) => {
                    return Err(KilnError::Verification(format!(
                        "{} has an unexpected value {:?} for {}",
                        vars.key, choice, attribute
                    )));
                }
            }
        }
        for (variant, selected) in multi {
            spec.variants.insert(variant.to_string(), VariantValue::Multi(selected));
        }
        Ok(spec)
    }

    /// Re-check recipe dependencies and conflicts against the finished graph
    fn verify(&self, graph: &ConcreteGraph, request: &Request) -> Result<()> {
        for (id, node) in graph.nodes().iter().enumerate() {
            if !node.spec.is_concrete() {
                return Err(KilnError::Verification(format!("{} is not concrete", node)));
            }
            let recipe = self.repo.recipe(node.name())?;
            for variant in &recipe.variants {
                match (variant.kind, node.spec.variants.get(&variant.name)) {
                    (_, None) => {
                        return Err(KilnError::Verification(format!(
                            "{} leaves variant {} unset",
                            node, variant.name
                        )));
                    }
                    (VariantKind::Multi, Some(value)) if value.values().is_empty() => {
                        return Err(KilnError::Verification(format!(
                            "{} selects no value of {}",
                            node, variant.name
                        )));
                    }
                    _ => {}
                }
            }

            let is_root = graph.root_ids().contains(&id);
            for edge in &recipe.dependencies {
                let applies = edge
                    .when
                    .as_ref()
                    .map_or(true, |when| graph_matches(graph, id, when.spec()));
                let mut deptypes = edge.deptypes;
                if !(is_root && request.include_test_deps) {
                    deptypes = deptypes.without(DepTypes::TEST);
                }
                if !applies || deptypes.is_empty() {
                    continue;
                }
                let mut wanted = edge.spec.clone();
                wanted.name = None;
                let met = graph.dependencies(id, deptypes).any(|(child, _)| {
                    graph.node(child).name() == edge.name() && graph_matches(graph, child, &wanted)
                });
                if !met {
                    return Err(KilnError::Verification(format!(
                        "{} needs {} ({})",
                        node, edge.spec, deptypes
                    )));
                }
            }

            for conflict in &recipe.conflicts {
                let trigger = match conflict.trigger.name.as_deref() {
                    Some(other) if other != node.name() => Spec::named(node.name().to_string())
                        .with_dependency(conflict.trigger.clone()),
                    _ => conflict.trigger.clone(),
                };
                let when = conflict
                    .when
                    .as_ref()
                    .map_or(true, |w| graph_matches(graph, id, w.spec()));
                if when && graph_matches(graph, id, &trigger) {
                    return Err(KilnError::Verification(format!(
                        "{} matches its conflict {}",
                        node, conflict
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Whether a node meets `spec`, with `^dep` parts matched against the main
/// node of that package anywhere in the graph
fn graph_matches(graph: &ConcreteGraph, id: NodeId, spec: &Spec) -> bool {
    let mut node_level = spec.clone();
    node_level.dependencies.clear();
    if !graph.node(id).spec.satisfies(&node_level) {
        return false;
    }
    spec.dependencies.iter().all(|edge| {
        graph
            .find_id(edge.name())
            .is_some_and(|dep| graph_matches(graph, dep, &edge.spec))
    })
}

/// Reject cycles through link/run edges, reporting the first one found
fn check_acyclic(keys: &[NodeKey], edges: &[ConcreteEdge]) -> Result<()> {
    let mut children = vec![Vec::new(); keys.len()];
    for edge in edges.iter().filter(|e| e.deptypes.is_link_or_run()) {
        children[edge.parent].push(edge.child);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }
    let mut marks = vec![Mark::New; keys.len()];
    for start in 0..keys.len() {
        if marks[start] != Mark::New {
            continue;
        }
        // (node, next child index)
        let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
        marks[start] = Mark::Active;
        while let Some(top) = stack.last_mut() {
            let (id, next) = *top;
            let Some(&child) = children[id].get(next) else {
                marks[id] = Mark::Done;
                stack.pop();
                continue;
            };
            top.1 += 1;
            match marks[child] {
                Mark::New => {
                    marks[child] = Mark::Active;
                    stack.push((child, 0));
                }
                Mark::Active => {
                    let from = stack.iter().position(|&(n, _)| n == child).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[from..].iter().map(|&(n, _)| keys[n].to_string()).collect();
                    cycle.push(keys[child].to_string());
                    return Err(KilnError::CyclicDependency { cycle });
                }
                Mark::Done => {}
            }
        }
    }
    Ok(())
}

/// DAG and link/run hashes per node. Link/run edges are acyclic here, so
/// both hashes follow a dependencies-first order over those edges.
fn compute_hashes(
    keys: &[NodeKey],
    specs: &[Spec],
    edges: &[ConcreteEdge],
) -> Result<(Vec<String>, Vec<String>)> {
    let count = specs.len();
    let mut link_run: Vec<Vec<(NodeId, DepTypes)>> = vec![Vec::new(); count];
    let mut build_only: Vec<Vec<(NodeId, DepTypes)>> = vec![Vec::new(); count];
    let mut pending = vec![0usize; count];
    let mut dependents: Vec<Vec<NodeId>> = vec![Vec::new(); count];
    for edge in edges {
        if edge.deptypes.is_link_or_run() {
            link_run[edge.parent].push((edge.child, edge.deptypes));
            pending[edge.parent] += 1;
            dependents[edge.child].push(edge.parent);
        } else {
            build_only[edge.parent].push((edge.child, edge.deptypes));
        }
    }

    let mut order = Vec::with_capacity(count);
    let mut ready: Vec<NodeId> = (0..count).filter(|&id| pending[id] == 0).collect();
    while let Some(id) = ready.pop() {
        order.push(id);
        for &parent in &dependents[id] {
            pending[parent] -= 1;
            if pending[parent] == 0 {
                ready.push(parent);
            }
        }
    }

    let mut link_run_hashes = vec![String::new(); count];
    for &id in &order {
        let deps: Vec<(&str, DepTypes, &str)> = link_run[id]
            .iter()
            .map(|&(child, types)| (specs[child].name(), types, link_run_hashes[child].as_str()))
            .collect();
        let hash = node_hash(&specs[id], keys[id].is_build(), &deps)?;
        link_run_hashes[id] = hash;
    }

    let mut dag_hashes = vec![String::new(); count];
    for &id in &order {
        let mut deps: Vec<(&str, DepTypes, &str)> = link_run[id]
            .iter()
            .map(|&(child, types)| (specs[child].name(), types, dag_hashes[child].as_str()))
            .collect();
        deps.extend(build_only[id].iter().map(|&(child, types)| {
            (specs[child].name(), types, link_run_hashes[child].as_str())
        }));
        let hash = node_hash(&specs[id], keys[id].is_build(), &deps)?;
        dag_hashes[id] = hash;
    }
    Ok((dag_hashes, link_run_hashes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> NodeKey {
        NodeKey::main(name)
    }

    fn edge(parent: NodeId, child: NodeId, deptypes: DepTypes) -> ConcreteEdge {
        ConcreteEdge {
            parent,
            child,
            deptypes,
        }
    }

    #[test]
    fn test_link_cycle_is_reported() {
        let keys = vec![key("a"), key("b"), key("c")];
        let edges = vec![
            edge(0, 1, DepTypes::LINK),
            edge(1, 2, DepTypes::RUN),
            edge(2, 1, DepTypes::DEFAULT),
        ];
        match check_acyclic(&keys, &edges) {
            Err(KilnError::CyclicDependency { cycle }) => assert_eq!(cycle, vec!["b", "c", "b"]),
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_build_cycle_is_allowed() {
        let keys = vec![key("a"), key("b")];
        let edges = vec![edge(0, 1, DepTypes::LINK), edge(1, 0, DepTypes::BUILD)];
        assert!(check_acyclic(&keys, &edges).is_ok());
    }

    #[test]
    fn test_build_dependencies_only_change_dag_hash() {
        let specs: Vec<Spec> = ["app@=1.0", "tool@=2.0", "zlib@=1.3.1"]
            .iter()
            .map(|s| Spec::parse(s).unwrap())
            .collect();
        let keys = vec![key("app"), key("tool"), key("zlib")];
        let with_tool = vec![edge(0, 1, DepTypes::BUILD), edge(0, 2, DepTypes::DEFAULT)];
        let without_tool = vec![edge(0, 2, DepTypes::DEFAULT)];

        let (dag_a, link_run_a) = compute_hashes(&keys, &specs, &with_tool).unwrap();
        let (dag_b, link_run_b) = compute_hashes(&keys, &specs, &without_tool).unwrap();
        assert_eq!(link_run_a[0], link_run_b[0]);
        assert_ne!(dag_a[0], dag_b[0]);
        assert_eq!(dag_a[2], dag_b[2]);
    }

    #[test]
    fn test_identical_build_instance_gets_distinct_hash() {
        // app -(build)-> tool (build), app -> lib -> tool
        let keys = vec![key("app"), key("lib"), key("tool"), NodeKey::build("tool")];
        let specs: Vec<Spec> = ["app@=1.0", "lib@=1.0", "tool@=2.0", "tool@=2.0"]
            .iter()
            .map(|s| Spec::parse(s).unwrap())
            .collect();
        let edges = vec![
            edge(0, 3, DepTypes::BUILD),
            edge(0, 1, DepTypes::DEFAULT),
            edge(1, 2, DepTypes::DEFAULT),
        ];

        let (dag, link_run) = compute_hashes(&keys, &specs, &edges).unwrap();
        assert_ne!(dag[2], dag[3]);
        assert_ne!(link_run[2], link_run[3]);
    }
}
