use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::spec::{DepTypes, DependencyEdge, Spec};

/// Index of a node in a [`ConcreteGraph`]
pub type NodeId = usize;

/// A concrete package build in the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcreteNode {
    /// Node-level concrete spec, without dependencies
    pub spec: Spec,
    /// Separate instance serving build-only dependents
    pub build_instance: bool,
    pub dag_hash: String,
    /// Hash over the node and its link/run closure only
    pub link_run_hash: String,
}

impl ConcreteNode {
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn dag_hash(&self) -> &str {
        &self.dag_hash
    }

    /// First `len` characters of the DAG hash
    pub fn short_hash(&self, len: usize) -> &str {
        &self.dag_hash[..len.min(self.dag_hash.len())]
    }
}

impl fmt::Display for ConcreteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spec.format_node())?;
        if self.build_instance {
            write!(f, " (build)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcreteEdge {
    pub parent: NodeId,
    pub child: NodeId,
    pub deptypes: DepTypes,
}

/// Visiting order for [`ConcreteGraph::traverse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalOrder {
    /// Dependencies before their dependents
    Topological,
    /// Preorder from the roots, children by name
    DepthFirst,
    /// Level by level from the roots
    BreadthFirst,
}

impl FromStr for TraversalOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topo" | "topological" => Ok(TraversalOrder::Topological),
            "dfs" | "depth-first" => Ok(TraversalOrder::DepthFirst),
            "bfs" | "breadth-first" => Ok(TraversalOrder::BreadthFirst),
            _ => Err(format!("unknown traversal order \"{}\" (expected topo, dfs or bfs)", s)),
        }
    }
}

/// Concrete dependency graph produced by concretization.
///
/// Every node is fully concrete, package names are unique apart from split
/// build instances, and link/run edges are acyclic.
#[derive(Debug, Clone)]
pub struct ConcreteGraph {
    nodes: Vec<ConcreteNode>,
    edges: Vec<ConcreteEdge>,
    roots: Vec<NodeId>,
    /// Outgoing edges per node, sorted by child name
    children: Vec<Vec<(NodeId, DepTypes)>>,
    parents: Vec<Vec<(NodeId, DepTypes)>>,
}

impl ConcreteGraph {
    pub(crate) fn new(
        nodes: Vec<ConcreteNode>,
        edges: Vec<ConcreteEdge>,
        roots: Vec<NodeId>,
    ) -> Self {
        let mut children = vec![Vec::new(); nodes.len()];
        let mut parents = vec![Vec::new(); nodes.len()];
        for edge in &edges {
            children[edge.parent].push((edge.child, edge.deptypes));
            parents[edge.child].push((edge.parent, edge.deptypes));
        }
        let sort_key = |&(id, _): &(NodeId, DepTypes)| {
            (nodes[id].name().to_string(), nodes[id].build_instance)
        };
        for list in children.iter_mut().chain(parents.iter_mut()) {
            list.sort_by_key(sort_key);
        }
        ConcreteGraph {
            nodes,
            edges,
            roots,
            children,
            parents,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[ConcreteNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &ConcreteNode {
        &self.nodes[id]
    }

    pub fn edges(&self) -> &[ConcreteEdge] {
        &self.edges
    }

    pub fn root_ids(&self) -> &[NodeId] {
        &self.roots
    }

    /// Requested nodes, in request order
    pub fn roots(&self) -> impl Iterator<Item = &ConcreteNode> + '_ {
        self.roots.iter().map(|&id| &self.nodes[id])
    }

    /// The root for a requested package name
    pub fn root(&self, name: &str) -> Option<&ConcreteNode> {
        self.roots().find(|n| n.name() == name)
    }

    /// Main instance of a package anywhere in the graph
    pub fn find(&self, name: &str) -> Option<&ConcreteNode> {
        self.find_id(name).map(|id| &self.nodes[id])
    }

    pub fn find_id(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name() == name && !n.build_instance)
    }

    /// Build instance of a package, when the graph split it
    pub fn find_build(&self, name: &str) -> Option<&ConcreteNode> {
        self.nodes.iter().find(|n| n.name() == name && n.build_instance)
    }

    pub fn find_by_hash(&self, prefix: &str) -> Option<&ConcreteNode> {
        self.nodes.iter().find(|n| n.dag_hash.starts_with(prefix))
    }

    /// Direct dependencies of a node through edges carrying any of `deptypes`
    pub fn dependencies(
        &self,
        id: NodeId,
        deptypes: DepTypes,
    ) -> impl Iterator<Item = (NodeId, DepTypes)> + '_ {
        self.children[id]
            .iter()
            .copied()
            .filter(move |(_, types)| types.intersects(deptypes))
    }

    /// Direct dependents of a node through edges carrying any of `deptypes`
    pub fn dependents(
        &self,
        id: NodeId,
        deptypes: DepTypes,
    ) -> impl Iterator<Item = (NodeId, DepTypes)> + '_ {
        self.parents[id]
            .iter()
            .copied()
            .filter(move |(_, types)| types.intersects(deptypes))
    }

    /// Whether the subgraph at `id` meets `spec`: node attributes must match,
    /// and every `^dep` must be met by one of the node's transitive
    /// dependencies
    pub fn satisfies(&self, id: NodeId, spec: &Spec) -> bool {
        let mut node_level = spec.clone();
        node_level.dependencies.clear();
        if !self.nodes[id].spec.satisfies(&node_level) {
            return false;
        }
        let below: Vec<NodeId> = self
            .traverse_from(&[id], TraversalOrder::BreadthFirst, DepTypes::ALL)
            .skip(1)
            .collect();
        spec.dependencies.iter().all(|edge| {
            below.iter().any(|&dep| {
                self.nodes[dep].name() == edge.name() && self.satisfies(dep, &edge.spec)
            })
        })
    }

    /// Spec of a node with every transitive dependency flattened below it,
    /// e.g. `hdf5@1.14.3 ... ^zlib@1.3.1 ...`
    pub fn to_spec(&self, id: NodeId) -> Spec {
        let mut spec = self.nodes[id].spec.clone();
        for dep in self.traverse_from(&[id], TraversalOrder::DepthFirst, DepTypes::ALL).skip(1) {
            spec.dependencies
                .push(DependencyEdge::new(self.nodes[dep].spec.clone(), DepTypes::ALL));
        }
        spec
    }

    /// Lazy traversal from the roots through edges carrying any of `deptypes`
    pub fn traverse(&self, order: TraversalOrder, deptypes: DepTypes) -> Traversal<'_> {
        self.traverse_from(&self.roots, order, deptypes)
    }

    pub fn traverse_from(
        &self,
        start: &[NodeId],
        order: TraversalOrder,
        deptypes: DepTypes,
    ) -> Traversal<'_> {
        Traversal::new(self, start.to_vec(), order, deptypes)
    }

    /// Indented tree from the roots; nodes already shown are not expanded again
    pub fn tree(&self, deptypes: DepTypes, show_hashes: bool) -> String {
        let mut out = String::new();
        let mut seen = vec![false; self.nodes.len()];
        for &root in &self.roots {
            self.write_tree(&mut out, root, 0, deptypes, show_hashes, &mut seen);
        }
        out
    }

    fn write_tree(
        &self,
        out: &mut String,
        id: NodeId,
        depth: usize,
        deptypes: DepTypes,
        show_hashes: bool,
        seen: &mut [bool],
    ) {
        if show_hashes {
            out.push_str(self.nodes[id].short_hash(7));
            out.push_str("  ");
        }
        out.push_str(&"    ".repeat(depth));
        if depth > 0 {
            out.push('^');
        }
        out.push_str(&self.nodes[id].to_string());
        out.push('\n');

        if std::mem::replace(&mut seen[id], true) {
            return;
        }
        for (child, _) in self.dependencies(id, deptypes) {
            self.write_tree(out, child, depth + 1, deptypes, show_hashes, seen);
        }
    }

    /// Serializable form of the graph
    pub fn to_document(&self) -> GraphDocument {
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(id, node)| NodeDocument {
                name: node.name().to_string(),
                version: node.spec.version().map(ToString::to_string).unwrap_or_default(),
                compiler: node.spec.compiler.as_ref().map(ToString::to_string),
                architecture: node
                    .spec
                    .architecture
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                variants: node
                    .spec
                    .variants
                    .iter()
                    .map(|(name, value)| (name.clone(), value.values().into_iter().collect()))
                    .collect(),
                build_instance: node.build_instance,
                hash: node.dag_hash.clone(),
                dependencies: self.children[id]
                    .iter()
                    .map(|&(child, deptypes)| DependencyDocument {
                        name: self.nodes[child].name().to_string(),
                        hash: self.nodes[child].dag_hash.clone(),
                        deptypes,
                    })
                    .collect(),
            })
            .collect();
        GraphDocument {
            roots: self.roots.iter().map(|&id| self.nodes[id].dag_hash.clone()).collect(),
            nodes,
        }
    }
}

/// JSON document for a concrete graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GraphDocument {
    /// DAG hashes of the roots
    pub roots: Vec<String>,
    pub nodes: Vec<NodeDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeDocument {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,
    pub architecture: String,
    #[serde(default)]
    pub variants: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub build_instance: bool,
    pub hash: String,
    #[serde(default)]
    pub dependencies: Vec<DependencyDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDocument {
    pub name: String,
    pub hash: String,
    pub deptypes: DepTypes,
}

#[derive(Debug, Clone)]
enum Frontier {
    Stack(Vec<NodeId>),
    Queue(VecDeque<NodeId>),
    /// Kahn's algorithm over the reachable subgraph
    Ready {
        ready: BTreeSet<(String, bool, NodeId)>,
        pending: BTreeMap<NodeId, usize>,
    },
}

/// Lazy traversal over a [`ConcreteGraph`].
///
/// Cloning a traversal snapshots its position; [`Traversal::restart`]
/// rewinds it to the beginning.
#[derive(Debug, Clone)]
pub struct Traversal<'g> {
    graph: &'g ConcreteGraph,
    start: Vec<NodeId>,
    order: TraversalOrder,
    deptypes: DepTypes,
    visited: Vec<bool>,
    frontier: Frontier,
}

impl<'g> Traversal<'g> {
    fn new(
        graph: &'g ConcreteGraph,
        start: Vec<NodeId>,
        order: TraversalOrder,
        deptypes: DepTypes,
    ) -> Self {
        let mut traversal = Traversal {
            graph,
            start,
            order,
            deptypes,
            visited: Vec::new(),
            frontier: Frontier::Stack(Vec::new()),
        };
        traversal.restart();
        traversal
    }

    pub fn order(&self) -> TraversalOrder {
        self.order
    }

    /// Rewind to the first node
    pub fn restart(&mut self) {
        self.visited = vec![false; self.graph.len()];
        self.frontier = match self.order {
            TraversalOrder::DepthFirst => {
                Frontier::Stack(self.start.iter().rev().copied().collect())
            }
            TraversalOrder::BreadthFirst => Frontier::Queue(self.start.iter().copied().collect()),
            TraversalOrder::Topological => self.topological_frontier(),
        };
    }

    fn topological_frontier(&self) -> Frontier {
        // nodes reachable from the start through the selected edges
        let mut reachable = BTreeSet::new();
        let mut stack = self.start.clone();
        while let Some(id) = stack.pop() {
            if reachable.insert(id) {
                stack.extend(self.graph.dependencies(id, self.deptypes).map(|(child, _)| child));
            }
        }

        let mut pending = BTreeMap::new();
        let mut ready = BTreeSet::new();
        for &id in &reachable {
            let count = self.graph.dependencies(id, self.deptypes).count();
            if count == 0 {
                ready.insert(self.ready_key(id));
            } else {
                pending.insert(id, count);
            }
        }
        Frontier::Ready { ready, pending }
    }

    fn ready_key(&self, id: NodeId) -> (String, bool, NodeId) {
        let node = self.graph.node(id);
        (node.name().to_string(), node.build_instance, id)
    }
}

impl Iterator for Traversal<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let graph = self.graph;
        let deptypes = self.deptypes;
        match &mut self.frontier {
            Frontier::Stack(stack) => {
                while let Some(id) = stack.pop() {
                    if std::mem::replace(&mut self.visited[id], true) {
                        continue;
                    }
                    let children: Vec<NodeId> =
                        graph.dependencies(id, deptypes).map(|(c, _)| c).collect();
                    stack.extend(children.into_iter().rev().filter(|&c| !self.visited[c]));
                    return Some(id);
                }
                None
            }
            Frontier::Queue(queue) => {
                while let Some(id) = queue.pop_front() {
                    if std::mem::replace(&mut self.visited[id], true) {
                        continue;
                    }
                    queue.extend(
                        graph
                            .dependencies(id, deptypes)
                            .map(|(c, _)| c)
                            .filter(|&c| !self.visited[c]),
                    );
                    return Some(id);
                }
                None
            }
            Frontier::Ready { ready, pending } => {
                let id = match ready.pop_first() {
                    Some((_, _, id)) => id,
                    // only build edges can close a cycle; break it at the smallest name
                    None => {
                        let id = pending.keys().copied().min_by_key(|&id| {
                            let node = graph.node(id);
                            (node.name().to_string(), node.build_instance)
                        })?;
                        pending.remove(&id);
                        id
                    }
                };
                self.visited[id] = true;
                for (parent, _) in graph.dependents(id, deptypes) {
                    if let Some(count) = pending.get_mut(&parent) {
                        *count -= 1;
                        if *count == 0 {
                            pending.remove(&parent);
                            let node = graph.node(parent);
                            ready.insert((node.name().to_string(), node.build_instance, parent));
                        }
                    }
                }
                Some(id)
            }
        }
    }
}
