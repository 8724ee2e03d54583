//! Choice variables of the constraint system
//!
//! Every decidable fact is one boolean variable: a node being present, one
//! value of one attribute domain being chosen, or a dependency edge being
//! active. Domains keep their values in preference order.

use std::collections::BTreeMap;
use std::fmt;

use kiln_version::Version;

use super::rule::Literal;
use crate::spec::{ArchSpec, CompilerSpec, DepTypes};

/// Variable identifier, always positive
pub type VarId = u32;

/// Which instance of a package a node is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Instance {
    Main,
    /// Separate node for build-only edges, when the request allows a split
    Build,
}

/// Identity of a node in the graph being solved
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub name: String,
    pub instance: Instance,
}

impl NodeKey {
    pub fn main(name: impl Into<String>) -> Self {
        NodeKey {
            name: name.into(),
            instance: Instance::Main,
        }
    }

    pub fn build(name: impl Into<String>) -> Self {
        NodeKey {
            name: name.into(),
            instance: Instance::Build,
        }
    }

    pub fn is_build(&self) -> bool {
        self.instance == Instance::Build
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instance {
            Instance::Main => write!(f, "{}", self.name),
            Instance::Build => write!(f, "{} (build)", self.name),
        }
    }
}

/// Attribute a domain decides
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Attribute {
    Version,
    Compiler,
    Architecture,
    /// Bool or single-valued variant
    Variant(String),
    /// Whether one value of a multi-valued variant is selected
    VariantValue { variant: String, value: String },
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Version => write!(f, "version"),
            Attribute::Compiler => write!(f, "compiler"),
            Attribute::Architecture => write!(f, "architecture"),
            Attribute::Variant(name) => write!(f, "variant {}", name),
            Attribute::VariantValue { variant, value } => {
                write!(f, "variant {}={}", variant, value)
            }
        }
    }
}

/// A concrete value a domain can take
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Version(Version),
    Compiler(CompilerSpec),
    Architecture(ArchSpec),
    Value(String),
    Selected(bool),
}

#[derive(Debug, Clone)]
pub struct DomainValue {
    pub literal: Literal,
    pub choice: Choice,
    /// Default value of a variant
    pub is_default: bool,
    pub deprecated: bool,
}

/// Finite domain of one attribute of one node; exactly one value holds
/// when the node is present
#[derive(Debug, Clone)]
pub struct Domain {
    pub attribute: Attribute,
    /// Most preferred first
    pub values: Vec<DomainValue>,
}

impl Domain {
    pub fn literals(&self) -> impl Iterator<Item = Literal> + '_ {
        self.values.iter().map(|v| v.literal)
    }

    pub fn find(&self, mut matches: impl FnMut(&Choice) -> bool) -> Option<&DomainValue> {
        self.values.iter().find(|v| matches(&v.choice))
    }
}

#[derive(Debug, Clone)]
pub struct NodeVars {
    pub key: NodeKey,
    pub literal: Literal,
    pub is_root: bool,
    pub domains: Vec<Domain>,
}

impl NodeVars {
    pub fn domain(&self, attribute: &Attribute) -> Option<&Domain> {
        self.domains.iter().find(|d| &d.attribute == attribute)
    }
}

/// A possible dependency edge
#[derive(Debug, Clone)]
pub struct EdgeVar {
    pub literal: Literal,
    pub from: usize,
    pub to: usize,
    /// Position of the edge in the dependent's recipe
    pub recipe_index: usize,
    pub deptypes: DepTypes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variable {
    Node(usize),
    Value { node: usize, domain: usize, value: usize },
    Edge(usize),
}

/// All variables of one constraint system
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    variables: Vec<Variable>,
    nodes: Vec<NodeVars>,
    edges: Vec<EdgeVar>,
    by_key: BTreeMap<NodeKey, usize>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, variable: Variable) -> Literal {
        self.variables.push(variable);
        self.variables.len() as Literal
    }

    /// Register a node and its presence variable
    pub fn add_node(&mut self, key: NodeKey, is_root: bool) -> usize {
        if let Some(&index) = self.by_key.get(&key) {
            return index;
        }
        let index = self.nodes.len();
        let literal = self.allocate(Variable::Node(index));
        self.by_key.insert(key.clone(), index);
        self.nodes.push(NodeVars {
            key,
            literal,
            is_root,
            domains: Vec::new(),
        });
        index
    }

    /// Add a domain to a node, allocating one variable per choice
    pub fn add_domain(
        &mut self,
        node: usize,
        attribute: Attribute,
        values: Vec<(Choice, bool, bool)>,
    ) -> usize {
        let domain = self.nodes[node].domains.len();
        let mut domain_values = Vec::with_capacity(values.len());
        for (value, (choice, is_default, deprecated)) in values.into_iter().enumerate() {
            let literal = self.allocate(Variable::Value { node, domain, value });
            domain_values.push(DomainValue {
                literal,
                choice,
                is_default,
                deprecated,
            });
        }
        self.nodes[node].domains.push(Domain {
            attribute,
            values: domain_values,
        });
        domain
    }

    pub fn add_edge(
        &mut self,
        from: usize,
        to: usize,
        recipe_index: usize,
        deptypes: DepTypes,
    ) -> Literal {
        let index = self.edges.len();
        let literal = self.allocate(Variable::Edge(index));
        self.edges.push(EdgeVar {
            literal,
            from,
            to,
            recipe_index,
            deptypes,
        });
        literal
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn nodes(&self) -> &[NodeVars] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &NodeVars {
        &self.nodes[index]
    }

    pub fn node_index(&self, key: &NodeKey) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    pub fn edges(&self) -> &[EdgeVar] {
        &self.edges
    }

    /// Human-readable form of a literal, e.g. `zlib@1.3.1` or `not cmake+ninja`
    pub fn describe(&self, literal: Literal) -> String {
        let text = self.describe_var(literal.unsigned_abs());
        if literal < 0 {
            format!("not {}", text)
        } else {
            text
        }
    }

    pub fn describe_var(&self, var: VarId) -> String {
        let variable = (var as usize).checked_sub(1).and_then(|i| self.variables.get(i));
        let Some(variable) = variable else {
            return format!("#{}", var);
        };
        match *variable {
            Variable::Node(node) => self.nodes[node].key.to_string(),
            Variable::Value { node, domain, value } => {
                let node = &self.nodes[node];
                let domain = &node.domains[domain];
                let choice = describe_choice(&domain.attribute, &domain.values[value].choice);
                format!("{}{}", node.key, choice)
            }
            Variable::Edge(edge) => {
                let edge = &self.edges[edge];
                format!(
                    "{} -> {} ({})",
                    self.nodes[edge.from].key, self.nodes[edge.to].key, edge.deptypes
                )
            }
        }
    }

    /// Whether the variable selects an attribute value
    pub fn is_choice(&self, var: VarId) -> bool {
        matches!(
            (var as usize).checked_sub(1).and_then(|i| self.variables.get(i)),
            Some(Variable::Value { .. })
        )
    }
}

fn describe_choice(attribute: &Attribute, choice: &Choice) -> String {
    match (attribute, choice) {
        (_, Choice::Version(version)) => format!("@{}", version),
        (_, Choice::Compiler(compiler)) => format!("%{}", compiler),
        (_, Choice::Architecture(arch)) => format!(" {}", arch),
        (Attribute::Variant(name), Choice::Value(value)) => match value.as_str() {
            "true" => format!("+{}", name),
            "false" => format!("~{}", name),
            _ => format!(" {}={}", name, value),
        },
        (Attribute::VariantValue { variant, value }, Choice::Selected(true)) => {
            format!(" {}={}", variant, value)
        }
        (Attribute::VariantValue { variant, value }, Choice::Selected(false)) => {
            format!(" {}!={}", variant, value)
        }
        (_, Choice::Value(value)) => format!(" {}", value),
        (_, Choice::Selected(selected)) => format!(" {}", selected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_and_lookup() {
        let mut table = VariableTable::new();
        let a = table.add_node(NodeKey::main("a"), true);
        let b = table.add_node(NodeKey::main("b"), false);
        assert_eq!(table.add_node(NodeKey::main("a"), true), a);
        assert_eq!(table.node(a).literal, 1);
        assert_eq!(table.node(b).literal, 2);

        table.add_domain(
            b,
            Attribute::Version,
            vec![
                (Choice::Version(Version::parse("2.0").unwrap()), false, false),
                (Choice::Version(Version::parse("1.0").unwrap()), false, false),
            ],
        );
        let edge = table.add_edge(a, b, 0, DepTypes::DEFAULT);

        assert_eq!(table.num_variables(), 5);
        assert_eq!(table.describe(3), "b@2.0");
        assert_eq!(table.describe(-4), "not b@1.0");
        assert_eq!(table.describe(edge), "a -> b (build,link)");
        assert!(table.is_choice(4));
        assert!(!table.is_choice(edge as VarId));
        assert_eq!(table.node_index(&NodeKey::build("b")), None);
    }

    #[test]
    fn test_describe_variants() {
        let mut table = VariableTable::new();
        let c = table.add_node(NodeKey::build("c"), false);
        table.add_domain(
            c,
            Attribute::Variant("x".into()),
            vec![
                (Choice::Value("false".into()), true, false),
                (Choice::Value("true".into()), false, false),
            ],
        );
        table.add_domain(
            c,
            Attribute::VariantValue {
                variant: "libs".into(),
                value: "static".into(),
            },
            vec![(Choice::Selected(true), true, false), (Choice::Selected(false), false, false)],
        );
        assert_eq!(table.describe(2), "c (build)~x");
        assert_eq!(table.describe(3), "c (build)+x");
        assert_eq!(table.describe(4), "c (build) libs=static");
    }
}
