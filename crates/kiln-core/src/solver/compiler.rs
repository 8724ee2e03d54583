use std::collections::{BTreeMap, VecDeque};

use kiln_version::VersionConstraint;

use super::policy::{CostModel, Policy};
use super::request::Request;
use super::rule::{Literal, Rule, RuleType};
use super::rule_set::RuleSet;
use super::variables::{Attribute, Choice, Instance, NodeKey, VariableTable};
use crate::error::{KilnError, Result};
use crate::recipe::{RecipeRepository, VariantKind};
use crate::spec::{DepTypes, Spec, Tri};

/// Output of the constraint compiler: variables, clauses and costs for one
/// request
#[derive(Debug, Clone)]
pub struct ConstraintSystem {
    pub table: VariableTable,
    pub rules: RuleSet,
    pub costs: CostModel,
}

/// A fact about the graph, expressed over the variable table
#[derive(Debug, Clone, PartialEq, Eq)]
enum Atom {
    /// The node is in the graph
    Present(usize),
    /// The node is present with one of `literals`; `complement` holds the
    /// other values of the same domain
    OneOf {
        node: usize,
        literals: Vec<Literal>,
        complement: Vec<Literal>,
    },
    /// Cannot hold
    Never,
}

impl Atom {
    /// Literals of which at least one is true exactly when the atom holds
    fn positive(&self, table: &VariableTable) -> Vec<Literal> {
        match self {
            Atom::Present(node) => vec![table.node(*node).literal],
            Atom::OneOf { literals, .. } => literals.clone(),
            Atom::Never => Vec::new(),
        }
    }

    /// Literals of which at least one is true exactly when the atom fails,
    /// `None` when it never fails
    fn negative(&self, table: &VariableTable) -> Option<Vec<Literal>> {
        match self {
            Atom::Present(node) => Some(vec![-table.node(*node).literal]),
            Atom::OneOf { literals, .. } if literals.len() == 1 => Some(vec![-literals[0]]),
            Atom::OneOf {
                node, complement, ..
            } => {
                let mut negative = vec![-table.node(*node).literal];
                negative.extend(complement);
                Some(negative)
            }
            Atom::Never => None,
        }
    }
}

/// A recipe edge found during closure
#[derive(Debug, Clone)]
struct PendingEdge {
    from: NodeKey,
    to: NodeKey,
    recipe_index: usize,
    deptypes: DepTypes,
}

/// Translates a request and the recipes it reaches into a [`ConstraintSystem`]
pub struct ConstraintCompiler<'a> {
    repo: &'a dyn RecipeRepository,
    policy: &'a Policy,
}

impl<'a> ConstraintCompiler<'a> {
    pub fn new(repo: &'a dyn RecipeRepository, policy: &'a Policy) -> Self {
        Self { repo, policy }
    }

    pub fn compile(&self, request: &Request) -> Result<ConstraintSystem> {
        request.validate()?;
        let start = std::time::Instant::now();

        let (nodes, edges) = self.closure(request)?;

        let mut table = VariableTable::new();
        for (key, is_root) in &nodes {
            table.add_node(key.clone(), *is_root);
        }
        for index in 0..table.nodes().len() {
            self.add_domains(&mut table, index, request)?;
        }
        for edge in &edges {
            let from = self.lookup(&table, &edge.from)?;
            let to = self.lookup(&table, &edge.to)?;
            table.add_edge(from, to, edge.recipe_index, edge.deptypes);
        }

        let mut rules = RuleSet::new();
        self.structural_rules(&table, &mut rules);
        self.edge_rules(&table, &mut rules)?;
        self.justification_rules(&table, &mut rules);
        self.conflict_rules(&table, &mut rules)?;
        self.request_rules(&table, request, &mut rules)?;

        let costs = CostModel::build(self.policy, &table);

        let stats = rules.stats();
        log::debug!(
            "Compiled {} nodes, {} edges, {} variables, {} rules ({} assertions) in {:?}",
            table.nodes().len(),
            table.edges().len(),
            table.num_variables(),
            stats.total,
            stats.assertions,
            start.elapsed()
        );
        for (rule_type, count) in &stats.by_type {
            log::debug!("  {}: {}", rule_type, count);
        }

        Ok(ConstraintSystem { table, rules, costs })
    }

    fn lookup(&self, table: &VariableTable, key: &NodeKey) -> Result<usize> {
        table
            .node_index(key)
            .ok_or_else(|| KilnError::InvalidRequest(format!("{} was never discovered", key)))
    }

    /// Breadth-first closure over every node that could appear
    fn closure(&self, request: &Request) -> Result<(BTreeMap<NodeKey, bool>, Vec<PendingEdge>)> {
        let mut nodes: BTreeMap<NodeKey, bool> = BTreeMap::new();
        let mut queue = VecDeque::new();
        let mut edges = Vec::new();

        for root in &request.roots {
            self.repo.recipe(root.name())?;
            let key = NodeKey::main(root.name());
            if nodes.insert(key.clone(), true).is_none() {
                queue.push_back(key);
            }
        }

        // `^dep` constraints in the request must be able to appear
        let mut requested_deps = Vec::new();
        for root in &request.roots {
            collect_dependency_names(root, &mut requested_deps);
        }
        for (name, required_by) in requested_deps {
            if self.repo.get_recipe(&name).is_none() {
                return Err(KilnError::UnknownPackage {
                    name,
                    required_by: Some(required_by),
                });
            }
            let key = NodeKey::main(name);
            if !nodes.contains_key(&key) {
                nodes.insert(key.clone(), false);
                queue.push_back(key);
            }
        }

        while let Some(key) = queue.pop_front() {
            let is_root = nodes.get(&key).copied().unwrap_or(false);
            let partial = match key.instance {
                Instance::Main => request.partial_spec(&key.name),
                Instance::Build => request
                    .pins
                    .get(&key.name)
                    .cloned()
                    .unwrap_or_else(|| Spec::named(key.name.clone())),
            };

            for dep in self.repo.dependencies_of(&key.name, &partial)? {
                let mut deptypes = dep.edge.deptypes;
                if deptypes.contains(DepTypes::TEST) && !(is_root && request.include_test_deps) {
                    deptypes = deptypes.without(DepTypes::TEST);
                }
                if deptypes.is_empty() {
                    continue;
                }

                let name = dep.edge.name();
                if self.repo.get_recipe(name).is_none() {
                    return Err(KilnError::UnknownPackage {
                        name: name.to_string(),
                        required_by: Some(key.name.clone()),
                    });
                }
                let target = if deptypes.is_build_only() && request.is_split(name) {
                    NodeKey::build(name)
                } else {
                    NodeKey::main(name)
                };
                if dep.verdict == Tri::Undetermined {
                    log::debug!("{} -> {} depends on an undecided condition", key, target);
                }

                if !nodes.contains_key(&target) {
                    nodes.insert(target.clone(), false);
                    queue.push_back(target.clone());
                }
                edges.push(PendingEdge {
                    from: key.clone(),
                    to: target,
                    recipe_index: dep.index,
                    deptypes,
                });
            }
        }

        edges.sort_by(|a, b| a.from.cmp(&b.from).then(a.recipe_index.cmp(&b.recipe_index)));
        Ok((nodes, edges))
    }

    fn add_domains(
        &self,
        table: &mut VariableTable,
        index: usize,
        request: &Request,
    ) -> Result<()> {
        let key = table.node(index).key.clone();
        let recipe = self.repo.recipe(&key.name)?;

        let requested: Vec<&VersionConstraint> = request
            .constraints_on(&key.name)
            .into_iter()
            .map(|spec| &spec.versions)
            .collect();
        let versions = self
            .policy
            .order_versions(&key.name, &recipe.versions, &requested)
            .into_iter()
            .map(|decl| (Choice::Version(decl.version.clone()), false, decl.deprecated))
            .collect();
        table.add_domain(index, Attribute::Version, versions);

        if recipe.needs_compiler {
            let compilers = self
                .repo
                .compilers()
                .iter()
                .map(|c| (Choice::Compiler(c.clone()), false, false))
                .collect();
            table.add_domain(index, Attribute::Compiler, compilers);
        }

        let architectures = self
            .repo
            .architectures()
            .iter()
            .map(|a| (Choice::Architecture(a.clone()), false, false))
            .collect();
        table.add_domain(index, Attribute::Architecture, architectures);

        for variant in &recipe.variants {
            match variant.kind {
                VariantKind::Bool | VariantKind::Single => {
                    let mut values: Vec<(Choice, bool, bool)> = variant
                        .values()
                        .iter()
                        .map(|v| (Choice::Value(v.clone()), variant.is_default(v), false))
                        .collect();
                    // stable: defaults first, declaration order otherwise
                    values.sort_by_key(|(_, is_default, _)| !is_default);
                    table.add_domain(index, Attribute::Variant(variant.name.clone()), values);
                }
                VariantKind::Multi => {
                    for value in variant.values() {
                        let default = variant.is_default(value);
                        table.add_domain(
                            index,
                            Attribute::VariantValue {
                                variant: variant.name.clone(),
                                value: value.clone(),
                            },
                            vec![
                                (Choice::Selected(default), true, false),
                                (Choice::Selected(!default), false, false),
                            ],
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// value -> node, node -> one value, at most one value
    fn structural_rules(&self, table: &VariableTable, rules: &mut RuleSet) {
        for node in table.nodes() {
            let name = node.key.to_string();
            for domain in &node.domains {
                let literals: Vec<Literal> = domain.literals().collect();
                for &literal in &literals {
                    rules.add(
                        Rule::implies(literal, vec![node.literal], RuleType::NodeAttribute)
                            .with_source(name.clone()),
                    );
                }
                rules.add(
                    Rule::implies(node.literal, literals.clone(), RuleType::ChooseOne)
                        .with_source(name.clone())
                        .with_constraint(domain.attribute.to_string()),
                );
                if literals.len() > 1 {
                    rules.add(Rule::multi_conflict(&literals).with_source(name.clone()));
                }
            }

            // A multi-valued variant selects at least one value
            let mut selected: BTreeMap<&str, Vec<Literal>> = BTreeMap::new();
            for domain in &node.domains {
                if let Attribute::VariantValue { variant, .. } = &domain.attribute {
                    if let Some(value) = domain.find(|c| *c == Choice::Selected(true)) {
                        selected.entry(variant.as_str()).or_default().push(value.literal);
                    }
                }
            }
            for (variant, literals) in selected {
                rules.add(
                    Rule::implies(node.literal, literals, RuleType::ChooseOne)
                        .with_source(name.clone())
                        .with_constraint(format!("variant {}", variant)),
                );
            }
        }
    }

    fn edge_rules(&self, table: &VariableTable, rules: &mut RuleSet) -> Result<()> {
        for edge in table.edges() {
            let from = table.node(edge.from);
            let to = table.node(edge.to);
            let recipe = self.repo.recipe(&from.key.name)?;
            let Some(declared) = recipe.dependencies.get(edge.recipe_index) else {
                continue;
            };
            let source = from.key.to_string();
            let target = to.key.to_string();
            let constraint = match &declared.when {
                Some(when) if !when.is_trivial() => format!("{} when {}", declared.spec, when),
                _ => declared.spec.to_string(),
            };

            let condition = match &declared.when {
                Some(when) => self.spec_atoms(table, edge.from, when.spec(), false)?,
                None => Vec::new(),
            };

            // node and condition -> edge
            let mut activation = vec![-from.literal];
            let mut possible = true;
            for atom in &condition {
                match atom.negative(table) {
                    Some(negative) => activation.extend(negative),
                    None => possible = false,
                }
            }
            if possible {
                activation.push(edge.literal);
                rules.add(
                    Rule::new(activation, RuleType::EdgeActivation)
                        .with_source(source.clone())
                        .with_target(target.clone())
                        .with_constraint(constraint.clone()),
                );
            }

            // edge -> node and condition
            rules.add(
                Rule::implies(edge.literal, vec![from.literal], RuleType::EdgeCondition)
                    .with_source(source.clone())
                    .with_target(target.clone()),
            );
            for atom in &condition {
                rules.add(
                    Rule::implies(edge.literal, atom.positive(table), RuleType::EdgeCondition)
                        .with_source(source.clone())
                        .with_target(target.clone())
                        .with_constraint(constraint.clone()),
                );
            }

            // edge -> target with the edge's constraints
            rules.add(
                Rule::implies(edge.literal, vec![to.literal], RuleType::DependencyRequires)
                    .with_source(source.clone())
                    .with_target(target.clone())
                    .with_constraint(constraint.clone()),
            );
            let mut wanted = declared.spec.clone();
            wanted.name = None;
            for atom in self.spec_atoms(table, edge.to, &wanted, false)? {
                rules.add(
                    Rule::implies(edge.literal, atom.positive(table), RuleType::DependencyRequires)
                        .with_source(source.clone())
                        .with_target(target.clone())
                        .with_constraint(constraint.clone()),
                );
            }

            if edge.deptypes.is_link_or_run() {
                let (Some(mine), Some(theirs)) = (
                    from.domain(&Attribute::Architecture),
                    to.domain(&Attribute::Architecture),
                ) else {
                    continue;
                };
                for value in &mine.values {
                    let matching = theirs.find(|c| *c == value.choice).map(|v| v.literal);
                    let mut literals = vec![-edge.literal, -value.literal];
                    literals.extend(matching);
                    rules.add(
                        Rule::new(literals, RuleType::ArchitectureMatch)
                            .with_source(source.clone())
                            .with_target(target.clone()),
                    );
                }
            }
        }
        Ok(())
    }

    /// A non-root node needs an active incoming edge
    fn justification_rules(&self, table: &VariableTable, rules: &mut RuleSet) {
        let mut incoming: BTreeMap<usize, Vec<Literal>> = BTreeMap::new();
        for edge in table.edges() {
            incoming.entry(edge.to).or_default().push(edge.literal);
        }
        for (index, node) in table.nodes().iter().enumerate() {
            if node.is_root {
                continue;
            }
            let edges = incoming.remove(&index).unwrap_or_default();
            rules.add(
                Rule::implies(node.literal, edges, RuleType::NodeJustified)
                    .with_source(node.key.to_string()),
            );
        }
    }

    fn conflict_rules(&self, table: &VariableTable, rules: &mut RuleSet) -> Result<()> {
        for (index, node) in table.nodes().iter().enumerate() {
            for conflict in self.repo.conflicts_of(&node.key.name)? {
                let mut atoms = match conflict.trigger.name.as_deref() {
                    Some(other) if other != node.key.name => {
                        // A named trigger refers to another package in the graph
                        let trigger = Spec::named(node.key.name.clone())
                            .with_dependency(conflict.trigger.clone());
                        self.spec_atoms(table, index, &trigger, false)?
                    }
                    _ => self.spec_atoms(table, index, &conflict.trigger, false)?,
                };
                if let Some(when) = &conflict.when {
                    atoms.extend(self.spec_atoms(table, index, when.spec(), false)?);
                }

                let mut literals = vec![-node.literal];
                let mut possible = true;
                for atom in &atoms {
                    match atom.negative(table) {
                        Some(negative) => literals.extend(negative),
                        None => possible = false,
                    }
                }
                if !possible {
                    continue;
                }
                literals.sort_unstable();
                literals.dedup();
                rules.add(
                    Rule::new(literals, RuleType::PackageConflict)
                        .with_source(node.key.to_string())
                        .with_constraint(conflict.to_string())
                        .with_message(conflict.message.clone()),
                );
            }
        }
        Ok(())
    }

    fn request_rules(
        &self,
        table: &VariableTable,
        request: &Request,
        rules: &mut RuleSet,
    ) -> Result<()> {
        for root in &request.roots {
            let index = self.lookup(table, &NodeKey::main(root.name()))?;
            let node = table.node(index);
            rules.add(
                Rule::assertion(node.literal, RuleType::RootRequire)
                    .with_target(root.name())
                    .with_constraint(root.to_string()),
            );
            for atom in self.spec_atoms(table, index, root, true)? {
                rules.add(
                    Rule::implies(node.literal, atom.positive(table), RuleType::RequestConstraint)
                        .with_source("request")
                        .with_target(root.name())
                        .with_constraint(root.to_string()),
                );
            }
        }

        for (name, pin) in &request.pins {
            for key in [NodeKey::main(name.clone()), NodeKey::build(name.clone())] {
                let Some(index) = table.node_index(&key) else {
                    continue;
                };
                let node = table.node(index);
                for atom in self.spec_atoms(table, index, pin, true)? {
                    rules.add(
                        Rule::implies(
                            node.literal,
                            atom.positive(table),
                            RuleType::RequestConstraint,
                        )
                        .with_source("pin")
                        .with_target(key.to_string())
                        .with_constraint(pin.to_string()),
                    );
                }
            }
        }
        Ok(())
    }

    /// Atoms that together mean "node `index` satisfies `spec`". `^dep`
    /// parts refer to the main node of that package anywhere in the graph.
    ///
    /// `strict` turns unknown variants and values into errors (for request
    /// specs); otherwise they become [`Atom::Never`].
    fn spec_atoms(
        &self,
        table: &VariableTable,
        index: usize,
        spec: &Spec,
        strict: bool,
    ) -> Result<Vec<Atom>> {
        let node = table.node(index);
        let mut atoms = Vec::new();

        let one_of = |attribute: &Attribute, matches: &dyn Fn(&Choice) -> bool| -> Atom {
            let Some(domain) = node.domain(attribute) else {
                return Atom::Never;
            };
            let (literals, complement): (Vec<_>, Vec<_>) =
                domain.values.iter().partition(|v| matches(&v.choice));
            if literals.is_empty() {
                return Atom::Never;
            }
            Atom::OneOf {
                node: index,
                literals: literals.iter().map(|v| v.literal).collect(),
                complement: complement.iter().map(|v| v.literal).collect(),
            }
        };

        if !spec.versions.is_any() {
            atoms.push(one_of(&Attribute::Version, &|c| {
                matches!(c, Choice::Version(v) if spec.versions.contains(v))
            }));
        }

        if !spec.variants.is_empty() {
            let recipe = self.repo.recipe(&node.key.name)?;
            for (name, wanted) in &spec.variants {
                let checked = recipe
                    .variant(name)
                    .ok_or_else(|| format!("{} has no variant \"{}\"", node.key.name, name))
                    .and_then(|decl| decl.required_values(wanted).map(|values| (decl, values)));
                let (decl, values) = match checked {
                    Ok(found) => found,
                    Err(message) if strict => return Err(KilnError::InvalidRequest(message)),
                    Err(message) => {
                        log::warn!("{}", message);
                        atoms.push(Atom::Never);
                        continue;
                    }
                };
                match decl.kind {
                    VariantKind::Multi => {
                        for value in values {
                            let attribute = Attribute::VariantValue {
                                variant: name.clone(),
                                value,
                            };
                            atoms.push(one_of(&attribute, &|c| *c == Choice::Selected(true)));
                        }
                    }
                    VariantKind::Bool | VariantKind::Single => {
                        let attribute = Attribute::Variant(name.clone());
                        let chosen =
                            |c: &Choice| matches!(c, Choice::Value(v) if values.contains(v));
                        atoms.push(one_of(&attribute, &chosen));
                    }
                }
            }
        }

        if let Some(wanted) = &spec.compiler {
            atoms.push(one_of(&Attribute::Compiler, &|c| {
                matches!(c, Choice::Compiler(compiler) if compiler.satisfies(wanted))
            }));
        }

        if let Some(wanted) = &spec.architecture {
            atoms.push(one_of(&Attribute::Architecture, &|c| {
                matches!(c, Choice::Architecture(arch) if arch.satisfies(wanted))
            }));
        }

        for edge in &spec.dependencies {
            let Some(dep) = table.node_index(&NodeKey::main(edge.spec.name())) else {
                atoms.push(Atom::Never);
                continue;
            };
            atoms.push(Atom::Present(dep));
            let mut nested = edge.spec.clone();
            nested.name = None;
            atoms.extend(self.spec_atoms(table, dep, &nested, strict)?);
        }

        Ok(atoms)
    }
}

/// Names of every `^dep` below `spec`, with the package that mentions them
fn collect_dependency_names(spec: &Spec, found: &mut Vec<(String, String)>) {
    for edge in &spec.dependencies {
        found.push((edge.spec.name().to_string(), spec.name().to_string()));
        collect_dependency_names(&edge.spec, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{ConflictRule, Recipe, Registry, VariantDecl, VersionDecl};
    use crate::spec::{ArchSpec, CompilerSpec, Condition, DependencyEdge};
    use kiln_version::Version;

    fn version(v: &str) -> VersionDecl {
        VersionDecl::new(Version::parse(v).unwrap())
    }

    fn registry(recipes: Vec<Recipe>) -> Registry {
        let mut builder = Registry::builder()
            .compiler(CompilerSpec::parse("gcc@=12.3.0").unwrap())
            .architecture(ArchSpec::parse("linux-ubuntu22.04-x86_64").unwrap());
        for recipe in recipes {
            builder.add_recipe(recipe);
        }
        builder.build().unwrap()
    }

    fn compile(registry: &Registry, specs: &[&str]) -> Result<ConstraintSystem> {
        let policy = Policy::new();
        ConstraintCompiler::new(registry, &policy).compile(&Request::parse(specs)?)
    }

    #[test]
    fn test_closure_and_domains() {
        let registry = registry(vec![
            Recipe::new("a")
                .with_version(version("1.0"))
                .with_dependency(DependencyEdge::new(Spec::named("b"), DepTypes::DEFAULT)),
            Recipe::new("b")
                .with_version(version("1.0"))
                .with_version(version("2.0"))
                .with_variant(VariantDecl::boolean("shared", true)),
            Recipe::new("unused").with_version(version("1.0")),
        ]);
        let system = compile(&registry, &["a"]).unwrap();

        let names: Vec<String> = system.table.nodes().iter().map(|n| n.key.to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(system.table.edges().len(), 1);

        let b = system.table.node(1);
        let versions = b.domain(&Attribute::Version).unwrap();
        assert_eq!(versions.values[0].choice, Choice::Version(Version::parse("2.0").unwrap()));
        let shared = b.domain(&Attribute::Variant("shared".into())).unwrap();
        assert_eq!(shared.values[0].choice, Choice::Value("true".into()));
        assert!(system.rules.count_by_type(RuleType::RootRequire) == 1);
        assert!(system.rules.count_by_type(RuleType::NodeJustified) == 1);
    }

    #[test]
    fn test_unknown_dependency() {
        let registry = registry(vec![Recipe::new("a")
            .with_version(version("1.0"))
            .with_dependency(DependencyEdge::new(Spec::named("ghost"), DepTypes::DEFAULT))]);
        match compile(&registry, &["a"]) {
            Err(KilnError::UnknownPackage { name, required_by }) => {
                assert_eq!(name, "ghost");
                assert_eq!(required_by.as_deref(), Some("a"));
            }
            other => panic!("expected unknown package, got {:?}", other.map(|s| s.rules.len())),
        }
        assert!(matches!(
            compile(&registry, &["nope"]),
            Err(KilnError::UnknownPackage { required_by: None, .. })
        ));
    }

    #[test]
    fn test_violated_edges_are_not_compiled() {
        let registry = registry(vec![
            Recipe::new("a")
                .with_version(version("1.0"))
                .with_variant(VariantDecl::boolean("y", true))
                .with_dependency(
                    DependencyEdge::new(Spec::named("b"), DepTypes::DEFAULT)
                        .when(Condition::parse("+y").unwrap()),
                ),
            Recipe::new("b").with_version(version("1.0")),
        ]);
        assert_eq!(compile(&registry, &["a"]).unwrap().table.edges().len(), 1);
        let system = compile(&registry, &["a~y"]).unwrap();
        assert!(system.table.edges().is_empty());
        assert_eq!(system.table.nodes().len(), 1);
    }

    #[test]
    fn test_request_with_unknown_variant() {
        let registry = registry(vec![Recipe::new("a").with_version(version("1.0"))]);
        assert!(matches!(
            compile(&registry, &["a+nope"]),
            Err(KilnError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_multi_valued_variant_domains() {
        let libs = VariantDecl::multi("libs", &["shared", "static"], &["shared", "static"]);
        let registry = registry(vec![Recipe::new("libiconv")
            .with_version(version("1.17"))
            .with_variant(libs)]);
        let system = compile(&registry, &["libiconv libs=static"]).unwrap();
        let node = system.table.node(0);
        let static_libs = node
            .domain(&Attribute::VariantValue {
                variant: "libs".into(),
                value: "static".into(),
            })
            .unwrap();
        assert_eq!(static_libs.values[0].choice, Choice::Selected(true));
        assert!(static_libs.values[0].is_default);
        // at least one of the values is selected
        assert!(system
            .rules
            .rules_of_type(RuleType::ChooseOne)
            .any(|r| r.constraint() == Some("variant libs")));
    }

    #[test]
    fn test_conflict_with_unknown_package_is_dropped() {
        let registry = registry(vec![Recipe::new("a")
            .with_version(version("1.0"))
            .with_conflict(ConflictRule::new(Spec::parse("^elsewhere").unwrap()))]);
        let system = compile(&registry, &["a"]).unwrap();
        assert_eq!(system.rules.count_by_type(RuleType::PackageConflict), 0);
    }
}
