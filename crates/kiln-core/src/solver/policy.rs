use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use kiln_version::VersionConstraint;
use serde::{Deserialize, Serialize};

use super::rule::Literal;
use super::variables::{Attribute, VariableTable};
use crate::recipe::VersionDecl;

/// Soft-preference categories, compared lexicographically in the order the
/// policy lists them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CostCategory {
    /// Deprecated versions in use
    Deprecated,
    /// Variants set away from their defaults
    VariantDefaults,
    /// Distance of chosen versions from the most preferred one
    VersionAge,
    /// Distance of chosen compilers from the most preferred one
    CompilerPreference,
    /// Distance of chosen architectures from the most preferred one
    ArchitecturePreference,
    /// Number of nodes in the graph
    NodeCount,
}

impl CostCategory {
    pub const DEFAULT_ORDER: [CostCategory; 6] = [
        CostCategory::Deprecated,
        CostCategory::VariantDefaults,
        CostCategory::VersionAge,
        CostCategory::CompilerPreference,
        CostCategory::ArchitecturePreference,
        CostCategory::NodeCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CostCategory::Deprecated => "deprecated",
            CostCategory::VariantDefaults => "variant-defaults",
            CostCategory::VersionAge => "version-age",
            CostCategory::CompilerPreference => "compiler-preference",
            CostCategory::ArchitecturePreference => "architecture-preference",
            CostCategory::NodeCount => "node-count",
        }
    }
}

impl FromStr for CostCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CostCategory::DEFAULT_ORDER
            .iter()
            .copied()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| format!("unknown cost category \"{}\"", s))
    }
}

impl fmt::Display for CostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preferences used to rank valid solutions.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Categories from most to least important
    pub cost_order: Vec<CostCategory>,
    /// Rank older versions first
    pub prefer_oldest: bool,
    /// Offer deprecated versions even when nothing asks for them
    pub allow_deprecated: bool,
    /// Versions to favor per package, ahead of recipe preferences
    pub preferred_versions: BTreeMap<String, VersionConstraint>,
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy {
    pub fn new() -> Self {
        Self {
            cost_order: CostCategory::DEFAULT_ORDER.to_vec(),
            prefer_oldest: false,
            allow_deprecated: false,
            preferred_versions: BTreeMap::new(),
        }
    }

    pub fn prefer_oldest(mut self, prefer: bool) -> Self {
        self.prefer_oldest = prefer;
        self
    }

    pub fn allow_deprecated(mut self, allow: bool) -> Self {
        self.allow_deprecated = allow;
        self
    }

    pub fn cost_order(mut self, order: Vec<CostCategory>) -> Self {
        self.cost_order = order;
        self
    }

    pub fn with_preferred_version(mut self, package: &str, versions: VersionConstraint) -> Self {
        self.preferred_versions.insert(package.to_string(), versions);
        self
    }

    /// Configured order without duplicates, with omitted categories appended
    /// in their default position
    pub fn effective_cost_order(&self) -> Vec<CostCategory> {
        let mut seen = HashSet::new();
        let mut order: Vec<CostCategory> = self
            .cost_order
            .iter()
            .copied()
            .filter(|c| seen.insert(*c))
            .collect();
        for category in CostCategory::DEFAULT_ORDER {
            if seen.insert(category) {
                order.push(category);
            }
        }
        order
    }

    /// Candidate versions of a package, most preferred first.
    ///
    /// Deprecated versions are kept only when allowed or when one of the
    /// `requested` constraints names them.
    pub fn order_versions<'a>(
        &self,
        package: &str,
        declared: &'a [VersionDecl],
        requested: &[&VersionConstraint],
    ) -> Vec<&'a VersionDecl> {
        let configured = self.preferred_versions.get(package);
        let mut candidates: Vec<&VersionDecl> = declared
            .iter()
            .filter(|decl| {
                !decl.deprecated
                    || self.allow_deprecated
                    || requested
                        .iter()
                        .any(|c| !c.is_any() && c.contains(&decl.version))
            })
            .collect();

        candidates.sort_by(|a, b| {
            let configured_a = configured.is_some_and(|c| c.contains(&a.version));
            let configured_b = configured.is_some_and(|c| c.contains(&b.version));
            configured_b
                .cmp(&configured_a)
                .then(b.preferred.cmp(&a.preferred))
                .then(a.deprecated.cmp(&b.deprecated))
                .then(a.version.is_develop().cmp(&b.version.is_develop()))
                .then_with(|| self.compare_age(a, b))
        });
        candidates
    }

    fn compare_age(&self, a: &VersionDecl, b: &VersionDecl) -> Ordering {
        if self.prefer_oldest {
            a.version.cmp(&b.version)
        } else {
            b.version.cmp(&a.version)
        }
    }
}

/// Lexicographic cost of an assignment: policy categories first, then
/// tie-break components
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CostVector(pub Vec<u64>);

impl CostVector {
    pub fn zero(len: usize) -> Self {
        CostVector(vec![0; len])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&c| c == 0)
    }
}

impl fmt::Display for CostVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostTerm {
    pub literal: Literal,
    pub component: usize,
    pub weight: u64,
}

/// Weighted literals per cost component
#[derive(Debug, Clone, Default)]
pub struct CostModel {
    categories: Vec<CostCategory>,
    components: usize,
    terms: Vec<CostTerm>,
}

impl CostModel {
    /// Cost terms for every variable of `table`.
    ///
    /// Components are the policy categories in order, then one presence
    /// component per node, then one rank component per domain. The rank
    /// components make the optimum unique.
    pub fn build(policy: &Policy, table: &VariableTable) -> Self {
        let categories = policy.effective_cost_order();
        let position = |category: CostCategory| {
            categories
                .iter()
                .position(|&c| c == category)
                .unwrap_or(categories.len())
        };
        let mut terms = Vec::new();
        let mut push = |literal: Literal, component: usize, weight: u64| {
            if weight > 0 {
                terms.push(CostTerm {
                    literal,
                    component,
                    weight,
                });
            }
        };

        for node in table.nodes() {
            push(node.literal, position(CostCategory::NodeCount), 1);
            for domain in &node.domains {
                for (rank, value) in domain.values.iter().enumerate() {
                    let rank = rank as u64;
                    match domain.attribute {
                        Attribute::Version => {
                            let deprecated = value.deprecated as u64;
                            push(value.literal, position(CostCategory::Deprecated), deprecated);
                            push(value.literal, position(CostCategory::VersionAge), rank);
                        }
                        Attribute::Compiler => {
                            push(value.literal, position(CostCategory::CompilerPreference), rank)
                        }
                        Attribute::Architecture => push(
                            value.literal,
                            position(CostCategory::ArchitecturePreference),
                            rank,
                        ),
                        Attribute::Variant(_) | Attribute::VariantValue { .. } => push(
                            value.literal,
                            position(CostCategory::VariantDefaults),
                            !value.is_default as u64,
                        ),
                    }
                }
            }
        }

        let mut component = categories.len();
        for node in table.nodes() {
            push(node.literal, component, 1);
            component += 1;
        }
        for node in table.nodes() {
            for domain in &node.domains {
                for (rank, value) in domain.values.iter().enumerate() {
                    push(value.literal, component, rank as u64);
                }
                component += 1;
            }
        }

        CostModel {
            categories,
            components: component,
            terms,
        }
    }

    pub fn categories(&self) -> &[CostCategory] {
        &self.categories
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn terms(&self) -> &[CostTerm] {
        &self.terms
    }

    /// Cost of the literals for which `holds` returns true
    pub fn cost_of(&self, holds: impl Fn(Literal) -> bool) -> CostVector {
        let mut cost = CostVector::zero(self.components);
        for term in &self.terms {
            if holds(term.literal) {
                cost.0[term.component] += term.weight;
            }
        }
        cost
    }

    /// Cost-bearing literals for which `holds` returns true, deduplicated
    pub fn bearing_literals(&self, holds: impl Fn(Literal) -> bool) -> Vec<Literal> {
        let mut seen = HashSet::new();
        self.terms
            .iter()
            .filter(|t| holds(t.literal) && seen.insert(t.literal))
            .map(|t| t.literal)
            .collect()
    }

    /// Policy part of a cost vector, labelled by category
    pub fn describe(&self, cost: &CostVector) -> String {
        self.categories
            .iter()
            .zip(&cost.0)
            .map(|(category, value)| format!("{}={}", category, value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::variables::{Choice, NodeKey};
    use kiln_version::Version;

    fn decl(v: &str) -> VersionDecl {
        VersionDecl::new(Version::parse(v).unwrap())
    }

    fn names(decls: Vec<&VersionDecl>) -> Vec<String> {
        decls.iter().map(|d| d.version.to_string()).collect()
    }

    #[test]
    fn test_newest_first() {
        let declared = vec![decl("1.0"), decl("2.0"), decl("1.5"), decl("develop")];
        let order = Policy::new().order_versions("a", &declared, &[]);
        assert_eq!(names(order), vec!["2.0", "1.5", "1.0", "develop"]);
    }

    #[test]
    fn test_prefer_oldest() {
        let declared = vec![decl("1.0"), decl("2.0")];
        let order = Policy::new().prefer_oldest(true).order_versions("a", &declared, &[]);
        assert_eq!(names(order), vec!["1.0", "2.0"]);
    }

    #[test]
    fn test_preferences() {
        let declared = vec![decl("1.0"), decl("2.0").preferred(), decl("3.0")];
        let order = Policy::new().order_versions("a", &declared, &[]);
        assert_eq!(names(order), vec!["2.0", "3.0", "1.0"]);

        let policy =
            Policy::new().with_preferred_version("a", VersionConstraint::parse("1").unwrap());
        assert_eq!(names(policy.order_versions("a", &declared, &[])), vec!["1.0", "2.0", "3.0"]);
    }

    #[test]
    fn test_deprecated_filtering() {
        let declared = vec![decl("1.0"), decl("2.0").deprecated()];
        assert_eq!(names(Policy::new().order_versions("a", &declared, &[])), vec!["1.0"]);

        let wanted = VersionConstraint::parse("2.0").unwrap();
        assert_eq!(
            names(Policy::new().order_versions("a", &declared, &[&wanted])),
            vec!["1.0", "2.0"]
        );
        assert_eq!(
            names(Policy::new().allow_deprecated(true).order_versions("a", &declared, &[])),
            vec!["1.0", "2.0"]
        );
    }

    #[test]
    fn test_effective_cost_order() {
        let policy =
            Policy::new().cost_order(vec![CostCategory::NodeCount, CostCategory::NodeCount]);
        let order = policy.effective_cost_order();
        assert_eq!(order.len(), 6);
        assert_eq!(order[0], CostCategory::NodeCount);
        assert_eq!(order[1], CostCategory::Deprecated);
    }

    #[test]
    fn test_cost_model() {
        let mut table = VariableTable::new();
        let a = table.add_node(NodeKey::main("a"), true);
        table.add_domain(
            a,
            Attribute::Version,
            vec![
                (Choice::Version(Version::parse("2.0").unwrap()), false, false),
                (Choice::Version(Version::parse("1.0").unwrap()), false, true),
            ],
        );
        let model = CostModel::build(&Policy::new(), &table);
        assert_eq!(model.components(), 6 + 1 + 1);

        let newest = model.cost_of(|l| l == 1 || l == 2);
        let oldest = model.cost_of(|l| l == 1 || l == 3);
        assert!(newest < oldest);
        assert_eq!(oldest.0[0], 1);
        assert_eq!(model.bearing_literals(|l| l == 1 || l == 2), vec![1]);
        assert!(model.describe(&newest).starts_with("deprecated=0 variant-defaults=0"));
        assert_eq!("node-count".parse::<CostCategory>(), Ok(CostCategory::NodeCount));
    }
}
