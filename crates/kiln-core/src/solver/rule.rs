use std::fmt;
use std::hash::{Hash, Hasher};

/// A literal in SAT terms: positive means the choice is made, negative means it is not
pub type Literal = i32;

/// Types of rules produced by the constraint compiler and the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleType {
    /// A requested package must be in the graph
    RootRequire,
    /// Constraint from the request on a node's attributes
    RequestConstraint,
    /// A value literal implies its node is present
    NodeAttribute,
    /// A present node takes at least one value of each attribute
    ChooseOne,
    /// At most one value of an attribute (n-ary, watches every literal)
    MultiConflict,
    /// Node and edge condition imply the edge is active
    EdgeActivation,
    /// An active edge implies its node and condition
    EdgeCondition,
    /// An active edge requires its target and the target's constraints
    DependencyRequires,
    /// Link and run dependencies share their dependent's architecture
    ArchitectureMatch,
    /// A non-root node exists only when an active edge needs it
    NodeJustified,
    /// Recipe conflict
    PackageConflict,
    /// Bound added by branch-and-bound: do at least as well as the incumbent
    Optimization,
    /// Learned clause from conflict analysis
    Learned,
}

impl RuleType {
    /// Rules that may appear in an explanation of an unsatisfiable request
    pub fn is_explainable(&self) -> bool {
        matches!(
            self,
            RuleType::RootRequire
                | RuleType::RequestConstraint
                | RuleType::EdgeActivation
                | RuleType::DependencyRequires
                | RuleType::ArchitectureMatch
                | RuleType::PackageConflict
        )
    }

    pub fn is_multi_conflict(&self) -> bool {
        matches!(self, RuleType::MultiConflict)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::RootRequire => "root-require",
            RuleType::RequestConstraint => "request",
            RuleType::NodeAttribute => "attribute",
            RuleType::ChooseOne => "choose-one",
            RuleType::MultiConflict => "multi-conflict",
            RuleType::EdgeActivation => "edge-activation",
            RuleType::EdgeCondition => "edge-condition",
            RuleType::DependencyRequires => "requires",
            RuleType::ArchitectureMatch => "architecture-match",
            RuleType::NodeJustified => "justified",
            RuleType::PackageConflict => "conflict",
            RuleType::Optimization => "optimization",
            RuleType::Learned => "learned",
        }
    }
}

/// A SAT rule (clause). Satisfied when at least one literal is true.
///
/// - `[A]`: A must hold
/// - `[-A, B, C]`: if A holds, then B or C
/// - `[-A, -B]`: A and B cannot both hold
#[derive(Clone)]
pub struct Rule {
    literals: Vec<Literal>,
    rule_type: RuleType,
    /// Assigned by the RuleSet
    id: u32,
    /// Node the rule originates from (for explanations)
    source: Option<String>,
    /// Package the rule is about (for explanations)
    target: Option<String>,
    /// Constraint text (for explanations)
    constraint: Option<String>,
    /// Recipe-provided message, e.g. a conflict reason
    message: Option<String>,
    disabled: bool,
}

impl Rule {
    pub fn new(literals: Vec<Literal>, rule_type: RuleType) -> Self {
        Self {
            literals,
            rule_type,
            id: 0,
            source: None,
            target: None,
            constraint: None,
            message: None,
            disabled: false,
        }
    }

    /// Single literal that must hold
    pub fn assertion(literal: Literal, rule_type: RuleType) -> Self {
        Self::new(vec![literal], rule_type)
    }

    /// If `premise` holds, one of `targets` must
    pub fn implies(premise: Literal, targets: Vec<Literal>, rule_type: RuleType) -> Self {
        let mut literals = vec![-premise];
        literals.extend(targets);
        Self::new(literals, rule_type)
    }

    /// At most one of `literals` may hold
    pub fn multi_conflict(literals: &[Literal]) -> Self {
        Self::new(literals.iter().map(|&l| -l).collect(), RuleType::MultiConflict)
    }

    pub fn learned(literals: Vec<Literal>) -> Self {
        Self::new(literals, RuleType::Learned)
    }

    pub fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.target = Some(name.into());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_assertion(&self) -> bool {
        self.literals.len() == 1
    }

    pub fn is_multi_conflict(&self) -> bool {
        self.rule_type.is_multi_conflict()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn disable(&mut self) {
        self.disabled = true;
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Hash of the literals, independent of their order
    pub fn literal_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();

        let mut sorted = self.literals.clone();
        sorted.sort_unstable();
        sorted.hash(&mut hasher);

        hasher.finish()
    }

    /// Same literals, regardless of order
    pub fn equals_literals(&self, other: &Rule) -> bool {
        if self.literals.len() != other.literals.len() {
            return false;
        }

        let mut a = self.literals.clone();
        let mut b = other.literals.clone();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rule({:?}, {:?})", self.rule_type, self.literals)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let literals: Vec<String> = self
            .literals
            .iter()
            .map(|&l| if l > 0 { format!("+{}", l) } else { l.to_string() })
            .collect();

        write!(f, "({}) [{}]", self.rule_type.as_str(), literals.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_assertion() {
        let rule = Rule::assertion(5, RuleType::RootRequire);
        assert!(rule.is_assertion());
        assert_eq!(rule.literals(), &[5]);
    }

    #[test]
    fn test_rule_implies() {
        let rule = Rule::implies(1, vec![2, 3, 4], RuleType::DependencyRequires);
        assert_eq!(rule.literals(), &[-1, 2, 3, 4]);
        assert_eq!(rule.rule_type(), RuleType::DependencyRequires);
    }

    #[test]
    fn test_rule_multi_conflict() {
        let rule = Rule::multi_conflict(&[1, 2, 3]);
        assert_eq!(rule.literals(), &[-1, -2, -3]);
        assert!(rule.is_multi_conflict());
    }

    #[test]
    fn test_rule_literal_hash() {
        let rule1 = Rule::new(vec![1, 2, 3], RuleType::DependencyRequires);
        let rule2 = Rule::new(vec![3, 1, 2], RuleType::DependencyRequires);
        let rule3 = Rule::new(vec![1, 2, 4], RuleType::DependencyRequires);

        assert_eq!(rule1.literal_hash(), rule2.literal_hash());
        assert_ne!(rule1.literal_hash(), rule3.literal_hash());
    }

    #[test]
    fn test_rule_equals_literals() {
        let rule1 = Rule::new(vec![1, 2, 3], RuleType::DependencyRequires);
        let rule2 = Rule::new(vec![3, 1, 2], RuleType::PackageConflict);
        let rule3 = Rule::new(vec![1, 2], RuleType::DependencyRequires);

        assert!(rule1.equals_literals(&rule2));
        assert!(!rule1.equals_literals(&rule3));
    }

    #[test]
    fn test_explainable_types() {
        assert!(RuleType::PackageConflict.is_explainable());
        assert!(RuleType::RootRequire.is_explainable());
        assert!(!RuleType::MultiConflict.is_explainable());
        assert!(!RuleType::Learned.is_explainable());
    }

    #[test]
    fn test_rule_display() {
        let rule = Rule::implies(1, vec![2, 3], RuleType::DependencyRequires);
        assert_eq!(format!("{}", rule), "(requires) [-1 | +2 | +3]");
    }
}
