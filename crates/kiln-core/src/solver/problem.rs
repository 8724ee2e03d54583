use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::rule::{Literal, Rule, RuleType};
use super::variables::{VarId, VariableTable};

/// Why a request cannot be concretized.
///
/// Holds a subset of the compiled rules that cannot hold together, plus the
/// choices those rules disagree on. When `minimal` is set, removing any one
/// rule makes the rest satisfiable.
#[derive(Debug, Clone, Default)]
pub struct Problem {
    pub rules: Vec<ProblemRule>,
    /// Choices the rules pull in opposite directions, e.g. `c+x`
    pub conflicting: Vec<String>,
    pub minimal: bool,
    pub message: Option<String>,
}

/// A rule that contributes to a problem, resolved to names at creation
#[derive(Debug, Clone)]
pub struct ProblemRule {
    pub rule_id: u32,
    pub rule_type: RuleType,
    pub source: Option<String>,
    pub target: Option<String>,
    pub constraint: Option<String>,
    /// Message supplied by a recipe, e.g. a conflict reason
    pub message: Option<String>,
}

impl Problem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a problem from the rules of an unsatisfiable core
    pub fn from_rules<'r>(
        rules: impl IntoIterator<Item = &'r Rule>,
        table: &VariableTable,
        minimal: bool,
    ) -> Self {
        let mut problem = Problem::new();
        let mut polarity: BTreeMap<VarId, (bool, bool)> = BTreeMap::new();
        for rule in rules {
            for &literal in rule.literals() {
                let entry = polarity.entry(literal.unsigned_abs()).or_default();
                if literal > 0 {
                    entry.0 = true;
                } else {
                    entry.1 = true;
                }
            }
            problem.add_rule(rule);
        }

        let disputed: Vec<VarId> = polarity
            .into_iter()
            .filter(|(_, (pos, neg))| *pos && *neg)
            .map(|(var, _)| var)
            .collect();
        let choices: Vec<VarId> =
            disputed.iter().copied().filter(|&v| table.is_choice(v)).collect();
        let shown = if choices.is_empty() { disputed } else { choices };
        problem.conflicting = shown.into_iter().map(|v| table.describe_var(v)).collect();
        problem.minimal = minimal;
        problem
    }

    pub fn add_rule(&mut self, rule: &Rule) {
        self.rules.push(ProblemRule {
            rule_id: rule.id(),
            rule_type: rule.rule_type(),
            source: rule.source().map(String::from),
            target: rule.target().map(String::from),
            constraint: rule.constraint().map(String::from),
            message: rule.message().map(String::from),
        });
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Packages the explanation mentions
    pub fn packages(&self) -> BTreeSet<String> {
        self.rules
            .iter()
            .flat_map(|r| [r.source.as_deref(), r.target.as_deref()])
            .flatten()
            .filter(|name| *name != "request" && *name != "pin")
            .map(|name| name.trim_end_matches(" (build)").to_string())
            .collect()
    }

    pub fn describe(&self) -> String {
        let mut lines = Vec::new();
        if let Some(message) = &self.message {
            lines.push(message.clone());
        }
        for rule in &self.rules {
            lines.push(format!("  - {}", describe_rule(rule)));
        }
        if !self.conflicting.is_empty() {
            lines.push(format!("  conflicting choices: {}", self.conflicting.join(", ")));
        }
        lines.join("\n")
    }

    /// IDs of the rules, for callers that re-check a core
    pub fn rule_ids(&self) -> Vec<u32> {
        self.rules.iter().map(|r| r.rule_id).collect()
    }
}

fn describe_rule(rule: &ProblemRule) -> String {
    let source = rule.source.as_deref().unwrap_or("unknown");
    let target = rule.target.as_deref().unwrap_or("unknown");
    let constraint = rule.constraint.as_deref().unwrap_or("");
    let text = match rule.rule_type {
        RuleType::RootRequire => format!("{} is requested", constraint),
        RuleType::RequestConstraint if source == "pin" => {
            format!("{} is pinned to {}", target, constraint)
        }
        RuleType::RequestConstraint => format!("request {} constrains {}", constraint, target),
        RuleType::EdgeActivation => format!("{} depends on {}", source, constraint),
        RuleType::DependencyRequires | RuleType::EdgeCondition => {
            format!("{} requires {}", source, constraint)
        }
        RuleType::ArchitectureMatch => {
            format!("{} and {} must share an architecture", source, target)
        }
        RuleType::NodeJustified => {
            format!("{} is only built when something depends on it", source)
        }
        RuleType::PackageConflict => format!("{} conflicts with {}", source, constraint),
        RuleType::NodeAttribute | RuleType::ChooseOne | RuleType::MultiConflict => {
            format!("{} takes exactly one {}", source, constraint)
        }
        RuleType::Optimization => "cost bound".to_string(),
        RuleType::Learned => "learned constraint from conflict analysis".to_string(),
    };
    match &rule.message {
        Some(message) => format!("{}: {}", text, message),
        None => text,
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Clause forbidding all of `literals` at once
pub(crate) fn negated(literals: &[Literal]) -> Vec<Literal> {
    literals.iter().map(|&l| -l).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::variables::{Attribute, Choice, NodeKey};

    #[test]
    fn test_problem_describe() {
        let mut problem = Problem::new();
        let rule = Rule::assertion(1, RuleType::RootRequire)
            .with_target("kakoune")
            .with_constraint("kakoune@2021.11.08");
        problem.add_rule(&rule);

        let conflict = Rule::new(vec![-1, -2], RuleType::PackageConflict)
            .with_source("kakoune")
            .with_constraint("%gcc@:8 when @2021.11.08")
            .with_message(Some("needs a C++17 compiler".to_string()));
        problem.add_rule(&conflict);

        let text = problem.to_string();
        assert!(text.contains("kakoune@2021.11.08 is requested"));
        assert!(text.contains(
            "kakoune conflicts with %gcc@:8 when @2021.11.08: needs a C++17 compiler"
        ));
        assert_eq!(problem.packages(), BTreeSet::from(["kakoune".to_string()]));
    }

    #[test]
    fn test_conflicting_choices() {
        let mut table = VariableTable::new();
        let c = table.add_node(NodeKey::main("c"), false);
        table.add_domain(
            c,
            Attribute::Variant("x".into()),
            vec![
                (Choice::Value("false".into()), true, false),
                (Choice::Value("true".into()), false, false),
            ],
        );
        let requires = Rule::new(vec![-4, 3], RuleType::DependencyRequires);
        let conflict = Rule::new(vec![-5, -1, -3], RuleType::PackageConflict);
        let problem = Problem::from_rules([&requires, &conflict], &table, true);
        assert_eq!(problem.conflicting, vec!["c+x".to_string()]);
        assert!(problem.minimal);
        assert_eq!(negated(&[1, -2]), vec![-1, 2]);
    }
}
