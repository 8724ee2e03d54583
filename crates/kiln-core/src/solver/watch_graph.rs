use super::decisions::Decisions;
use super::rule::{Literal, Rule};
use super::rule_set::RuleSet;

/// Two-watched literals graph for unit propagation.
///
/// Each clause watches two of its literals. While neither watched literal is
/// false the clause cannot be unit, so it is only visited when one of them
/// becomes false. Multi-conflict rules watch every literal instead.
#[derive(Debug, Default)]
pub struct WatchGraph {
    /// Literal index -> rules watching that literal
    watches: Vec<Vec<u32>>,
    /// Rule id -> the two watched literals (`None` for assertions and
    /// multi-conflicts)
    watched: Vec<Option<[Literal; 2]>>,
}

impl WatchGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn literal_to_index(literal: Literal) -> usize {
        let abs = literal.unsigned_abs() as usize;
        if literal > 0 {
            abs * 2
        } else {
            abs * 2 + 1
        }
    }

    fn watches_mut(&mut self, literal: Literal) -> &mut Vec<u32> {
        let idx = Self::literal_to_index(literal);
        if idx >= self.watches.len() {
            self.watches.resize(idx + 1, Vec::new());
        }
        &mut self.watches[idx]
    }

    fn set_watched(&mut self, rule_id: u32, pair: Option<[Literal; 2]>) {
        let idx = rule_id as usize;
        if idx >= self.watched.len() {
            self.watched.resize(idx + 1, None);
        }
        self.watched[idx] = pair;
    }

    /// Build the watch graph from every enabled rule
    pub fn from_rules(rules: &RuleSet) -> Self {
        let mut graph = Self::new();
        for rule in rules.iter() {
            if !rule.is_disabled() {
                graph.add_rule(rule);
            }
        }
        graph
    }

    /// Watch the first two literals of a rule
    pub fn add_rule(&mut self, rule: &Rule) {
        let literals = rule.literals();
        if literals.len() < 2 {
            return;
        }
        if rule.is_multi_conflict() {
            for &lit in literals {
                self.watches_mut(lit).push(rule.id());
            }
            return;
        }
        self.add_rule_with_watches(rule.id(), literals[0], literals[1]);
    }

    /// Watch the given pair of literals. Used for learned clauses, where the
    /// watches must be the literals assigned last.
    pub fn add_rule_with_watches(&mut self, rule_id: u32, first: Literal, second: Literal) {
        self.watches_mut(first).push(rule_id);
        self.watches_mut(second).push(rule_id);
        self.set_watched(rule_id, Some([first, second]));
    }

    pub fn watchers(&self, literal: Literal) -> &[u32] {
        self.watches
            .get(Self::literal_to_index(literal))
            .map_or(&[], Vec::as_slice)
    }

    pub fn watched(&self, rule_id: u32) -> Option<[Literal; 2]> {
        self.watched.get(rule_id as usize).copied().flatten()
    }

    fn move_watch(&mut self, rule_id: u32, from: Literal, to: Literal, other: Literal) {
        let idx = Self::literal_to_index(from);
        if let Some(list) = self.watches.get_mut(idx) {
            if let Some(pos) = list.iter().position(|&id| id == rule_id) {
                list.swap_remove(pos);
            }
        }
        self.watches_mut(to).push(rule_id);
        self.set_watched(rule_id, Some([to, other]));
    }
}

/// Result of propagating one literal through a single rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagateResult {
    /// A literal that is now forced, with the rule forcing it
    Unit(Literal, u32),
    /// Every literal of the rule is false
    Conflict(u32),
}

/// Propagator visits the rules affected by a newly decided literal
pub struct Propagator<'a> {
    graph: &'a mut WatchGraph,
    rules: &'a RuleSet,
}

impl<'a> Propagator<'a> {
    pub fn new(graph: &'a mut WatchGraph, rules: &'a RuleSet) -> Self {
        Self { graph, rules }
    }

    /// Visit every rule watching `-literal`, which just became false.
    ///
    /// Units are returned in the order found; a conflict ends the visit.
    pub fn propagate(&mut self, literal: Literal, decisions: &Decisions) -> Vec<PropagateResult> {
        let mut results = Vec::new();
        let false_literal = -literal;

        let watchers: Vec<u32> = self.graph.watchers(false_literal).to_vec();
        for rule_id in watchers {
            let Some(rule) = self.rules.get(rule_id) else {
                continue;
            };
            if rule.is_disabled() {
                continue;
            }

            if rule.is_multi_conflict() {
                // [-A, -B, -C]: one of the packages became true, the rest must not
                for &other in rule.literals() {
                    if other == false_literal {
                        continue;
                    }
                    if decisions.conflict(other) {
                        results.push(PropagateResult::Conflict(rule_id));
                        return results;
                    }
                    if !decisions.satisfied(other) {
                        results.push(PropagateResult::Unit(other, rule_id));
                    }
                }
                continue;
            }

            let Some([first, second]) = self.graph.watched(rule_id) else {
                continue;
            };
            let other = if first == false_literal { second } else { first };
            if decisions.satisfied(other) {
                continue;
            }

            let replacement = rule
                .literals()
                .iter()
                .copied()
                .find(|&l| l != first && l != second && !decisions.conflict(l));
            if let Some(replacement) = replacement {
                self.graph.move_watch(rule_id, false_literal, replacement, other);
                continue;
            }

            if decisions.conflict(other) {
                results.push(PropagateResult::Conflict(rule_id));
                return results;
            }
            results.push(PropagateResult::Unit(other, rule_id));
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::rule::RuleType;

    fn setup(rules: Vec<Rule>) -> (RuleSet, WatchGraph) {
        let mut set = RuleSet::new();
        for rule in rules {
            set.add(rule);
        }
        let graph = WatchGraph::from_rules(&set);
        (set, graph)
    }

    #[test]
    fn test_watches_first_two_literals() {
        let (_, graph) = setup(vec![Rule::new(vec![-1, 2, 3], RuleType::DependencyRequires)]);
        assert_eq!(graph.watchers(-1), &[0]);
        assert_eq!(graph.watchers(2), &[0]);
        assert!(graph.watchers(3).is_empty());
    }

    #[test]
    fn test_watch_moves_to_unassigned_literal() {
        let rule = Rule::new(vec![-1, 2, 3], RuleType::DependencyRequires);
        let (rules, mut graph) = setup(vec![rule]);
        let mut decisions = Decisions::new();
        decisions.decide(1, None);

        let results = Propagator::new(&mut graph, &rules).propagate(1, &decisions);
        assert!(results.is_empty());
        assert_eq!(graph.watched(0), Some([3, 2]));
        assert_eq!(graph.watchers(3), &[0]);
    }

    #[test]
    fn test_unit_and_conflict() {
        let (rules, mut graph) = setup(vec![Rule::new(vec![-1, 2], RuleType::DependencyRequires)]);
        let mut decisions = Decisions::new();
        decisions.decide(1, None);
        let results = Propagator::new(&mut graph, &rules).propagate(1, &decisions);
        assert_eq!(results, vec![PropagateResult::Unit(2, 0)]);

        let mut decisions = Decisions::new();
        decisions.decide(-2, None);
        decisions.decide(1, None);
        let results = Propagator::new(&mut graph, &rules).propagate(1, &decisions);
        assert_eq!(results, vec![PropagateResult::Conflict(0)]);
    }

    #[test]
    fn test_multi_conflict_forces_others_false() {
        let (rules, mut graph) = setup(vec![Rule::multi_conflict(&[1, 2, 3])]);
        let mut decisions = Decisions::new();
        decisions.decide(2, None);
        let results = Propagator::new(&mut graph, &rules).propagate(2, &decisions);
        assert_eq!(
            results,
            vec![PropagateResult::Unit(-1, 0), PropagateResult::Unit(-3, 0)]
        );
    }
}
