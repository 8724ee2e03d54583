use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::compiler::ConstraintSystem;
use super::decisions::Decisions;
use super::policy::CostVector;
use super::problem::{negated, Problem};
use super::rule::{Literal, Rule, RuleType};
use super::rule_set::RuleSet;
use super::variables::VarId;
use super::watch_graph::{PropagateResult, Propagator, WatchGraph};
use crate::error::{KilnError, Result};

/// Shared flag to abandon a running concretization
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Limits and switches for the search
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Decisions plus conflicts before giving up
    pub max_iterations: u64,
    /// Reduce explanations to an irreducible set of rules
    pub minimize_explanations: bool,
    /// Skip minimization when more explainable rules than this exist
    pub explain_max_rules: usize,
    pub cancel: CancelToken,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1_000_000,
            minimize_explanations: true,
            explain_max_rules: 400,
            cancel: CancelToken::new(),
        }
    }
}

impl SolverOptions {
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMode {
    /// Find the assignment with the lowest cost
    Optimize,
    /// Stop at the first assignment
    Satisfy,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SolveStats {
    pub iterations: u64,
    pub conflicts: u64,
    pub learned: u64,
    /// Improving assignments found
    pub solutions: u64,
}

/// A complete assignment
#[derive(Debug, Clone)]
pub struct Solution {
    /// Indexed by variable
    values: Vec<bool>,
    pub cost: CostVector,
    pub stats: SolveStats,
}

impl Solution {
    pub fn holds(&self, literal: Literal) -> bool {
        let value = self
            .values
            .get(literal.unsigned_abs() as usize)
            .copied()
            .unwrap_or(false);
        if literal > 0 {
            value
        } else {
            !value
        }
    }

    /// Variables set to true, in variable order
    pub fn true_variables(&self) -> impl Iterator<Item = VarId> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v)
            .map(|(var, _)| var as VarId)
    }
}

/// Finds the optimal assignment of a constraint system.
///
/// CDCL search (two watched literals, first-UIP learning, backjumping)
/// inside branch-and-bound: each improving assignment adds a clause that
/// forbids its cost-bearing literals together, and partial assignments that
/// already cost as much as the best one are cut the same way. The search is
/// over when a conflict reaches the assertion level.
pub struct Solver<'a> {
    system: &'a ConstraintSystem,
    options: &'a SolverOptions,
}

impl<'a> Solver<'a> {
    pub fn new(system: &'a ConstraintSystem, options: &'a SolverOptions) -> Self {
        Self { system, options }
    }

    /// Optimal solution, or `Unsatisfiable` with an explanation
    pub fn solve(&self) -> Result<Solution> {
        let start = std::time::Instant::now();
        let rules = self.system.rules.clone();
        let found = Search::new(self.system, self.options, rules, SolveMode::Optimize).run()?;

        match found {
            Some(solution) => {
                log::debug!(
                    "Solved in {:?}: {} iterations, {} conflicts, {} solutions, cost {}",
                    start.elapsed(),
                    solution.stats.iterations,
                    solution.stats.conflicts,
                    solution.stats.solutions,
                    self.system.costs.describe(&solution.cost)
                );
                Ok(solution)
            }
            None => {
                log::debug!("No solution after {:?}, building explanation", start.elapsed());
                Err(KilnError::Unsatisfiable {
                    problem: self.explain()?,
                })
            }
        }
    }

    /// First solution found, without optimizing
    pub fn satisfy(&self) -> Result<Option<Solution>> {
        Search::new(self.system, self.options, self.system.rules.clone(), SolveMode::Satisfy).run()
    }

    /// Explain why the system has no solution.
    ///
    /// Deletion-based: every explainable rule is dropped in turn and kept out
    /// when the rest stays unsatisfiable. The rules left are irreducible.
    pub fn explain(&self) -> Result<Problem> {
        let rules = &self.system.rules;
        let candidates = rules.explainable_ids();

        if !self.options.minimize_explanations
            || candidates.len() > self.options.explain_max_rules
        {
            log::debug!("Reporting all {} explainable rules without minimizing", candidates.len());
            return Ok(Problem::from_rules(
                candidates.iter().filter_map(|&id| rules.get(id)),
                &self.system.table,
                false,
            ));
        }

        // Structural rules go first so a rule that only restates an edge
        // never stands in for the dependency or conflict behind it.
        let mut order = candidates.clone();
        order.sort_by_key(|&id| rules.get(id).map_or(u8::MAX, |r| deletion_rank(r.rule_type())));

        let mut core = candidates;
        for id in order {
            let trial: Vec<u32> = core.iter().copied().filter(|&c| c != id).collect();
            if !self.satisfiable_with(&trial)? {
                core = trial;
            }
        }
        log::debug!("Explanation reduced to {} rules", core.len());

        Ok(Problem::from_rules(
            core.iter().filter_map(|&id| rules.get(id)),
            &self.system.table,
            true,
        ))
    }

    /// Whether the system is satisfiable with only the `keep` explainable rules
    fn satisfiable_with(&self, keep: &[u32]) -> Result<bool> {
        let keep: HashSet<u32> = keep.iter().copied().collect();
        let mut rules = self.system.rules.clone();
        for id in rules.explainable_ids() {
            if !keep.contains(&id) {
                rules.disable(id);
            }
        }
        match Search::new(self.system, self.options, rules, SolveMode::Satisfy).run() {
            Ok(found) => Ok(found.is_some()),
            // undecided: keep the rule in the explanation
            Err(KilnError::ResourceLimit { .. }) => Ok(true),
            Err(e) => Err(e),
        }
    }
}

/// Order in which explainable rules are tried for deletion
fn deletion_rank(rule_type: RuleType) -> u8 {
    match rule_type {
        RuleType::ArchitectureMatch => 0,
        RuleType::EdgeActivation => 1,
        _ => 2,
    }
}

/// State of one search run
struct Search<'s> {
    system: &'s ConstraintSystem,
    options: &'s SolverOptions,
    mode: SolveMode,
    rules: RuleSet,
    watches: WatchGraph,
    decisions: Decisions,
    /// Index of the next decision to propagate
    propagate_index: usize,
    incumbent: Option<(Vec<bool>, CostVector)>,
    stats: SolveStats,
}

impl<'s> Search<'s> {
    fn new(
        system: &'s ConstraintSystem,
        options: &'s SolverOptions,
        rules: RuleSet,
        mode: SolveMode,
    ) -> Self {
        let watches = WatchGraph::from_rules(&rules);
        Self {
            system,
            options,
            mode,
            rules,
            watches,
            decisions: Decisions::with_capacity(system.table.num_variables()),
            propagate_index: 0,
            incumbent: None,
            stats: SolveStats::default(),
        }
    }

    fn run(mut self) -> Result<Option<Solution>> {
        self.decisions.increment_level();
        if !self.process_assertions() {
            return Ok(None);
        }

        loop {
            self.stats.iterations += 1;
            if self.options.cancel.is_cancelled() {
                return Err(KilnError::Cancelled);
            }
            if self.stats.iterations > self.options.max_iterations {
                return Err(KilnError::ResourceLimit {
                    iterations: self.stats.iterations,
                });
            }

            if let Some(conflict) = self.propagate() {
                if !self.resolve_conflict(conflict) {
                    break;
                }
                continue;
            }

            if self.mode == SolveMode::Optimize && self.reaches_incumbent() {
                match self.add_bound() {
                    Some(bound) if self.resolve_conflict(bound) => continue,
                    _ => break,
                }
            }

            if let Some(literal) = self.select_literal() {
                self.decisions.increment_level();
                self.decisions.decide(literal, None);
                continue;
            }

            // Every variable is decided
            if let Some(violated) = self.find_violated() {
                if !self.resolve_conflict(violated) {
                    break;
                }
                continue;
            }

            self.record_incumbent();
            if self.mode == SolveMode::Satisfy {
                break;
            }
            match self.add_bound() {
                Some(bound) if self.resolve_conflict(bound) => {}
                _ => break,
            }
        }

        let stats = self.stats;
        Ok(self.incumbent.map(|(values, cost)| Solution { values, cost, stats }))
    }

    /// Decide every assertion at level 1. False when two contradict.
    fn process_assertions(&mut self) -> bool {
        let assertions: Vec<(Literal, u32)> = self
            .rules
            .assertions()
            .map(|rule| (rule.literals()[0], rule.id()))
            .collect();
        for (literal, rule_id) in assertions {
            if !self.decisions.decide(literal, Some(rule_id)) {
                return false;
            }
        }
        true
    }

    /// Unit propagation to fixpoint. Returns the conflicting rule, if any.
    fn propagate(&mut self) -> Option<u32> {
        while self.propagate_index < self.decisions.len() {
            let literal = self.decisions.queue()[self.propagate_index];
            self.propagate_index += 1;

            let results = Propagator::new(&mut self.watches, &self.rules)
                .propagate(literal, &self.decisions);
            for result in results {
                match result {
                    PropagateResult::Unit(unit, rule_id) => {
                        if !self.decisions.decide(unit, Some(rule_id)) {
                            return Some(rule_id);
                        }
                    }
                    PropagateResult::Conflict(rule_id) => return Some(rule_id),
                }
            }
        }
        None
    }

    /// Learn from a rule whose literals are all false and backjump.
    /// False when the conflict does not depend on any choice, which ends
    /// the search.
    fn resolve_conflict(&mut self, conflict: u32) -> bool {
        let Some(rule) = self.rules.get(conflict) else {
            return false;
        };
        let max_level = rule
            .literals()
            .iter()
            .filter_map(|&l| self.decisions.decision_level(l))
            .max()
            .unwrap_or(0);
        if max_level <= 1 {
            return false;
        }
        if max_level < self.decisions.level() {
            self.decisions.revert_to_level(max_level);
        }

        self.stats.conflicts += 1;
        let (learned, backtrack) = self.analyze(conflict);
        self.decisions.revert_to_level(backtrack);
        self.propagate_index = self.decisions.len();

        let uip = learned[0];
        let second = learned.get(1).copied();
        let before = self.rules.len();
        let rule_id = self.rules.add(Rule::learned(learned));
        if self.rules.len() > before {
            self.stats.learned += 1;
            if let Some(second) = second {
                self.watches.add_rule_with_watches(rule_id, uip, second);
            }
        }
        self.decisions.decide(uip, Some(rule_id))
    }

    /// First-UIP conflict analysis at the current level.
    ///
    /// Returns the learned clause, asserting literal first and the rest by
    /// descending level, with the level to backjump to.
    fn analyze(&self, conflict: u32) -> (Vec<Literal>, u32) {
        let level = self.decisions.level();
        let queue = self.decisions.queue();
        let mut seen: HashSet<VarId> = HashSet::new();
        let mut others: Vec<Literal> = Vec::new();
        let mut pending = 0usize;
        let mut rule_id = conflict;
        let mut implied: Option<Literal> = None;
        let mut index = queue.len();

        let uip = loop {
            let Some(rule) = self.rules.get(rule_id) else {
                return self.decision_clause();
            };
            let limit = implied.and_then(|l| self.decisions.position(l));
            for &literal in rule.literals() {
                if Some(literal) == implied || !self.decisions.conflict(literal) {
                    continue;
                }
                if let (Some(limit), Some(position)) = (limit, self.decisions.position(literal)) {
                    if position > limit {
                        continue;
                    }
                }
                if !seen.insert(literal.unsigned_abs()) {
                    continue;
                }
                match self.decisions.decision_level(literal) {
                    Some(l) if l == level => pending += 1,
                    Some(l) if l > 1 => others.push(literal),
                    _ => {}
                }
            }

            let next = loop {
                if index == 0 {
                    break None;
                }
                index -= 1;
                let candidate = queue[index];
                if seen.contains(&candidate.unsigned_abs())
                    && self.decisions.decision_level(candidate) == Some(level)
                {
                    break Some(candidate);
                }
            };
            let Some(next) = next else {
                return self.decision_clause();
            };

            pending = pending.saturating_sub(1);
            if pending == 0 {
                break -next;
            }
            match self.decisions.decision_rule(next) {
                Some(reason) => {
                    rule_id = reason;
                    implied = Some(next);
                }
                None => break -next,
            }
        };

        others.sort_by_key(|&l| std::cmp::Reverse(self.decisions.decision_level(l).unwrap_or(0)));
        let backtrack = others
            .first()
            .and_then(|&l| self.decisions.decision_level(l))
            .unwrap_or(1);

        let mut learned = vec![uip];
        learned.extend(others);
        (learned, backtrack)
    }

    /// Clause negating every choice above level 1, current level first
    fn decision_clause(&self) -> (Vec<Literal>, u32) {
        let mut choices: Vec<Literal> = self
            .decisions
            .queue()
            .iter()
            .copied()
            .filter(|&l| self.decisions.decision_rule(l).is_none())
            .filter(|&l| self.decisions.decision_level(l).is_some_and(|level| level > 1))
            .collect();
        choices.reverse();
        let backtrack = choices
            .get(1)
            .and_then(|&l| self.decisions.decision_level(l))
            .unwrap_or(1);
        (negated(&choices), backtrack)
    }

    /// The decided literals already cost at least as much as the incumbent
    fn reaches_incumbent(&self) -> bool {
        let Some((_, best)) = &self.incumbent else {
            return false;
        };
        let bound = self.system.costs.cost_of(|l| self.decisions.satisfied(l));
        &bound >= best
    }

    /// Add a clause forbidding the current cost-bearing literals together.
    /// `None` when there are none, so nothing cheaper exists.
    fn add_bound(&mut self) -> Option<u32> {
        let bearing = self
            .system
            .costs
            .bearing_literals(|l| self.decisions.satisfied(l));
        if bearing.is_empty() {
            return None;
        }
        let mut clause = negated(&bearing);
        // watch the literals decided last
        clause.sort_by_key(|&l| std::cmp::Reverse(self.decisions.position(l).unwrap_or(0)));

        let before = self.rules.len();
        let rule_id = self.rules.add(Rule::new(clause.clone(), RuleType::Optimization));
        if self.rules.len() > before && clause.len() > 1 {
            self.watches.add_rule_with_watches(rule_id, clause[0], clause[1]);
        }
        Some(rule_id)
    }

    fn record_incumbent(&mut self) {
        let cost = self.system.costs.cost_of(|l| self.decisions.satisfied(l));
        let mut values = vec![false; self.system.table.num_variables() + 1];
        for (var, value) in values.iter_mut().enumerate().skip(1) {
            *value = self.decisions.decided_true(var as VarId);
        }
        self.stats.solutions += 1;
        log::trace!("Solution {} with cost {}", self.stats.solutions, cost);
        self.incumbent = Some((values, cost));
    }

    /// Enabled rule with every literal false
    fn find_violated(&self) -> Option<u32> {
        self.rules
            .iter()
            .filter(|r| !r.is_disabled())
            .find(|r| r.literals().iter().all(|&l| self.decisions.conflict(l)))
            .map(Rule::id)
    }

    /// Next decision.
    ///
    /// Among the domains of present nodes without a chosen value, the one
    /// with the fewest open values goes first (ties by node key, then
    /// attribute order) and its most preferred open value is tried. Nodes
    /// nothing requires are left out, then any other variable is set false.
    fn select_literal(&self) -> Option<Literal> {
        let table = &self.system.table;
        let mut best: Option<(usize, Literal)> = None;

        for node in table.nodes() {
            if !self.decisions.satisfied(node.literal) {
                continue;
            }
            for domain in &node.domains {
                if domain.values.iter().any(|v| self.decisions.satisfied(v.literal)) {
                    continue;
                }
                let mut open = domain.values.iter().filter(|v| !self.decisions.conflict(v.literal));
                let Some(first) = open.next() else {
                    continue;
                };
                let count = 1 + open.count();
                if best.map_or(true, |(fewest, _)| count < fewest) {
                    best = Some((count, first.literal));
                }
            }
        }
        if let Some((_, literal)) = best {
            return Some(literal);
        }

        if let Some(node) = table
            .nodes()
            .iter()
            .find(|n| self.decisions.undecided(n.literal as VarId))
        {
            return Some(-node.literal);
        }

        (1..=table.num_variables() as VarId)
            .find(|&var| self.decisions.undecided(var))
            .map(|var| -(var as Literal))
    }
}
