use std::collections::{BTreeMap, HashMap};

use super::rule::{Rule, RuleType};

/// Collection of SAT rules.
///
/// - Deduplication based on literal content
/// - Sequential ID assignment, so compiled rules keep a stable order
/// - Per-type index for statistics and explanations
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    rules_by_type: BTreeMap<RuleType, Vec<u32>>,
    rule_hashes: HashMap<u64, u32>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, returning its ID. Returns the existing rule's ID when an
    /// enabled rule with the same literals is already present.
    pub fn add(&mut self, mut rule: Rule) -> u32 {
        let hash = rule.literal_hash();
        if let Some(&existing_id) = self.rule_hashes.get(&hash) {
            if let Some(existing) = self.get(existing_id) {
                if existing.equals_literals(&rule) && !existing.is_disabled() {
                    return existing_id;
                }
            }
        }

        let id = self.rules.len() as u32;
        rule.set_id(id);

        self.rules_by_type.entry(rule.rule_type()).or_default().push(id);
        self.rule_hashes.insert(hash, id);
        self.rules.push(rule);

        id
    }

    pub fn get(&self, id: u32) -> Option<&Rule> {
        self.rules.get(id as usize)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Rule> {
        self.rules.get_mut(id as usize)
    }

    pub fn rules_of_type(&self, rule_type: RuleType) -> impl Iterator<Item = &Rule> {
        self.rules_by_type
            .get(&rule_type)
            .into_iter()
            .flatten()
            .filter_map(move |&id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Enabled single-literal rules
    pub fn assertions(&self) -> impl Iterator<Item = &Rule> {
        self.rules
            .iter()
            .filter(|r| r.is_assertion() && !r.is_disabled())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn count_by_type(&self, rule_type: RuleType) -> usize {
        self.rules_by_type.get(&rule_type).map_or(0, Vec::len)
    }

    pub fn disable(&mut self, id: u32) {
        if let Some(rule) = self.get_mut(id) {
            rule.disable();
        }
    }

    /// IDs of enabled rules that can take part in an explanation, in ID order
    pub fn explainable_ids(&self) -> Vec<u32> {
        self.rules
            .iter()
            .filter(|r| r.rule_type().is_explainable() && !r.is_disabled())
            .map(Rule::id)
            .collect()
    }

    pub fn stats(&self) -> RuleSetStats {
        let mut stats = RuleSetStats {
            total: self.rules.len(),
            ..Default::default()
        };
        for rule in &self.rules {
            if rule.is_assertion() {
                stats.assertions += 1;
            }
        }
        stats.by_type = self
            .rules_by_type
            .iter()
            .map(|(rule_type, ids)| (rule_type.as_str(), ids.len()))
            .collect();
        stats
    }
}

/// Statistics about a rule set
#[derive(Debug, Default)]
pub struct RuleSetStats {
    pub total: usize,
    pub assertions: usize,
    pub by_type: Vec<(&'static str, usize)>,
}
