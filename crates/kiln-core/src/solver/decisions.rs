use super::rule::Literal;
use super::variables::VarId;

/// Tracks decisions made during SAT solving.
///
/// Each decision records whether a variable is true (+) or false (-), the
/// level it was decided at, and the rule that forced it (if any).
///
/// `decision_map` is indexed by variable: 0 = undecided, `level + 1` with the
/// literal's sign otherwise.
#[derive(Debug, Default)]
pub struct Decisions {
    decision_map: Vec<i32>,
    reasons: Vec<Option<u32>>,
    /// Index of each decided variable in `decision_queue`
    positions: Vec<u32>,
    /// Decisions in the order they were made
    decision_queue: Vec<Literal>,
    level: u32,
}

impl Decisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_var: usize) -> Self {
        Self {
            decision_map: vec![0; max_var + 1],
            reasons: vec![None; max_var + 1],
            positions: vec![0; max_var + 1],
            decision_queue: Vec::with_capacity(max_var),
            level: 0,
        }
    }

    #[inline]
    fn ensure_capacity(&mut self, var: VarId) {
        let id = var as usize;
        if id >= self.decision_map.len() {
            self.decision_map.resize(id + 1, 0);
            self.reasons.resize(id + 1, None);
            self.positions.resize(id + 1, 0);
        }
    }

    #[inline]
    fn entry(&self, literal: Literal) -> i32 {
        self.decision_map
            .get(literal.unsigned_abs() as usize)
            .copied()
            .unwrap_or(0)
    }

    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[inline]
    pub fn increment_level(&mut self) {
        self.level += 1;
    }

    #[inline]
    pub fn set_level(&mut self, level: u32) {
        self.level = level;
    }

    /// Make a decision at the current level.
    ///
    /// Returns false if this conflicts with an existing decision
    pub fn decide(&mut self, literal: Literal, rule_id: Option<u32>) -> bool {
        let var = literal.unsigned_abs();
        self.ensure_capacity(var);

        let id = var as usize;
        let existing = self.decision_map[id];
        if existing != 0 {
            return (existing > 0) == (literal > 0);
        }

        let level_value = (self.level + 1) as i32;
        self.decision_map[id] = if literal > 0 { level_value } else { -level_value };
        self.reasons[id] = rule_id;
        self.positions[id] = self.decision_queue.len() as u32;
        self.decision_queue.push(literal);

        true
    }

    /// The literal holds under the current decisions
    #[inline]
    pub fn satisfied(&self, literal: Literal) -> bool {
        let decision = self.entry(literal);
        decision != 0 && (decision > 0) == (literal > 0)
    }

    /// The literal is false under the current decisions
    #[inline]
    pub fn conflict(&self, literal: Literal) -> bool {
        let decision = self.entry(literal);
        decision != 0 && (decision > 0) != (literal > 0)
    }

    #[inline]
    pub fn decided(&self, var: VarId) -> bool {
        self.entry(var as Literal) != 0
    }

    #[inline]
    pub fn undecided(&self, var: VarId) -> bool {
        !self.decided(var)
    }

    #[inline]
    pub fn decided_true(&self, var: VarId) -> bool {
        self.entry(var as Literal) > 0
    }

    /// Level at which the literal's variable was decided
    #[inline]
    pub fn decision_level(&self, literal: Literal) -> Option<u32> {
        match self.entry(literal) {
            0 => None,
            decision => Some(decision.unsigned_abs() - 1),
        }
    }

    /// Rule that forced the variable, `None` for free choices
    pub fn decision_rule(&self, literal: Literal) -> Option<u32> {
        self.reasons
            .get(literal.unsigned_abs() as usize)
            .copied()
            .flatten()
    }

    /// Position of the variable's decision in the queue
    pub fn position(&self, literal: Literal) -> Option<usize> {
        if self.decided(literal.unsigned_abs()) {
            Some(self.positions[literal.unsigned_abs() as usize] as usize)
        } else {
            None
        }
    }

    /// Revert all decisions made above `target_level`
    pub fn revert_to_level(&mut self, target_level: u32) {
        while let Some(&literal) = self.decision_queue.last() {
            match self.decision_level(literal) {
                Some(level) if level > target_level => {
                    let id = literal.unsigned_abs() as usize;
                    self.decision_map[id] = 0;
                    self.reasons[id] = None;
                    self.decision_queue.pop();
                }
                _ => break,
            }
        }
        self.level = target_level;
    }

    /// Every literal that currently holds, in variable order
    pub fn true_literals(&self) -> impl Iterator<Item = Literal> + '_ {
        self.decision_map
            .iter()
            .enumerate()
            .filter(|(_, &d)| d != 0)
            .map(|(id, &d)| if d > 0 { id as Literal } else { -(id as Literal) })
    }

    pub fn queue(&self) -> &[Literal] {
        &self.decision_queue
    }

    pub fn len(&self) -> usize {
        self.decision_queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decision_queue.is_empty()
    }

    pub fn reset(&mut self) {
        self.decision_map.fill(0);
        self.reasons.fill(None);
        self.decision_queue.clear();
        self.level = 0;
    }
}
