//! Three-valued evaluation of `when` conditions

use std::fmt;

use super::parser::ParseError;
use super::spec::Spec;

/// Result of evaluating a condition against partial information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tri {
    Satisfied,
    Violated,
    Undetermined,
}

impl Tri {
    pub fn from_bool(value: bool) -> Tri {
        if value {
            Tri::Satisfied
        } else {
            Tri::Violated
        }
    }

    /// Conjunction: any violation wins, then any unknown
    pub fn and(self, other: Tri) -> Tri {
        match (self, other) {
            (Tri::Violated, _) | (_, Tri::Violated) => Tri::Violated,
            (Tri::Undetermined, _) | (_, Tri::Undetermined) => Tri::Undetermined,
            _ => Tri::Satisfied,
        }
    }

    pub fn is_satisfied(self) -> bool {
        self == Tri::Satisfied
    }

    pub fn is_violated(self) -> bool {
        self == Tri::Violated
    }
}

impl fmt::Display for Tri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tri::Satisfied => write!(f, "satisfied"),
            Tri::Violated => write!(f, "violated"),
            Tri::Undetermined => write!(f, "undetermined"),
        }
    }
}

/// Condition on the spec that owns a dependency edge or conflict,
/// e.g. `@2: +cuda %gcc ^mpi`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Condition {
    spec: Spec,
}

impl Condition {
    pub fn new(spec: Spec) -> Self {
        Condition { spec }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        Spec::parse(input).map(Condition::new)
    }

    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    /// A condition with no constraints always holds
    pub fn is_trivial(&self) -> bool {
        let spec = &self.spec;
        spec.versions.is_any()
            && spec.variants.is_empty()
            && spec.compiler.is_none()
            && spec.architecture.is_none()
            && spec.dependencies.is_empty()
    }

    /// Evaluate against whatever is known about a spec. Attributes the
    /// partial spec leaves open evaluate to `Undetermined`.
    pub fn evaluate(&self, partial: &Spec) -> Tri {
        evaluate_spec(&self.spec, partial)
    }
}

fn evaluate_spec(wanted: &Spec, partial: &Spec) -> Tri {
    let mut result = Tri::Satisfied;

    if let (Some(want), Some(have)) = (&wanted.name, &partial.name) {
        if want != have {
            return Tri::Violated;
        }
    }

    if !wanted.versions.is_any() {
        let verdict = match partial.versions.concrete() {
            Some(version) => Tri::from_bool(wanted.versions.contains(version)),
            None if !partial.versions.intersects(&wanted.versions) => Tri::Violated,
            None if partial.versions.is_subset_of(&wanted.versions) => Tri::Satisfied,
            None => Tri::Undetermined,
        };
        result = result.and(verdict);
    }

    for (name, want) in &wanted.variants {
        let verdict = match partial.variants.get(name) {
            Some(have) if have.satisfies(want) => Tri::Satisfied,
            Some(have) if !have.intersects(want) => Tri::Violated,
            _ => Tri::Undetermined,
        };
        result = result.and(verdict);
    }

    if let Some(want) = &wanted.compiler {
        let verdict = match &partial.compiler {
            Some(have) if have.satisfies(want) => Tri::Satisfied,
            Some(have) if !have.intersects(want) => Tri::Violated,
            _ => Tri::Undetermined,
        };
        result = result.and(verdict);
    }

    if let Some(want) = &wanted.architecture {
        let verdict = match &partial.architecture {
            Some(have) if have.satisfies(want) => Tri::Satisfied,
            Some(have) if !have.intersects(want) => Tri::Violated,
            _ => Tri::Undetermined,
        };
        result = result.and(verdict);
    }

    for edge in &wanted.dependencies {
        let verdict = match partial.find_dependency(edge.spec.name()) {
            Some(dep) => evaluate_spec(&edge.spec, dep),
            None if partial.is_concrete() => Tri::Violated,
            None => Tri::Undetermined,
        };
        result = result.and(verdict);
    }

    result
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spec)
    }
}
