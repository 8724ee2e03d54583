//! Variant values

use std::collections::BTreeSet;
use std::fmt;

/// Value of a build option on a spec
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariantValue {
    /// `+name` / `~name`
    Bool(bool),
    /// `name=value`
    Single(String),
    /// `name=a,b`, only meaningful for multi-valued variants
    Multi(BTreeSet<String>),
}

impl VariantValue {
    /// Parse the right-hand side of `name=value`
    pub fn from_assignment(value: &str) -> Self {
        match value {
            "true" | "True" => VariantValue::Bool(true),
            "false" | "False" => VariantValue::Bool(false),
            _ if value.contains(',') => VariantValue::Multi(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            _ => VariantValue::Single(value.to_string()),
        }
    }

    /// The selected values as strings. Booleans map to `"true"`/`"false"`.
    pub fn values(&self) -> BTreeSet<String> {
        match self {
            VariantValue::Bool(b) => BTreeSet::from([b.to_string()]),
            VariantValue::Single(v) => BTreeSet::from([v.clone()]),
            VariantValue::Multi(values) => values.clone(),
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, VariantValue::Multi(_))
    }

    /// Whether a bound value `self` meets the requirement `wanted`.
    /// Multi-valued selections must contain every wanted value.
    pub fn satisfies(&self, wanted: &VariantValue) -> bool {
        let have = self.values();
        let want = wanted.values();
        match self {
            VariantValue::Multi(_) => want.is_subset(&have),
            _ => have == want,
        }
    }

    /// Whether both requirements can hold on the same node
    pub fn intersects(&self, other: &VariantValue) -> bool {
        self.is_multi() || other.is_multi() || self.values() == other.values()
    }

    /// Render as it appears in a spec, e.g. `+shared` or `libs=shared,static`
    pub fn format(&self, name: &str) -> String {
        match self {
            VariantValue::Bool(true) => format!("+{}", name),
            VariantValue::Bool(false) => format!("~{}", name),
            VariantValue::Single(v) => format!("{}={}", name, v),
            VariantValue::Multi(values) => {
                format!("{}={}", name, values.iter().cloned().collect::<Vec<_>>().join(","))
            }
        }
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantValue::Bool(b) => write!(f, "{}", b),
            VariantValue::Single(v) => write!(f, "{}", v),
            VariantValue::Multi(values) => {
                write!(f, "{}", values.iter().cloned().collect::<Vec<_>>().join(","))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_assignment() {
        assert_eq!(VariantValue::from_assignment("true"), VariantValue::Bool(true));
        assert_eq!(
            VariantValue::from_assignment("Release"),
            VariantValue::Single("Release".into())
        );
        assert_eq!(
            VariantValue::from_assignment("shared,static"),
            VariantValue::Multi(BTreeSet::from(["shared".to_string(), "static".to_string()]))
        );
    }

    #[test]
    fn test_satisfies_single_and_bool() {
        assert!(VariantValue::Bool(true).satisfies(&VariantValue::Bool(true)));
        assert!(!VariantValue::Bool(true).satisfies(&VariantValue::Bool(false)));
        assert!(VariantValue::Bool(false).satisfies(&VariantValue::Single("false".into())));
        let release = VariantValue::Single("Release".into());
        assert!(!VariantValue::Single("Debug".into()).satisfies(&release));
    }

    #[test]
    fn test_multi_satisfies_subset() {
        let both = VariantValue::from_assignment("shared,static");
        assert!(both.satisfies(&VariantValue::Single("shared".into())));
        assert!(!VariantValue::from_assignment("a,b").satisfies(&VariantValue::Single("c".into())));
    }

    #[test]
    fn test_format() {
        assert_eq!(VariantValue::Bool(true).format("cuda"), "+cuda");
        assert_eq!(VariantValue::Bool(false).format("cuda"), "~cuda");
        assert_eq!(
            VariantValue::from_assignment("static,shared").format("libs"),
            "libs=shared,static"
        );
    }
}
