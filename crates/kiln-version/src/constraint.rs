//! Version constraints: lists of exact versions and ranges

use std::fmt;
use std::str::FromStr;

use crate::error::VersionError;
use crate::range::VersionRange;
use crate::version::Version;

/// One entry of a constraint list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionItem {
    /// `=1.2`, matches only 1.2
    Exact(Version),
    /// `1.2`, `1.2:1.4`, `:1.4`, `1.2:`
    Range(VersionRange),
}

impl VersionItem {
    pub fn contains(&self, version: &Version) -> bool {
        match self {
            VersionItem::Exact(v) => v == version,
            VersionItem::Range(r) => r.contains(version),
        }
    }

    fn intersection(&self, other: &VersionItem) -> Option<VersionItem> {
        match (self, other) {
            (VersionItem::Exact(a), VersionItem::Exact(b)) => (a == b).then(|| self.clone()),
            (VersionItem::Exact(v), VersionItem::Range(r))
            | (VersionItem::Range(r), VersionItem::Exact(v)) => {
                r.contains(v).then(|| VersionItem::Exact(v.clone()))
            }
            (VersionItem::Range(a), VersionItem::Range(b)) => {
                a.intersection(b).map(VersionItem::Range)
            }
        }
    }

    fn is_subset_of(&self, other: &VersionItem) -> bool {
        match (self, other) {
            (VersionItem::Exact(v), _) => other.contains(v),
            (VersionItem::Range(a), VersionItem::Range(b)) => a.is_subset_of(b),
            // A range always admits more than one version
            (VersionItem::Range(_), VersionItem::Exact(_)) => false,
        }
    }
}

impl fmt::Display for VersionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionItem::Exact(v) => write!(f, "={}", v),
            VersionItem::Range(r) => write!(f, "{}", r),
        }
    }
}

/// A version constraint as written after `@` in a spec.
///
/// `Any` is the absence of a constraint. `List` matches a version when any
/// of its items does; an empty list matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum VersionConstraint {
    #[default]
    Any,
    List(Vec<VersionItem>),
}

impl VersionConstraint {
    pub fn any() -> Self {
        VersionConstraint::Any
    }

    pub fn exact(version: Version) -> Self {
        VersionConstraint::List(vec![VersionItem::Exact(version)])
    }

    pub fn range(range: VersionRange) -> Self {
        if range.is_unbounded() {
            VersionConstraint::Any
        } else {
            VersionConstraint::List(vec![VersionItem::Range(range)])
        }
    }

    /// Parse a constraint such as `1.2:1.4,=2.0.1`
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let input = input.trim();
        let invalid = |reason: &str| VersionError::InvalidConstraint {
            constraint: input.to_string(),
            reason: reason.to_string(),
        };

        if input.is_empty() {
            return Err(invalid("empty constraint"));
        }
        if input == ":" {
            return Ok(VersionConstraint::Any);
        }

        let mut items = Vec::new();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid("empty list entry"));
            }

            if let Some(exact) = part.strip_prefix('=') {
                items.push(VersionItem::Exact(Version::parse(exact)?));
                continue;
            }

            match part.split_once(':') {
                Some((lo, hi)) => {
                    if hi.contains(':') {
                        return Err(invalid("more than one ':' in a range"));
                    }
                    let bound = |s: &str| -> Result<Option<Version>, VersionError> {
                        if s.trim().is_empty() {
                            Ok(None)
                        } else {
                            Version::parse(s).map(Some)
                        }
                    };
                    let range = VersionRange::new(bound(lo)?, bound(hi)?);
                    if range.is_empty() {
                        return Err(invalid("lower bound is above upper bound"));
                    }
                    if range.is_unbounded() {
                        return Ok(VersionConstraint::Any);
                    }
                    items.push(VersionItem::Range(range));
                }
                None => items.push(VersionItem::Range(VersionRange::point(Version::parse(part)?))),
            }
        }

        Ok(VersionConstraint::List(items))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, VersionConstraint::Any)
    }

    /// True when nothing can satisfy the constraint
    pub fn is_empty(&self) -> bool {
        matches!(self, VersionConstraint::List(items) if items.is_empty())
    }

    pub fn items(&self) -> &[VersionItem] {
        match self {
            VersionConstraint::Any => &[],
            VersionConstraint::List(items) => items,
        }
    }

    /// The single exact version, if the constraint pins one
    pub fn concrete(&self) -> Option<&Version> {
        match self.items() {
            [VersionItem::Exact(v)] => Some(v),
            _ => None,
        }
    }

    pub fn contains(&self, version: &Version) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::List(items) => items.iter().any(|item| item.contains(version)),
        }
    }

    pub fn intersection(&self, other: &VersionConstraint) -> VersionConstraint {
        match (self, other) {
            (VersionConstraint::Any, _) => other.clone(),
            (_, VersionConstraint::Any) => self.clone(),
            (VersionConstraint::List(a), VersionConstraint::List(b)) => {
                let mut items: Vec<VersionItem> = Vec::new();
                for left in a {
                    for right in b {
                        if let Some(item) = left.intersection(right) {
                            if !items.contains(&item) {
                                items.push(item);
                            }
                        }
                    }
                }
                VersionConstraint::List(items)
            }
        }
    }

    pub fn intersects(&self, other: &VersionConstraint) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Conservative subset test: `true` means every version matching `self`
    /// matches `other`. A `false` answer may be a false negative for lists
    /// whose items only jointly cover another item.
    pub fn is_subset_of(&self, other: &VersionConstraint) -> bool {
        match (self, other) {
            (_, VersionConstraint::Any) => true,
            (VersionConstraint::Any, VersionConstraint::List(_)) => false,
            (VersionConstraint::List(a), VersionConstraint::List(b)) => {
                a.iter().all(|left| b.iter().any(|right| left.is_subset_of(right)))
            }
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionConstraint::parse(s)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, ":"),
            VersionConstraint::List(items) => {
                let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn c(s: &str) -> VersionConstraint {
        VersionConstraint::parse(s).unwrap()
    }

    #[test]
    fn test_parse_forms() {
        assert!(c(":").is_any());
        assert_eq!(c("=1.2").concrete(), Some(&v("1.2")));
        assert_eq!(c("1.2").concrete(), None);
        assert_eq!(c("1.2:1.4,=2.0").items().len(), 2);
        assert_eq!(c(" 3.19: ").to_string(), "3.19:");
    }

    #[test]
    fn test_parse_errors() {
        assert!(VersionConstraint::parse("").is_err());
        assert!(VersionConstraint::parse("1.0,").is_err());
        assert!(VersionConstraint::parse("2.0:1.0").is_err());
        assert!(VersionConstraint::parse("1:2:3").is_err());
        assert!(VersionConstraint::parse("=").is_err());
    }

    #[test]
    fn test_contains() {
        let constraint = c("1.0:1.4,=2.0.1");
        assert!(constraint.contains(&v("1.3")));
        assert!(constraint.contains(&v("2.0.1")));
        assert!(!constraint.contains(&v("2.0")));
        assert!(!constraint.contains(&v("2.0.1.1")));
        assert!(VersionConstraint::Any.contains(&v("develop")));
    }

    #[test]
    fn test_intersection() {
        assert_eq!(c("1.0:2.0").intersection(&c("1.5:")), c("1.5:2.0"));
        assert_eq!(c("1.0:2.0").intersection(&c("=1.7")), c("=1.7"));
        assert!(c(":1.0").intersection(&c("2.0:")).is_empty());
        assert_eq!(VersionConstraint::Any.intersection(&c("3")), c("3"));
        assert!(c("1.0:2.0").intersects(&c("2.0.5")));
    }

    #[test]
    fn test_subset() {
        assert!(c("1.2:1.3").is_subset_of(&c("1:2")));
        assert!(c("=1.2.5").is_subset_of(&c("1.2")));
        assert!(!c("1.2").is_subset_of(&c("=1.2")));
        assert!(!VersionConstraint::Any.is_subset_of(&c("1:")));
        assert!(c("1:").is_subset_of(&VersionConstraint::Any));
        assert!(c("=1.0,=1.1").is_subset_of(&c("1.0,1.1")));
    }
}
