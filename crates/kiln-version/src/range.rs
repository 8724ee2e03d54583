//! Inclusive version ranges

use std::fmt;

use crate::version::Version;

/// An inclusive range `lo:hi`. A missing bound is open.
///
/// The upper bound also admits every version it is a prefix of, so `:1.4`
/// contains `1.4.7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    lo: Option<Version>,
    hi: Option<Version>,
}

/// Whether every version under upper bound `a` is also under upper bound `b`
fn upper_within(a: &Version, b: &Version) -> bool {
    b.is_prefix_of(a) || (a < b && !a.is_prefix_of(b))
}

impl VersionRange {
    pub fn new(lo: Option<Version>, hi: Option<Version>) -> Self {
        VersionRange { lo, hi }
    }

    /// `v:v`, which matches `v` and every `v.x`
    pub fn point(version: Version) -> Self {
        VersionRange {
            lo: Some(version.clone()),
            hi: Some(version),
        }
    }

    pub fn unbounded() -> Self {
        VersionRange { lo: None, hi: None }
    }

    pub fn lo(&self) -> Option<&Version> {
        self.lo.as_ref()
    }

    pub fn hi(&self) -> Option<&Version> {
        self.hi.as_ref()
    }

    pub fn is_unbounded(&self) -> bool {
        self.lo.is_none() && self.hi.is_none()
    }

    pub fn contains(&self, version: &Version) -> bool {
        let above = self.lo.as_ref().map_or(true, |lo| lo <= version);
        let below = self
            .hi
            .as_ref()
            .map_or(true, |hi| version <= hi || hi.is_prefix_of(version));
        above && below
    }

    pub fn is_empty(&self) -> bool {
        match (&self.lo, &self.hi) {
            (Some(lo), Some(hi)) => lo > hi && !hi.is_prefix_of(lo),
            _ => false,
        }
    }

    /// Overlap of two ranges, `None` when they are disjoint
    pub fn intersection(&self, other: &VersionRange) -> Option<VersionRange> {
        let lo = match (&self.lo, &other.lo) {
            (Some(a), Some(b)) => Some(if a >= b { a.clone() } else { b.clone() }),
            (Some(a), None) | (None, Some(a)) => Some(a.clone()),
            (None, None) => None,
        };
        let hi = match (&self.hi, &other.hi) {
            (Some(a), Some(b)) => Some(if upper_within(a, b) { a.clone() } else { b.clone() }),
            (Some(a), None) | (None, Some(a)) => Some(a.clone()),
            (None, None) => None,
        };

        let range = VersionRange { lo, hi };
        if range.is_empty() {
            None
        } else {
            Some(range)
        }
    }

    pub fn intersects(&self, other: &VersionRange) -> bool {
        self.intersection(other).is_some()
    }

    pub fn is_subset_of(&self, other: &VersionRange) -> bool {
        let lower_ok = match (&self.lo, &other.lo) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => b <= a,
        };
        let upper_ok = match (&self.hi, &other.hi) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => upper_within(a, b),
        };
        lower_ok && upper_ok
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.lo, &self.hi) {
            (Some(lo), Some(hi)) if lo == hi => write!(f, "{}", lo),
            (lo, hi) => {
                if let Some(lo) = lo {
                    write!(f, "{}", lo)?;
                }
                write!(f, ":")?;
                if let Some(hi) = hi {
                    write!(f, "{}", hi)?;
                }
                Ok(())
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

    fn range(lo: &str, hi: &str) -> VersionRange {
        let bound = |s: &str| if s.is_empty() { None } else { Some(v(s)) };
        VersionRange::new(bound(lo), bound(hi))
    }

    #[test]
    fn test_contains_is_inclusive() {
        let r = range("1.2", "1.4");
        assert!(r.contains(&v("1.2")));
        assert!(r.contains(&v("1.3.9")));
        assert!(r.contains(&v("1.4")));
        assert!(r.contains(&v("1.4.7")));
        assert!(!r.contains(&v("1.5")));
        assert!(!r.contains(&v("1.1.9")));
    }

    #[test]
    fn test_open_ended() {
        assert!(range("", "8").contains(&v("7.5")));
        assert!(range("", "8").contains(&v("8.3.0")));
        assert!(!range("", "8").contains(&v("9.1")));
        assert!(range("3.19", "").contains(&v("develop")));
        assert!(VersionRange::unbounded().contains(&v("0.0.1")));
    }

    #[test]
    fn test_point_range_matches_prefix() {
        let r = VersionRange::point(v("6.0.2"));
        assert!(r.contains(&v("6.0.2")));
        assert!(r.contains(&v("6.0.2.1")));
        assert!(!r.contains(&v("6.0.3")));
        assert_eq!(r.to_string(), "6.0.2");
    }

    #[test]
    fn test_intersection() {
        let a = range("1.0", "2.0");
        let b = range("1.5", "");
        assert_eq!(a.intersection(&b), Some(range("1.5", "2.0")));

        let tighter = range("", "1.4").intersection(&range("", "1.4.2")).unwrap();
        assert_eq!(tighter.hi(), Some(&v("1.4.2")));

        assert_eq!(range("", "1.0").intersection(&range("2.0", "")), None);
    }

    #[test]
    fn test_subset() {
        assert!(range("1.2", "1.3").is_subset_of(&range("1.0", "2.0")));
        assert!(range("1.4.1", "1.4.5").is_subset_of(&range("", "1.4")));
        assert!(!range("", "1.4").is_subset_of(&range("", "1.4.5")));
        assert!(!range("", "").is_subset_of(&range("1.0", "")));
        assert!(range("2.0", "").is_subset_of(&VersionRange::unbounded()));
    }

    #[test]
    fn test_empty() {
        assert!(range("2.0", "1.0").is_empty());
        assert!(!range("1.4.1", "1.4").is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(range("1.2", "1.4").to_string(), "1.2:1.4");
        assert_eq!(range("", "8").to_string(), ":8");
        assert_eq!(range("3.19", "").to_string(), "3.19:");
    }
}
