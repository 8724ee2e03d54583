//! Version type and total ordering

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::VersionError;

lazy_static! {
    static ref VALID_VERSION: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\-]*$").unwrap();
    static ref SEGMENT: Regex = Regex::new(r"([0-9]+)|([A-Za-z]+)").unwrap();
}

/// Branch names that compare greater than any numbered release, lowest first.
const INFINITY_NAMES: [&str; 6] = ["stable", "trunk", "head", "master", "main", "develop"];

fn infinity_rank(word: &str) -> Option<usize> {
    let lower = word.to_ascii_lowercase();
    INFINITY_NAMES.iter().position(|name| *name == lower)
}

/// A single version component
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    Numeric(u64),
    Alpha(String),
}

impl Component {
    /// True for branch names such as `develop` or `main`
    pub fn is_infinity(&self) -> bool {
        matches!(self, Component::Alpha(word) if infinity_rank(word).is_some())
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Component::Numeric(a), Component::Numeric(b)) => a.cmp(b),
            (Component::Alpha(a), Component::Alpha(b)) => {
                match (infinity_rank(a), infinity_rank(b)) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => a.cmp(b),
                }
            }
            (Component::Numeric(_), Component::Alpha(word)) => {
                if infinity_rank(word).is_some() {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (Component::Alpha(_), Component::Numeric(_)) => other.cmp(self).reverse(),
        }
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Numeric(n) => write!(f, "{}", n),
            Component::Alpha(word) => write!(f, "{}", word),
        }
    }
}

/// A parsed version.
///
/// Equality, hashing and ordering only look at the components, so `1.2`
/// and `1-2` are the same version. The input text is kept for display.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    components: Vec<Component>,
}

impl Version {
    /// Parse a version string
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let input = input.trim();
        if !VALID_VERSION.is_match(input) {
            return Err(VersionError::InvalidVersion(input.to_string()));
        }

        let mut components = Vec::new();
        for caps in SEGMENT.captures_iter(input) {
            if let Some(digits) = caps.get(1) {
                let value = digits.as_str().parse::<u64>().map_err(|_| {
                    VersionError::ComponentOverflow {
                        version: input.to_string(),
                        component: digits.as_str().to_string(),
                    }
                })?;
                components.push(Component::Numeric(value));
            } else if let Some(word) = caps.get(2) {
                components.push(Component::Alpha(word.as_str().to_string()));
            }
        }

        if components.is_empty() {
            return Err(VersionError::InvalidVersion(input.to_string()));
        }

        Ok(Version {
            raw: input.to_string(),
            components,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// True when this version names a development branch rather than a release
    pub fn is_develop(&self) -> bool {
        self.components.iter().any(Component::is_infinity)
    }

    /// True if every component of `self` starts `other` (`1.2` is a prefix of `1.2.3`).
    /// A version is a prefix of itself.
    pub fn is_prefix_of(&self, other: &Version) -> bool {
        self.components.len() <= other.components.len()
            && self.components.iter().zip(other.components.iter()).all(|(a, b)| a == b)
    }

    /// Truncate to the first `n` components
    pub fn up_to(&self, n: usize) -> Version {
        let components: Vec<Component> = self.components.iter().take(n).cloned().collect();
        let raw = components.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(".");
        Version { raw, components }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        self.components.len().cmp(&other.components.len())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
